//! PDF rendering with `printpdf`.
//!
//! Cyrillic text needs the configured TTF; builtin Helvetica is only a
//! fallback. The logo and product images are embedded as image XObjects.
use std::io::Cursor;

use printpdf::image_crate::{self, GenericImageView};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point,
};

use crate::error::AppError;
use crate::http::PDF_CONTENT_TYPE;
use crate::pricing::layout::COLUMNS;
use crate::pricing::{Page, Row};
use crate::render::{row_cells, DocumentRenderer, OfferDocument};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
/// Column widths in mm, summing to the printable width.
const COLUMN_WIDTHS: [f32; 7] = [10.0, 70.0, 30.0, 14.0, 14.0, 21.0, 21.0];
const MAX_ROW_HEIGHT: f32 = 14.0;
const MAX_NAME_CHARS: usize = 40;
const FONT_SIZE: f32 = 9.0;
const LINE_STEP: f32 = 3.5;
const IMAGE_DPI: f32 = 300.0;
const LOGO_WIDTH: f32 = 60.0;
const LOGO_HEIGHT: f32 = 25.0;

fn render_err(e: impl std::fmt::Display) -> AppError {
    AppError::Render(format!("Failed to build PDF: {}", e))
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(1)).collect();
    short.push('…');
    short
}

fn column_x(col: usize) -> f32 {
    MARGIN + COLUMN_WIDTHS[..col].iter().sum::<f32>()
}

/// Renders the offer as A4 pages, one per planned page.
#[derive(Debug, Default, Clone)]
pub struct PdfRenderer {
    /// TTF bytes; builtin Helvetica when absent or unreadable.
    font: Option<Vec<u8>>,
}

impl PdfRenderer {
    pub fn new(font: Option<Vec<u8>>) -> Self {
        Self { font }
    }

    fn load_font(&self, doc: &PdfDocumentReference) -> Result<IndirectFontRef, AppError> {
        if let Some(bytes) = &self.font {
            match doc.add_external_font(Cursor::new(bytes.as_slice())) {
                Ok(font) => return Ok(font),
                Err(e) => tracing::warn!(error = %e, "Configured font is unreadable, using Helvetica"),
            }
        }
        doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)
    }
}

/// Text and images placed on one page.
#[derive(Debug, Default, Clone, PartialEq)]
struct PageTrace {
    texts: Vec<String>,
    images: usize,
}

struct Composed {
    doc: PdfDocumentReference,
    pages: Vec<PageTrace>,
}

struct Canvas<'a> {
    layer: PdfLayerReference,
    font: &'a IndirectFontRef,
    /// Baseline of the next line, from the bottom edge.
    y: f32,
    trace: PageTrace,
}

impl Canvas<'_> {
    fn text_at(&mut self, text: &str, size: f32, x: f32, y: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(y), self.font);
        self.trace.texts.push(text.to_string());
    }

    fn text(&mut self, text: &str, size: f32, x: f32) {
        self.text_at(text, size, x, self.y);
    }

    fn rule(&self, y: f32) {
        let line = Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(y)), false),
                (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(y)), false),
            ],
            is_closed: false,
        };
        self.layer.add_line(line);
    }

    fn line(&mut self, text: &str, size: f32) {
        self.text(text, size, MARGIN);
        self.y -= size * 0.5;
    }

    /// Fit an image into the box whose top-left corner is `(x, top)`.
    /// Undecodable bytes are logged and leave the box empty.
    fn image(&mut self, bytes: &[u8], x: f32, top: f32, max_width: f32, max_height: f32) {
        let decoded = match image_crate::load_from_memory(bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "Image is not a supported format, leaving it out");
                return;
            }
        };
        let (px_width, px_height) = decoded.dimensions();
        if px_width == 0 || px_height == 0 {
            return;
        }

        let natural_width = px_width as f32 / IMAGE_DPI * 25.4;
        let natural_height = px_height as f32 / IMAGE_DPI * 25.4;
        let scale = (max_width / natural_width).min(max_height / natural_height);

        Image::from_dynamic_image(&decoded).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(top - natural_height * scale)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
        self.trace.images += 1;
    }
}

impl PdfRenderer {
    fn draw_header(canvas: &mut Canvas<'_>, document: &OfferDocument<'_>) {
        if let Some(logo) = document.images.logo.as_deref() {
            canvas.image(
                logo,
                PAGE_WIDTH - MARGIN - LOGO_WIDTH,
                PAGE_HEIGHT - MARGIN,
                LOGO_WIDTH,
                LOGO_HEIGHT,
            );
        }

        let company = document.company;
        canvas.line(&company.name, 14.0);
        for detail in company.details.iter().chain(company.website.iter()) {
            canvas.line(detail, FONT_SIZE);
        }
        canvas.y = canvas.y.min(PAGE_HEIGHT - MARGIN - LOGO_HEIGHT) - 4.0;
        canvas.line(&document.title(), 12.0);
        if let Some(address) = document.address {
            canvas.line(&format!("Адрес: {}", address), FONT_SIZE);
        }
        canvas.y -= 2.0;
    }

    fn draw_table(canvas: &mut Canvas<'_>, document: &OfferDocument<'_>, page: &Page<'_>, row_height: f32) {
        canvas.rule(canvas.y + row_height - 2.5);
        for (col, title) in COLUMNS.iter().enumerate() {
            canvas.text(title, 8.0, column_x(col) + 1.0);
        }
        canvas.rule(canvas.y - 2.5);
        canvas.y -= row_height;

        for row in page.rows {
            let cells = row_cells(row);
            if let Row::Summary(_) = row {
                canvas.text(&cells.name, FONT_SIZE, column_x(4) + 1.0);
                canvas.text(&cells.total, FONT_SIZE, column_x(6) + 1.0);
            } else {
                canvas.text(&cells.position, FONT_SIZE, column_x(0) + 1.0);
                let name_lines: Vec<&str> = cells.name.lines().collect();
                let first_baseline = canvas.y + LINE_STEP * name_lines.len().saturating_sub(1) as f32;
                for (idx, name_line) in name_lines.iter().enumerate() {
                    let y = first_baseline - LINE_STEP * idx as f32;
                    canvas.text_at(&truncate(name_line, MAX_NAME_CHARS), FONT_SIZE, column_x(1) + 1.0, y);
                }
                if let Some(bytes) = document.images.get(cells.image_ref.as_deref()) {
                    let top = canvas.y + row_height - 3.0;
                    canvas.image(bytes, column_x(2) + 1.0, top, COLUMN_WIDTHS[2] - 2.0, row_height - 1.0);
                }
                canvas.text(&cells.quantity, FONT_SIZE, column_x(3) + 1.0);
                canvas.text(cells.unit, FONT_SIZE, column_x(4) + 1.0);
                canvas.text(&cells.price, FONT_SIZE, column_x(5) + 1.0);
                canvas.text(&cells.total, FONT_SIZE, column_x(6) + 1.0);
            }
            canvas.rule(canvas.y - 2.5);
            canvas.y -= row_height;
        }
    }

    fn draw_footer(canvas: &mut Canvas<'_>, document: &OfferDocument<'_>) {
        canvas.y -= 4.0;
        for term in &document.company.terms {
            canvas.line(term, FONT_SIZE);
        }
        canvas.y -= 6.0;
        canvas.line(&document.signature_line(), FONT_SIZE);
    }

    fn compose(&self, document: &OfferDocument<'_>) -> Result<Composed, AppError> {
        let (doc, first_page, first_layer) =
            PdfDocument::new(document.title(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let font = self.load_font(&doc)?;

        // Footer text and the page counter stay below this line.
        let table_floor = MARGIN + 45.0;
        let mut pages = Vec::new();

        for page in document.layout.pages() {
            let (page_index, layer_index) = if page.number == 1 {
                (first_page, first_layer)
            } else {
                doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1")
            };
            let mut canvas = Canvas {
                layer: doc.get_page(page_index).get_layer(layer_index),
                font: &font,
                y: PAGE_HEIGHT - MARGIN,
                trace: PageTrace::default(),
            };
            if page.number == 1 {
                Self::draw_header(&mut canvas, document);
            }

            let slots = page.rows.len() as f32 + 1.0;
            let row_height = ((canvas.y - table_floor) / slots).min(MAX_ROW_HEIGHT);
            Self::draw_table(&mut canvas, document, &page, row_height);

            if page.is_last() {
                Self::draw_footer(&mut canvas, document);
            }
            canvas.y = MARGIN;
            canvas.text(&page.counter_label(), 8.0, PAGE_WIDTH - MARGIN - 30.0);
            pages.push(canvas.trace);
        }

        Ok(Composed { doc, pages })
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, document: &OfferDocument<'_>) -> Result<Vec<u8>, AppError> {
        let composed = self.compose(document)?;
        tracing::debug!(
            pages = composed.pages.len(),
            text_runs = composed.pages.iter().map(|p| p.texts.len()).sum::<usize>(),
            images = composed.pages.iter().map(|p| p.images).sum::<usize>(),
            "PDF composed"
        );
        composed.doc.save_to_bytes().map_err(render_err)
    }

    fn content_type(&self) -> &'static str {
        PDF_CONTENT_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageSet;
    use crate::pricing::Discount;
    use crate::render::tests::{company, long_layout, png_bytes, sample_layout, sample_layout_with_images};
    use chrono::NaiveDate;

    fn document<'a>(
        layout: &'a crate::pricing::OfferLayout,
        company: &'a crate::config::CompanyProfile,
        images: &'a ImageSet,
    ) -> OfferDocument<'a> {
        OfferDocument {
            layout,
            company,
            offer_number: 3,
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            address: None,
            images,
        }
    }

    #[test]
    fn test_truncate_long_names() {
        assert_eq!(truncate("Горка", 40), "Горка");
        let long = "Игровой комплекс с горкой, качелями и песочницей";
        let short = truncate(long, 40);
        assert_eq!(short.chars().count(), 40);
        assert!(short.ends_with('…'));
    }

    #[test]
    fn test_renders_pdf_bytes() {
        let layout = sample_layout(Discount::None);
        let company = company();
        let images = ImageSet::default();

        let renderer = PdfRenderer::default();
        let bytes = renderer.render(&document(&layout, &company, &images)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(renderer.content_type(), PDF_CONTENT_TYPE);
    }

    #[test]
    fn test_embeds_logo_and_resolved_product_images() {
        let layout = sample_layout_with_images();
        let company = company();
        let mut images = ImageSet::default();
        images.logo = Some(png_bytes());
        images.images.insert("https://cdn/ok-1.png".to_string(), png_bytes());

        let composed = PdfRenderer::default().compose(&document(&layout, &company, &images)).unwrap();
        // Logo plus the one product image that resolved.
        assert_eq!(composed.pages[0].images, 2);
        assert!(composed.pages[0].texts.iter().any(|t| t == "1001"));
        assert!(composed.pages[0].texts.iter().any(|t| t == "Качели"));
    }

    #[test]
    fn test_undecodable_images_are_left_out() {
        let layout = sample_layout_with_images();
        let company = company();
        let mut images = ImageSet::default();
        images.logo = Some(b"not an image".to_vec());

        let composed = PdfRenderer::default().compose(&document(&layout, &company, &images)).unwrap();
        assert_eq!(composed.pages[0].images, 0);
    }

    #[test]
    fn test_every_page_has_header_and_counter() {
        let layout = long_layout(20);
        let company = company();
        let images = ImageSet::default();

        let composed = PdfRenderer::default().compose(&document(&layout, &company, &images)).unwrap();
        assert_eq!(composed.pages.len(), 3);
        let title = document(&layout, &company, &images).title();
        for (idx, page) in composed.pages.iter().enumerate() {
            let has = |text: &str| page.texts.iter().any(|t| t == text);
            let is_last = idx == composed.pages.len() - 1;
            assert!(has(COLUMNS[1]));
            assert!(has(&format!("Страница {} из 3", idx + 1)));
            assert_eq!(has("Итого:"), is_last);
            assert_eq!(has(&title), idx == 0);
        }
    }
}
