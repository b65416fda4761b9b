//! Spreadsheet rendering with `rust_xlsxwriter`.
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Image, Workbook, Worksheet, XlsxError};

use crate::error::AppError;
use crate::http::XLSX_CONTENT_TYPE;
use crate::pricing::layout::COLUMNS;
use crate::pricing::money::round_money;
use crate::pricing::{Page, Row};
use crate::render::{row_cells, DocumentRenderer, OfferDocument};

const LAST_COL: u16 = 6;
const COLUMN_WIDTHS: [f64; 7] = [5.0, 45.0, 16.0, 8.0, 8.0, 14.0, 16.0];
const IMAGE_ROW_HEIGHT: f64 = 70.0;
const A4_PAPER: u8 = 9;

struct Formats {
    company: Format,
    plain: Format,
    title: Format,
    header: Format,
    cell: Format,
    cell_text: Format,
    money: Format,
    summary_label: Format,
    summary_money: Format,
    counter: Format,
}

impl Formats {
    fn new() -> Self {
        let border = Format::new().set_border(FormatBorder::Thin).set_align(FormatAlign::VerticalCenter);
        Self {
            company: Format::new().set_bold().set_font_size(14),
            plain: Format::new(),
            title: Format::new().set_bold().set_font_size(13).set_align(FormatAlign::Center),
            header: border
                .clone()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_text_wrap()
                .set_background_color(Color::RGB(0xD8BFD8)),
            cell: border.clone().set_align(FormatAlign::Center),
            cell_text: border.clone().set_text_wrap(),
            money: border.clone().set_num_format("#,##0.00"),
            summary_label: border.clone().set_bold().set_align(FormatAlign::Right),
            summary_money: border.set_bold().set_num_format("#,##0.00"),
            counter: Format::new().set_italic().set_font_size(9).set_align(FormatAlign::Right),
        }
    }
}

fn to_number(amount: rust_decimal::Decimal) -> f64 {
    round_money(amount).to_f64().unwrap_or_default()
}

/// Renders the offer as a single-sheet A4 workbook with one manual page
/// break per planned page.
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxRenderer;

/// Sheet rows holding the per-page furniture.
#[derive(Debug, Default, Clone, PartialEq)]
struct SheetRows {
    table_headers: Vec<u32>,
    counters: Vec<u32>,
    summaries: Vec<u32>,
    /// First row of every page after the first.
    breaks: Vec<u32>,
    images: usize,
}

impl XlsxRenderer {
    fn build(&self, document: &OfferDocument<'_>) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let rows = write_sheet(sheet, document)?;
        tracing::debug!(
            pages = rows.counters.len(),
            table_headers = rows.table_headers.len(),
            summary_rows = rows.summaries.len(),
            images = rows.images,
            "Spreadsheet composed"
        );
        workbook.save_to_buffer()
    }
}

fn write_sheet(sheet: &mut Worksheet, document: &OfferDocument<'_>) -> Result<SheetRows, XlsxError> {
    let formats = Formats::new();
    sheet.set_name("КП")?;
    sheet.set_paper_size(A4_PAPER);
    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }

    let mut rows = SheetRows::default();
    let mut row = write_header(sheet, document, &formats, &mut rows)?;

    for page in document.layout.pages() {
        row = write_page(sheet, document, &page, row, &formats, &mut rows)?;
        if page.is_last() {
            row = write_footer(sheet, document, row, &formats)?;
        }
        sheet.merge_range(row, 0, row, LAST_COL, &page.counter_label(), &formats.counter)?;
        rows.counters.push(row);
        row += 1;
        if !page.is_last() {
            rows.breaks.push(row);
        }
    }

    if !rows.breaks.is_empty() {
        sheet.set_page_breaks(&rows.breaks)?;
    }
    Ok(rows)
}

/// Company block, logo, title and address. Returns the next free row.
fn write_header(
    sheet: &mut Worksheet,
    document: &OfferDocument<'_>,
    formats: &Formats,
    rows: &mut SheetRows,
) -> Result<u32, XlsxError> {
    let company = document.company;
    let mut row = 0;

    sheet.merge_range(row, 0, row, 4, &company.name, &formats.company)?;
    row += 1;
    for line in company.details.iter().chain(company.website.iter()) {
        sheet.merge_range(row, 0, row, 4, line, &formats.plain)?;
        row += 1;
    }

    if let Some(logo) = document.images.logo.as_deref() {
        match Image::new_from_buffer(logo) {
            Ok(image) => {
                sheet.insert_image(0, 5, &image.set_scale_to_size(200, 80, true))?;
                rows.images += 1;
            }
            Err(e) => tracing::warn!(error = %e, "Logo is not a supported image, skipping"),
        }
    }

    // Keep the title clear of the logo.
    row = row.max(4) + 1;
    sheet.merge_range(row, 0, row, LAST_COL, &document.title(), &formats.title)?;
    row += 1;
    if let Some(address) = document.address {
        sheet.merge_range(row, 0, row, LAST_COL, &format!("Адрес: {}", address), &formats.plain)?;
        row += 1;
    }
    Ok(row + 1)
}

fn write_page(
    sheet: &mut Worksheet,
    document: &OfferDocument<'_>,
    page: &Page<'_>,
    mut row: u32,
    formats: &Formats,
    rows: &mut SheetRows,
) -> Result<u32, XlsxError> {
    for (col, title) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(row, col as u16, *title, &formats.header)?;
    }
    rows.table_headers.push(row);
    row += 1;

    for table_row in page.rows {
        let cells = row_cells(table_row);
        if let Row::Summary(_) = table_row {
            sheet.merge_range(row, 0, row, LAST_COL - 1, &cells.name, &formats.summary_label)?;
            sheet.write_number_with_format(row, LAST_COL, to_number(cells.amount), &formats.summary_money)?;
            rows.summaries.push(row);
            row += 1;
            continue;
        }

        sheet.write_string_with_format(row, 0, &cells.position, &formats.cell)?;
        sheet.write_string_with_format(row, 1, &cells.name, &formats.cell_text)?;
        sheet.write_string_with_format(row, 2, "", &formats.cell)?;
        sheet.write_string_with_format(row, 3, &cells.quantity, &formats.cell)?;
        sheet.write_string_with_format(row, 4, cells.unit, &formats.cell)?;
        if let Some(unit_amount) = cells.unit_amount {
            sheet.write_number_with_format(row, 5, to_number(unit_amount), &formats.money)?;
        }
        sheet.write_number_with_format(row, 6, to_number(cells.amount), &formats.money)?;

        if let Some(bytes) = document.images.get(cells.image_ref.as_deref()) {
            match Image::new_from_buffer(bytes) {
                Ok(image) => {
                    sheet.set_row_height(row, IMAGE_ROW_HEIGHT)?;
                    sheet.insert_image(row, 2, &image.set_scale_to_size(100, 90, true))?;
                    rows.images += 1;
                }
                Err(e) => tracing::warn!(error = %e, row = %cells.position, "Product image is not a supported format, leaving the cell empty"),
            }
        }
        row += 1;
    }
    Ok(row)
}

fn write_footer(sheet: &mut Worksheet, document: &OfferDocument<'_>, mut row: u32, formats: &Formats) -> Result<u32, XlsxError> {
    row += 1;
    for term in &document.company.terms {
        sheet.merge_range(row, 0, row, LAST_COL, term, &formats.plain)?;
        row += 1;
    }
    row += 1;
    sheet.merge_range(row, 0, row, LAST_COL, &document.signature_line(), &formats.plain)?;
    Ok(row + 2)
}

impl DocumentRenderer for XlsxRenderer {
    fn render(&self, document: &OfferDocument<'_>) -> Result<Vec<u8>, AppError> {
        self.build(document)
            .map_err(|e| AppError::Render(format!("Failed to build spreadsheet: {}", e)))
    }

    fn content_type(&self) -> &'static str {
        XLSX_CONTENT_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageSet;
    use crate::pricing::Discount;
    use crate::pricing::tests::dec;
    use crate::render::tests::{company, long_layout, png_bytes, sample_layout, sample_layout_with_images};
    use chrono::NaiveDate;

    #[test]
    fn test_renders_a_zip_container() {
        let layout = sample_layout(Discount::Amount(dec("1000")));
        let company = company();
        let images = ImageSet::default();
        let document = OfferDocument {
            layout: &layout,
            company: &company,
            offer_number: 7,
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            address: Some("г. Краснодар, ул. Красная, 1"),
            images: &images,
        };

        let bytes = XlsxRenderer.render(&document).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(XlsxRenderer.content_type(), XLSX_CONTENT_TYPE);
    }

    #[test]
    fn test_invalid_image_bytes_do_not_fail_the_document() {
        let layout = sample_layout(Discount::None);
        let company = company();
        let mut images = ImageSet::default();
        images.logo = Some(b"not an image".to_vec());
        let document = OfferDocument {
            layout: &layout,
            company: &company,
            offer_number: 8,
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            address: None,
            images: &images,
        };
        assert!(XlsxRenderer.render(&document).is_ok());
    }

    #[test]
    fn test_pages_are_separated_by_manual_breaks() {
        let layout = long_layout(20);
        let company = company();
        let images = ImageSet::default();
        let document = OfferDocument {
            layout: &layout,
            company: &company,
            offer_number: 9,
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            address: None,
            images: &images,
        };

        let mut workbook = Workbook::new();
        let rows = write_sheet(workbook.add_worksheet(), &document).unwrap();

        assert_eq!(rows.table_headers.len(), 3);
        assert_eq!(rows.counters.len(), 3);
        assert_eq!(rows.breaks.len(), 2);
        for (page, brk) in rows.breaks.iter().enumerate() {
            // Each page ends with its counter; the next header follows the break.
            assert_eq!(rows.counters[page] + 1, *brk);
            assert!(rows.table_headers[page] < *brk);
            assert!(rows.table_headers[page + 1] >= *brk);
        }
        assert_eq!(rows.summaries.len(), 1);
        assert!(rows.summaries.iter().all(|r| *r > rows.breaks[1] && *r < rows.counters[2]));
    }

    #[test]
    fn test_logo_and_resolved_images_are_inserted() {
        let layout = sample_layout_with_images();
        let company = company();
        let mut images = ImageSet::default();
        images.logo = Some(png_bytes());
        images.images.insert("https://cdn/ok-1.png".to_string(), png_bytes());
        let document = OfferDocument {
            layout: &layout,
            company: &company,
            offer_number: 10,
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            address: None,
            images: &images,
        };

        let mut workbook = Workbook::new();
        let rows = write_sheet(workbook.add_worksheet(), &document).unwrap();
        assert_eq!(rows.images, 2);
        assert_eq!(rows.counters.len(), 1);
        assert!(rows.breaks.is_empty());
    }
}
