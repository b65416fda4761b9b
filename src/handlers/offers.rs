//! Commercial offer generation and preview.
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::archive::{archive_key, DocumentArchive};
use crate::config::OfferSettings;
use crate::error::AppError;
use crate::images::{fetch_optional, resolve_images, ImageFetcher};
use crate::models::{DocumentFormat, OfferRequest};
use crate::pricing::{price_order, DocumentTotals, OfferLayout, Page, Row};
use crate::render::{document_filename, DocumentRenderer, OfferDocument, PdfRenderer, XlsxRenderer};
use crate::sequence::{draw_number, SequenceProvider};

/// Collaborators of the offer pipeline.
pub struct OfferServices<'a> {
    pub settings: &'a OfferSettings,
    pub sequence: &'a dyn SequenceProvider,
    pub fetcher: &'a dyn ImageFetcher,
    pub archive: Option<&'a dyn DocumentArchive>,
}

#[derive(Debug, Clone)]
pub struct GeneratedOffer {
    pub offer_number: u64,
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Price, lay out and render one offer.
///
/// # Flow
/// 1. Validate and price the request. Invalid input fails here, before an
///    offer number is drawn.
/// 2. Plan the pages, then fetch product images and the logo. Unreachable
///    images leave empty cells.
/// 3. Draw the offer number; an unavailable counter falls back to a
///    time-derived number.
/// 4. Render, then archive the bytes when a bucket is configured. A failed
///    upload is only logged.
pub async fn handle_generate_offer(
    request: OfferRequest,
    services: &OfferServices<'_>,
    now: DateTime<Utc>,
) -> Result<GeneratedOffer, AppError> {
    let settings = services.settings;
    let format = request.format.unwrap_or_default();
    let mut order = request.into_order(settings)?;

    let priced = price_order(&order, &settings.exclusions)?;
    let layout = OfferLayout::plan(&priced, &settings.layout);

    let image_refs: Vec<&str> = priced.rows.iter().filter_map(|r| r.image_ref.as_deref()).collect();
    let images = resolve_images(services.fetcher, image_refs, settings.logo_url.as_deref()).await;

    order.sequence_number = draw_number(services.sequence, now).await;

    let renderer: Box<dyn DocumentRenderer> = match format {
        DocumentFormat::Xlsx => Box::new(XlsxRenderer),
        DocumentFormat::Pdf => {
            let font = fetch_optional(services.fetcher, settings.font_url.as_deref(), "font").await;
            Box::new(PdfRenderer::new(font))
        }
    };

    let document = OfferDocument {
        layout: &layout,
        company: &settings.company,
        offer_number: order.sequence_number,
        date: now.date_naive(),
        address: order.address.as_deref(),
        images: &images,
    };
    let bytes = renderer.render(&document)?;
    let filename = document_filename(order.sequence_number, format);

    if let Some(archive) = services.archive {
        let key = archive_key(now.year(), &filename);
        if let Err(e) = archive.store(&key, &bytes, renderer.content_type()).await {
            tracing::warn!(error = %e, key = %key, "Offer archive upload failed");
        }
    }

    tracing::info!(
        offer_number = order.sequence_number,
        format = format.extension(),
        pages = layout.total_pages(),
        amount_due = %priced.totals.amount_due,
        size = bytes.len(),
        "Commercial offer generated"
    );

    Ok(GeneratedOffer {
        offer_number: order.sequence_number,
        filename,
        content_type: renderer.content_type(),
        bytes,
    })
}

#[derive(Debug, Serialize)]
struct OfferPreview<'a> {
    rows: &'a [Row],
    totals: &'a DocumentTotals,
    pages: Vec<Page<'a>>,
}

/// Same pricing and layout as [`handle_generate_offer`], returned as JSON.
/// Draws no number and fetches nothing.
pub fn handle_offer_preview(request: OfferRequest, settings: &OfferSettings) -> Result<Value, AppError> {
    let order = request.into_order(settings)?;
    let priced = price_order(&order, &settings.exclusions)?;
    let layout = OfferLayout::plan(&priced, &settings.layout);

    let preview = OfferPreview {
        rows: layout.rows(),
        totals: &priced.totals,
        pages: layout.pages().collect(),
    };
    serde_json::to_value(&preview).map_err(|e| AppError::Render(format!("Failed to serialize preview: {}", e)))
}
