//! Document renderers. They walk an [`OfferLayout`] page by page and draw
//! what the layout already decided; no pricing happens here.
pub mod pdf;
pub mod xlsx;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::CompanyProfile;
use crate::error::AppError;
use crate::images::ImageSet;
use crate::models::DocumentFormat;
use crate::pricing::layout::{SummaryKind, SurchargeKind};
use crate::pricing::money::format_money;
use crate::pricing::{OfferLayout, Row};

pub use pdf::PdfRenderer;
pub use xlsx::XlsxRenderer;

/// Everything a renderer needs for one offer.
pub struct OfferDocument<'a> {
    pub layout: &'a OfferLayout,
    pub company: &'a CompanyProfile,
    pub offer_number: u64,
    pub date: NaiveDate,
    pub address: Option<&'a str>,
    pub images: &'a ImageSet,
}

impl OfferDocument<'_> {
    pub fn title(&self) -> String {
        format!(
            "Коммерческое предложение № {:04} от {}",
            self.offer_number,
            self.date.format("%d.%m.%Y")
        )
    }

    pub fn signature_line(&self) -> String {
        format!("Индивидуальный предприниматель ____________________ /{}/", self.company.signatory)
    }
}

pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &OfferDocument<'_>) -> Result<Vec<u8>, AppError>;

    fn content_type(&self) -> &'static str;
}

pub fn document_filename(offer_number: u64, format: DocumentFormat) -> String {
    format!("commercial_offer_{:04}.{}", offer_number, format.extension())
}

fn format_percent(percent: Decimal) -> String {
    percent.normalize().to_string()
}

/// Text of one table row, column by column. Item names carry the article
/// on a line of their own. Summary rows only fill `name` (the label) and
/// `total`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCells {
    pub position: String,
    pub name: String,
    pub image_ref: Option<String>,
    pub quantity: String,
    pub unit: &'static str,
    pub price: String,
    pub total: String,
    pub amount: Decimal,
    pub unit_amount: Option<Decimal>,
}

pub fn row_cells(row: &Row) -> RowCells {
    match row {
        Row::Item(item) => RowCells {
            position: item.position.to_string(),
            name: match item.article.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
                Some(article) => format!("{}\n{}", article, item.name),
                None => item.name.clone(),
            },
            image_ref: item.image_ref.clone(),
            quantity: item.quantity.to_string(),
            unit: "шт",
            price: format_money(item.display_price),
            total: format_money(item.line_total),
            amount: item.line_total,
            unit_amount: Some(item.display_price),
        },
        Row::Surcharge(surcharge) => {
            let name = match (surcharge.kind, surcharge.percent) {
                (SurchargeKind::Installation, Some(p)) => format!("Монтаж ({}%)", format_percent(p)),
                (SurchargeKind::Installation, None) => "Монтаж".to_string(),
                (SurchargeKind::Delivery, _) => "Доставка".to_string(),
            };
            RowCells {
                position: surcharge.position.to_string(),
                name,
                image_ref: None,
                quantity: "1".to_string(),
                unit: "усл",
                price: format_money(surcharge.amount),
                total: format_money(surcharge.amount),
                amount: surcharge.amount,
                unit_amount: Some(surcharge.amount),
            }
        }
        Row::Summary(summary) => {
            let name = match (summary.kind, summary.percent) {
                (SummaryKind::Subtotal, _) => "Итого:".to_string(),
                (SummaryKind::Discount, Some(p)) => format!("Скидка ({}%):", format_percent(p)),
                (SummaryKind::Discount, None) => "Скидка:".to_string(),
                (SummaryKind::AmountDue, _) => "Итого с учетом скидки:".to_string(),
            };
            RowCells {
                position: String::new(),
                name,
                image_ref: None,
                quantity: String::new(),
                unit: "",
                price: String::new(),
                total: format_money(summary.amount),
                amount: summary.amount,
                unit_amount: None,
            }
        }
    }
}
