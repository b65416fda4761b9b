//! Commercial-offer pricing: normalization, surcharge distribution, totals
//! and page layout. Everything in here is pure; collaborators that fetch
//! images or draw sequence numbers live outside this module.

pub mod distribution;
pub mod layout;
pub mod money;
pub mod totals;

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub use distribution::{ComputedRow, ExclusionRule};
pub use layout::{LayoutConfig, OfferLayout, Page, Row};
pub use totals::{Discount, DocumentTotals};

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub article: Option<String>,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub image_ref: Option<String>,
}

impl LineItem {
    /// `unit_price * quantity`, before any surcharge is folded in.
    pub fn line_sum(&self) -> Result<Decimal, AppError> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity))
            .ok_or_else(|| AppError::invalid(format!("Line sum of '{}' is too large", self.name)))
    }
}

/// Where the installation cost comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallationMode {
    /// A percent of the non-excluded equipment subtotal.
    #[default]
    Percent,
    /// The explicit amount sent by the caller.
    Fixed,
}

impl FromStr for InstallationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percent" => Ok(InstallationMode::Percent),
            "fixed" => Ok(InstallationMode::Fixed),
            other => Err(format!("unknown installation mode '{}'", other)),
        }
    }
}

/// Everything the pricing core needs about one offer.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderContext {
    pub items: Vec<LineItem>,
    pub installation_mode: InstallationMode,
    pub installation_percent: Decimal,
    pub installation_amount: Decimal,
    pub delivery_amount: Decimal,
    pub hide_installation: bool,
    pub hide_delivery: bool,
    pub discount: Discount,
    /// Clamp an oversized discount instead of rejecting the offer.
    pub clamp_discount: bool,
    pub address: Option<String>,
    /// Drawn from the sequence provider right before rendering.
    pub sequence_number: u64,
}

/// Priced rows and totals of one offer.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub rows: Vec<ComputedRow>,
    pub totals: DocumentTotals,
    /// Percent shown in the installation row label.
    pub installation_percent: Option<Decimal>,
    pub discount: Discount,
}

pub fn price_order(order: &OrderContext, exclusions: &[ExclusionRule]) -> Result<PricedOrder, AppError> {
    let distribution = distribution::distribute(order, exclusions)?;
    let totals = totals::compute_totals(&distribution, order)?;

    let installation_percent = match order.installation_mode {
        InstallationMode::Percent if order.installation_percent > Decimal::ZERO => Some(order.installation_percent),
        _ => None,
    };

    Ok(PricedOrder {
        rows: distribution.rows,
        totals,
        installation_percent,
        discount: order.discount,
    })
}
