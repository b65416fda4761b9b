//! Offer totals and discount resolution.
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::AppError;
use crate::pricing::distribution::{overflow, Distribution};
use crate::pricing::OrderContext;

/// A discount is either a share of the equipment subtotal or a fixed sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Discount {
    #[default]
    None,
    Percent(Decimal),
    Amount(Decimal),
}

impl Discount {
    /// A positive fixed amount wins over a percent.
    pub fn resolve(percent: Decimal, amount: Decimal) -> Self {
        if amount > Decimal::ZERO {
            Discount::Amount(amount)
        } else if percent > Decimal::ZERO {
            Discount::Percent(percent)
        } else {
            Discount::None
        }
    }

    /// Discount value against the equipment subtotal, never the gross total.
    pub fn value(&self, equipment_subtotal: Decimal) -> Result<Decimal, AppError> {
        match self {
            Discount::None => Ok(Decimal::ZERO),
            Discount::Percent(p) => equipment_subtotal
                .checked_mul(*p)
                .map(|v| v / Decimal::ONE_HUNDRED)
                .ok_or_else(|| overflow("discount")),
            Discount::Amount(a) => Ok(*a),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    pub equipment_subtotal: Decimal,
    pub items_total: Decimal,
    pub installation_amount: Decimal,
    pub delivery_amount: Decimal,
    pub installation_line: Decimal,
    pub delivery_line: Decimal,
    pub gross_total: Decimal,
    pub discount_value: Decimal,
    pub amount_due: Decimal,
}

pub fn compute_totals(distribution: &Distribution, order: &OrderContext) -> Result<DocumentTotals, AppError> {
    let items_total = distribution
        .rows
        .iter()
        .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(r.line_total))
        .ok_or_else(|| overflow("items total"))?;

    let installation_line = if order.hide_installation {
        Decimal::ZERO
    } else {
        distribution.installation_amount
    };
    let delivery_line = if order.hide_delivery {
        Decimal::ZERO
    } else {
        order.delivery_amount
    };

    // Folded surcharges already live in items_total.
    let gross_total = items_total
        .checked_add(installation_line)
        .and_then(|v| v.checked_add(delivery_line))
        .ok_or_else(|| overflow("offer total"))?;

    let mut discount_value = order.discount.value(distribution.equipment_subtotal)?;
    if discount_value > gross_total {
        if !order.clamp_discount {
            return Err(AppError::DiscountExceedsTotal {
                discount: discount_value,
                total: gross_total,
            });
        }
        tracing::info!(%discount_value, %gross_total, "Discount clamped to the offer total");
        discount_value = gross_total;
    }

    let amount_due = gross_total
        .checked_sub(discount_value)
        .ok_or_else(|| overflow("amount due"))?;

    Ok(DocumentTotals {
        equipment_subtotal: distribution.equipment_subtotal,
        items_total,
        installation_amount: distribution.installation_amount,
        delivery_amount: order.delivery_amount,
        installation_line,
        delivery_line,
        gross_total,
        discount_value,
        amount_due,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::distribution::distribute;
    use crate::pricing::tests::{dec, sample_order};
    use crate::pricing::InstallationMode;

    fn totals_for(order: &OrderContext) -> Result<DocumentTotals, AppError> {
        let dist = distribute(order, &[])?;
        compute_totals(&dist, order)
    }

    #[test]
    fn test_discount_resolution_prefers_amount() {
        assert_eq!(Discount::resolve(dec("10"), dec("500")), Discount::Amount(dec("500")));
        assert_eq!(Discount::resolve(dec("10"), Decimal::ZERO), Discount::Percent(dec("10")));
        assert_eq!(Discount::resolve(Decimal::ZERO, Decimal::ZERO), Discount::None);
    }

    #[test]
    fn test_visible_surcharges_are_added_once() {
        let totals = totals_for(&sample_order()).unwrap();
        assert_eq!(totals.equipment_subtotal, dec("8500"));
        assert_eq!(totals.installation_line, dec("850"));
        assert_eq!(totals.delivery_line, dec("500"));
        assert_eq!(totals.gross_total, dec("9850"));
        assert_eq!(totals.discount_value, Decimal::ZERO);
        assert_eq!(totals.amount_due, dec("9850"));
    }

    #[test]
    fn test_folded_surcharges_are_not_double_counted() {
        let mut order = sample_order();
        order.hide_installation = true;
        order.hide_delivery = true;
        let totals = totals_for(&order).unwrap();

        assert_eq!(totals.equipment_subtotal, dec("8500"));
        assert_eq!(totals.installation_line, Decimal::ZERO);
        assert_eq!(totals.delivery_line, Decimal::ZERO);
        assert!((totals.gross_total - dec("9850")).abs() <= dec("0.01"));
    }

    #[test]
    fn test_percent_discount_uses_equipment_subtotal() {
        let mut order = sample_order();
        order.discount = Discount::Percent(dec("10"));
        let totals = totals_for(&order).unwrap();
        assert_eq!(totals.discount_value, dec("850"));
        assert_eq!(totals.amount_due, dec("9000"));
        assert!(totals.discount_value <= totals.equipment_subtotal);
    }

    #[test]
    fn test_fixed_discount() {
        let mut order = sample_order();
        order.discount = Discount::Amount(dec("1000"));
        let totals = totals_for(&order).unwrap();
        assert_eq!(totals.amount_due, dec("8850"));
    }

    #[test]
    fn test_discount_above_total_is_rejected_without_clamp() {
        let mut order = sample_order();
        order.discount = Discount::Amount(dec("20000"));
        order.clamp_discount = false;
        let err = totals_for(&order).unwrap_err();
        assert!(matches!(err, AppError::DiscountExceedsTotal { .. }));
        assert_eq!(err.status(), 422);
    }

    #[test]
    fn test_huge_amounts_are_invalid_input() {
        let mut order = sample_order();
        order.items.truncate(1);
        order.items[0].unit_price = dec("70000000000000000000000000000");
        order.items[0].quantity = 1;
        order.installation_percent = Decimal::ZERO;
        order.delivery_amount = Decimal::ZERO;

        order.discount = Discount::Percent(dec("50"));
        let err = totals_for(&order).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        order.discount = Discount::None;
        order.installation_mode = InstallationMode::Fixed;
        order.installation_amount = dec("70000000000000000000000000000");
        let err = totals_for(&order).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_discount_above_total_is_clamped_to_zero_due() {
        let mut order = sample_order();
        order.discount = Discount::Amount(dec("20000"));
        order.clamp_discount = true;
        let totals = totals_for(&order).unwrap();
        assert_eq!(totals.discount_value, dec("9850"));
        assert_eq!(totals.amount_due, Decimal::ZERO);
    }
}
