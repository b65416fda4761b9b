//! Cost distribution: folds hidden installation and delivery costs into
//! per-unit item prices.
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::AppError;
use crate::pricing::{InstallationMode, OrderContext};

/// Marks line items that never carry an installation surcharge
/// (surfacing, fences and other goods installed by the customer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionRule {
    /// Numeric articles in `start..=end`.
    ArticleRange { start: u64, end: u64 },
}

impl ExclusionRule {
    pub fn article_range(start: u64, end: u64) -> Self {
        ExclusionRule::ArticleRange { start: start.min(end), end: start.max(end) }
    }

    pub fn matches(&self, article: Option<&str>) -> bool {
        let Some(number) = article.and_then(|a| a.trim().parse::<u64>().ok()) else {
            return false;
        };
        match self {
            ExclusionRule::ArticleRange { start, end } => (*start..=*end).contains(&number),
        }
    }
}

impl FromStr for ExclusionRule {
    type Err = String;

    /// Accepts `"9000-9999"` or a single article such as `"9027"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|_| format!("'{}' is not a numeric article", part.trim()))
        };
        match s.split_once('-') {
            Some((start, end)) => Ok(ExclusionRule::article_range(parse(start)?, parse(end)?)),
            None => {
                let article = parse(s)?;
                Ok(ExclusionRule::article_range(article, article))
            }
        }
    }
}

/// One priced table row. Built once by [`distribute`] and never changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedRow {
    pub position: usize,
    pub article: Option<String>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub display_price: Decimal,
    pub line_total: Decimal,
    pub excluded: bool,
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub rows: Vec<ComputedRow>,
    /// Sum of the unadjusted line sums, before any folding.
    pub equipment_subtotal: Decimal,
    /// Sum of the unadjusted line sums of items not excluded from installation.
    pub installation_base: Decimal,
    pub installation_amount: Decimal,
    pub installation_per_unit: Decimal,
    pub delivery_per_unit: Decimal,
}

pub(crate) fn overflow(what: &str) -> AppError {
    AppError::invalid(format!("The {} is too large to compute", what))
}

fn per_unit_share(amount: Decimal, units: u64, what: &str) -> Result<Decimal, AppError> {
    if units == 0 {
        tracing::warn!(%amount, surcharge = what, "No units to carry the surcharge, it is dropped from item prices");
        return Ok(Decimal::ZERO);
    }
    amount.checked_div(Decimal::from(units)).ok_or_else(|| overflow(what))
}

/// Compute the effective price of every line item.
///
/// Installation is spread over the units of non-excluded items only, delivery
/// over every unit. Costs that are not hidden stay out of the item prices and
/// are shown as their own rows later.
pub fn distribute(order: &OrderContext, exclusions: &[ExclusionRule]) -> Result<Distribution, AppError> {
    let excluded: Vec<bool> = order
        .items
        .iter()
        .map(|item| exclusions.iter().any(|rule| rule.matches(item.article.as_deref())))
        .collect();

    let mut equipment_subtotal = Decimal::ZERO;
    let mut installation_base = Decimal::ZERO;
    let mut eligible_units: u64 = 0;
    let mut total_units: u64 = 0;

    for (item, &is_excluded) in order.items.iter().zip(&excluded) {
        let line_sum = item.line_sum()?;
        equipment_subtotal = equipment_subtotal.checked_add(line_sum).ok_or_else(|| overflow("equipment subtotal"))?;
        total_units += u64::from(item.quantity);
        if !is_excluded {
            installation_base = installation_base.checked_add(line_sum).ok_or_else(|| overflow("installation base"))?;
            eligible_units += u64::from(item.quantity);
        }
    }

    let installation_amount = match order.installation_mode {
        InstallationMode::Percent => installation_base
            .checked_mul(order.installation_percent)
            .map(|v| v / Decimal::ONE_HUNDRED)
            .ok_or_else(|| overflow("installation cost"))?,
        InstallationMode::Fixed => order.installation_amount,
    };

    let installation_per_unit = if order.hide_installation && installation_amount > Decimal::ZERO {
        per_unit_share(installation_amount, eligible_units, "installation")?
    } else {
        Decimal::ZERO
    };

    let delivery_per_unit = if order.hide_delivery && order.delivery_amount > Decimal::ZERO {
        per_unit_share(order.delivery_amount, total_units, "delivery")?
    } else {
        Decimal::ZERO
    };

    let rows = order
        .items
        .iter()
        .zip(&excluded)
        .enumerate()
        .map(|(idx, (item, &is_excluded))| -> Result<ComputedRow, AppError> {
            let installation_share = if is_excluded { Decimal::ZERO } else { installation_per_unit };
            let display_price = item
                .unit_price
                .checked_add(installation_share)
                .and_then(|v| v.checked_add(delivery_per_unit))
                .ok_or_else(|| overflow("item price"))?;
            let line_total = display_price
                .checked_mul(Decimal::from(item.quantity))
                .ok_or_else(|| overflow("line total"))?;
            Ok(ComputedRow {
                position: idx + 1,
                article: item.article.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                display_price,
                line_total,
                excluded: is_excluded,
                image_ref: item.image_ref.clone(),
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Distribution {
        rows,
        equipment_subtotal,
        installation_base,
        installation_amount,
        installation_per_unit,
        delivery_per_unit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::tests::{dec, sample_order};

    #[test]
    fn test_exclusion_rule_parsing_and_matching() {
        let range: ExclusionRule = "9000-9999".parse().unwrap();
        assert!(range.matches(Some("9027")));
        assert!(range.matches(Some(" 9000 ")));
        assert!(!range.matches(Some("8999")));
        assert!(!range.matches(Some("A-9027")));
        assert!(!range.matches(None));

        let single: ExclusionRule = "9027".parse().unwrap();
        assert_eq!(single, ExclusionRule::article_range(9027, 9027));
        assert!("90x0-9999".parse::<ExclusionRule>().is_err());
    }

    #[test]
    fn test_visible_surcharges_do_not_touch_prices() {
        let order = sample_order();
        let dist = distribute(&order, &[]).unwrap();

        assert_eq!(dist.equipment_subtotal, dec("8500"));
        assert_eq!(dist.installation_amount, dec("850"));
        assert_eq!(dist.installation_per_unit, Decimal::ZERO);
        assert_eq!(dist.delivery_per_unit, Decimal::ZERO);
        for row in &dist.rows {
            assert_eq!(row.display_price, row.unit_price);
        }
        assert_eq!(dist.rows[2].line_total, dec("4500"));
    }

    #[test]
    fn test_hidden_surcharges_are_spread_per_unit() {
        let mut order = sample_order();
        order.hide_installation = true;
        order.hide_delivery = true;
        let dist = distribute(&order, &[]).unwrap();

        // 850 over 6 units and 500 over 6 units.
        let expected = dec("1000") + dec("850") / dec("6") + dec("500") / dec("6");
        assert_eq!(dist.rows[0].display_price, expected);
        assert_eq!(dist.equipment_subtotal, dec("8500"));

        let folded: Decimal = dist.rows.iter().map(|r| r.line_total).sum();
        assert!((folded - dec("9850")).abs() <= dec("0.01"));
    }

    #[test]
    fn test_excluded_items_carry_delivery_only() {
        let mut order = sample_order();
        order.items[2].article = Some("9027".to_string());
        order.hide_installation = true;
        order.hide_delivery = true;
        let rules = [ExclusionRule::article_range(9000, 9999)];
        let dist = distribute(&order, &rules).unwrap();

        // Installation base excludes 1500 x 3.
        assert_eq!(dist.installation_base, dec("4000"));
        assert_eq!(dist.installation_amount, dec("400"));
        assert_eq!(dist.installation_per_unit, dec("400") / dec("3"));

        let excluded = &dist.rows[2];
        assert!(excluded.excluded);
        assert_eq!(excluded.display_price, excluded.unit_price + dist.delivery_per_unit);

        let folded: Decimal = dist.rows.iter().map(|r| r.line_total).sum();
        assert!((folded - dec("9400")).abs() <= dec("0.01"));
    }

    #[test]
    fn test_fixed_installation_mode_ignores_percent() {
        let mut order = sample_order();
        order.installation_mode = InstallationMode::Fixed;
        order.installation_amount = dec("1200");
        let dist = distribute(&order, &[]).unwrap();
        assert_eq!(dist.installation_amount, dec("1200"));
    }

    #[test]
    fn test_zero_denominator_yields_zero_share() {
        let mut order = sample_order();
        for item in &mut order.items {
            item.article = Some("9500".to_string());
        }
        order.installation_mode = InstallationMode::Fixed;
        order.installation_amount = dec("1000");
        order.hide_installation = true;
        let dist = distribute(&order, &[ExclusionRule::article_range(9000, 9999)]).unwrap();

        assert_eq!(dist.installation_per_unit, Decimal::ZERO);
        for row in &dist.rows {
            assert_eq!(row.display_price, row.unit_price);
        }
    }

    #[test]
    fn test_folded_price_overflow_is_invalid_input() {
        let mut order = sample_order();
        order.items.truncate(1);
        order.items[0].unit_price = dec("79228162514264337593543950000");
        order.items[0].quantity = 1;
        order.installation_percent = Decimal::ZERO;
        order.delivery_amount = dec("1000");
        order.hide_delivery = true;

        let err = distribute(&order, &[]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
