//! Page planning for the offer table.
//!
//! Layout runs in two passes. [`OfferLayout::plan`] decides which rows go on
//! which page and therefore how many pages there are; [`OfferLayout::pages`]
//! then hands the pages out one by one, each knowing the final page count.
//! Nothing here draws; renderers walk the pages and write cells.
use std::ops::Range;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::AppError;
use crate::pricing::distribution::ComputedRow;
use crate::pricing::totals::Discount;
use crate::pricing::PricedOrder;

/// Table header repeated at the top of every page.
pub const COLUMNS: [&str; 7] = ["№", "Наименование", "Рисунок", "Кол-во", "Ед. изм", "Цена, руб", "Сумма, руб"];

/// Most summary rows an offer can have (subtotal, discount, amount due).
const MAX_SUMMARY_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SurchargeKind {
    Installation,
    Delivery,
}

/// Installation or delivery shown as its own numbered row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurchargeRow {
    pub position: usize,
    pub kind: SurchargeKind,
    pub amount: Decimal,
    /// Installation percent for the row label, when the cost came from a percent.
    pub percent: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SummaryKind {
    Subtotal,
    Discount,
    AmountDue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub kind: SummaryKind,
    pub amount: Decimal,
    pub percent: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Row {
    Item(ComputedRow),
    Surcharge(SurchargeRow),
    Summary(SummaryRow),
}

/// Row capacities of the printed pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Rows on page one, below the company header block.
    pub first_page_rows: usize,
    pub page_rows: usize,
    /// The summary joins the last body page only when that page has at
    /// least `max(summary rows, min_trailing_rows)` free rows.
    pub min_trailing_rows: usize,
}

impl LayoutConfig {
    pub fn new(first_page_rows: usize, page_rows: usize, min_trailing_rows: usize) -> Result<Self, AppError> {
        if first_page_rows == 0 || page_rows == 0 {
            return Err(AppError::Configuration("Page capacities must be at least one row".to_string()));
        }
        if page_rows < MAX_SUMMARY_ROWS.max(min_trailing_rows) {
            return Err(AppError::Configuration(format!(
                "A page of {} rows cannot hold the summary block and {} trailing rows",
                page_rows, min_trailing_rows
            )));
        }
        Ok(Self { first_page_rows, page_rows, min_trailing_rows })
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { first_page_rows: 6, page_rows: 10, min_trailing_rows: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<'a> {
    pub number: usize,
    pub total: usize,
    pub rows: &'a [Row],
}

impl Page<'_> {
    pub fn is_last(&self) -> bool {
        self.number == self.total
    }

    pub fn counter_label(&self) -> String {
        format!("Страница {} из {}", self.number, self.total)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfferLayout {
    rows: Vec<Row>,
    pages: Vec<Range<usize>>,
}

impl OfferLayout {
    /// First pass: build the rows and fix the page breaks.
    pub fn plan(priced: &PricedOrder, config: &LayoutConfig) -> Self {
        let mut rows: Vec<Row> = priced.rows.iter().cloned().map(Row::Item).collect();
        let mut next_position = rows.len() + 1;

        let totals = &priced.totals;
        if totals.installation_line > Decimal::ZERO {
            rows.push(Row::Surcharge(SurchargeRow {
                position: next_position,
                kind: SurchargeKind::Installation,
                amount: totals.installation_line,
                percent: priced.installation_percent,
            }));
            next_position += 1;
        }
        if totals.delivery_line > Decimal::ZERO {
            rows.push(Row::Surcharge(SurchargeRow {
                position: next_position,
                kind: SurchargeKind::Delivery,
                amount: totals.delivery_line,
                percent: None,
            }));
        }
        let body_len = rows.len();

        rows.push(Row::Summary(SummaryRow {
            kind: SummaryKind::Subtotal,
            amount: totals.gross_total,
            percent: None,
        }));
        if totals.discount_value > Decimal::ZERO {
            let percent = match priced.discount {
                Discount::Percent(p) => Some(p),
                _ => None,
            };
            rows.push(Row::Summary(SummaryRow {
                kind: SummaryKind::Discount,
                amount: totals.discount_value,
                percent,
            }));
            rows.push(Row::Summary(SummaryRow {
                kind: SummaryKind::AmountDue,
                amount: totals.amount_due,
                percent: None,
            }));
        }
        let summary_len = rows.len() - body_len;

        let pages = paginate(body_len, summary_len, config);
        Self { rows, pages }
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Second pass: the pages in print order.
    pub fn pages(&self) -> impl Iterator<Item = Page<'_>> + '_ {
        let total = self.pages.len();
        self.pages.iter().enumerate().map(move |(idx, range)| Page {
            number: idx + 1,
            total,
            rows: &self.rows[range.clone()],
        })
    }
}

/// Split `body` rows over pages and place the `summary` block after them.
fn paginate(body: usize, summary: usize, config: &LayoutConfig) -> Vec<Range<usize>> {
    let mut pages = Vec::new();
    let mut start = 0;
    let mut capacity = config.first_page_rows;
    loop {
        let end = (start + capacity).min(body);
        pages.push(start..end);
        start = end;
        if start >= body {
            break;
        }
        capacity = config.page_rows;
    }

    let needed = summary.max(config.min_trailing_rows);
    match pages.last_mut() {
        Some(last) if capacity - last.len() >= needed => last.end += summary,
        Some(last) if last.is_empty() => *last = body..body + summary,
        _ => pages.push(body..body + summary),
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::tests::{dec, sample_order};
    use crate::pricing::{price_order, LineItem};

    fn config() -> LayoutConfig {
        LayoutConfig::new(6, 10, 1).unwrap()
    }

    fn order_with_items(count: usize) -> crate::pricing::OrderContext {
        let mut order = sample_order();
        order.delivery_amount = Decimal::ZERO;
        order.installation_percent = Decimal::ZERO;
        order.items = (0..count)
            .map(|i| LineItem {
                article: Some(format!("{}", 1000 + i)),
                name: format!("Item {}", i + 1),
                unit_price: dec("100"),
                quantity: 1,
                image_ref: None,
            })
            .collect();
        order
    }

    fn plan_with(order: &crate::pricing::OrderContext, config: &LayoutConfig) -> OfferLayout {
        let priced = price_order(order, &[]).unwrap();
        OfferLayout::plan(&priced, config)
    }

    fn plan(order: &crate::pricing::OrderContext) -> OfferLayout {
        plan_with(order, &config())
    }

    #[test]
    fn test_layout_config_validation() {
        assert!(LayoutConfig::new(0, 10, 2).is_err());
        assert!(LayoutConfig::new(6, 2, 0).is_err());
        assert!(LayoutConfig::new(6, 4, 5).is_err());
        assert!(LayoutConfig::new(1, 3, 3).is_ok());
    }

    #[test]
    fn test_single_page_offer_with_surcharge_rows() {
        let layout = plan(&sample_order());
        assert_eq!(layout.total_pages(), 1);

        let pages: Vec<Page<'_>> = layout.pages().collect();
        let rows = pages[0].rows;
        assert_eq!(rows.len(), 6);
        assert!(matches!(&rows[3], Row::Surcharge(s) if s.kind == SurchargeKind::Installation && s.position == 4));
        assert!(matches!(&rows[4], Row::Surcharge(s) if s.kind == SurchargeKind::Delivery && s.position == 5));
        assert!(matches!(&rows[5], Row::Summary(s) if s.kind == SummaryKind::Subtotal && s.amount == dec("9850")));
        assert_eq!(pages[0].counter_label(), "Страница 1 из 1");
    }

    #[test]
    fn test_folded_surcharges_have_no_rows() {
        let mut order = sample_order();
        order.hide_installation = true;
        order.hide_delivery = true;
        let layout = plan(&order);
        assert!(layout.rows().iter().all(|r| !matches!(r, Row::Surcharge(_))));
    }

    #[test]
    fn test_page_count_follows_both_capacities() {
        // 20 rows: 6 + 10 + 4, summary fits after the 4.
        let layout = plan(&order_with_items(20));
        assert_eq!(layout.total_pages(), 3);
        let sizes: Vec<usize> = layout.pages().map(|p| p.rows.len()).collect();
        assert_eq!(sizes, vec![6, 10, 5]);
    }

    #[test]
    fn test_summary_moves_to_own_page_when_no_room_is_left() {
        // 16 rows: 6 + 10, page two is full.
        let layout = plan(&order_with_items(16));
        assert_eq!(layout.total_pages(), 3);

        let pages: Vec<Page<'_>> = layout.pages().collect();
        let last = &pages[2];
        assert!(last.is_last());
        assert_eq!(last.total, 3);
        assert!(last.rows.iter().all(|r| matches!(r, Row::Summary(_))));
    }

    #[test]
    fn test_trailing_threshold_forces_summary_page() {
        // Five body rows leave one free row on page one; the footer wants two.
        let layout = plan_with(&sample_order(), &LayoutConfig::new(6, 10, 2).unwrap());
        assert_eq!(layout.total_pages(), 2);
        let sizes: Vec<usize> = layout.pages().map(|p| p.rows.len()).collect();
        assert_eq!(sizes, vec![5, 1]);
    }

    #[test]
    fn test_summary_rows_only_on_final_page() {
        let mut order = order_with_items(23);
        order.discount = Discount::Percent(dec("5"));
        let layout = plan(&order);

        for page in layout.pages() {
            let has_summary = page.rows.iter().any(|r| matches!(r, Row::Summary(_)));
            assert_eq!(has_summary, page.is_last());
            assert_eq!(page.total, layout.total_pages());
        }
        let summary: Vec<SummaryKind> = layout
            .rows()
            .iter()
            .filter_map(|r| match r {
                Row::Summary(s) => Some(s.kind),
                _ => None,
            })
            .collect();
        assert_eq!(summary, vec![SummaryKind::Subtotal, SummaryKind::Discount, SummaryKind::AmountDue]);
    }

    #[test]
    fn test_empty_body_still_yields_one_page() {
        let pages = paginate(0, 1, &config());
        assert_eq!(pages, vec![0..1]);
    }

    #[test]
    fn test_empty_body_with_tight_first_page_has_no_blank_page() {
        let tight = LayoutConfig::new(2, 10, 1).unwrap();
        let pages = paginate(0, 3, &tight);
        assert_eq!(pages, vec![0..3]);
    }
}
