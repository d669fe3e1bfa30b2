//! Snapshot types and aggregate computation.
//!
//! A snapshot is a pure function of `(event set, period)` at the moment of
//! computation: it is never mutated after creation, only replaced. The
//! engine hands it out behind an `Arc`, so a cache hit returns the identical
//! object, not merely an equal one.

use crate::insights;
use crate::period::Period;
use crate::series::{self, SeriesBucket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vendwatch_core::SaleEvent;

/// Cap on products/categories carried in a snapshot. Presentation layers
/// apply their own tighter cap (top 8 + "Others") downstream.
pub const TOP_N: usize = 10;

/// Per-product aggregate within one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStat {
    /// Product name, verbatim post-enrichment (no case folding).
    pub name: String,
    /// Catalog emoji of the first event seen for this product.
    pub emoji: String,
    /// Number of sales.
    pub count: u64,
    /// Summed price.
    pub revenue: f64,
    /// Share of total sales, 0..=1.
    pub share: f64,
}

/// Per-category aggregate within one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    /// Category slug.
    pub category: String,
    /// Number of sales.
    pub count: u64,
    /// Summed price.
    pub revenue: f64,
    /// Share of total sales, 0..=1.
    pub share: f64,
}

/// Period-over-period comparison against the immediately preceding
/// equivalent window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    /// Percent change in sale count.
    pub count_change_pct: f64,
    /// Percent change in revenue.
    pub revenue_change_pct: f64,
    /// Percent change in average purchase.
    pub average_change_pct: f64,
    /// Sale count in the previous window.
    pub previous_count: u64,
    /// Revenue in the previous window.
    pub previous_revenue: f64,
}

/// A memoized, derived view over the events of one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The reporting period this snapshot covers.
    pub period: Period,
    /// Total number of sales in the window.
    pub total_sales: u64,
    /// Summed price over the window.
    pub total_revenue: f64,
    /// Mean price (0 when empty).
    pub average_price: f64,
    /// Smallest price (0 when empty).
    pub min_price: f64,
    /// Largest price (0 when empty).
    pub max_price: f64,
    /// Median price (0 when empty).
    pub median_price: f64,
    /// Top products by count, descending, capped at [`TOP_N`].
    pub top_products: Vec<ProductStat>,
    /// Top categories by count, descending, capped at [`TOP_N`].
    pub top_categories: Vec<CategoryStat>,
    /// Sales per hour of day (24 buckets).
    pub hourly: [u64; 24],
    /// Sales per day of week (7 buckets, 0 = Sunday).
    pub by_weekday: [u64; 7],
    /// Time-bucketed series; granularity depends on the period.
    pub series: Vec<SeriesBucket>,
    /// Generated insight messages, at most 5, in rule order.
    pub insights: Vec<String>,
    /// Comparison against the preceding window; `None` for `All`.
    pub comparison: Option<PeriodComparison>,
    /// When this snapshot was computed (cache expiry reference).
    pub computed_at: DateTime<Utc>,
}

impl Snapshot {
    /// Compute a snapshot from the window's events.
    ///
    /// `events` is the period-filtered slice of the working set, in working
    /// set order (most recent first) — tie-breaks in the top-N rankings
    /// follow that input order. `previous` holds the events of the
    /// immediately preceding equivalent window, empty for [`Period::All`].
    #[must_use]
    pub fn compute(
        period: Period,
        events: &[SaleEvent],
        previous: &[SaleEvent],
        now: DateTime<Utc>,
    ) -> Self {
        let total_sales = events.len() as u64;
        let total_revenue: f64 = events.iter().map(|e| e.price).sum();
        let average_price = if events.is_empty() {
            0.0
        } else {
            total_revenue / events.len() as f64
        };

        let mut prices: Vec<f64> = events.iter().map(|e| e.price).collect();
        prices.sort_by(f64::total_cmp);
        let min_price = prices.first().copied().unwrap_or(0.0);
        let max_price = prices.last().copied().unwrap_or(0.0);
        let median_price = median(&prices);

        let top_products = top_products(events, total_sales);
        let top_categories = top_categories(events, total_sales);

        let mut hourly = [0_u64; 24];
        let mut by_weekday = [0_u64; 7];
        for event in events {
            if let Some(bucket) = hourly.get_mut(event.hour as usize) {
                *bucket += 1;
            }
            if let Some(bucket) = by_weekday.get_mut(event.day_of_week as usize) {
                *bucket += 1;
            }
        }

        let series = series::build_series(period, events);

        let comparison = if period == Period::All {
            None
        } else {
            Some(insights::build_comparison(
                total_sales,
                total_revenue,
                average_price,
                previous,
            ))
        };

        let insights = insights::build_insights(
            total_sales,
            average_price,
            &top_products,
            &top_categories,
            &hourly,
        );

        Self {
            period,
            total_sales,
            total_revenue,
            average_price,
            min_price,
            max_price,
            median_price,
            top_products,
            top_categories,
            hourly,
            by_weekday,
            series,
            insights,
            comparison,
            computed_at: now,
        }
    }
}

/// Median of an already-sorted price list; 0 when empty.
fn median(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Group by verbatim product name in input order, then stable-sort by count
/// descending so ties keep input order. Capped at [`TOP_N`].
fn top_products(events: &[SaleEvent], total: u64) -> Vec<ProductStat> {
    let mut order: Vec<ProductStat> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for event in events {
        match index.get(event.product_name.as_str()) {
            Some(&i) => {
                order[i].count += 1;
                order[i].revenue += event.price;
            }
            None => {
                index.insert(event.product_name.as_str(), order.len());
                order.push(ProductStat {
                    name: event.product_name.clone(),
                    emoji: event.emoji.clone(),
                    count: 1,
                    revenue: event.price,
                    share: 0.0,
                });
            }
        }
    }

    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(TOP_N);
    for stat in &mut order {
        stat.share = share(stat.count, total);
    }
    order
}

fn top_categories(events: &[SaleEvent], total: u64) -> Vec<CategoryStat> {
    let mut order: Vec<CategoryStat> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for event in events {
        match index.get(event.category.as_str()) {
            Some(&i) => {
                order[i].count += 1;
                order[i].revenue += event.price;
            }
            None => {
                index.insert(event.category.as_str(), order.len());
                order.push(CategoryStat {
                    category: event.category.clone(),
                    count: 1,
                    revenue: event.price,
                    share: 0.0,
                });
            }
        }
    }

    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(TOP_N);
    for stat in &mut order {
        stat.share = share(stat.count, total);
    }
    order
}

#[allow(clippy::cast_precision_loss)]
fn share(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vendwatch_core::payload::SalePayload;

    fn event(name: &str, price: f64, minute: u32) -> SaleEvent {
        let payload = SalePayload {
            id: None,
            product_name: name.to_string(),
            price,
            timestamp: Utc.with_ymd_and_hms(2024, 6, 15, 10, minute, 0).single(),
        };
        SaleEvent::from_payload(payload, Utc::now())
    }

    #[test]
    fn totals_and_price_stats() {
        let events = vec![event("Cola", 1.0, 0), event("Chips", 2.0, 1), event("Water", 3.0, 2)];
        let snap = Snapshot::compute(Period::All, &events, &[], Utc::now());

        assert_eq!(snap.total_sales, 3);
        assert!((snap.total_revenue - 6.0).abs() < f64::EPSILON);
        assert!((snap.average_price - 2.0).abs() < f64::EPSILON);
        assert!((snap.min_price - 1.0).abs() < f64::EPSILON);
        assert!((snap.max_price - 3.0).abs() < f64::EPSILON);
        assert!((snap.median_price - 2.0).abs() < f64::EPSILON);
        assert!(snap.comparison.is_none());
    }

    #[test]
    fn median_of_even_count_averages_middle_pair() {
        let events = vec![
            event("A", 1.0, 0),
            event("B", 2.0, 1),
            event("C", 3.0, 2),
            event("D", 10.0, 3),
        ];
        let snap = Snapshot::compute(Period::All, &events, &[], Utc::now());
        assert!((snap.median_price - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_window_yields_zeroed_snapshot() {
        let snap = Snapshot::compute(Period::All, &[], &[], Utc::now());
        assert_eq!(snap.total_sales, 0);
        assert!((snap.median_price - 0.0).abs() < f64::EPSILON);
        assert!(snap.top_products.is_empty());
        assert!(snap.series.is_empty());
    }

    #[test]
    fn top_products_sorted_by_count_ties_keep_input_order() {
        let events = vec![
            event("Cola", 1.0, 0),
            event("Chips", 2.0, 1),
            event("Water", 1.0, 2),
            event("Chips", 2.0, 3),
        ];
        let snap = Snapshot::compute(Period::All, &events, &[], Utc::now());

        assert_eq!(snap.top_products[0].name, "Chips");
        assert_eq!(snap.top_products[0].count, 2);
        // Cola and Water both have count 1; Cola came first in input order.
        assert_eq!(snap.top_products[1].name, "Cola");
        assert_eq!(snap.top_products[2].name, "Water");
    }

    #[test]
    fn top_products_grouping_is_case_sensitive_verbatim() {
        let events = vec![event("Cola", 1.0, 0), event("cola", 1.0, 1)];
        let snap = Snapshot::compute(Period::All, &events, &[], Utc::now());
        assert_eq!(snap.top_products.len(), 2);
    }

    #[test]
    fn top_products_capped_at_ten() {
        let events: Vec<SaleEvent> = (0..15)
            .map(|i| event(&format!("Product {i}"), 1.0, i))
            .collect();
        let snap = Snapshot::compute(Period::All, &events, &[], Utc::now());
        assert_eq!(snap.top_products.len(), TOP_N);
    }

    #[test]
    fn histograms_bucket_by_hour_and_weekday() {
        // 2024-06-15 is a Saturday (day_of_week 6).
        let events = vec![event("Cola", 1.0, 0), event("Cola", 1.0, 1)];
        let snap = Snapshot::compute(Period::All, &events, &[], Utc::now());
        assert_eq!(snap.hourly[10], 2);
        assert_eq!(snap.by_weekday[6], 2);
        assert_eq!(snap.hourly.iter().sum::<u64>(), 2);
    }

    #[test]
    fn category_shares_sum_to_one() {
        let events = vec![event("Cola", 1.0, 0), event("Chips", 1.0, 1)];
        let snap = Snapshot::compute(Period::All, &events, &[], Utc::now());
        let total_share: f64 = snap.top_categories.iter().map(|c| c.share).sum();
        assert!((total_share - 1.0).abs() < 1e-9);
    }
}
