//! Insight generation and period-over-period comparison.
//!
//! Insights are a fixed, ordered rule set evaluated against the computed
//! aggregates; at most the first five triggered messages are emitted.
//!
//! The comparison reports percent change in count, revenue, and average
//! purchase against the immediately preceding equivalent window. A previous
//! value of zero yields a flat +100% when the current value is positive
//! (0% otherwise); downstream consumers rely on that convention.

use crate::snapshot::{CategoryStat, PeriodComparison, ProductStat};
use vendwatch_core::SaleEvent;

/// Maximum number of insight messages per snapshot.
const MAX_INSIGHTS: usize = 5;

/// Top-product share above which a dominance warning fires.
const DOMINANCE_SHARE: f64 = 0.30;

/// Average purchase above which the high-average note fires.
const HIGH_AVERAGE: f64 = 5.0;

/// Sale count at which the milestone message fires.
const MILESTONE_COUNT: u64 = 100;

/// Evaluate the insight rules, in order, emitting at most
/// [`MAX_INSIGHTS`] messages.
#[must_use]
pub fn build_insights(
    total_sales: u64,
    average_price: f64,
    top_products: &[ProductStat],
    top_categories: &[CategoryStat],
    hourly: &[u64; 24],
) -> Vec<String> {
    let mut messages = Vec::new();

    if total_sales == 1 {
        messages.push("First sale recorded — the machine is in business! 🎉".to_string());
    }

    if total_sales >= MILESTONE_COUNT {
        messages.push(format!("Milestone reached: {total_sales} sales and counting."));
    }

    if let Some(top) = top_products.first() {
        if top.share > DOMINANCE_SHARE {
            messages.push(format!(
                "{} dominates with {:.0}% of sales — consider diversifying the stock.",
                top.name,
                top.share * 100.0
            ));
        }
    }

    if average_price > HIGH_AVERAGE {
        messages.push(format!(
            "Customers are spending big: average purchase is {average_price:.2}."
        ));
    }

    if let Some((peak_hour, &peak_count)) =
        hourly.iter().enumerate().max_by_key(|(_, count)| **count)
    {
        if peak_count > 0 {
            messages.push(format!("Busiest hour: {peak_hour:02}:00 ({peak_count} sales)."));
        }
    }

    if top_categories.len() >= 2 {
        if let Some(leader) = top_categories.first() {
            messages.push(format!(
                "{} leads the categories with {} sales.",
                leader.category, leader.count
            ));
        }
    }

    messages.truncate(MAX_INSIGHTS);
    messages
}

/// Compare the current window against the preceding one.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn build_comparison(
    current_count: u64,
    current_revenue: f64,
    current_average: f64,
    previous: &[SaleEvent],
) -> PeriodComparison {
    let previous_count = previous.len() as u64;
    let previous_revenue: f64 = previous.iter().map(|e| e.price).sum();
    let previous_average = if previous.is_empty() {
        0.0
    } else {
        previous_revenue / previous.len() as f64
    };

    PeriodComparison {
        count_change_pct: percent_change(current_count as f64, previous_count as f64),
        revenue_change_pct: percent_change(current_revenue, previous_revenue),
        average_change_pct: percent_change(current_average, previous_average),
        previous_count,
        previous_revenue,
    }
}

/// Percent change with the zero-previous rule: a previous value of zero
/// yields +100% when the current value is positive, else 0%.
#[must_use]
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 { 100.0 } else { 0.0 }
    } else {
        (current - previous) / previous * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, count: u64, share: f64) -> ProductStat {
        ProductStat {
            name: name.to_string(),
            emoji: "🥤".to_string(),
            count,
            revenue: 0.0,
            share,
        }
    }

    fn category(name: &str, count: u64) -> CategoryStat {
        CategoryStat {
            category: name.to_string(),
            count,
            revenue: 0.0,
            share: 0.0,
        }
    }

    #[test]
    fn first_sale_message_only_at_exactly_one() {
        let hourly = [0_u64; 24];
        let one = build_insights(1, 1.0, &[], &[], &hourly);
        assert!(one[0].contains("First sale"));

        let two = build_insights(2, 1.0, &[], &[], &hourly);
        assert!(two.iter().all(|m| !m.contains("First sale")));
    }

    #[test]
    fn dominance_fires_above_thirty_percent() {
        let hourly = [0_u64; 24];
        let dominant = [product("Cola", 4, 0.4)];
        let messages = build_insights(10, 1.0, &dominant, &[], &hourly);
        assert!(messages.iter().any(|m| m.contains("dominates")));

        let balanced = [product("Cola", 3, 0.3)];
        let messages = build_insights(10, 1.0, &balanced, &[], &hourly);
        assert!(messages.iter().all(|m| !m.contains("dominates")));
    }

    #[test]
    fn peak_hour_requires_nonzero_bucket() {
        let hourly = [0_u64; 24];
        let messages = build_insights(0, 0.0, &[], &[], &hourly);
        assert!(messages.iter().all(|m| !m.contains("Busiest")));

        let mut hourly = [0_u64; 24];
        hourly[14] = 3;
        let messages = build_insights(3, 1.0, &[], &[], &hourly);
        assert!(messages.iter().any(|m| m.contains("14:00")));
    }

    #[test]
    fn leading_category_needs_two_categories() {
        let hourly = [0_u64; 24];
        let one_cat = [category("beverages", 5)];
        let messages = build_insights(5, 1.0, &[], &one_cat, &hourly);
        assert!(messages.iter().all(|m| !m.contains("leads")));

        let two_cats = [category("beverages", 5), category("snacks", 2)];
        let messages = build_insights(7, 1.0, &[], &two_cats, &hourly);
        assert!(messages.iter().any(|m| m.contains("beverages leads")));
    }

    #[test]
    fn at_most_five_insights_in_rule_order() {
        // Trigger every rule except first-sale (count must be >= 100 for the
        // milestone): dominance, high average, peak hour, leading category.
        let mut hourly = [0_u64; 24];
        hourly[12] = 200;
        let products = [product("Cola", 80, 0.4)];
        let categories = [category("beverages", 150), category("snacks", 50)];
        let messages = build_insights(200, 6.0, &products, &categories, &hourly);

        assert!(messages.len() <= 5);
        assert!(messages[0].contains("Milestone"));
        assert!(messages[1].contains("dominates"));
    }

    #[test]
    fn percent_change_zero_previous_rule() {
        assert!((percent_change(5.0, 0.0) - 100.0).abs() < f64::EPSILON);
        assert!((percent_change(0.0, 0.0) - 0.0).abs() < f64::EPSILON);
        assert!((percent_change(15.0, 10.0) - 50.0).abs() < f64::EPSILON);
        assert!((percent_change(5.0, 10.0) - -50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn comparison_aggregates_previous_window() {
        let comparison = build_comparison(10, 20.0, 2.0, &[]);
        assert_eq!(comparison.previous_count, 0);
        assert!((comparison.count_change_pct - 100.0).abs() < f64::EPSILON);
        assert!((comparison.revenue_change_pct - 100.0).abs() < f64::EPSILON);
    }
}
