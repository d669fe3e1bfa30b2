//! Time-bucketed series for the period chart.
//!
//! Bucket granularity and label format depend on the reporting period:
//! hourly buckets for `Today`, daily buckets for `Week`/`Month`, and
//! calendar-week buckets (labeled by the week's Monday) otherwise. Grouping
//! order is not assumed sorted; buckets are sorted ascending by start after
//! grouping.

use crate::period::Period;
use chrono::{DateTime, Datelike, Days, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vendwatch_core::SaleEvent;

/// One bucket of the time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesBucket {
    /// Human label: `"14:00"` for hourly buckets, `"Jun 5"` for daily and
    /// weekly buckets.
    pub label: String,
    /// Inclusive start of the bucket.
    pub start: DateTime<Utc>,
    /// Sales in the bucket.
    pub count: u64,
    /// Revenue in the bucket.
    pub revenue: f64,
}

/// Group the window's events into period-appropriate buckets.
#[must_use]
pub fn build_series(period: Period, events: &[SaleEvent]) -> Vec<SeriesBucket> {
    let mut buckets: HashMap<DateTime<Utc>, (u64, f64)> = HashMap::new();
    for event in events {
        let start = bucket_start(period, event.timestamp);
        let entry = buckets.entry(start).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += event.price;
    }

    let mut series: Vec<SeriesBucket> = buckets
        .into_iter()
        .map(|(start, (count, revenue))| SeriesBucket {
            label: bucket_label(period, start),
            start,
            count,
            revenue,
        })
        .collect();
    series.sort_by_key(|b| b.start);
    series
}

fn bucket_start(period: Period, ts: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        Period::Today => truncate(ts.date_naive(), ts.hour()),
        Period::Week | Period::Month => truncate(ts.date_naive(), 0),
        Period::All => truncate(monday_of(ts.date_naive()), 0),
    }
}

fn bucket_label(period: Period, start: DateTime<Utc>) -> String {
    match period {
        Period::Today => start.format("%H:00").to_string(),
        Period::Week | Period::Month | Period::All => start.format("%b %-d").to_string(),
    }
}

fn truncate(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    date.and_hms_opt(hour, 0, 0)
        .map(|naive| naive.and_utc())
        // Hour comes from DateTime::hour(), always 0..=23.
        .unwrap_or_default()
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vendwatch_core::payload::SalePayload;

    fn event_at(day: u32, hour: u32, minute: u32, price: f64) -> SaleEvent {
        let payload = SalePayload {
            id: None,
            product_name: "Cola".to_string(),
            price,
            timestamp: Utc.with_ymd_and_hms(2024, 6, day, hour, minute, 0).single(),
        };
        SaleEvent::from_payload(payload, Utc::now())
    }

    #[test]
    fn today_buckets_hourly_with_hour_labels() {
        let events = vec![
            event_at(15, 9, 5, 1.0),
            event_at(15, 9, 45, 2.0),
            event_at(15, 14, 0, 3.0),
        ];
        let series = build_series(Period::Today, &events);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "09:00");
        assert_eq!(series[0].count, 2);
        assert!((series[0].revenue - 3.0).abs() < f64::EPSILON);
        assert_eq!(series[1].label, "14:00");
    }

    #[test]
    fn week_buckets_daily_sorted_ascending() {
        // Deliberately out of order; grouping must sort by start.
        let events = vec![
            event_at(14, 10, 0, 1.0),
            event_at(12, 10, 0, 1.0),
            event_at(13, 10, 0, 1.0),
        ];
        let series = build_series(Period::Week, &events);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].label, "Jun 12");
        assert_eq!(series[1].label, "Jun 13");
        assert_eq!(series[2].label, "Jun 14");
        assert!(series.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn all_buckets_by_calendar_week_labeled_by_monday() {
        // 2024-06-12 (Wed) and 2024-06-14 (Fri) share the week of Mon Jun 10;
        // 2024-06-17 is the following Monday.
        let events = vec![
            event_at(12, 10, 0, 1.0),
            event_at(14, 10, 0, 1.0),
            event_at(17, 10, 0, 1.0),
        ];
        let series = build_series(Period::All, &events);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "Jun 10");
        assert_eq!(series[0].count, 2);
        assert_eq!(series[1].label, "Jun 17");
    }
}
