//! Analytics engine integration tests: the cache contract, period windows,
//! and end-to-end ingestion scenarios.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
#![allow(clippy::float_cmp)] // Exact aggregate values are intended here

use chrono::Duration;
use std::sync::Arc;
use vendwatch_analytics::{AnalyticsEngine, Period};
use vendwatch_core::environment::Clock;
use vendwatch_storage::{EventQuery, SortOrder, StateStore};
use vendwatch_testing::{FixedClock, InMemoryEventStore, InMemoryStateStore, sale, test_clock};

fn engine_with_clock() -> (AnalyticsEngine, Arc<FixedClock>) {
    let clock = Arc::new(test_clock());
    let engine = AnalyticsEngine::new(Arc::new(InMemoryEventStore::new()), clock.clone());
    (engine, clock)
}

#[tokio::test]
async fn totals_match_ingested_events() {
    let (engine, clock) = engine_with_clock();
    let now = clock.now();

    for i in 0..5_i64 {
        let wire = sale("Cola", 1.5).at(now - Duration::minutes(i)).to_wire();
        engine.add_event(&wire).await.unwrap();
    }

    let snapshot = engine.snapshot(Period::All, true).await;
    assert_eq!(snapshot.total_sales, 5);
    assert_eq!(snapshot.total_revenue, 7.5);
}

#[tokio::test]
async fn cola_currency_string_scenario() {
    let (engine, clock) = engine_with_clock();
    let wire = serde_json::json!({
        "productName": "Cola",
        "price": "$1.50",
        "timestamp": clock.now().timestamp_millis(),
    });
    engine.add_event(&wire).await.unwrap();

    let snapshot = engine.snapshot(Period::All, true).await;
    assert_eq!(snapshot.total_sales, 1);
    assert_eq!(snapshot.total_revenue, 1.5);
    assert_eq!(snapshot.top_products[0].name, "Cola");

    let events = engine
        .query_events(EventQuery::new().sort(SortOrder::NewestFirst))
        .await
        .unwrap();
    assert_eq!(events[0].category, "beverages");
}

#[tokio::test]
async fn empty_product_name_is_rejected_without_state_change() {
    let (engine, _clock) = engine_with_clock();
    let wire = serde_json::json!({"productName": "", "price": 1});

    assert!(engine.add_event(&wire).await.is_err());

    let snapshot = engine.snapshot(Period::All, true).await;
    assert_eq!(snapshot.total_sales, 0);
    assert_eq!(engine.working_set_len().await, 0);
}

#[tokio::test]
async fn snapshot_is_cached_bit_identical() {
    let (engine, clock) = engine_with_clock();
    let wire = sale("Cola", 1.0).at(clock.now()).to_wire();
    engine.add_event(&wire).await.unwrap();

    let first = engine.snapshot(Period::Today, true).await;
    let second = engine.snapshot(Period::Today, true).await;
    // Not merely equal: the identical cached object.
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn ingest_invalidates_every_cached_period() {
    let (engine, clock) = engine_with_clock();
    let now = clock.now();
    engine.add_event(&sale("Cola", 1.0).at(now).to_wire()).await.unwrap();

    let today_before = engine.snapshot(Period::Today, true).await;
    let all_before = engine.snapshot(Period::All, true).await;

    engine.add_event(&sale("Chips", 2.0).at(now).to_wire()).await.unwrap();

    let today_after = engine.snapshot(Period::Today, true).await;
    let all_after = engine.snapshot(Period::All, true).await;

    assert!(!Arc::ptr_eq(&today_before, &today_after));
    assert!(!Arc::ptr_eq(&all_before, &all_after));
    assert_eq!(today_after.total_sales, 2);
    assert_eq!(all_after.total_sales, 2);
}

#[tokio::test]
async fn cache_expires_after_ttl_without_ingest() {
    let clock = Arc::new(test_clock());
    let engine = AnalyticsEngine::new(Arc::new(InMemoryEventStore::new()), clock.clone())
        .with_cache_ttl(Duration::minutes(10));

    engine
        .add_event(&sale("Cola", 1.0).at(clock.now()).to_wire())
        .await
        .unwrap();

    let first = engine.snapshot(Period::All, true).await;
    clock.advance(Duration::minutes(11));
    let second = engine.snapshot(Period::All, true).await;
    assert!(!Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn use_cache_false_always_recomputes() {
    let (engine, clock) = engine_with_clock();
    engine
        .add_event(&sale("Cola", 1.0).at(clock.now()).to_wire())
        .await
        .unwrap();

    let cached = engine.snapshot(Period::All, true).await;
    let fresh = engine.snapshot(Period::All, false).await;
    assert!(!Arc::ptr_eq(&cached, &fresh));
    assert_eq!(cached.total_sales, fresh.total_sales);
}

#[tokio::test]
async fn week_window_is_trailing_seven_days_not_calendar_weeks() {
    // test_clock is Sunday 2025-06-15 12:00 UTC; the trailing-7 window spans
    // two calendar weeks (Mon Jun 9 .. Sun Jun 15).
    let (engine, clock) = engine_with_clock();
    let now = clock.now();

    // In-window: 3 days ago (Thu, this calendar week boundary-crossing) and
    // 6 days ago (previous calendar week).
    engine
        .add_event(&sale("Cola", 1.0).at(now - Duration::days(3)).to_wire())
        .await
        .unwrap();
    engine
        .add_event(&sale("Chips", 1.0).at(now - Duration::days(6)).to_wire())
        .await
        .unwrap();
    // Out-of-window: 8 days ago.
    engine
        .add_event(&sale("Water", 1.0).at(now - Duration::days(8)).to_wire())
        .await
        .unwrap();

    let snapshot = engine.snapshot(Period::Week, true).await;
    assert_eq!(snapshot.total_sales, 2);
    assert!(snapshot.top_products.iter().all(|p| p.name != "Water"));
}

#[tokio::test]
async fn comparison_uses_sliding_previous_window() {
    let (engine, clock) = engine_with_clock();
    let now = clock.now();

    // Two sales this week, one sale in the week before.
    engine
        .add_event(&sale("Cola", 2.0).at(now - Duration::days(1)).to_wire())
        .await
        .unwrap();
    engine
        .add_event(&sale("Cola", 2.0).at(now - Duration::days(2)).to_wire())
        .await
        .unwrap();
    engine
        .add_event(&sale("Cola", 1.0).at(now - Duration::days(10)).to_wire())
        .await
        .unwrap();

    let snapshot = engine.snapshot(Period::Week, true).await;
    let comparison = snapshot.comparison.as_ref().expect("week has a comparison");
    assert_eq!(comparison.previous_count, 1);
    assert_eq!(comparison.count_change_pct, 100.0);
    assert_eq!(comparison.revenue_change_pct, 300.0);
}

#[tokio::test]
async fn comparison_zero_previous_is_flat_hundred() {
    let (engine, clock) = engine_with_clock();
    engine
        .add_event(&sale("Cola", 1.0).at(clock.now()).to_wire())
        .await
        .unwrap();

    let snapshot = engine.snapshot(Period::Today, true).await;
    let comparison = snapshot.comparison.as_ref().expect("today has a comparison");
    assert_eq!(comparison.count_change_pct, 100.0);

    let all = engine.snapshot(Period::All, true).await;
    assert!(all.comparison.is_none());
}

#[tokio::test]
async fn real_time_stats_track_rolling_windows() {
    let (engine, clock) = engine_with_clock();
    let now = clock.now();

    engine
        .add_event(&sale("Cola", 1.0).at(now - Duration::minutes(30)).to_wire())
        .await
        .unwrap();
    engine
        .add_event(&sale("Chips", 2.0).at(now - Duration::hours(2)).to_wire())
        .await
        .unwrap();
    engine
        .add_event(&sale("Water", 4.0).at(now - Duration::hours(30)).to_wire())
        .await
        .unwrap();

    let stats = engine.real_time_stats().await;
    assert_eq!(stats.total_sales, 3);
    assert_eq!(stats.sales_last_hour, 1);
    assert_eq!(stats.sales_last_24h, 2);
    assert_eq!(stats.total_revenue, 7.0);
    assert_eq!(stats.revenue_last_24h, 3.0);
    assert!(stats.is_active);

    clock.advance(Duration::hours(2));
    let stats = engine.real_time_stats().await;
    assert_eq!(stats.sales_last_hour, 0);
    assert!(!stats.is_active);
}

#[tokio::test]
async fn replace_events_round_trips_and_invalidates() {
    let (engine, clock) = engine_with_clock();
    let now = clock.now();
    engine.add_event(&sale("Old", 1.0).at(now).to_wire()).await.unwrap();
    let before = engine.snapshot(Period::All, true).await;

    let imported = vec![
        sale("Cola", 1.0).with_id("a").at(now - Duration::minutes(2)).build(),
        sale("Chips", 2.0).with_id("b").at(now - Duration::minutes(1)).build(),
    ];
    engine.replace_events(imported.clone()).await.unwrap();

    let mut queried = engine.query_events(EventQuery::new()).await.unwrap();
    queried.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(queried, imported);

    let after = engine.snapshot(Period::All, true).await;
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.total_sales, 2);
}

#[tokio::test]
async fn persisted_snapshot_cache_restores_within_ttl() {
    let clock = Arc::new(test_clock());
    let store = Arc::new(InMemoryEventStore::new());
    let state = Arc::new(InMemoryStateStore::new());

    let engine = AnalyticsEngine::new(store.clone(), clock.clone())
        .with_state_store(state.clone() as Arc<dyn StateStore>);
    engine
        .add_event(&sale("Cola", 1.0).at(clock.now()).to_wire())
        .await
        .unwrap();
    let original = engine.snapshot(Period::All, true).await;
    assert!(state.keys().iter().any(|k| k == "analytics-cache/all"));

    // A fresh engine over the same storage restores the cached snapshot.
    let reopened = AnalyticsEngine::new(store, clock.clone())
        .with_state_store(state as Arc<dyn StateStore>);
    reopened.load().await.unwrap();
    let restored = reopened.snapshot(Period::All, true).await;
    assert_eq!(restored.computed_at, original.computed_at);
    assert_eq!(restored.total_sales, original.total_sales);
}

#[tokio::test]
async fn ingest_broadcasts_new_sale() {
    let (engine, clock) = engine_with_clock();
    let mut sales = engine.subscribe_sales();

    engine
        .add_event(&sale("Cola", 1.0).at(clock.now()).to_wire())
        .await
        .unwrap();

    let event = sales.recv().await.unwrap();
    assert_eq!(event.product_name, "Cola");
}
