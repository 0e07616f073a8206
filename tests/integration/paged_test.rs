//! Paginated query exchanges.

use std::time::{Duration, Instant};

use brokerlink::envelope::{QueryFilter, Resource};
use brokerlink::query::QueryPaged;
use serde_json::json;

use crate::common::{row_numbers, Harness};

#[tokio::test]
async fn test_paged_query_collects_all_pages() {
    let h = Harness::new().await;
    h.remote.seed("persons", 101);
    h.client.set_page_size(50);

    let result = h
        .client
        .query_paged(QueryPaged::new(Resource::PERSONS), None)
        .await
        .unwrap()
        .into_option()
        .expect("paged query timed out");

    assert_eq!(
        h.remote.windows_for("persons"),
        vec![(0, 50), (50, 50), (100, 1)]
    );
    assert_eq!(result.page_count(), 3);
    assert_eq!(row_numbers(&result.into_rows()), (0..101).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_paged_query_small_set_is_one_request() {
    let h = Harness::new().await;
    h.remote.seed("zones", 7);

    let result = h
        .client
        .query_paged(QueryPaged::new(Resource::ZONES), None)
        .await
        .unwrap()
        .into_option()
        .unwrap();

    assert_eq!(h.remote.windows_for("zones"), vec![(0, 50)]);
    assert_eq!(result.rows().count(), 7);
}

#[tokio::test]
async fn test_paged_query_empty_set() {
    let h = Harness::new().await;
    h.remote.seed("office-modes", 0);

    let result = h
        .client
        .query_paged(QueryPaged::new(Resource::OFFICE_MODES), None)
        .await
        .unwrap()
        .into_option()
        .unwrap();

    assert_eq!(result.page_count(), 1);
    assert_eq!(result.rows().count(), 0);
}

#[tokio::test]
async fn test_paged_query_filters_drive_plan_by_filter_count() {
    let h = Harness::new().await;
    let rows = (0..40)
        .map(|i| json!({"n": i, "zone": if i % 4 == 0 { "a" } else { "b" }}))
        .collect();
    h.remote.seed_rows("installation-points", rows);
    h.client.set_page_size(4);

    let query = QueryPaged::new(Resource::INSTALLATION_POINTS)
        .with_filters(vec![QueryFilter::new("eq", "zone", json!("a"))]);
    let result = h
        .client
        .query_paged(query, None)
        .await
        .unwrap()
        .into_option()
        .unwrap();

    // 10 matching rows of 40: pages (0,4) (4,4) (8,2)
    assert_eq!(
        h.remote.windows_for("installation-points"),
        vec![(0, 4), (4, 4), (8, 2)]
    );
    assert_eq!(
        row_numbers(&result.into_rows()),
        vec![0, 4, 8, 12, 16, 20, 24, 28, 32, 36]
    );
}

#[tokio::test]
async fn test_paged_query_pinned_window() {
    let h = Harness::new().await;
    h.remote.seed("persons", 500);

    let result = h
        .client
        .query_paged(QueryPaged::new(Resource::PERSONS).with_window(200, 25), None)
        .await
        .unwrap()
        .into_option()
        .unwrap();

    assert_eq!(h.remote.windows_for("persons"), vec![(200, 25)]);
    assert_eq!(
        row_numbers(&result.into_rows()),
        (200..225).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_concurrent_paged_queries_do_not_mix() {
    let h = Harness::new().await;
    h.remote.seed("persons", 95);
    h.remote.seed("evva-components", 61);
    h.client.set_page_size(10);

    let (persons, components) = tokio::join!(
        h.client
            .query_paged(QueryPaged::new(Resource::PERSONS), None),
        h.client
            .query_paged(QueryPaged::new(Resource::COMPONENTS), None),
    );

    let persons = persons.unwrap().into_option().unwrap().into_rows();
    let components = components.unwrap().into_option().unwrap().into_rows();
    assert_eq!(row_numbers(&persons), (0..95).collect::<Vec<_>>());
    assert_eq!(row_numbers(&components), (0..61).collect::<Vec<_>>());
    assert!(persons.iter().all(|row| row["id"].as_str().unwrap().starts_with("persons-")));
}

#[tokio::test]
async fn test_paged_query_times_out_as_a_whole() {
    let h = Harness::new().await;
    h.remote.go_silent("time-profiles");
    let start = Instant::now();

    let outcome = h
        .client
        .query_paged(
            QueryPaged::new(Resource::TIME_PROFILES),
            Some(Duration::from_millis(150)),
        )
        .await
        .unwrap();

    assert!(outcome.is_timed_out());
    assert!(start.elapsed() >= Duration::from_millis(150));
    assert_eq!(h.remote.windows_for("time-profiles"), vec![(0, 50)]);
}

#[tokio::test]
async fn test_page_size_rejects_non_positive() {
    let h = Harness::new().await;

    h.client.set_page_size(-1);
    assert_eq!(h.client.page_size(), 50);
    h.client.set_page_size(0);
    assert_eq!(h.client.page_size(), 50);
    h.client.set_page_size(20);
    assert_eq!(h.client.page_size(), 20);
}
