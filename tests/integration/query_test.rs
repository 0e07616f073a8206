//! Single-resource query exchanges.

use std::time::{Duration, Instant};

use brokerlink::envelope::Resource;
use brokerlink::query::Query;
use brokerlink::BrokerError;
use serde_json::json;

use crate::common::{default_options, Harness, CLIENT_ID};

#[tokio::test]
async fn test_query_returns_remote_row() {
    let h = Harness::new().await;
    h.remote.seed("persons", 3);

    let outcome = h
        .client
        .query(Query::new(Resource::PERSONS).with_id("persons-1"), None)
        .await
        .unwrap();

    let response = outcome.into_option().expect("query timed out");
    assert_eq!(response.response, json!({"id": "persons-1", "n": 1}));
}

#[tokio::test]
async fn test_query_unknown_resource_is_remote_error() {
    let h = Harness::new().await;

    let err = h
        .client
        .query(Query::new(Resource::new("doors")), None)
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert_eq!(
        err.remote_payload().unwrap()["error"],
        "unknown resource doors"
    );
}

#[tokio::test]
async fn test_query_with_wrong_token_is_rejected() {
    let h = Harness::with_options(brokerlink::ClientOptions::new(CLIENT_ID, "stale")).await;
    h.remote.seed("persons", 1);

    let err = h
        .client
        .query(Query::new(Resource::PERSONS), Some(Duration::from_secs(2)))
        .await
        .unwrap_err();

    assert_eq!(err.remote_payload().unwrap()["error"], "invalid token");
}

#[tokio::test]
async fn test_query_times_out_when_remote_is_silent() {
    let h = Harness::new().await;
    h.remote.go_silent("zones");
    let start = Instant::now();

    let outcome = h
        .client
        .query(Query::new(Resource::ZONES), Some(Duration::from_millis(100)))
        .await
        .unwrap();

    assert!(outcome.is_timed_out());
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_query_not_connected() {
    let h = Harness::with_options(default_options()).await;
    h.client_transport.set_usable(false);

    let result = h.client.query(Query::new(Resource::PERSONS), None).await;

    assert!(matches!(result, Err(BrokerError::NotConnected)));
    assert!(!h.client.is_connected());
}

#[tokio::test]
async fn test_concurrent_queries_get_their_own_answers() {
    let h = Harness::new().await;
    h.remote.seed("persons", 20);

    let queries = (0..20).map(|i| {
        h.client.query(
            Query::new(Resource::PERSONS).with_id(format!("persons-{}", i)),
            None,
        )
    });
    let results = futures::future::join_all(queries).await;

    for (i, result) in results.into_iter().enumerate() {
        let response = result.unwrap().into_option().unwrap();
        assert_eq!(response.response["n"], i as u64);
    }
}
