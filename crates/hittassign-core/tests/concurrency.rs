//! Concurrency-bound tests for hittassign-core.
//!
//! Every block and every foreach runs as a bounded batch. These tests use
//! delayed mock responses to observe how many requests are in flight and
//! which ones were launched after a failure.

mod common;

use std::sync::Arc;

use common::{interpreter, MockNetwork};
use hittassign_core::error::{AppError, RuntimeError};

const LIST_URL: &str = "https://example/list";

fn item_url(i: usize) -> String {
    format!("https://example/item/{}", i)
}

/// A network serving a list of `count` ids plus one delayed response per id.
fn list_network(count: usize, millis: u64) -> MockNetwork {
    let ids: Vec<String> = (1..=count).map(|i| format!("\"{}\"", i)).collect();
    let mut network = MockNetwork::new().respond(LIST_URL, &format!("{{\"items\":[{}]}}", ids.join(",")));
    for i in 1..=count {
        network = network.delay(&item_url(i), millis, "{}");
    }
    network
}

fn item_launches(network: &MockNetwork) -> Vec<String> {
    network
        .launched()
        .into_iter()
        .filter(|url| url != LIST_URL)
        .collect()
}

const FOREACH_SCRIPT: &str = "fetch list \"https://example/list\"\n  foreach x list.items\n    fetch r \"https://example/item/{x}\"\n";

// =============================================================================
// 1. Root bound
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_limit_one_is_sequential() {
    // Earlier items take longer, so any overlap would reorder completions.
    let mut network = MockNetwork::new().respond(LIST_URL, r#"{"items":["1","2","3","4"]}"#);
    for i in 1..=4 {
        network = network.delay(&item_url(i), 10 * (5 - i as u64), "{}");
    }
    let network = Arc::new(network);
    let (interp, _) = interpreter(network.clone(), 1);

    interp.run(FOREACH_SCRIPT).await.unwrap();

    let expected: Vec<String> = (1..=4).map(item_url).collect();
    assert_eq!(item_launches(&network), expected);
    let completed: Vec<String> = network
        .completed()
        .into_iter()
        .filter(|url| url != LIST_URL)
        .collect();
    assert_eq!(completed, expected);
    assert_eq!(network.peak(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_root_limit_bounds_foreach() {
    let network = Arc::new(list_network(8, 30));
    let (interp, _) = interpreter(network.clone(), 2);

    interp.run(FOREACH_SCRIPT).await.unwrap();

    assert_eq!(item_launches(&network).len(), 8);
    assert_eq!(network.peak(), 2);
}

#[tokio::test]
async fn test_requests_overlap_on_current_thread_runtime() {
    let network = Arc::new(list_network(6, 30));
    let (interp, _) = interpreter(network.clone(), 3);

    interp.run(FOREACH_SCRIPT).await.unwrap();

    assert_eq!(item_launches(&network).len(), 6);
    assert_eq!(network.peak(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_launch_order_follows_source_order() {
    let network = Arc::new(list_network(6, 5));
    let (interp, _) = interpreter(network.clone(), 1);

    interp.run(FOREACH_SCRIPT).await.unwrap();

    let expected: Vec<String> = (1..=6).map(item_url).collect();
    assert_eq!(item_launches(&network), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sibling_statements_share_the_bound() {
    let network = Arc::new(
        MockNetwork::new()
            .delay("https://example/a", 30, "{}")
            .delay("https://example/b", 30, "{}")
            .delay("https://example/c", 30, "{}")
            .delay("https://example/d", 30, "{}"),
    );
    let (interp, _) = interpreter(network.clone(), 3);

    let script = "fetch a \"https://example/a\"\nfetch b \"https://example/b\"\nfetch c \"https://example/c\"\nfetch d \"https://example/d\"\n";
    interp.run(script).await.unwrap();

    assert_eq!(network.launched().len(), 4);
    assert_eq!(network.peak(), 3);
}

// =============================================================================
// 2. concurrently blocks
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrently_overrides_root_limit() {
    let network = Arc::new(list_network(10, 30));
    let (interp, _) = interpreter(network.clone(), 32);

    let script = "fetch list \"https://example/list\"\n  concurrently 3\n    foreach x list.items\n      fetch r \"https://example/item/{x}\"\n";
    interp.run(script).await.unwrap();

    assert_eq!(item_launches(&network).len(), 10);
    assert!(network.peak() <= 3, "peak was {}", network.peak());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrently_can_widen_root_limit() {
    let network = Arc::new(list_network(4, 50));
    let (interp, _) = interpreter(network.clone(), 1);

    let script = "fetch list \"https://example/list\"\n  concurrently 4\n    foreach x list.items\n      fetch r \"https://example/item/{x}\"\n";
    interp.run(script).await.unwrap();

    assert_eq!(network.peak(), 4);
}

// =============================================================================
// 3. Failures stop admission
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_failure_stops_admission_and_lets_in_flight_finish() {
    let ids: Vec<String> = (1..=10).map(|i| format!("\"{}\"", i)).collect();
    let mut network = MockNetwork::new()
        .respond(LIST_URL, &format!("{{\"items\":[{}]}}", ids.join(",")))
        .delay(&item_url(1), 20, "{}")
        .delay(&item_url(2), 300, "{}")
        .delay(&item_url(3), 300, "{}")
        .fail_after(&item_url(4), 5, "503 Service Unavailable");
    for i in 5..=10 {
        network = network.delay(&item_url(i), 5, "{}");
    }
    let network = Arc::new(network);
    let (interp, _) = interpreter(network.clone(), 32);

    let script = "fetch list \"https://example/list\"\n  concurrently 3\n    foreach x list.items\n      fetch r \"https://example/item/{x}\"\n";
    let err = interp.run(script).await.unwrap_err();

    match err {
        AppError::Runtime(RuntimeError::FetchFailed { name, url, reason }) => {
            assert_eq!(name, "r");
            assert_eq!(url, item_url(4));
            assert!(reason.contains("503"));
        }
        other => panic!("Expected FetchFailed, got {:?}", other),
    }

    let launched = item_launches(&network);
    assert_eq!(launched, (1..=4).map(item_url).collect::<Vec<_>>());

    // Items 2 and 3 were in flight when 4 failed and still ran to the end.
    let completed = network.completed();
    for i in 1..=3 {
        assert!(completed.contains(&item_url(i)), "item {} should complete", i);
    }
    assert!(network.peak() <= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_in_statement_list_skips_later_siblings() {
    let network = Arc::new(
        MockNetwork::new()
            .fail_after("https://example/a", 5, "500 Internal Server Error")
            .respond("https://example/b", "{}"),
    );
    let (interp, sink) = interpreter(network.clone(), 1);

    let script = "fetch a \"https://example/a\"\nfetch b \"https://example/b\"\ndebug \"never\"\n";
    let err = interp.run(script).await.unwrap_err();

    assert!(matches!(err, AppError::Runtime(RuntimeError::FetchFailed { .. })));
    assert_eq!(network.launched(), vec!["https://example/a"]);
    assert!(sink.lines().is_empty());
}
