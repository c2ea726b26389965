use super::*;
use crate::{
    lifecycle::ScreenLifecycle,
    notifier::SiblingNotifier,
    testing::{ok, wait_until, ScriptedTransport},
    transport::HttpMethod,
};
use serde_json::json;
use shared::domain::ScreenRole;

struct Harness {
    transport: Arc<ScriptedTransport>,
    lifecycle: ScreenLifecycle,
    list: Arc<PagedListController<OrderRecord>>,
    events: broadcast::Receiver<ClientEvent>,
}

fn harness() -> Harness {
    let transport = ScriptedTransport::new();
    let lifecycle = ScreenLifecycle::new();
    let (tx, events) = broadcast::channel(64);
    let list = Arc::new(PagedListController::new(
        transport.clone(),
        ScreenSessionId::new(),
        lifecycle.token(),
        tx,
        Duration::ZERO,
    ));
    Harness {
        transport,
        lifecycle,
        list,
        events,
    }
}

fn ids(state: &ListState<OrderRecord>) -> Vec<i64> {
    state.items.iter().map(ListRecord::record_id).collect()
}

fn pages_requested(transport: &ScriptedTransport) -> Vec<String> {
    transport
        .requests()
        .iter()
        .filter_map(|request| request.query_value("page").map(str::to_string))
        .collect()
}

#[tokio::test]
async fn first_page_then_empty_page_exhausts_the_list() {
    let h = harness();
    h.transport
        .reply(HttpMethod::Get, "orders", json!([{"id": 1}, {"id": 2}]));
    h.transport.reply(HttpMethod::Get, "orders", json!([]));

    assert_eq!(h.list.load().await, LoadOutcome::Appended(2));
    assert!(h.list.snapshot().await.has_more);

    assert_eq!(h.list.load_more().await, LoadOutcome::Exhausted);
    let state = h.list.snapshot().await;
    assert_eq!(ids(&state), [1, 2]);
    assert!(!state.has_more);
    assert!(!state.loading);
    assert!(!state.refreshing);
    assert_eq!(state.error, None);
    assert_eq!(pages_requested(&h.transport), ["1", "2"]);
}

#[tokio::test]
async fn load_more_is_a_no_op_once_exhausted() {
    let h = harness();
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 1}]));
    h.transport.reply(HttpMethod::Get, "orders", json!([]));
    h.list.load().await;
    h.list.load_more().await;

    assert_eq!(h.list.load_more().await, LoadOutcome::Skipped);
    assert_eq!(h.list.load_more().await, LoadOutcome::Skipped);
    assert_eq!(ids(&h.list.snapshot().await), [1]);
    assert_eq!(h.transport.count(HttpMethod::Get, "orders"), 2);
}

#[tokio::test]
async fn request_carries_per_page_and_search_filter() {
    let h = harness();
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 5}]));

    h.list.search("  hoodie ").await;

    let requests = h.transport.requests();
    let request = &requests[0];
    assert_eq!(request.query_value("per_page"), Some("20"));
    assert_eq!(request.query_value("page"), Some("1"));
    assert_eq!(request.query_value("search"), Some("hoodie"));
    assert_eq!(request.query_value("status"), None);
}

#[tokio::test]
async fn refresh_discards_items_of_the_previous_epoch() {
    let h = harness();
    h.transport
        .reply(HttpMethod::Get, "orders", json!([{"id": 1}, {"id": 2}]));
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 3}]));
    h.transport
        .reply(HttpMethod::Get, "orders", json!([{"id": 9}, {"id": 1}]));

    h.list.load().await;
    h.list.load_more().await;
    assert_eq!(ids(&h.list.snapshot().await), [1, 2, 3]);

    assert_eq!(h.list.refresh().await, LoadOutcome::Appended(2));
    let state = h.list.snapshot().await;
    assert_eq!(ids(&state), [9, 1]);
    assert_eq!(h.list.query().await.page, 1);
    assert_eq!(pages_requested(&h.transport), ["1", "2", "1"]);
}

#[tokio::test]
async fn search_resets_to_page_one_with_only_the_new_results() {
    let h = harness();
    h.transport
        .reply(HttpMethod::Get, "orders", json!([{"id": 1}, {"id": 2}]));
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 3}]));
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 42}]));

    h.list.load().await;
    h.list.load_more().await;
    h.list.search("smith").await;

    let state = h.list.snapshot().await;
    assert_eq!(ids(&state), [42]);
    assert_eq!(h.list.query().await.search_term.as_deref(), Some("smith"));

    let last = h.transport.requests().pop().unwrap();
    assert_eq!(last.query_value("page"), Some("1"));
    assert_eq!(last.query_value("search"), Some("smith"));
}

#[tokio::test]
async fn blank_search_clears_the_term() {
    let h = harness();
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 1}]));
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 1}]));

    h.list.search("smith").await;
    h.list.search("   ").await;

    assert_eq!(h.list.query().await.search_term, None);
    let last = h.transport.requests().pop().unwrap();
    assert_eq!(last.query_value("search"), None);
}

#[tokio::test]
async fn status_filter_with_all_sentinel_lists_everything() {
    let h = harness();
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 1}]));
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 1}, {"id": 2}]));

    h.list.filter_by_status("wc-processing").await;
    assert_eq!(
        h.transport.requests()[0].query_value("status"),
        Some("wc-processing")
    );

    h.list.filter_by_status("all").await;
    assert_eq!(h.list.query().await.status, None);
    assert_eq!(h.transport.requests()[1].query_value("status"), None);
    assert_eq!(ids(&h.list.snapshot().await), [1, 2]);
}

#[tokio::test]
async fn repeated_records_across_pages_are_kept() {
    let h = harness();
    h.transport
        .reply(HttpMethod::Get, "orders", json!([{"id": 1}, {"id": 2}]));
    h.transport
        .reply(HttpMethod::Get, "orders", json!([{"id": 2}, {"id": 3}]));

    h.list.load().await;
    h.list.load_more().await;
    assert_eq!(ids(&h.list.snapshot().await), [1, 2, 2, 3]);
}

#[tokio::test]
async fn error_envelope_stops_paging_and_records_the_code() {
    let mut h = harness();
    h.transport.reply(
        HttpMethod::Get,
        "orders",
        json!({"code": "dokan_rest_cannot_view", "message": "No permission"}),
    );

    let outcome = h.list.load().await;
    assert!(matches!(outcome, LoadOutcome::Failed(ClientError::Api(_))));
    let state = h.list.snapshot().await;
    assert!(!state.has_more);
    assert!(!state.loading);
    assert_eq!(
        state.error.as_ref().and_then(ClientError::code),
        Some("dokan_rest_cannot_view")
    );

    let mut saw_notice = false;
    while let Ok(event) = h.events.try_recv() {
        if let ClientEvent::Notice { message, .. } = event {
            assert_eq!(message, "No permission");
            saw_notice = true;
        }
    }
    assert!(saw_notice);
}

#[tokio::test]
async fn network_failure_keeps_loaded_items() {
    let h = harness();
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 1}]));
    h.transport.fail(
        HttpMethod::Get,
        "orders",
        ClientError::Network("connection reset".to_string()),
    );

    h.list.load().await;
    let outcome = h.list.load_more().await;
    assert!(matches!(outcome, LoadOutcome::Failed(ClientError::Network(_))));

    let state = h.list.snapshot().await;
    assert_eq!(ids(&state), [1]);
    assert!(!state.has_more);
    assert!(state.error.as_ref().is_some_and(ClientError::is_network));
}

#[tokio::test]
async fn load_does_not_refetch_a_committed_page() {
    let h = harness();
    h.transport
        .reply(HttpMethod::Get, "orders", json!([{"id": 1}, {"id": 2}]));

    assert_eq!(h.list.load().await, LoadOutcome::Appended(2));
    assert_eq!(h.list.load().await, LoadOutcome::Skipped);
    assert_eq!(ids(&h.list.snapshot().await), [1, 2]);
    assert_eq!(h.transport.count(HttpMethod::Get, "orders"), 1);
}

#[tokio::test]
async fn load_retries_a_failed_page() {
    let h = harness();
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 1}]));
    h.transport.fail(
        HttpMethod::Get,
        "orders",
        ClientError::Network("connection reset".to_string()),
    );
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 2}]));

    h.list.load().await;
    h.list.load_more().await;
    assert_eq!(h.list.load().await, LoadOutcome::Appended(1));
    assert_eq!(ids(&h.list.snapshot().await), [1, 2]);
    assert_eq!(pages_requested(&h.transport), ["1", "2", "2"]);
}

#[tokio::test]
async fn overlapping_load_more_issues_one_request() {
    let h = harness();
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 1}]));
    h.list.load().await;

    let gate = h.transport.gate(HttpMethod::Get, "orders");
    let transport = h.transport.clone();
    let list = h.list.clone();
    let driver = async move {
        wait_until(|| transport.count(HttpMethod::Get, "orders") == 2).await;
        let second = list.load_more().await;
        gate.send(ok(json!([{"id": 2}]))).unwrap();
        second
    };

    let (first, second) = tokio::join!(h.list.load_more(), driver);
    assert_eq!(first, LoadOutcome::Appended(1));
    assert_eq!(second, LoadOutcome::Skipped);
    assert_eq!(h.transport.count(HttpMethod::Get, "orders"), 2);
    assert_eq!(ids(&h.list.snapshot().await), [1, 2]);
}

#[tokio::test]
async fn late_page_from_previous_epoch_is_discarded() {
    let h = harness();
    let stale_gate = h.transport.gate(HttpMethod::Get, "orders");
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 7}]));

    let transport = h.transport.clone();
    let list = h.list.clone();
    let driver = async move {
        wait_until(|| transport.count(HttpMethod::Get, "orders") == 1).await;
        let refreshed = list.refresh().await;
        stale_gate.send(ok(json!([{"id": 1}, {"id": 2}]))).unwrap();
        refreshed
    };

    let (stale, refreshed) = tokio::join!(h.list.load(), driver);
    assert_eq!(refreshed, LoadOutcome::Appended(1));
    assert_eq!(stale, LoadOutcome::Stale);
    assert_eq!(ids(&h.list.snapshot().await), [7]);
}

#[tokio::test]
async fn unmounted_screen_drops_in_flight_page() {
    let h = harness();
    let gate = h.transport.gate(HttpMethod::Get, "orders");
    let transport = h.transport.clone();
    let lifecycle = h.lifecycle;
    let driver = async move {
        wait_until(|| transport.count(HttpMethod::Get, "orders") == 1).await;
        drop(lifecycle);
        gate.send(ok(json!([{"id": 1}]))).unwrap();
    };

    let (outcome, ()) = tokio::join!(h.list.load(), driver);
    assert_eq!(outcome, LoadOutcome::Detached);
    assert!(h.list.snapshot().await.items.is_empty());
    assert_eq!(h.list.refresh().await, LoadOutcome::Detached);
}

#[tokio::test(start_paused = true)]
async fn initial_delay_applies_to_the_first_request_only() {
    let transport = ScriptedTransport::new();
    let lifecycle = ScreenLifecycle::new();
    let (tx, _events) = broadcast::channel(16);
    let list = PagedListController::<ProductRecord>::new(
        transport.clone(),
        ScreenSessionId::new(),
        lifecycle.token(),
        tx,
        Duration::from_millis(300),
    );
    transport.reply(HttpMethod::Get, "products", json!([{"id": 1}]));
    transport.reply(HttpMethod::Get, "products", json!([{"id": 2}]));

    let started = tokio::time::Instant::now();
    list.load().await;
    assert!(started.elapsed() >= Duration::from_millis(300));

    let second = tokio::time::Instant::now();
    list.load_more().await;
    assert!(second.elapsed() < Duration::from_millis(300));
}

#[tokio::test]
async fn sibling_refresh_reloads_from_page_one() {
    let h = harness();
    let notifier = SiblingNotifier::new();
    notifier.register(ScreenRole::OrdersList, &h.list).await;
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 1}]));
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 2}]));
    h.transport.reply(HttpMethod::Get, "orders", json!([{"id": 3}]));
    h.list.load().await;
    h.list.load_more().await;

    assert!(notifier.notify(ScreenRole::OrdersList).await);
    assert_eq!(ids(&h.list.snapshot().await), [3]);
    assert_eq!(pages_requested(&h.transport), ["1", "2", "1"]);
}

#[tokio::test]
async fn reviews_list_hits_the_reviews_endpoint() {
    let transport = ScriptedTransport::new();
    let lifecycle = ScreenLifecycle::new();
    let (tx, _events) = broadcast::channel(16);
    let list = PagedListController::<ReviewRecord>::new(
        transport.clone(),
        ScreenSessionId::new(),
        lifecycle.token(),
        tx,
        Duration::ZERO,
    );
    transport.reply(
        HttpMethod::Get,
        "reviews",
        json!([{"id": 4, "rating": "5", "author": {"name": "Ada"}}]),
    );

    assert_eq!(list.load().await, LoadOutcome::Appended(1));
    let state = list.snapshot().await;
    assert_eq!(state.items[0].rating, Some(5));
    assert_eq!(list.resource(), Resource::Reviews);
}
