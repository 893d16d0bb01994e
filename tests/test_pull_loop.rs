//! Pull-drain-acknowledge loop tests
//!
//! Termination, batching, ack discipline and retry behaviour, observed
//! through the in-memory broker's round-trip counters.


use pubsub_console::protocol::SubscriptionPath;
use pubsub_console::testing::InMemoryBroker;
use pubsub_console::{AckMode, MessagingClient, PubSubError, PullOptions};
use std::sync::Arc;
use std::time::{Duration, Instant};
use test_helpers::*;

fn audit_path() -> SubscriptionPath {
    SubscriptionPath::parse(&subscription_path("orders-audit")).unwrap()
}

async fn publish_many<B: pubsub_console::MessageBroker>(client: &MessagingClient<B>, count: usize) {
    for i in 0..count {
        client
            .publish(&topic_path("orders"), &format!("message-{i}"), None)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_empty_subscription_returns_after_one_round_trip() {
    let (client, broker) = client_with_subscription(InMemoryBroker::new()).await;

    let messages = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto),
        )
        .await
        .unwrap();

    assert!(messages.is_empty());
    assert_eq!(broker.pull_calls(), 1);
    assert_eq!(broker.acknowledge_calls(), 0);
}

#[tokio::test]
async fn test_drains_across_batches_until_empty_pull() {
    let (client, broker) = client_with_subscription(InMemoryBroker::new()).await;
    publish_many(&client, 5).await;

    let messages = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto).with_batch_size(2),
        )
        .await
        .unwrap();

    let data: Vec<&str> = messages.iter().map(|m| m.data.as_str()).collect();
    assert_eq!(
        data,
        vec!["message-0", "message-1", "message-2", "message-3", "message-4"]
    );
    // Three non-empty batches of 2, 2, 1, then the terminating empty pull
    assert_eq!(broker.pull_calls(), 4);
    assert_eq!(broker.acknowledge_calls(), 3);
}

#[tokio::test]
async fn test_auto_ack_leaves_nothing_to_redeliver() {
    let (client, broker) = client_with_subscription(InMemoryBroker::new()).await;
    publish_many(&client, 3).await;

    let messages = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto),
        )
        .await
        .unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.ack_token.is_none()));
    assert_eq!(broker.outstanding_count(&audit_path()).await, 0);

    broker.redeliver_unacked(&audit_path()).await.unwrap();
    let again = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto),
        )
        .await
        .unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_explicit_ack_returns_tokens_and_leaves_messages_leased() {
    let (client, broker) = client_with_subscription(InMemoryBroker::new()).await;
    publish_many(&client, 3).await;

    let messages = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Explicit),
        )
        .await
        .unwrap();

    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.ack_token.is_some()));
    assert_eq!(broker.acknowledge_calls(), 0);
    assert_eq!(broker.outstanding_count(&audit_path()).await, 3);

    // Without acks every message comes back once the lease lapses
    broker.redeliver_unacked(&audit_path()).await.unwrap();
    let redelivered = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Explicit),
        )
        .await
        .unwrap();
    assert_eq!(redelivered.len(), 3);
}

#[tokio::test]
async fn test_transient_failures_are_retried_within_budget() {
    let (client, broker) = client_with_subscription(InMemoryBroker::new()).await;
    publish_many(&client, 1).await;
    broker
        .fail_next_pulls(vec![
            PubSubError::unavailable("connection reset"),
            PubSubError::deadline_exceeded("slow"),
        ])
        .await;

    let messages = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto),
        )
        .await
        .unwrap();

    assert_eq!(messages.len(), 1);
    // Two failures, one batch, one empty pull
    assert_eq!(broker.pull_calls(), 4);
}

#[tokio::test]
async fn test_non_transient_failure_propagates_without_retry() {
    let (client, broker) = client_with_subscription(InMemoryBroker::new()).await;
    broker
        .fail_next_pulls(vec![PubSubError::unknown("internal broker fault")])
        .await;

    let result = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto),
        )
        .await;

    assert_eq!(result, Err(PubSubError::unknown("internal broker fault")));
    assert_eq!(broker.pull_calls(), 1);
}

#[tokio::test]
async fn test_missing_subscription_is_not_found_without_retry() {
    let (client, broker) = test_client(InMemoryBroker::new());

    let result = client
        .pull_all(
            &subscription_path("missing"),
            PullOptions::new(AckMode::Explicit),
        )
        .await;

    assert!(matches!(result, Err(PubSubError::NotFound { .. })));
    assert_eq!(broker.pull_calls(), 1);
}

#[tokio::test]
async fn test_persistent_transient_failure_surfaces_after_budget() {
    let broker = Arc::new(InMemoryBroker::new());
    let client = MessagingClient::new(broker.clone())
        .with_retry_policy(fast_retry_policy(Duration::from_millis(100)));
    client.create_topic(PROJECT, "orders").await.unwrap();
    client
        .create_subscription(PROJECT, "orders-audit", "orders")
        .await
        .unwrap();
    broker
        .fail_next_pulls(vec![PubSubError::unavailable("down"); 1000])
        .await;

    let started = Instant::now();
    let result = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto),
        )
        .await;

    assert_eq!(result, Err(PubSubError::unavailable("down")));
    assert!(broker.pull_calls() > 1);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_hung_broker_is_bounded_by_deadline() {
    let broker = Arc::new(InMemoryBroker::new().with_pull_stall(Duration::from_secs(5)));
    let client = MessagingClient::new(broker.clone())
        .with_request_timeout(Duration::from_millis(50))
        .with_retry_policy(fast_retry_policy(Duration::from_millis(200)));
    client.create_topic(PROJECT, "orders").await.unwrap();
    client
        .create_subscription(PROJECT, "orders-audit", "orders")
        .await
        .unwrap();

    let started = Instant::now();
    let result = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto),
        )
        .await;

    assert!(matches!(result, Err(PubSubError::DeadlineExceeded { .. })));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(broker.pull_calls() >= 2);
}

#[tokio::test]
async fn test_batches_acked_before_a_failure_stay_acked() {
    let (client, broker) = client_with_subscription(InMemoryBroker::new()).await;
    publish_many(&client, 3).await;
    broker
        .fail_pulls_after(1, vec![PubSubError::unknown("broker crashed")])
        .await;

    let result = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto).with_batch_size(1),
        )
        .await;
    assert!(matches!(result, Err(PubSubError::Unknown { .. })));
    assert_eq!(broker.acknowledge_calls(), 1);

    broker.redeliver_unacked(&audit_path()).await.unwrap();
    let rest = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto),
        )
        .await
        .unwrap();
    let data: Vec<&str> = rest.iter().map(|m| m.data.as_str()).collect();
    assert_eq!(data, vec!["message-1", "message-2"]);
}

#[tokio::test]
async fn test_zero_batch_size_is_rejected() {
    let (client, broker) = client_with_subscription(InMemoryBroker::new()).await;

    let result = client
        .pull_all(
            &subscription_path("orders-audit"),
            PullOptions::new(AckMode::Auto).with_batch_size(0),
        )
        .await;

    assert!(matches!(result, Err(PubSubError::InvalidArgument { .. })));
    assert_eq!(broker.pull_calls(), 0);
}
