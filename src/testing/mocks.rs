//! In-memory broker for testing
//!
//! [`InMemoryBroker`] implements the full [`MessageBroker`] contract without a
//! network: topics and subscriptions in creation order, fan-out of every
//! publish to the subscriptions bound at publish time, leased deliveries with
//! an ack deadline, and hooks for injecting failures and stalls.

use crate::error::{PubSubError, PubSubResult};
use crate::protocol::{
    AckToken, BrokerMessage, OutgoingMessage, Page, ReceivedMessage, Subscription,
    SubscriptionPath, Topic, TopicPath,
};
use crate::transport::MessageBroker;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Topic name a subscription reports once its topic has been deleted
pub const DELETED_TOPIC: &str = "_deleted-topic_";

/// Lease length of a pulled message before it becomes deliverable again
pub const DEFAULT_ACK_DEADLINE: Duration = Duration::from_secs(10);

/// Resources returned per list page
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug)]
struct Lease {
    message: BrokerMessage,
    expires_at: Instant,
}

#[derive(Debug)]
struct SubscriptionEntry {
    path: SubscriptionPath,
    topic: String,
    pending: VecDeque<BrokerMessage>,
    outstanding: HashMap<AckToken, Lease>,
}

impl SubscriptionEntry {
    fn to_resource(&self) -> Subscription {
        Subscription {
            name: self.path.to_string(),
            topic: self.topic.clone(),
        }
    }

    /// Return every lease that expired by `now` to the pending queue
    fn expire_leases(&mut self, now: Instant) {
        let expired: Vec<AckToken> = self
            .outstanding
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(token, _)| token.clone())
            .collect();

        let mut returned: Vec<BrokerMessage> = expired
            .iter()
            .filter_map(|token| self.outstanding.remove(token))
            .map(|lease| lease.message)
            .collect();
        returned.sort_by(|a, b| a.publish_time.cmp(&b.publish_time));
        self.pending.extend(returned);
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    topics: Vec<TopicPath>,
    subscriptions: Vec<SubscriptionEntry>,
    next_message_id: u64,
    pull_failures: VecDeque<PubSubError>,
    pulls_before_failure: usize,
}

impl BrokerState {
    fn subscription_mut(&mut self, path: &SubscriptionPath) -> PubSubResult<&mut SubscriptionEntry> {
        self.subscriptions
            .iter_mut()
            .find(|entry| entry.path == *path)
            .ok_or_else(|| PubSubError::not_found(path.to_string()))
    }
}

/// Broker double holding all state in memory
#[derive(Debug)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    page_size: usize,
    ack_deadline: Duration,
    pull_stall: Option<Duration>,
    pull_calls: AtomicUsize,
    acknowledge_calls: AtomicUsize,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
            page_size: DEFAULT_PAGE_SIZE,
            ack_deadline: DEFAULT_ACK_DEADLINE,
            pull_stall: None,
            pull_calls: AtomicUsize::new(0),
            acknowledge_calls: AtomicUsize::new(0),
        }
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return at most `page_size` resources per list call
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_ack_deadline(mut self, ack_deadline: Duration) -> Self {
        self.ack_deadline = ack_deadline;
        self
    }

    /// Make every pull wait this long before answering
    pub fn with_pull_stall(mut self, stall: Duration) -> Self {
        self.pull_stall = Some(stall);
        self
    }

    /// Fail the next pulls with these errors, in order
    pub async fn fail_next_pulls(&self, errors: Vec<PubSubError>) {
        self.fail_pulls_after(0, errors).await;
    }

    /// Let `successful` pulls through, then fail the following ones with `errors`
    pub async fn fail_pulls_after(&self, successful: usize, errors: Vec<PubSubError>) {
        let mut state = self.state.lock().await;
        state.pulls_before_failure = successful;
        state.pull_failures.extend(errors);
    }

    /// Expire every outstanding lease on a subscription immediately
    pub async fn redeliver_unacked(&self, subscription: &SubscriptionPath) -> PubSubResult<()> {
        let mut state = self.state.lock().await;
        let entry = state.subscription_mut(subscription)?;
        entry.expire_leases(Instant::now() + self.ack_deadline);
        Ok(())
    }

    /// Messages waiting for delivery on a subscription
    pub async fn pending_count(&self, subscription: &SubscriptionPath) -> usize {
        let state = self.state.lock().await;
        state
            .subscriptions
            .iter()
            .find(|entry| entry.path == *subscription)
            .map_or(0, |entry| entry.pending.len())
    }

    /// Messages delivered but not yet acknowledged on a subscription
    pub async fn outstanding_count(&self, subscription: &SubscriptionPath) -> usize {
        let state = self.state.lock().await;
        state
            .subscriptions
            .iter()
            .find(|entry| entry.path == *subscription)
            .map_or(0, |entry| entry.outstanding.len())
    }

    /// Pull round trips received so far, including failed ones
    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    /// Acknowledge round trips received so far
    pub fn acknowledge_calls(&self) -> usize {
        self.acknowledge_calls.load(Ordering::SeqCst)
    }

    fn page<T>(&self, items: Vec<T>, page_token: Option<&str>) -> PubSubResult<Page<T>> {
        let start = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| PubSubError::invalid_argument(format!("invalid page token '{token}'")))?,
            None => 0,
        };
        let total = items.len();
        let end = start.saturating_add(self.page_size).min(total);
        let items = items.into_iter().skip(start).take(end.saturating_sub(start)).collect();

        if end < total {
            Ok(Page {
                items,
                next_page_token: Some(end.to_string()),
            })
        } else {
            Ok(Page::last(items))
        }
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn create_topic(&self, topic: &TopicPath) -> PubSubResult<Topic> {
        let mut state = self.state.lock().await;
        if state.topics.contains(topic) {
            return Err(PubSubError::already_exists(topic.to_string()));
        }
        state.topics.push(topic.clone());
        Ok(Topic {
            name: topic.to_string(),
        })
    }

    async fn list_topics(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> PubSubResult<Page<Topic>> {
        let state = self.state.lock().await;
        let topics = state
            .topics
            .iter()
            .filter(|topic| topic.project() == project)
            .map(|topic| Topic {
                name: topic.to_string(),
            })
            .collect();
        self.page(topics, page_token)
    }

    async fn delete_topic(&self, topic: &TopicPath) -> PubSubResult<()> {
        let mut state = self.state.lock().await;
        let position = state
            .topics
            .iter()
            .position(|t| t == topic)
            .ok_or_else(|| PubSubError::not_found(topic.to_string()))?;
        state.topics.remove(position);

        let name = topic.to_string();
        for entry in state.subscriptions.iter_mut().filter(|e| e.topic == name) {
            entry.topic = DELETED_TOPIC.to_string();
        }
        Ok(())
    }

    async fn create_subscription(
        &self,
        subscription: &SubscriptionPath,
        topic: &TopicPath,
    ) -> PubSubResult<Subscription> {
        let mut state = self.state.lock().await;
        if !state.topics.contains(topic) {
            return Err(PubSubError::not_found(topic.to_string()));
        }
        if state.subscriptions.iter().any(|e| e.path == *subscription) {
            return Err(PubSubError::already_exists(subscription.to_string()));
        }

        let entry = SubscriptionEntry {
            path: subscription.clone(),
            topic: topic.to_string(),
            pending: VecDeque::new(),
            outstanding: HashMap::new(),
        };
        let resource = entry.to_resource();
        state.subscriptions.push(entry);
        Ok(resource)
    }

    async fn list_subscriptions(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> PubSubResult<Page<Subscription>> {
        let state = self.state.lock().await;
        let subscriptions = state
            .subscriptions
            .iter()
            .filter(|entry| entry.path.project() == project)
            .map(SubscriptionEntry::to_resource)
            .collect();
        self.page(subscriptions, page_token)
    }

    async fn delete_subscription(&self, subscription: &SubscriptionPath) -> PubSubResult<()> {
        let mut state = self.state.lock().await;
        let position = state
            .subscriptions
            .iter()
            .position(|e| e.path == *subscription)
            .ok_or_else(|| PubSubError::not_found(subscription.to_string()))?;
        state.subscriptions.remove(position);
        Ok(())
    }

    async fn publish(&self, topic: &TopicPath, message: OutgoingMessage) -> PubSubResult<String> {
        let mut state = self.state.lock().await;
        if !state.topics.contains(topic) {
            return Err(PubSubError::not_found(topic.to_string()));
        }

        state.next_message_id += 1;
        let stored = BrokerMessage {
            message_id: state.next_message_id.to_string(),
            data: message.data,
            attributes: message.attributes,
            publish_time: Utc::now(),
        };

        let name = topic.to_string();
        for entry in state.subscriptions.iter_mut().filter(|e| e.topic == name) {
            entry.pending.push_back(stored.clone());
        }
        Ok(stored.message_id)
    }

    async fn pull(
        &self,
        subscription: &SubscriptionPath,
        max_messages: u32,
    ) -> PubSubResult<Vec<ReceivedMessage>> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(stall) = self.pull_stall {
            tokio::time::sleep(stall).await;
        }

        let mut state = self.state.lock().await;
        if !state.pull_failures.is_empty() {
            if state.pulls_before_failure > 0 {
                state.pulls_before_failure -= 1;
            } else if let Some(error) = state.pull_failures.pop_front() {
                return Err(error);
            }
        }

        let now = Instant::now();
        let expires_at = now + self.ack_deadline;
        let entry = state.subscription_mut(subscription)?;
        entry.expire_leases(now);

        let take = (max_messages as usize).min(entry.pending.len());
        let mut delivered = Vec::with_capacity(take);
        for message in entry.pending.drain(..take) {
            let ack_token = AckToken::new(Uuid::new_v4().to_string());
            entry.outstanding.insert(
                ack_token.clone(),
                Lease {
                    message: message.clone(),
                    expires_at,
                },
            );
            delivered.push(ReceivedMessage { ack_token, message });
        }
        Ok(delivered)
    }

    async fn acknowledge(
        &self,
        subscription: &SubscriptionPath,
        ack_tokens: &[AckToken],
    ) -> PubSubResult<()> {
        self.acknowledge_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        let entry = state.subscription_mut(subscription)?;
        if let Some(unknown) = ack_tokens
            .iter()
            .find(|token| !entry.outstanding.contains_key(*token))
        {
            return Err(PubSubError::invalid_argument(format!(
                "unknown or expired ack id '{unknown}' for {subscription}"
            )));
        }

        for token in ack_tokens {
            entry.outstanding.remove(token);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> TopicPath {
        TopicPath::new("demo", "orders").unwrap()
    }

    fn subscription() -> SubscriptionPath {
        SubscriptionPath::new("demo", "orders-audit").unwrap()
    }

    fn message(text: &str) -> OutgoingMessage {
        OutgoingMessage {
            data: text.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_publish_fans_out_to_bound_subscriptions() {
        let broker = InMemoryBroker::new();
        broker.create_topic(&topic()).await.unwrap();
        broker
            .create_subscription(&subscription(), &topic())
            .await
            .unwrap();
        let other = SubscriptionPath::new("demo", "orders-billing").unwrap();
        broker.create_subscription(&other, &topic()).await.unwrap();

        broker.publish(&topic(), message("a")).await.unwrap();

        assert_eq!(broker.pending_count(&subscription()).await, 1);
        assert_eq!(broker.pending_count(&other).await, 1);
    }

    #[tokio::test]
    async fn test_unacked_messages_are_redelivered_after_expiry() {
        let broker = InMemoryBroker::new();
        broker.create_topic(&topic()).await.unwrap();
        broker
            .create_subscription(&subscription(), &topic())
            .await
            .unwrap();
        broker.publish(&topic(), message("a")).await.unwrap();

        let first = broker.pull(&subscription(), 10).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(broker.pull(&subscription(), 10).await.unwrap().is_empty());

        broker.redeliver_unacked(&subscription()).await.unwrap();
        let second = broker.pull(&subscription(), 10).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].message.message_id, first[0].message.message_id);
        assert_ne!(second[0].ack_token, first[0].ack_token);
    }

    #[tokio::test]
    async fn test_lease_expires_after_ack_deadline() {
        let broker = InMemoryBroker::new().with_ack_deadline(Duration::from_millis(20));
        broker.create_topic(&topic()).await.unwrap();
        broker
            .create_subscription(&subscription(), &topic())
            .await
            .unwrap();
        broker.publish(&topic(), message("a")).await.unwrap();

        assert_eq!(broker.pull(&subscription(), 10).await.unwrap().len(), 1);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(broker.pull(&subscription(), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_acknowledge_rejects_unknown_token_without_partial_effect() {
        let broker = InMemoryBroker::new();
        broker.create_topic(&topic()).await.unwrap();
        broker
            .create_subscription(&subscription(), &topic())
            .await
            .unwrap();
        broker.publish(&topic(), message("a")).await.unwrap();
        let delivered = broker.pull(&subscription(), 10).await.unwrap();

        let tokens = vec![delivered[0].ack_token.clone(), AckToken::new("bogus")];
        let result = broker.acknowledge(&subscription(), &tokens).await;
        assert!(matches!(result, Err(PubSubError::InvalidArgument { .. })));
        assert_eq!(broker.outstanding_count(&subscription()).await, 1);
        assert_eq!(broker.acknowledge_calls(), 1);
    }

    #[tokio::test]
    async fn test_deleting_topic_detaches_subscriptions() {
        let broker = InMemoryBroker::new();
        broker.create_topic(&topic()).await.unwrap();
        broker
            .create_subscription(&subscription(), &topic())
            .await
            .unwrap();

        broker.delete_topic(&topic()).await.unwrap();
        let page = broker.list_subscriptions("demo", None).await.unwrap();
        assert_eq!(page.items[0].topic, DELETED_TOPIC);
    }

    #[tokio::test]
    async fn test_listing_is_paginated_and_project_scoped() {
        let broker = InMemoryBroker::new().with_page_size(2);
        for id in ["aaa", "bbb", "ccc"] {
            broker
                .create_topic(&TopicPath::new("demo", id).unwrap())
                .await
                .unwrap();
        }
        broker
            .create_topic(&TopicPath::new("other", "ddd").unwrap())
            .await
            .unwrap();

        let first = broker.list_topics("demo", None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let second = broker.list_topics("demo", Some("2")).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].id(), "ccc");
        assert_eq!(second.next_page_token, None);

        let result = broker.list_topics("demo", Some("garbage")).await;
        assert!(matches!(result, Err(PubSubError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_injected_pull_failures_are_consumed_in_order() {
        let broker = InMemoryBroker::new();
        broker.create_topic(&topic()).await.unwrap();
        broker
            .create_subscription(&subscription(), &topic())
            .await
            .unwrap();
        broker
            .fail_next_pulls(vec![
                PubSubError::unavailable("first"),
                PubSubError::deadline_exceeded("second"),
            ])
            .await;

        assert_eq!(
            broker.pull(&subscription(), 1).await,
            Err(PubSubError::unavailable("first"))
        );
        assert_eq!(
            broker.pull(&subscription(), 1).await,
            Err(PubSubError::deadline_exceeded("second"))
        );
        assert!(broker.pull(&subscription(), 1).await.unwrap().is_empty());
        assert_eq!(broker.pull_calls(), 3);
    }
}
