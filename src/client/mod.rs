//! Messaging client over a [`MessageBroker`]
//!
//! [`MessagingClient`] is the single entry point the presentation layer holds
//! for the lifetime of the process. It validates identifiers, builds canonical
//! resource paths, bounds every broker round trip with a deadline, and runs
//! the pull-drain-acknowledge loop in [`pull`].
//!
//! Calls are strictly sequential: the client never spawns tasks and never has
//! more than one broker request in flight.
//!
//! # Usage
//!
//! ```rust
//! use pubsub_console::client::{AckMode, MessagingClient, PullOptions};
//! use pubsub_console::testing::InMemoryBroker;
//!
//! # tokio_test::block_on(async {
//! let client = MessagingClient::new(InMemoryBroker::new());
//! client.create_topic("demo-project", "orders").await?;
//! client.create_subscription("demo-project", "orders-audit", "orders").await?;
//!
//! client
//!     .publish("projects/demo-project/topics/orders", "hello", None)
//!     .await?;
//!
//! let messages = client
//!     .pull_all(
//!         "projects/demo-project/subscriptions/orders-audit",
//!         PullOptions::new(AckMode::Auto),
//!     )
//!     .await?;
//! assert_eq!(messages[0].data, "hello");
//! # Ok::<(), pubsub_console::PubSubError>(())
//! # });
//! ```

pub mod pull;
pub mod retry;

pub use pull::{AckMode, PullOptions, DEFAULT_BATCH_SIZE};
pub use retry::{RetryDecision, RetryPolicy};

use crate::broker_span;
use crate::config::{ConfigError, ConsoleConfig};
use crate::error::{PubSubError, PubSubResult};
use crate::protocol::{
    AckToken, OutgoingMessage, Subscription, SubscriptionPath, Topic, TopicPath,
};
use crate::transport::{rest::RestBroker, MessageBroker};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, Instrument};

/// Default deadline for a single broker round trip
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for topic/subscription management and message transfer
#[derive(Debug)]
pub struct MessagingClient<B = RestBroker> {
    broker: B,
    request_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl MessagingClient<RestBroker> {
    /// Build a client talking to the configured broker endpoint
    pub fn connect(config: &ConsoleConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let broker = RestBroker::new(&config.broker)?;
        Ok(MessagingClient::new(broker)
            .with_request_timeout(config.broker.request_timeout())
            .with_retry_policy(RetryPolicy::from(&config.pull)))
    }
}

impl<B: MessageBroker> MessagingClient<B> {
    pub fn new(broker: B) -> Self {
        Self {
            broker,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Deadline applied to each broker round trip
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Retry policy for transient pull failures
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Run one broker round trip under `limit`; an elapsed deadline becomes `DeadlineExceeded`
    pub(crate) async fn bounded<T, F>(
        &self,
        operation: &str,
        limit: Duration,
        call: F,
    ) -> PubSubResult<T>
    where
        F: Future<Output = PubSubResult<T>>,
    {
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(PubSubError::deadline_exceeded(format!(
                "{operation} did not complete within {}ms",
                limit.as_millis()
            ))),
        }
    }

    /// Create a topic; fails with `AlreadyExists` if it is present
    pub async fn create_topic(&self, project: &str, topic_id: &str) -> PubSubResult<Topic> {
        let topic = TopicPath::new(project, topic_id)?;
        let span = broker_span!("create_topic", topic = %topic);
        let created = self
            .bounded("create_topic", self.request_timeout, self.broker.create_topic(&topic))
            .instrument(span)
            .await?;

        info!(topic = %created.name, "Created topic");
        Ok(created)
    }

    /// Ids of all topics in the project, in broker order, following pagination
    pub async fn list_topics(&self, project: &str) -> PubSubResult<Vec<String>> {
        crate::protocol::validate_project_id(project)?;
        let span = broker_span!("list_topics", project);

        async {
            let mut ids = Vec::new();
            let mut page_token: Option<String> = None;
            loop {
                let page = self
                    .bounded(
                        "list_topics",
                        self.request_timeout,
                        self.broker.list_topics(project, page_token.as_deref()),
                    )
                    .await?;
                ids.extend(page.items.iter().map(|topic| topic.id().to_string()));

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
            debug!(count = ids.len(), "Listed topics");
            Ok::<_, PubSubError>(ids)
        }
        .instrument(span)
        .await
    }

    /// Create a subscription bound to `topic_id` in the same project
    ///
    /// Fails with `NotFound` if the topic does not exist and `AlreadyExists`
    /// if the subscription does.
    pub async fn create_subscription(
        &self,
        project: &str,
        subscription_id: &str,
        topic_id: &str,
    ) -> PubSubResult<Subscription> {
        let subscription = SubscriptionPath::new(project, subscription_id)?;
        let topic = TopicPath::new(project, topic_id)?;
        let span = broker_span!("create_subscription", subscription = %subscription, topic = %topic);

        let created = self
            .bounded(
                "create_subscription",
                self.request_timeout,
                self.broker.create_subscription(&subscription, &topic),
            )
            .instrument(span)
            .await?;

        info!(subscription = %created.name, topic = %created.topic, "Created subscription");
        Ok(created)
    }

    /// Ids of the project's subscriptions, optionally only those bound to `topic_filter`
    ///
    /// The filter is applied client-side against the topic's canonical path.
    pub async fn list_subscriptions(
        &self,
        project: &str,
        topic_filter: Option<&str>,
    ) -> PubSubResult<Vec<String>> {
        crate::protocol::validate_project_id(project)?;
        let bound_topic = topic_filter
            .map(|topic_id| TopicPath::new(project, topic_id).map(|path| path.to_string()))
            .transpose()?;
        let span = broker_span!("list_subscriptions", project, topic = ?bound_topic);

        async {
            let mut ids = Vec::new();
            let mut page_token: Option<String> = None;
            loop {
                let page = self
                    .bounded(
                        "list_subscriptions",
                        self.request_timeout,
                        self.broker.list_subscriptions(project, page_token.as_deref()),
                    )
                    .await?;
                ids.extend(
                    page.items
                        .iter()
                        .filter(|sub| bound_topic.as_deref().map_or(true, |t| sub.topic == t))
                        .map(|sub| sub.id().to_string()),
                );

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
            debug!(count = ids.len(), "Listed subscriptions");
            Ok::<_, PubSubError>(ids)
        }
        .instrument(span)
        .await
    }

    /// Publish UTF-8 text with optional attributes and wait for the broker's message id
    pub async fn publish(
        &self,
        topic_path: &str,
        text: &str,
        attributes: Option<HashMap<String, String>>,
    ) -> PubSubResult<String> {
        let topic = TopicPath::parse(topic_path)?;
        if text.is_empty() {
            return Err(PubSubError::invalid_argument("message payload must not be empty"));
        }

        let message = OutgoingMessage {
            data: text.as_bytes().to_vec(),
            attributes: attributes.unwrap_or_default(),
        };
        let span = broker_span!("publish", topic = %topic);
        let message_id = self
            .bounded("publish", self.request_timeout, self.broker.publish(&topic, message))
            .instrument(span)
            .await?;

        debug!(topic = %topic, message_id = %message_id, "Published message");
        Ok(message_id)
    }

    /// Acknowledge one previously pulled message
    pub async fn ack(&self, subscription_path: &str, ack_token: &AckToken) -> PubSubResult<()> {
        let subscription = SubscriptionPath::parse(subscription_path)?;
        let span = broker_span!("acknowledge", subscription = %subscription);
        self.bounded(
            "acknowledge",
            self.request_timeout,
            self.broker
                .acknowledge(&subscription, std::slice::from_ref(ack_token)),
        )
        .instrument(span)
        .await?;

        debug!(subscription = %subscription, "Acknowledged message");
        Ok(())
    }

    /// Delete a topic; fails with `NotFound` if absent
    pub async fn delete_topic(&self, topic_path: &str) -> PubSubResult<()> {
        let topic = TopicPath::parse(topic_path)?;
        let span = broker_span!("delete_topic", topic = %topic);
        self.bounded("delete_topic", self.request_timeout, self.broker.delete_topic(&topic))
            .instrument(span)
            .await?;

        info!(topic = %topic, "Deleted topic");
        Ok(())
    }

    /// Delete a subscription; fails with `NotFound` if absent
    pub async fn delete_subscription(&self, subscription_path: &str) -> PubSubResult<()> {
        let subscription = SubscriptionPath::parse(subscription_path)?;
        let span = broker_span!("delete_subscription", subscription = %subscription);
        self.bounded(
            "delete_subscription",
            self.request_timeout,
            self.broker.delete_subscription(&subscription),
        )
        .instrument(span)
        .await?;

        info!(subscription = %subscription, "Deleted subscription");
        Ok(())
    }
}
