//! Broker capability abstraction
//!
//! [`MessageBroker`] is the full set of operations the messaging client needs
//! from a remote broker. The REST adapter in [`rest`] talks to a real endpoint;
//! [`crate::testing::InMemoryBroker`] implements the same contract in memory so
//! the pull loop and its retry policy can be exercised without a live broker.

use crate::error::PubSubResult;
use crate::protocol::{
    AckToken, OutgoingMessage, Page, ReceivedMessage, Subscription, SubscriptionPath, Topic,
    TopicPath,
};

pub mod rest;

/// Operations a Pub/Sub-compatible broker provides
#[async_trait::async_trait]
pub trait MessageBroker: Send + Sync {
    /// Create a topic; `AlreadyExists` if it is present
    async fn create_topic(&self, topic: &TopicPath) -> PubSubResult<Topic>;

    /// One page of the project's topics, continuing from `page_token`
    async fn list_topics(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> PubSubResult<Page<Topic>>;

    /// Delete a topic; `NotFound` if it is absent
    async fn delete_topic(&self, topic: &TopicPath) -> PubSubResult<()>;

    /// Create a subscription bound to `topic`
    async fn create_subscription(
        &self,
        subscription: &SubscriptionPath,
        topic: &TopicPath,
    ) -> PubSubResult<Subscription>;

    /// One page of the project's subscriptions, continuing from `page_token`
    async fn list_subscriptions(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> PubSubResult<Page<Subscription>>;

    /// Delete a subscription; `NotFound` if it is absent
    async fn delete_subscription(&self, subscription: &SubscriptionPath) -> PubSubResult<()>;

    /// Publish one message and return the broker-assigned id once it is durable
    async fn publish(&self, topic: &TopicPath, message: OutgoingMessage) -> PubSubResult<String>;

    /// Return-immediately pull of at most `max_messages` deliveries
    async fn pull(
        &self,
        subscription: &SubscriptionPath,
        max_messages: u32,
    ) -> PubSubResult<Vec<ReceivedMessage>>;

    /// Acknowledge a batch of deliveries
    async fn acknowledge(
        &self,
        subscription: &SubscriptionPath,
        ack_tokens: &[AckToken],
    ) -> PubSubResult<()>;
}

#[async_trait::async_trait]
impl<B: MessageBroker + ?Sized> MessageBroker for std::sync::Arc<B> {
    async fn create_topic(&self, topic: &TopicPath) -> PubSubResult<Topic> {
        (**self).create_topic(topic).await
    }

    async fn list_topics(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> PubSubResult<Page<Topic>> {
        (**self).list_topics(project, page_token).await
    }

    async fn delete_topic(&self, topic: &TopicPath) -> PubSubResult<()> {
        (**self).delete_topic(topic).await
    }

    async fn create_subscription(
        &self,
        subscription: &SubscriptionPath,
        topic: &TopicPath,
    ) -> PubSubResult<Subscription> {
        (**self).create_subscription(subscription, topic).await
    }

    async fn list_subscriptions(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> PubSubResult<Page<Subscription>> {
        (**self).list_subscriptions(project, page_token).await
    }

    async fn delete_subscription(&self, subscription: &SubscriptionPath) -> PubSubResult<()> {
        (**self).delete_subscription(subscription).await
    }

    async fn publish(&self, topic: &TopicPath, message: OutgoingMessage) -> PubSubResult<String> {
        (**self).publish(topic, message).await
    }

    async fn pull(
        &self,
        subscription: &SubscriptionPath,
        max_messages: u32,
    ) -> PubSubResult<Vec<ReceivedMessage>> {
        (**self).pull(subscription, max_messages).await
    }

    async fn acknowledge(
        &self,
        subscription: &SubscriptionPath,
        ack_tokens: &[AckToken],
    ) -> PubSubResult<()> {
        (**self).acknowledge(subscription, ack_tokens).await
    }
}

