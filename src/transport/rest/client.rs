//! Impure I/O for the REST adapter
//!
//! Sends each broker capability as one HTTP request against the configured
//! endpoint and classifies every failure into the [`PubSubError`] taxonomy.

use super::connection::{base_url, ResourceUrls};
use super::wire::{
    next_token, AcknowledgeRequest, ErrorEnvelope, ListSubscriptionsResponse, ListTopicsResponse,
    PublishRequest, PublishResponse, PubsubMessage, PullRequest, PullResponse,
    SubscriptionResource, TopicResource,
};
use crate::config::{BrokerSection, ConfigError};
use crate::error::{ErrorCode, PubSubError, PubSubResult};
use crate::protocol::{
    AckToken, OutgoingMessage, Page, ReceivedMessage, Subscription, SubscriptionPath, Topic,
    TopicPath,
};
use crate::transport::MessageBroker;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

/// Broker adapter speaking the Pub/Sub REST/JSON API
#[derive(Debug, Clone)]
pub struct RestBroker {
    client: Client,
    urls: ResourceUrls,
}

impl RestBroker {
    pub fn new(config: &BrokerSection) -> Result<Self, ConfigError> {
        let base = base_url(&config.endpoint)?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::InvalidConfig(format!("HTTP client setup failed: {e}")))?;

        info!(endpoint = %base, "Configured REST broker adapter");
        Ok(Self {
            client,
            urls: ResourceUrls::new(base),
        })
    }

    /// API base URL every request is built against
    pub fn base_url(&self) -> &url::Url {
        self.urls.base()
    }

    /// Send a request, turning any non-success reply into a classified error
    async fn send(&self, request: RequestBuilder, resource: &str) -> PubSubResult<Response> {
        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let http_status = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(classify_error_body(http_status, &body, resource))
    }

    async fn send_json<T: DeserializeOwned + Default>(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> PubSubResult<T> {
        let response = self.send(request, resource).await?;
        let body = response.text().await.map_err(classify_transport_error)?;
        decode_body(&body)
    }
}

/// Map a reqwest failure to a broker error (pure function)
fn classify_transport_error(error: reqwest::Error) -> PubSubError {
    if error.is_timeout() {
        PubSubError::deadline_exceeded(error.to_string())
    } else if error.is_connect() || error.is_request() {
        PubSubError::unavailable(error.to_string())
    } else if error.is_decode() {
        PubSubError::unknown(format!("undecodable broker reply: {error}"))
    } else {
        PubSubError::unknown(error.to_string())
    }
}

/// Map a non-success reply to a broker error (pure function)
///
/// Not-found and already-exists errors name the resource the caller asked
/// for rather than echoing the broker's prose.
fn classify_error_body(http_status: u16, body: &str, resource: &str) -> PubSubError {
    let error = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.into_error(http_status),
        Err(_) => ErrorCode::from_http_status(http_status)
            .into_error(format!("HTTP {http_status}: {}", body.trim())),
    };

    match error.code() {
        ErrorCode::NotFound => PubSubError::not_found(resource),
        ErrorCode::AlreadyExists => PubSubError::already_exists(resource),
        _ => error,
    }
}

/// Decode a JSON success body; an empty body decodes to the default value
fn decode_body<T: DeserializeOwned + Default>(body: &str) -> PubSubResult<T> {
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(body)
        .map_err(|e| PubSubError::unknown(format!("undecodable broker reply: {e}")))
}

fn page_query(page_token: Option<&str>) -> Vec<(&'static str, String)> {
    page_token
        .map(|token| vec![("pageToken", token.to_string())])
        .unwrap_or_default()
}

#[async_trait]
impl MessageBroker for RestBroker {
    async fn create_topic(&self, topic: &TopicPath) -> PubSubResult<Topic> {
        let name = topic.to_string();
        debug!(topic = %name, "PUT topic");
        let request = self
            .client
            .put(self.urls.topic(topic))
            .json(&TopicResource::default());
        let created: TopicResource = self.send_json(request, &name).await?;

        Ok(created.into_topic().unwrap_or(Topic { name }))
    }

    async fn list_topics(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> PubSubResult<Page<Topic>> {
        debug!(project, page_token, "GET topics");
        let request = self
            .client
            .get(self.urls.topics(project))
            .query(&page_query(page_token));
        let response: ListTopicsResponse = self
            .send_json(request, &crate::protocol::project_path(project))
            .await?;

        Ok(Page {
            items: response
                .topics
                .into_iter()
                .filter_map(TopicResource::into_topic)
                .collect(),
            next_page_token: next_token(response.next_page_token),
        })
    }

    async fn delete_topic(&self, topic: &TopicPath) -> PubSubResult<()> {
        let name = topic.to_string();
        debug!(topic = %name, "DELETE topic");
        self.send(self.client.delete(self.urls.topic(topic)), &name)
            .await?;
        Ok(())
    }

    async fn create_subscription(
        &self,
        subscription: &SubscriptionPath,
        topic: &TopicPath,
    ) -> PubSubResult<Subscription> {
        let name = subscription.to_string();
        let topic_name = topic.to_string();
        debug!(subscription = %name, topic = %topic_name, "PUT subscription");

        let request = self
            .client
            .put(self.urls.subscription(subscription))
            .json(&SubscriptionResource {
                name: None,
                topic: topic_name.clone(),
            });
        // A missing topic surfaces as NOT_FOUND naming the topic, since the
        // subscription path cannot be what is missing on create.
        let created: SubscriptionResource = match self.send_json(request, &name).await {
            Err(PubSubError::NotFound { .. }) => return Err(PubSubError::not_found(topic_name)),
            other => other?,
        };

        Ok(created.into_subscription().unwrap_or(Subscription {
            name,
            topic: topic_name,
        }))
    }

    async fn list_subscriptions(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> PubSubResult<Page<Subscription>> {
        debug!(project, page_token, "GET subscriptions");
        let request = self
            .client
            .get(self.urls.subscriptions(project))
            .query(&page_query(page_token));
        let response: ListSubscriptionsResponse = self
            .send_json(request, &crate::protocol::project_path(project))
            .await?;

        Ok(Page {
            items: response
                .subscriptions
                .into_iter()
                .filter_map(SubscriptionResource::into_subscription)
                .collect(),
            next_page_token: next_token(response.next_page_token),
        })
    }

    async fn delete_subscription(&self, subscription: &SubscriptionPath) -> PubSubResult<()> {
        let name = subscription.to_string();
        debug!(subscription = %name, "DELETE subscription");
        self.send(self.client.delete(self.urls.subscription(subscription)), &name)
            .await?;
        Ok(())
    }

    async fn publish(&self, topic: &TopicPath, message: OutgoingMessage) -> PubSubResult<String> {
        let name = topic.to_string();
        debug!(topic = %name, bytes = message.data.len(), "POST publish");

        let request = self
            .client
            .post(self.urls.publish(topic))
            .json(&PublishRequest {
                messages: vec![PubsubMessage {
                    data: message.data,
                    attributes: message.attributes,
                    ..Default::default()
                }],
            });
        let response: PublishResponse = self.send_json(request, &name).await?;

        response
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| PubSubError::unknown(format!("publish to {name} returned no message id")))
    }

    async fn pull(
        &self,
        subscription: &SubscriptionPath,
        max_messages: u32,
    ) -> PubSubResult<Vec<ReceivedMessage>> {
        let name = subscription.to_string();
        let request = self
            .client
            .post(self.urls.pull(subscription))
            .json(&PullRequest {
                return_immediately: true,
                max_messages,
            });
        let response: PullResponse = self.send_json(request, &name).await?;
        debug!(
            subscription = %name,
            received = response.received_messages.len(),
            "POST pull"
        );

        response
            .received_messages
            .into_iter()
            .map(|body| body.into_received())
            .collect()
    }

    async fn acknowledge(
        &self,
        subscription: &SubscriptionPath,
        ack_tokens: &[AckToken],
    ) -> PubSubResult<()> {
        let name = subscription.to_string();
        debug!(subscription = %name, count = ack_tokens.len(), "POST acknowledge");

        let request = self
            .client
            .post(self.urls.acknowledge(subscription))
            .json(&AcknowledgeRequest {
                ack_ids: ack_tokens.iter().map(|t| t.as_str().to_string()).collect(),
            });
        self.send(request, &name).await?;
        Ok(())
    }
}
