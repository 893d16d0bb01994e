//! JSON bodies of the Pub/Sub REST API
//!
//! Field names follow the API's camelCase convention. Message data travels
//! base64-encoded with the standard alphabet.

use crate::error::{ErrorCode, PubSubError};
use crate::protocol::{AckToken, BrokerMessage, ReceivedMessage, Subscription, Topic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTopicsResponse {
    #[serde(default)]
    pub topics: Vec<TopicResource>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSubscriptionsResponse {
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionResource>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublishRequest {
    pub messages: Vec<PubsubMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    #[serde(default)]
    pub message_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsubMessage {
    #[serde(default, with = "base64_data")]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub return_immediately: bool,
    pub max_messages: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    #[serde(default)]
    pub received_messages: Vec<ReceivedMessageBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessageBody {
    pub ack_id: String,
    pub message: PubsubMessage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
    pub ack_ids: Vec<String>,
}

/// Google API error envelope: `{"error": {"code", "message", "status"}}`
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

mod base64_data {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

impl TopicResource {
    pub fn into_topic(self) -> Option<Topic> {
        self.name.map(|name| Topic { name })
    }
}

impl SubscriptionResource {
    pub fn into_subscription(self) -> Option<Subscription> {
        let topic = self.topic;
        self.name.map(|name| Subscription { name, topic })
    }
}

impl ReceivedMessageBody {
    /// Convert to the broker-level delivery
    ///
    /// The emulator always stamps id and publish time; their absence means
    /// the reply is not a valid delivery.
    pub fn into_received(self) -> Result<ReceivedMessage, PubSubError> {
        let message_id = self
            .message
            .message_id
            .ok_or_else(|| PubSubError::unknown("pulled message has no messageId"))?;
        let publish_time = self
            .message
            .publish_time
            .ok_or_else(|| PubSubError::unknown(format!("message {message_id} has no publishTime")))?;

        Ok(ReceivedMessage {
            ack_token: AckToken::new(self.ack_id),
            message: BrokerMessage {
                message_id,
                data: self.message.data,
                attributes: self.message.attributes,
                publish_time,
            },
        })
    }
}

impl ErrorEnvelope {
    /// Classify the envelope; the status string wins over the numeric code
    pub fn into_error(self, http_status: u16) -> PubSubError {
        let code = match self.error.status.as_deref() {
            Some(status) if !status.is_empty() => ErrorCode::from_status(status),
            _ => ErrorCode::from_http_status(self.error.code.unwrap_or(http_status)),
        };
        code.into_error(self.error.message)
    }
}

/// Normalise a page token; the API signals "no more pages" with an empty string
pub fn next_token(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}
