//! Resource and message types exchanged with the broker
//!
//! Broker-level types ([`Topic`], [`Subscription`], [`BrokerMessage`],
//! [`ReceivedMessage`]) mirror what the broker stores. [`Message`] is the
//! decoded form handed back to callers of the pull loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::paths::trailing_segment;

/// Topic resource as reported by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Fully-qualified name, `projects/{project}/topics/{topic_id}`
    pub name: String,
}

impl Topic {
    pub fn id(&self) -> &str {
        trailing_segment(&self.name)
    }
}

/// Subscription resource as reported by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Fully-qualified name, `projects/{project}/subscriptions/{subscription_id}`
    pub name: String,
    /// Fully-qualified name of the bound topic. The broker reports
    /// `_deleted-topic_` once the topic has been deleted.
    pub topic: String,
}

impl Subscription {
    pub fn id(&self) -> &str {
        trailing_segment(&self.name)
    }
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// A final page with no continuation
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }
}

/// Broker-issued single-use handle for acknowledging one delivery
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckToken(String);

impl AckToken {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AckToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message submitted for publishing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutgoingMessage {
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
}

/// Message as stored and delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub message_id: String,
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
    pub publish_time: DateTime<Utc>,
}

/// One delivery returned by a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub ack_token: AckToken,
    pub message: BrokerMessage,
}

/// Decoded message returned from the pull loop
///
/// `ack_token` is `Some` only for explicit-ack pulls; auto-ack pulls have
/// already spent the token before the message is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub data: String,
    pub attributes: HashMap<String, String>,
    pub publish_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_token: Option<AckToken>,
}
