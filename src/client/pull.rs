//! Pull-drain-acknowledge loop
//!
//! [`MessagingClient::pull_all`] issues return-immediately pull requests until
//! one comes back empty. That empty reply is the only way the loop ends; it is
//! not bounded by a message count.
//!
//! Two ack disciplines are supported and neither is a default:
//!
//! - [`AckMode::Auto`] acknowledges each batch as soon as it arrives. The call
//!   is self-contained, but a message is lost for good if the caller fails
//!   after the loop returns.
//! - [`AckMode::Explicit`] hands back every message with its ack token. The
//!   caller must [`MessagingClient::ack`] each one, otherwise the broker
//!   redelivers it once its ack deadline passes.

use super::retry::RetryDecision;
use super::MessagingClient;
use crate::broker_span;
use crate::error::{PubSubError, PubSubResult};
use crate::protocol::{AckToken, Message, ReceivedMessage, SubscriptionPath};
use crate::transport::MessageBroker;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Upper bound on messages requested per pull
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// How pulled messages are acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Acknowledge every batch inside the pull call
    Auto,
    /// Return ack tokens; the caller acknowledges each message
    Explicit,
}

/// Options for one [`MessagingClient::pull_all`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullOptions {
    pub batch_size: u32,
    pub ack_mode: AckMode,
}

impl PullOptions {
    pub fn new(ack_mode: AckMode) -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            ack_mode,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }
}

impl<B: MessageBroker> MessagingClient<B> {
    /// Drain every message currently available on a subscription
    ///
    /// Transient failures of a pull request are retried within the retry
    /// policy's deadline budget. Batches acknowledged before a later failure
    /// stay acknowledged.
    pub async fn pull_all(
        &self,
        subscription_path: &str,
        options: PullOptions,
    ) -> PubSubResult<Vec<Message>> {
        let subscription = SubscriptionPath::parse(subscription_path)?;
        if options.batch_size == 0 {
            return Err(PubSubError::invalid_argument("batch size must be at least 1"));
        }

        let span = broker_span!(
            "pull_all",
            subscription = %subscription,
            ack_mode = ?options.ack_mode,
            batch_size = options.batch_size
        );

        async {
            let mut messages = Vec::new();
            loop {
                let batch = self.pull_with_retry(&subscription, options.batch_size).await?;
                if batch.is_empty() {
                    break;
                }
                debug!(received = batch.len(), "Pulled batch");

                match options.ack_mode {
                    AckMode::Auto => {
                        let tokens: Vec<AckToken> =
                            batch.iter().map(|r| r.ack_token.clone()).collect();
                        self.bounded(
                            "acknowledge",
                            self.request_timeout,
                            self.broker.acknowledge(&subscription, &tokens),
                        )
                        .await?;
                        messages.extend(batch.into_iter().map(|r| decode(r, false)));
                    }
                    AckMode::Explicit => {
                        messages.extend(batch.into_iter().map(|r| decode(r, true)));
                    }
                }
            }

            info!(count = messages.len(), "Drained subscription");
            Ok::<_, PubSubError>(messages)
        }
        .instrument(span)
        .await
    }

    /// One pull request, retried on transient failure until its budget is spent
    async fn pull_with_retry(
        &self,
        subscription: &SubscriptionPath,
        batch_size: u32,
    ) -> PubSubResult<Vec<ReceivedMessage>> {
        let started = Instant::now();
        let mut retries = 0;

        loop {
            let remaining = self.retry_policy.deadline.saturating_sub(started.elapsed());
            let limit = remaining.min(self.request_timeout);
            let result = self
                .bounded("pull", limit, self.broker.pull(subscription, batch_size))
                .await;

            let error = match result {
                Ok(batch) => return Ok(batch),
                Err(e) => e,
            };

            match self.retry_policy.decide(&error, retries, started.elapsed()) {
                RetryDecision::Retry { attempt, delay } => {
                    warn!(
                        subscription = %subscription,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Pull failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retries = attempt;
                }
                RetryDecision::GiveUp => return Err(error),
            }
        }
    }
}

/// Decode a delivery into the caller-facing message
fn decode(received: ReceivedMessage, keep_token: bool) -> Message {
    let ReceivedMessage { ack_token, message } = received;
    let data = match String::from_utf8(message.data) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                message_id = %message.message_id,
                "Payload is not valid UTF-8, replacing invalid sequences"
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };

    Message {
        message_id: message.message_id,
        data,
        attributes: message.attributes,
        publish_time: message.publish_time,
        ack_token: keep_token.then_some(ack_token),
    }
}
