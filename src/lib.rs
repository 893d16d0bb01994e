//! Pub/Sub console - Rust Implementation
//!
//! Client-side tooling for Pub/Sub-compatible brokers such as the local
//! emulator.
//!
//! # Overview
//!
//! This crate provides:
//! - Canonical topic and subscription paths with id validation
//! - A [`MessageBroker`] capability trait with a REST/JSON adapter and an
//!   in-memory double
//! - [`MessagingClient`]: topic and subscription lifecycle, publish, and a
//!   pull-drain-acknowledge loop with auto and explicit ack modes
//! - [`KeyValueStore`]: a small durable JSON file for user selections
//! - [`SessionState`]: explicit presentation state for a front end
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pubsub_console::{AckMode, ConsoleConfig, MessagingClient, PullOptions};
//!
//! # tokio_test::block_on(async {
//! let config = ConsoleConfig::default().with_endpoint("localhost:8681")?;
//! let client = MessagingClient::connect(&config)?;
//!
//! client.create_topic("demo-project", "orders").await?;
//! client
//!     .create_subscription("demo-project", "orders-audit", "orders")
//!     .await?;
//! client
//!     .publish("projects/demo-project/topics/orders", "hello", None)
//!     .await?;
//!
//! let messages = client
//!     .pull_all(
//!         "projects/demo-project/subscriptions/orders-audit",
//!         PullOptions::new(AckMode::Explicit),
//!     )
//!     .await?;
//! for message in &messages {
//!     if let Some(token) = &message.ack_token {
//!         client
//!             .ack("projects/demo-project/subscriptions/orders-audit", token)
//!             .await?;
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod testing;
pub mod transport;

pub use client::{AckMode, MessagingClient, PullOptions, RetryPolicy};
pub use config::{ConfigError, ConsoleConfig};
pub use error::{ErrorCode, PubSubError, PubSubResult};
pub use protocol::*;
pub use session::{SessionError, SessionState};
pub use storage::{KeyValueStore, StorageError};
pub use transport::{rest::RestBroker, MessageBroker};
