//! REST/JSON adapter for Pub/Sub-compatible brokers and emulators
//!
//! # Architecture
//!
//! - [`connection`] - Pure endpoint parsing and resource URL construction
//! - [`wire`] - JSON request and response bodies
//! - [`client`] - Impure HTTP I/O implementing [`crate::transport::MessageBroker`]
//!
//! # Usage
//!
//! ```rust,no_run
//! use pubsub_console::config::BrokerSection;
//! use pubsub_console::protocol::TopicPath;
//! use pubsub_console::transport::{rest::RestBroker, MessageBroker};
//!
//! # tokio_test::block_on(async {
//! let broker = RestBroker::new(&BrokerSection::default())?;
//! let topic = TopicPath::new("demo-project", "orders")?;
//! broker.create_topic(&topic).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod wire;

pub use client::RestBroker;
pub use connection::{base_url, ResourceUrls};
