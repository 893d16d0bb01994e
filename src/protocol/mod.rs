//! Resource naming and message types for the Pub/Sub data model

pub mod messages;
pub mod paths;

pub use messages::*;
pub use paths::{
    project_path, trailing_segment, validate_project_id, validate_resource_id,
    SubscriptionPath, TopicPath,
};
