//! Caller-owned presentation state
//!
//! Holds the active project and the topic and subscription the user has
//! selected. The presentation layer owns one [`SessionState`] and passes it to
//! each handler; nothing here is global.

use crate::error::PubSubError;
use crate::protocol::{validate_project_id, validate_resource_id, SubscriptionPath, TopicPath};
use crate::storage::{KeyValueStore, StorageError};
use thiserror::Error;
use tracing::info;

/// Store key holding the active project
pub const PROJECT_KEY: &str = "project_id";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Invalid(#[from] PubSubError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    project_id: Option<String>,
    selected_topic: Option<String>,
    selected_subscription: Option<String>,
}

impl SessionState {
    /// Start a session from the persisted project, if any
    pub fn restore(store: &KeyValueStore) -> Self {
        let project_id = store
            .get(PROJECT_KEY)
            .filter(|project| validate_project_id(project).is_ok())
            .map(str::to_string);
        Self {
            project_id,
            ..Self::default()
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn selected_topic(&self) -> Option<&str> {
        self.selected_topic.as_deref()
    }

    pub fn selected_subscription(&self) -> Option<&str> {
        self.selected_subscription.as_deref()
    }

    /// Switch the active project and persist it
    ///
    /// The store is only written when the project differs from the persisted
    /// one. Changing project clears the topic and subscription selections.
    pub fn select_project(
        &mut self,
        store: &mut KeyValueStore,
        project: &str,
    ) -> Result<(), SessionError> {
        validate_project_id(project)?;

        if store.get(PROJECT_KEY) != Some(project) {
            store.set(PROJECT_KEY, project)?;
            info!(project, "Persisted active project");
        }

        if self.project_id.as_deref() != Some(project) {
            self.project_id = Some(project.to_string());
            self.selected_topic = None;
            self.selected_subscription = None;
        }
        Ok(())
    }

    /// Select a topic; a different topic clears the subscription selection
    pub fn select_topic(&mut self, topic_id: &str) -> Result<(), PubSubError> {
        validate_resource_id("topic", topic_id)?;
        if self.selected_topic.as_deref() != Some(topic_id) {
            self.selected_topic = Some(topic_id.to_string());
            self.selected_subscription = None;
        }
        Ok(())
    }

    pub fn select_subscription(&mut self, subscription_id: &str) -> Result<(), PubSubError> {
        validate_resource_id("subscription", subscription_id)?;
        self.selected_subscription = Some(subscription_id.to_string());
        Ok(())
    }

    /// Canonical path of the selected topic, once project and topic are set
    pub fn topic_path(&self) -> Option<TopicPath> {
        let project = self.project_id.as_deref()?;
        let topic = self.selected_topic.as_deref()?;
        TopicPath::new(project, topic).ok()
    }

    /// Canonical path of the selected subscription, once project and subscription are set
    pub fn subscription_path(&self) -> Option<SubscriptionPath> {
        let project = self.project_id.as_deref()?;
        let subscription = self.selected_subscription.as_deref()?;
        SubscriptionPath::new(project, subscription).ok()
    }
}
