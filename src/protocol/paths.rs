//! Canonical resource paths and identifier validation
//!
//! Topic and subscription paths are pure functions of their identifiers:
//!
//! - Topic: `projects/{project}/topics/{topic_id}`
//! - Subscription: `projects/{project}/subscriptions/{subscription_id}`
//!
//! Identifiers are validated before a path is built so that no two distinct
//! `(project, id)` pairs can render to the same path.

use crate::error::{PubSubError, PubSubResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const PROJECTS: &str = "projects";
const TOPICS: &str = "topics";
const SUBSCRIPTIONS: &str = "subscriptions";

static RESOURCE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9\-_.~+%]{2,254}$").expect("resource id pattern is valid")
});

/// `projects/{project}`
pub fn project_path(project: &str) -> String {
    format!("{PROJECTS}/{project}")
}

/// Last `/`-separated segment of a resource name
pub fn trailing_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Validate a project identifier
pub fn validate_project_id(project: &str) -> PubSubResult<()> {
    if project.is_empty() {
        return Err(PubSubError::invalid_argument("project id must not be empty"));
    }
    if project.contains(&['/', '?', '#'][..]) || project.chars().any(char::is_whitespace) {
        return Err(PubSubError::invalid_argument(format!(
            "project id '{project}' must not contain '/', '?', '#' or whitespace"
        )));
    }
    if project == "." || project == ".." {
        return Err(PubSubError::invalid_argument(format!(
            "project id '{project}' is not a valid path segment"
        )));
    }
    Ok(())
}

/// Validate a topic or subscription identifier against the broker's naming rule
pub fn validate_resource_id(kind: &str, id: &str) -> PubSubResult<()> {
    if !RESOURCE_ID.is_match(id) {
        return Err(PubSubError::invalid_argument(format!(
            "{kind} id '{id}' must be 3-255 characters, start with a letter, \
             and contain only letters, digits, or -_.~+%"
        )));
    }
    if id.to_ascii_lowercase().starts_with("goog") {
        return Err(PubSubError::invalid_argument(format!(
            "{kind} id '{id}' must not start with 'goog'"
        )));
    }
    Ok(())
}

/// Split `projects/{project}/{collection}/{id}` into its parts
fn parse_resource<'a>(path: &'a str, collection: &str) -> PubSubResult<(&'a str, &'a str)> {
    let parts: Vec<&str> = path.split('/').collect();
    match parts.as_slice() {
        [PROJECTS, project, kind, id] if *kind == collection => Ok((project, id)),
        _ => Err(PubSubError::invalid_argument(format!(
            "'{path}' is not of the form {PROJECTS}/{{project}}/{collection}/{{id}}"
        ))),
    }
}

/// Fully-qualified topic name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicPath {
    project: String,
    topic_id: String,
}

impl TopicPath {
    pub fn new(project: &str, topic_id: &str) -> PubSubResult<Self> {
        validate_project_id(project)?;
        validate_resource_id("topic", topic_id)?;
        Ok(Self {
            project: project.to_string(),
            topic_id: topic_id.to_string(),
        })
    }

    /// Parse a canonical topic path
    pub fn parse(path: &str) -> PubSubResult<Self> {
        let (project, topic_id) = parse_resource(path, TOPICS)?;
        Self::new(project, topic_id)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn topic_id(&self) -> &str {
        &self.topic_id
    }
}

impl fmt::Display for TopicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PROJECTS}/{}/{TOPICS}/{}", self.project, self.topic_id)
    }
}

/// Fully-qualified subscription name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionPath {
    project: String,
    subscription_id: String,
}

impl SubscriptionPath {
    pub fn new(project: &str, subscription_id: &str) -> PubSubResult<Self> {
        validate_project_id(project)?;
        validate_resource_id("subscription", subscription_id)?;
        Ok(Self {
            project: project.to_string(),
            subscription_id: subscription_id.to_string(),
        })
    }

    /// Parse a canonical subscription path
    pub fn parse(path: &str) -> PubSubResult<Self> {
        let (project, subscription_id) = parse_resource(path, SUBSCRIPTIONS)?;
        Self::new(project, subscription_id)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }
}

impl fmt::Display for SubscriptionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PROJECTS}/{}/{SUBSCRIPTIONS}/{}",
            self.project, self.subscription_id
        )
    }
}
