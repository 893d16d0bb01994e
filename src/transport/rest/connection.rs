//! Pure endpoint handling for the REST adapter
//!
//! Turns the configured `host:port` endpoint into the base URL all requests
//! are built against, and builds per-resource request URLs.

use crate::config::ConfigError;
use crate::protocol::{SubscriptionPath, TopicPath};
use url::Url;

const PROJECTS: &str = "projects";
const TOPICS: &str = "topics";
const SUBSCRIPTIONS: &str = "subscriptions";

/// Parse a broker endpoint into the API base URL (`http://host:port/v1/`)
///
/// A bare `host:port` is served over plain HTTP, as emulators expect. An
/// explicit `http://` or `https://` scheme is kept as given.
pub fn base_url(endpoint: &str) -> Result<Url, ConfigError> {
    let endpoint = endpoint.trim();
    let has_scheme = endpoint.starts_with("http://") || endpoint.starts_with("https://");
    let raw = if has_scheme {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    };

    let url = Url::parse(&raw).map_err(|_| ConfigError::InvalidEndpoint(endpoint.to_string()))?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidEndpoint(endpoint.to_string()));
    }
    // Without a scheme the port is mandatory; with one, the scheme default applies.
    let port = if has_scheme {
        url.port_or_known_default()
    } else {
        url.port()
    };
    if port.is_none() {
        return Err(ConfigError::InvalidEndpoint(format!(
            "{endpoint} (expected host:port)"
        )));
    }

    let mut base = url;
    base.set_path("/v1/");
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}

/// Resource URL builder rooted at the API base
#[derive(Debug, Clone)]
pub struct ResourceUrls {
    base: Url,
}

impl ResourceUrls {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Append segments to the base path, percent-encoding each one
    fn join<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base.clone();
        // http(s) bases always carry a path that segments can extend
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn topic(&self, topic: &TopicPath) -> Url {
        self.join([PROJECTS, topic.project(), TOPICS, topic.topic_id()])
    }

    pub fn topics(&self, project: &str) -> Url {
        self.join([PROJECTS, project, TOPICS])
    }

    pub fn publish(&self, topic: &TopicPath) -> Url {
        let action = format!("{}:publish", topic.topic_id());
        self.join([PROJECTS, topic.project(), TOPICS, action.as_str()])
    }

    pub fn subscription(&self, subscription: &SubscriptionPath) -> Url {
        self.join([
            PROJECTS,
            subscription.project(),
            SUBSCRIPTIONS,
            subscription.subscription_id(),
        ])
    }

    pub fn subscriptions(&self, project: &str) -> Url {
        self.join([PROJECTS, project, SUBSCRIPTIONS])
    }

    pub fn pull(&self, subscription: &SubscriptionPath) -> Url {
        self.subscription_action(subscription, "pull")
    }

    pub fn acknowledge(&self, subscription: &SubscriptionPath) -> Url {
        self.subscription_action(subscription, "acknowledge")
    }

    fn subscription_action(&self, subscription: &SubscriptionPath, verb: &str) -> Url {
        let action = format!("{}:{verb}", subscription.subscription_id());
        self.join([PROJECTS, subscription.project(), SUBSCRIPTIONS, action.as_str()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_port() {
        let url = base_url("localhost:8681").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8681/v1/");
    }

    #[test]
    fn test_explicit_scheme_is_kept() {
        let url = base_url("https://pubsub.example.com").unwrap();
        assert_eq!(url.as_str(), "https://pubsub.example.com/v1/");

        let url = base_url("http://127.0.0.1:9000/ignored?x=1").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/v1/");
    }

    #[test]
    fn test_missing_port_rejected() {
        assert!(matches!(
            base_url("localhost"),
            Err(ConfigError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(base_url("").is_err());
        assert!(base_url("not a host").is_err());
        assert!(base_url(":8681").is_err());
    }

    #[test]
    fn test_resource_urls() {
        let urls = ResourceUrls::new(base_url("localhost:8681").unwrap());
        let topic = TopicPath::new("demo", "orders").unwrap();
        let subscription = SubscriptionPath::new("demo", "orders-audit").unwrap();

        assert_eq!(
            urls.topic(&topic).as_str(),
            "http://localhost:8681/v1/projects/demo/topics/orders"
        );
        assert_eq!(
            urls.topics("demo").as_str(),
            "http://localhost:8681/v1/projects/demo/topics"
        );
        assert_eq!(
            urls.publish(&topic).as_str(),
            "http://localhost:8681/v1/projects/demo/topics/orders:publish"
        );
        assert_eq!(
            urls.pull(&subscription).as_str(),
            "http://localhost:8681/v1/projects/demo/subscriptions/orders-audit:pull"
        );
        assert_eq!(
            urls.acknowledge(&subscription).as_str(),
            "http://localhost:8681/v1/projects/demo/subscriptions/orders-audit:acknowledge"
        );
    }

    #[test]
    fn test_percent_in_id_is_encoded() {
        let urls = ResourceUrls::new(base_url("localhost:8681").unwrap());
        let topic = TopicPath::new("demo", "abc%41def").unwrap();
        let decoy = TopicPath::new("demo", "abcAdef").unwrap();

        assert_eq!(
            urls.topic(&topic).as_str(),
            "http://localhost:8681/v1/projects/demo/topics/abc%2541def"
        );
        assert_eq!(
            urls.publish(&topic).as_str(),
            "http://localhost:8681/v1/projects/demo/topics/abc%2541def:publish"
        );
        assert_ne!(urls.topic(&topic), urls.topic(&decoy));
    }

    #[test]
    fn test_dot_segment_project_never_reaches_a_url() {
        assert!(TopicPath::new("..", "orders").is_err());
        assert!(SubscriptionPath::new(".", "orders-audit").is_err());

        let urls = ResourceUrls::new(base_url("localhost:8681").unwrap());
        let topic = TopicPath::new("demo.v2", "orders").unwrap();
        assert_eq!(
            urls.topic(&topic).path(),
            "/v1/projects/demo.v2/topics/orders"
        );
    }
}
