//! Configuration consumed by the conformance run.
//!
//! Built by the invoking process (CLI flags, environment) and passed
//! explicitly into the orchestrator entry point; the core reads no ambient
//! state.

use std::time::Duration;

/// Authentication applied to every request of a run. Exactly one scheme per
/// run, selected by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// No authentication
    None,
    /// HTTP basic credentials
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// Bearer token
    Bearer {
        /// The token, sent verbatim in the `Authorization` header
        token: String,
    },
}

/// Configuration of one conformance run.
#[derive(Debug, Clone)]
pub struct TesterConfig {
    /// Base URL of the API under test
    pub base_url: String,

    /// Authentication scheme
    pub auth: AuthScheme,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Maximum number of retries of a transient failure within a single call
    pub max_retries: usize,

    /// Initial delay between retries, doubled after each attempt
    pub retry_delay: Duration,

    /// Restrict the run to the resources whose collection path or name is
    /// listed here
    pub resource_filter: Option<Vec<String>>,

    /// Number of resource lifecycles driven concurrently. Steps within one
    /// lifecycle always stay sequential.
    pub max_parallel_lifecycles: usize,
}

impl TesterConfig {
    /// Configuration for a run against the given base URL, with defaults
    /// everywhere else: no auth, 30s timeout, 3 retries starting at 500ms,
    /// no filter, sequential lifecycles.
    pub fn new<U: Into<String>>(base_url: U) -> Self {
        Self {
            base_url: base_url.into(),
            auth: AuthScheme::None,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            resource_filter: None,
            max_parallel_lifecycles: 1,
        }
    }

    /// Whether the given resource is selected by the configured filter.
    pub fn selects(&self, resource_name: &str, collection_path: &str) -> bool {
        match &self.resource_filter {
            None => true,
            Some(filter) => filter
                .iter()
                .any(|target| target == resource_name || target == collection_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_filter_selects_everything() {
        let config = TesterConfig::new("http://localhost:8080");

        assert!(config.selects("registers", "/api/registers"));
    }

    #[test]
    fn filter_matches_name_or_collection_path() {
        let mut config = TesterConfig::new("http://localhost:8080");
        config.resource_filter = Some(vec!["registers".to_string(), "/api/schemas".to_string()]);

        assert!(config.selects("registers", "/api/registers"));
        assert!(config.selects("schemas", "/api/schemas"));
        assert!(!config.selects("sources", "/api/sources"));
    }
}
