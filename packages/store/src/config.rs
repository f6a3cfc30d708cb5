//! Store configuration, populated from environment variables.

use std::time::Duration;

use claimgraph::AppConventions;

use crate::retry::RetryPolicy;

/// Runtime configuration for a claim-graph client.
///
/// All fields are populated from environment variables with defaults, so
/// the store can be used with zero configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `CLAIMGRAPH_DB` | (absent = in-memory) | Path to the SQLite database file |
/// | `CLAIMGRAPH_CALLER` | `anonymous` | Caller identifier recorded on attestations |
/// | `CLAIMGRAPH_RETRY_ATTEMPTS` | `5` | Read-after-write retry attempts |
/// | `CLAIMGRAPH_RETRY_DELAY_MS` | `50` | Milliseconds between retry attempts |
/// | `CLAIMGRAPH_APP` | `Internet Amigos` | Display name of the application identity |
/// | `CLAIMGRAPH_MEMBER_PREDICATE` | `Esteemed Guest` | Membership predicate name |
/// | `CLAIMGRAPH_PROFILE_PREDICATE` | `Internet Amigos Profile` | Profile-pointer predicate name |
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    /// `None` means use an in-memory store (data is lost on exit).
    pub db_path: Option<String>,

    /// Identifier of the calling user, stamped on attestations.
    pub caller: String,

    /// Bounded retry applied to lookups that follow a write.
    pub retry: RetryPolicy,

    /// Names of the application identity and its special predicates.
    pub conventions: AppConventions,
}

impl StoreConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `var`.
    /// Unparseable numbers fall back to their defaults.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let attempts = var("CLAIMGRAPH_RETRY_ATTEMPTS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.retry.attempts);
        let delay = var("CLAIMGRAPH_RETRY_DELAY_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.delay);

        let conventions = AppConventions::new(
            var("CLAIMGRAPH_APP").unwrap_or(defaults.conventions.app_name),
            var("CLAIMGRAPH_MEMBER_PREDICATE").unwrap_or(defaults.conventions.member_predicate),
            var("CLAIMGRAPH_PROFILE_PREDICATE").unwrap_or(defaults.conventions.profile_predicate),
        );

        Self {
            db_path: var("CLAIMGRAPH_DB"),
            caller: var("CLAIMGRAPH_CALLER").unwrap_or(defaults.caller),
            retry: RetryPolicy::new(attempts, delay),
            conventions,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            caller: "anonymous".into(),
            retry: RetryPolicy::default(),
            conventions: AppConventions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = StoreConfig::from_lookup(lookup(&[]));
        assert!(config.db_path.is_none());
        assert_eq!(config.caller, "anonymous");
        assert_eq!(config.retry, RetryPolicy::new(5, Duration::from_millis(50)));
        assert_eq!(config.conventions, AppConventions::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("CLAIMGRAPH_DB", "/tmp/graph.db"),
            ("CLAIMGRAPH_CALLER", "alice"),
            ("CLAIMGRAPH_RETRY_ATTEMPTS", "2"),
            ("CLAIMGRAPH_RETRY_DELAY_MS", "10"),
            ("CLAIMGRAPH_APP", "Book Club"),
            ("CLAIMGRAPH_MEMBER_PREDICATE", "Reader"),
            ("CLAIMGRAPH_PROFILE_PREDICATE", "Reader Profile"),
        ]));
        assert_eq!(config.db_path.as_deref(), Some("/tmp/graph.db"));
        assert_eq!(config.caller, "alice");
        assert_eq!(config.retry, RetryPolicy::new(2, Duration::from_millis(10)));
        assert_eq!(config.conventions.app_name, "Book Club");
        assert_eq!(config.conventions.member_predicate, "Reader");
        assert_eq!(config.conventions.profile_predicate, "Reader Profile");
    }

    #[test]
    fn bad_numbers_fall_back() {
        let config = StoreConfig::from_lookup(lookup(&[("CLAIMGRAPH_RETRY_ATTEMPTS", "lots")]));
        assert_eq!(config.retry.attempts, 5);
    }
}
