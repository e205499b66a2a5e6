use std::time::Duration;

use storage::access_store::{DEFAULT_NAMESPACE, DEFAULT_TIMEOUT};

use crate::error::ConfigError;

pub const NAMESPACE_ENV: &str = "PROGRESSION_NAMESPACE";
pub const STORE_TIMEOUT_ENV: &str = "PROGRESSION_STORE_TIMEOUT_MS";

/// Knobs for the progression engine's persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Key prefix; blobs live under `"<namespace>_<user_id>"`.
    pub namespace: String,
    /// Upper bound for each store read or write.
    pub store_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            store_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl EngineConfig {
    /// Read overrides from `PROGRESSION_NAMESPACE` and `PROGRESSION_STORE_TIMEOUT_MS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(NAMESPACE_ENV) {
            let namespace = raw.trim();
            if namespace.is_empty() {
                return Err(ConfigError::EmptyNamespace);
            }
            config.namespace = namespace.to_owned();
        }

        if let Some(raw) = lookup(STORE_TIMEOUT_ENV) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout { raw: raw.clone() })?;
            config.store_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.namespace, "user_class_access");
        assert_eq!(config.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn reads_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (NAMESPACE_ENV, " classes "),
            (STORE_TIMEOUT_ENV, "250"),
        ]))
        .unwrap();
        assert_eq!(config.namespace, "classes");
        assert_eq!(config.store_timeout, Duration::from_millis(250));
    }

    #[test]
    fn rejects_bad_values() {
        let err = EngineConfig::from_lookup(lookup(&[(NAMESPACE_ENV, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::EmptyNamespace);

        let err = EngineConfig::from_lookup(lookup(&[(STORE_TIMEOUT_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));
    }
}
