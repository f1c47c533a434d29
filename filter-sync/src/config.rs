//! Configuration of a `FilterSync` engine.
use crate::error::FilterSyncError as Error;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Default file name (without extension) of the local filter store
pub const DEFAULT_LOCAL_STORAGE_KEY: &str = "table-filters";

/// Engine settings. Every field has a default, so a partial JSON document is enough.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Show stored select values while their options are still loading, before they can be validated
    pub optimistic_loading: bool,
    /// Prefix for query parameter names, so that several tables can share one address
    pub url_namespace: Option<String>,
    /// Name of the local store file
    pub local_storage_key: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            optimistic_loading: false,
            url_namespace: None,
            local_storage_key: DEFAULT_LOCAL_STORAGE_KEY.to_string(),
        }
    }
}

impl SyncConfig {
    /// Parse a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::ConfigError(e.to_string()))
    }

    pub fn optimistic_loading(mut self, optimistic: bool) -> Self {
        self.optimistic_loading = optimistic;
        self
    }

    pub fn url_namespace(mut self, namespace: &str) -> Self {
        self.url_namespace = Some(namespace.to_string());
        self
    }

    pub fn local_storage_key(mut self, key: &str) -> Self {
        self.local_storage_key = key.to_string();
        self
    }
}

#[cfg(test)]
mod test {
    use crate::{config::*, error::FilterSyncError as Error};

    #[test]
    fn partial_json_uses_defaults() {
        let config = SyncConfig::from_json(r#"{"optimisticLoading": true}"#).unwrap();

        assert_eq!(
            config,
            SyncConfig {
                optimistic_loading: true,
                url_namespace: None,
                local_storage_key: "table-filters".to_string()
            }
        );
    }

    #[test]
    fn builder_methods() {
        let config = SyncConfig::default()
            .url_namespace("users")
            .local_storage_key("users-filters");

        assert_eq!(config.url_namespace.as_deref(), Some("users"));
        assert_eq!(config.local_storage_key, "users-filters");
        assert!(!config.optimistic_loading);
        assert_eq!(
            serde_json::to_string(&SyncConfig::default()).unwrap(),
            r#"{"optimisticLoading":false,"localStorageKey":"table-filters"}"#
        );
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            SyncConfig::from_json(r#"{"optimisticLoading": "yes"}"#),
            Err(Error::ConfigError(_))
        ));
    }
}
