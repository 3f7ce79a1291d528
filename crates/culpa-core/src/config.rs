use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConnectorError, ConnectorResult};

/// Top-level config file structure. One database per file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub dataculpa_controller: ControllerConfig,
    pub db_server: DbServerConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub collections: Vec<CollectionEntry>,
}

fn default_mode() -> String {
    "database".to_string()
}

/// Where the Data Culpa controller lives. The API secret is never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_controller_host")]
    pub host: String,
    #[serde(default = "default_controller_port")]
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: default_controller_host(),
            port: default_controller_port(),
            protocol: Protocol::default(),
            timeout: default_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl ControllerConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

fn default_controller_host() -> String {
    "dataculpa-api".to_string()
}

fn default_controller_port() -> u16 {
    7777
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_batch_size() -> usize {
    500
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

/// MongoDB server settings. The password comes from `DB_PASSWORD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbServerConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub dbname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_source: Option<String>,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    27017
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

impl DbServerConfig {
    /// Stable identifier for this database, used to derive watchpoint names.
    pub fn identity(&self) -> String {
        self.identity_for(&self.dbname)
    }

    /// Identity of another database on the same server.
    pub fn identity_for(&self, dbname: &str) -> String {
        format!("db_type:mongo,host:{}:{},name:{}", self.host, self.port, dbname)
    }
}

/// Name given to a collection's watchpoint when the config does not name one.
pub fn default_watchpoint(identity: &str, collection: &str) -> String {
    format!("database-{identity}-{collection}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default)]
    pub new_collections: NewCollections,
    /// Newest N records pulled from each scanned collection.
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            new_collections: NewCollections::default(),
            sample_size: default_sample_size(),
        }
    }
}

fn default_sample_size() -> u32 {
    1000
}

/// What to do with collections that have no `collections` entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewCollections {
    #[default]
    Traverse,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub collection: String,
    pub dataculpa_watchpoint: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Template written by `--init`.
pub const EXAMPLE_CONFIG: &str = r#"# mongo-dataculpa connector configuration
# One database per config file. Secrets live in the env file passed with -e:
#   DC_CONTROLLER_SECRET=...
#   DB_PASSWORD=...
mode: database

dataculpa_controller:
  host: dataculpa-api
  port: 7777
  protocol: http
  timeout: 30s
  batch_size: 500

db_server:
  host: localhost
  port: 27017
  dbname: dataculpa
  user: dataculpa
  # auth_source: admin
  connect_timeout: 10s

behavior:
  # traverse: scan collections missing from the list below
  # ignore: only scan listed collections
  new_collections: traverse
  sample_size: 1000

collections:
  - collection: example_collection
    dataculpa_watchpoint: example_watchpoint
    enabled: false
"#;

impl ConnectorConfig {
    pub fn from_file(path: &Path) -> ConnectorResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConnectorError::Config(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConnectorResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ConnectorError::Config(format!("Invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConnectorResult<String> {
        serde_yaml::to_string(self).map_err(|e| ConnectorError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> ConnectorResult<()> {
        if self.mode != "database" {
            return Err(ConnectorError::Config(format!(
                "Unsupported mode '{}', expected 'database'",
                self.mode
            )));
        }
        if self.db_server.host.trim().is_empty() {
            return Err(ConnectorError::Config("db_server.host is empty".into()));
        }
        if self.db_server.dbname.trim().is_empty() {
            return Err(ConnectorError::Config("db_server.dbname is empty".into()));
        }
        if self.db_server.port == 0 || self.dataculpa_controller.port == 0 {
            return Err(ConnectorError::Config("port must be non-zero".into()));
        }
        if self.behavior.sample_size == 0 {
            return Err(ConnectorError::Config("behavior.sample_size must be > 0".into()));
        }
        if self.dataculpa_controller.batch_size == 0 {
            return Err(ConnectorError::Config(
                "dataculpa_controller.batch_size must be > 0".into(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, entry) in self.collections.iter().enumerate() {
            if entry.collection.trim().is_empty() {
                return Err(ConnectorError::Config(format!(
                    "collections[{i}]: 'collection' is empty"
                )));
            }
            if entry.dataculpa_watchpoint.trim().is_empty() {
                return Err(ConnectorError::Config(format!(
                    "collections[{i}] ({}): 'dataculpa_watchpoint' is empty",
                    entry.collection
                )));
            }
            if !seen.insert(entry.collection.as_str()) {
                return Err(ConnectorError::Config(format!(
                    "collection '{}' is listed more than once",
                    entry.collection
                )));
            }
        }

        Ok(())
    }

    pub fn entry(&self, collection: &str) -> Option<&CollectionEntry> {
        self.collections.iter().find(|e| e.collection == collection)
    }
}

/// Write the example template, never overwriting an existing file.
pub fn write_example(path: &Path) -> ConnectorResult<()> {
    if path.exists() {
        return Err(ConnectorError::AlreadyExists(path.to_path_buf()));
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .map_err(|e| ConnectorError::Config(format!("Cannot write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_template_parses_and_validates() {
        let config = ConnectorConfig::from_yaml_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.db_server.dbname, "dataculpa");
        assert_eq!(config.db_server.user.as_deref(), Some("dataculpa"));
        assert_eq!(config.behavior.new_collections, NewCollections::Traverse);
        assert_eq!(config.behavior.sample_size, 1000);
        assert_eq!(config.collections.len(), 1);
        assert!(!config.collections[0].enabled);
        assert_eq!(config.dataculpa_controller.timeout, Duration::from_secs(30));
    }

    #[test]
    fn loaded_config_round_trips_through_yaml() {
        let config = ConnectorConfig::from_yaml_str(EXAMPLE_CONFIG).unwrap();
        let yaml = config.to_yaml().unwrap();
        let reparsed = ConnectorConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config = ConnectorConfig::from_yaml_str(
            "db_server:\n  dbname: shop\ncollections:\n  - collection: orders\n    dataculpa_watchpoint: shop-orders\n",
        )
        .unwrap();
        assert_eq!(config.mode, "database");
        assert_eq!(config.db_server.host, "localhost");
        assert_eq!(config.db_server.port, 27017);
        assert!(config.db_server.user.is_none());
        assert_eq!(config.dataculpa_controller.base_url(), "http://dataculpa-api:7777");
        assert!(config.entry("orders").unwrap().enabled);
        assert!(config.entry("missing").is_none());
    }

    #[test]
    fn duplicate_collection_is_rejected() {
        let err = ConnectorConfig::from_yaml_str(
            "db_server:\n  dbname: shop\ncollections:\n  - collection: a\n    dataculpa_watchpoint: x\n  - collection: a\n    dataculpa_watchpoint: y\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"), "{err}");
    }

    #[test]
    fn empty_watchpoint_and_zero_sample_are_rejected() {
        let err = ConnectorConfig::from_yaml_str(
            "db_server:\n  dbname: shop\ncollections:\n  - collection: a\n    dataculpa_watchpoint: ''\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("dataculpa_watchpoint"), "{err}");

        let err = ConnectorConfig::from_yaml_str(
            "db_server:\n  dbname: shop\nbehavior:\n  sample_size: 0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("sample_size"), "{err}");
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = ConnectorConfig::from_yaml_str("mode: stream\ndb_server:\n  dbname: shop\n")
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Config(_)));
    }

    #[test]
    fn identity_and_default_watchpoint() {
        let config = ConnectorConfig::from_yaml_str(EXAMPLE_CONFIG).unwrap();
        let identity = config.db_server.identity();
        assert_eq!(identity, "db_type:mongo,host:localhost:27017,name:dataculpa");
        assert_eq!(
            default_watchpoint(&identity, "orders"),
            "database-db_type:mongo,host:localhost:27017,name:dataculpa-orders"
        );
    }

    #[test]
    fn write_example_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.yaml");
        write_example(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);

        let err = write_example(&path).unwrap_err();
        assert!(matches!(err, ConnectorError::AlreadyExists(_)));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ConnectorConfig::from_file(Path::new("/nonexistent/db.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/db.yaml"));
    }
}
