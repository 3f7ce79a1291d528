use serde::Serialize;
use std::fmt;

use crate::config::{default_watchpoint, CollectionEntry, ConnectorConfig, NewCollections};
use crate::error::{ConnectorError, ConnectorResult};
use crate::source::CollectionInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Listed with `enabled: false`.
    Disabled,
    /// Not listed, and `new_collections: ignore`.
    Unconfigured,
    /// `system.*` collection.
    System,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled in config"),
            Self::Unconfigured => write!(f, "unconfigured, new collections ignored"),
            Self::System => write!(f, "system collection"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDecision {
    Scan {
        watchpoint: String,
        /// False when the watchpoint name was derived rather than configured.
        configured: bool,
    },
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPlan {
    pub collection: String,
    pub decision: ScanDecision,
}

impl CollectionPlan {
    pub fn watchpoint(&self) -> Option<&str> {
        match &self.decision {
            ScanDecision::Scan { watchpoint, .. } => Some(watchpoint),
            ScanDecision::Skip(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPlan {
    pub collections: Vec<CollectionPlan>,
    /// Configured collections not present in the database.
    pub missing: Vec<String>,
}

impl ScanPlan {
    pub fn scans(&self) -> impl Iterator<Item = &CollectionPlan> {
        self.collections
            .iter()
            .filter(|p| matches!(p.decision, ScanDecision::Scan { .. }))
    }
}

pub fn is_system_collection(name: &str) -> bool {
    name.starts_with("system.")
}

/// Decide what happens to each live collection.
pub fn plan_collections(config: &ConnectorConfig, live: &[String]) -> ScanPlan {
    let identity = config.db_server.identity();

    let collections = live
        .iter()
        .map(|name| {
            let decision = if is_system_collection(name) {
                ScanDecision::Skip(SkipReason::System)
            } else {
                match config.entry(name) {
                    Some(entry) if entry.enabled => ScanDecision::Scan {
                        watchpoint: entry.dataculpa_watchpoint.clone(),
                        configured: true,
                    },
                    Some(_) => ScanDecision::Skip(SkipReason::Disabled),
                    None => match config.behavior.new_collections {
                        NewCollections::Traverse => ScanDecision::Scan {
                            watchpoint: default_watchpoint(&identity, name),
                            configured: false,
                        },
                        NewCollections::Ignore => ScanDecision::Skip(SkipReason::Unconfigured),
                    },
                }
            };
            CollectionPlan {
                collection: name.clone(),
                decision,
            }
        })
        .collect();

    let missing = config
        .collections
        .iter()
        .filter(|e| !live.contains(&e.collection))
        .map(|e| e.collection.clone())
        .collect();

    ScanPlan {
        collections,
        missing,
    }
}

/// How a live collection relates to the config, for discovery listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Enabled,
    Disabled,
    /// Unconfigured, will be traversed.
    New,
    /// Unconfigured, will be skipped.
    Ignored,
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.pad("enabled"),
            Self::Disabled => f.pad("disabled"),
            Self::New => f.pad("new"),
            Self::Ignored => f.pad("ignored"),
        }
    }
}

pub fn collection_status(config: &ConnectorConfig, collection: &str) -> CollectionStatus {
    match config.entry(collection) {
        Some(entry) if entry.enabled => CollectionStatus::Enabled,
        Some(_) => CollectionStatus::Disabled,
        None => match config.behavior.new_collections {
            NewCollections::Traverse => CollectionStatus::New,
            NewCollections::Ignore => CollectionStatus::Ignored,
        },
    }
}

#[derive(Serialize)]
struct CollectionsFragment<'a> {
    collections: &'a [CollectionEntry],
}

/// Config entries for every collection in `infos` not already configured.
/// New entries start disabled.
pub fn new_entries(
    identity: &str,
    infos: &[CollectionInfo],
    already_configured: &[CollectionEntry],
) -> Vec<CollectionEntry> {
    infos
        .iter()
        .filter(|info| !is_system_collection(&info.name))
        .filter(|info| !already_configured.iter().any(|e| e.collection == info.name))
        .map(|info| CollectionEntry {
            collection: info.name.clone(),
            dataculpa_watchpoint: default_watchpoint(identity, &info.name),
            enabled: false,
        })
        .collect()
}

/// Render entries as a `collections:` YAML fragment.
pub fn collections_fragment(entries: &[CollectionEntry]) -> ConnectorResult<String> {
    serde_yaml::to_string(&CollectionsFragment {
        collections: entries,
    })
    .map_err(|e| ConnectorError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EXAMPLE_CONFIG;

    fn config_with(entries: &str, new_collections: &str) -> ConnectorConfig {
        let yaml = format!(
            "db_server:\n  dbname: shop\nbehavior:\n  new_collections: {new_collections}\ncollections:\n{entries}"
        );
        ConnectorConfig::from_yaml_str(&yaml).unwrap()
    }

    fn live(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    const ENTRIES: &str = "  - collection: orders\n    dataculpa_watchpoint: shop-orders\n  - collection: logs\n    dataculpa_watchpoint: shop-logs\n    enabled: false\n  - collection: gone\n    dataculpa_watchpoint: shop-gone\n";

    #[test]
    fn configured_collections_follow_enabled_flag() {
        let config = config_with(ENTRIES, "ignore");
        let plan = plan_collections(&config, &live(&["orders", "logs"]));

        assert_eq!(
            plan.collections[0].decision,
            ScanDecision::Scan {
                watchpoint: "shop-orders".into(),
                configured: true
            }
        );
        assert_eq!(
            plan.collections[1].decision,
            ScanDecision::Skip(SkipReason::Disabled)
        );
    }

    #[test]
    fn unconfigured_collections_follow_behavior() {
        let traverse = config_with(ENTRIES, "traverse");
        let plan = plan_collections(&traverse, &live(&["users"]));
        assert_eq!(
            plan.collections[0].watchpoint(),
            Some("database-db_type:mongo,host:localhost:27017,name:shop-users")
        );

        let ignore = config_with(ENTRIES, "ignore");
        let plan = plan_collections(&ignore, &live(&["users"]));
        assert_eq!(
            plan.collections[0].decision,
            ScanDecision::Skip(SkipReason::Unconfigured)
        );
        assert_eq!(plan.scans().count(), 0);
    }

    #[test]
    fn system_collections_are_never_scanned() {
        let config = config_with(ENTRIES, "traverse");
        let plan = plan_collections(&config, &live(&["system.views", "orders"]));
        assert_eq!(
            plan.collections[0].decision,
            ScanDecision::Skip(SkipReason::System)
        );
        assert_eq!(plan.scans().count(), 1);
    }

    #[test]
    fn configured_but_absent_collections_are_reported() {
        let config = config_with(ENTRIES, "traverse");
        let plan = plan_collections(&config, &live(&["orders", "logs"]));
        assert_eq!(plan.missing, vec!["gone".to_string()]);
    }

    #[test]
    fn status_reflects_config() {
        let config = config_with(ENTRIES, "traverse");
        assert_eq!(collection_status(&config, "orders"), CollectionStatus::Enabled);
        assert_eq!(collection_status(&config, "logs"), CollectionStatus::Disabled);
        assert_eq!(collection_status(&config, "users"), CollectionStatus::New);
    }

    #[test]
    fn fragment_is_mergeable_yaml() {
        let config = ConnectorConfig::from_yaml_str(EXAMPLE_CONFIG).unwrap();
        let infos = vec![
            CollectionInfo {
                name: "example_collection".into(),
                document_count: 3,
            },
            CollectionInfo {
                name: "events".into(),
                document_count: 10,
            },
            CollectionInfo {
                name: "system.profile".into(),
                document_count: 0,
            },
        ];
        let entries = new_entries("db_type:mongo,host:localhost:27017,name:crm", &infos, &config.collections);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].collection, "events");
        assert!(!entries[0].enabled);

        let fragment = collections_fragment(&entries).unwrap();

        // The fragment's entries can be appended to a config and still validate.
        let mut merged = config.clone();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&fragment).unwrap();
        let added: Vec<CollectionEntry> =
            serde_yaml::from_value(parsed["collections"].clone()).unwrap();
        merged.collections.extend(added);
        merged.validate().unwrap();
        assert_eq!(
            merged.entry("events").unwrap().dataculpa_watchpoint,
            "database-db_type:mongo,host:localhost:27017,name:crm-events"
        );
    }
}
