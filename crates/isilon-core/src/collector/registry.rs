use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::cluster_health::ClusterHealthCollector;
use super::node_info::NodeInfoCollector;
use super::node_partition::NodePartitionCollector;
use super::protocol::{ClusterProtocolCollector, NodeProtocolCollector, ProtocolEnablement};
use super::quota::{QuotaCollector, QuotaSettings, QuotaSummaryCollector};
use super::shares::{NfsExportsCollector, SmbSharesCollector};
use super::snapshots::SnapshotsCollector;
use super::statfs::StatfsCollector;
use super::storage_pools::StoragePoolsCollector;
use super::sync_iq::SyncIqCollector;
use super::{Collector, Orchestrator, stat_key};
use crate::client::StatClient;

type Constructor = fn(&CollectorSettings, &StatClient) -> Arc<dyn Collector>;

/// A registered collector: its name, default state and constructor.
pub struct CollectorEntry {
    pub name: &'static str,
    pub default_enabled: bool,
    build: Constructor,
}

/// Every collector the exporter knows, sorted by name.
pub static COLLECTORS: &[CollectorEntry] = &[
    CollectorEntry {
        name: "capacity",
        default_enabled: true,
        build: |_, client| Arc::new(stat_key::capacity(client.clone())),
    },
    CollectorEntry {
        name: "cluster_health",
        default_enabled: true,
        build: |_, client| Arc::new(ClusterHealthCollector::new(client.clone())),
    },
    CollectorEntry {
        name: "cluster_protocol",
        default_enabled: true,
        build: |settings, client| {
            Arc::new(ClusterProtocolCollector::new(client.clone(), &settings.protocols))
        },
    },
    CollectorEntry {
        name: "cpu",
        default_enabled: true,
        build: |_, client| Arc::new(stat_key::cpu(client.clone())),
    },
    CollectorEntry {
        name: "disk",
        default_enabled: true,
        build: |_, client| Arc::new(stat_key::disk(client.clone())),
    },
    CollectorEntry {
        name: "memory",
        default_enabled: true,
        build: |_, client| Arc::new(stat_key::memory(client.clone())),
    },
    CollectorEntry {
        name: "network",
        default_enabled: true,
        build: |_, client| Arc::new(stat_key::network(client.clone())),
    },
    CollectorEntry {
        name: "nfs_exports",
        default_enabled: true,
        build: |_, client| Arc::new(NfsExportsCollector::new(client.clone())),
    },
    CollectorEntry {
        name: "node_capacity",
        default_enabled: true,
        build: |_, client| Arc::new(stat_key::node_capacity(client.clone())),
    },
    CollectorEntry {
        name: "node_health",
        default_enabled: true,
        build: |_, client| Arc::new(stat_key::node_health(client.clone())),
    },
    CollectorEntry {
        name: "node_info",
        default_enabled: true,
        build: |_, client| Arc::new(NodeInfoCollector::new(client.clone())),
    },
    CollectorEntry {
        name: "node_partition",
        default_enabled: true,
        build: |_, client| Arc::new(NodePartitionCollector::new(client.clone())),
    },
    CollectorEntry {
        name: "node_protocol",
        default_enabled: true,
        build: |settings, client| {
            Arc::new(NodeProtocolCollector::new(client.clone(), &settings.protocols))
        },
    },
    CollectorEntry {
        name: "quota",
        default_enabled: false,
        build: |settings, client| {
            Arc::new(QuotaCollector::new(client.clone(), settings.quota.clone()))
        },
    },
    CollectorEntry {
        name: "quota_summary",
        default_enabled: true,
        build: |_, client| Arc::new(QuotaSummaryCollector::new(client.clone())),
    },
    CollectorEntry {
        name: "smb_shares",
        default_enabled: true,
        build: |_, client| Arc::new(SmbSharesCollector::new(client.clone())),
    },
    CollectorEntry {
        name: "snapshots",
        default_enabled: true,
        build: |_, client| Arc::new(SnapshotsCollector::new(client.clone())),
    },
    CollectorEntry {
        name: "statfs",
        default_enabled: true,
        build: |_, client| Arc::new(StatfsCollector::new(client.clone())),
    },
    CollectorEntry {
        name: "storage_pools",
        default_enabled: true,
        build: |_, client| Arc::new(StoragePoolsCollector::new(client.clone())),
    },
    CollectorEntry {
        name: "sync_iq",
        default_enabled: true,
        build: |_, client| Arc::new(SyncIqCollector::new(client.clone())),
    },
];

fn entry(name: &str) -> Option<&'static CollectorEntry> {
    COLLECTORS.iter().find(|e| e.name == name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No collector with this name exists.
    MissingCollector(String),
    /// The collector exists but is not enabled.
    DisabledCollector(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::MissingCollector(name) => write!(f, "missing collector: {name}"),
            RegistryError::DisabledCollector(name) => write!(f, "disabled collector: {name}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Startup configuration of the collector set.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    enabled: BTreeMap<&'static str, bool>,
    pub quota: QuotaSettings,
    pub protocols: ProtocolEnablement,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            enabled: COLLECTORS
                .iter()
                .map(|e| (e.name, e.default_enabled))
                .collect(),
            quota: QuotaSettings::default(),
            protocols: ProtocolEnablement::default(),
        }
    }
}

impl CollectorSettings {
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), RegistryError> {
        let entry = entry(name).ok_or_else(|| RegistryError::MissingCollector(name.to_string()))?;
        self.enabled.insert(entry.name, enabled);
        Ok(())
    }

    /// Runs the quota collector alone, reconciling against `expected_total`.
    pub fn quota_only(&mut self, expected_total: u64) {
        for state in self.enabled.values_mut() {
            *state = false;
        }
        self.enabled.insert("quota", true);
        self.quota.expected_total = Some(expected_total);
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.get(name).copied().unwrap_or(false)
    }

    /// Enabled collector names in sorted order.
    pub fn enabled_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.enabled
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| *name)
    }
}

/// Builds the collector set for one scrape.
#[derive(Clone)]
pub struct Registry {
    client: StatClient,
    settings: Arc<CollectorSettings>,
}

impl Registry {
    pub fn new(client: StatClient, settings: CollectorSettings) -> Self {
        Self {
            client,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    /// Resolves `filters` (the `collect[]` parameters) into an orchestrator.
    /// An empty filter selects every enabled collector.
    pub fn build(&self, filters: &[String]) -> Result<Orchestrator, RegistryError> {
        let mut names: Vec<&'static str> = if filters.is_empty() {
            self.settings.enabled_names().collect()
        } else {
            let mut names = Vec::with_capacity(filters.len());
            for filter in filters {
                let entry = entry(filter)
                    .ok_or_else(|| RegistryError::MissingCollector(filter.clone()))?;
                if !self.settings.is_enabled(entry.name) {
                    return Err(RegistryError::DisabledCollector(filter.clone()));
                }
                names.push(entry.name);
            }
            names
        };
        names.sort_unstable();
        names.dedup();

        let collectors = names
            .into_iter()
            .filter_map(entry)
            .map(|e| (e.build)(&self.settings, &self.client))
            .collect();
        Ok(Orchestrator::new(collectors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockTransport;

    fn registry(settings: CollectorSettings) -> Registry {
        Registry::new(StatClient::new(MockTransport::typical_cluster()), settings)
    }

    #[test]
    fn test_table_is_sorted_and_unique() {
        let names: Vec<_> = COLLECTORS.iter().map(|e| e.name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_defaults() {
        let settings = CollectorSettings::default();
        assert!(settings.is_enabled("cpu"));
        assert!(settings.is_enabled("quota_summary"));
        assert!(!settings.is_enabled("quota"));
        assert!(settings.is_enabled("node_protocol"));
        assert!(settings.is_enabled("cluster_protocol"));
        assert_eq!(settings.enabled_names().count(), COLLECTORS.len() - 1);
    }

    #[test]
    fn test_quota_only() {
        let mut settings = CollectorSettings::default();
        settings.quota_only(42);
        assert_eq!(settings.enabled_names().collect::<Vec<_>>(), vec!["quota"]);
        assert_eq!(settings.quota.reconcile_target(), Some(42));
    }

    #[test]
    fn test_unknown_toggle() {
        let mut settings = CollectorSettings::default();
        assert_eq!(
            settings.set_enabled("bogus", true),
            Err(RegistryError::MissingCollector("bogus".into()))
        );
    }

    #[test]
    fn test_build_with_filters() {
        let registry = registry(CollectorSettings::default());

        let all = registry.build(&[]).unwrap();
        assert_eq!(all.collector_names().len(), COLLECTORS.len() - 1);
        assert!(all.collector_names().contains(&"node_protocol"));
        assert!(all.collector_names().contains(&"cluster_protocol"));

        let some = registry
            .build(&["memory".into(), "cpu".into(), "cpu".into()])
            .unwrap();
        assert_eq!(some.collector_names(), vec!["cpu", "memory"]);

        let missing = registry.build(&["bogus".into()]).unwrap_err();
        assert_eq!(missing.to_string(), "missing collector: bogus");

        let disabled = registry.build(&["quota".into()]).unwrap_err();
        assert_eq!(disabled.to_string(), "disabled collector: quota");
    }

    #[test]
    fn test_toggle_enables_filter() {
        let mut settings = CollectorSettings::default();
        settings.set_enabled("quota", true).unwrap();
        settings.set_enabled("cpu", false).unwrap();
        let registry = registry(settings);
        assert_eq!(
            registry.build(&["quota".into()]).unwrap().collector_names(),
            vec!["quota"]
        );
        assert!(registry.build(&["cpu".into()]).is_err());
    }
}
