//! Wire types for the OneFS platform API.
//!
//! Only the fields the collectors read are modelled; everything else in the
//! responses is ignored by serde. Missing numeric fields default to zero.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

// ============================================================
// Statistics engine
// ============================================================

/// Envelope returned by `/platform/1/statistics/current`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "V: Deserialize<'de>"))]
pub(crate) struct StatsEnvelope<V> {
    #[serde(default)]
    pub stats: Vec<StatRecord<V>>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "V: Deserialize<'de>"))]
pub(crate) struct StatRecord<V> {
    #[serde(default)]
    pub devid: i64,
    #[serde(default)]
    pub key: String,
    pub value: Option<V>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// One device's scalar value for a statistics key.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleStat {
    /// Device id; 0 for cluster-wide keys.
    pub devid: i64,
    pub value: f64,
}

/// One device's value set for a multi-value statistics key
/// (for example one entry per disk bay).
#[derive(Debug, Clone, PartialEq)]
pub struct MultiStat {
    pub devid: i64,
    pub values: Vec<BTreeMap<String, f64>>,
}

// ============================================================
// Cluster
// ============================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterIdentity {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub onefs_version: OnefsVersion,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnefsVersion {
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub build: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Statfs {
    #[serde(default)]
    pub f_bavail: f64,
    #[serde(default)]
    pub f_bfree: f64,
    #[serde(default)]
    pub f_blocks: f64,
    #[serde(default)]
    pub f_bsize: f64,
    #[serde(default)]
    pub f_ffree: f64,
    #[serde(default)]
    pub f_files: f64,
    #[serde(default)]
    pub f_mntonname: String,
}

// ============================================================
// Nodes
// ============================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodesPartitions {
    #[serde(default)]
    pub nodes: Vec<NodePartitions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodePartitions {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub lnn: i64,
    #[serde(default)]
    pub count: f64,
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Partition {
    #[serde(default)]
    pub mount_point: String,
    /// Usage as reported by the API, e.g. `"42%"`.
    #[serde(default)]
    pub percent_used: String,
    #[serde(default)]
    pub statfs: Statfs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodesStatus {
    #[serde(default)]
    pub nodes: Vec<NodeStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub lnn: i64,
    #[serde(default)]
    pub batterystatus: BatteryStatus,
    #[serde(default)]
    pub powersupplies: PowerSupplies,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatteryStatus {
    #[serde(default)]
    pub result1: String,
    #[serde(default)]
    pub result2: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerSupplies {
    #[serde(default)]
    pub supplies: Vec<PowerSupply>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerSupply {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub good: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodesHardware {
    #[serde(default)]
    pub nodes: Vec<NodeHardware>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeHardware {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub lnn: i64,
    #[serde(default)]
    pub chassis: String,
    #[serde(default)]
    pub chassis_code: String,
    #[serde(default)]
    pub chassis_count: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub disk_controller: String,
    #[serde(default)]
    pub disk_expander: String,
    #[serde(default)]
    pub family_code: String,
    #[serde(default)]
    pub generation_code: String,
    #[serde(default)]
    pub hwgen: String,
    #[serde(default)]
    pub infiniband: String,
    #[serde(default)]
    pub motherboard: String,
    #[serde(default)]
    pub nvram: String,
    /// `"<count>,<type>"`, e.g. `"2,Intel Xeon"`.
    #[serde(default)]
    pub processor: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub serial_number: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodesDrives {
    #[serde(default)]
    pub nodes: Vec<NodeDrives>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeDrives {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub lnn: i64,
    #[serde(default)]
    pub drives: Vec<Drive>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Drive {
    #[serde(default)]
    pub baynum: i64,
    #[serde(default)]
    pub devname: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub interface_type: String,
    #[serde(default)]
    pub ui_state: String,
}

// ============================================================
// Storage pools, sync, snapshots, shares
// ============================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoragePools {
    #[serde(default)]
    pub storagepools: Vec<StoragePool>,
    #[serde(default)]
    pub total: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoragePool {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub usage: StoragePoolUsage,
}

/// Byte counters are string-encoded integers on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoragePoolUsage {
    #[serde(default)]
    pub balanced: bool,
    #[serde(default)]
    pub avail_bytes: String,
    #[serde(default)]
    pub avail_ssd_bytes: String,
    #[serde(default)]
    pub free_bytes: String,
    #[serde(default)]
    pub free_ssd_bytes: String,
    #[serde(default)]
    pub total_bytes: String,
    #[serde(default)]
    pub total_ssd_bytes: String,
    #[serde(default)]
    pub virtual_hot_spare_bytes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncPolicies {
    #[serde(default)]
    pub policies: Vec<SyncPolicy>,
    #[serde(default)]
    pub total: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncPolicy {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub last_job_state: String,
    #[serde(default)]
    pub last_started: Option<f64>,
    #[serde(default)]
    pub last_success: Option<f64>,
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub workers_per_node: f64,
    #[serde(default)]
    pub source_root_path: String,
    #[serde(default)]
    pub target_host: String,
    #[serde(default)]
    pub target_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SnapshotsSummaryResponse {
    #[serde(default)]
    pub summary: SnapshotsSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotsSummary {
    #[serde(default)]
    pub count: f64,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub active_count: f64,
    #[serde(default)]
    pub active_size: f64,
    #[serde(default)]
    pub deleting_count: f64,
    #[serde(default)]
    pub deleting_size: f64,
    #[serde(default)]
    pub shadow_bytes: f64,
    #[serde(default)]
    pub aliases_count: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotsPage {
    #[serde(default)]
    pub snapshots: Vec<Value>,
    #[serde(default)]
    pub resume: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Creation time, unix seconds.
    #[serde(default)]
    pub created: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CountSummaryResponse {
    #[serde(default)]
    pub summary: CountSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CountSummary {
    #[serde(default)]
    pub count: f64,
}

// ============================================================
// Quotas
// ============================================================

/// Quota type filter for the first page of a quota listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotaType {
    Directory,
    User,
    Group,
    DefaultUser,
    DefaultGroup,
    #[default]
    All,
}

impl QuotaType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuotaType::Directory => "directory",
            QuotaType::User => "user",
            QuotaType::Group => "group",
            QuotaType::DefaultUser => "default-user",
            QuotaType::DefaultGroup => "default-group",
            QuotaType::All => "all",
        }
    }
}

impl fmt::Display for QuotaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "directory" => Ok(QuotaType::Directory),
            "user" => Ok(QuotaType::User),
            "group" => Ok(QuotaType::Group),
            "default-user" => Ok(QuotaType::DefaultUser),
            "default-group" => Ok(QuotaType::DefaultGroup),
            "all" => Ok(QuotaType::All),
            other => Err(format!(
                "unknown quota type '{other}' (expected directory, user, group, default-user, default-group or all)"
            )),
        }
    }
}

/// One page of a quota listing.
#[derive(Debug, Clone, Default)]
pub struct QuotaPage {
    pub items: Vec<Quota>,
    /// Cursor for the next page; `None` or empty means the listing is complete.
    pub resume: Option<String>,
}

impl QuotaPage {
    /// Returns the resume token when more pages remain.
    pub fn next_token(&self) -> Option<&str> {
        self.resume.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawQuotaPage {
    #[serde(default)]
    pub quotas: Vec<Value>,
    #[serde(default)]
    pub resume: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Quota {
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub container: bool,
    #[serde(default)]
    pub enforced: bool,
    #[serde(default)]
    pub include_snapshots: bool,
    /// Resolved owner (`{"id": ..., "name": ..., "type": ...}`) for user and
    /// group quotas; absent or null for directory quotas.
    #[serde(default)]
    pub persona: Option<Value>,
    #[serde(default)]
    pub usage: QuotaUsage,
    #[serde(default)]
    pub thresholds: QuotaThresholds,
}

impl Quota {
    /// Label used for the `name` label: the path for directory quotas, the
    /// owner's name otherwise, falling back to the path when the owner
    /// object is missing or malformed.
    pub fn display_name(&self) -> &str {
        if self.kind == "directory" {
            return &self.path;
        }
        self.persona
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotaUsage {
    #[serde(default)]
    pub logical: f64,
    #[serde(default)]
    pub physical: f64,
    #[serde(default)]
    pub inodes: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotaThresholds {
    #[serde(default)]
    pub advisory: Option<f64>,
    #[serde(default)]
    pub advisory_exceeded: bool,
    #[serde(default)]
    pub advisory_last_exceeded: Option<Value>,
    #[serde(default)]
    pub soft: Option<f64>,
    #[serde(default)]
    pub soft_exceeded: bool,
    #[serde(default)]
    pub soft_last_exceeded: Option<Value>,
    #[serde(default)]
    pub soft_grace: Option<f64>,
    #[serde(default)]
    pub hard: Option<f64>,
    #[serde(default)]
    pub hard_exceeded: bool,
    #[serde(default)]
    pub hard_last_exceeded: Option<Value>,
}

/// Limit, exceeded flag and last-exceeded time of one threshold level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdState {
    pub limit: f64,
    pub exceeded: bool,
    pub last_exceeded: f64,
}

impl ThresholdState {
    fn new(limit: Option<f64>, exceeded: bool, last_exceeded: Option<&Value>) -> Self {
        // Timestamps only count while the threshold is exceeded; the API
        // reports them as numbers or numeric strings.
        let last_exceeded = if exceeded {
            match last_exceeded {
                Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
                _ => 0.0,
            }
        } else {
            0.0
        };
        Self {
            limit: limit.unwrap_or(0.0),
            exceeded,
            last_exceeded,
        }
    }
}

impl QuotaThresholds {
    pub fn advisory(&self) -> ThresholdState {
        ThresholdState::new(
            self.advisory,
            self.advisory_exceeded,
            self.advisory_last_exceeded.as_ref(),
        )
    }

    pub fn soft(&self) -> ThresholdState {
        ThresholdState::new(
            self.soft,
            self.soft_exceeded,
            self.soft_last_exceeded.as_ref(),
        )
    }

    pub fn hard(&self) -> ThresholdState {
        ThresholdState::new(
            self.hard,
            self.hard_exceeded,
            self.hard_last_exceeded.as_ref(),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct QuotaSummaryResponse {
    #[serde(default)]
    pub summary: QuotaSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotaSummary {
    #[serde(default)]
    pub count: f64,
    #[serde(default)]
    pub default_group_quotas_count: f64,
    #[serde(default)]
    pub default_user_quotas_count: f64,
    #[serde(default)]
    pub directory_quotas_count: f64,
    #[serde(default)]
    pub group_quotas_count: f64,
    #[serde(default)]
    pub linked_quotas_count: f64,
    #[serde(default)]
    pub user_quotas_count: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quota(value: Value) -> Quota {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_display_name_directory_uses_path() {
        let q = quota(json!({
            "id": "q1", "path": "/ifs/data", "type": "directory",
            "persona": {"name": "ignored"}
        }));
        assert_eq!(q.display_name(), "/ifs/data");
    }

    #[test]
    fn test_display_name_user_uses_persona() {
        let q = quota(json!({
            "id": "q2", "path": "/ifs/home", "type": "user",
            "persona": {"id": "UID:1000", "name": "alice", "type": "user"}
        }));
        assert_eq!(q.display_name(), "alice");
    }

    #[test]
    fn test_display_name_malformed_persona_falls_back() {
        let q = quota(json!({
            "id": "q3", "path": "/ifs/home", "type": "group", "persona": "GID:10"
        }));
        assert_eq!(q.display_name(), "/ifs/home");

        let q = quota(json!({"id": "q4", "path": "/ifs/x", "type": "user", "persona": null}));
        assert_eq!(q.display_name(), "/ifs/x");
    }

    #[test]
    fn test_threshold_last_exceeded() {
        let q = quota(json!({
            "id": "q5", "path": "/ifs/p", "type": "directory",
            "thresholds": {
                "advisory": 100, "advisory_exceeded": true, "advisory_last_exceeded": 1700000000,
                "soft": 200, "soft_exceeded": true, "soft_last_exceeded": "not-a-time",
                "hard": null, "hard_exceeded": false, "hard_last_exceeded": 1600000000
            }
        }));
        let t = &q.thresholds;
        assert_eq!(t.advisory().last_exceeded, 1_700_000_000.0);
        assert_eq!(t.soft().last_exceeded, 0.0);
        assert_eq!(t.hard().last_exceeded, 0.0);
        assert_eq!(t.hard().limit, 0.0);
        assert_eq!(t.soft().limit, 200.0);
    }

    #[test]
    fn test_stats_envelope_generic_value() {
        let envelope: StatsEnvelope<f64> = serde_json::from_value(json!({
            "stats": [
                {"devid": 1, "key": "node.cpu.count", "value": 8},
                {"devid": 2, "key": "node.cpu.count", "error": "stale", "value": null}
            ]
        }))
        .unwrap();
        assert_eq!(envelope.stats.len(), 2);
        assert_eq!(envelope.stats[0].value, Some(8.0));
        assert!(envelope.stats[1].error.is_some());

        let envelope: StatsEnvelope<Vec<BTreeMap<String, f64>>> =
            serde_json::from_value(json!({"stats": [{"devid": 3, "value": [{"bay": 1}]}]}))
                .unwrap();
        assert_eq!(envelope.stats[0].devid, 3);
        assert_eq!(envelope.stats[0].value.as_ref().map(Vec::len), Some(1));

        let empty: StatsEnvelope<f64> = serde_json::from_value(json!({})).unwrap();
        assert!(empty.stats.is_empty());
    }

    #[test]
    fn test_quota_type_parse() {
        assert_eq!("default-user".parse::<QuotaType>(), Ok(QuotaType::DefaultUser));
        assert_eq!("all".parse::<QuotaType>(), Ok(QuotaType::All));
        assert!("everything".parse::<QuotaType>().is_err());
    }

    #[test]
    fn test_next_token() {
        let mut page = QuotaPage::default();
        assert_eq!(page.next_token(), None);
        page.resume = Some(String::new());
        assert_eq!(page.next_token(), None);
        page.resume = Some("abc".into());
        assert_eq!(page.next_token(), Some("abc"));
    }
}
