//! OneFS management API access.
//!
//! `Transport` is the seam: one authenticated GET returning JSON.
//! `HttpTransport` talks to a real cluster, `mock::MockTransport` serves
//! canned responses in tests. `StatClient` layers the typed operations the
//! collectors need on top of any transport.

mod error;
mod http;
pub mod mock;
pub mod protostats;
pub mod types;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

pub use error::ClientError;
pub use http::{HttpTransport, HttpTransportConfig};
pub use protostats::{ProtoStatPayload, ProtoStatSchema};
use types::{
    ClusterConfig, ClusterIdentity, CountSummaryResponse, MultiStat, NodesDrives, NodesHardware,
    NodesPartitions, NodesStatus, Quota, QuotaPage, QuotaSummary, QuotaSummaryResponse, QuotaType,
    RawQuotaPage, SingleStat, Snapshot, SnapshotsPage, SnapshotsSummary, SnapshotsSummaryResponse,
    StatRecord, Statfs, StatsEnvelope, StoragePools, SyncPolicies,
};

const STATS_PATH: &str = "/platform/1/statistics/current";
const QUOTAS_PATH: &str = "/platform/1/quota/quotas";

/// A GET request against the platform API: a path plus ordered query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiRequest {
    path: String,
    params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    /// Appends a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Returns the first value of the given query parameter.
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Statistics engine query for one key across all devices.
    pub fn stat(key: &str) -> Self {
        Self::new(STATS_PATH).param("keys", key).param("devid", "all")
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{k}={v}")?;
        }
        Ok(())
    }
}

/// One authenticated GET against the management API.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &ApiRequest) -> Result<Value, ClientError>;
}

/// Parameters of one quota listing request.
///
/// The API rejects a resume token combined with filters, so a continuation
/// request carries the token only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaQuery {
    First { kind: QuotaType, exceeded_only: bool },
    Resume(String),
}

impl QuotaQuery {
    pub fn request(&self) -> ApiRequest {
        match self {
            QuotaQuery::First {
                kind,
                exceeded_only,
            } => {
                let mut req = ApiRequest::new(QUOTAS_PATH).param("resolve_names", "true");
                if *kind != QuotaType::All {
                    req = req.param("type", kind.as_str());
                }
                if *exceeded_only {
                    req = req.param("exceeded", "true");
                }
                req
            }
            QuotaQuery::Resume(token) => ApiRequest::new(QUOTAS_PATH).param("resume", token),
        }
    }
}

/// Typed management API client shared by all collectors.
#[derive(Clone)]
pub struct StatClient {
    transport: Arc<dyn Transport>,
}

impl StatClient {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn from_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        debug!(request = %request, "api request");
        let value = self.transport.get(&request).await?;
        serde_json::from_value(value).map_err(|e| ClientError::decode(request.path(), e))
    }

    async fn stat_records<V: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Vec<(i64, V)>, ClientError> {
        let envelope: StatsEnvelope<V> = self.fetch(ApiRequest::stat(key)).await?;
        Ok(envelope
            .stats
            .into_iter()
            .filter_map(|record| usable_record(key, record))
            .collect())
    }

    // ============================================================
    // Statistics engine
    // ============================================================

    /// Scalar statistic for every device reporting `key`.
    pub async fn query_single(&self, key: &str) -> Result<Vec<SingleStat>, ClientError> {
        let records = self.stat_records::<f64>(key).await?;
        Ok(records
            .into_iter()
            .map(|(devid, value)| SingleStat { devid, value })
            .collect())
    }

    /// Multi-value statistic (value sets keyed by sub-key) for every device.
    pub async fn query_multi(&self, key: &str) -> Result<Vec<MultiStat>, ClientError> {
        let records = self.stat_records(key).await?;
        Ok(records
            .into_iter()
            .map(|(devid, values)| MultiStat { devid, values })
            .collect())
    }

    /// Protocol statistic, decoded with the schema implied by `key`.
    /// Records whose value does not match the schema are skipped.
    pub async fn query_protocol(
        &self,
        key: &str,
    ) -> Result<Vec<(i64, ProtoStatPayload)>, ClientError> {
        let schema = ProtoStatSchema::for_key(key);
        let records = self.stat_records::<Value>(key).await?;
        Ok(records
            .into_iter()
            .filter_map(|(devid, value)| match schema.decode(key, value) {
                Ok(payload) => Some((devid, payload)),
                Err(e) => {
                    warn!(key, devid, error = %e, "skipping protocol record");
                    None
                }
            })
            .collect())
    }

    // ============================================================
    // Quotas
    // ============================================================

    /// One page of the quota listing. Malformed quota entries are skipped.
    pub async fn query_quotas(&self, query: &QuotaQuery) -> Result<QuotaPage, ClientError> {
        let raw: RawQuotaPage = self.fetch(query.request()).await?;
        Ok(QuotaPage {
            items: decode_items::<Quota>("quota", raw.quotas),
            resume: raw.resume,
        })
    }

    pub async fn quota_summary(&self) -> Result<QuotaSummary, ClientError> {
        let resp: QuotaSummaryResponse = self
            .fetch(ApiRequest::new("/platform/1/quota/quotas-summary"))
            .await?;
        Ok(resp.summary)
    }

    // ============================================================
    // Cluster and nodes
    // ============================================================

    pub async fn cluster_identity(&self) -> Result<ClusterIdentity, ClientError> {
        self.fetch(ApiRequest::new("/platform/3/cluster/identity"))
            .await
    }

    pub async fn cluster_config(&self) -> Result<ClusterConfig, ClientError> {
        self.fetch(ApiRequest::new("/platform/3/cluster/config"))
            .await
    }

    pub async fn statfs(&self) -> Result<Statfs, ClientError> {
        self.fetch(ApiRequest::new("/platform/1/cluster/statfs"))
            .await
    }

    pub async fn nodes_partitions(&self) -> Result<NodesPartitions, ClientError> {
        self.fetch(ApiRequest::new("/platform/3/cluster/nodes/all/partitions"))
            .await
    }

    pub async fn nodes_status(&self) -> Result<NodesStatus, ClientError> {
        self.fetch(ApiRequest::new("/platform/3/cluster/nodes/all/status"))
            .await
    }

    pub async fn nodes_hardware(&self) -> Result<NodesHardware, ClientError> {
        self.fetch(ApiRequest::new("/platform/3/cluster/nodes/all/hardware"))
            .await
    }

    pub async fn nodes_drives(&self) -> Result<NodesDrives, ClientError> {
        self.fetch(ApiRequest::new("/platform/3/cluster/nodes/all/drives"))
            .await
    }

    // ============================================================
    // Data services
    // ============================================================

    pub async fn storage_pools(&self) -> Result<StoragePools, ClientError> {
        self.fetch(ApiRequest::new("/platform/3/storagepool/storagepools"))
            .await
    }

    pub async fn sync_policies(&self) -> Result<SyncPolicies, ClientError> {
        self.fetch(ApiRequest::new("/platform/3/sync/policies"))
            .await
    }

    pub async fn snapshots_summary(&self) -> Result<SnapshotsSummary, ClientError> {
        let resp: SnapshotsSummaryResponse = self
            .fetch(ApiRequest::new("/platform/1/snapshot/snapshots-summary"))
            .await?;
        Ok(resp.summary)
    }

    /// Every snapshot, following resume tokens until the listing is exhausted.
    pub async fn snapshots(&self) -> Result<Vec<Snapshot>, ClientError> {
        const PATH: &str = "/platform/1/snapshot/snapshots";
        let mut snapshots = Vec::new();
        let mut request = ApiRequest::new(PATH);
        loop {
            let page: SnapshotsPage = self.fetch(request).await?;
            snapshots.extend(decode_items::<Snapshot>("snapshot", page.snapshots));
            match page.resume.filter(|t| !t.is_empty()) {
                Some(token) => request = ApiRequest::new(PATH).param("resume", token),
                None => return Ok(snapshots),
            }
        }
    }

    pub async fn nfs_exports_summary(&self) -> Result<f64, ClientError> {
        let resp: CountSummaryResponse = self
            .fetch(ApiRequest::new("/platform/2/protocols/nfs/exports-summary"))
            .await?;
        Ok(resp.summary.count)
    }

    pub async fn smb_shares_summary(&self) -> Result<f64, ClientError> {
        let resp: CountSummaryResponse = self
            .fetch(ApiRequest::new("/platform/3/protocols/smb/shares-summary"))
            .await?;
        Ok(resp.summary.count)
    }
}

/// Drops records the statistics engine flagged with an error or returned without a value.
fn usable_record<V>(key: &str, record: StatRecord<V>) -> Option<(i64, V)> {
    if let Some(err) = record.error.filter(|e| !e.is_null()) {
        warn!(key, devid = record.devid, error = %err, "statistics engine reported an error");
        return None;
    }
    match record.value {
        Some(value) => Some((record.devid, value)),
        None => {
            debug!(key = %record.key, devid = record.devid, "statistic has no value");
            None
        }
    }
}

fn decode_items<T: DeserializeOwned>(what: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(error = %e, "skipping malformed {what}");
                None
            }
        })
        .collect()
}
