//! Collectors and the collection pass.
//!
//! Every collector implements `Collector::update`, which issues one or more
//! API calls and emits gauges into its own `SampleSink`. The `Registry`
//! resolves which collectors run, the `Orchestrator` runs them concurrently
//! and adds per-collector meta-metrics.
//!
//! Error policy: a collector returns `Err` only when its primary data source
//! could not be reached at all. Failed optional sub-queries are logged and
//! the collector still returns `Ok` with whatever it gathered.

mod cluster_health;
mod context;
mod node_info;
mod node_partition;
mod orchestrator;
pub mod protocol;
pub mod quota;
mod registry;
mod shares;
mod snapshots;
mod stat_key;
mod statfs;
mod storage_pools;
mod sync_iq;

use std::fmt;

use async_trait::async_trait;

use crate::client::ClientError;
use crate::metrics::SampleSink;

pub use context::PassContext;
pub use orchestrator::{CollectorRun, Orchestrator, PassOutcome};
pub use protocol::{PROTOCOL_DEFAULTS, ProtocolEnablement, ProtocolFamily};
pub use quota::QuotaSettings;
pub use registry::{COLLECTORS, CollectorEntry, CollectorSettings, Registry, RegistryError};

/// A pluggable source of metrics.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Registry name, also the `collector` label of the meta-metrics.
    fn name(&self) -> &'static str;

    /// Runs one collection and emits samples into `sink`.
    async fn update(&self, ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError>;
}

/// Error returned by a collector update.
#[derive(Debug)]
pub enum CollectError {
    /// The collector's primary API call failed.
    Client(ClientError),
    /// Every statistics key the collector owns failed.
    AllKeysFailed { failed: usize },
    /// Quota count never matched the expected total within the retry budget.
    Reconciliation {
        attempts: u32,
        budget: u32,
        collected: u64,
        expected: u64,
    },
    /// The pass deadline expired before the collector finished.
    DeadlineExceeded,
    /// The collector task ended without reporting a result.
    Aborted(String),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::Client(e) => write!(f, "{e}"),
            CollectError::AllKeysFailed { failed } => {
                write!(f, "all {failed} statistics keys failed")
            }
            CollectError::Reconciliation {
                attempts,
                budget,
                collected,
                expected,
            } => write!(
                f,
                "collected {collected} of {expected} quotas after {attempts} attempts (retry budget {budget} exhausted)"
            ),
            CollectError::DeadlineExceeded => write!(f, "scrape deadline exceeded"),
            CollectError::Aborted(e) => write!(f, "collector task aborted: {e}"),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Client(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ClientError> for CollectError {
    fn from(e: ClientError) -> Self {
        CollectError::Client(e)
    }
}

/// Maps a flag to a 0/1 gauge value.
pub(crate) fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}
