use async_trait::async_trait;
use tracing::warn;

use super::{CollectError, Collector, PassContext};
use crate::client::StatClient;
use crate::client::types::{Snapshot, SnapshotsSummary};
use crate::metrics::{Desc, SampleSink};

/// Age buckets reported by `snapshots_older_than_days`.
const AGE_BUCKETS_DAYS: [i64; 5] = [7, 15, 30, 60, 90];
const SECONDS_PER_DAY: i64 = 86_400;

/// Snapshot summary counters plus an age histogram of the snapshot list.
pub(crate) struct SnapshotsCollector {
    client: StatClient,
    summary: [Desc<0>; 8],
    older_than: Desc<1>,
}

impl SnapshotsCollector {
    pub(crate) fn new(client: StatClient) -> Self {
        let gauge = |name: &str, help: &str| Desc::new("", name, help, []);
        // same order as summary_values
        let summary = [
            gauge("snapshots_count", "Number of snapshots."),
            gauge("snapshots_size_bytes", "Space used by all snapshots."),
            gauge("snapshots_active_count", "Number of active snapshots."),
            gauge(
                "snapshots_active_size_bytes",
                "Space used by active snapshots.",
            ),
            gauge(
                "snapshots_deleting_count",
                "Number of snapshots pending deletion.",
            ),
            gauge(
                "snapshots_deleting_size_bytes",
                "Space used by snapshots pending deletion.",
            ),
            gauge(
                "snapshots_shadow_bytes",
                "Bytes used by shadow stores referenced by snapshots.",
            ),
            gauge("snapshots_aliases_count", "Number of snapshot aliases."),
        ];
        Self {
            client,
            summary,
            older_than: Desc::new(
                "",
                "snapshots_older_than_days",
                "Number of snapshots older than the given number of days.",
                ["days"],
            ),
        }
    }
}

#[async_trait]
impl Collector for SnapshotsCollector {
    fn name(&self) -> &'static str {
        "snapshots"
    }

    async fn update(&self, ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let summary = self.client.snapshots_summary().await?;
        for (desc, value) in self.summary.iter().zip(summary_values(&summary)) {
            sink.emit(desc.sample(value, []));
        }

        match self.client.snapshots().await {
            Ok(snapshots) => {
                for (days, count) in age_histogram(&snapshots, ctx.started_at()) {
                    sink.emit(self.older_than.sample(count as f64, [days.to_string().as_str()]));
                }
            }
            Err(e) => warn!(error = %e, "unable to list snapshots"),
        }
        Ok(())
    }
}

fn summary_values(s: &SnapshotsSummary) -> [f64; 8] {
    [
        s.count,
        s.size,
        s.active_count,
        s.active_size,
        s.deleting_count,
        s.deleting_size,
        s.shadow_bytes,
        s.aliases_count,
    ]
}

/// Counts snapshots strictly older than each bucket, measured from `now` (unix seconds).
fn age_histogram(snapshots: &[Snapshot], now: i64) -> [(i64, usize); 5] {
    AGE_BUCKETS_DAYS.map(|days| {
        let cutoff = now - days * SECONDS_PER_DAY;
        let count = snapshots.iter().filter(|s| s.created < cutoff).count();
        (days, count)
    })
}
