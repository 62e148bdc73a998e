use async_trait::async_trait;
use tracing::warn;

use super::{CollectError, Collector, PassContext};
use crate::client::StatClient;
use crate::metrics::{Desc, SampleSink};

/// Per-node system partitions (root, var, crash dumps, journal).
pub(crate) struct NodePartitionCollector {
    client: StatClient,
    count: Desc<2>,
    used_percent: Desc<3>,
    blocks_total: Desc<3>,
    blocks_free: Desc<3>,
    blocks_avail: Desc<3>,
    filenodes_free: Desc<3>,
    filenodes_total: Desc<3>,
    filenodes_free_percent: Desc<3>,
}

impl NodePartitionCollector {
    pub(crate) fn new(client: StatClient) -> Self {
        let partition = |name: &str, help: &str| {
            Desc::new("node", name, help, ["node", "lnn", "mount_point"])
        };
        Self {
            client,
            count: Desc::new(
                "node",
                "partition_count",
                "Number of partitions on the node.",
                ["node", "lnn"],
            ),
            used_percent: partition(
                "partition_used_percent",
                "Fraction of the partition in use (0-1).",
            ),
            blocks_total: partition("partition_blocks_total", "Total blocks on the partition."),
            blocks_free: partition("partition_blocks_free", "Free blocks on the partition."),
            blocks_avail: partition(
                "partition_blocks_avail",
                "Blocks available to non-superusers on the partition.",
            ),
            filenodes_free: partition(
                "partition_filenodes_free",
                "Free file nodes on the partition.",
            ),
            filenodes_total: partition(
                "partition_filenodes_total",
                "Total file nodes on the partition.",
            ),
            filenodes_free_percent: partition(
                "partition_filenodes_free_percent",
                "Fraction of file nodes free on the partition (0-1).",
            ),
        }
    }
}

#[async_trait]
impl Collector for NodePartitionCollector {
    fn name(&self) -> &'static str {
        "node_partition"
    }

    async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let resp = self.client.nodes_partitions().await?;

        for node in &resp.nodes {
            let id = node.id.to_string();
            let lnn = node.lnn.to_string();
            sink.emit(self.count.sample(node.count, [id.as_str(), lnn.as_str()]));

            for partition in &node.partitions {
                if partition.mount_point.contains("Unknown") {
                    continue;
                }
                let labels = [id.as_str(), lnn.as_str(), partition.mount_point.as_str()];

                match parse_percent(&partition.percent_used) {
                    Some(used) => sink.emit(self.used_percent.sample(used, labels)),
                    None => warn!(
                        node = node.id,
                        mount_point = %partition.mount_point,
                        value = %partition.percent_used,
                        "unparseable partition usage"
                    ),
                }

                let statfs = &partition.statfs;
                sink.emit(self.blocks_total.sample(statfs.f_blocks, labels));
                sink.emit(self.blocks_free.sample(statfs.f_bfree, labels));
                sink.emit(self.blocks_avail.sample(statfs.f_bavail, labels));
                sink.emit(self.filenodes_free.sample(statfs.f_ffree, labels));
                sink.emit(self.filenodes_total.sample(statfs.f_files, labels));
                if statfs.f_files > 0.0 {
                    sink.emit(
                        self.filenodes_free_percent
                            .sample(statfs.f_ffree / statfs.f_files, labels),
                    );
                }
            }
        }
        Ok(())
    }
}

/// Parses `"42%"` into `0.42`.
fn parse_percent(raw: &str) -> Option<f64> {
    let digits = raw.trim().trim_end_matches('%').trim();
    digits.parse::<f64>().ok().map(|v| v / 100.0)
}
