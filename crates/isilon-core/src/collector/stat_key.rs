//! Statistics-engine collectors.
//!
//! Each collector here is a table of statistics keys; one `StatKeyCollector`
//! walks its table, queries every key, applies the key's fixed-point scale
//! and records per-key call duration and success.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{CollectError, Collector, PassContext, flag};
use crate::client::{ClientError, StatClient};
use crate::metrics::{Desc, SampleSink, Scale};

enum Shape {
    /// Cluster-wide scalar; only the first record is used.
    Cluster(Desc<0>),
    /// Scalar per node, labelled by device id.
    Node(Desc<1>),
    /// Value set per node, one sample per sub-key (disk bay).
    NodeDisk(Desc<2>),
}

struct KeyedStat {
    key: &'static str,
    scale: Scale,
    shape: Shape,
}

/// Collector backed by a fixed list of statistics keys.
pub(crate) struct StatKeyCollector {
    name: &'static str,
    client: StatClient,
    stats: Vec<KeyedStat>,
    call_duration: Desc<1>,
    call_success: Desc<1>,
}

impl StatKeyCollector {
    pub(crate) fn new(name: &'static str, client: StatClient) -> Self {
        Self {
            name,
            client,
            stats: Vec::new(),
            call_duration: Desc::new(
                "stats_engine",
                "call_duration_seconds",
                "Duration of one statistics engine query.",
                ["stat_key"],
            ),
            call_success: Desc::new(
                "stats_engine",
                "call_success",
                "Whether the last statistics engine query succeeded (1) or failed (0).",
                ["stat_key"],
            ),
        }
    }

    /// Adds a per-node scalar key under the `node` subsystem.
    pub(crate) fn node(self, key: &'static str, name: &str, help: &str) -> Self {
        self.node_scaled(key, name, help, Scale::Raw)
    }

    pub(crate) fn node_scaled(
        mut self,
        key: &'static str,
        name: &str,
        help: &str,
        scale: Scale,
    ) -> Self {
        self.stats.push(KeyedStat {
            key,
            scale,
            shape: Shape::Node(Desc::new("node", name, help, ["node"])),
        });
        self
    }

    /// Adds a per-node multi-value key, one sample per disk.
    pub(crate) fn disk(mut self, key: &'static str, name: &str, help: &str, scale: Scale) -> Self {
        self.stats.push(KeyedStat {
            key,
            scale,
            shape: Shape::NodeDisk(Desc::new("node", name, help, ["node", "disk"])),
        });
        self
    }

    /// Adds a cluster-wide scalar key.
    pub(crate) fn cluster(
        mut self,
        subsystem: &str,
        key: &'static str,
        name: &str,
        help: &str,
    ) -> Self {
        self.stats.push(KeyedStat {
            key,
            scale: Scale::Raw,
            shape: Shape::Cluster(Desc::new(subsystem, name, help, [])),
        });
        self
    }

    async fn collect_key(&self, stat: &KeyedStat, sink: &mut SampleSink) -> Result<(), ClientError> {
        match &stat.shape {
            Shape::Cluster(desc) => {
                let records = self.client.query_single(stat.key).await?;
                match records.first() {
                    Some(record) => sink.emit(desc.sample(stat.scale.apply(record.value), [])),
                    None => debug!(key = stat.key, "no cluster value reported"),
                }
            }
            Shape::Node(desc) => {
                for record in self.client.query_single(stat.key).await? {
                    let node = record.devid.to_string();
                    sink.emit(desc.sample(stat.scale.apply(record.value), [node.as_str()]));
                }
            }
            Shape::NodeDisk(desc) => {
                for record in self.client.query_multi(stat.key).await? {
                    let node = record.devid.to_string();
                    for set in &record.values {
                        for (disk, value) in set {
                            sink.emit(desc.sample(stat.scale.apply(*value), [node.as_str(), disk.as_str()]));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Collector for StatKeyCollector {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let mut failed = 0;
        for stat in &self.stats {
            let begin = Instant::now();
            let outcome = self.collect_key(stat, sink).await;
            let elapsed = begin.elapsed().as_secs_f64();

            sink.emit(self.call_duration.sample(elapsed, [stat.key]));
            sink.emit(self.call_success.sample(flag(outcome.is_ok()), [stat.key]));
            if let Err(e) = outcome {
                warn!(collector = self.name, key = stat.key, error = %e, "statistics query failed");
                failed += 1;
            }
        }

        if !self.stats.is_empty() && failed == self.stats.len() {
            return Err(CollectError::AllKeysFailed { failed });
        }
        Ok(())
    }
}

// ============================================================
// Collector tables
// ============================================================

pub(crate) fn cpu(client: StatClient) -> StatKeyCollector {
    StatKeyCollector::new("cpu", client)
        .node("node.cpu.count", "cpu_count", "Number of CPUs on the node.")
        .node_scaled(
            "node.cpu.idle.avg",
            "cpu_idle_avg",
            "Average CPU idle percentage.",
            Scale::Tenths,
        )
        .node_scaled(
            "node.cpu.user.avg",
            "cpu_user_avg",
            "Average CPU user percentage.",
            Scale::Tenths,
        )
        .node_scaled(
            "node.cpu.sys.avg",
            "cpu_sys_avg",
            "Average CPU system percentage.",
            Scale::Tenths,
        )
        .node_scaled(
            "node.load.1min",
            "load_1min",
            "Load average over 1 minute.",
            Scale::Hundredths,
        )
        .node_scaled(
            "node.load.5min",
            "load_5min",
            "Load average over 5 minutes.",
            Scale::Hundredths,
        )
        .node_scaled(
            "node.load.15min",
            "load_15min",
            "Load average over 15 minutes.",
            Scale::Hundredths,
        )
}

pub(crate) fn memory(client: StatClient) -> StatKeyCollector {
    StatKeyCollector::new("memory", client)
        .node("node.memory.used", "memory_used", "Memory used on the node in bytes.")
        .node("node.memory.free", "memory_free", "Memory free on the node in bytes.")
        .node("node.memory.cache", "memory_cache", "Memory used for cache in bytes.")
}

pub(crate) fn disk(client: StatClient) -> StatKeyCollector {
    StatKeyCollector::new("disk", client)
        .disk(
            "node.disk.busy.all",
            "disk_busy",
            "Disk busy percentage.",
            Scale::Tenths,
        )
        .disk(
            "node.disk.iosched.queue.all",
            "disk_iosched_queue",
            "Operations queued in the disk scheduler.",
            Scale::Raw,
        )
        .disk(
            "node.disk.xfers.in.rate.all",
            "disk_xfers_in_rate",
            "Disk write transfers per second.",
            Scale::Raw,
        )
        .disk(
            "node.disk.xfers.out.rate.all",
            "disk_xfers_out_rate",
            "Disk read transfers per second.",
            Scale::Raw,
        )
        .disk(
            "node.disk.access.latency.all",
            "disk_access_latency",
            "Disk access latency in microseconds.",
            Scale::Raw,
        )
}

pub(crate) fn network(client: StatClient) -> StatKeyCollector {
    StatKeyCollector::new("network", client)
        .node(
            "node.net.ext.bytes.in.rate",
            "net_ext_bytes_in_rate",
            "External interface bytes received per second.",
        )
        .node(
            "node.net.ext.bytes.out.rate",
            "net_ext_bytes_out_rate",
            "External interface bytes sent per second.",
        )
        .node(
            "node.net.ext.errors.in.rate",
            "net_ext_errors_in_rate",
            "External interface receive errors per second.",
        )
        .node(
            "node.net.ext.errors.out.rate",
            "net_ext_errors_out_rate",
            "External interface send errors per second.",
        )
}

pub(crate) fn capacity(client: StatClient) -> StatKeyCollector {
    StatKeyCollector::new("capacity", client)
        .cluster("ifs", "ifs.bytes.total", "bytes_total", "Total cluster capacity in bytes.")
        .cluster("ifs", "ifs.bytes.used", "bytes_used", "Used cluster capacity in bytes.")
        .cluster(
            "ifs",
            "ifs.bytes.avail",
            "bytes_avail",
            "Cluster capacity available to users in bytes.",
        )
        .cluster("ifs", "ifs.bytes.free", "bytes_free", "Free cluster capacity in bytes.")
        .cluster("ifs", "ifs.percent.used", "percent_used", "Percentage of capacity used.")
        .cluster(
            "ifs",
            "ifs.percent.avail",
            "percent_avail",
            "Percentage of capacity available to users.",
        )
        .cluster("ifs", "ifs.percent.free", "percent_free", "Percentage of capacity free.")
}

pub(crate) fn node_capacity(client: StatClient) -> StatKeyCollector {
    StatKeyCollector::new("node_capacity", client)
        .node("node.ifs.bytes.free", "ifs_bytes_free", "Free IFS bytes on the node.")
        .node("node.ifs.bytes.used", "ifs_bytes_used", "Used IFS bytes on the node.")
        .node("node.ifs.bytes.total", "ifs_bytes_total", "Total IFS bytes on the node.")
}

pub(crate) fn node_health(client: StatClient) -> StatKeyCollector {
    StatKeyCollector::new("node_health", client)
        .node(
            "node.disk.unhealthy.count",
            "disk_unhealthy_count",
            "Number of unhealthy disks on the node.",
        )
        .node(
            "node.health",
            "health",
            "Node health: 0 = healthy, 1 = attention, 2 = down, 3 = smartfailed.",
        )
        .node("node.disk.count", "disk_count", "Number of disks on the node.")
        .node("node.boottime", "boottime", "Node boot time in unix seconds.")
        .node("node.uptime", "uptime", "Node uptime in seconds.")
}
