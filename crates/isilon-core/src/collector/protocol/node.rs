use async_trait::async_trait;
use tracing::warn;

use super::{FieldDescs, ProtocolEnablement, ProtocolFamily};
use crate::client::{ClientError, ProtoStatPayload, StatClient};
use crate::collector::{CollectError, Collector, PassContext};
use crate::metrics::{Desc, SampleSink};

/// Per-node protocol operation statistics and client counts.
pub(crate) struct NodeProtocolCollector {
    client: StatClient,
    protocols: Vec<String>,
    ops: FieldDescs<4>,
    totals: FieldDescs<2>,
    active: Desc<2>,
    connected: Desc<2>,
}

impl NodeProtocolCollector {
    pub(crate) fn new(client: StatClient, protocols: &ProtocolEnablement) -> Self {
        Self {
            client,
            protocols: protocols.enabled().map(String::from).collect(),
            ops: FieldDescs::new(
                "node",
                "protostats",
                "per node and operation",
                ["node", "proto", "op", "class"],
            ),
            totals: FieldDescs::new(
                "node",
                "protostats_total",
                "per node, all operations",
                ["node", "proto"],
            ),
            active: Desc::new(
                "node",
                "clientstats_active",
                "Clients with an operation in flight on the node.",
                ["node", "proto"],
            ),
            connected: Desc::new(
                "node",
                "clientstats_connected",
                "Clients connected to the node.",
                ["node", "proto"],
            ),
        }
    }

    async fn collect_ops(&self, proto: &str, sink: &mut SampleSink) -> Result<(), ClientError> {
        let records = self
            .client
            .query_protocol(&format!("node.protostats.{proto}"))
            .await?;
        for (devid, payload) in records {
            let ProtoStatPayload::Operations(ops) = payload else {
                continue;
            };
            let node = devid.to_string();
            for op in &ops {
                self.ops.emit(
                    &op.fields,
                    [node.as_str(), proto, op.op_name.as_str(), op.class_name.as_str()],
                    sink,
                );
            }
        }
        Ok(())
    }

    async fn collect_totals(&self, proto: &str, sink: &mut SampleSink) -> Result<(), ClientError> {
        let records = self
            .client
            .query_protocol(&format!("node.protostats.{proto}.total"))
            .await?;
        for (devid, payload) in records {
            let ProtoStatPayload::Totals(totals) = payload else {
                continue;
            };
            let node = devid.to_string();
            for total in &totals {
                self.totals.emit(&total.fields, [node.as_str(), proto], sink);
            }
        }
        Ok(())
    }

    async fn collect_active(&self, proto: &str, sink: &mut SampleSink) -> Result<(), ClientError> {
        // no client accounting for these
        if matches!(proto, "nfs4" | "lsass_in") {
            return Ok(());
        }
        let stats = self
            .client
            .query_single(&format!("node.clientstats.active.{proto}"))
            .await?;
        for stat in stats {
            let node = stat.devid.to_string();
            sink.emit(self.active.sample(stat.value, [node.as_str(), proto]));
        }
        Ok(())
    }

    async fn collect_connected(
        &self,
        ctx: &PassContext,
        proto: &str,
        sink: &mut SampleSink,
    ) -> Result<(), ClientError> {
        if proto == "jobd" || proto.starts_with("lsass") {
            return Ok(());
        }
        let key_proto = match ProtocolFamily::of(proto) {
            Some(family) if ctx.claim_family(family) => family.as_str(),
            Some(_) => return Ok(()),
            None => proto,
        };
        let stats = self
            .client
            .query_single(&format!("node.clientstats.connected.{key_proto}"))
            .await?;
        for stat in stats {
            let node = stat.devid.to_string();
            sink.emit(self.connected.sample(stat.value, [node.as_str(), key_proto]));
        }
        Ok(())
    }
}

#[async_trait]
impl Collector for NodeProtocolCollector {
    fn name(&self) -> &'static str {
        "node_protocol"
    }

    async fn update(&self, ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let mut failed = 0;
        for proto in &self.protocols {
            let proto = proto.as_str();
            if let Err(e) = self.collect_ops(proto, sink).await {
                warn!(proto, error = %e, "unable to collect node protocol operation stats");
                failed += 1;
            }
            if let Err(e) = self.collect_totals(proto, sink).await {
                warn!(proto, error = %e, "unable to collect node protocol totals");
            }
            if let Err(e) = self.collect_active(proto, sink).await {
                warn!(proto, error = %e, "unable to collect active client stats");
            }
            if let Err(e) = self.collect_connected(ctx, proto, sink).await {
                warn!(proto, error = %e, "unable to collect connected client stats");
            }
        }

        if failed > 0 && failed == self.protocols.len() {
            return Err(CollectError::AllKeysFailed { failed });
        }
        Ok(())
    }
}
