use async_trait::async_trait;
use tracing::warn;

use super::{FieldDescs, ProtocolEnablement};
use crate::client::{ClientError, ProtoStatPayload, StatClient};
use crate::collector::{CollectError, Collector, PassContext};
use crate::metrics::SampleSink;

/// Cluster-wide protocol operation statistics.
pub(crate) struct ClusterProtocolCollector {
    client: StatClient,
    protocols: Vec<String>,
    ops: FieldDescs<3>,
    totals: FieldDescs<1>,
}

impl ClusterProtocolCollector {
    pub(crate) fn new(client: StatClient, protocols: &ProtocolEnablement) -> Self {
        Self {
            client,
            protocols: protocols.enabled().map(String::from).collect(),
            ops: FieldDescs::new(
                "cluster",
                "protostats",
                "cluster-wide per operation",
                ["proto", "op", "class"],
            ),
            totals: FieldDescs::new(
                "cluster",
                "protostats_total",
                "cluster-wide, all operations",
                ["proto"],
            ),
        }
    }

    async fn collect(&self, proto: &str, sink: &mut SampleSink) -> Result<(), ClientError> {
        let records = self
            .client
            .query_protocol(&format!("cluster.protostats.{proto}"))
            .await?;
        for (_, payload) in records {
            if let ProtoStatPayload::Operations(ops) = payload {
                for op in &ops {
                    self.ops.emit(
                        &op.fields,
                        [proto, op.op_name.as_str(), op.class_name.as_str()],
                        sink,
                    );
                }
            }
        }
        Ok(())
    }

    async fn collect_totals(&self, proto: &str, sink: &mut SampleSink) -> Result<(), ClientError> {
        let records = self
            .client
            .query_protocol(&format!("cluster.protostats.{proto}.total"))
            .await?;
        for (_, payload) in records {
            if let ProtoStatPayload::Totals(totals) = payload {
                for total in &totals {
                    self.totals.emit(&total.fields, [proto], sink);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Collector for ClusterProtocolCollector {
    fn name(&self) -> &'static str {
        "cluster_protocol"
    }

    async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let mut failed = 0;
        for proto in &self.protocols {
            let proto = proto.as_str();
            if let Err(e) = self.collect(proto, sink).await {
                warn!(proto, error = %e, "unable to collect cluster protocol operation stats");
                failed += 1;
            }
            if let Err(e) = self.collect_totals(proto, sink).await {
                warn!(proto, error = %e, "unable to collect cluster protocol totals");
            }
        }

        if failed > 0 && failed == self.protocols.len() {
            return Err(CollectError::AllKeysFailed { failed });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockTransport;
    use crate::collector::test_support::{run, value_of, values};

    #[tokio::test]
    async fn test_typical_cluster() {
        let mock = MockTransport::typical_cluster();
        let collector =
            ClusterProtocolCollector::new(StatClient::new(mock), &ProtocolEnablement::default());
        let (result, samples) = run(&collector).await;
        assert!(result.is_ok());

        assert_eq!(
            value_of(
                &samples,
                "isilon_cluster_protostats_op_count",
                &[("proto", "nfs3"), ("op", "write")]
            ),
            Some(5400.0)
        );
        assert_eq!(
            value_of(&samples, "isilon_cluster_protostats_total_op_rate", &[("proto", "smb2")]),
            Some(310.0)
        );
        // total samples carry only the proto label
        assert!(
            samples
                .iter()
                .filter(|s| s.name().starts_with("isilon_cluster_protostats_total_"))
                .all(|s| s.labels().count() == 1)
        );
        assert!(!values(&samples, "isilon_cluster_protostats_in_rate").is_empty());
    }

    #[tokio::test]
    async fn test_unreachable() {
        let collector = ClusterProtocolCollector::new(
            StatClient::new(MockTransport::new()),
            &ProtocolEnablement::default(),
        );
        let (result, samples) = run(&collector).await;
        assert!(matches!(result, Err(CollectError::AllKeysFailed { failed: 9 })));
        assert!(samples.is_empty());
    }
}
