use async_trait::async_trait;
use tracing::warn;

use super::stat_key::StatKeyCollector;
use super::{CollectError, Collector, PassContext};
use crate::client::StatClient;
use crate::metrics::{Desc, SampleSink};

/// Cluster health from the statistics engine plus the running OneFS release.
pub(crate) struct ClusterHealthCollector {
    client: StatClient,
    health: StatKeyCollector,
    onefs_version: Desc<1>,
}

impl ClusterHealthCollector {
    pub(crate) fn new(client: StatClient) -> Self {
        let health = StatKeyCollector::new("cluster_health", client.clone()).cluster(
            "cluster",
            "cluster.health",
            "health",
            "Cluster health: 0 = healthy, 1 = attention, 2 = down.",
        );
        Self {
            client,
            health,
            onefs_version: Desc::new(
                "cluster",
                "onefs_version",
                "OneFS release running on the cluster. Always 1.",
                ["version"],
            ),
        }
    }
}

#[async_trait]
impl Collector for ClusterHealthCollector {
    fn name(&self) -> &'static str {
        "cluster_health"
    }

    async fn update(&self, ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let result = self.health.update(ctx, sink).await;

        match self.client.cluster_config().await {
            Ok(config) => {
                let release = config.onefs_version.release;
                sink.emit(self.onefs_version.sample(1.0, [release.as_str()]));
            }
            Err(e) => warn!(error = %e, "unable to read OneFS version"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiRequest;
    use crate::client::mock::MockTransport;
    use crate::collector::test_support::{run, value_of, values};

    #[tokio::test]
    async fn test_health_and_version() {
        let mock = MockTransport::typical_cluster();
        let (result, samples) = run(&ClusterHealthCollector::new(StatClient::new(mock))).await;
        assert!(result.is_ok());
        assert_eq!(values(&samples, "isilon_cluster_health"), vec![0.0]);
        assert_eq!(
            value_of(&samples, "isilon_cluster_onefs_version", &[("version", "9.5.0.0")]),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn test_version_failure_is_partial() {
        let mut mock = MockTransport::typical_cluster();
        mock.remove(&ApiRequest::new("/platform/3/cluster/config"));
        let (result, samples) = run(&ClusterHealthCollector::new(StatClient::new(mock))).await;
        assert!(result.is_ok());
        assert_eq!(values(&samples, "isilon_cluster_health"), vec![0.0]);
        assert!(values(&samples, "isilon_cluster_onefs_version").is_empty());
    }
}
