use async_trait::async_trait;

use super::{CollectError, Collector, PassContext};
use crate::client::StatClient;
use crate::metrics::{Desc, SampleSink};

/// Number of configured NFS exports.
pub(crate) struct NfsExportsCollector {
    client: StatClient,
    count: Desc<0>,
}

impl NfsExportsCollector {
    pub(crate) fn new(client: StatClient) -> Self {
        Self {
            client,
            count: Desc::new(
                "cluster",
                "nfs_exports_count",
                "Number of NFS exports on the cluster.",
                [],
            ),
        }
    }
}

#[async_trait]
impl Collector for NfsExportsCollector {
    fn name(&self) -> &'static str {
        "nfs_exports"
    }

    async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let count = self.client.nfs_exports_summary().await?;
        sink.emit(self.count.sample(count, []));
        Ok(())
    }
}

/// Number of configured SMB shares.
pub(crate) struct SmbSharesCollector {
    client: StatClient,
    count: Desc<0>,
}

impl SmbSharesCollector {
    pub(crate) fn new(client: StatClient) -> Self {
        Self {
            client,
            count: Desc::new(
                "cluster",
                "smb_shares_count",
                "Number of SMB shares on the cluster.",
                [],
            ),
        }
    }
}

#[async_trait]
impl Collector for SmbSharesCollector {
    fn name(&self) -> &'static str {
        "smb_shares"
    }

    async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let count = self.client.smb_shares_summary().await?;
        sink.emit(self.count.sample(count, []));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockTransport;
    use crate::collector::test_support::{run, values};

    #[tokio::test]
    async fn test_share_counts() {
        let client = StatClient::new(MockTransport::typical_cluster());

        let (result, samples) = run(&NfsExportsCollector::new(client.clone())).await;
        assert!(result.is_ok());
        assert_eq!(values(&samples, "isilon_cluster_nfs_exports_count"), vec![12.0]);

        let (result, samples) = run(&SmbSharesCollector::new(client)).await;
        assert!(result.is_ok());
        assert_eq!(values(&samples, "isilon_cluster_smb_shares_count"), vec![5.0]);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let client = StatClient::new(MockTransport::new());
        let (result, samples) = run(&SmbSharesCollector::new(client)).await;
        assert!(matches!(result, Err(CollectError::Client(_))));
        assert!(samples.is_empty());
    }
}
