use async_trait::async_trait;

use super::{CollectError, Collector, PassContext};
use crate::client::StatClient;
use crate::metrics::{Desc, SampleSink};

/// statfs(2) view of the cluster file system.
pub(crate) struct StatfsCollector {
    client: StatClient,
    gauges: [(StatfsField, Desc<1>); 6],
}

#[derive(Clone, Copy)]
enum StatfsField {
    Blocks,
    BlocksFree,
    BlocksAvail,
    BlockSize,
    Files,
    FilesFree,
}

impl StatfsCollector {
    pub(crate) fn new(client: StatClient) -> Self {
        let desc = |name: &str, help: &str| Desc::new("ifs", name, help, ["mount"]);
        Self {
            client,
            gauges: [
                (
                    StatfsField::Blocks,
                    desc("statfs_blocks_total", "Total data blocks in the file system."),
                ),
                (
                    StatfsField::BlocksFree,
                    desc("statfs_blocks_free", "Free blocks in the file system."),
                ),
                (
                    StatfsField::BlocksAvail,
                    desc(
                        "statfs_blocks_avail",
                        "Free blocks available to non-superusers.",
                    ),
                ),
                (
                    StatfsField::BlockSize,
                    desc("statfs_block_size", "Fragment size in bytes."),
                ),
                (
                    StatfsField::Files,
                    desc("statfs_files_total", "Total file nodes in the file system."),
                ),
                (
                    StatfsField::FilesFree,
                    desc("statfs_files_free", "Free file nodes in the file system."),
                ),
            ],
        }
    }
}

#[async_trait]
impl Collector for StatfsCollector {
    fn name(&self) -> &'static str {
        "statfs"
    }

    async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let statfs = self.client.statfs().await?;
        let mount = statfs.f_mntonname.as_str();
        for (field, desc) in &self.gauges {
            let value = match field {
                StatfsField::Blocks => statfs.f_blocks,
                StatfsField::BlocksFree => statfs.f_bfree,
                StatfsField::BlocksAvail => statfs.f_bavail,
                StatfsField::BlockSize => statfs.f_bsize,
                StatfsField::Files => statfs.f_files,
                StatfsField::FilesFree => statfs.f_ffree,
            };
            sink.emit(desc.sample(value, [mount]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockTransport;
    use crate::collector::test_support::{run, value_of};

    #[tokio::test]
    async fn test_statfs() {
        let mock = MockTransport::typical_cluster();
        let (result, samples) = run(&StatfsCollector::new(StatClient::new(mock))).await;
        assert!(result.is_ok());
        assert_eq!(samples.len(), 6);
        assert_eq!(
            value_of(&samples, "isilon_ifs_statfs_block_size", &[("mount", "/ifs")]),
            Some(8192.0)
        );
    }
}
