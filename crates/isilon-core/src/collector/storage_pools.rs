use async_trait::async_trait;
use tracing::warn;

use super::{CollectError, Collector, PassContext, flag};
use crate::client::StatClient;
use crate::client::types::StoragePoolUsage;
use crate::metrics::{Desc, SampleSink};

/// Storage pool (node pool and tier) usage.
pub(crate) struct StoragePoolsCollector {
    client: StatClient,
    total: Desc<0>,
    manual: Desc<1>,
    balanced: Desc<1>,
    bytes: Vec<(PoolBytes, Desc<1>)>,
}

#[derive(Clone, Copy)]
enum PoolBytes {
    Avail,
    AvailSsd,
    Free,
    FreeSsd,
    Total,
    TotalSsd,
    VirtualHotSpare,
}

impl PoolBytes {
    fn of(self, usage: &StoragePoolUsage) -> &str {
        match self {
            PoolBytes::Avail => &usage.avail_bytes,
            PoolBytes::AvailSsd => &usage.avail_ssd_bytes,
            PoolBytes::Free => &usage.free_bytes,
            PoolBytes::FreeSsd => &usage.free_ssd_bytes,
            PoolBytes::Total => &usage.total_bytes,
            PoolBytes::TotalSsd => &usage.total_ssd_bytes,
            PoolBytes::VirtualHotSpare => &usage.virtual_hot_spare_bytes,
        }
    }
}

impl StoragePoolsCollector {
    pub(crate) fn new(client: StatClient) -> Self {
        let pool = |name: &str, help: &str| Desc::new("storage_pool", name, help, ["pool"]);
        let bytes = vec![
            (
                PoolBytes::Avail,
                pool("bytes_avail", "Bytes available in the storage pool."),
            ),
            (
                PoolBytes::AvailSsd,
                pool("bytes_avail_ssd", "SSD bytes available in the storage pool."),
            ),
            (
                PoolBytes::Free,
                pool("bytes_free", "Free bytes in the storage pool."),
            ),
            (
                PoolBytes::FreeSsd,
                pool("bytes_free_ssd", "Free SSD bytes in the storage pool."),
            ),
            (
                PoolBytes::Total,
                pool("bytes_total", "Total bytes in the storage pool."),
            ),
            (
                PoolBytes::TotalSsd,
                pool("bytes_total_ssd", "Total SSD bytes in the storage pool."),
            ),
            (
                PoolBytes::VirtualHotSpare,
                pool(
                    "bytes_virtual_hot_spare",
                    "Bytes reserved for virtual hot spare in the storage pool.",
                ),
            ),
        ];
        Self {
            client,
            total: Desc::new("storage_pool", "total", "Number of storage pools.", []),
            manual: pool("manual", "Whether the pool was created manually (1) or not (0)."),
            balanced: pool("balanced", "Pool balance: 0 = balanced, 1 = unbalanced."),
            bytes,
        }
    }
}

#[async_trait]
impl Collector for StoragePoolsCollector {
    fn name(&self) -> &'static str {
        "storage_pools"
    }

    async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let resp = self.client.storage_pools().await?;
        sink.emit(self.total.sample(resp.total, []));

        for pool in &resp.storagepools {
            let name = pool.name.as_str();
            sink.emit(self.manual.sample(flag(pool.manual), [name]));
            sink.emit(self.balanced.sample(flag(!pool.usage.balanced), [name]));

            for (field, desc) in &self.bytes {
                let raw = field.of(&pool.usage);
                match raw.trim().parse::<u64>() {
                    Ok(bytes) => sink.emit(desc.sample(bytes as f64, [name])),
                    Err(_) => warn!(
                        pool = name,
                        metric = desc.name(),
                        value = raw,
                        "unparseable byte count"
                    ),
                }
            }
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
    async fn test_string_encoded_bytes() {
        let mock = MockTransport::typical_cluster();
        let (result, samples) = run(&StoragePoolsCollector::new(StatClient::new(mock))).await;
        assert!(result.is_ok());

        assert_eq!(values(&samples, "isilon_storage_pool_total"), vec![2.0]);
        assert_eq!(
            value_of(&samples, "isilon_storage_pool_bytes_total", &[("pool", "x410_pool")]),
            Some(200_000_000_000_000.0)
        );
        assert_eq!(
            value_of(&samples, "isilon_storage_pool_balanced", &[("pool", "x410_pool")]),
            Some(0.0)
        );
        assert_eq!(
            value_of(&samples, "isilon_storage_pool_balanced", &[("pool", "nl_tier")]),
            Some(1.0)
        );
        // nl_tier reports an empty ssd total, which is skipped
        assert_eq!(
            value_of(&samples, "isilon_storage_pool_bytes_total_ssd", &[("pool", "nl_tier")]),
            None
        );
        assert_eq!(values(&samples, "isilon_storage_pool_bytes_total_ssd").len(), 1);
    }
}
