use async_trait::async_trait;

use crate::client::StatClient;
use crate::client::types::QuotaSummary;
use crate::collector::{CollectError, Collector, PassContext};
use crate::metrics::{Desc, SampleSink};

/// Quota counts by type, from the summary endpoint.
pub(crate) struct QuotaSummaryCollector {
    client: StatClient,
    gauges: [Desc<0>; 7],
}

impl QuotaSummaryCollector {
    pub(crate) fn new(client: StatClient) -> Self {
        let gauge = |name: &str, help: &str| Desc::new("quota_summary", name, help, []);
        Self {
            client,
            gauges: [
                gauge("count", "Total number of quotas."),
                gauge("default_group_count", "Number of default group quotas."),
                gauge("default_user_count", "Number of default user quotas."),
                gauge("directory_count", "Number of directory quotas."),
                gauge("group_count", "Number of group quotas."),
                gauge("linked_count", "Number of linked quotas."),
                gauge("user_count", "Number of user quotas."),
            ],
        }
    }
}

fn counts(s: &QuotaSummary) -> [f64; 7] {
    [
        s.count,
        s.default_group_quotas_count,
        s.default_user_quotas_count,
        s.directory_quotas_count,
        s.group_quotas_count,
        s.linked_quotas_count,
        s.user_quotas_count,
    ]
}

#[async_trait]
impl Collector for QuotaSummaryCollector {
    fn name(&self) -> &'static str {
        "quota_summary"
    }

    async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let summary = self.client.quota_summary().await?;
        for (desc, value) in self.gauges.iter().zip(counts(&summary)) {
            sink.emit(desc.sample(value, []));
        }
        Ok(())
    }
}
