use async_trait::async_trait;

use super::{CollectError, Collector, PassContext, flag};
use crate::client::StatClient;
use crate::metrics::{Desc, SampleSink};

const FINISHED: &str = "finished";

/// SyncIQ replication policies.
pub(crate) struct SyncIqCollector {
    client: StatClient,
    total: Desc<0>,
    state: Desc<3>,
    last_success: Desc<1>,
    last_start: Desc<1>,
    priority: Desc<1>,
    workers_per_node: Desc<1>,
    enabled: Desc<1>,
}

impl SyncIqCollector {
    pub(crate) fn new(client: StatClient) -> Self {
        let policy = |name: &str, help: &str| Desc::new("", name, help, ["policy"]);
        Self {
            client,
            total: Desc::new(
                "",
                "sync_policies_total_count",
                "Number of SyncIQ policies.",
                [],
            ),
            state: Desc::new(
                "",
                "sync_policy_state",
                "State of the last job of the policy: 0 = finished, 1 = anything else.",
                ["policy", "source", "target"],
            ),
            last_success: policy(
                "sync_policy_last_success",
                "Unix time of the last successful job of the policy.",
            ),
            last_start: policy(
                "sync_policy_last_start",
                "Unix time the last job of the policy started.",
            ),
            priority: policy("sync_policy_priority", "Job priority of the policy."),
            workers_per_node: policy(
                "sync_policy_workers_per_node",
                "Workers per node allotted to the policy.",
            ),
            enabled: policy(
                "sync_policy_enabled",
                "Whether the policy is enabled (1) or not (0).",
            ),
        }
    }
}

#[async_trait]
impl Collector for SyncIqCollector {
    fn name(&self) -> &'static str {
        "sync_iq"
    }

    async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let resp = self.client.sync_policies().await?;
        sink.emit(self.total.sample(resp.total, []));

        for policy in &resp.policies {
            let name = policy.name.as_str();
            let target = format!("{}:{}", policy.target_host, policy.target_path);
            let state = flag(policy.last_job_state != FINISHED);
            sink.emit(self.state.sample(
                state,
                [name, policy.source_root_path.as_str(), target.as_str()],
            ));
            // never-run policies report null timestamps
            sink.emit(
                self.last_success
                    .sample(policy.last_success.unwrap_or(0.0), [name]),
            );
            sink.emit(
                self.last_start
                    .sample(policy.last_started.unwrap_or(0.0), [name]),
            );
            sink.emit(self.priority.sample(policy.priority, [name]));
            sink.emit(self.workers_per_node.sample(policy.workers_per_node, [name]));
            sink.emit(self.enabled.sample(flag(policy.enabled), [name]));
        }
        Ok(())
    }
}
