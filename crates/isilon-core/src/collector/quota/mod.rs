//! Quota collectors.
//!
//! `QuotaCollector` walks the paginated quota listing. Pages are fetched
//! strictly in order, each continuation request carrying only the resume
//! token of the page before it. In quota-only mode the number of distinct
//! quotas collected is reconciled against the total the summary endpoint
//! reported at startup; a short count re-runs the whole listing until the
//! retry budget is spent. When a retry fails part way, the quotas of the
//! previous complete listing are still emitted.

mod summary;

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

pub(crate) use summary::QuotaSummaryCollector;

use super::{CollectError, Collector, PassContext, flag};
use crate::client::types::{Quota, QuotaType, ThresholdState};
use crate::client::{QuotaQuery, StatClient};
use crate::metrics::{Desc, SampleSink};

/// Quota collection options, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaSettings {
    pub kind: QuotaType,
    pub exceeded_only: bool,
    /// Extra full listings allowed after a short count.
    pub retry_budget: u32,
    /// Total reported by the summary endpoint at startup. Set only in quota-only mode.
    pub expected_total: Option<u64>,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            kind: QuotaType::All,
            exceeded_only: false,
            retry_budget: 3,
            expected_total: None,
        }
    }
}

impl QuotaSettings {
    /// Expected total to reconcile against, when reconciliation applies.
    ///
    /// A filtered listing is not comparable with the summary total, so only
    /// the unfiltered listing is reconciled.
    pub fn reconcile_target(&self) -> Option<u64> {
        match self.expected_total {
            Some(expected) if self.kind == QuotaType::All && !self.exceeded_only => Some(expected),
            _ => None,
        }
    }

    fn first_query(&self) -> QuotaQuery {
        QuotaQuery::First {
            kind: self.kind,
            exceeded_only: self.exceeded_only,
        }
    }
}

const QUOTA_LABELS: [&str; 4] = ["id", "path", "name", "type"];

/// Limit, exceeded and last-exceeded gauges of one threshold level.
struct ThresholdDescs {
    limit: Desc<4>,
    exceeded: Desc<4>,
    last_exceeded: Desc<4>,
}

impl ThresholdDescs {
    fn new(level: &str) -> Self {
        Self {
            limit: Desc::new(
                "quota",
                &format!("threshold_{level}_bytes"),
                format!("Quota {level} threshold in bytes, 0 when unset."),
                QUOTA_LABELS,
            ),
            exceeded: Desc::new(
                "quota",
                &format!("threshold_{level}_exceeded"),
                format!("Whether the {level} threshold is exceeded (1) or not (0)."),
                QUOTA_LABELS,
            ),
            last_exceeded: Desc::new(
                "quota",
                &format!("threshold_{level}_last_exceeded"),
                format!(
                    "Unix time the {level} threshold was last exceeded, 0 when not exceeded."
                ),
                QUOTA_LABELS,
            ),
        }
    }

    fn emit(&self, state: ThresholdState, labels: [&str; 4], sink: &mut SampleSink) {
        sink.emit(self.limit.sample(state.limit, labels));
        sink.emit(self.exceeded.sample(flag(state.exceeded), labels));
        sink.emit(self.last_exceeded.sample(state.last_exceeded, labels));
    }
}

/// Outcome of one full walk of the listing.
struct Attempt {
    samples: SampleSink,
    collected: u64,
}

/// Per-quota usage and threshold gauges.
pub(crate) struct QuotaCollector {
    client: StatClient,
    settings: QuotaSettings,
    container: Desc<4>,
    enforced: Desc<4>,
    include_snapshots: Desc<4>,
    logical: Desc<4>,
    physical: Desc<4>,
    inodes: Desc<4>,
    advisory: ThresholdDescs,
    soft: ThresholdDescs,
    hard: ThresholdDescs,
    soft_grace: Desc<4>,
    iteration_duration: Desc<1>,
    collected_total: Desc<1>,
}

impl QuotaCollector {
    pub(crate) fn new(client: StatClient, settings: QuotaSettings) -> Self {
        let quota = |name: &str, help: &str| Desc::new("quota", name, help, QUOTA_LABELS);
        Self {
            client,
            settings,
            container: quota("container", "Whether the quota is a container (1) or not (0)."),
            enforced: quota("enforced", "Whether the quota is enforced (1) or not (0)."),
            include_snapshots: quota(
                "include_snapshots",
                "Whether snapshot data counts against the quota (1) or not (0).",
            ),
            logical: quota("usage_logical_bytes", "Logical bytes used by the quota."),
            physical: quota("usage_physical_bytes", "Physical bytes used by the quota."),
            inodes: quota("usage_inodes", "Inodes used by the quota."),
            advisory: ThresholdDescs::new("advisory"),
            soft: ThresholdDescs::new("soft"),
            hard: ThresholdDescs::new("hard"),
            soft_grace: quota(
                "threshold_soft_grace_seconds",
                "Grace period of the soft threshold in seconds, 0 when unset.",
            ),
            iteration_duration: Desc::new(
                "quota",
                "api_collection_duration_seconds",
                "Duration of one quota listing request.",
                ["iteration"],
            ),
            collected_total: Desc::new(
                "quota",
                "collected_total",
                "Distinct quotas collected by one full listing.",
                ["attempt"],
            ),
        }
    }

    fn emit_quota(&self, quota: &Quota, sink: &mut SampleSink) {
        let labels = [
            quota.id.as_str(),
            quota.path.as_str(),
            quota.display_name(),
            quota.kind.as_str(),
        ];
        sink.emit(self.container.sample(flag(quota.container), labels));
        sink.emit(self.enforced.sample(flag(quota.enforced), labels));
        sink.emit(
            self.include_snapshots
                .sample(flag(quota.include_snapshots), labels),
        );

        sink.emit(self.logical.sample(quota.usage.logical, labels));
        sink.emit(self.physical.sample(quota.usage.physical, labels));
        sink.emit(self.inodes.sample(quota.usage.inodes, labels));

        let thresholds = &quota.thresholds;
        self.advisory.emit(thresholds.advisory(), labels, sink);
        self.soft.emit(thresholds.soft(), labels, sink);
        self.hard.emit(thresholds.hard(), labels, sink);
        sink.emit(
            self.soft_grace
                .sample(thresholds.soft_grace.unwrap_or(0.0), labels),
        );
    }

    /// Walks every page of the listing once.
    ///
    /// `iteration` is the pass-wide page counter; per-page durations go
    /// straight to `sink`, quota samples into the attempt's own buffer.
    async fn walk(
        &self,
        ctx: &PassContext,
        iteration: &mut u32,
        sink: &mut SampleSink,
    ) -> Result<Attempt, CollectError> {
        let mut attempt = Attempt {
            samples: SampleSink::new(),
            collected: 0,
        };
        let mut seen = HashSet::new();
        let mut query = self.settings.first_query();

        loop {
            ctx.check_deadline()?;
            *iteration += 1;
            let started = Instant::now();
            let page = self.client.query_quotas(&query).await?;
            sink.emit(self.iteration_duration.sample(
                started.elapsed().as_secs_f64(),
                [iteration.to_string().as_str()],
            ));

            for quota in &page.items {
                // a listing mutating under us can repeat an entry across pages
                if !seen.insert(quota.id.clone()) {
                    debug!(id = %quota.id, "duplicate quota in listing");
                    continue;
                }
                self.emit_quota(quota, &mut attempt.samples);
            }

            match page.next_token() {
                Some(token) => query = QuotaQuery::Resume(token.to_string()),
                None => break,
            }
        }

        attempt.collected = seen.len() as u64;
        Ok(attempt)
    }
}

#[async_trait]
impl Collector for QuotaCollector {
    fn name(&self) -> &'static str {
        "quota"
    }

    async fn update(&self, ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let target = self.settings.reconcile_target();
        let max_attempts = match target {
            Some(_) => self.settings.retry_budget.saturating_add(1),
            None => 1,
        };
        let mut iteration = 0u32;
        let mut attempt_no = 0u32;
        // quotas of the latest listing that ran to its last page
        let mut last_complete: Option<SampleSink> = None;

        loop {
            attempt_no += 1;
            let attempt = match self.walk(ctx, &mut iteration, sink).await {
                Ok(attempt) => attempt,
                Err(e) => {
                    if let Some(samples) = last_complete {
                        warn!(
                            attempt = attempt_no,
                            error = %e,
                            "quota retry failed, keeping previous listing"
                        );
                        sink.append(samples);
                    }
                    return Err(e);
                }
            };
            sink.emit(
                self.collected_total
                    .sample(attempt.collected as f64, [attempt_no.to_string().as_str()]),
            );

            let Some(expected) = target else {
                sink.append(attempt.samples);
                return Ok(());
            };
            if attempt.collected == expected {
                if attempt_no > 1 {
                    info!(attempt = attempt_no, collected = attempt.collected, "quota count reconciled");
                }
                sink.append(attempt.samples);
                return Ok(());
            }

            warn!(
                attempt = attempt_no,
                collected = attempt.collected,
                expected,
                "quota count does not match summary"
            );
            if attempt_no >= max_attempts {
                sink.append(attempt.samples);
                return Err(CollectError::Reconciliation {
                    attempts: attempt_no,
                    budget: self.settings.retry_budget,
                    collected: attempt.collected,
                    expected,
                });
            }
            last_complete = Some(attempt.samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockTransport;
    use crate::collector::test_support::{run, run_with, value_of, values};
    use serde_json::{Value, json};
    use std::time::Duration;

    fn quotas(ids: std::ops::Range<u32>) -> Vec<Value> {
        ids.map(|i| {
            json!({
                "id": format!("q{i}"),
                "path": format!("/ifs/data/p{i}"),
                "type": "directory",
                "usage": {"logical": 1000 * i, "physical": 2000 * i, "inodes": i}
            })
        })
        .collect()
    }

    fn page(items: Vec<Value>, resume: &str) -> Value {
        json!({"quotas": items, "resume": resume})
    }

    fn first_request() -> crate::client::ApiRequest {
        QuotaSettings::default().first_query().request()
    }

    fn reconciling(expected: u64) -> QuotaSettings {
        QuotaSettings {
            expected_total: Some(expected),
            ..QuotaSettings::default()
        }
    }

    #[test]
    fn test_reconcile_target_requires_unfiltered_listing() {
        assert_eq!(QuotaSettings::default().reconcile_target(), None);
        assert_eq!(reconciling(10).reconcile_target(), Some(10));

        let filtered = QuotaSettings {
            kind: QuotaType::User,
            ..reconciling(10)
        };
        assert_eq!(filtered.reconcile_target(), None);

        let exceeded = QuotaSettings {
            exceeded_only: true,
            ..reconciling(10)
        };
        assert_eq!(exceeded.reconcile_target(), None);
    }

    #[tokio::test]
    async fn test_pages_follow_resume_token_in_order() {
        let mut mock = MockTransport::new();
        mock.add_response(first_request(), page(quotas(0..3), "abc"));
        mock.add_response(
            QuotaQuery::Resume("abc".into()).request(),
            page(quotas(3..5), ""),
        );
        let collector = QuotaCollector::new(StatClient::new(mock.clone()), QuotaSettings::default());
        let (result, samples) = run(&collector).await;
        assert!(result.is_ok());

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], first_request());
        assert_eq!(requests[1].param_value("resume"), Some("abc"));
        assert_eq!(requests[1].params().len(), 1);

        assert_eq!(values(&samples, "isilon_quota_usage_logical_bytes").len(), 5);
        assert_eq!(
            value_of(&samples, "isilon_quota_usage_physical_bytes", &[("id", "q4")]),
            Some(8000.0)
        );
        assert_eq!(values(&samples, "isilon_quota_api_collection_duration_seconds").len(), 2);
        assert!(
            value_of(&samples, "isilon_quota_api_collection_duration_seconds", &[("iteration", "2")])
                .is_some()
        );
        assert_eq!(
            value_of(&samples, "isilon_quota_collected_total", &[("attempt", "1")]),
            Some(5.0)
        );
    }

    #[tokio::test]
    async fn test_duplicate_ids_counted_once() {
        let mut mock = MockTransport::new();
        mock.add_response(first_request(), page(quotas(0..3), "next"));
        mock.add_response(
            QuotaQuery::Resume("next".into()).request(),
            page(quotas(2..4), ""),
        );
        let collector = QuotaCollector::new(StatClient::new(mock), QuotaSettings::default());
        let (result, samples) = run(&collector).await;
        assert!(result.is_ok());
        assert_eq!(values(&samples, "isilon_quota_usage_inodes").len(), 4);
        assert_eq!(values(&samples, "isilon_quota_collected_total"), vec![4.0]);
    }

    #[tokio::test]
    async fn test_reconciliation_exhausts_budget() {
        let mut mock = MockTransport::new();
        mock.add_response(first_request(), page(quotas(0..7), ""));
        let collector = QuotaCollector::new(StatClient::new(mock.clone()), reconciling(10));
        let (result, samples) = run(&collector).await;

        match result {
            Err(CollectError::Reconciliation {
                attempts,
                budget,
                collected,
                expected,
            }) => {
                assert_eq!((attempts, budget, collected, expected), (4, 3, 7, 10));
            }
            other => panic!("expected reconciliation error, got {other:?}"),
        }
        // one initial listing plus three retries
        assert_eq!(mock.requests().len(), 4);
        assert_eq!(values(&samples, "isilon_quota_collected_total"), vec![7.0; 4]);
        // only the last listing's quotas are kept
        assert_eq!(values(&samples, "isilon_quota_usage_logical_bytes").len(), 7);
    }

    #[tokio::test]
    async fn test_reconciliation_retry_succeeds() {
        let mut mock = MockTransport::new();
        mock.add_script(
            first_request(),
            vec![page(quotas(0..7), ""), page(quotas(0..10), "")],
        );
        let collector = QuotaCollector::new(StatClient::new(mock.clone()), reconciling(10));
        let (result, samples) = run(&collector).await;
        assert!(result.is_ok());
        assert_eq!(mock.requests().len(), 2);
        assert_eq!(
            value_of(&samples, "isilon_quota_collected_total", &[("attempt", "1")]),
            Some(7.0)
        );
        assert_eq!(
            value_of(&samples, "isilon_quota_collected_total", &[("attempt", "2")]),
            Some(10.0)
        );
        assert_eq!(values(&samples, "isilon_quota_usage_logical_bytes").len(), 10);
    }

    #[tokio::test]
    async fn test_failed_retry_keeps_previous_listing() {
        let mut mock = MockTransport::new();
        // the retry starts a second page whose continuation is unrouted
        mock.add_script(
            first_request(),
            vec![page(quotas(0..7), ""), page(quotas(0..5), "gone")],
        );
        let collector = QuotaCollector::new(StatClient::new(mock.clone()), reconciling(10));
        let (result, samples) = run(&collector).await;

        assert!(matches!(result, Err(CollectError::Client(_))));
        assert_eq!(mock.requests().len(), 3);
        assert_eq!(values(&samples, "isilon_quota_collected_total"), vec![7.0]);
        assert_eq!(values(&samples, "isilon_quota_usage_logical_bytes").len(), 7);
        assert_eq!(
            value_of(&samples, "isilon_quota_usage_physical_bytes", &[("id", "q6")]),
            Some(12000.0)
        );
        assert_eq!(values(&samples, "isilon_quota_api_collection_duration_seconds").len(), 2);
    }

    #[tokio::test]
    async fn test_first_listing_failure_emits_no_quotas() {
        let mut mock = MockTransport::new();
        mock.add_failure(first_request(), "connection reset");
        let collector = QuotaCollector::new(StatClient::new(mock), reconciling(10));
        let (result, samples) = run(&collector).await;
        assert!(matches!(result, Err(CollectError::Client(_))));
        assert!(values(&samples, "isilon_quota_usage_logical_bytes").is_empty());
    }

    #[tokio::test]
    async fn test_empty_listing_with_positive_expectation_retries() {
        let mut mock = MockTransport::new();
        mock.add_response(first_request(), page(Vec::new(), ""));
        let settings = QuotaSettings {
            retry_budget: 1,
            ..reconciling(2)
        };
        let collector = QuotaCollector::new(StatClient::new(mock.clone()), settings);
        let (result, _) = run(&collector).await;
        assert!(matches!(result, Err(CollectError::Reconciliation { attempts: 2, .. })));
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_filtered_listing_is_not_reconciled() {
        let settings = QuotaSettings {
            exceeded_only: true,
            ..reconciling(10)
        };
        let mut mock = MockTransport::new();
        mock.add_response(settings.first_query().request(), page(quotas(0..2), ""));
        let collector = QuotaCollector::new(StatClient::new(mock.clone()), settings);
        let (result, _) = run(&collector).await;
        assert!(result.is_ok());
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_thresholds_and_persona_name() {
        let mut mock = MockTransport::new();
        mock.add_response(
            first_request(),
            page(
                vec![json!({
                    "id": "u1", "path": "/ifs/home", "type": "user",
                    "enforced": true,
                    "persona": {"id": "UID:1000", "name": "alice", "type": "user"},
                    "usage": {"logical": 10, "physical": 20, "inodes": 1},
                    "thresholds": {
                        "hard": 5000, "hard_exceeded": true, "hard_last_exceeded": 1700000000,
                        "soft": 4000, "soft_exceeded": false, "soft_grace": 604800
                    }
                })],
                "",
            ),
        );
        let collector = QuotaCollector::new(StatClient::new(mock), QuotaSettings::default());
        let (result, samples) = run(&collector).await;
        assert!(result.is_ok());

        let alice = [("name", "alice"), ("type", "user")];
        assert_eq!(value_of(&samples, "isilon_quota_enforced", &alice), Some(1.0));
        assert_eq!(value_of(&samples, "isilon_quota_threshold_hard_bytes", &alice), Some(5000.0));
        assert_eq!(value_of(&samples, "isilon_quota_threshold_hard_exceeded", &alice), Some(1.0));
        assert_eq!(
            value_of(&samples, "isilon_quota_threshold_hard_last_exceeded", &alice),
            Some(1_700_000_000.0)
        );
        assert_eq!(value_of(&samples, "isilon_quota_threshold_advisory_bytes", &alice), Some(0.0));
        assert_eq!(
            value_of(&samples, "isilon_quota_threshold_soft_grace_seconds", &alice),
            Some(604_800.0)
        );
    }

    #[tokio::test]
    async fn test_expired_deadline_stops_listing() {
        let mut mock = MockTransport::new();
        mock.add_response(first_request(), page(quotas(0..2), ""));
        let ctx = PassContext::new(Some(tokio::time::Instant::now() - Duration::from_millis(1)));
        let collector = QuotaCollector::new(StatClient::new(mock.clone()), QuotaSettings::default());
        let (result, samples) = run_with(&collector, &ctx).await;
        assert!(matches!(result, Err(CollectError::DeadlineExceeded)));
        assert!(samples.is_empty());
        assert!(mock.requests().is_empty());
    }
}
