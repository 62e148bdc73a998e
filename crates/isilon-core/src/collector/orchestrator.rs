use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{CollectError, Collector, PassContext, flag};
use crate::VERSION;
use crate::metrics::{Desc, Sample, SampleSink};

/// Result of one collector within a pass.
#[derive(Debug)]
pub struct CollectorRun {
    pub name: &'static str,
    pub duration: Duration,
    pub error: Option<String>,
}

impl CollectorRun {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything one collection pass produced.
#[derive(Debug)]
pub struct PassOutcome {
    /// Collector samples in collector-name order, then the meta-metrics.
    pub samples: Vec<Sample>,
    pub runs: Vec<CollectorRun>,
}

struct Finished {
    duration: Duration,
    result: Result<(), CollectError>,
    sink: SampleSink,
}

/// Runs a fixed set of collectors concurrently and adds the meta-metrics.
pub struct Orchestrator {
    collectors: Vec<Arc<dyn Collector>>,
    collector_duration: Desc<1>,
    collector_success: Desc<1>,
    exporter_duration: Desc<0>,
    build_info: Desc<1>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("collectors", &self.collector_names())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(mut collectors: Vec<Arc<dyn Collector>>) -> Self {
        collectors.sort_by_key(|c| c.name());
        Self {
            collectors,
            collector_duration: Desc::new(
                "scrape",
                "collector_duration_seconds",
                "Duration of a collector scrape.",
                ["collector"],
            ),
            collector_success: Desc::new(
                "scrape",
                "collector_success",
                "Whether a collector succeeded (1) or failed (0).",
                ["collector"],
            ),
            exporter_duration: Desc::new(
                "exporter",
                "duration_seconds",
                "Duration of the whole collection pass.",
                [],
            ),
            build_info: Desc::new(
                "exporter",
                "build_info",
                "Exporter version. Always 1.",
                ["version"],
            ),
        }
    }

    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Runs one pass that must finish by `deadline`.
    pub async fn run_pass(&self, deadline: Option<tokio::time::Instant>) -> PassOutcome {
        self.run_with_context(Arc::new(PassContext::new(deadline)))
            .await
    }

    /// Runs one pass with a caller-built context.
    ///
    /// Each collector runs as its own task under the context deadline. A
    /// collector that misses the deadline is reported as failed and its
    /// partial output is discarded. Dropping the returned future aborts
    /// every collector task still running.
    pub async fn run_with_context(&self, ctx: Arc<PassContext>) -> PassOutcome {
        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for (idx, collector) in self.collectors.iter().enumerate() {
            let collector = Arc::clone(collector);
            let ctx = Arc::clone(&ctx);
            tasks.spawn(async move {
                let begin = Instant::now();
                let mut sink = SampleSink::new();
                let outcome = match ctx.deadline() {
                    Some(deadline) => {
                        tokio::time::timeout_at(deadline, collector.update(&ctx, &mut sink)).await
                    }
                    None => Ok(collector.update(&ctx, &mut sink).await),
                };
                let result = match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        sink = SampleSink::new();
                        Err(CollectError::DeadlineExceeded)
                    }
                };
                (
                    idx,
                    Finished {
                        duration: begin.elapsed(),
                        result,
                        sink,
                    },
                )
            });
        }

        let mut finished: Vec<Option<Finished>> =
            self.collectors.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, done)) => finished[idx] = Some(done),
                Err(e) => warn!(error = %e, "collector task did not complete"),
            }
        }

        let mut samples = Vec::new();
        let mut meta = SampleSink::new();
        let mut runs = Vec::with_capacity(self.collectors.len());

        for (collector, done) in self.collectors.iter().zip(finished) {
            let name = collector.name();
            let done = done.unwrap_or_else(|| Finished {
                duration: started.elapsed(),
                result: Err(CollectError::Aborted("task panicked or was cancelled".into())),
                sink: SampleSink::new(),
            });

            match &done.result {
                Ok(()) => debug!(
                    collector = name,
                    duration_seconds = done.duration.as_secs_f64(),
                    "collector succeeded"
                ),
                Err(e) => warn!(
                    collector = name,
                    duration_seconds = done.duration.as_secs_f64(),
                    error = %e,
                    "collector failed"
                ),
            }

            meta.emit(
                self.collector_duration
                    .sample(done.duration.as_secs_f64(), [name]),
            );
            meta.emit(self.collector_success.sample(flag(done.result.is_ok()), [name]));
            samples.extend(done.sink.into_samples());
            runs.push(CollectorRun {
                name,
                duration: done.duration,
                error: done.result.err().map(|e| e.to_string()),
            });
        }

        meta.emit(
            self.exporter_duration
                .sample(started.elapsed().as_secs_f64(), []),
        );
        meta.emit(self.build_info.sample(1.0, [VERSION]));
        samples.extend(meta.into_samples());

        PassOutcome { samples, runs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StatClient;
    use crate::client::mock::MockTransport;
    use crate::client::ApiRequest;
    use crate::collector::test_support::{value_of, values};
    use crate::collector::{CollectorSettings, Registry};
    use async_trait::async_trait;

    struct Fixed {
        name: &'static str,
        value: f64,
    }

    #[async_trait]
    impl Collector for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
            let desc = Desc::new("test", self.name, "Test gauge.", []);
            sink.emit(desc.sample(self.value, []));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Collector for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
            let desc = Desc::new("test", "partial", "Emitted before failing.", []);
            sink.emit(desc.sample(1.0, []));
            Err(CollectError::AllKeysFailed { failed: 1 })
        }
    }

    struct Slow;

    #[async_trait]
    impl Collector for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
            let desc = Desc::new("test", "slow", "Emitted before sleeping.", []);
            sink.emit(desc.sample(1.0, []));
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    struct Panicking;

    #[async_trait]
    impl Collector for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn update(&self, _ctx: &PassContext, _sink: &mut SampleSink) -> Result<(), CollectError> {
            panic!("collector bug");
        }
    }

    fn success(samples: &[Sample], collector: &str) -> Option<f64> {
        value_of(
            samples,
            "isilon_scrape_collector_success",
            &[("collector", collector)],
        )
    }

    #[tokio::test]
    async fn test_meta_metrics_per_collector() {
        let orchestrator = Orchestrator::new(vec![
            Arc::new(Fixed { name: "beta", value: 2.0 }),
            Arc::new(Fixed { name: "alpha", value: 1.0 }),
        ]);
        assert_eq!(orchestrator.collector_names(), vec!["alpha", "beta"]);

        let outcome = orchestrator.run_pass(None).await;
        let samples = &outcome.samples;
        assert_eq!(samples[0].name(), "isilon_test_alpha");
        assert_eq!(samples[1].name(), "isilon_test_beta");
        assert_eq!(values(samples, "isilon_scrape_collector_success"), vec![1.0, 1.0]);
        assert_eq!(values(samples, "isilon_scrape_collector_duration_seconds").len(), 2);
        assert_eq!(values(samples, "isilon_exporter_duration_seconds").len(), 1);
        assert_eq!(
            value_of(samples, "isilon_exporter_build_info", &[("version", VERSION)]),
            Some(1.0)
        );
        assert!(outcome.runs.iter().all(CollectorRun::success));
    }

    #[test]
    fn test_debug_lists_collectors() {
        let orchestrator = Orchestrator::new(vec![
            Arc::new(Fixed { name: "beta", value: 2.0 }),
            Arc::new(Failing),
        ]);
        assert_eq!(
            format!("{orchestrator:?}"),
            r#"Orchestrator { collectors: ["beta", "failing"], .. }"#
        );
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let orchestrator = Orchestrator::new(vec![
            Arc::new(Failing),
            Arc::new(Fixed { name: "ok", value: 1.0 }),
        ]);
        let outcome = orchestrator.run_pass(None).await;
        assert_eq!(success(&outcome.samples, "failing"), Some(0.0));
        assert_eq!(success(&outcome.samples, "ok"), Some(1.0));
        // output gathered before the error is kept
        assert_eq!(values(&outcome.samples, "isilon_test_partial"), vec![1.0]);
        assert_eq!(values(&outcome.samples, "isilon_test_ok"), vec![1.0]);

        let failed = outcome.runs.iter().find(|r| r.name == "failing").unwrap();
        assert_eq!(failed.error.as_deref(), Some("all 1 statistics keys failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_discards_late_collector() {
        let orchestrator = Orchestrator::new(vec![
            Arc::new(Slow),
            Arc::new(Fixed { name: "fast", value: 1.0 }),
        ]);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        let outcome = orchestrator.run_pass(Some(deadline)).await;
        assert_eq!(success(&outcome.samples, "slow"), Some(0.0));
        assert_eq!(success(&outcome.samples, "fast"), Some(1.0));
        assert!(values(&outcome.samples, "isilon_test_slow").is_empty());
        let slow = outcome.runs.iter().find(|r| r.name == "slow").unwrap();
        assert_eq!(slow.error.as_deref(), Some("scrape deadline exceeded"));
    }

    #[tokio::test]
    async fn test_panicking_collector_reported_as_failed() {
        let orchestrator = Orchestrator::new(vec![
            Arc::new(Panicking),
            Arc::new(Fixed { name: "ok", value: 1.0 }),
        ]);
        let outcome = orchestrator.run_pass(None).await;
        assert_eq!(success(&outcome.samples, "panicking"), Some(0.0));
        assert_eq!(success(&outcome.samples, "ok"), Some(1.0));
        assert_eq!(
            values(&outcome.samples, "isilon_scrape_collector_duration_seconds").len(),
            2
        );
    }

    // ============================================================
    // Full collector set against the mock cluster
    // ============================================================

    fn typical_registry(mock: MockTransport) -> Registry {
        Registry::new(StatClient::new(mock), CollectorSettings::default())
    }

    #[tokio::test]
    async fn test_every_default_collector_succeeds() {
        let registry = typical_registry(MockTransport::typical_cluster());
        let orchestrator = registry.build(&[]).unwrap();
        let outcome = orchestrator.run_pass(None).await;

        for run in &outcome.runs {
            assert!(run.success(), "{} failed: {:?}", run.name, run.error);
        }
        let names = orchestrator.collector_names();
        assert_eq!(
            values(&outcome.samples, "isilon_scrape_collector_success"),
            vec![1.0; names.len()]
        );
        assert_eq!(
            values(&outcome.samples, "isilon_scrape_collector_duration_seconds").len(),
            names.len()
        );
        assert_eq!(values(&outcome.samples, "isilon_exporter_duration_seconds").len(), 1);

        // protocol collectors are on by default
        assert!(names.contains(&"node_protocol"));
        assert!(names.contains(&"cluster_protocol"));
        assert_eq!(
            value_of(
                &outcome.samples,
                "isilon_node_clientstats_connected",
                &[("node", "1"), ("proto", "nfs")]
            ),
            Some(40.0)
        );
        assert!(!values(&outcome.samples, "isilon_cluster_protostats_total_op_rate").is_empty());
    }

    #[tokio::test]
    async fn test_primary_failure_only_affects_owner() {
        let mut mock = MockTransport::typical_cluster();
        mock.remove(&ApiRequest::new("/platform/3/storagepool/storagepools"));
        let outcome = typical_registry(mock).build(&[]).unwrap().run_pass(None).await;

        assert_eq!(success(&outcome.samples, "storage_pools"), Some(0.0));
        for run in outcome.runs.iter().filter(|r| r.name != "storage_pools") {
            assert!(run.success(), "{} failed: {:?}", run.name, run.error);
        }
    }

    #[tokio::test]
    async fn test_consecutive_passes_are_identical() {
        let registry = typical_registry(MockTransport::typical_cluster());
        let first = registry.build(&[]).unwrap().run_pass(None).await;
        let second = registry.build(&[]).unwrap().run_pass(None).await;

        let stable = |samples: Vec<Sample>| -> Vec<Sample> {
            samples
                .into_iter()
                .filter(|s| !s.name().ends_with("duration_seconds"))
                .collect()
        };
        let first = stable(first.samples);
        let second = stable(second.samples);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
