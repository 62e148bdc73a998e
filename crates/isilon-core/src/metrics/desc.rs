//! Metric descriptors and samples.
//!
//! `Desc<N>` fixes the label names at construction and only accepts exactly
//! `N` label values when producing a sample, so a descriptor can never be
//! emitted with the wrong label arity.

use std::sync::Arc;

use prometheus::Opts;

/// Prefix of every exported metric name.
pub const NAMESPACE: &str = "isilon";

/// Builds `isilon_<subsystem>_<name>`, skipping empty parts.
pub fn fq_name(subsystem: &str, name: &str) -> String {
    Opts::new(name, "")
        .namespace(NAMESPACE)
        .subsystem(subsystem)
        .fq_name()
}

#[derive(Debug, PartialEq)]
struct DescInner {
    name: String,
    help: String,
    labels: Vec<&'static str>,
}

/// Gauge descriptor with `N` labels.
#[derive(Debug, Clone)]
pub struct Desc<const N: usize> {
    inner: Arc<DescInner>,
}

impl<const N: usize> Desc<N> {
    pub fn new(
        subsystem: &str,
        name: &str,
        help: impl Into<String>,
        labels: [&'static str; N],
    ) -> Self {
        Self {
            inner: Arc::new(DescInner {
                name: fq_name(subsystem, name),
                help: help.into(),
                labels: labels.to_vec(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn sample(&self, value: f64, label_values: [&str; N]) -> Sample {
        Sample {
            desc: Arc::clone(&self.inner),
            label_values: label_values.iter().map(|v| v.to_string()).collect(),
            value,
        }
    }
}

/// One emitted gauge value.
#[derive(Debug, Clone)]
pub struct Sample {
    desc: Arc<DescInner>,
    label_values: Box<[String]>,
    value: f64,
}

impl Sample {
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn help(&self) -> &str {
        &self.desc.help
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Label names in descriptor order.
    pub fn label_names(&self) -> &[&'static str] {
        &self.desc.labels
    }

    /// Label values in descriptor order.
    pub fn label_values(&self) -> impl Iterator<Item = &str> {
        self.label_values.iter().map(String::as_str)
    }

    /// Label pairs in descriptor order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.desc
            .labels
            .iter()
            .copied()
            .zip(self.label_values.iter().map(String::as_str))
    }

    /// Value of the named label, if the descriptor has it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels().find(|(k, _)| *k == name).map(|(_, v)| v)
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.desc == other.desc
            && self.label_values == other.label_values
            && self.value.to_bits() == other.value.to_bits()
    }
}

/// Fixed-point encodings used by the statistics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Raw,
    /// Value is reported in tenths (CPU and disk busy percentages).
    Tenths,
    /// Value is reported in hundredths (load averages).
    Hundredths,
}

impl Scale {
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            Scale::Raw => raw,
            Scale::Tenths => raw / 10.0,
            Scale::Hundredths => raw / 100.0,
        }
    }
}

/// Labels attached to every sample at render time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstLabels {
    pub cluster: String,
    pub site: String,
}

impl ConstLabels {
    pub fn pairs(&self) -> [(&str, &str); 2] {
        [("cluster", self.cluster.as_str()), ("site", self.site.as_str())]
    }
}

/// Buffer a collector emits into during one update.
#[derive(Debug, Default)]
pub struct SampleSink {
    samples: Vec<Sample>,
}

impl SampleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Moves every sample of `other` to the end of this sink.
    pub fn append(&mut self, other: SampleSink) {
        self.samples.extend(other.samples);
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fq_name() {
        assert_eq!(fq_name("node", "cpu_count"), "isilon_node_cpu_count");
        assert_eq!(fq_name("", "exporter_duration_seconds"), "isilon_exporter_duration_seconds");
    }

    #[test]
    fn test_sample_labels_follow_descriptor_order() {
        let desc = Desc::new("node", "disk_busy", "Disk busy percent.", ["node", "disk"]);
        let sample = desc.sample(12.5, ["3", "bay7"]);
        assert_eq!(sample.name(), "isilon_node_disk_busy");
        let labels: Vec<_> = sample.labels().collect();
        assert_eq!(labels, vec![("node", "3"), ("disk", "bay7")]);
        assert_eq!(sample.label("disk"), Some("bay7"));
        assert_eq!(sample.label("cluster"), None);
    }

    #[test]
    fn test_scale() {
        assert_eq!(Scale::Tenths.apply(455.0), 45.5);
        assert_eq!(Scale::Hundredths.apply(250.0), 2.5);
        assert_eq!(Scale::Raw.apply(7.0), 7.0);
    }

    #[test]
    fn test_sink_append() {
        let desc = Desc::new("x", "y", "h", []);
        let mut sink = SampleSink::new();
        sink.emit(desc.sample(1.0, []));
        let mut other = SampleSink::new();
        other.emit(desc.sample(2.0, []));
        sink.append(other);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.samples()[1].value(), 2.0);
    }
}
