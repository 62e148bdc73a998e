//! Prometheus text exposition of one pass.
//!
//! Every pass renders through a fresh `prometheus::Registry`: one gauge
//! vector per family, with the cluster and site attached as constant labels.
//! Nothing outlives the pass, so a series that stops being emitted
//! disappears from the next scrape.

use std::collections::{BTreeMap, HashMap};

use prometheus::{GaugeVec, Opts, Registry, TextEncoder};

use super::{ConstLabels, Sample};

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Renders samples grouped by family, families sorted by name.
///
/// Labels of a sample are written sorted by name and samples inside a
/// family sorted by label values. When two samples of a family carry the
/// same label values the later one wins.
pub fn render(samples: &[Sample], const_labels: &ConstLabels) -> prometheus::Result<String> {
    let mut families: BTreeMap<&str, Vec<&Sample>> = BTreeMap::new();
    for sample in samples {
        families.entry(sample.name()).or_default().push(sample);
    }

    let constants: HashMap<String, String> = const_labels
        .pairs()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let registry = Registry::new();
    for (name, members) in families {
        let Some(first) = members.first() else {
            continue;
        };
        let opts = Opts::new(name, first.help()).const_labels(constants.clone());
        let gauges = GaugeVec::new(opts, first.label_names())?;
        for sample in members {
            let values: Vec<&str> = sample.label_values().collect();
            gauges
                .get_metric_with_label_values(&values)?
                .set(sample.value());
        }
        registry.register(Box::new(gauges))?;
    }

    TextEncoder::new().encode_to_string(&registry.gather())
}
