//! Metric descriptors, samples and text exposition.

mod desc;
pub mod exposition;

pub use desc::{ConstLabels, Desc, NAMESPACE, Sample, SampleSink, Scale, fq_name};
