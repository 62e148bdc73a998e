//! isilon-core - collection engine for the OneFS metrics exporter.
//!
//! Provides:
//! - `client` - transport seam, typed management API client, wire types, mock transport
//! - `metrics` - metric descriptors, samples and the text exposition renderer
//! - `collector` - collectors, the collector registry and the collection orchestrator

pub mod client;
pub mod collector;
pub mod metrics;

/// Crate version, reported by `isilon_exporter_build_info`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
