//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;

use isilon_core::collector::Registry;
use isilon_core::metrics::ConstLabels;

use crate::config::ScrapeTiming;

/// Immutable after startup; every request gets a clone of the `Arc`.
pub(crate) struct AppInner {
    pub(crate) registry: Registry,
    pub(crate) const_labels: ConstLabels,
    pub(crate) telemetry_path: String,
    pub(crate) timing: ScrapeTiming,
}

pub(crate) type AppState = Arc<AppInner>;
