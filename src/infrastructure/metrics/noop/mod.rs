mod noop_metrics;

pub use noop_metrics::NoopMetrics;
use std::sync::Arc;

/// Creates a metrics backend that discards everything.
///
/// Selected when `BOOKCLUB_METRICS_TYPE` is anything other than `prom`; `/metrics`
/// then serves an empty body.
pub fn create() -> anyhow::Result<crate::domain::MetricsPtr> {
    Ok(Arc::new(NoopMetrics::new()))
}
