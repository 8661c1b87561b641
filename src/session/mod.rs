pub mod metrics;
pub mod service;

pub use metrics::{MetricsSink, NoopMetricsSink, PerformanceCounters, Session, SpendMetric};
pub use service::{SessionHandle, SessionService};
