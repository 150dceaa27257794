//! Metrics and structured event logging

pub mod logger;
pub mod metrics;

pub use logger::StructuredLogger;
pub use metrics::{InMemoryMetrics, MetricEvent, MetricUnit, MetricsSink, TracingMetrics};
