//! Data models for kpiboard

pub mod benchmark;
pub mod forecast;
pub mod metrics;
pub mod period;

pub use benchmark::{Benchmark, BenchmarkTable, Tier};
pub use forecast::{ForecastPoint, ForecastSeries};
pub use metrics::{columns, Aggregation, MetricRecord, MetricTable};
pub use period::PeriodWindow;
