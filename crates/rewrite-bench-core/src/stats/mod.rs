pub mod aggregate;
pub mod model;

pub use aggregate::{aggregate, Aggregator};
pub use model::{Ceilings, Metric, MetricStats, OutlierPolicy, StatsReport, StatsSettings, Summary};
