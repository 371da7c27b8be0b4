use crate::model::StoredRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierPolicy {
    None,
    /// Drop values above the per-metric ceiling.
    #[default]
    FixedThreshold,
    /// Drop values outside `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]`.
    Iqr,
}

impl OutlierPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutlierPolicy::None => "none",
            OutlierPolicy::FixedThreshold => "fixed_threshold",
            OutlierPolicy::Iqr => "iqr",
        }
    }
}

impl fmt::Display for OutlierPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlierPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(OutlierPolicy::None),
            "fixed_threshold" | "threshold" => Ok(OutlierPolicy::FixedThreshold),
            "iqr" => Ok(OutlierPolicy::Iqr),
            other => Err(format!(
                "unknown outlier policy '{}' (expected none, fixed_threshold or iqr)",
                other
            )),
        }
    }
}

/// Upper bounds used by [`OutlierPolicy::FixedThreshold`]. `None` keeps every value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ceilings {
    pub speedup: Option<f64>,
    pub buffers_ratio: Option<f64>,
    pub energy_ratio: Option<f64>,
}

impl Default for Ceilings {
    fn default() -> Self {
        Self {
            speedup: Some(3.0),
            buffers_ratio: Some(10.0),
            energy_ratio: None,
        }
    }
}

impl Ceilings {
    pub fn for_metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Speedup => self.speedup,
            Metric::BuffersRatio => self.buffers_ratio,
            Metric::EnergyRatio => self.energy_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    pub outliers: OutlierPolicy,
    /// Also require `same_signature` before a record's metrics count.
    pub require_signature: bool,
    pub ceilings: Ceilings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Speedup,
    BuffersRatio,
    EnergyRatio,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Speedup, Metric::BuffersRatio, Metric::EnergyRatio];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Speedup => "speedup",
            Metric::BuffersRatio => "buffers_ratio",
            Metric::EnergyRatio => "energy_ratio",
        }
    }

    pub fn value(&self, r: &StoredRecord) -> Option<f64> {
        match self {
            Metric::Speedup => r.speedup,
            Metric::BuffersRatio => r.buffers_ratio,
            Metric::EnergyRatio => r.energy_ratio,
        }
    }
}

/// Descriptive statistics of one value set. Everything is `None` for an empty set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub n: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub mode: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub metric: Metric,
    pub count_before: usize,
    pub count_after: usize,
    /// Retention interval actually applied, when the policy computed one.
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub raw: Summary,
    pub filtered: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub schema_version: u32,
    pub source: String,
    pub generated_at: String,
    pub policy: OutlierPolicy,
    pub require_signature: bool,
    pub records: usize,
    /// Records whose metrics passed the correctness gate.
    pub gated: usize,
    pub same_rowcount_pct: Option<f64>,
    pub same_signature_pct: Option<f64>,
    pub metrics: Vec<MetricStats>,
    pub notes: Vec<String>,
}
