use super::model::{Metric, MetricStats, OutlierPolicy, StatsReport, StatsSettings, Summary};
use crate::model::StoredRecord;
use std::collections::BTreeMap;

pub struct Aggregator {
    settings: StatsSettings,
    records: usize,
    // (true, known) per flag; legacy rows may lack a readable value.
    same_rowcount: (usize, usize),
    same_signature: (usize, usize),
    gated: usize,
    // Values in record order; the mode tie-break depends on it.
    values: BTreeMap<Metric, Vec<f64>>,
}

impl Aggregator {
    pub fn new(settings: StatsSettings) -> Self {
        Self {
            settings,
            records: 0,
            same_rowcount: (0, 0),
            same_signature: (0, 0),
            gated: 0,
            values: Metric::ALL.iter().map(|m| (*m, Vec::new())).collect(),
        }
    }

    pub fn push(&mut self, r: &StoredRecord) {
        self.records += 1;
        let rowcount_ok = r.same_rowcount == Some(true);
        let signature_ok = r.same_signature == Some(true);
        tally(&mut self.same_rowcount, r.same_rowcount);
        tally(&mut self.same_signature, r.same_signature);

        if !rowcount_ok || (self.settings.require_signature && !signature_ok) {
            return;
        }
        self.gated += 1;

        for metric in Metric::ALL {
            if let Some(v) = metric.value(r).filter(|v| v.is_finite()) {
                self.values.entry(metric).or_default().push(v);
            }
        }
    }

    pub fn finish(self, source: &str) -> StatsReport {
        let mut metrics = Vec::new();
        for (metric, values) in &self.values {
            let (kept, bounds) = match self.settings.outliers {
                OutlierPolicy::None => (values.clone(), None),
                OutlierPolicy::FixedThreshold => match self.settings.ceilings.for_metric(*metric) {
                    Some(ceiling) => (
                        threshold_filter(values, ceiling),
                        Some((f64::NEG_INFINITY, ceiling)),
                    ),
                    None => (values.clone(), None),
                },
                OutlierPolicy::Iqr => iqr_filter(values),
            };

            metrics.push(MetricStats {
                metric: *metric,
                count_before: values.len(),
                count_after: kept.len(),
                lower_bound: bounds.map(|b| b.0).filter(|v| v.is_finite()),
                upper_bound: bounds.map(|b| b.1),
                raw: summarize(values),
                filtered: summarize(&kept),
            });
        }

        let mut notes = vec![];
        if self.records == 0 {
            notes.push("No records found; statistics are undefined.".to_string());
        } else if self.gated == 0 {
            notes.push("No record passed the correctness gate; metric statistics are undefined.".to_string());
        }
        let small: Vec<&str> = metrics
            .iter()
            .filter(|m| m.count_after > 0 && m.count_after < 10)
            .map(|m| m.metric.name())
            .collect();
        if !small.is_empty() {
            notes.push(format!(
                "Warning: Low sample size (n < 10) for {}; treat the figures as indicative.",
                small.join(", ")
            ));
        }

        StatsReport {
            schema_version: 1,
            source: source.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            policy: self.settings.outliers,
            require_signature: self.settings.require_signature,
            records: self.records,
            gated: self.gated,
            same_rowcount_pct: pct(self.same_rowcount),
            same_signature_pct: pct(self.same_signature),
            metrics,
            notes,
        }
    }
}

pub fn aggregate(records: &[StoredRecord], settings: &StatsSettings, source: &str) -> StatsReport {
    let mut agg = Aggregator::new(settings.clone());
    for r in records {
        agg.push(r);
    }
    agg.finish(source)
}

fn tally(counter: &mut (usize, usize), flag: Option<bool>) {
    if let Some(v) = flag {
        counter.1 += 1;
        if v {
            counter.0 += 1;
        }
    }
}

fn pct((part, total): (usize, usize)) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(part as f64 / total as f64 * 100.0)
    }
}

/// Keeps values `<= ceiling`, preserving order.
pub fn threshold_filter(values: &[f64], ceiling: f64) -> Vec<f64> {
    values.iter().copied().filter(|v| *v <= ceiling).collect()
}

/// Keeps values inside the Tukey fences. Fewer than two values pass through
/// unchanged since quartiles are not defined for them.
pub fn iqr_filter(values: &[f64]) -> (Vec<f64>, Option<(f64, f64)>) {
    let Some((q1, q3)) = quartiles_inclusive(values) else {
        return (values.to_vec(), None);
    };
    let iqr = q3 - q1;
    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;
    let kept = values
        .iter()
        .copied()
        .filter(|v| *v >= lower && *v <= upper)
        .collect();
    (kept, Some((lower, upper)))
}

/// First and third quartile with linear interpolation where the sample
/// minimum and maximum are the 0th and 100th percentiles.
pub fn quartiles_inclusive(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let m = sorted.len() - 1;
    let quartile = |i: usize| {
        let j = i * m / 4;
        let delta = (i * m - j * 4) as f64;
        (sorted[j] * (4.0 - delta) + sorted[j + 1] * delta) / 4.0
    };
    Some((quartile(1), quartile(3)))
}

pub fn summarize(values: &[f64]) -> Summary {
    Summary {
        n: values.len(),
        mean: mean(values),
        median: median(values),
        mode: mode(values),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Most frequent value. `None` when no value occurs twice; ties go to the
/// value seen first.
pub fn mode(values: &[f64]) -> Option<f64> {
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for v in values {
        match counts.iter_mut().find(|(seen, _)| seen == v) {
            Some((_, c)) => *c += 1,
            None => counts.push((*v, 1)),
        }
    }
    let mut best: Option<(f64, usize)> = None;
    for (v, c) in counts {
        if c > 1 && best.map_or(true, |(_, bc)| c > bc) {
            best = Some((v, c));
        }
    }
    best.map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(speedup: Option<f64>, rowcount: bool, signature: bool) -> StoredRecord {
        StoredRecord {
            run_id: None,
            query_id: None,
            same_rowcount: Some(rowcount),
            same_signature: Some(signature),
            speedup,
            buffers_ratio: None,
            energy_ratio: None,
        }
    }

    #[test]
    fn test_quartiles_match_inclusive_method() {
        let (q1, q3) = quartiles_inclusive(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();
        assert!((q1 - 2.25).abs() < 1e-12);
        assert!((q3 - 4.75).abs() < 1e-12);
        assert_eq!(quartiles_inclusive(&[7.0]), None);
    }

    #[test]
    fn test_iqr_excludes_extreme_value() {
        let (kept, bounds) = iqr_filter(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
        assert_eq!(kept, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let (lo, hi) = bounds.unwrap();
        assert!((lo + 1.5).abs() < 1e-12);
        assert!((hi - 8.5).abs() < 1e-12);
    }

    #[test]
    fn test_iqr_single_value_passes_through() {
        let (kept, bounds) = iqr_filter(&[42.0]);
        assert_eq!(kept, vec![42.0]);
        assert!(bounds.is_none());
        assert!(iqr_filter(&[]).0.is_empty());
    }

    #[test]
    fn test_threshold_keeps_ceiling_itself() {
        assert_eq!(
            threshold_filter(&[0.5, 1.2, 2.9, 3.0, 5.5], 3.0),
            vec![0.5, 1.2, 2.9, 3.0]
        );
    }

    #[test]
    fn test_mode_rules() {
        assert_eq!(mode(&[1.0, 2.0, 3.0]), None);
        assert_eq!(mode(&[2.0, 1.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(mode(&[1.0, 3.0, 3.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(mode(&[]), None);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_gate_excludes_metrics_but_not_rates() {
        let records = vec![
            rec(Some(2.0), true, true),
            rec(Some(9.0), false, false),
            rec(Some(1.0), true, false),
            rec(None, true, true),
        ];
        let report = aggregate(&records, &StatsSettings::default(), "mem");
        assert_eq!(report.records, 4);
        assert_eq!(report.gated, 3);
        assert_eq!(report.same_rowcount_pct, Some(75.0));
        assert_eq!(report.same_signature_pct, Some(50.0));

        let speedup = &report.metrics[0];
        assert_eq!(speedup.metric, Metric::Speedup);
        assert_eq!(speedup.count_before, 2);
        assert_eq!(speedup.raw.mean, Some(1.5));

        let strict = StatsSettings {
            require_signature: true,
            ..StatsSettings::default()
        };
        let report = aggregate(&records, &strict, "mem");
        assert_eq!(report.gated, 2);
        assert_eq!(report.metrics[0].count_before, 1);
    }

    #[test]
    fn test_empty_input_is_undefined_not_error() {
        let report = aggregate(&[], &StatsSettings::default(), "mem");
        assert_eq!(report.records, 0);
        assert_eq!(report.same_rowcount_pct, None);
        for m in &report.metrics {
            assert_eq!(m.count_before, 0);
            assert_eq!(m.filtered, Summary::default());
        }
        assert!(report.notes[0].contains("No records"));
    }

    #[test]
    fn test_fully_excluded_set_reports_undefined() {
        let records = vec![rec(Some(8.0), true, true), rec(Some(9.0), true, true)];
        let report = aggregate(&records, &StatsSettings::default(), "mem");
        let speedup = &report.metrics[0];
        assert_eq!(speedup.count_before, 2);
        assert_eq!(speedup.count_after, 0);
        assert_eq!(speedup.raw.mean, Some(8.5));
        assert_eq!(speedup.filtered.mean, None);
        assert_eq!(speedup.upper_bound, Some(3.0));
    }
}
