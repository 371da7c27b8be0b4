//! Derived metrics. Undefined inputs give `None`; nothing here returns 0,
//! NaN or an error for a degenerate pair.

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// `original / rewritten`, defined when both are finite and `rewritten > 0`.
pub fn ratio(original: Option<f64>, rewritten: Option<f64>) -> Option<f64> {
    let o = finite(original)?;
    let r = finite(rewritten)?;
    if r > 0.0 {
        Some(o / r)
    } else {
        None
    }
}

pub fn speedup(original_ms: Option<f64>, rewritten_ms: Option<f64>) -> Option<f64> {
    ratio(original_ms, rewritten_ms)
}

pub fn buffers_ratio(original: Option<i64>, rewritten: Option<i64>) -> Option<f64> {
    ratio(original.map(|v| v as f64), rewritten.map(|v| v as f64))
}

fn positive_pair(original: Option<f64>, rewritten: Option<f64>) -> Option<(f64, f64)> {
    let o = finite(original)?;
    let r = finite(rewritten)?;
    (o > 0.0 && r > 0.0).then_some((o, r))
}

pub fn energy_ratio(original: Option<f64>, rewritten: Option<f64>) -> Option<f64> {
    positive_pair(original, rewritten).map(|(o, r)| o / r)
}

/// Share of the original emissions saved by the rewrite, in percent.
pub fn energy_saving_pct(original: Option<f64>, rewritten: Option<f64>) -> Option<f64> {
    positive_pair(original, rewritten).map(|(o, r)| (o - r) / o * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speedup_is_exact_quotient() {
        assert_eq!(speedup(Some(10.0), Some(4.0)), Some(2.5));
        assert_eq!(speedup(Some(0.0), Some(4.0)), Some(0.0));
    }

    #[test]
    fn test_speedup_undefined_cases() {
        assert_eq!(speedup(Some(10.0), Some(0.0)), None);
        assert_eq!(speedup(Some(10.0), Some(-1.0)), None);
        assert_eq!(speedup(None, Some(1.0)), None);
        assert_eq!(speedup(Some(1.0), None), None);
        assert_eq!(speedup(Some(f64::NAN), Some(1.0)), None);
        assert_eq!(speedup(Some(1.0), Some(f64::INFINITY)), None);
    }

    #[test]
    fn test_buffers_ratio() {
        assert_eq!(buffers_ratio(Some(100), Some(25)), Some(4.0));
        assert_eq!(buffers_ratio(Some(100), Some(0)), None);
        assert_eq!(buffers_ratio(None, Some(3)), None);
    }

    #[test]
    fn test_energy_requires_both_positive() {
        assert_eq!(energy_ratio(Some(2.0), Some(1.0)), Some(2.0));
        assert_eq!(energy_saving_pct(Some(2.0), Some(1.5)), Some(25.0));
        assert_eq!(energy_saving_pct(Some(0.0), Some(1.0)), None);
        assert_eq!(energy_ratio(Some(1.0), Some(0.0)), None);
    }
}
