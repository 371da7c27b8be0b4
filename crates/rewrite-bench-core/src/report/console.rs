use crate::engine::runner::{QueryOutcome, QueryReport, RunSummary};
use crate::stats::{MetricStats, StatsReport, Summary};
use std::fmt::Write as _;

fn num(v: Option<f64>) -> String {
    v.map(|x| format!("{:.4}", x)).unwrap_or_else(|| "n/a".into())
}

fn pct(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}%", x)).unwrap_or_else(|| "n/a".into())
}

/// One line per evaluated query, on stderr.
pub fn print_query(report: &QueryReport) {
    match &report.outcome {
        QueryOutcome::Recorded(r) => {
            let icon = if r.same_rowcount && r.same_signature {
                "✅"
            } else if r.same_rowcount {
                "⚠️ "
            } else {
                "❌"
            };
            eprintln!(
                "{} Q{:<4} orig={} ms  rew={} ms  speedup={}  rows={} sig={}",
                icon,
                r.query_id,
                num(r.original_ms),
                num(r.rewritten_ms),
                num(r.speedup),
                r.same_rowcount,
                r.same_signature,
            );
        }
        QueryOutcome::Skipped => eprintln!("⏭️  Q{:<4} skipped (rewrite failed)", report.query_id),
        QueryOutcome::Aborted(e) => eprintln!("🛑 Q{:<4} aborted: {}", report.query_id, e),
    }
    for f in &report.failures {
        let side = f
            .side
            .map(|s| format!(" [{}]", s.as_str()))
            .unwrap_or_default();
        eprintln!("      {:?}{}: {}", f.phase, side, f.error);
    }
}

pub fn print_run_summary(s: &RunSummary) {
    eprintln!("\nRun {} → {}", s.run_id, s.sink);
    eprintln!(
        "Summary: {} queries | {} recorded | {} skipped{}",
        s.queries,
        s.recorded,
        s.skipped,
        if s.aborted { " | ABORTED" } else { "" }
    );
    eprintln!(
        "Failures: rewrite {} | execution {} | introspection {}",
        s.rewrite_failures, s.execution_failures, s.introspection_failures
    );
    if s.recorded > 0 {
        eprintln!(
            "Equivalence: same rowcount {}/{} | same signature {}/{}",
            s.same_rowcount, s.recorded, s.same_signature, s.recorded
        );
    }
}

fn summary_line(out: &mut String, label: &str, s: &Summary) {
    let _ = writeln!(
        out,
        "  {:<9} n={:<5} mean={:<10} median={:<10} mode={}",
        label,
        s.n,
        num(s.mean),
        num(s.median),
        num(s.mode)
    );
}

fn metric_block(out: &mut String, m: &MetricStats) {
    let _ = writeln!(out, "{}", m.metric.name());
    summary_line(out, "raw", &m.raw);
    summary_line(out, "filtered", &m.filtered);
    let bounds = match (m.lower_bound, m.upper_bound) {
        (Some(lo), Some(hi)) => format!(" kept [{:.4}, {:.4}]", lo, hi),
        (None, Some(hi)) => format!(" kept <= {:.4}", hi),
        _ => String::new(),
    };
    let _ = writeln!(
        out,
        "  (original N={} → filtered N={}){}",
        m.count_before, m.count_after, bounds
    );
}

pub fn render_stats_text(r: &StatsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Source: {}", r.source);
    let _ = writeln!(
        out,
        "Records: {} | gated: {} (same_rowcount{})",
        r.records,
        r.gated,
        if r.require_signature { " + same_signature" } else { "" }
    );
    let _ = writeln!(out, "Same rowcount : {}", pct(r.same_rowcount_pct));
    let _ = writeln!(out, "Same signature: {}", pct(r.same_signature_pct));
    let _ = writeln!(out, "Outlier policy: {}\n", r.policy);
    for m in &r.metrics {
        metric_block(&mut out, m);
    }
    for n in &r.notes {
        let _ = writeln!(out, "\nNote: {}", n);
    }
    out
}

pub fn render_stats_json(r: &StatsReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(r)?)
}
