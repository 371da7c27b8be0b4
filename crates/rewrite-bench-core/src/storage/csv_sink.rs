use super::RecordSink;
use crate::metrics;
use crate::model::{single_line, EvaluationRecord, StoredRecord};
use anyhow::Context;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub const COLUMNS: [&str; 23] = [
    "run_id",
    "db",
    "llm",
    "prompt_technique",
    "query_id",
    "original_ms",
    "execution_ms_original",
    "planning_ms_original",
    "buffers_plan_original",
    "rewritten_ms",
    "execution_ms_rewritten",
    "planning_ms_rewritten",
    "buffers_plan_rewritten",
    "emissions_original",
    "emissions_rewritten",
    "speedup",
    "buffers_ratio",
    "energy_ratio",
    "energy_saving_pct",
    "same_rowcount",
    "same_signature",
    "original_sql",
    "rewritten_sql",
];

/// Append-only CSV sink. The header goes in only when the file is missing
/// or empty. A non-empty file must already carry the current header; its
/// rows are never rewritten.
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvSink {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open results file {}", path.display()))?;
        let fresh = file.metadata()?.len() == 0;
        if !fresh {
            check_header(path)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer.write_record(COLUMNS)?;
            writer.flush()?;
            tracing::debug!(event = "sink.header_written", file = %path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }
}

fn check_header(path: &Path) -> anyhow::Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to read results file {}", path.display()))?;
    let mut first = csv::StringRecord::new();
    reader
        .read_record(&mut first)
        .with_context(|| format!("failed to read header of {}", path.display()))?;
    if first.iter().ne(COLUMNS.iter().copied()) {
        anyhow::bail!(
            "results file {} has a different column layout ({} columns, expected {}); \
             write to a new file instead of appending",
            path.display(),
            first.len(),
            COLUMNS.len()
        );
    }
    Ok(())
}

impl RecordSink for CsvSink {
    fn append(&mut self, r: &EvaluationRecord) -> anyhow::Result<()> {
        self.writer.write_record(format_record(r))?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

fn fixed(v: Option<f64>, decimals: usize) -> String {
    match v.filter(|x| x.is_finite()) {
        Some(x) => format!("{:.*}", decimals, x),
        None => String::new(),
    }
}

fn int(v: Option<i64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

pub fn format_record(r: &EvaluationRecord) -> Vec<String> {
    vec![
        r.run_id.clone(),
        r.db.clone(),
        r.llm.clone(),
        r.prompt_mode.clone(),
        r.query_id.to_string(),
        fixed(r.original_ms, 3),
        fixed(r.execution_ms_original, 3),
        fixed(r.planning_ms_original, 3),
        int(r.buffers_plan_original),
        fixed(r.rewritten_ms, 3),
        fixed(r.execution_ms_rewritten, 3),
        fixed(r.planning_ms_rewritten, 3),
        int(r.buffers_plan_rewritten),
        fixed(r.emissions_original, 10),
        fixed(r.emissions_rewritten, 10),
        fixed(r.speedup, 3),
        fixed(r.buffers_ratio, 3),
        fixed(r.energy_ratio, 3),
        fixed(r.energy_saving_pct, 2),
        r.same_rowcount.to_string(),
        r.same_signature.to_string(),
        single_line(&r.original_sql),
        single_line(&r.rewritten_sql),
    ]
}

fn parse_float(s: Option<&str>) -> Option<f64> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_bool(s: Option<&str>) -> Option<bool> {
    match s?.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Reads every record of a CSV sink, including files written by older
/// tooling: `True`/`False` booleans, `NaN` for undefined values, and no
/// ratio columns (ratios are then derived from the raw columns).
pub fn read_records(path: &Path) -> anyhow::Result<Vec<StoredRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open results file {}", path.display()))?;

    let index: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_string(), i))
        .collect();

    let mut out = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("{}: bad row {}", path.display(), line + 2))?;
        let get = |name: &str| index.get(name).and_then(|i| row.get(*i));
        let num = |name: &str| parse_float(get(name));
        // A present column wins, even when its value is undefined.
        let derived = |name: &str, o: &str, r: &str, f: fn(Option<f64>, Option<f64>) -> Option<f64>| {
            if index.contains_key(name) {
                num(name)
            } else {
                f(num(o), num(r))
            }
        };

        out.push(StoredRecord {
            run_id: get("run_id").map(str::to_string).filter(|s| !s.is_empty()),
            query_id: get("query_id").and_then(|s| s.trim().parse().ok()),
            same_rowcount: parse_bool(get("same_rowcount")),
            same_signature: parse_bool(get("same_signature")),
            speedup: derived("speedup", "original_ms", "rewritten_ms", metrics::speedup),
            buffers_ratio: derived(
                "buffers_ratio",
                "buffers_plan_original",
                "buffers_plan_rewritten",
                metrics::ratio,
            ),
            energy_ratio: derived(
                "energy_ratio",
                "emissions_original",
                "emissions_rewritten",
                metrics::energy_ratio,
            ),
        });
    }
    Ok(out)
}
