use crate::model::{EvaluationRecord, StoredRecord};
use std::path::Path;

pub mod csv_sink;
pub mod schema;
pub mod store;

/// Durable, append-only destination for evaluation records.
pub trait RecordSink: Send {
    /// Writes one record. Returns only once the record is durable.
    fn append(&mut self, record: &EvaluationRecord) -> anyhow::Result<()>;

    fn location(&self) -> &Path;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Csv,
    Sqlite,
}

impl SinkKind {
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "db" | "sqlite" | "sqlite3" => SinkKind::Sqlite,
            _ => SinkKind::Csv,
        }
    }
}

pub fn open_sink(path: &Path) -> anyhow::Result<Box<dyn RecordSink>> {
    let sink: Box<dyn RecordSink> = match SinkKind::for_path(path) {
        SinkKind::Csv => Box::new(csv_sink::CsvSink::open(path)?),
        SinkKind::Sqlite => {
            let store = store::Store::open(path)?;
            store.init_schema()?;
            Box::new(store)
        }
    };
    tracing::info!(event = "sink.opened", file = %path.display());
    Ok(sink)
}

pub fn load_records(path: &Path) -> anyhow::Result<Vec<StoredRecord>> {
    if !path.exists() {
        anyhow::bail!("results file not found: {}", path.display());
    }
    match SinkKind::for_path(path) {
        SinkKind::Csv => csv_sink::read_records(path),
        SinkKind::Sqlite => {
            let store = store::Store::open(path)?;
            store.init_schema()?;
            store.load_records()
        }
    }
}
