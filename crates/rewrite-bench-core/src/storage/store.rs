use super::RecordSink;
use crate::model::{single_line, EvaluationRecord, StoredRecord};
use anyhow::Context;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// SQLite sink. Records land in the `evaluations` table, one `INSERT` each.
#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

pub struct StoreStats {
    pub records: u64,
    pub runs: u64,
    pub last_run_id: Option<String>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("sqlite connection mutex poisoned"))
    }

    pub fn insert(&self, r: &EvaluationRecord) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO evaluations (
                run_id, db, llm, prompt_technique, query_id,
                original_ms, execution_ms_original, planning_ms_original, buffers_plan_original,
                rewritten_ms, execution_ms_rewritten, planning_ms_rewritten, buffers_plan_rewritten,
                emissions_original, emissions_rewritten,
                speedup, buffers_ratio, energy_ratio, energy_saving_pct,
                same_rowcount, same_signature, original_sql, rewritten_sql, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            params![
                r.run_id,
                r.db,
                r.llm,
                r.prompt_mode,
                r.query_id,
                r.original_ms,
                r.execution_ms_original,
                r.planning_ms_original,
                r.buffers_plan_original,
                r.rewritten_ms,
                r.execution_ms_rewritten,
                r.planning_ms_rewritten,
                r.buffers_plan_rewritten,
                r.emissions_original,
                r.emissions_rewritten,
                r.speedup,
                r.buffers_ratio,
                r.energy_ratio,
                r.energy_saving_pct,
                r.same_rowcount,
                r.same_signature,
                single_line(&r.original_sql),
                single_line(&r.rewritten_sql),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn load_records(&self) -> anyhow::Result<Vec<StoredRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, query_id, same_rowcount, same_signature,
                    speedup, buffers_ratio, energy_ratio
             FROM evaluations ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredRecord {
                run_id: row.get(0)?,
                query_id: row.get(1)?,
                same_rowcount: row.get(2)?,
                same_signature: row.get(3)?,
                speedup: row.get(4)?,
                buffers_ratio: row.get(5)?,
                energy_ratio: row.get(6)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn stats(&self) -> anyhow::Result<StoreStats> {
        let conn = self.lock()?;
        let (records, runs): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT run_id) FROM evaluations",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let last_run_id: Option<String> = conn
            .query_row(
                "SELECT run_id FROM evaluations ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .ok();
        Ok(StoreStats {
            records: records as u64,
            runs: runs as u64,
            last_run_id,
        })
    }
}

impl RecordSink for Store {
    fn append(&mut self, r: &EvaluationRecord) -> anyhow::Result<()> {
        self.insert(r)?;
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
