pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS evaluations (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id TEXT NOT NULL,
  db TEXT NOT NULL,
  llm TEXT NOT NULL,
  prompt_technique TEXT NOT NULL,
  query_id INTEGER NOT NULL,
  original_ms REAL,
  execution_ms_original REAL,
  planning_ms_original REAL,
  buffers_plan_original INTEGER,
  rewritten_ms REAL,
  execution_ms_rewritten REAL,
  planning_ms_rewritten REAL,
  buffers_plan_rewritten INTEGER,
  emissions_original REAL,
  emissions_rewritten REAL,
  speedup REAL,
  buffers_ratio REAL,
  energy_ratio REAL,
  energy_saving_pct REAL,
  same_rowcount INTEGER NOT NULL,
  same_signature INTEGER NOT NULL,
  original_sql TEXT NOT NULL,
  rewritten_sql TEXT NOT NULL,
  recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_evaluations_run ON evaluations(run_id, query_id);
"#;
