use super::Database;
use crate::errors::DbError;
use crate::model::{single_line, PlanStats, Row};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone)]
struct Script {
    rows: Result<Vec<Row>, DbError>,
    plan: Result<PlanStats, DbError>,
    /// Connection failures returned before the scripted answer.
    transient_failures: u32,
}

/// In-memory database answering from a script keyed by whitespace-normalised SQL.
/// Unknown statements fail with an execution error.
pub struct FakeDatabase {
    name: String,
    delay: Duration,
    scripts: Mutex<HashMap<String, Script>>,
    executed: Mutex<Vec<String>>,
}

impl FakeDatabase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::from_millis(1),
            scripts: Mutex::new(HashMap::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Time every call takes. Keeps measured latencies strictly positive.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_rows(self, sql: &str, rows: Vec<Row>) -> Self {
        self.script(sql, |s| s.rows = Ok(rows));
        self
    }

    pub fn with_plan(self, sql: &str, plan: PlanStats) -> Self {
        self.script(sql, |s| s.plan = Ok(plan));
        self
    }

    pub fn with_error(self, sql: &str, err: DbError) -> Self {
        self.script(sql, |s| s.rows = Err(err));
        self
    }

    pub fn with_plan_error(self, sql: &str, err: DbError) -> Self {
        self.script(sql, |s| s.plan = Err(err));
        self
    }

    pub fn with_transient_failures(self, sql: &str, n: u32) -> Self {
        self.script(sql, |s| s.transient_failures = n);
        self
    }

    /// Statements passed to `execute`, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn script(&self, sql: &str, f: impl FnOnce(&mut Script)) {
        let mut scripts = self.scripts.lock().unwrap();
        let entry = scripts.entry(single_line(sql)).or_insert_with(|| Script {
            rows: Ok(Vec::new()),
            plan: Ok(PlanStats::default()),
            transient_failures: 0,
        });
        f(entry);
    }

    fn lookup(&self, sql: &str) -> Result<Script, DbError> {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get_mut(&single_line(sql))
            .ok_or_else(|| DbError::Execution(format!("relation does not exist: {}", sql)))?;
        if script.transient_failures > 0 {
            script.transient_failures -= 1;
            return Err(DbError::Connection("connection reset by peer".into()));
        }
        Ok(script.clone())
    }
}

#[async_trait]
impl Database for FakeDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DbError> {
        self.executed.lock().unwrap().push(single_line(sql));
        tokio::time::sleep(self.delay).await;
        self.lookup(sql)?.rows
    }

    async fn explain_analyze(&self, sql: &str) -> Result<PlanStats, DbError> {
        tokio::time::sleep(self.delay).await;
        self.lookup(sql)?.plan
    }
}
