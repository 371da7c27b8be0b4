//! PostgreSQL adapter using sqlx.

use super::{parse_explain_json, Database};
use crate::errors::DbError;
use crate::model::{PlanStats, Row};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use std::str::FromStr;

pub struct PgDatabase {
    name: String,
    pool: PgPool,
}

impl PgDatabase {
    /// Opens a single-connection pool. If the server rejects a plain
    /// connection as insecure, retries once with `sslmode=require`.
    pub async fn connect(
        name: &str,
        url: &str,
        statement_timeout_ms: Option<u64>,
    ) -> Result<Self, DbError> {
        let mut options = PgConnectOptions::from_str(url)
            .map_err(|e| DbError::Connection(format!("invalid database URL: {}", e)))?;
        if let Some(ms) = statement_timeout_ms {
            options = options.options([("statement_timeout", ms.to_string())]);
        }

        let pool = match Self::open(options.clone()).await {
            Ok(pool) => pool,
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("connection is insecure") || msg.contains("sslmode=require") {
                    tracing::info!(event = "db.ssl_retry", db = name, "retrying with sslmode=require");
                    Self::open(options.ssl_mode(PgSslMode::Require)).await?
                } else {
                    return Err(e.into());
                }
            }
        };

        tracing::info!(event = "db.connected", db = name, statement_timeout_ms);
        Ok(Self {
            name: name.to_string(),
            pool,
        })
    }

    async fn open(options: PgConnectOptions) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
    }
}

#[async_trait]
impl Database for PgDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DbError> {
        let rows = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn explain_analyze(&self, sql: &str) -> Result<PlanStats, DbError> {
        let statement = format!(
            "EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON) {}",
            sql.trim().trim_end_matches(';')
        );

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&statement)
            .persistent(false)
            .fetch_one(&mut *tx)
            .await;
        // ANALYZE really runs the statement; never keep what it changed.
        tx.rollback().await?;

        let doc: serde_json::Value = result?
            .try_get(0)
            .map_err(|e| DbError::MalformedPlan(e.to_string()))?;
        parse_explain_json(&doc)
    }
}

fn decode_row(row: &PgRow) -> Result<Row, DbError> {
    (0..row.columns().len())
        .map(|idx| decode_cell(row, idx))
        .collect()
}

fn decode_cell(row: &PgRow, idx: usize) -> Result<serde_json::Value, DbError> {
    use serde_json::{json, Value};

    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    let type_name = row.columns()[idx].type_info().name().to_uppercase();
    let value = match type_name.as_str() {
        "BOOL" => json!(row.try_get::<bool, _>(idx)?),
        "INT2" => json!(row.try_get::<i16, _>(idx)?),
        "INT4" => json!(row.try_get::<i32, _>(idx)?),
        "INT8" => json!(row.try_get::<i64, _>(idx)?),
        "OID" => json!(row.try_get::<sqlx::postgres::types::Oid, _>(idx)?.0),
        "FLOAT4" => json!(row.try_get::<f32, _>(idx)? as f64),
        "FLOAT8" => json!(row.try_get::<f64, _>(idx)?),
        "NUMERIC" => json!(row.try_get::<sqlx::types::Decimal, _>(idx)?.to_string()),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "CITEXT" => {
            json!(row.try_get::<String, _>(idx)?)
        }
        "DATE" => json!(row.try_get::<chrono::NaiveDate, _>(idx)?.to_string()),
        "TIME" => json!(row.try_get::<chrono::NaiveTime, _>(idx)?.to_string()),
        "TIMESTAMP" => json!(row
            .try_get::<chrono::NaiveDateTime, _>(idx)?
            .format("%Y-%m-%dT%H:%M:%S%.f")
            .to_string()),
        "TIMESTAMPTZ" => json!(row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?
            .to_rfc3339()),
        "UUID" => json!(row.try_get::<sqlx::types::Uuid, _>(idx)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx)?,
        "BYTEA" => json!(hex::encode(row.try_get::<Vec<u8>, _>(idx)?)),
        _ => {
            // Unknown types are compared by their wire bytes.
            let raw = row.try_get_raw(idx)?;
            let bytes = raw
                .as_bytes()
                .map_err(|e| DbError::Execution(format!("column {}: {}", idx, e)))?;
            json!(hex::encode(bytes))
        }
    };
    Ok(value)
}
