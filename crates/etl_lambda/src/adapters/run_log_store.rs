use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use etl_core::run_log::{
    create_run_log_table_sql, insert_run_log_sql, max_run_id_sql, next_run_id, RunLogEntry,
};

/// Persists start/success/fail records for each pipeline run.
#[async_trait]
pub trait RunLogStore: Send + Sync {
    async fn next_run_id(&self, pipeline_name: &str) -> Result<i32, String>;

    async fn record(&self, entry: &RunLogEntry) -> Result<(), String>;
}

pub struct PgRunLogStore {
    pool: PgPool,
}

impl PgRunLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunLogStore for PgRunLogStore {
    async fn next_run_id(&self, pipeline_name: &str) -> Result<i32, String> {
        sqlx::query(&create_run_log_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|error| format!("failed to create run log table: {error}"))?;

        let current_max: Option<i32> = sqlx::query_scalar(&max_run_id_sql())
            .bind(pipeline_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| format!("failed to read latest run id: {error}"))?;
        Ok(next_run_id(current_max))
    }

    async fn record(&self, entry: &RunLogEntry) -> Result<(), String> {
        sqlx::query(&insert_run_log_sql())
            .bind(&entry.pipeline_name)
            .bind(entry.run_id)
            .bind(&entry.timestamp)
            .bind(entry.status.as_str())
            .bind(Json(&entry.config))
            .bind(entry.logs.as_deref())
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|error| format!("failed to insert run log: {error}"))
    }
}
