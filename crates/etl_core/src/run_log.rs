use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const RUN_LOG_TABLE: &str = "pipeline_logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Start,
    Success,
    Fail,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Success => "success",
            Self::Fail => "fail",
        }
    }
}

/// One row of the run metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub pipeline_name: String,
    pub run_id: i32,
    pub timestamp: String,
    pub status: RunStatus,
    pub config: Value,
    pub logs: Option<String>,
}

pub fn create_run_log_table_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {RUN_LOG_TABLE} (\
         id SERIAL PRIMARY KEY, \
         pipeline_name TEXT, \
         run_id INTEGER, \
         timestamp TIMESTAMP, \
         status TEXT, \
         config JSONB, \
         logs TEXT)"
    )
}

pub fn max_run_id_sql() -> String {
    format!("SELECT MAX(run_id) FROM {RUN_LOG_TABLE} WHERE pipeline_name = $1")
}

pub fn insert_run_log_sql() -> String {
    format!(
        "INSERT INTO {RUN_LOG_TABLE} (pipeline_name, run_id, timestamp, status, config, logs) \
         VALUES ($1, $2, $3::timestamp, $4, $5, $6)"
    )
}

/// Run ids count up from 1 per pipeline name.
pub fn next_run_id(current_max: Option<i32>) -> i32 {
    current_max.unwrap_or(0) + 1
}
