use std::path::PathBuf;

use sqlx::postgres::PgConnectOptions;

use etl_core::EtlError;

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_BUCKET: &str = "centralfiles3";
pub const DEFAULT_LOG_DIR: &str = "/tmp/logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    S3 { bucket: String },
    Local { root: PathBuf },
}

/// Process configuration read once per cold start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlConfig {
    pub warehouse: DatabaseConfig,
    /// Present only when the metadata database is configured.
    pub run_log: Option<DatabaseConfig>,
    pub source: SourceConfig,
    pub log_dir: PathBuf,
    pub pipeline_target: Option<String>,
}

impl EtlConfig {
    pub fn from_env() -> Result<Self, EtlError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EtlError> {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            value(key).ok_or_else(|| EtlError::config(format!("{key} must be configured")))
        };
        let port = |key: &str| match value(key) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| EtlError::config(format!("{key} must be a valid port, got '{raw}'"))),
            None => Ok(DEFAULT_PORT),
        };

        let warehouse = DatabaseConfig {
            host: required("SERVER_NAME")?,
            port: port("PORT")?,
            database: required("DATABASE_NAME")?,
            username: required("DB_USERNAME")?,
            password: required("DB_PASSWORD")?,
        };

        let run_log = match value("LOGGING_SERVER_NAME") {
            Some(host) => Some(DatabaseConfig {
                host,
                port: port("LOGGING_PORT")?,
                database: required("LOGGING_DATABASE_NAME")?,
                username: required("LOGGING_USERNAME")?,
                password: required("LOGGING_PASSWORD")?,
            }),
            None => None,
        };

        let source = match value("ETL_SOURCE").as_deref().map(str::trim) {
            None | Some("s3") => SourceConfig::S3 {
                bucket: value("BUCKET_NAME").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            },
            Some("local") => SourceConfig::Local {
                root: PathBuf::from(required("LOCAL_DATA_DIR")?),
            },
            Some(other) => {
                return Err(EtlError::config(format!(
                    "ETL_SOURCE must be 's3' or 'local', got '{other}'"
                )))
            }
        };

        Ok(Self {
            warehouse,
            run_log,
            source,
            log_dir: PathBuf::from(value("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string())),
            pipeline_target: value("PIPELINE_TARGET"),
        })
    }
}
