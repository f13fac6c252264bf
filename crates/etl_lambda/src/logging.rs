use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;

/// JSON lines on stderr so the function's log group keeps structured fields.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Step log for one pipeline run.
///
/// Every line goes to `tracing` and to an in-memory journal; the journal is
/// stored with the run metadata and written to the log directory.
#[derive(Debug, Clone)]
pub struct PipelineLog {
    pipeline_name: String,
    started_at: DateTime<Utc>,
    lines: Vec<String>,
}

impl PipelineLog {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            started_at: Utc::now(),
            lines: Vec::new(),
        }
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn info(&mut self, code: u16, message: impl AsRef<str>) {
        self.push(Level::Info, Some(code), message.as_ref());
    }

    pub fn warn(&mut self, code: u16, message: impl AsRef<str>) {
        self.push(Level::Warning, Some(code), message.as_ref());
    }

    pub fn error(&mut self, code: u16, message: impl AsRef<str>) {
        self.push(Level::Error, Some(code), message.as_ref());
    }

    /// Uncoded run-level line.
    pub fn note(&mut self, message: impl AsRef<str>) {
        self.push(Level::Info, None, message.as_ref());
    }

    pub fn failure(&mut self, message: impl AsRef<str>) {
        self.push(Level::Error, None, message.as_ref());
    }

    pub fn contents(&self) -> String {
        let mut text = self.lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.log",
            self.pipeline_name,
            self.started_at.format("%Y%m%d_%H%M%S_%3f")
        )
    }

    pub async fn persist(&self, directory: &Path) -> Result<PathBuf, String> {
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|error| format!("failed to create {}: {error}", directory.display()))?;
        let path = directory.join(self.file_name());
        tokio::fs::write(&path, self.contents())
            .await
            .map_err(|error| format!("failed to write {}: {error}", path.display()))?;
        Ok(path)
    }

    fn push(&mut self, level: Level, code: Option<u16>, message: &str) {
        let pipeline = self.pipeline_name.as_str();
        match (level, code) {
            (Level::Info, Some(code)) => {
                tracing::info!(component = "pipeline", pipeline, code, "{message}")
            }
            (Level::Warning, Some(code)) => {
                tracing::warn!(component = "pipeline", pipeline, code, "{message}")
            }
            (Level::Error, Some(code)) => {
                tracing::error!(component = "pipeline", pipeline, code, "{message}")
            }
            (Level::Info, None) => tracing::info!(component = "pipeline", pipeline, "{message}"),
            (Level::Warning, None) => tracing::warn!(component = "pipeline", pipeline, "{message}"),
            (Level::Error, None) => tracing::error!(component = "pipeline", pipeline, "{message}"),
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        let line = match code {
            Some(code) => format!("{timestamp} - {} - {code} | {message}", level.as_str()),
            None => format!("{timestamp} - {} - {message}", level.as_str()),
        };
        self.lines.push(line);
    }
}
