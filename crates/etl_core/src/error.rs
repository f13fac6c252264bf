use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EtlError {
    #[error("Unknown pipeline '{target}'. Valid: [{}]", valid.join(", "))]
    UnknownPipeline { target: String, valid: Vec<String> },

    #[error("{0}")]
    SourceMissing(String),

    #[error("400 | File {location} is empty or could not be read.")]
    UnreadableReport { location: String },

    #[error("{0}")]
    Layout(String),

    #[error("Invalid load method: choose from [insert, upsert, overwrite, replace]")]
    InvalidLoadMethod(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Warehouse(String),

    #[error("Failed to log metadata: {0}")]
    RunLog(String),

    #[error("{0}")]
    Config(String),
}

impl EtlError {
    pub fn layout(message: impl Into<String>) -> Self {
        Self::Layout(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn warehouse(message: impl Into<String>) -> Self {
        Self::Warehouse(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
