use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures raised by a single pipeline step.
///
/// Components return these instead of logging and carrying on; the pipeline
/// decides whether a failure stops the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to create directory {}: {source}", .path.display())]
    PathCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open database {}: {source}", .path.display())]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema script {} failed: {source}", .path.display())]
    SchemaExecution {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("failed to read resource {}: {source}", .path.display())]
    ResourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("resource {} contains no data rows", .0.display())]
    EmptyResource(PathBuf),

    #[error("failed to parse tabular resource {}: {source}", .path.display())]
    TabularParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("failed to load rows into table {table}: {source}")]
    Import {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to read table {table}: {source}")]
    TableQuery {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("script {} failed: {reason}", .path.display())]
    ScriptExecution { path: PathBuf, reason: String },

    #[error("failed to write report {}: {source}", .path.display())]
    ResultWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn script(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        Self::ScriptExecution {
            path: path.into(),
            reason: source.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathCreation { .. } => "path_creation",
            Self::DatabaseOpen { .. } => "database_open",
            Self::SchemaExecution { .. } => "schema_execution",
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::ResourceRead { .. } => "resource_read",
            Self::EmptyResource(_) => "empty_resource",
            Self::TabularParse { .. } => "tabular_parse",
            Self::InvalidTableName(_) => "invalid_table_name",
            Self::Import { .. } => "import",
            Self::TableQuery { .. } => "table_query",
            Self::ScriptExecution { .. } => "script_execution",
            Self::ResultWrite { .. } => "result_write",
        }
    }
}
