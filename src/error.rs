//! Error types for the ETL pipeline.
//!
//! Every stage reports through [`EtlError`]. The executor stops at the first
//! error, releases both streams, and surfaces the error in the job report.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring or running a job.
#[derive(Debug, Error)]
pub enum EtlError {
    /// The input file could not be opened. The run never starts.
    #[error("cannot open input '{}': {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A line could not be tokenized.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A record lookup referenced a field the record does not carry.
    #[error("no field named '{0}'")]
    MissingField(String),

    /// A transformer could not produce an output record.
    #[error("transform failed: {0}")]
    Transform(String),

    /// A record could not be serialized.
    #[error("aggregate failed: {0}")]
    Aggregate(String),

    /// The output file could not be opened.
    #[error("cannot open output '{}': {source}", .path.display())]
    SinkUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing to an already open output failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Reading from an already open input failed.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// The run configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EtlError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        EtlError::Parse {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        EtlError::Config(message.into())
    }

    /// Short name of the error kind, used in log lines and status reports.
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::SourceUnavailable { .. } => "SourceUnavailable",
            EtlError::Parse { .. } => "ParseError",
            EtlError::MissingField(_) | EtlError::Transform(_) => "TransformError",
            EtlError::Aggregate(_) => "AggregateError",
            EtlError::SinkUnavailable { .. } | EtlError::Write(_) => "SinkUnavailable",
            EtlError::Io(_) => "SourceUnavailable",
            EtlError::Config(_) => "ConfigError",
        }
    }
}
