use std::path::PathBuf;
use thiserror::Error;

/// One failed decoding attempt, kept so the final error can list them all.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingAttempt {
    pub encoding: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Cannot read source '{path}': {source}")]
    Unreachable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode '{name}' with any encoding (tried {})", format_attempts(.attempts))]
    AllEncodingsFailed {
        name: String,
        attempts: Vec<EncodingAttempt>,
    },
}

impl LoadError {
    /// Encodings that were tried before giving up, in order.
    pub fn attempted_encodings(&self) -> Vec<&str> {
        match self {
            LoadError::Unreachable { .. } => Vec::new(),
            LoadError::AllEncodingsFailed { attempts, .. } => {
                attempts.iter().map(|a| a.encoding.as_str()).collect()
            }
        }
    }
}

fn format_attempts(attempts: &[EncodingAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.encoding, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Column '{column}' not found (available: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
}

impl SchemaError {
    pub fn missing(column: &str, headers: &[String]) -> Self {
        SchemaError::MissingColumn {
            column: column.to_string(),
            available: headers.to_vec(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            SchemaError::MissingColumn { column, .. } => column,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidAxisError {
    #[error("{axis} column '{column}' not found")]
    MissingColumn { axis: &'static str, column: String },

    #[error("{axis} column '{column}' is not numeric")]
    NonNumeric { axis: &'static str, column: String },

    #[error("{axis} column '{column}' has {count} distinct values (limit {limit})")]
    TooManyCategories {
        axis: &'static str,
        column: String,
        count: usize,
        limit: usize,
    },

    #[error("pie values in column '{column}' must not be negative")]
    NegativePieValue { column: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown encoding '{0}' (expected utf-8, euc-kr or cp949)")]
    UnknownEncoding(String),

    #[error("Encoding candidate list is empty")]
    NoEncodings,

    #[error("Rename map sends both '{first}' and '{second}' to '{display}'")]
    DuplicateDisplayName {
        first: String,
        second: String,
        display: String,
    },
}
