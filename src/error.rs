//! Custom error types for opinion-forge.
//!
//! Every fallible operation in the library returns [`ForgeError`]. The
//! variants fall into three groups: configuration errors (fatal at startup),
//! table I/O errors (fatal for the batch) and service errors (contained to a
//! single row by the batch runner).

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while classifying a batch.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Failed to read the input file.
    #[error("failed to read input file '{path}': {source}")]
    InputFileRead {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or write the output file.
    #[error("failed to write to output file '{path}': {source}")]
    OutputFileWrite {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The input table could not be parsed.
    #[error("malformed input table '{path}' at line {line}: {source}")]
    InputTable {
        /// Path to the input table.
        path: PathBuf,
        /// Line of the offending record (0 when unknown).
        line: u64,
        /// The underlying table error.
        #[source]
        source: csv::Error,
    },

    /// The input table lacks a required column.
    #[error("input table '{path}' has no '{column}' column")]
    MissingColumn {
        /// Path to the input table.
        path: PathBuf,
        /// Name of the missing column.
        column: &'static str,
    },

    /// Failed to encode the output table.
    #[error("failed to encode output table: {0}")]
    OutputTable(#[source] csv::Error),

    /// No API credential was supplied.
    #[error("no API key configured - pass --api-key or set ANTHROPIC_API_KEY")]
    MissingCredential,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to parse the JSON configuration file.
    #[error("failed to parse config file '{path}': {source}")]
    ConfigParse {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Endpoint returned an error status other than rate limiting.
    #[error("endpoint returned error status {status}: {body}")]
    EndpointError {
        /// HTTP status code returned.
        status: u16,
        /// Response body content.
        body: String,
    },

    /// Rate limiting outlasted the configured retry cap.
    #[error("rate limit still in effect after {retries} retries")]
    RateLimitExhausted {
        /// Number of retries made before giving up.
        retries: u32,
    },

    /// The response envelope did not have the expected shape.
    #[error("invalid API response: {message}")]
    InvalidResponse {
        /// Description of what was invalid.
        message: String,
    },

    /// The model's reply could not be parsed into a classification.
    #[error("failed to parse model reply: {source}")]
    ReplyParse {
        /// The extracted payload that failed to parse.
        payload: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ForgeError {
    /// Whether this error came from talking to the remote service.
    ///
    /// Service errors are recorded against a single row; everything else
    /// aborts the batch.
    #[must_use]
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            Self::HttpRequest(_)
                | Self::EndpointError { .. }
                | Self::RateLimitExhausted { .. }
                | Self::InvalidResponse { .. }
                | Self::ReplyParse { .. }
        )
    }
}

/// Result type alias for opinion-forge operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
