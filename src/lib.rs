//! # opinion-forge
//!
//! Batch text classifier built on the Anthropic Messages API.
//!
//! Every row of an input table is sent to a language model, which labels the
//! text as an opinion, a fact or a proposal and rewrites it as the most
//! assertive opinion it can. Results land in an output table with one row per
//! input row, in the same order.
//!
//! ## Features
//!
//! - **Sequential processing**: one request at a time, in table order
//! - **Rate-limit handling**: HTTP 429 responses are retried after a fixed wait
//! - **Tolerant reply parsing**: raw JSON or JSON inside a fenced code block
//! - **Contained failures**: a failing row is written as `ERROR` and the batch
//!   carries on
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use opinion_forge::{ApiClient, BatchRunner, Config};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::default();
//!     config.endpoint.api_key = Some(std::env::var("ANTHROPIC_API_KEY")?);
//!     config.validate()?;
//!
//!     let client = ApiClient::new(Arc::new(config.clone()))?;
//!     let runner = BatchRunner::new(client, config.table);
//!     let report = runner
//!         .run(Path::new("input.csv"), Path::new("output.csv"))
//!         .await?;
//!
//!     report.print_summary();
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! opinion-forge supports configuration via:
//! - Command-line arguments
//! - Environment variables (prefixed with `FORGE_`, plus `ANTHROPIC_API_KEY`)
//! - JSON configuration files
//!
//! See [`Config`] for all available options.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod processor;
pub mod record;
pub mod request;
pub mod tracker;

// Re-exports for convenience
pub use client::{ApiClient, Classifier, Sleeper};
pub use config::{Args, Config, EndpointConfig, RequestConfig, RetryConfig, TableConfig};
pub use error::{ForgeError, Result};
pub use extract::{extract_payload, parse_reply, ReplyShape};
pub use processor::{BatchReport, BatchRunner};
pub use record::{InputRecord, OutputRecord, ERROR_SENTINEL};
pub use request::{Classification, ClassificationResult};
pub use tracker::{StatsSnapshot, StatsTracker};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
