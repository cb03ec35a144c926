//! Configuration management for opinion-forge.
//!
//! Supports configuration via CLI arguments, environment variables,
//! and a JSON configuration file with sensible defaults. Values given on the
//! command line (or through their environment variables) override the file.

use crate::error::{ForgeError, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Anthropic Messages API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default `anthropic-version` header value.
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// CLI arguments for opinion-forge.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "opinion-forge",
    author = "Yiğit Konur <yigit@wope.com>",
    version,
    about = "🔥 Classify text rows and rewrite them as assertive opinions",
    long_about = "opinion-forge reads a delimited table with `id` and `text` columns, asks a\n\
                  language model to classify each text as opinion, fact or proposal, and\n\
                  rewrites it as the most assertive opinion possible.\n\n\
                  Rows are processed one at a time. Rate-limited requests are retried after\n\
                  a fixed wait; any other failure marks the row as ERROR and moves on.",
    after_help = "EXAMPLES:\n    \
        opinion-forge --input input.csv --output output.csv\n    \
        opinion-forge -i statements.tsv -o opinions.tsv --delimiter '\\t'\n    \
        opinion-forge --config forge.json --max-retries 20"
)]
pub struct Args {
    /// Path to the input table (needs `id` and `text` columns)
    #[arg(short, long, default_value = "input.csv", env = "FORGE_INPUT")]
    pub input: PathBuf,

    /// Path to write the classified table to
    #[arg(short, long, default_value = "output.csv", env = "FORGE_OUTPUT")]
    pub output: PathBuf,

    /// Anthropic API key
    #[arg(short = 'k', long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Messages API endpoint URL
    #[arg(short, long, env = "FORGE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Model identifier
    #[arg(short, long, env = "FORGE_MODEL")]
    pub model: Option<String>,

    /// Reply size cap in tokens
    #[arg(long, env = "FORGE_MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    /// Seconds to wait after a rate-limit response
    #[arg(short = 'w', long, env = "FORGE_RATE_LIMIT_WAIT")]
    pub rate_limit_wait: Option<u64>,

    /// Give up on a row after this many rate-limit retries (unbounded if unset)
    #[arg(short = 'r', long, env = "FORGE_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Request timeout in seconds (no timeout if unset)
    #[arg(short, long, env = "FORGE_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Field delimiter for input and output tables
    #[arg(short, long, env = "FORGE_DELIMITER")]
    pub delimiter: Option<String>,

    /// Path to a JSON configuration file
    #[arg(short, long, env = "FORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, env = "FORGE_VERBOSE")]
    pub verbose: bool,

    /// Output logs as JSON
    #[arg(long, env = "FORGE_JSON_LOGS")]
    pub json_logs: bool,

    /// Dry run - validate config without sending requests
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Parse CLI arguments.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Settings for the remote Messages endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// The endpoint URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// API key for authentication. Never written back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Value of the `anthropic-version` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Reply size cap in tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: None,
            model: default_model(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl EndpointConfig {
    /// The API key with everything but its last four characters masked.
    #[must_use]
    pub fn masked_api_key(&self) -> String {
        match self.api_key.as_deref() {
            Some(key) if key.chars().count() > 4 => {
                let tail: String = key
                    .chars()
                    .rev()
                    .take(4)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                format!("****{tail}")
            }
            Some(_) => "****".to_string(),
            None => "(not set)".to_string(),
        }
    }
}

fn default_url() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

/// Full application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote endpoint settings.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Request settings.
    #[serde(default)]
    pub request: RequestConfig,

    /// Rate-limit retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Input/output table settings.
    #[serde(default)]
    pub table: TableConfig,
}

/// Request-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Per-request timeout. Requests never time out when unset.
    #[serde(with = "humantime_serde::option", default)]
    pub timeout: Option<Duration>,
}

/// Rate-limit retry configuration.
///
/// Only HTTP 429 responses are retried. The wait between attempts is fixed;
/// there is no backoff growth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Wait between a rate-limit response and the next attempt.
    #[serde(with = "humantime_serde", default = "default_rate_limit_wait")]
    pub rate_limit_wait: Duration,

    /// Maximum number of rate-limit retries per call. Unbounded when unset.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rate_limit_wait: default_rate_limit_wait(),
            max_retries: None,
        }
    }
}

fn default_rate_limit_wait() -> Duration {
    Duration::from_secs(15)
}

/// Delimited table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Field delimiter used for both input and output.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

impl TableConfig {
    /// The delimiter as the single byte the table codec expects.
    ///
    /// Only meaningful after [`Config::validate`] has accepted the value.
    #[must_use]
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(u32::from(self.delimiter)).unwrap_or(b',')
    }
}

fn default_delimiter() -> char {
    ','
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ForgeError::InputFileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| ForgeError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Create configuration from CLI arguments.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = if let Some(config_path) = &args.config {
            Self::from_file(config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(args)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the values given on the command line on top of this config.
    fn apply_overrides(&mut self, args: &Args) -> Result<()> {
        if let Some(api_key) = &args.api_key {
            self.endpoint.api_key = Some(api_key.clone());
        }
        if let Some(url) = &args.endpoint {
            self.endpoint.url.clone_from(url);
        }
        if let Some(model) = &args.model {
            self.endpoint.model.clone_from(model);
        }
        if let Some(max_tokens) = args.max_tokens {
            self.endpoint.max_tokens = max_tokens;
        }
        if let Some(wait) = args.rate_limit_wait {
            self.retry.rate_limit_wait = Duration::from_secs(wait);
        }
        if args.max_retries.is_some() {
            self.retry.max_retries = args.max_retries;
        }
        if let Some(timeout) = args.timeout {
            self.request.timeout = Some(Duration::from_secs(timeout));
        }
        if let Some(delimiter) = &args.delimiter {
            self.table.delimiter = parse_delimiter(delimiter)?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match self.endpoint.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ForgeError::MissingCredential),
        }

        if self.endpoint.url.trim().is_empty() {
            return Err(ForgeError::InvalidConfig(
                "endpoint URL cannot be empty".to_string(),
            ));
        }
        if self.endpoint.model.trim().is_empty() {
            return Err(ForgeError::InvalidConfig(
                "model cannot be empty".to_string(),
            ));
        }
        if self.endpoint.max_tokens == 0 {
            return Err(ForgeError::InvalidConfig(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        let delimiter = self.table.delimiter;
        if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
            return Err(ForgeError::InvalidConfig(format!(
                "delimiter {delimiter:?} must be a single ASCII character other than a quote or newline"
            )));
        }

        Ok(())
    }
}

/// Parse a delimiter argument, accepting `\t` and `tab` for tabs.
fn parse_delimiter(raw: &str) -> Result<char> {
    if raw == "\\t" || raw.eq_ignore_ascii_case("tab") {
        return Ok('\t');
    }

    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ForgeError::InvalidConfig(format!(
            "delimiter must be a single character, got {raw:?}"
        ))),
    }
}

/// Custom serde module for humantime Duration parsing.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Simple parsing: support "15s", "500ms", or just seconds as number.
    pub(super) fn parse(s: &str) -> Result<Duration, std::num::ParseIntError> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim().parse::<u64>().map(Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim().parse::<u64>().map(Duration::from_secs)
        } else {
            s.parse::<u64>().map(Duration::from_secs)
        }
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        #[allow(clippy::ref_option)]
        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
