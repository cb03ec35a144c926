//! Batch orchestration: read the input table, classify every row, write the
//! output table.
//!
//! Rows are handled strictly one after another. A row whose call fails is
//! written with the `ERROR` sentinel; only table I/O problems abort a run.

use crate::client::Classifier;
use crate::config::TableConfig;
use crate::error::{ForgeError, Result};
use crate::record::{InputRecord, OutputRecord, OUTPUT_HEADERS, REQUIRED_COLUMNS};
use crate::tracker::{StatsSnapshot, StatsTracker};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Runs a classifier over every row of a table.
#[derive(Debug)]
pub struct BatchRunner<C> {
    classifier: C,
    table: TableConfig,
}

impl<C: Classifier> BatchRunner<C> {
    /// Create a runner around a classifier.
    pub fn new(classifier: C, table: TableConfig) -> Self {
        Self { classifier, table }
    }

    /// The classifier this runner calls.
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Classify every row of `input_path` and write the results to
    /// `output_path`.
    pub async fn run(&self, input_path: &Path, output_path: &Path) -> Result<BatchReport> {
        let started_at = Utc::now();
        let records = self.read_records(input_path).await?;

        info!(
            total_rows = records.len(),
            input = %input_path.display(),
            "Loaded rows from input table"
        );

        // Created up front so an unwritable path fails before any API call.
        let file = File::create(output_path)
            .await
            .map_err(|e| ForgeError::OutputFileWrite {
                path: output_path.to_path_buf(),
                source: e,
            })?;

        let (rows, stats) = self.process_records(&records).await;

        let encoded = self.encode_rows(&rows)?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&encoded)
            .await
            .map_err(|e| ForgeError::OutputFileWrite {
                path: output_path.to_path_buf(),
                source: e,
            })?;
        writer.flush().await.map_err(|e| ForgeError::OutputFileWrite {
            path: output_path.to_path_buf(),
            source: e,
        })?;

        info!(
            output = %output_path.display(),
            "Processing complete! Results saved"
        );

        Ok(BatchReport {
            started_at,
            output_path: output_path.to_path_buf(),
            stats,
        })
    }

    /// Classify records in order, producing exactly one output row each.
    pub async fn process_records(&self, records: &[InputRecord]) -> (Vec<OutputRecord>, StatsSnapshot) {
        let mut stats = StatsTracker::new(records.len());
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            info!(id = %record.id, "Processing row");
            let start = Instant::now();

            let row = match self.classifier.classify(&record.text).await {
                Ok(result) => {
                    info!(
                        id = %record.id,
                        classification = %result.classification,
                        "Row classified"
                    );
                    stats.record_success(result.classification, start.elapsed());
                    OutputRecord::success(record, result)
                }
                Err(e) => {
                    warn!(id = %record.id, error = %e, "Row failed");
                    stats.record_failure(start.elapsed());
                    OutputRecord::failure(record, e)
                }
            };

            rows.push(row);
            debug!("{}", stats.snapshot().summary());
        }

        (rows, stats.snapshot())
    }

    /// Read and validate the input table.
    async fn read_records(&self, path: &Path) -> Result<Vec<InputRecord>> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ForgeError::InputFileRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        parse_records(
            bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes),
            self.table.delimiter_byte(),
            path,
        )
    }

    /// Encode output rows, header first.
    fn encode_rows(&self, rows: &[OutputRecord]) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.table.delimiter_byte())
            .has_headers(false)
            .from_writer(Vec::new());

        writer
            .write_record(OUTPUT_HEADERS)
            .map_err(ForgeError::OutputTable)?;
        for row in rows {
            writer
                .write_record(row.fields())
                .map_err(ForgeError::OutputTable)?;
        }

        writer
            .into_inner()
            .map_err(|e| ForgeError::OutputTable(csv::Error::from(e.into_error())))
    }
}

/// Parse table bytes into input records.
///
/// The header must contain every column in [`REQUIRED_COLUMNS`].
pub fn parse_records(bytes: &[u8], delimiter: u8, path: &Path) -> Result<Vec<InputRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(bytes);

    let headers = reader.headers().map_err(|e| table_error(path, e))?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h.trim() == column) {
            return Err(ForgeError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    // Headers with stray whitespace still map onto the record fields.
    reader.set_headers(headers.iter().map(str::trim).collect());

    reader
        .deserialize::<InputRecord>()
        .map(|row| row.map_err(|e| table_error(path, e)))
        .collect()
}

fn table_error(path: &Path, source: csv::Error) -> ForgeError {
    let line = source.position().map_or(0, csv::Position::line);
    ForgeError::InputTable {
        path: path.to_path_buf(),
        line,
        source,
    }
}

/// Result of a completed batch.
#[derive(Debug)]
pub struct BatchReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Where the output table was written.
    pub output_path: PathBuf,
    /// Final statistics.
    pub stats: StatsSnapshot,
}

impl BatchReport {
    /// Total elapsed time.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.stats.elapsed
    }

    /// Whether rows were processed and none of them succeeded.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.stats.processed > 0 && self.stats.success_count == 0
    }

    /// Print a summary of the results.
    pub fn print_summary(&self) {
        println!("\n{}", "═".repeat(60));
        println!("                    PROCESSING COMPLETE");
        println!("{}", "═".repeat(60));
        println!("  Total Rows:       {}", self.stats.processed);
        println!(
            "  Classified:       {} ({:.1}%)",
            self.stats.success_count,
            self.stats.success_rate()
        );
        for (class, count) in &self.stats.per_class {
            println!("    {class:<16}{count}");
        }
        println!("  Errors:           {}", self.stats.failure_count);
        println!("  Elapsed Time:     {:.2}s", self.elapsed().as_secs_f64());
        println!("  Avg Latency:      {:.1}ms", self.stats.avg_latency_ms);
        println!("{}", "═".repeat(60));
    }

    /// Summary as a JSON value for programmatic consumption.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": "complete",
            "started_at": self.started_at.to_rfc3339(),
            "output": self.output_path.display().to_string(),
            "total_processed": self.stats.processed,
            "success_count": self.stats.success_count,
            "failure_count": self.stats.failure_count,
            "classifications": self.stats.per_class,
            "success_rate": self.stats.success_rate(),
            "elapsed_seconds": self.elapsed().as_secs_f64(),
            "avg_latency_ms": self.stats.avg_latency_ms,
        })
    }
}
