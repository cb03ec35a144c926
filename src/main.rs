//! opinion-forge CLI - classify a table of texts and rewrite them as opinions.
//!
//! Run `opinion-forge --help` for usage information.

use anyhow::Result;
use console::style;
use opinion_forge::{ApiClient, Args, BatchRunner, Config};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse_args();

    // Setup logging
    setup_logging(&args);

    // Print banner
    if !args.json_logs {
        print_banner();
    }

    // Load configuration; a missing API key stops here
    let config = match Config::from_args(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    // Validate input file exists
    if !args.input.exists() {
        error!("Input file not found: {:?}", args.input);
        eprintln!(
            "{} Input file not found: {}",
            style("Error:").red().bold(),
            args.input.display()
        );
        std::process::exit(1);
    }

    // Dry run mode
    if args.dry_run {
        println!("\n{}", style("DRY RUN MODE").yellow().bold());
        println!("Configuration validated successfully.\n");
        print_config_summary(&args, &config);
        return Ok(());
    }

    if args.verbose && !args.json_logs {
        print_config_summary(&args, &config);
    }

    let client = ApiClient::new(Arc::new(config.clone()))?;
    let runner = BatchRunner::new(client, config.table.clone());

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        model = %config.endpoint.model,
        "Starting processing"
    );

    let report = runner.run(&args.input, &args.output).await?;
    let rate_limit_hits = runner.classifier().rate_limit_hits();

    if args.json_logs {
        let mut json_result = report.to_json();
        json_result["rate_limit_hits"] = rate_limit_hits.into();
        println!("{}", serde_json::to_string(&json_result)?);
    } else {
        report.print_summary();
        if rate_limit_hits > 0 {
            println!(
                "{} Rate limited {} time(s)",
                style("⏸").yellow().bold(),
                rate_limit_hits
            );
        }

        println!(
            "\n{} Processing complete! Results saved to {}",
            style("✓").green().bold(),
            args.output.display()
        );

        if report.stats.failure_count > 0 {
            println!(
                "{} {} row(s) marked ERROR",
                style("⚠").yellow().bold(),
                report.stats.failure_count
            );
        }
    }

    // Exit with error code if nothing succeeded
    if report.all_failed() {
        std::process::exit(1);
    }

    Ok(())
}

fn setup_logging(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("opinion_forge={level}")));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact(),
            )
            .init();
    }
}

fn print_banner() {
    println!();
    println!("    {}", style("opinion-forge").cyan().bold());
    println!(
        "    {}",
        style("Classify. Rewrite. Assert.").white().dim()
    );
    println!(
        "    {}",
        style(format!("v{}", opinion_forge::VERSION)).white().dim()
    );
    println!();
}

fn print_config_summary(args: &Args, config: &Config) {
    println!("{}", style("Configuration:").bold());
    println!("  Input:       {}", args.input.display());
    println!("  Output:      {}", args.output.display());
    println!("  Endpoint:    {}", config.endpoint.url);
    println!("  Model:       {}", config.endpoint.model);
    println!("  API Key:     {}", config.endpoint.masked_api_key());
    println!("  Max Tokens:  {}", config.endpoint.max_tokens);
    println!("  Retry Wait:  {:?}", config.retry.rate_limit_wait);
    match config.retry.max_retries {
        Some(max) => println!("  Max Retries: {max}"),
        None => println!("  Max Retries: unbounded"),
    }
    match config.request.timeout {
        Some(timeout) => println!("  Timeout:     {timeout:?}"),
        None => println!("  Timeout:     none"),
    }
    println!("  Delimiter:   {:?}", config.table.delimiter);
    println!();
}
