use std::process::ExitCode;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use colored::Colorize;

use sku_price_watch::compare_prices::{run_price_report, todays_report_path};
use sku_price_watch::config::load_config;
use sku_price_watch::scraping::PriceExtractor;
use sku_price_watch::utilities::rate_limiter::RateLimiter;
use sku_price_watch::Absence;

/// Daily price comparison of our products against competitor listings
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Settings file (TOML); APP_* environment variables override it
    #[arg(short, long, default_value = "Settings.toml")]
    config: String,

    /// Only process the first N tracked SKUs
    #[arg(long)]
    max: Option<usize>,

    /// Report path, overrides file.report_data (`{date}` is expanded too)
    #[arg(short, long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("Price comparison aborted: {:#}", e).red());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let started = Local::now();
    println!("Price comparison started at {}", started.format("%Y-%m-%d %H:%M:%S"));

    // Load configuration settings
    let config = load_config(&cli.config)?;
    let template = cli.output.unwrap_or_else(|| config.file.report_data.clone());
    let report_path = todays_report_path(&template);

    let extractor = PriceExtractor::from_config(&config)?;
    let limiter = RateLimiter::from_config(&config.rate_limit);

    let summary = run_price_report(&config, extractor, limiter, &report_path, cli.max).await?;

    let elapsed = Local::now() - started;
    println!(
        "{}",
        format!(
            "{} rows, {} prices found, {} fetch failed, {} price not found, {} not configured ({}s)",
            summary.rows,
            summary.prices_found,
            summary.absent(Absence::FetchFailed),
            summary.absent(Absence::PriceNotFound),
            summary.absent(Absence::NotConfigured),
            elapsed.num_seconds()
        )
        .green()
    );

    Ok(())
}
