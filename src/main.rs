//! Weekly attendance ingest.
//!
//! Pulls the form's published CSV export (or a local file), normalizes each
//! submission, resolves parents and children against the database, and
//! records attendance. Non-interactive and idempotent — safe to run from
//! cron and safe to re-run on the same sheet.
//!
//! Usage:
//!   DATABASE_URL=... ingest [--file responses.csv] [--url CSV_URL] [--date YYYY-MM-DD]

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attendance_ingest::config::Config;
use attendance_ingest::db;
use attendance_ingest::ingest::ingest_batch;
use attendance_ingest::normalize::RawRow;
use attendance_ingest::store::postgres::PgStore;

#[derive(Parser)]
#[command(name = "ingest", about = "Ingest one weekly attendance batch")]
struct Args {
    /// Local CSV file to ingest instead of fetching the sheet export
    #[arg(long)]
    file: Option<String>,

    /// CSV export URL (overrides SHEET_CSV_URL)
    #[arg(long)]
    url: Option<String>,

    /// Processing date for rows without a timestamp (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,
}

async fn load_rows(args: &Args, config: &Config) -> anyhow::Result<Vec<RawRow>> {
    let data = if let Some(path) = &args.file {
        info!("Reading batch from {path}");
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?
    } else {
        let url = args
            .url
            .clone()
            .or_else(|| config.sheet_csv_url.clone())
            .context("No batch source: pass --file/--url or set SHEET_CSV_URL")?;
        info!("Fetching batch CSV export");
        reqwest::get(&url)
            .await
            .context("Failed to fetch CSV export")?
            .error_for_status()
            .context("CSV export request rejected")?
            .text()
            .await
            .context("Failed to read CSV export body")?
    };

    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let mut rows = Vec::new();
    for (idx, record) in reader.deserialize::<RawRow>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            // A structurally broken CSV line is dropped here; field-level
            // problems are the normalizer's job and stay row-scoped.
            Err(e) => warn!(row = idx + 1, "unreadable CSV record: {e}"),
        }
    }
    Ok(rows)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let rows = load_rows(&args, &config).await?;
    info!("Loaded {} submission rows", rows.len());

    // Unreachable storage here aborts the whole run before any row is touched.
    let pool = db::create_pool(&config.database_url).await?;
    db::provision_schema(&pool).await?;
    info!("Database connected and schema provisioned");

    let as_of = args.date.unwrap_or_else(|| Utc::now().date_naive());
    let store = PgStore::new(pool);

    let report = ingest_batch(&store, &rows, as_of, Some(&config.recorded_by)).await;
    report.log_summary();
    for warning in &report.warnings {
        warn!("{warning}");
    }
    // One machine-readable line for log scraping / operator review.
    println!("{}", serde_json::to_string(&report)?);

    if !report.failed.is_empty() {
        anyhow::bail!("{} row(s) failed; re-submit after inspection", report.failed.len());
    }
    Ok(())
}
