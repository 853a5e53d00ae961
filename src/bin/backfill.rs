//! One-time historical backfill from the multi-sheet attendance workbook.
//!
//! Each worksheet holds one service's submissions; the sheet name must match
//! the service enumeration ("First Service", ...). All sheets are ingested
//! against a single attendance date. Re-running is harmless: resolution and
//! attendance recording are idempotent.
//!
//! Usage:
//!   DATABASE_URL=... backfill --file junior_church_data.xlsx --date 2026-01-26

use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attendance_ingest::config::Config;
use attendance_ingest::db;
use attendance_ingest::ingest::ingest_batch;
use attendance_ingest::models::Service;
use attendance_ingest::normalize::RawRow;
use attendance_ingest::store::postgres::PgStore;

#[derive(Parser)]
#[command(name = "backfill", about = "Import a historical attendance workbook")]
struct Args {
    /// Excel workbook, one sheet per service
    #[arg(long)]
    file: String,

    /// Attendance date for every row in the workbook
    #[arg(long)]
    date: NaiveDate,
}

fn cell_string(row: &[Data], idx: Option<usize>) -> String {
    idx.and_then(|i| row.get(i))
        .map(|c| c.to_string().trim().to_string())
        .unwrap_or_default()
}

/// The workbook uses the initial-load column names ("Full Name of Child 1"),
/// not the weekly form's. Map each data row onto a `RawRow` so the rest of
/// the pipeline is shared with the weekly ingest.
fn sheet_rows(range: &calamine::Range<Data>, service: Service, date: NaiveDate) -> Vec<RawRow> {
    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| c.to_string().trim().to_string())
            .collect(),
        None => return Vec::new(),
    };
    let col = |name: &str| headers.iter().position(|h| h == name);

    let parent_name = col("Full Name");
    let email = col("Email");
    let gender = col("Gender");
    let role = col("Role In Church");
    let department = col("Department In Church");
    let phone = col("Phone Number");
    let secondary_phone = col("Secondary Phone Number");
    let address = col("Address");

    let child_cols: Vec<_> = (1..=3)
        .map(|n| {
            (
                col(&format!("Full Name of Child {n}")),
                col(&format!("Age of Child {n}")),
                col(&format!("Gender of Child {n}")),
                col(&format!("Special Needs of Child {n}")),
                col(&format!("Relationship With Child {n}")),
            )
        })
        .collect();

    let mut out = Vec::new();
    for row in rows_iter {
        let mut raw = RawRow {
            timestamp: date.format("%Y-%m-%d").to_string(),
            parent_name: cell_string(row, parent_name),
            parent_phone: cell_string(row, phone),
            parent_gender: cell_string(row, gender),
            parent_email: cell_string(row, email),
            secondary_phone: cell_string(row, secondary_phone),
            role_in_church: cell_string(row, role),
            department_in_church: cell_string(row, department),
            address: cell_string(row, address),
            service: service.as_str().to_string(),
            ..Default::default()
        };

        let (c1, c2, c3) = (&child_cols[0], &child_cols[1], &child_cols[2]);
        raw.child1_name = cell_string(row, c1.0);
        raw.child1_age = cell_string(row, c1.1);
        raw.child1_gender = cell_string(row, c1.2);
        raw.child1_special_needs = cell_string(row, c1.3);
        raw.child1_relationship = cell_string(row, c1.4);
        raw.child2_name = cell_string(row, c2.0);
        raw.child2_age = cell_string(row, c2.1);
        raw.child2_gender = cell_string(row, c2.2);
        raw.child2_special_needs = cell_string(row, c2.3);
        raw.child2_relationship = cell_string(row, c2.4);
        raw.child3_name = cell_string(row, c3.0);
        raw.child3_age = cell_string(row, c3.1);
        raw.child3_gender = cell_string(row, c3.2);
        raw.child3_special_needs = cell_string(row, c3.3);
        raw.child3_relationship = cell_string(row, c3.4);

        out.push(raw);
    }
    out
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

    let mut workbook = open_workbook_auto(&args.file)
        .with_context(|| format!("Failed to open workbook {}", args.file))?;
    let sheet_names = workbook.sheet_names().to_owned();

    let pool = db::create_pool(&config.database_url).await?;
    db::provision_schema(&pool).await?;
    info!("Database connected and schema provisioned");

    let store = PgStore::new(pool);
    let mut any_failed = false;

    for name in sheet_names {
        let service = match Service::parse(&name) {
            Ok(s) => s,
            Err(_) => {
                warn!("Skipping sheet '{name}': not a known service");
                continue;
            }
        };
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("Failed to read sheet {name}"))?;
        let rows = sheet_rows(&range, service, args.date);
        info!("Ingesting {} rows from sheet '{name}'", rows.len());

        let report = ingest_batch(&store, &rows, args.date, Some(&config.recorded_by)).await;
        report.log_summary();
        println!("{}", serde_json::to_string(&report)?);
        any_failed |= !report.failed.is_empty();
    }

    if any_failed {
        anyhow::bail!("some rows failed; re-run after inspection");
    }
    Ok(())
}
