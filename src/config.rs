use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Published CSV export of the attendance form's response sheet.
    /// Optional: a local file can be passed on the command line instead.
    pub sheet_csv_url: Option<String>,
    /// Attribution written onto attendance rows this run creates.
    pub recorded_by: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            sheet_csv_url: env::var("SHEET_CSV_URL").ok().filter(|s| !s.is_empty()),
            recorded_by: env::var("RECORDED_BY").unwrap_or_else(|_| "weekly-ingest".into()),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
