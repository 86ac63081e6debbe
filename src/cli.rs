use std::path::PathBuf;

use clap::Parser;

use crate::batch::BatchRequest;
use crate::config::Config;
use crate::filter::RecordFilter;
use crate::process::SiteRequest;

/// Scrapes process records from the municipal protocol portal into a TSV export.
#[derive(Parser, Debug)]
#[command(name = "protocolo", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults are used if it doesn't exist)
    #[arg(short, long, default_value = "protocolo.toml", env = "PROTOCOLO_CONFIG")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PROTOCOLO_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Process prefix, padded to 3 digits
    #[arg(short, long)]
    pub prefix: String,

    /// Process year
    #[arg(short, long)]
    pub year: String,

    /// First sequence number (inclusive)
    #[arg(long)]
    pub start: Option<u32>,

    /// Last sequence number (inclusive)
    #[arg(long)]
    pub end: Option<u32>,

    /// Keep only the most recent movement of each process
    #[arg(long)]
    pub first_only: bool,

    /// Maximum number of processes fetched at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Keep only records whose department (or --filter-field) contains this text
    #[arg(long)]
    pub filter: Option<String>,

    /// Field the --filter applies to, instead of origin/destination department
    #[arg(long, requires = "filter")]
    pub filter_field: Option<String>,

    /// Directory for the export file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Combines the arguments with config defaults.
    pub fn site_request(&self, config: &Config) -> SiteRequest {
        let mut batch = BatchRequest::from_config(&self.prefix, &self.year, &config.batch)
            .first_only(self.first_only);
        if let Some(start) = self.start {
            batch.start = start;
        }
        if let Some(end) = self.end {
            batch.end = end;
        }
        if let Some(limit) = self.concurrency {
            batch.concurrency_limit = limit;
        }

        let filter = self.filter.as_deref().map(|needle| match &self.filter_field {
            Some(field) => RecordFilter::field(field.clone(), needle),
            None => RecordFilter::department(needle),
        });

        SiteRequest {
            batch,
            filter,
            output_dir: Some(
                self.output
                    .clone()
                    .unwrap_or_else(|| config.export.output_dir.clone()),
            ),
        }
    }
}
