use std::path::PathBuf;

use chrono::Local;
use tokio_util::sync::CancellationToken;

use crate::batch::{run_batch, BatchRequest};
use crate::export::{export_file_name, write_records};
use crate::fetch::RecordSource;
use crate::filter::RecordFilter;
use crate::progress::{DoneOutcome, EventSink};
use crate::record::ProcessRecord;
use crate::{info_time, Error};

/// Everything one scrape needs besides the source.
#[derive(Debug, Clone)]
pub struct SiteRequest {
    pub batch: BatchRequest,
    pub filter: Option<RecordFilter>,
    /// Directory for the export. `None` skips writing a file.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SiteReport {
    pub outcome: DoneOutcome,
    /// Filtered records; empty unless the run finished.
    pub records: Vec<ProcessRecord>,
    pub export_path: Option<PathBuf>,
}

/// Runs a batch, filters it, writes the export and emits the final `done` event.
///
/// Never fails: every way a run can end maps onto a `DoneOutcome`, which is also
/// sent through `events` exactly once.
pub async fn process_site<S>(
    source: &S,
    request: &SiteRequest,
    events: &EventSink,
    cancel: &CancellationToken,
) -> SiteReport
where
    S: RecordSource + ?Sized,
{
    let start_time = Local::now();
    info_time!("Started scraping");

    let mut sink = events.clone();
    let report = match run_batch(source, &request.batch, &mut sink, cancel).await {
        Ok(result) if result.cancelled => {
            info_time!(start_time, "Scrape cancelled after {} attempts", result.completed);
            finished(DoneOutcome::Cancelled)
        }
        Ok(result) => {
            let records = match &request.filter {
                Some(filter) => filter.apply(result.records),
                None => result.records,
            };
            export(request, records).await
        }
        Err(err @ Error::OutageDetected { .. }) => {
            tracing::error!(error = %err, "scrape aborted");
            finished(DoneOutcome::OutageDetected)
        }
        Err(err) => {
            tracing::error!(error = %err, "scrape failed");
            finished(DoneOutcome::Error {
                message: err.to_string(),
            })
        }
    };

    info_time!(start_time, "Finished PROCESSING {:?}", report.outcome);
    events.done(report.outcome.clone());
    report
}

async fn export(request: &SiteRequest, records: Vec<ProcessRecord>) -> SiteReport {
    if records.is_empty() {
        return finished(DoneOutcome::Empty);
    }

    let export_path = match &request.output_dir {
        Some(dir) => {
            let path = dir.join(export_file_name(&request.batch));
            match write_records(&path, &records).await {
                Ok(path) => Some(path),
                Err(err) => {
                    tracing::error!(error = %err, path = %path.display(), "export failed");
                    return finished(DoneOutcome::Error {
                        message: err.to_string(),
                    });
                }
            }
        }
        None => None,
    };

    SiteReport {
        outcome: DoneOutcome::Success {
            record_count: records.len(),
        },
        records,
        export_path,
    }
}

fn finished(outcome: DoneOutcome) -> SiteReport {
    SiteReport {
        outcome,
        records: Vec::new(),
        export_path: None,
    }
}
