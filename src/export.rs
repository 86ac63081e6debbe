use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::batch::BatchRequest;
use crate::identifier::normalize_prefix;
use crate::record::{fields, ProcessRecord};
use crate::{info_time, Result};

/// File name for a batch export, e.g. `processos_018_2025_1-1000.tsv`.
pub fn export_file_name(request: &BatchRequest) -> String {
    let prefix = normalize_prefix(&request.prefix).unwrap_or_else(|_| request.prefix.clone());
    format!(
        "processos_{}_{}_{}-{}.tsv",
        prefix, request.year, request.start, request.end
    )
}

/// Writes the records as a tab-separated table, one header row in `fields::ALL` order.
pub async fn write_records(path: impl AsRef<Path>, records: &[ProcessRecord]) -> Result<PathBuf> {
    let path = path.as_ref().to_path_buf();
    let local_now = Local::now();

    let mut out = fields::ALL.join("\t");
    out.push('\n');
    for record in records {
        let row = fields::ALL
            .iter()
            .map(|name| clean_cell(record.get(name).unwrap_or_default()))
            .collect::<Vec<_>>()
            .join("\t");
        out.push_str(&row);
        out.push('\n');
    }

    let mut file = File::create(&path).await?;
    file.write_all(out.as_bytes()).await?;
    file.flush().await?;
    info_time!(
        local_now,
        "Wrote {} records to file: {}",
        records.len(),
        path.display()
    );

    Ok(path)
}

fn clean_cell(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}
