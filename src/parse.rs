use scraper::{ElementRef, Html, Selector};
use tokio::task::spawn_blocking;

use crate::identifier::ProcessIdentifier;
use crate::record::{fields, ProcessRecord};
use crate::{Error, Result};

/// The movements table. Its absence means the portal has no such process.
const RESULTS_TABLE: &str = "table#tramitacao";
const ROW: &str = "tr";
const CELL: &str = "td";

/// Where each header attribute lives in the result page.
const HEADER_SELECTORS: [(&str, &str); 6] = [
    (fields::OPENING_DATE, "#dataAbertura"),
    (fields::INTERESTED_PARTY, "#interessado"),
    (fields::REQUESTER, "#requerente"),
    (fields::SUBJECT, "#assunto"),
    (fields::STATUS, "#situacao"),
    (fields::OBSERVATION, "#observacao"),
];

/// Parses a result page off the async runtime.
///
/// Returns `None` when the results table is missing, otherwise the records of the process.
pub(crate) async fn parse_process_page(
    html: String,
    id: ProcessIdentifier,
    first_only: bool,
) -> Result<Option<Vec<ProcessRecord>>> {
    spawn_blocking(move || parse_document(&html, &id, first_only)).await?
}

/// Extracts the header attributes and one record per movement row.
///
/// A table without data rows yields a single header-only record.
/// With `first_only` set, only the last row (the most recent movement) is kept.
pub(crate) fn parse_document(
    html: &str,
    id: &ProcessIdentifier,
    first_only: bool,
) -> Result<Option<Vec<ProcessRecord>>> {
    let doc = Html::parse_document(html);

    let table_selector = create_selector(RESULTS_TABLE)?;
    let row_selector = create_selector(ROW)?;
    let cell_selector = create_selector(CELL)?;

    let Some(table) = doc.select(&table_selector).next() else {
        return Ok(None);
    };

    let mut header = Vec::with_capacity(HEADER_SELECTORS.len());
    for (field, sel_str) in HEADER_SELECTORS {
        let selector = create_selector(sel_str)?;
        let value = doc
            .select(&selector)
            .next()
            .map(element_text)
            .unwrap_or_default();
        header.push((field, value));
    }
    let base = ProcessRecord::with_header(id, &header);

    let mut movements = Vec::new();
    for (idx, row) in table.select(&row_selector).enumerate() {
        match parse_row(row, &cell_selector) {
            Ok(Some(movement)) => movements.push(movement),
            // Header row made of <th> cells.
            Ok(None) => {}
            Err(cells) => {
                tracing::debug!(
                    process = %id,
                    row = idx,
                    cells,
                    expected = fields::MOVEMENT.len(),
                    "skipping malformed movement row"
                );
            }
        }
    }

    if movements.is_empty() {
        return Ok(Some(vec![base]));
    }
    if first_only {
        if let Some(last) = movements.pop() {
            movements = vec![last];
        }
    }

    let records = movements
        .iter()
        .map(|movement| base.clone().with_movement(movement))
        .collect();
    Ok(Some(records))
}

/// `Err` carries the number of cells found in a row that doesn't fit the movement columns.
fn parse_row(
    row: ElementRef<'_>,
    cell_selector: &Selector,
) -> core::result::Result<Option<Vec<(&'static str, String)>>, usize> {
    let cells: Vec<_> = row.select(cell_selector).map(element_text).collect();
    if cells.is_empty() {
        return Ok(None);
    }
    if cells.len() != fields::MOVEMENT.len() {
        return Err(cells.len());
    }
    Ok(Some(fields::MOVEMENT.into_iter().zip(cells).collect()))
}

/// Text content with whitespace collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}
