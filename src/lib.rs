//! PROTOCOLO SCRAPER
//! Pulls administrative process records from the municipal protocol portal,
//! one process per request, and aggregates them into a tabular export.
//!
//! The interesting part is [`batch::run_batch`]: a sliding window of fetches
//! over an identifier range, with a circuit breaker for origin outages and
//! cooperative cancellation through a `CancellationToken`.

mod error;
mod macros;
mod parse;
mod request;

pub mod batch;
pub mod classify;
pub mod cli;
pub mod config;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod identifier;
pub mod logging;
pub mod process;
pub mod progress;
pub mod record;
pub mod registry;

pub use batch::{run_batch, BatchRequest, BatchResult};
pub use error::{Error, Result};
pub use fetch::{PortalClient, RecordSource};
pub use identifier::ProcessIdentifier;
pub use progress::{DoneOutcome, EventSink, ProgressEvent, ProgressSink};
pub use record::{FetchOutcome, ProcessRecord};
