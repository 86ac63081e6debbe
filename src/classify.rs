//! Sorting fetch failures into cancellation, connectivity and everything else.
//!
//! Only connectivity failures may trip the circuit breaker. A malformed
//! page from a live origin is a single-item failure, not an outage.

use std::error::Error as StdError;
use std::io;

use tokio_util::sync::CancellationToken;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Cancelled,
    /// Connection refused, host not found, a connect/read timeout or a
    /// connection the origin dropped before answering.
    ConnectionError,
    Unexpected,
}

/// Classifies a failed fetch. `cancel` is the token the fetch was started with.
pub fn classify(err: &Error, cancel: &CancellationToken) -> FailureClass {
    if cancel.is_cancelled() {
        return FailureClass::Cancelled;
    }
    match err {
        Error::Reqwest(e) if e.is_timeout() || e.is_connect() => FailureClass::ConnectionError,
        // Transport failure while sending, e.g. the socket closed before any response.
        Error::Reqwest(e) if e.is_request() && e.status().is_none() => {
            FailureClass::ConnectionError
        }
        Error::Reqwest(e) if e.status().is_none() && has_connection_io_error(e) => {
            FailureClass::ConnectionError
        }
        Error::Io(e) if is_connection_io_kind(e.kind()) => FailureClass::ConnectionError,
        _ => FailureClass::Unexpected,
    }
}

/// Walks the source chain looking for a socket-level failure (e.g. a reset mid-body).
fn has_connection_io_error(err: &(dyn StdError + 'static)) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if is_connection_io_kind(io_err.kind()) {
                return true;
            }
        }
        source = e.source();
    }
    false
}

fn is_connection_io_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe
    )
}
