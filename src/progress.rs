//! Progress reporting.
//!
//! The batch controller calls a [`ProgressSink`] once per finished attempt.
//! [`EventSink`] turns those calls into [`ProgressEvent`]s on a broadcast
//! channel, which a push transport (e.g. server-sent events) can relay.

use serde::Serialize;
use tokio::sync::broadcast;

/// Receives cumulative progress. Must return quickly: it runs inside the
/// controller's completion step and a slow sink stalls admission.
pub trait ProgressSink {
    fn report(&mut self, completed: usize, total: usize, connectivity_warning: bool);
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize, bool),
{
    fn report(&mut self, completed: usize, total: usize, connectivity_warning: bool) {
        self(completed, total, connectivity_warning)
    }
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _completed: usize, _total: usize, _connectivity_warning: bool) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProgressEvent {
    Progress { percent: u8 },
    ConnectivityWarning,
    Done { outcome: DoneOutcome },
}

/// How a run ended. Each terminal state is distinct so callers can word them differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum DoneOutcome {
    Success { record_count: usize },
    /// Nothing found, or nothing left after filtering.
    Empty,
    OutageDetected,
    Cancelled,
    Error { message: String },
}

pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (completed.min(total) * 100 / total) as u8
}

/// Publishes progress as [`ProgressEvent`]s. Sending never blocks.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<ProgressEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ProgressEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn done(&self, outcome: DoneOutcome) {
        self.emit(ProgressEvent::Done { outcome });
    }
}

impl ProgressSink for EventSink {
    fn report(&mut self, completed: usize, total: usize, connectivity_warning: bool) {
        self.emit(ProgressEvent::Progress {
            percent: percent(completed, total),
        });
        if connectivity_warning {
            self.emit(ProgressEvent::ConnectivityWarning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 10), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 66);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(5, 3), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(ProgressEvent::Progress { percent: 40 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "progress", "percent": 40}));

        let json = serde_json::to_value(ProgressEvent::ConnectivityWarning).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "connectivity-warning"}));

        let json = serde_json::to_value(ProgressEvent::Done {
            outcome: DoneOutcome::Success { record_count: 5 },
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "done", "outcome": {"status": "success", "record_count": 5}})
        );

        let json = serde_json::to_value(ProgressEvent::Done {
            outcome: DoneOutcome::OutageDetected,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "done", "outcome": {"status": "outage-detected"}})
        );
    }

    #[test]
    fn test_event_sink_reports() {
        let mut sink = EventSink::new(16);
        let mut rx = sink.subscribe();

        sink.report(1, 4, false);
        sink.report(2, 4, true);

        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::Progress { percent: 25 });
        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::Progress { percent: 50 });
        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::ConnectivityWarning);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_sink_without_subscribers() {
        let mut sink = EventSink::new(1);
        sink.report(1, 1, true);
        sink.done(DoneOutcome::Empty);
    }

    #[test]
    fn test_closure_sink() {
        let mut calls = Vec::new();
        {
            let mut sink = |c: usize, t: usize, w: bool| calls.push((c, t, w));
            sink.report(1, 2, false);
            ProgressSink::report(&mut sink, 2, 2, true);
        }
        assert_eq!(calls, vec![(1, 2, false), (2, 2, true)]);
    }
}
