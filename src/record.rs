use std::collections::BTreeMap;

use serde::Serialize;

use crate::identifier::ProcessIdentifier;

/// Field names used in every `ProcessRecord`.
pub mod fields {
    pub const PROCESS: &str = "process";
    pub const OPENING_DATE: &str = "opening_date";
    pub const INTERESTED_PARTY: &str = "interested_party";
    pub const REQUESTER: &str = "requester";
    pub const SUBJECT: &str = "subject";
    pub const STATUS: &str = "status";
    pub const OBSERVATION: &str = "observation";
    pub const ORIGIN: &str = "origin";
    pub const SENT_AT: &str = "sent_at";
    pub const DESTINATION: &str = "destination";
    pub const RECEIVED_AT: &str = "received_at";

    /// Header attributes, shared by every movement of a process.
    pub const HEADER: [&str; 6] = [
        OPENING_DATE,
        INTERESTED_PARTY,
        REQUESTER,
        SUBJECT,
        STATUS,
        OBSERVATION,
    ];

    /// Movement columns, in table order.
    pub const MOVEMENT: [&str; 4] = [ORIGIN, SENT_AT, DESTINATION, RECEIVED_AT];

    /// Column order used for exports.
    pub const ALL: [&str; 11] = [
        PROCESS,
        OPENING_DATE,
        INTERESTED_PARTY,
        REQUESTER,
        SUBJECT,
        STATUS,
        OBSERVATION,
        ORIGIN,
        SENT_AT,
        DESTINATION,
        RECEIVED_AT,
    ];
}

/// One movement of a process plus the process header, as a flat field map.
///
/// Only the parser builds records; once handed out they are read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProcessRecord(BTreeMap<String, String>);

impl ProcessRecord {
    pub(crate) fn with_header(id: &ProcessIdentifier, header: &[(&str, String)]) -> Self {
        let mut map = BTreeMap::new();
        map.insert(fields::PROCESS.to_string(), id.canonical());
        for (name, value) in header {
            map.insert((*name).to_string(), value.clone());
        }
        Self(map)
    }

    pub(crate) fn with_movement(mut self, movement: &[(&str, String)]) -> Self {
        for (name, value) in movement {
            self.0.insert((*name).to_string(), value.clone());
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Header attributes only, for comparing two fetches of the same process.
    pub fn header(&self) -> BTreeMap<&str, &str> {
        fields::HEADER
            .iter()
            .filter_map(|name| self.get(name).map(|v| (*name, v)))
            .collect()
    }
}

/// Result of a single fetch attempt. Exactly one variant per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(Vec<ProcessRecord>),
    /// The portal answered but has no such process.
    EmptyResult,
    ConnectionError(ProcessIdentifier),
    Cancelled,
}

impl FetchOutcome {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, FetchOutcome::ConnectionError(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchOutcome::Cancelled)
    }
}
