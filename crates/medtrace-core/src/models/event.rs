//! Events emitted by ledger mutations.

use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// Which collection an event belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Drug,
    Record,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Drug => "drug",
            EntityKind::Record => "record",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "drug" => Some(EntityKind::Drug),
            "record" => Some(EntityKind::Record),
            _ => None,
        }
    }
}

/// One successful mutation and its key arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    DrugCreated {
        id: u64,
        name: String,
        owner: Identity,
    },
    DrugTransferred {
        id: u64,
        from: Identity,
        to: Identity,
    },
    DrugStatusUpdated {
        id: u64,
        new_status: String,
    },
    RecordCreated {
        id: u64,
        patient: Identity,
        payload_ref: String,
    },
    AccessRequested {
        id: u64,
        requester: Identity,
    },
    AccessGranted {
        id: u64,
        requester: Identity,
    },
    AccessRevoked {
        id: u64,
        user: Identity,
    },
}

impl LedgerEvent {
    /// Event name as the front end knows it.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::DrugCreated { .. } => "DrugCreated",
            LedgerEvent::DrugTransferred { .. } => "DrugTransferred",
            LedgerEvent::DrugStatusUpdated { .. } => "DrugStatusUpdated",
            LedgerEvent::RecordCreated { .. } => "RecordCreated",
            LedgerEvent::AccessRequested { .. } => "AccessRequested",
            LedgerEvent::AccessGranted { .. } => "AccessGranted",
            LedgerEvent::AccessRevoked { .. } => "AccessRevoked",
        }
    }

    /// ID of the drug or record the event is about.
    pub fn entity_id(&self) -> u64 {
        match self {
            LedgerEvent::DrugCreated { id, .. }
            | LedgerEvent::DrugTransferred { id, .. }
            | LedgerEvent::DrugStatusUpdated { id, .. }
            | LedgerEvent::RecordCreated { id, .. }
            | LedgerEvent::AccessRequested { id, .. }
            | LedgerEvent::AccessGranted { id, .. }
            | LedgerEvent::AccessRevoked { id, .. } => *id,
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            LedgerEvent::DrugCreated { .. }
            | LedgerEvent::DrugTransferred { .. }
            | LedgerEvent::DrugStatusUpdated { .. } => EntityKind::Drug,
            _ => EntityKind::Record,
        }
    }
}

/// An event as stored in the append-only feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggedEvent {
    /// Position in the feed, starting at 1
    pub seq: u64,
    pub event: LedgerEvent,
    /// Unix seconds
    pub created_at: i64,
    /// Hash of the previous entry (all zeros for the first)
    pub prev_hash: String,
    /// sha256(prev_hash || payload), hex
    pub hash: String,
}
