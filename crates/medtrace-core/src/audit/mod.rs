//! Tamper-evident feed of every ledger event.

mod chain;

pub use chain::*;
