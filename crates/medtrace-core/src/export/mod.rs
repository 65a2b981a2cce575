//! Provenance export for regulators and auditors.

mod provenance;

pub use provenance::*;
