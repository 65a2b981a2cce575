//! Drug traceability ledger.

mod drugs;

pub use drugs::*;
