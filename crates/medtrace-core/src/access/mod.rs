//! Patient-controlled access to medical records.

mod payload;
mod records;

pub use records::*;
