//! Domain models for the medtrace ledger.

mod drug;
mod event;
mod identity;
mod record;
mod time;

pub use drug::*;
pub use event::*;
pub use identity::*;
pub use record::*;
pub use time::*;
