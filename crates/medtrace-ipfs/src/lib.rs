//! IPFS content store for medtrace.
//!
//! Record bodies are uploaded as `data.json` through the IPFS HTTP API and
//! read back through a public gateway. The `http` feature (on by default)
//! brings in the client and [`open_with_ipfs`]; without it only response
//! parsing is available.

pub mod response;

#[cfg(feature = "http")]
pub mod client;
#[cfg(feature = "http")]
mod open;

#[cfg(feature = "http")]
pub use client::*;
#[cfg(feature = "http")]
pub use open::*;
pub use response::*;
