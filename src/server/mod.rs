//! Network entry point for admission checks.
//!
//! [`Gate`] turns limiter decisions into verdicts with retry hints;
//! [`LineServer`] exposes a gate over TCP using the protocol in [`protocol`].

pub mod protocol;
mod server;
mod service;

pub use server::LineServer;
pub use service::{Gate, Verdict};
