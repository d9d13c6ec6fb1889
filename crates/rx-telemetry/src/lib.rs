//! Logging and span helpers shared by the repo-xml crates.
//!
//! - **Logging**: human-readable or JSON output via `tracing-subscriber`,
//!   filtered by `RUST_LOG` with a configurable default.
//! - **Spans**: trace/span id generation so a fetch or an AI request can be
//!   followed across its async steps.

pub mod logging;
pub mod tracing_setup;
