//! Orchestration of the fetch -> select -> request -> respond -> stage flow.
//!
//! [`session::WorkflowSession`] is the entry point; the other modules are the
//! pieces it wires together around one shared [`state::SessionState`].

pub mod correlator;
pub mod error;
pub mod fetcher;
pub mod notice;
pub mod progress;
pub mod selection;
pub mod session;
pub mod stager;
pub mod state;

pub use error::WorkflowError;
pub use session::WorkflowSession;
