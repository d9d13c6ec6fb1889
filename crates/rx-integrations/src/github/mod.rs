pub mod client;
pub mod contents;
pub mod pull_requests;
