pub mod config;
pub mod hosting;
pub mod identity;
pub mod import_graph;
pub mod prompt;
pub mod repo_url;
pub mod request_store;
pub mod response_parser;
pub mod types;
pub mod validation;
pub mod workflow;
