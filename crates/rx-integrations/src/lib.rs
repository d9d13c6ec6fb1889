//! GitHub-backed repository hosting: filtered tree retrieval with contents,
//! open pull request discovery, and pull request creation from file sets.

pub mod github;
pub mod host;
pub mod types;

pub use host::GitHubHost;
