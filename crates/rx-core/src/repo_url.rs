//! GitHub repository URL parsing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoUrlError {
    #[error("repository URL is empty")]
    Empty,
    #[error("not a GitHub URL: {0}")]
    NotGitHub(String),
    #[error("invalid GitHub URL path (missing owner/repo): {0}")]
    MissingOwnerRepo(String),
}

/// Owner/repo coordinates plus an optional branch and file path, as found in
/// `https://github.com/<owner>/<repo>[/blob|tree/<branch>/<path>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub branch: Option<String>,
    pub file_path: Option<String>,
}

impl RepoRef {
    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "https://github.com/{}/{}", self.owner, self.repo)
    }
}

/// Parse a GitHub URL. Scheme is optional; `.git` suffixes are dropped.
pub fn parse_github_url(url: &str) -> Result<RepoRef, RepoUrlError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(RepoUrlError::Empty);
    }

    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let without_query = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or(without_scheme);

    let mut parts = without_query.splitn(2, '/');
    let host = parts.next().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    if !host.eq_ignore_ascii_case("github.com") {
        return Err(RepoUrlError::NotGitHub(trimmed.to_string()));
    }

    let segments: Vec<&str> = parts
        .next()
        .unwrap_or_default()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.len() < 2 {
        return Err(RepoUrlError::MissingOwnerRepo(trimmed.to_string()));
    }

    let owner = segments[0].to_string();
    let repo = segments[1].trim_end_matches(".git").to_string();

    let mut branch = None;
    let mut file_path = None;
    if segments.len() > 3 && (segments[2] == "blob" || segments[2] == "tree") {
        branch = Some(segments[3].to_string());
        if segments.len() > 4 {
            file_path = Some(segments[4..].join("/"));
        }
    }

    Ok(RepoRef {
        owner,
        repo,
        branch,
        file_path,
    })
}

pub fn is_valid_github_repo_url(url: &str) -> bool {
    parse_github_url(url).is_ok()
}
