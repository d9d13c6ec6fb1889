use octocrab::Octocrab;
use rx_core::repo_url::RepoRef;
use thiserror::Error;

use crate::types::GitHubConfig;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("missing GitHub token: set GITHUB_TOKEN or pass it in GitHubConfig")]
    MissingToken,

    #[error("environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("invalid repository: {0}")]
    InvalidRepo(String),

    #[error("could not decode {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, GitHubError>;

impl GitHubError {
    /// HTTP status reported by GitHub, when the failure came from the API.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GitHubError::Api(octocrab::Error::GitHub { source, .. }) => {
                Some(source.status_code.as_u16())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    pub(crate) octocrab: Octocrab,
    pub(crate) owner: String,
    pub(crate) repo: String,
}

impl GitHubClient {
    /// Create a new `GitHubClient` from an explicit [`GitHubConfig`].
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let token = config
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or(GitHubError::MissingToken)?;
        if config.owner.is_empty() || config.repo.is_empty() {
            return Err(GitHubError::InvalidRepo(format!(
                "{}/{}",
                config.owner, config.repo
            )));
        }

        let octocrab = Octocrab::builder().personal_token(token).build()?;

        Ok(Self {
            octocrab,
            owner: config.owner,
            repo: config.repo,
        })
    }

    /// Client for a parsed repository reference.
    pub fn for_repo(repo: &RepoRef, token: Option<String>) -> Result<Self> {
        Self::new(GitHubConfig {
            token,
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
        })
    }

    /// Create a new `GitHubClient` by reading `GITHUB_TOKEN`, `GITHUB_OWNER`,
    /// and `GITHUB_REPO` from the environment.
    pub fn new_from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")?;
        let owner = std::env::var("GITHUB_OWNER")?;
        let repo = std::env::var("GITHUB_REPO")?;

        Self::new(GitHubConfig {
            token: Some(token),
            owner,
            repo,
        })
    }

    /// Returns a reference to the inner `Octocrab` instance.
    pub fn inner(&self) -> &Octocrab {
        &self.octocrab
    }

    /// Returns the configured owner (org or user).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the configured repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub(crate) fn route(&self, tail: &str) -> String {
        format!("/repos/{}/{}/{}", self.owner, self.repo, tail)
    }

    /// The repository's default branch.
    pub async fn default_branch(&self) -> Result<String> {
        let repo = self.octocrab.repos(&self.owner, &self.repo).get().await?;
        Ok(repo.default_branch.unwrap_or_else(|| "main".to_string()))
    }
}
