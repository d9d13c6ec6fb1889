use rx_core::types::{ChangeRef, FileNode, OpenChange};
use serde_json::json;
use tracing::{debug, info};

use crate::types::{GitObject, GitRef, NewTreeEntry};

use super::client::{GitHubClient, Result};

/// Open pull requests of the configured repository.
pub async fn list_open_pull_requests(client: &GitHubClient) -> Result<Vec<OpenChange>> {
    let page = client
        .octocrab
        .pulls(&client.owner, &client.repo)
        .list()
        .state(octocrab::params::State::Open)
        .per_page(100)
        .send()
        .await?;

    Ok(page.items.into_iter().map(octocrab_pr_to_open_change).collect())
}

/// Head commit SHA of a branch, or `None` when the branch does not exist.
pub async fn branch_head(client: &GitHubClient, branch: &str) -> Result<Option<String>> {
    let route = client.route(&format!("git/ref/heads/{branch}"));
    match client.octocrab.get::<GitRef, _, _>(route, None::<&()>).await {
        Ok(git_ref) => Ok(Some(git_ref.object.sha)),
        Err(octocrab::Error::GitHub { source, .. }) if source.status_code.as_u16() == 404 => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Commit `files` on top of `branch`, creating the branch from `base` first
/// when it does not exist yet. Returns the new commit SHA.
pub async fn commit_files(
    client: &GitHubClient,
    branch: &str,
    base: &str,
    files: &[FileNode],
    message: &str,
) -> Result<String> {
    let parent = match branch_head(client, branch).await? {
        Some(sha) => sha,
        None => {
            let base_sha = branch_head(client, base)
                .await?
                .ok_or_else(|| super::client::GitHubError::InvalidRepo(format!("base branch '{base}' not found")))?;
            let body = json!({ "ref": format!("refs/heads/{branch}"), "sha": base_sha });
            let _: GitRef = client.octocrab.post(client.route("git/refs"), Some(&body)).await?;
            info!(branch = %branch, base = %base, "branch created");
            base_sha
        }
    };

    let entries: Vec<NewTreeEntry<'_>> = files
        .iter()
        .map(|f| NewTreeEntry {
            path: f.path.trim_start_matches('/'),
            mode: "100644",
            kind: "blob",
            content: &f.content,
        })
        .collect();
    let tree_body = json!({ "base_tree": parent, "tree": entries });
    let tree: GitObject = client
        .octocrab
        .post(client.route("git/trees"), Some(&tree_body))
        .await?;

    let commit_body = json!({ "message": message, "tree": tree.sha, "parents": [parent] });
    let commit: GitObject = client
        .octocrab
        .post(client.route("git/commits"), Some(&commit_body))
        .await?;

    let ref_body = json!({ "sha": commit.sha, "force": false });
    let _: GitRef = client
        .octocrab
        .patch(client.route(&format!("git/refs/heads/{branch}")), Some(&ref_body))
        .await?;

    debug!(branch = %branch, commit = %commit.sha, files = files.len(), "files committed");
    Ok(commit.sha)
}

/// Create a pull request from `head` into `base`.
pub async fn create_pull_request(
    client: &GitHubClient,
    title: &str,
    body: &str,
    head: &str,
    base: &str,
) -> Result<ChangeRef> {
    let pr = client
        .octocrab
        .pulls(&client.owner, &client.repo)
        .create(title, head, base)
        .body(body)
        .send()
        .await?;

    Ok(ChangeRef {
        id: pr.number,
        url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
        branch: head.to_string(),
    })
}

// ---- internal helpers -------------------------------------------------------

fn octocrab_pr_to_open_change(pr: octocrab::models::pulls::PullRequest) -> OpenChange {
    OpenChange {
        id: pr.number,
        title: pr.title.unwrap_or_default(),
        head_branch: pr.head.ref_field,
    }
}
