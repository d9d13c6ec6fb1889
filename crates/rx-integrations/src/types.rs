use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub owner: String,
    pub repo: String,
}

/// Which blobs of a repository tree are worth retrieving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeFilter {
    /// Only paths ending in one of these are kept.
    pub allowed_extensions: Vec<String>,
    /// Paths under these prefixes are skipped.
    pub excluded_prefixes: Vec<String>,
    /// File names skipped wherever they appear.
    pub excluded_files: Vec<String>,
}

impl Default for TreeFilter {
    fn default() -> Self {
        let own = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            allowed_extensions: own(&[".ts", ".tsx", ".js", ".jsx", ".css", ".sql", ".json"]),
            excluded_prefixes: own(&[
                "node_modules/",
                ".next/",
                "dist/",
                "build/",
                "supabase/migrations/",
                "public/",
                "components/ui/",
            ]),
            excluded_files: own(&["package-lock.json", "yarn.lock", "pnpm-lock.yaml"]),
        }
    }
}

impl TreeFilter {
    pub fn accepts(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        if self.excluded_files.iter().any(|f| f == file_name) {
            return false;
        }
        if self.excluded_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return false;
        }
        self.allowed_extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Git data API payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GitTree {
    pub sha: String,
    #[serde(default)]
    pub truncated: bool,
    pub tree: Vec<GitTreeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitTreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl GitTreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub name: String,
    pub object: GitObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitObject {
    pub sha: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTreeEntry<'a> {
    pub path: &'a str,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: &'a str,
}
