//! Request-text ("kwork") assembly: the operator's task plus embedded file
//! context.

use crate::types::FileNode;

/// Marker separating the operator's task text from the embedded code context.
pub const CODE_CONTEXT_MARKER: &str = "Code context:\n";

/// Fence language tag for a path, by extension.
pub fn language_for_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "py" => "python",
        "css" => "css",
        "html" => "html",
        "json" => "json",
        "md" => "markdown",
        "sql" => "sql",
        "php" => "php",
        "rb" => "ruby",
        "go" => "go",
        "java" => "java",
        "cs" => "csharp",
        "sh" => "bash",
        "yml" | "yaml" => "yaml",
        "rs" => "rust",
        _ => "plaintext",
    }
}

/// Task text preceding the code-context marker, trimmed.
pub fn task_text(request: &str) -> &str {
    request
        .split(CODE_CONTEXT_MARKER)
        .next()
        .unwrap_or_default()
        .trim()
}

/// One fenced block for a file, with a `// /path` first line unless the
/// content already starts with it.
pub fn file_block(file: &FileNode) -> String {
    let comment = format!("// /{}", file.path.trim_start_matches('/'));
    let body = if file.content.trim_start().starts_with(&comment) {
        file.content.clone()
    } else {
        format!("{comment}\n{}", file.content)
    };
    format!("```{}\n{}\n```", language_for_path(&file.path), body)
}

/// Rebuild the request text: keep the task text, replace the code context
/// with the given files sorted by path.
pub fn build_request_text<'a>(
    current_request: &str,
    files: impl IntoIterator<Item = &'a FileNode>,
) -> String {
    let mut files: Vec<&FileNode> = files.into_iter().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let context = files
        .into_iter()
        .map(file_block)
        .collect::<Vec<_>>()
        .join("\n\n");

    let task = task_text(current_request);
    if task.is_empty() {
        format!("{CODE_CONTEXT_MARKER}{context}")
    } else {
        format!("{task}\n\n{CODE_CONTEXT_MARKER}{context}")
    }
}
