//! Splits a raw AI response into per-file code blocks.
//!
//! Grammar: fenced blocks (```` ```lang ```` ... ```` ``` ````). A block's path
//! is taken from, in order: a path comment on the line before the opening
//! fence, a path comment on the first line inside the block (that line is
//! then dropped from the content), or a path comment right after the closing
//! fence. Blocks without any are named `unnamed-<n>`. Text outside blocks
//! becomes the description. A path named twice keeps the later content at
//! the position it first appeared.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::FileBlock;
use crate::validation::check_block;

pub const DEFAULT_PR_TITLE: &str = "AI Assistant Update";
pub const MAX_PR_TITLE_CHARS: usize = 70;
pub const MAX_PR_DESCRIPTION_CHARS: usize = 60_000;

/// Non-fatal problems found while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseIssue {
    /// A block contains another fence marker; its boundaries may be wrong.
    NestedFence { path: String },
    /// An opening fence was never closed; the rest of the text was kept as
    /// description.
    UnterminatedFence { line: usize },
    /// The same path was given more than once; only the last block is kept.
    DuplicatePath { path: String },
    /// A `/* ... */` placeholder where code was left out.
    SkippedCode { path: String, line: usize },
    /// A `// ...` placeholder comment.
    SkippedComment { path: String, line: usize },
    /// A component using client-only features without `"use client"`.
    MissingUseClient {
        path: String,
        feature: String,
        line: usize,
    },
    /// A well-known identifier is used but never imported.
    MissingImport {
        path: String,
        name: String,
        line: usize,
    },
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseIssue::NestedFence { path } => {
                write!(f, "Block for {path} contains another code fence; check its boundaries.")
            }
            ParseIssue::UnterminatedFence { line } => {
                write!(f, "Code fence opened on line {line} is never closed.")
            }
            ParseIssue::DuplicatePath { path } => {
                write!(f, "{path} appears more than once; the last version is used.")
            }
            ParseIssue::SkippedCode { path, line } => {
                write!(f, "{path}:{line}: code was skipped (`/* ... */`).")
            }
            ParseIssue::SkippedComment { path, line } => {
                write!(f, "{path}:{line}: placeholder comment `// ...` needs review.")
            }
            ParseIssue::MissingUseClient {
                path,
                feature,
                line,
            } => write!(f, "{path}:{line}: uses {feature} without \"use client\"."),
            ParseIssue::MissingImport { path, name, line } => {
                write!(f, "{path}:{line}: uses '{name}' but does not import it.")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub blocks: Vec<FileBlock>,
    pub description: String,
    pub issues: Vec<ParseIssue>,
}

impl ParsedResponse {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.path.as_str())
    }
}

fn fence_open_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*```([\w+#.-]*)\s*$").ok())
        .as_ref()
}

fn fence_close_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*```\s*$").ok()).as_ref()
}

/// A whole line that is nothing but a path comment.
fn path_line_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?://|/\*|--|#)\s*(?:File:\s*)?([\w\-/.\[\]]+?\.\w+)\s*(?:\*/)?\s*$").ok()
    })
    .as_ref()
}

/// A first line inside a block that starts with a path comment.
fn leading_path_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?://|/\*|--|#)\s*(?:File:\s*)?([\w\-/.\[\]]+?\.\w+)").ok()
    })
    .as_ref()
}

fn capture_path(re: Option<&Regex>, line: &str) -> Option<String> {
    re?.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn is_fence_open(line: &str) -> Option<String> {
    fence_open_regex()?
        .captures(line)
        .map(|caps| caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default())
}

fn is_fence_close(line: &str) -> bool {
    fence_close_regex().is_some_and(|re| re.is_match(line))
}

fn strip_leading_slashes(path: &str) -> String {
    if path == "/" {
        return path.to_string();
    }
    path.trim_start_matches(['/', '\\']).to_string()
}

fn language_for(path: &str, fence_lang: &str) -> Option<String> {
    if !fence_lang.is_empty() {
        return Some(fence_lang.to_string());
    }
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty() && !ext.contains('/'))
}

/// Parse a response. Deterministic: the same text always yields the same
/// blocks in the same order.
pub fn parse_response(text: &str) -> ParsedResponse {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut issues = Vec::new();
    let mut description_parts: Vec<String> = Vec::new();
    let mut outside: Vec<&str> = Vec::new();
    let mut counter = 0usize;
    let mut i = 0usize;

    while i < lines.len() {
        let line = lines[i];
        let Some(fence_lang) = is_fence_open(line) else {
            outside.push(line);
            i += 1;
            continue;
        };

        let Some(close_offset) = lines[i + 1..].iter().position(|l| is_fence_close(l)) else {
            warn!(line = i + 1, "unterminated code fence in response");
            issues.push(ParseIssue::UnterminatedFence { line: i + 1 });
            outside.extend(&lines[i..]);
            break;
        };
        let close = i + 1 + close_offset;
        counter += 1;

        // Path comment before the fence, possibly separated by blank lines.
        let mut path = None;
        while outside.last().is_some_and(|l| l.trim().is_empty()) {
            outside.pop();
        }
        if let Some(candidate) = outside.last().and_then(|l| capture_path(path_line_regex(), l)) {
            outside.pop();
            path = Some(candidate);
        }
        push_description(&mut description_parts, &mut outside);

        let mut body: &[&str] = &lines[i + 1..close];
        if path.is_none() {
            if let Some(first) = body.first() {
                if let Some(candidate) = capture_path(leading_path_regex(), first) {
                    path = Some(candidate);
                    body = &body[1..];
                }
            }
        }

        i = close + 1;

        if path.is_none() {
            let mut j = i;
            while j < lines.len() && lines[j].trim().is_empty() {
                j += 1;
            }
            if let Some(candidate) = lines.get(j).and_then(|l| capture_path(path_line_regex(), l)) {
                let mut k = j + 1;
                while k < lines.len() && lines[k].trim().is_empty() {
                    k += 1;
                }
                // A comment directly followed by another fence names that one.
                let names_next_block = lines.get(k).is_some_and(|l| is_fence_open(l).is_some());
                if !names_next_block {
                    path = Some(candidate);
                    i = j + 1;
                }
            }
        }

        let path = path
            .map(|p| strip_leading_slashes(&p))
            .unwrap_or_else(|| format!("unnamed-{counter}"));
        let content = body.join("\n").trim().to_string();

        if content.contains("```") {
            warn!(path = %path, "nested code fence inside block");
            issues.push(ParseIssue::NestedFence { path: path.clone() });
        }

        debug!(path = %path, bytes = content.len(), "parsed file block");
        blocks.push(FileBlock {
            language: language_for(&path, &fence_lang),
            path,
            content,
        });
    }
    push_description(&mut description_parts, &mut outside);

    let blocks = collapse_duplicates(blocks, &mut issues);
    for block in &blocks {
        issues.extend(check_block(block));
    }

    ParsedResponse {
        blocks,
        description: description_parts.join("\n\n"),
        issues,
    }
}

/// Later blocks replace earlier ones with the same path, in place.
fn collapse_duplicates(blocks: Vec<FileBlock>, issues: &mut Vec<ParseIssue>) -> Vec<FileBlock> {
    let mut kept: Vec<FileBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        match kept.iter_mut().find(|b| b.path == block.path) {
            Some(existing) => {
                warn!(path = %block.path, "path repeated in response; keeping the last block");
                issues.push(ParseIssue::DuplicatePath {
                    path: block.path.clone(),
                });
                *existing = block;
            }
            None => kept.push(block),
        }
    }
    kept
}

fn push_description(parts: &mut Vec<String>, outside: &mut Vec<&str>) {
    let text = outside.join("\n");
    let text = text.trim();
    if !text.is_empty() {
        parts.push(text.to_string());
    }
    outside.clear();
}

/// Pull-request title hint: the first non-empty line of the response,
/// capped at [`MAX_PR_TITLE_CHARS`].
pub fn pr_title_hint(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.chars().take(MAX_PR_TITLE_CHARS).collect())
        .unwrap_or_else(|| DEFAULT_PR_TITLE.to_string())
}

/// Pull-request body: the description (or whole response when there is no
/// prose) truncated to [`MAX_PR_DESCRIPTION_CHARS`], followed by the file list.
pub fn pr_description(description: &str, response: &str, paths: &[String]) -> String {
    let source = if description.trim().is_empty() {
        response
    } else {
        description
    };
    let mut body: String = source.chars().take(MAX_PR_DESCRIPTION_CHARS).collect();
    if source.chars().count() > MAX_PR_DESCRIPTION_CHARS {
        body.push_str("\n\n...(truncated)");
    }
    if !paths.is_empty() {
        body.push_str("\n\n**Files:**\n");
        for path in paths {
            body.push_str(&format!("- `{path}`\n"));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_before_inside_and_after_fence() {
        let text = "Intro text.\n\n// app/page.tsx\n```tsx\nexport default 1;\n```\n\n```ts\n// /lib/util.ts\nexport const x = 1;\n```\n\n```css\nbody {}\n```\n/* styles/site.css */\n\nOutro.";
        let parsed = parse_response(text);
        let paths: Vec<&str> = parsed.paths().collect();
        assert_eq!(paths, vec!["app/page.tsx", "lib/util.ts", "styles/site.css"]);
        assert_eq!(parsed.blocks[1].content, "export const x = 1;");
        assert_eq!(parsed.blocks[0].language.as_deref(), Some("tsx"));
        assert_eq!(parsed.description, "Intro text.\n\nOutro.");
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn trailing_comment_naming_next_block_is_not_stolen() {
        let text = "```\na\n```\n// b.ts\n```\nb\n```";
        let parsed = parse_response(text);
        let paths: Vec<&str> = parsed.paths().collect();
        assert_eq!(paths, vec!["unnamed-1", "b.ts"]);
    }

    #[test]
    fn nested_fence_is_reported() {
        let text = "// README.md\n```md\nUse:\n```bash\ncargo run\n```";
        let parsed = parse_response(text);
        assert_eq!(parsed.blocks.len(), 1);
        assert_eq!(
            parsed.issues,
            vec![ParseIssue::NestedFence {
                path: "README.md".into()
            }]
        );
    }

    #[test]
    fn unterminated_fence_goes_to_description() {
        let parsed = parse_response("hello\n```rust\nfn main() {}");
        assert!(parsed.blocks.is_empty());
        assert_eq!(parsed.issues, vec![ParseIssue::UnterminatedFence { line: 2 }]);
        assert!(parsed.description.contains("fn main"));
    }

    #[test]
    fn repeated_path_keeps_last_content_at_first_position() {
        let text = "// a.ts\n```ts\nfirst\n```\n// b.ts\n```ts\nb\n```\n// a.ts\n```ts\nsecond\n```";
        let parsed = parse_response(text);
        let paths: Vec<&str> = parsed.paths().collect();
        assert_eq!(paths, vec!["a.ts", "b.ts"]);
        assert_eq!(parsed.blocks[0].content, "second");
        assert_eq!(
            parsed.issues,
            vec![ParseIssue::DuplicatePath { path: "a.ts".into() }]
        );
    }

    #[test]
    fn issues_render_with_location() {
        let issue = ParseIssue::MissingImport {
            path: "a.tsx".into(),
            name: "clsx".into(),
            line: 3,
        };
        assert_eq!(issue.to_string(), "a.tsx:3: uses 'clsx' but does not import it.");
    }

    #[test]
    fn title_hint_rules() {
        assert_eq!(pr_title_hint("\n\n  Fix the header  \nmore"), "Fix the header");
        assert_eq!(pr_title_hint("   \n"), DEFAULT_PR_TITLE);
        assert_eq!(pr_title_hint(&"x".repeat(100)).chars().count(), 70);
    }

    #[test]
    fn description_truncates_and_lists_files() {
        let long = "d".repeat(MAX_PR_DESCRIPTION_CHARS + 10);
        let body = pr_description(&long, "", &["a.ts".to_string()]);
        assert!(body.contains("...(truncated)"));
        assert!(body.ends_with("- `a.ts`\n"));
        assert_eq!(pr_description("", "resp", &[]), "resp");
    }
}
