//! Review checks run on every parsed block before it can be staged:
//! placeholder markers left by the assistant, React client components
//! missing their `"use client"` directive, and well-known identifiers used
//! without an import. Findings are advisory and never drop a block.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::response_parser::ParseIssue;
use crate::types::FileBlock;

/// Blocks with generated names have no file to check against.
pub const PLACEHOLDER_PREFIX: &str = "unnamed-";

struct ImportCheck {
    name: &'static str,
    usage: Regex,
    import: Regex,
}

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

fn client_hook_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(
            r"\b(useState|useEffect|useRef|useContext|useReducer|useCallback|useMemo|useLayoutEffect|useImperativeHandle|useDebugValue)\s*\(",
        )
    })
    .as_ref()
}

fn event_handler_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile(r"\bon[A-Z][a-zA-Z]*\s*=\s*\{")).as_ref()
}

fn skipped_code_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile(r"/\*\s*\.{3}\s*\*/")).as_ref()
}

/// `// ...` placeholders; group 1 matches the `(` of an annotated one such
/// as `// ... (keep existing styles)`, which is allowed.
fn skipped_comment_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile(r"//\s*\.{3}\s*(\()?")).as_ref()
}

fn import_checks() -> &'static [ImportCheck] {
    static CHECKS: OnceLock<Vec<ImportCheck>> = OnceLock::new();
    CHECKS.get_or_init(|| {
        [
            (
                "motion",
                r"<motion\.",
                r#"import .* from ['"]framer-motion['"]"#,
            ),
            ("clsx", r"\bclsx\(", r#"import clsx from ['"]clsx['"]"#),
            (
                "React",
                r"\bReact\.(useState|useEffect|useRef|useContext|useCallback|useMemo|Fragment|createElement)",
                r#"import\s+(\*\s+as\s+React|React(,\s*\{[^}]*\})?)\s+from\s+['"]react['"]"#,
            ),
        ]
        .into_iter()
        .filter_map(|(name, usage, import)| {
            Some(ImportCheck {
                name,
                usage: compile(usage)?,
                import: compile(import)?,
            })
        })
        .collect()
    })
}

fn is_component(path: &str) -> bool {
    path.ends_with(".tsx") || path.ends_with(".jsx")
}

/// 1-based line of byte offset `at`.
fn line_of(content: &str, at: usize) -> usize {
    content[..at].matches('\n').count() + 1
}

fn has_use_client(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.trim_end_matches(';'))
        .is_some_and(|l| l == "\"use client\"" || l == "'use client'")
}

/// First client-only feature used in `content`, with its byte offset.
fn first_client_feature(content: &str) -> Option<(String, usize)> {
    let hook = client_hook_regex()
        .and_then(|re| re.captures(content))
        .and_then(|caps| Some((caps.get(1)?.as_str().to_string(), caps.get(0)?.start())));
    let handler = event_handler_regex()
        .and_then(|re| re.find(content))
        .map(|m| ("event handler".to_string(), m.start()));
    match (hook, handler) {
        (Some(h), Some(e)) => Some(if h.1 <= e.1 { h } else { e }),
        (h, e) => h.or(e),
    }
}

/// Run every check on one block.
pub fn check_block(block: &FileBlock) -> Vec<ParseIssue> {
    let path = block.path.as_str();
    if path.starts_with(PLACEHOLDER_PREFIX) {
        return Vec::new();
    }
    let content = block.content.as_str();
    let mut issues = Vec::new();

    if is_component(path) && !has_use_client(content) {
        if let Some((feature, at)) = first_client_feature(content) {
            issues.push(ParseIssue::MissingUseClient {
                path: path.to_string(),
                feature,
                line: line_of(content, at),
            });
        }
    }

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if skipped_code_regex().is_some_and(|re| re.is_match(line)) {
            issues.push(ParseIssue::SkippedCode {
                path: path.to_string(),
                line: line_no,
            });
        }
        let bare_placeholder = skipped_comment_regex()
            .and_then(|re| re.captures(line))
            .is_some_and(|caps| caps.get(1).is_none());
        if bare_placeholder {
            issues.push(ParseIssue::SkippedComment {
                path: path.to_string(),
                line: line_no,
            });
        }
    }

    if is_component(path) {
        for check in import_checks() {
            let Some(used) = check.usage.find(content) else {
                continue;
            };
            if !check.import.is_match(content) {
                issues.push(ParseIssue::MissingImport {
                    path: path.to_string(),
                    name: check.name.to_string(),
                    line: line_of(content, used.start()),
                });
            }
        }
    }

    if !issues.is_empty() {
        debug!(path = %path, issues = issues.len(), "block checks found issues");
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(path: &str, content: &str) -> FileBlock {
        FileBlock {
            path: path.into(),
            content: content.into(),
            language: None,
        }
    }

    #[test]
    fn hook_without_directive_is_flagged_at_first_use() {
        let issues = check_block(&block(
            "components/Counter.tsx",
            "import { useState } from 'react';\n\nexport function Counter() {\n  const [n] = useState(0);\n  return n;\n}",
        ));
        assert_eq!(
            issues,
            vec![ParseIssue::MissingUseClient {
                path: "components/Counter.tsx".into(),
                feature: "useState".into(),
                line: 4,
            }]
        );
    }

    #[test]
    fn directive_present_or_non_component_passes() {
        let with_directive = "\"use client\";\nconst [n] = useState(0);";
        assert!(check_block(&block("a.tsx", with_directive)).is_empty());
        let single_quoted = "\n'use client'\n<button onClick={go} />";
        assert!(check_block(&block("a.jsx", single_quoted)).is_empty());
        assert!(check_block(&block("hooks/useX.ts", "useEffect(() => {});")).is_empty());
    }

    #[test]
    fn event_handler_counts_as_client_feature() {
        let issues = check_block(&block("b.tsx", "export const B = () => <a onClick={go} />;"));
        assert!(matches!(
            &issues[..],
            [ParseIssue::MissingUseClient { feature, line: 1, .. }] if feature == "event handler"
        ));
    }

    #[test]
    fn placeholders_are_reported_per_line() {
        let content = "const a = 1;\n/* ... */\n// ...\n// ... (keep existing styles)\nconst b = [/* ... */];";
        let issues = check_block(&block("lib/a.ts", content));
        assert_eq!(
            issues,
            vec![
                ParseIssue::SkippedCode { path: "lib/a.ts".into(), line: 2 },
                ParseIssue::SkippedComment { path: "lib/a.ts".into(), line: 3 },
                ParseIssue::SkippedCode { path: "lib/a.ts".into(), line: 5 },
            ]
        );
    }

    #[test]
    fn missing_imports_are_named() {
        let content = "\"use client\";\nexport const X = () => <motion.div className={clsx('a')} />;";
        let names: Vec<String> = check_block(&block("x.tsx", content))
            .into_iter()
            .filter_map(|i| match i {
                ParseIssue::MissingImport { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["motion", "clsx"]);

        let imported = "\"use client\";\nimport { motion } from \"framer-motion\";\nimport clsx from 'clsx';\nimport React from 'react';\nexport const X = () => <motion.div className={clsx('a')}>{React.Fragment}</motion.div>;";
        assert!(check_block(&block("x.tsx", imported)).is_empty());
    }

    #[test]
    fn placeholder_blocks_are_skipped() {
        assert!(check_block(&block("unnamed-2", "/* ... */\nuseState(")).is_empty());
    }
}
