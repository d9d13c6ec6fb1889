//! Route → page-file resolution and one-level import graph walking.
//!
//! Everything here is pure and never errors: absence is `None` or empty.
//! Tree paths may carry a leading `/`; matching ignores it, results use the
//! tree's own spelling.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::types::{FileNode, Highlights, ImportCategory};

const ROOT_CANDIDATES: [&str; 10] = [
    "app/page.tsx",
    "app/page.js",
    "app/index.tsx",
    "app/index.js",
    "src/app/page.tsx",
    "src/app/page.js",
    "page.tsx",
    "page.js",
    "index.tsx",
    "index.js",
];

const PAGE_SUFFIXES: [&str; 4] = ["page.tsx", "page.js", "index.tsx", "index.js"];

const ROUTE_PREFIXES: [&str; 3] = ["app/", "src/app/", ""];

const SUPPORTED_EXTENSIONS: [&str; 8] = [".ts", ".tsx", ".js", ".jsx", ".css", ".scss", ".json", ".md"];

const ALIAS_BASES: [&str; 3] = ["src/", "app/", ""];

const SEARCH_BASES: [&str; 12] = [
    "lib/",
    "utils/",
    "components/",
    "hooks/",
    "contexts/",
    "styles/",
    "src/lib/",
    "src/utils/",
    "src/components/",
    "src/hooks/",
    "src/contexts/",
    "src/styles/",
];

// ---------------------------------------------------------------------------
// Tree index
// ---------------------------------------------------------------------------

/// Lookup table from slash-stripped path to the tree's own spelling.
struct TreeIndex<'a> {
    by_clean: HashMap<&'a str, &'a str>,
}

impl<'a> TreeIndex<'a> {
    fn new(tree: &'a [FileNode]) -> Self {
        let mut by_clean: HashMap<&'a str, &'a str> = HashMap::with_capacity(tree.len());
        for node in tree {
            let clean = clean_path(&node.path);
            // Several spellings of the same path: keep the shortest.
            match by_clean.get(clean) {
                Some(existing) if existing.len() <= node.path.len() => {}
                _ => {
                    by_clean.insert(clean, node.path.as_str());
                }
            }
        }
        Self { by_clean }
    }

    fn lookup(&self, clean: &str) -> Option<&'a str> {
        self.by_clean.get(clean).copied()
    }

    fn clean_paths(&self) -> impl Iterator<Item = &&'a str> {
        self.by_clean.keys()
    }
}

fn clean_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

// ---------------------------------------------------------------------------
// Route resolution
// ---------------------------------------------------------------------------

/// Map a URL route (e.g. `/`, `/dashboard`, `/items/42`) to the page file
/// that renders it. Returns `None` when nothing in the tree matches.
pub fn resolve_highlight(logical_path: &str, tree: &[FileNode]) -> Option<String> {
    let index = TreeIndex::new(tree);
    let route = logical_path.trim().trim_matches('/');

    if route.is_empty() || route == "app" {
        return ROOT_CANDIDATES
            .iter()
            .find_map(|candidate| index.lookup(candidate))
            .map(str::to_string);
    }

    let route = route
        .strip_prefix("src/app/")
        .or_else(|| route.strip_prefix("app/"))
        .unwrap_or(route);

    for prefix in ROUTE_PREFIXES {
        for suffix in PAGE_SUFFIXES {
            let candidate = format!("{prefix}{route}/{suffix}");
            if let Some(found) = index.lookup(&candidate) {
                return Some(found.to_string());
            }
        }
    }

    let route_segments: Vec<&str> = route.split('/').collect();
    let mut dynamic: Vec<&str> = index
        .clean_paths()
        .filter(|clean| matches_dynamic_route(clean, &route_segments))
        .filter_map(|clean| index.lookup(clean))
        .collect();
    dynamic.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    match dynamic.first() {
        Some(found) => {
            debug!(route = %logical_path, page = %found, "dynamic route match");
            Some(found.to_string())
        }
        None => {
            debug!(route = %logical_path, "no page file for route");
            None
        }
    }
}

fn matches_dynamic_route(clean: &str, route_segments: &[&str]) -> bool {
    let Some(base) = PAGE_SUFFIXES
        .iter()
        .find_map(|suffix| clean.strip_suffix(suffix)?.strip_suffix('/'))
    else {
        return false;
    };
    let base = base
        .strip_prefix("src/app/")
        .or_else(|| base.strip_prefix("app/"))
        .unwrap_or(base);
    if base == "app" || base == "src/app" {
        return false;
    }

    let segments: Vec<&str> = base.split('/').collect();
    segments.len() == route_segments.len()
        && segments.iter().zip(route_segments).all(|(actual, input)| {
            actual == input || (actual.starts_with('[') && actual.ends_with(']'))
        })
}

// ---------------------------------------------------------------------------
// Import extraction
// ---------------------------------------------------------------------------

fn import_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"import\s*(?:[\w*{}\n\r\t, ]+from\s*)?["']((?:@[/\w.-]+)|(?:[./]+[\w./-]+))["']"#,
        )
        .ok()
    })
    .as_ref()
}

fn require_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"require\s*\(\s*["']((?:@[/\w.-]+)|(?:[./]+[\w./-]+))["']\s*\)"#).ok()
    })
    .as_ref()
}

/// Raw import specifiers of a source file, in source order, de-duplicated.
/// Only relative (`./`, `../`) and alias (`@…`) specifiers are returned.
pub fn extract_imports(content: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = import_regex()
        .into_iter()
        .chain(require_regex())
        .flat_map(|re| re.captures_iter(content))
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str()))
        .filter(|(_, spec)| *spec != ".")
        .collect();
    found.sort_by_key(|(pos, _)| *pos);

    let mut seen = BTreeSet::new();
    found
        .into_iter()
        .filter(|(_, spec)| seen.insert(*spec))
        .map(|(_, spec)| spec.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Import resolution
// ---------------------------------------------------------------------------

/// Resolve an import specifier found in `from_path` to a path in the tree.
pub fn resolve_import_path(specifier: &str, from_path: &str, tree: &[FileNode]) -> Option<String> {
    let index = TreeIndex::new(tree);
    resolve_with_index(specifier, from_path, &index).map(str::to_string)
}

fn resolve_with_index<'a>(specifier: &str, from_path: &str, index: &TreeIndex<'a>) -> Option<&'a str> {
    if let Some(rest) = specifier.strip_prefix("@/") {
        return ALIAS_BASES
            .iter()
            .find_map(|base| try_paths(&format!("{base}{rest}"), index));
    }

    if specifier.starts_with('.') {
        let from = clean_path(from_path);
        let dir = from.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let joined = if dir.is_empty() {
            specifier.to_string()
        } else {
            format!("{dir}/{specifier}")
        };
        return try_paths(&normalize(&joined), index);
    }

    SEARCH_BASES
        .iter()
        .find_map(|base| try_paths(&format!("{base}{specifier}"), index))
}

/// Collapse `.` and `..` segments; `..` above the root is dropped.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn has_explicit_extension(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_alphanumeric() || c == '_')
        }
        None => false,
    }
}

fn try_paths<'a>(base: &str, index: &TreeIndex<'a>) -> Option<&'a str> {
    if has_explicit_extension(base) {
        if let Some(found) = index.lookup(base) {
            return Some(found);
        }
    }
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| format!("{base}{ext}"))
        .chain(SUPPORTED_EXTENSIONS.iter().map(|ext| format!("{base}/index{ext}")))
        .find_map(|candidate| index.lookup(&candidate))
}

// ---------------------------------------------------------------------------
// Categorisation
// ---------------------------------------------------------------------------

/// Classify a resolved path by the directory it lives in.
pub fn categorize(path: &str) -> ImportCategory {
    let lower = format!("/{}", clean_path(path).to_lowercase());
    if lower.contains("/contexts/") {
        ImportCategory::Context
    } else if lower.contains("/hooks/") {
        ImportCategory::Hook
    } else if lower.contains("/lib/") {
        ImportCategory::Lib
    } else if lower.contains("/components/") && !lower.contains("/components/ui/") {
        ImportCategory::Component
    } else {
        ImportCategory::Other
    }
}

// ---------------------------------------------------------------------------
// Highlights
// ---------------------------------------------------------------------------

/// Highlights of one fetch plus the paths selected automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightResult {
    pub highlights: Highlights,
    pub auto_selected: BTreeSet<String>,
}

/// Resolve `logical_path` to its page file and walk that file's imports one
/// level deep.
pub fn compute_highlights(
    logical_path: &str,
    tree: &[FileNode],
    important_files: &[String],
) -> HighlightResult {
    let primary = resolve_highlight(logical_path, tree);
    highlights_from_primary(primary.as_deref(), tree, important_files)
}

/// Same as [`compute_highlights`] with an already known primary path, which
/// must exist in the tree to be used.
pub fn highlights_from_primary(
    primary: Option<&str>,
    tree: &[FileNode],
    important_files: &[String],
) -> HighlightResult {
    let index = TreeIndex::new(tree);
    let primary_path = primary.and_then(|p| index.lookup(clean_path(p)));

    let mut secondary: BTreeMap<ImportCategory, Vec<String>> = BTreeMap::new();
    if let Some(primary_path) = primary_path {
        let content = tree
            .iter()
            .find(|n| n.path == primary_path)
            .map(|n| n.content.as_str())
            .unwrap_or_default();

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for specifier in extract_imports(content) {
            match resolve_with_index(&specifier, primary_path, &index) {
                Some(resolved) if resolved != primary_path => {
                    if seen.insert(resolved) {
                        secondary
                            .entry(categorize(resolved))
                            .or_default()
                            .push(resolved.to_string());
                    }
                }
                Some(_) => {}
                None => debug!(specifier = %specifier, from = %primary_path, "unresolved import"),
            }
        }
    }

    let mut auto_selected: BTreeSet<String> = BTreeSet::new();
    if let Some(primary_path) = primary_path {
        auto_selected.insert(primary_path.to_string());
    }
    for (category, paths) in &secondary {
        if category.is_auto_selectable() {
            auto_selected.extend(paths.iter().cloned());
        }
    }
    auto_selected.extend(
        important_files
            .iter()
            .filter_map(|important| index.lookup(clean_path(important)))
            .map(str::to_string),
    );

    HighlightResult {
        highlights: Highlights {
            primary: primary_path.map(str::to_string),
            secondary,
        },
        auto_selected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(paths: &[&str]) -> Vec<FileNode> {
        paths.iter().map(|p| FileNode::new(*p, "")).collect()
    }

    #[test]
    fn root_route_prefers_app_page() {
        let t = tree(&["page.tsx", "app/page.tsx", "src/app/page.tsx"]);
        assert_eq!(resolve_highlight("/", &t).as_deref(), Some("app/page.tsx"));
        assert_eq!(resolve_highlight("", &t).as_deref(), Some("app/page.tsx"));
    }

    #[test]
    fn leading_slash_is_preserved_in_result() {
        let t = tree(&["/page.tsx", "/components/Card.tsx"]);
        assert_eq!(resolve_highlight("/", &t).as_deref(), Some("/page.tsx"));
    }

    #[test]
    fn nested_route_and_dynamic_segment() {
        let t = tree(&["app/dashboard/page.tsx", "app/items/[id]/page.tsx"]);
        assert_eq!(
            resolve_highlight("/dashboard", &t).as_deref(),
            Some("app/dashboard/page.tsx")
        );
        assert_eq!(
            resolve_highlight("/items/42", &t).as_deref(),
            Some("app/items/[id]/page.tsx")
        );
        assert_eq!(resolve_highlight("/items/42/edit", &t), None);
    }

    #[test]
    fn unknown_route_has_no_fallback_guess() {
        let t = tree(&["app/page.tsx"]);
        assert_eq!(resolve_highlight("/missing", &t), None);
    }

    #[test]
    fn extract_keeps_order_and_skips_packages() {
        let src = r#"
import React from "react";
import { Card } from "@/components/Card";
import "./styles.css";
const x = require('../lib/x');
import { Card as C2 } from "@/components/Card";
import "."
"#;
        assert_eq!(
            extract_imports(src),
            vec!["@/components/Card", "./styles.css", "../lib/x"]
        );
    }

    #[test]
    fn resolves_relative_alias_and_index() {
        let t = tree(&[
            "app/page.tsx",
            "app/styles.css",
            "lib/x.ts",
            "src/components/Card.tsx",
            "hooks/useThing/index.ts",
        ]);
        assert_eq!(
            resolve_import_path("./styles.css", "app/page.tsx", &t).as_deref(),
            Some("app/styles.css")
        );
        assert_eq!(
            resolve_import_path("../lib/x", "app/page.tsx", &t).as_deref(),
            Some("lib/x.ts")
        );
        assert_eq!(
            resolve_import_path("@/components/Card", "app/page.tsx", &t).as_deref(),
            Some("src/components/Card.tsx")
        );
        assert_eq!(
            resolve_import_path("@/hooks/useThing", "app/page.tsx", &t).as_deref(),
            Some("hooks/useThing/index.ts")
        );
        assert_eq!(resolve_import_path("./nope", "app/page.tsx", &t), None);
    }

    #[test]
    fn extension_priority_prefers_ts() {
        let t = tree(&["lib/util.js", "lib/util.ts"]);
        assert_eq!(
            resolve_import_path("@/lib/util", "page.tsx", &t).as_deref(),
            Some("lib/util.ts")
        );
    }

    #[test]
    fn categorize_by_directory() {
        assert_eq!(categorize("contexts/AppContext.tsx"), ImportCategory::Context);
        assert_eq!(categorize("/src/Hooks/useX.ts"), ImportCategory::Hook);
        assert_eq!(categorize("lib/db.ts"), ImportCategory::Lib);
        assert_eq!(categorize("components/Card.tsx"), ImportCategory::Component);
        assert_eq!(categorize("components/ui/button.tsx"), ImportCategory::Other);
        assert_eq!(categorize("styles/globals.css"), ImportCategory::Other);
    }
}
