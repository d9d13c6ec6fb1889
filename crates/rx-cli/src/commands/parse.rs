use std::path::Path;

use rx_core::response_parser::{parse_response, pr_title_hint};
use serde_json::json;

use super::{print_json, read_input};

/// Run the `parse` subcommand: list the file blocks found in a response.
pub fn run(input: Option<&Path>, as_json: bool) -> anyhow::Result<()> {
    let text = read_input(input)?;
    let parsed = parse_response(&text);

    if as_json {
        return print_json(&json!({
            "title": pr_title_hint(&text),
            "description": parsed.description,
            "blocks": parsed.blocks,
            "issues": parsed.issues,
        }));
    }

    if parsed.blocks.is_empty() {
        println!("No code blocks found.");
    }
    for block in &parsed.blocks {
        println!(
            "{:<50} {:>6} lines  {}",
            block.path,
            block.content.lines().count(),
            block.language.as_deref().unwrap_or("-")
        );
    }
    for issue in &parsed.issues {
        eprintln!("[warn] {issue}");
    }
    Ok(())
}
