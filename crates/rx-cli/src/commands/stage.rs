use std::path::Path;

use rx_core::config::Config;
use serde_json::json;

use super::{build_session, flush_notices, print_json, read_input};

/// Run the `stage` subcommand: parse a response and open a pull request with
/// the chosen blocks.
pub async fn run(
    config: &Config,
    input: Option<&Path>,
    title: Option<String>,
    only: Vec<String>,
    branch: Option<String>,
    as_json: bool,
) -> anyhow::Result<()> {
    let session = build_session(config).await?;
    session.paste_response(read_input(input)?);
    let parsed = session.parse_response();
    flush_notices(&session);
    if parsed.blocks.is_empty() {
        anyhow::bail!("the response contains no file blocks");
    }

    if !only.is_empty() {
        session.deselect_all_parsed();
        for path in &only {
            if !session.toggle_parsed_file(path) {
                anyhow::bail!("{path} is not one of the parsed files");
            }
        }
    }

    if branch.is_some() {
        session.set_target_branch(branch);
    }
    let result = session.create_change(title).await;
    flush_notices(&session);
    let change = result?;

    if as_json {
        return print_json(&json!({
            "id": change.id,
            "url": change.url,
            "branch": change.branch,
            "files": session.selected_blocks().iter().map(|b| &b.path).collect::<Vec<_>>(),
        }));
    }
    println!("Pull request #{} on {}", change.id, change.branch);
    println!("{}", change.url);
    Ok(())
}
