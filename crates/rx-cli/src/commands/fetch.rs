use rx_core::config::Config;
use rx_core::types::ImportCategory;
use serde_json::json;

use super::{build_session, flush_notices, print_json};

/// Run the `fetch` subcommand: fetch the tree and report highlights.
pub async fn run(
    config: &Config,
    branch: Option<String>,
    route: Option<String>,
    retry: bool,
    as_json: bool,
) -> anyhow::Result<()> {
    let session = build_session(config).await?;
    session.set_focus_route(route);

    let result = match (branch, retry) {
        (Some(b), _) => session.fetch_branch(b).await,
        (None, true) => session.retry_fetch().await,
        (None, false) => session.fetch().await,
    };
    flush_notices(&session);
    let outcome = result?;
    let state = session.snapshot();

    if as_json {
        return print_json(&json!({
            "file_count": outcome.file_count,
            "branch": outcome.branch,
            "highlights": state.highlights,
            "selected": state.selected_fetcher_files,
            "step": session.current_step(),
        }));
    }

    println!(
        "Fetched {} files{}",
        outcome.file_count,
        outcome
            .branch
            .as_deref()
            .map(|b| format!(" from {b}"))
            .unwrap_or_default()
    );
    match &state.highlights.primary {
        Some(p) => println!("  primary     {p}"),
        None => println!("  primary     (none)"),
    }
    for category in ImportCategory::ALL {
        for path in state.highlights.secondary_of(category) {
            println!("  {:<11} {path}", category.to_string());
        }
    }
    println!();
    println!("Selected ({}):", state.selected_fetcher_files.len());
    for path in &state.selected_fetcher_files {
        println!("  {path}");
    }
    println!();
    println!("{}", session.guidance());
    Ok(())
}
