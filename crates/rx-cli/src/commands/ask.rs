use std::time::Duration;

use rx_core::config::Config;
use rx_orchestrator::WorkflowSession;
use serde_json::json;
use tracing::{info, warn};

use super::{build_session, flush_notices, print_json, print_notice};

pub struct AskOptions {
    pub task: String,
    pub route: Option<String>,
    pub files: Vec<String>,
    pub print_only: bool,
    pub wait_secs: u64,
}

/// Run the `ask` subcommand: fetch, assemble the request and either print it
/// or queue it and wait for the worker's answer.
pub async fn run(config: &Config, opts: AskOptions, as_json: bool) -> anyhow::Result<()> {
    let session = build_session(config).await?;
    session.set_focus_route(opts.route);

    let fetched = session.fetch().await;
    flush_notices(&session);
    fetched?;

    for path in &opts.files {
        let selected = session.state().read(|s| s.selected_fetcher_files.contains(path));
        if !selected {
            session.toggle_file(path);
        }
    }
    session.set_request_text(opts.task);
    session.add_selected_to_request();
    flush_notices(&session);

    if opts.print_only {
        if let Some(text) = session.copy_request() {
            println!("{text}");
        }
        flush_notices(&session);
        return Ok(());
    }

    let submitted = session.submit_request().await;
    flush_notices(&session);
    let Some(id) = submitted.request_id else {
        anyhow::bail!(
            "request was not queued: {}",
            submitted.error.unwrap_or_default()
        );
    };
    if let Some(err) = &submitted.error {
        warn!(request_id = %id, error = %err, "queued without a live subscription");
        println!("Queued request {id}; the answer will not be delivered here.");
        return Ok(());
    }
    info!(request_id = %id, "request queued");
    eprintln!("Queued request {id}, waiting for the worker...");

    let waited = tokio::time::timeout(Duration::from_secs(opts.wait_secs), wait_for_answer(&session)).await;
    flush_notices(&session);
    if waited.is_err() {
        session.abandon_request();
        anyhow::bail!(
            "no answer for request {id} after {}s; it stays queued",
            opts.wait_secs
        );
    }

    let response = session.ai_response();
    if response.is_empty() {
        anyhow::bail!("request {id} finished without a response");
    }
    if as_json {
        return print_json(&json!({ "request_id": id, "response": response }));
    }
    println!("{response}");
    Ok(())
}

/// Relay notices until the session stops tracking the request.
async fn wait_for_answer(session: &WorkflowSession) {
    let notices = session.notices();
    loop {
        if session.state().read(|s| s.tracked_request.is_none()) {
            return;
        }
        tokio::select! {
            notice = notices.recv_async() => match notice {
                Ok(n) => print_notice(&n),
                Err(_) => return,
            },
            _ = tokio::time::sleep(Duration::from_millis(250)) => {}
        }
    }
}
