//! Worker side of the request store: what an AI worker process uses to pick
//! up pending requests and report their outcome.

use std::path::Path;

use anyhow::Context;
use rx_core::config::Config;
use rx_core::request_store::RequestStore;
use rx_core::types::{AiRequestRecord, RequestStatus};
use tracing::info;
use uuid::Uuid;

use super::{open_sqlite, print_json, read_input};

fn require_shared_store(config: &Config) -> anyhow::Result<()> {
    if config.store.backend == "memory" {
        anyhow::bail!("request commands need a shared store; set [store] backend = \"sqlite\"");
    }
    Ok(())
}

async fn record(store: &impl RequestStore, id: Uuid) -> anyhow::Result<AiRequestRecord> {
    store
        .get(id)
        .await?
        .with_context(|| format!("request {id} not found"))
}

pub async fn pending(config: &Config, limit: usize, as_json: bool) -> anyhow::Result<()> {
    require_shared_store(config)?;
    let store = open_sqlite(config).await?;
    let records = store.list_pending(limit).await?;

    if as_json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No pending requests.");
        return Ok(());
    }
    for r in &records {
        let first_line = r.prompt.lines().next().unwrap_or("");
        println!(
            "{}  {}  {:<12} {}",
            r.id,
            r.created_at.format("%Y-%m-%d %H:%M:%S"),
            r.user_id,
            first_line.chars().take(60).collect::<String>()
        );
    }
    Ok(())
}

pub async fn show(config: &Config, id: Uuid, as_json: bool) -> anyhow::Result<()> {
    require_shared_store(config)?;
    let store = open_sqlite(config).await?;
    let r = record(&store, id).await?;

    if as_json {
        return print_json(&r);
    }
    println!("id:       {}", r.id);
    println!("status:   {}", r.status);
    println!("user:     {}", r.user_id);
    println!("created:  {}", r.created_at);
    println!("updated:  {}", r.updated_at);
    if let Some(err) = &r.error_message {
        println!("error:    {err}");
    }
    println!();
    println!("{}", r.prompt);
    if let Some(response) = &r.response {
        println!();
        println!("--- response ---");
        println!("{response}");
    }
    Ok(())
}

pub async fn start(config: &Config, id: Uuid) -> anyhow::Result<()> {
    update(config, id, RequestStatus::Processing, None, None).await
}

pub async fn complete(config: &Config, id: Uuid, response: Option<&Path>) -> anyhow::Result<()> {
    let text = read_input(response)?;
    if text.trim().is_empty() {
        anyhow::bail!("refusing to complete {id} with an empty response");
    }
    update(config, id, RequestStatus::Completed, Some(text), None).await
}

pub async fn fail(config: &Config, id: Uuid, message: String) -> anyhow::Result<()> {
    update(config, id, RequestStatus::Failed, None, Some(message)).await
}

async fn update(
    config: &Config,
    id: Uuid,
    status: RequestStatus,
    response: Option<String>,
    error_message: Option<String>,
) -> anyhow::Result<()> {
    require_shared_store(config)?;
    let store = open_sqlite(config).await?;
    let current = record(&store, id).await?;
    if current.status.is_terminal() {
        anyhow::bail!("request {id} is already {}", current.status);
    }
    let updated = store
        .update_status(id, status, response, error_message)
        .await?;
    info!(request_id = %id, status = %updated.status, "request updated");
    println!("{} -> {}", id, updated.status);
    Ok(())
}
