//! CLI command implementations.
//!
//! Each `run_*` function opens the database from the config, performs one
//! operation and prints a human-readable result to stdout. Diagnostics go
//! through `tracing`.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::classify::classify_all;
use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::entity::parse_message;
use crate::indexer::{build_embeddings, index_stats};
use crate::inventory::{create_vehicle, list_vehicles};
use crate::leads::{create_lead, list_leads};
use crate::llm::create_chat_provider;
use crate::models::{format_price, NewLead, NewVehicle, VehicleStatus};
use crate::respond::{RespondRequest, Responder};
use crate::store::ScoredVehicle;

fn responder(config: &Config, pool: &SqlitePool) -> Result<Responder> {
    let embedder = create_provider(&config.embedding)?;
    let chat = create_chat_provider(&config.generation)?;
    Ok(Responder::over_sqlite(config, pool.clone(), embedder, chat))
}

/// Print the entities parsed from `message` as JSON. Needs no database.
pub fn run_parse(message: &str) -> Result<()> {
    let query = parse_message(message);
    println!("{}", serde_json::to_string_pretty(&query)?);
    Ok(())
}

pub async fn run_search(
    config: &Config,
    dealership_id: &str,
    message: &str,
    top_k: Option<usize>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let responder = responder(config, &pool)?;
    let query = parse_message(message);
    let retrieval = responder
        .retriever()
        .search(dealership_id, message, &query, top_k)
        .await?;

    if retrieval.vehicles.is_empty() {
        println!("No matching vehicles.");
    } else {
        print_vehicles(&retrieval.vehicles);
    }

    pool.close().await;
    Ok(())
}

fn print_vehicles(vehicles: &[ScoredVehicle]) {
    for (i, scored) in vehicles.iter().enumerate() {
        let v = &scored.vehicle;
        println!(
            "{}. [{:.2}] {} - {}",
            i + 1,
            scored.similarity_score,
            v.title(),
            format_price(v.price_value())
        );
        if let Some(mileage) = v.mileage {
            println!("    mileage: {}", mileage);
        }
        println!("    id: {}", v.id);
    }
}

pub async fn run_respond(
    config: &Config,
    dealership_id: &str,
    message: &str,
    customer_name: Option<String>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let responder = responder(config, &pool)?;

    let mut request = RespondRequest::new(dealership_id, message);
    request.customer_name = customer_name;
    let reply = responder.respond(request).await?;

    println!("{}", reply.response_text);
    println!();
    println!(
        "  ({} vehicles, {:?} prompt, generated by {:?}, quality {:.2})",
        reply.vehicles.len(),
        reply.prompt_kind,
        reply.generated_by,
        reply.quality.overall()
    );
    for suggestion in &reply.follow_up_suggestions {
        println!("  - {}", suggestion);
    }

    pool.close().await;
    Ok(())
}

pub async fn run_lead_add(config: &Config, dealership_id: &str, new: NewLead) -> Result<()> {
    let pool = db::connect(config).await?;
    let lead = create_lead(&pool, dealership_id, new).await?;
    println!("lead created");
    println!("  id: {}", lead.id);
    println!("  name: {}", lead.name);
    println!("  status: {}", lead.status);
    pool.close().await;
    Ok(())
}

pub async fn run_lead_list(config: &Config, dealership_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let leads = list_leads(&pool, dealership_id).await?;
    if leads.is_empty() {
        println!("No leads.");
    }
    for lead in &leads {
        println!(
            "{}  {:<20} {:<18} {}",
            lead.id,
            lead.name,
            lead.status.as_str(),
            db::format_ts_iso(lead.created_at)
        );
    }
    pool.close().await;
    Ok(())
}

pub async fn run_inventory_add(config: &Config, dealership_id: &str, new: NewVehicle) -> Result<()> {
    let pool = db::connect(config).await?;
    let vehicle = create_vehicle(&pool, dealership_id, new).await?;
    println!("vehicle created");
    println!("  id: {}", vehicle.id);
    println!("  {}", vehicle.format_for_embedding());
    pool.close().await;
    Ok(())
}

pub async fn run_inventory_list(
    config: &Config,
    dealership_id: &str,
    status: Option<VehicleStatus>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let vehicles = list_vehicles(&pool, dealership_id, status).await?;
    if vehicles.is_empty() {
        println!("No vehicles.");
    }
    for v in &vehicles {
        println!(
            "{}  {:<32} {:<12} {}",
            v.id,
            v.title(),
            v.price,
            v.status.as_str()
        );
    }
    pool.close().await;
    Ok(())
}

/// `embed pending` (only missing or stale rows) or `embed rebuild` (every row).
pub async fn run_embed(
    config: &Config,
    dealership_id: Option<&str>,
    force_rebuild: bool,
    batch_size_override: Option<usize>,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    let provider = create_provider(&config.embedding)?;
    let pool = db::connect(config).await?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    let report = build_embeddings(&pool, provider.as_ref(), dealership_id, force_rebuild, batch_size).await?;
    let stats = index_stats(&pool, dealership_id, provider.model_name()).await?;

    println!("{}", if force_rebuild { "embed rebuild" } else { "embed pending" });
    println!("  active vehicles: {}", report.total);
    println!("  embedded: {}", report.embedded);
    println!("  up to date: {}", report.skipped);
    println!("  failed: {}", report.failed);
    println!("  still pending: {}", stats.pending);

    pool.close().await;
    Ok(())
}

pub async fn run_classify(config: &Config, dealership_id: Option<&str>) -> Result<()> {
    let pool = db::connect(config).await?;
    let summary = classify_all(&pool, dealership_id).await?;
    println!("classify");
    println!("  processed: {}", summary.total_processed);
    println!("  updated: {}", summary.total_updated);
    for (status, count) in &summary.status_distribution {
        println!("  {}: {}", status, count);
    }
    pool.close().await;
    Ok(())
}
