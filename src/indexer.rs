//! Embedding index maintenance for inventory rows.
//!
//! A row is pending when it is active and has no embedding, or its stored
//! embedding was made by another model or from different text (the
//! `content_hash` is the SHA-256 of [`Vehicle::format_for_embedding`]).
//! Batches that fail upstream are counted and skipped; the rows stay pending.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::db::now_ts;
use crate::embedding::{vec_to_blob, EmbeddingProvider};
use crate::error::ShowroomError;
use crate::inventory::{find_vehicle, vehicle_from_row, VEHICLE_COLUMNS};
use crate::models::{Vehicle, VehicleStatus};

/// Outcome of one build run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    /// Active rows considered.
    pub total: usize,
    pub embedded: usize,
    /// Rows whose embedding was already current.
    pub skipped: usize,
    pub failed: usize,
}

/// Embedding coverage for a dealership (or all of them).
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_vehicles: i64,
    pub active_vehicles: i64,
    pub embedded: i64,
    pub pending: i64,
    /// Models that produced the stored vectors.
    pub models: Vec<String>,
}

struct PendingVehicle {
    vehicle: Vehicle,
    text: String,
    text_hash: String,
}

pub fn hash_text(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn ensure_enabled(provider: &dyn EmbeddingProvider) -> Result<()> {
    if provider.is_enabled() {
        Ok(())
    } else {
        Err(ShowroomError::EmbeddingsDisabled(
            "set [embedding] provider in config".to_string(),
        )
        .into())
    }
}

/// Embed pending rows. With `force_rebuild`, every active row in scope is
/// re-embedded.
pub async fn build_embeddings(
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    dealership_id: Option<&str>,
    force_rebuild: bool,
    batch_size: usize,
) -> Result<BuildReport> {
    ensure_enabled(provider)?;

    let (pending, total) = find_pending(pool, provider.model_name(), dealership_id, force_rebuild).await?;
    let mut report = BuildReport {
        total,
        skipped: total - pending.len(),
        ..Default::default()
    };

    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();

        match provider.embed(&texts).await {
            Ok(vectors) => {
                for (item, vec) in batch.iter().zip(vectors.iter()) {
                    upsert_embedding(pool, item, provider.model_name(), vec).await?;
                    report.embedded += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, batch = batch.len(), "embedding batch failed");
                report.failed += batch.len();
            }
        }
    }

    info!(
        dealership_id = dealership_id.unwrap_or("*"),
        force_rebuild,
        total = report.total,
        embedded = report.embedded,
        failed = report.failed,
        "embedding build finished"
    );
    Ok(report)
}

/// Re-embed one row now. Returns false when the row is not active (its
/// stale embedding, if any, is removed).
pub async fn refresh_vehicle(
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    inventory_id: &str,
) -> Result<bool> {
    ensure_enabled(provider)?;

    let vehicle = find_vehicle(pool, inventory_id)
        .await?
        .ok_or_else(|| ShowroomError::not_found(format!("vehicle {}", inventory_id)))?;

    if vehicle.status != VehicleStatus::Active {
        sqlx::query("DELETE FROM vehicle_embeddings WHERE inventory_id = ?")
            .bind(inventory_id)
            .execute(pool)
            .await?;
        return Ok(false);
    }

    let text = vehicle.format_for_embedding();
    let vectors = provider.embed(std::slice::from_ref(&text)).await?;
    let vec = vectors
        .into_iter()
        .next()
        .ok_or_else(|| ShowroomError::Upstream("empty embedding response".to_string()))?;

    let item = PendingVehicle {
        text_hash: hash_text(&text),
        text,
        vehicle,
    };
    upsert_embedding(pool, &item, provider.model_name(), &vec).await?;
    Ok(true)
}

pub async fn index_stats(
    pool: &SqlitePool,
    dealership_id: Option<&str>,
    model: &str,
) -> Result<IndexStats> {
    let total_vehicles: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory WHERE (? IS NULL OR dealership_id = ?)")
            .bind(dealership_id)
            .bind(dealership_id)
            .fetch_one(pool)
            .await?;

    let active_vehicles: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM inventory WHERE status = 'active' AND (? IS NULL OR dealership_id = ?)",
    )
    .bind(dealership_id)
    .bind(dealership_id)
    .fetch_one(pool)
    .await?;

    let embedded: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM vehicle_embeddings WHERE (? IS NULL OR dealership_id = ?)",
    )
    .bind(dealership_id)
    .bind(dealership_id)
    .fetch_one(pool)
    .await?;

    let models: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT model FROM vehicle_embeddings WHERE (? IS NULL OR dealership_id = ?) ORDER BY model",
    )
    .bind(dealership_id)
    .bind(dealership_id)
    .fetch_all(pool)
    .await?;

    let (pending, _) = find_pending(pool, model, dealership_id, false).await?;

    Ok(IndexStats {
        total_vehicles,
        active_vehicles,
        embedded,
        pending: pending.len() as i64,
        models,
    })
}

/// Pending rows plus the number of active rows considered.
async fn find_pending(
    pool: &SqlitePool,
    model: &str,
    dealership_id: Option<&str>,
    force_rebuild: bool,
) -> Result<(Vec<PendingVehicle>, usize)> {
    let sql = format!(
        "SELECT {}, e.model AS embedding_model, e.content_hash AS content_hash \
         FROM inventory i LEFT JOIN vehicle_embeddings e ON e.inventory_id = i.id \
         WHERE i.status = 'active' AND (? IS NULL OR i.dealership_id = ?) \
         ORDER BY i.dealership_id, i.created_at",
        VEHICLE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(dealership_id)
        .bind(dealership_id)
        .fetch_all(pool)
        .await?;

    let total = rows.len();
    let mut pending = Vec::new();
    for row in &rows {
        let vehicle = vehicle_from_row(row)?;
        let text = vehicle.format_for_embedding();
        let text_hash = hash_text(&text);

        let stored_model: Option<String> = row.get("embedding_model");
        let stored_hash: Option<String> = row.get("content_hash");
        let current = stored_model.as_deref() == Some(model)
            && stored_hash.as_deref() == Some(text_hash.as_str());

        if force_rebuild || !current {
            pending.push(PendingVehicle {
                vehicle,
                text,
                text_hash,
            });
        }
    }

    Ok((pending, total))
}

async fn upsert_embedding(
    pool: &SqlitePool,
    item: &PendingVehicle,
    model: &str,
    vec: &[f32],
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO vehicle_embeddings
            (inventory_id, dealership_id, model, dims, content_hash, formatted_text, embedding, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(inventory_id) DO UPDATE SET
            dealership_id = excluded.dealership_id,
            model = excluded.model,
            dims = excluded.dims,
            content_hash = excluded.content_hash,
            formatted_text = excluded.formatted_text,
            embedding = excluded.embedding,
            created_at = excluded.created_at
        "#,
    )
    .bind(&item.vehicle.id)
    .bind(&item.vehicle.dealership_id)
    .bind(model)
    .bind(vec.len() as i64)
    .bind(&item.text_hash)
    .bind(&item.text)
    .bind(vec_to_blob(vec))
    .bind(now_ts())
    .execute(pool)
    .await?;

    Ok(())
}
