use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{sort_scored, ScoredVehicle, VehicleStore};
use crate::embedding::{blob_to_vec, cosine_similarity};
use crate::filter::{bind_params, VehicleFilter};
use crate::inventory::{vehicle_from_row, VEHICLE_COLUMNS};
use crate::models::Vehicle;

/// Store backed by the `inventory` and `vehicle_embeddings` tables.
#[derive(Clone)]
pub struct SqliteVehicleStore {
    pool: SqlitePool,
}

impl SqliteVehicleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleStore for SqliteVehicleStore {
    async fn similarity_search(
        &self,
        filter: &VehicleFilter,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredVehicle>> {
        let (where_sql, params) = filter.to_sql("i");
        let sql = format!(
            "SELECT {}, e.embedding, e.formatted_text \
             FROM inventory i JOIN vehicle_embeddings e ON e.inventory_id = i.id \
             WHERE {}",
            VEHICLE_COLUMNS, where_sql
        );

        let rows = bind_params(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await?;
        let candidates = rows.len();

        let mut results = Vec::new();
        for row in &rows {
            let vehicle = vehicle_from_row(row)?;
            if !filter.matches(&vehicle) {
                continue;
            }

            let blob: Vec<u8> = row.get("embedding");
            let embedding = blob_to_vec(&blob);
            if embedding.len() != query_vec.len() {
                continue;
            }

            results.push(ScoredVehicle {
                similarity_score: cosine_similarity(query_vec, &embedding) as f64,
                formatted_text: row.get("formatted_text"),
                vehicle,
            });
        }

        debug!(candidates, matched = results.len(), "similarity search");
        sort_scored(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn filtered_vehicles(
        &self,
        filter: &VehicleFilter,
        limit: usize,
    ) -> Result<Vec<Vehicle>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let (where_sql, params) = filter.to_sql("i");
        let mut sql = format!(
            "SELECT {} FROM inventory i WHERE {} ORDER BY i.created_at DESC, i.id ASC",
            VEHICLE_COLUMNS, where_sql
        );
        // A price post-filter may drop rows, so the limit is applied after it
        if !filter.needs_post_filter() {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let rows = bind_params(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await?;

        let mut vehicles = Vec::with_capacity(rows.len().min(limit));
        for row in &rows {
            let vehicle = vehicle_from_row(row)?;
            if filter.matches(&vehicle) {
                vehicles.push(vehicle);
            }
            if vehicles.len() == limit {
                break;
            }
        }
        Ok(vehicles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::embed_query;
    use crate::indexer::build_embeddings;
    use crate::indexer::tests::KeywordEmbedder;
    use crate::inventory::create_vehicle;
    use crate::migrate::test_pool;
    use crate::models::{NewVehicle, VehicleStatus};

    fn new_vehicle(make: &str, model: &str) -> NewVehicle {
        NewVehicle {
            make: make.to_string(),
            model: model.to_string(),
            year: 2021,
            price: "$25,000".to_string(),
            mileage: None,
            description: None,
            features: None,
            condition: None,
            status: VehicleStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_limit_keeps_best_scores() {
        let pool = test_pool().await;
        let embedder = KeywordEmbedder::new();
        for (make, model) in [("Honda", "Civic"), ("Toyota", "Camry"), ("Volkswagen", "Tiguan")] {
            create_vehicle(&pool, "d1", new_vehicle(make, model)).await.unwrap();
        }
        build_embeddings(&pool, &embedder, Some("d1"), false, 10).await.unwrap();

        let store = SqliteVehicleStore::new(pool);
        let filter = VehicleFilter::scope("d1");
        let query = embed_query(&embedder, "tiguan").await.unwrap();

        // The best match was inserted last, so it is only found if every row is scored
        let top = store.similarity_search(&filter, &query, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].vehicle.model, "Tiguan");

        let all = store.similarity_search(&filter, &query, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].similarity_score > all[1].similarity_score);
    }
}
