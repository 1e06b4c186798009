//! Vector store over inventory rows.
//!
//! A [`VehicleStore`] answers two questions for the retriever: which rows
//! survive a [`VehicleFilter`], and how similar each surviving row's
//! embedding is to a query vector. Two backends:
//!
//! - [`SqliteVehicleStore`]: the filter's SQL rendering joined with
//!   `vehicle_embeddings`; cosine similarity is computed in Rust.
//! - [`InMemoryVehicleStore`]: rows and vectors held in memory, filtered with
//!   [`VehicleFilter::matches`].
//!
//! Both return results ordered by score (desc), then year (desc), then id.

mod memory;
mod sqlite;

pub use memory::InMemoryVehicleStore;
pub use sqlite::SqliteVehicleStore;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::cmp::Ordering;

use crate::filter::VehicleFilter;
use crate::models::Vehicle;

/// A retrieved vehicle with its similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredVehicle {
    pub vehicle: Vehicle,
    pub similarity_score: f64,
    /// The text that was embedded for this row.
    pub formatted_text: String,
}

#[async_trait]
pub trait VehicleStore: Send + Sync {
    /// Rows surviving `filter` that have an embedding, best `limit` by
    /// cosine similarity to `query_vec`. Embeddings whose dimensionality
    /// differs from the query are skipped.
    async fn similarity_search(
        &self,
        filter: &VehicleFilter,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredVehicle>>;

    /// Rows surviving `filter`, newest first, at most `limit`.
    async fn filtered_vehicles(&self, filter: &VehicleFilter, limit: usize)
        -> Result<Vec<Vehicle>>;
}

/// Order by score desc, then year desc, then id asc.
pub fn sort_scored(results: &mut [ScoredVehicle]) {
    results.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.vehicle.year.cmp(&a.vehicle.year))
            .then_with(|| a.vehicle.id.cmp(&b.vehicle.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VehicleStatus;

    fn scored(id: &str, year: i64, score: f64) -> ScoredVehicle {
        ScoredVehicle {
            vehicle: Vehicle {
                id: id.to_string(),
                dealership_id: "d1".to_string(),
                make: "Honda".to_string(),
                model: "Civic".to_string(),
                year,
                price: "$20,000".to_string(),
                mileage: None,
                description: None,
                features: None,
                condition: None,
                status: VehicleStatus::Active,
                created_at: 0,
                updated_at: 0,
            },
            similarity_score: score,
            formatted_text: String::new(),
        }
    }

    #[test]
    fn test_sort_scored_tie_breaks() {
        let mut results = vec![
            scored("b", 2020, 0.5),
            scored("a", 2020, 0.5),
            scored("c", 2022, 0.5),
            scored("d", 2019, 0.9),
        ];
        sort_scored(&mut results);
        let ids: Vec<&str> = results.iter().map(|r| r.vehicle.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c", "a", "b"]);
    }
}
