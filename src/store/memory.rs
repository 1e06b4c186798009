use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{sort_scored, ScoredVehicle, VehicleStore};
use crate::embedding::cosine_similarity;
use crate::filter::VehicleFilter;
use crate::models::Vehicle;

struct Entry {
    vehicle: Vehicle,
    embedding: Option<Vec<f32>>,
}

/// Rows and vectors held in memory; same semantics as the SQLite store.
#[derive(Default)]
pub struct InMemoryVehicleStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryVehicleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row and its optional embedding.
    pub async fn upsert(&self, vehicle: Vehicle, embedding: Option<Vec<f32>>) {
        let mut entries = self.entries.write().await;
        entries.insert(vehicle.id.clone(), Entry { vehicle, embedding });
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.entries.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl VehicleStore for InMemoryVehicleStore {
    async fn similarity_search(
        &self,
        filter: &VehicleFilter,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredVehicle>> {
        let entries = self.entries.read().await;

        let mut results: Vec<ScoredVehicle> = entries
            .values()
            .filter(|e| filter.matches(&e.vehicle))
            .filter_map(|e| {
                let embedding = e.embedding.as_ref()?;
                if embedding.len() != query_vec.len() {
                    return None;
                }
                Some(ScoredVehicle {
                    vehicle: e.vehicle.clone(),
                    similarity_score: cosine_similarity(query_vec, embedding) as f64,
                    formatted_text: e.vehicle.format_for_embedding(),
                })
            })
            .collect();

        sort_scored(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn filtered_vehicles(
        &self,
        filter: &VehicleFilter,
        limit: usize,
    ) -> Result<Vec<Vehicle>> {
        let entries = self.entries.read().await;

        let mut vehicles: Vec<Vehicle> = entries
            .values()
            .filter(|e| filter.matches(&e.vehicle))
            .map(|e| e.vehicle.clone())
            .collect();

        vehicles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        vehicles.truncate(limit);
        Ok(vehicles)
    }
}
