//! Hybrid retrieval: metadata filter first, vector ranking second.
//!
//! # Pipeline
//!
//! ```text
//! VehicleQuery ──▶ VehicleFilter ──▶ VehicleStore ──▶ boost ──▶ threshold ──▶ top-k
//!                  (scope only for     (cosine, or      (+make_boost
//!                   weak queries)       1.0 filter-only)  on exact make)
//! ```
//!
//! With the embedding provider disabled the retriever runs in filter-only
//! mode: every row surviving the filter scores `1.0`, and a query without
//! strong signals returns nothing rather than the whole lot.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::entity::VehicleQuery;
use crate::error::ShowroomError;
use crate::filter::VehicleFilter;
use crate::store::{sort_scored, ScoredVehicle, VehicleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Vector,
    FilterOnly,
}

#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub vehicles: Vec<ScoredVehicle>,
    pub mode: RetrievalMode,
    /// True when the query's own predicates were applied, not just scope.
    pub filtered: bool,
}

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VehicleStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VehicleStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve the best vehicles for `message`, whose parsed form is `query`.
    /// `top_k` defaults to the configured value.
    pub async fn search(
        &self,
        dealership_id: &str,
        message: &str,
        query: &VehicleQuery,
        top_k: Option<usize>,
    ) -> Result<Retrieval> {
        if message.trim().is_empty() {
            return Err(ShowroomError::invalid("message must not be empty"));
        }
        let top_k = top_k.unwrap_or(self.config.top_k).max(1);

        let filtered = query.has_strong_signals();
        let filter = if filtered {
            VehicleFilter::from_query(dealership_id, query)
        } else {
            VehicleFilter::scope(dealership_id)
        };

        let (mut vehicles, mode) = if self.embedder.is_enabled() {
            let query_vec = embed_query(self.embedder.as_ref(), message)
                .await
                .map_err(|e| {
                    warn!(error = %e, "query embedding failed");
                    match e.downcast::<ShowroomError>() {
                        Ok(domain) => anyhow::Error::from(domain),
                        Err(other) => ShowroomError::Upstream(other.to_string()).into(),
                    }
                })?;
            let results = self
                .store
                .similarity_search(&filter, &query_vec, self.config.candidate_limit)
                .await?;
            (results, RetrievalMode::Vector)
        } else if filtered {
            let rows = self
                .store
                .filtered_vehicles(&filter, self.config.candidate_limit)
                .await?;
            let results = rows
                .into_iter()
                .map(|vehicle| ScoredVehicle {
                    formatted_text: vehicle.format_for_embedding(),
                    similarity_score: 1.0,
                    vehicle,
                })
                .collect();
            (results, RetrievalMode::FilterOnly)
        } else {
            (Vec::new(), RetrievalMode::FilterOnly)
        };

        let candidates = vehicles.len();
        if let Some(make) = query.make.as_deref() {
            for scored in &mut vehicles {
                if scored.vehicle.make.eq_ignore_ascii_case(make) {
                    scored.similarity_score = (scored.similarity_score + self.config.make_boost).min(1.0);
                }
            }
        }

        vehicles.retain(|v| v.similarity_score >= self.config.similarity_threshold);
        sort_scored(&mut vehicles);
        vehicles.truncate(top_k);

        debug!(
            dealership_id,
            ?mode,
            filtered,
            candidates,
            returned = vehicles.len(),
            "retrieval finished"
        );

        Ok(Retrieval {
            vehicles,
            mode,
            filtered,
        })
    }
}
