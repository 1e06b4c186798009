//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/leads` | Create a lead with its opening message |
//! | `GET`  | `/leads` | Leads of the dealership, newest first |
//! | `POST` | `/leads/classify` | Reclassify the dealership's leads |
//! | `GET`  | `/leads/{id}` | One lead |
//! | `DELETE` | `/leads/{id}` | Delete a lead and its thread |
//! | `PATCH` | `/leads/{id}/status` | Set a lead's status |
//! | `GET`  | `/leads/{id}/conversations` | Thread, oldest first |
//! | `POST` | `/leads/{id}/ai-response` | Reply to the latest customer message and store it |
//! | `POST` | `/messages` | Append a customer message |
//! | `POST` | `/ai-response` | Reply to a free-standing query |
//! | `POST` | `/vehicles/search` | Parsed query plus scored vehicles |
//! | `POST` | `/inventory` | Create a vehicle |
//! | `GET`  | `/inventory` | Vehicles, optionally `?status=` |
//! | `GET`/`PUT`/`DELETE` | `/inventory/{id}` | One vehicle; `PUT` clears optional fields given as `null` |
//! | `POST` | `/embeddings/build` | Embed pending rows (`{"force_rebuild": true}` re-embeds all) |
//! | `GET`  | `/embeddings/stats` | Embedding coverage |
//!
//! Every route except `/health` is scoped by the `X-Dealership-Id` header,
//! which is trusted as given. A missing header is a 400.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "lead 42 not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embeddings_disabled` (400),
//! `forbidden` (403), `not_found` (404), `upstream_error` (502),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support the browser
//! dashboard.

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::classify::{classify_all, ClassificationSummary};
use crate::config::Config;
use crate::context::last_customer_message;
use crate::conversations::{add_agent_reply, add_message, list_for_lead};
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::entity::{parse_message, VehicleQuery};
use crate::error::ShowroomError;
use crate::indexer::{build_embeddings, index_stats, refresh_vehicle, BuildReport, IndexStats};
use crate::inventory::{create_vehicle, delete_vehicle, get_vehicle, list_vehicles, update_vehicle};
use crate::leads::{create_lead, delete_lead, get_lead, list_leads, update_lead_status};
use crate::llm::{create_chat_provider, ChatProvider};
use crate::models::{
    Conversation, Lead, LeadStatus, NewLead, NewMessage, NewVehicle, Sender, Vehicle,
    VehicleStatus, VehicleUpdate,
};
use crate::respond::{RagReply, RespondRequest, Responder};
use crate::retrieval::RetrievalMode;
use crate::store::ScoredVehicle;

pub const DEALERSHIP_HEADER: &str = "x-dealership-id";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    config: Arc<Config>,
    embedder: Arc<dyn EmbeddingProvider>,
    responder: Responder,
}

impl AppState {
    /// Wire the retrieval and reply pipeline over `pool` with the given providers.
    pub fn new(
        config: Config,
        pool: SqlitePool,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Self {
        let responder = Responder::over_sqlite(&config, pool.clone(), embedder.clone(), chat);
        Self {
            pool,
            config: Arc::new(config),
            embedder,
            responder,
        }
    }
}

/// Starts the HTTP server with the providers named in the config.
///
/// Binds to `[server].bind`, applies the schema if needed and serves until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let embedder = create_provider(&config.embedding)?;
    let chat = create_chat_provider(&config.generation)?;
    serve_with(config, embedder, chat).await
}

/// Like [`run_server`], with caller-supplied providers.
pub async fn serve_with(
    config: &Config,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
) -> anyhow::Result<()> {
    let pool = crate::db::connect(config).await?;
    crate::migrate::apply_schema(&pool).await?;

    let bind_addr = config.server.bind.clone();
    info!(
        embedding = embedder.model_name(),
        generation = chat.model_name(),
        "providers ready"
    );
    let app = router(AppState::new(config.clone(), pool, embedder, chat));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("showroom API listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/leads", post(handle_create_lead).get(handle_list_leads))
        .route("/leads/classify", post(handle_classify))
        .route("/leads/{id}", get(handle_get_lead).delete(handle_delete_lead))
        .route("/leads/{id}/status", patch(handle_update_status))
        .route("/leads/{id}/conversations", get(handle_conversations))
        .route("/leads/{id}/ai-response", post(handle_lead_reply))
        .route("/messages", post(handle_add_message))
        .route("/ai-response", post(handle_ai_response))
        .route("/vehicles/search", post(handle_vehicle_search))
        .route("/inventory", post(handle_create_vehicle).get(handle_list_vehicles))
        .route(
            "/inventory/{id}",
            get(handle_get_vehicle)
                .put(handle_update_vehicle)
                .delete(handle_delete_vehicle),
        )
        .route("/embeddings/build", post(handle_build_embeddings))
        .route("/embeddings/stats", get(handle_embedding_stats))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// Domain errors map onto their status codes; anything else is a 500.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ShowroomError>() {
            Some(ShowroomError::NotFound(_)) => {
                AppError::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            Some(ShowroomError::Forbidden(_)) => {
                AppError::new(StatusCode::FORBIDDEN, "forbidden", err.to_string())
            }
            Some(ShowroomError::Invalid(_)) => bad_request(err.to_string()),
            Some(ShowroomError::EmbeddingsDisabled(_)) => AppError::new(
                StatusCode::BAD_REQUEST,
                "embeddings_disabled",
                err.to_string(),
            ),
            Some(ShowroomError::Upstream(_)) => {
                AppError::new(StatusCode::BAD_GATEWAY, "upstream_error", err.to_string())
            }
            None => {
                error!(error = %err, "request failed");
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

type ApiResult<T> = Result<T, AppError>;

// ============ Dealership scope ============

/// Dealership named by the `X-Dealership-Id` header.
pub struct Dealership(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Dealership {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(DEALERSHIP_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Dealership(v.to_string()))
            .ok_or_else(|| bad_request("missing X-Dealership-Id header"))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Leads ============

#[derive(Serialize)]
struct LeadCreated {
    lead_id: String,
    status: String,
    message: String,
}

async fn handle_create_lead(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    payload: Result<Json<NewLead>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<LeadCreated>)> {
    let Json(new) = payload?;
    let lead = create_lead(&state.pool, &dealership_id, new).await?;
    Ok((
        StatusCode::CREATED,
        Json(LeadCreated {
            message: format!("Lead {} created", lead.name),
            lead_id: lead.id,
            status: "created".to_string(),
        }),
    ))
}

async fn handle_list_leads(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
) -> ApiResult<Json<Vec<Lead>>> {
    Ok(Json(list_leads(&state.pool, &dealership_id).await?))
}

async fn handle_get_lead(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    Path(id): Path<String>,
) -> ApiResult<Json<Lead>> {
    Ok(Json(get_lead(&state.pool, &dealership_id, &id).await?))
}

async fn handle_delete_lead(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    delete_lead(&state.pool, &dealership_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct StatusUpdate {
    status: LeadStatus,
}

async fn handle_update_status(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Json<Lead>> {
    let Json(update) = payload?;
    Ok(Json(
        update_lead_status(&state.pool, &dealership_id, &id, update.status).await?,
    ))
}

async fn handle_classify(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
) -> ApiResult<Json<ClassificationSummary>> {
    Ok(Json(classify_all(&state.pool, Some(&dealership_id)).await?))
}

// ============ Conversations ============

async fn handle_add_message(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let Json(new) = payload?;
    get_lead(&state.pool, &dealership_id, &new.lead_id).await?;
    let conversation = add_message(&state.pool, &new.lead_id, &new.message, Sender::Customer).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn handle_conversations(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Conversation>>> {
    get_lead(&state.pool, &dealership_id, &id).await?;
    Ok(Json(list_for_lead(&state.pool, &id).await?))
}

// ============ AI replies ============

#[derive(Serialize)]
struct LeadReply {
    lead_id: String,
    /// The stored agent message.
    conversation: Conversation,
    #[serde(flatten)]
    reply: RagReply,
}

async fn handle_lead_reply(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    Path(id): Path<String>,
) -> ApiResult<Json<LeadReply>> {
    let lead = get_lead(&state.pool, &dealership_id, &id).await?;
    let history = list_for_lead(&state.pool, &id).await?;
    let message = last_customer_message(&history)
        .ok_or_else(|| bad_request(format!("lead {} has no customer message", id)))?
        .to_string();

    let reply = state
        .responder
        .respond(RespondRequest {
            dealership_id,
            message,
            history,
            customer_name: Some(lead.name),
            top_k: None,
        })
        .await?;
    let conversation = add_agent_reply(&state.pool, &id, &reply.response_text).await?;

    Ok(Json(LeadReply {
        lead_id: id,
        conversation,
        reply,
    }))
}

#[derive(Deserialize)]
struct AiResponseRequest {
    query: String,
    #[serde(default)]
    customer_name: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_ai_response(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    payload: Result<Json<AiResponseRequest>, JsonRejection>,
) -> ApiResult<Json<RagReply>> {
    let Json(req) = payload?;
    let mut request = RespondRequest::new(dealership_id, req.query);
    request.customer_name = req.customer_name;
    request.top_k = req.top_k;
    Ok(Json(state.responder.respond(request).await?))
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: VehicleQuery,
    mode: RetrievalMode,
    filtered: bool,
    vehicles: Vec<ScoredVehicle>,
}

async fn handle_vehicle_search(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(req) = payload?;
    let query = parse_message(&req.query);
    let retrieval = state
        .responder
        .retriever()
        .search(&dealership_id, &req.query, &query, req.top_k)
        .await?;
    Ok(Json(SearchResponse {
        query,
        mode: retrieval.mode,
        filtered: retrieval.filtered,
        vehicles: retrieval.vehicles,
    }))
}

// ============ Inventory ============

/// Re-embed a changed row right away when embeddings are on; the row stays
/// pending for `embed pending` if that fails.
async fn refresh_if_enabled(state: &AppState, id: &str) {
    if !state.embedder.is_enabled() {
        return;
    }
    if let Err(e) = refresh_vehicle(&state.pool, state.embedder.as_ref(), id).await {
        warn!(id, error = %e, "vehicle left pending for embedding");
    }
}

async fn handle_create_vehicle(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    payload: Result<Json<NewVehicle>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Vehicle>)> {
    let Json(new) = payload?;
    let vehicle = create_vehicle(&state.pool, &dealership_id, new).await?;
    refresh_if_enabled(&state, &vehicle.id).await;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

#[derive(Deserialize)]
struct InventoryParams {
    #[serde(default)]
    status: Option<VehicleStatus>,
}

async fn handle_list_vehicles(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    Query(params): Query<InventoryParams>,
) -> ApiResult<Json<Vec<Vehicle>>> {
    Ok(Json(
        list_vehicles(&state.pool, &dealership_id, params.status).await?,
    ))
}

async fn handle_get_vehicle(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    Path(id): Path<String>,
) -> ApiResult<Json<Vehicle>> {
    Ok(Json(get_vehicle(&state.pool, &dealership_id, &id).await?))
}

async fn handle_update_vehicle(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    Path(id): Path<String>,
    payload: Result<Json<VehicleUpdate>, JsonRejection>,
) -> ApiResult<Json<Vehicle>> {
    let Json(update) = payload?;
    let vehicle = update_vehicle(&state.pool, &dealership_id, &id, update).await?;
    refresh_if_enabled(&state, &vehicle.id).await;
    Ok(Json(vehicle))
}

async fn handle_delete_vehicle(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    delete_vehicle(&state.pool, &dealership_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ Embeddings ============

#[derive(Deserialize, Default)]
struct BuildRequest {
    #[serde(default)]
    force_rebuild: bool,
}

async fn handle_build_embeddings(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
    payload: Result<Option<Json<BuildRequest>>, JsonRejection>,
) -> ApiResult<Json<BuildReport>> {
    // No body means an incremental build
    let req = payload?.map(|Json(req)| req).unwrap_or_default();
    let report = build_embeddings(
        &state.pool,
        state.embedder.as_ref(),
        Some(&dealership_id),
        req.force_rebuild,
        state.config.embedding.batch_size,
    )
    .await?;
    Ok(Json(report))
}

async fn handle_embedding_stats(
    State(state): State<AppState>,
    Dealership(dealership_id): Dealership,
) -> ApiResult<Json<IndexStats>> {
    Ok(Json(
        index_stats(&state.pool, Some(&dealership_id), state.embedder.model_name()).await?,
    ))
}
