//! HTTP API tests against a router bound to an ephemeral port.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use showroom::config::Config;
use showroom::embedding::{DisabledProvider, EmbeddingProvider};
use showroom::llm::{ChatProvider, DisabledChat};
use showroom::server::{router, AppState};
use showroom::{db, migrate};

/// Chat provider returning the same reply to every prompt.
struct CannedChat(&'static str);

#[async_trait]
impl ChatProvider for CannedChat {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Embedder giving every text the same unit vector.
struct FlatEmbedder;

#[async_trait]
impl EmbeddingProvider for FlatEmbedder {
    fn model_name(&self) -> &str {
        "flat"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

fn test_config(tmp: &TempDir) -> Config {
    let config_content = format!(
        r#"
[db]
path = "{}"

[agent]
dealership_name = "Harbor Motors"

[server]
bind = "127.0.0.1:0"
"#,
        tmp.path().join("showroom.sqlite").display()
    );
    toml::from_str(&config_content).unwrap()
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    _tmp: TempDir,
}

impl TestServer {
    async fn start(chat: Arc<dyn ChatProvider>) -> Self {
        Self::start_with(Arc::new(DisabledProvider), chat).await
    }

    async fn start_with(embedder: Arc<dyn EmbeddingProvider>, chat: Arc<dyn ChatProvider>) -> Self {
        let tmp = TempDir::new().unwrap();
        let cfg = test_config(&tmp);
        let pool = db::connect(&cfg).await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();

        let app = router(AppState::new(cfg, pool, embedder, chat));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            _tmp: tmp,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post(&self, dealership: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("X-Dealership-Id", dealership)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, dealership: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("X-Dealership-Id", dealership)
            .send()
            .await
            .unwrap()
    }

    async fn create_lead(&self, dealership: &str, name: &str, message: &str) -> String {
        let resp = self
            .post(dealership, "/leads", json!({ "name": name, "message": message }))
            .await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["lead_id"].as_str().unwrap().to_string()
    }

    async fn create_civic(&self, dealership: &str) -> String {
        let resp = self
            .post(
                dealership,
                "/inventory",
                json!({
                    "make": "Honda",
                    "model": "Civic",
                    "year": 2022,
                    "price": "$21,000",
                    "mileage": 18000,
                    "features": "Apple CarPlay, heated seats"
                }),
            )
            .await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let resp = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_dealership_header_is_bad_request() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let resp = server.client.get(server.url("/leads")).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "bad_request");
}

#[tokio::test]
async fn test_create_lead_stores_opening_message() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let lead_id = server
        .create_lead("d1", "Ana Lima", "Is the Civic still available?")
        .await;

    let resp = server.get("d1", &format!("/leads/{}", lead_id)).await;
    assert_eq!(resp.status(), 200);
    let lead: Value = resp.json().await.unwrap();
    assert_eq!(lead["name"], "Ana Lima");
    assert_eq!(lead["status"], "new");
    assert_eq!(lead["car"], "Unknown");
    assert_eq!(lead["source"], "Website");

    let resp = server
        .get("d1", &format!("/leads/{}/conversations", lead_id))
        .await;
    let thread: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0]["sender"], "customer");
    assert_eq!(thread[0]["message"], "Is the Civic still available?");
}

#[tokio::test]
async fn test_create_lead_without_name_is_bad_request() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let resp = server.post("d1", "/leads", json!({ "name": "  " })).await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_lead_of_other_dealership_is_forbidden() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let lead_id = server.create_lead("d1", "Ana", "hello").await;

    let resp = server.get("d2", &format!("/leads/{}", lead_id)).await;
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "forbidden");

    let resp = server.get("d1", "/leads/no-such-lead").await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_message_to_unknown_lead_is_not_found() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let resp = server
        .post("d1", "/messages", json!({ "lead_id": "missing", "message": "hi" }))
        .await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "not_found");
}

#[tokio::test]
async fn test_update_status_and_delete_lead() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let lead_id = server.create_lead("d1", "Ana", "hello").await;

    let resp = server
        .client
        .patch(server.url(&format!("/leads/{}/status", lead_id)))
        .header("X-Dealership-Id", "d1")
        .json(&json!({ "status": "appointment_booked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let lead: Value = resp.json().await.unwrap();
    assert_eq!(lead["status"], "appointment_booked");

    let resp = server
        .client
        .delete(server.url(&format!("/leads/{}", lead_id)))
        .header("X-Dealership-Id", "d1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = server.get("d1", &format!("/leads/{}", lead_id)).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_inventory_scoped_by_dealership() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let vehicle_id = server.create_civic("d1").await;

    let resp = server.get("d2", &format!("/inventory/{}", vehicle_id)).await;
    assert_eq!(resp.status(), 403);

    let resp = server.get("d1", "/inventory?status=active").await;
    let vehicles: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles[0]["price"], "$21,000");

    let resp = server.get("d2", "/inventory").await;
    let vehicles: Vec<Value> = resp.json().await.unwrap();
    assert!(vehicles.is_empty());
}

#[tokio::test]
async fn test_vehicle_search_filter_only() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    server.create_civic("d1").await;

    let resp = server
        .post("d1", "/vehicles/search", json!({ "query": "any civic under 25k?" }))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["mode"], "filter_only");
    assert_eq!(body["filtered"], true);
    assert_eq!(body["query"]["model"], "civic");
    assert_eq!(body["vehicles"].as_array().unwrap().len(), 1);

    let resp = server
        .post("d1", "/vehicles/search", json!({ "query": "civic under 15k" }))
        .await;
    let body: Value = resp.json().await.unwrap();
    assert!(body["vehicles"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_ai_response_template_when_generation_disabled() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    server.create_civic("d1").await;

    let resp = server
        .post(
            "d1",
            "/ai-response",
            json!({ "query": "do you have a civic?", "customer_name": "Ana" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["generated_by"], "template");
    assert!(body["response_text"].as_str().unwrap().starts_with("Hi Ana!"));
    assert_eq!(body["vehicles"].as_array().unwrap().len(), 1);
    assert!(!body["follow_up_suggestions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_lead_ai_response_stores_agent_reply() {
    let server = TestServer::start(Arc::new(CannedChat(
        "We have a 2022 Honda Civic at $21,000 with heated seats.",
    )))
    .await;
    server.create_civic("d1").await;
    let lead_id = server
        .create_lead("d1", "Ana", "Do you have a civic under 25k?")
        .await;

    let resp = server
        .post("d1", &format!("/leads/{}/ai-response", lead_id), json!({}))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["lead_id"], lead_id.as_str());
    assert_eq!(body["generated_by"], "llm");
    let text = body["response_text"].as_str().unwrap();
    assert!(text.starts_with("We have a 2022 Honda Civic"));
    // No question in the reply, so the test-drive prompt is appended
    assert!(text.ends_with('?'));

    let resp = server
        .get("d1", &format!("/leads/{}/conversations", lead_id))
        .await;
    let thread: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[1]["sender"], "agent");
    assert_eq!(thread[1]["message"], text);
}

#[tokio::test]
async fn test_rejected_generation_without_vehicles_falls_back() {
    let server = TestServer::start(Arc::new(CannedChat("ok"))).await;

    let resp = server
        .post("d1", "/ai-response", json!({ "query": "any civic?" }))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["generated_by"], "template");
    assert_ne!(body["response_text"], "ok");
}

#[tokio::test]
async fn test_classify_reports_processed_leads() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    server.create_lead("d1", "Ana", "hello").await;
    server.create_lead("d1", "Ben", "hi").await;
    server.create_lead("d2", "Cy", "hey").await;

    let resp = server.post("d1", "/leads/classify", json!({})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["total_processed"], 2);
}

#[tokio::test]
async fn test_embeddings_build_disabled() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let resp = server.post("d1", "/embeddings/build", json!({})).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "embeddings_disabled");

    let resp = server.get("d1", "/embeddings/stats").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["embedded"], 0);
}

#[tokio::test]
async fn test_embeddings_build_without_body() {
    let server = TestServer::start_with(Arc::new(FlatEmbedder), Arc::new(DisabledChat)).await;
    server.create_civic("d1").await;

    let resp = server
        .client
        .post(server.url("/embeddings/build"))
        .header("X-Dealership-Id", "d1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["total"], 1);
    assert_eq!(report["failed"], 0);

    let resp = server.get("d1", "/embeddings/stats").await;
    let stats: Value = resp.json().await.unwrap();
    assert_eq!(stats["embedded"], 1);
    assert_eq!(stats["pending"], 0);
}

#[tokio::test]
async fn test_update_vehicle_clears_null_fields() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let id = server.create_civic("d1").await;

    let resp = server
        .client
        .put(server.url(&format!("/inventory/{}", id)))
        .header("X-Dealership-Id", "d1")
        .json(&json!({ "features": null, "price": "$20,500" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let vehicle: Value = resp.json().await.unwrap();
    assert!(vehicle["features"].is_null());
    assert_eq!(vehicle["mileage"], 18000);
    assert_eq!(vehicle["price"], "$20,500");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let server = TestServer::start(Arc::new(DisabledChat)).await;
    let resp = server
        .client
        .post(server.url("/leads"))
        .header("X-Dealership-Id", "d1")
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
