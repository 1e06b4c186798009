//! Reply generation for a customer message.
//!
//! [`Responder::respond`] runs the whole pipeline: parse entities, retrieve
//! vehicles, build a grounded or generic prompt, ask the chat model and
//! validate what comes back. When generation is disabled, fails, or produces
//! a reply the validator rejects, a templated reply is used instead.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::{analyze, format_transcript, ConversationContext, Intent, Urgency};
use crate::embedding::EmbeddingProvider;
use crate::entity::{EntityParser, VehicleQuery};
use crate::llm::ChatProvider;
use crate::models::{format_price, Conversation, Sender};
use crate::prompt::{PromptBuilder, PromptKind};
use crate::retrieval::{RetrievalMode, Retriever};
use crate::store::{ScoredVehicle, SqliteVehicleStore};
use crate::validation::{ensure_call_to_action, ResponseValidator};

/// Messages of history included in the LLM prompt.
const TRANSCRIPT_TAIL: usize = 6;
const MAX_FOLLOW_UPS: usize = 5;

#[derive(Debug, Clone)]
pub struct RespondRequest {
    pub dealership_id: String,
    pub message: String,
    /// Lead thread in chronological order; may already end with `message`.
    pub history: Vec<Conversation>,
    pub customer_name: Option<String>,
    pub top_k: Option<usize>,
}

impl RespondRequest {
    pub fn new(dealership_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            dealership_id: dealership_id.into(),
            message: message.into(),
            history: Vec::new(),
            customer_name: None,
            top_k: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedBy {
    Llm,
    Template,
}

/// Heuristic scores in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Quality {
    pub relevance: f64,
    pub completeness: f64,
    pub personalization: f64,
    pub actionability: f64,
}

impl Quality {
    pub fn overall(&self) -> f64 {
        (self.relevance + self.completeness + self.personalization + self.actionability) / 4.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RagReply {
    pub response_text: String,
    pub vehicles: Vec<ScoredVehicle>,
    pub query: VehicleQuery,
    pub prompt_kind: PromptKind,
    pub generated_by: GeneratedBy,
    pub retrieval_mode: RetrievalMode,
    pub quality: Quality,
    pub follow_up_suggestions: Vec<String>,
    pub context: ConversationContext,
}

#[derive(Clone)]
pub struct Responder {
    retriever: Retriever,
    chat: Arc<dyn ChatProvider>,
    prompts: PromptBuilder,
    parser: EntityParser,
    validator: ResponseValidator,
}

impl Responder {
    pub fn new(retriever: Retriever, chat: Arc<dyn ChatProvider>, prompts: PromptBuilder) -> Self {
        Self {
            retriever,
            chat,
            prompts,
            parser: EntityParser::new(),
            validator: ResponseValidator::new(),
        }
    }

    /// Responder over the SQLite inventory, configured from `config`.
    pub fn over_sqlite(
        config: &Config,
        pool: SqlitePool,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Self {
        let store = Arc::new(SqliteVehicleStore::new(pool));
        let retriever = Retriever::new(store, embedder, config.retrieval.clone());
        Self::new(retriever, chat, PromptBuilder::new(config.agent.clone()))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn respond(&self, req: RespondRequest) -> Result<RagReply> {
        let message = req.message.trim();
        let query = self.parser.parse(message);
        let retrieval = self
            .retriever
            .search(&req.dealership_id, message, &query, req.top_k)
            .await?;
        let vehicles = retrieval.vehicles;

        let context = analyze(&thread_with(&req.history, message));
        let name = req
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let mut prompt = self.prompts.build(message, &vehicles);
        if let Some(name) = name {
            prompt.user.push_str(&format!("\n\nCustomer name: {}", name));
        }
        if req.history.len() > 1 {
            let tail = &req.history[req.history.len().saturating_sub(TRANSCRIPT_TAIL)..];
            prompt.user.push_str(&format!(
                "\n\nRecent conversation:\n{}",
                format_transcript(tail, None)
            ));
        }

        let mut generated_by = GeneratedBy::Template;
        let mut response_text = None;

        if self.chat.is_enabled() {
            match self.chat.complete(&prompt.system, &prompt.user).await {
                Ok(text) => {
                    let validation = self.validator.validate(&text, vehicles.len());
                    if validation.is_valid {
                        response_text = Some(ensure_call_to_action(&text));
                        generated_by = GeneratedBy::Llm;
                    } else {
                        warn!(issues = ?validation.issues, "generated reply rejected");
                        if vehicles.is_empty() {
                            response_text = Some(format!(
                                "{}{}",
                                greeting(name),
                                self.validator.fallback(&validation)
                            ));
                        }
                    }
                }
                Err(e) => warn!(error = %e, "generation failed, using template"),
            }
        }

        let response_text = match response_text {
            Some(text) => text,
            None if vehicles.is_empty() => no_match_reply(message, name, context.intent),
            None => template_reply(&vehicles, name, context.intent),
        };

        let quality = score_quality(&response_text, &vehicles, &context);
        let follow_up_suggestions = follow_ups(&context);

        info!(
            dealership_id = %req.dealership_id,
            vehicles = vehicles.len(),
            ?generated_by,
            kind = ?prompt.kind,
            "reply generated"
        );

        Ok(RagReply {
            response_text,
            vehicles,
            query,
            prompt_kind: prompt.kind,
            generated_by,
            retrieval_mode: retrieval.mode,
            quality,
            follow_up_suggestions,
            context,
        })
    }
}

/// History plus the current message, unless the history already ends with it.
fn thread_with(history: &[Conversation], message: &str) -> Vec<Conversation> {
    let mut thread = history.to_vec();
    let last_customer = history
        .iter()
        .rev()
        .find(|c| c.sender == Sender::Customer)
        .map(|c| c.message.trim());
    if last_customer != Some(message) {
        thread.push(Conversation {
            id: String::new(),
            lead_id: String::new(),
            message: message.to_string(),
            sender: Sender::Customer,
            created_at: crate::db::now_ts(),
        });
    }
    thread
}

fn greeting(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("Hi {}! ", name),
        None => "Hello! ".to_string(),
    }
}

struct Template {
    greeting: &'static str,
    closing: &'static str,
    with_features: bool,
}

fn template_for(intent: Intent) -> Template {
    match intent {
        Intent::TestDrive => Template {
            greeting: "I found {count} {vehicles} perfect for a test drive:",
            closing: "Would you like to schedule a test drive for any of these vehicles?",
            with_features: false,
        },
        Intent::Pricing | Intent::Financing => Template {
            greeting: "Here are {count} {vehicles} in your price range:",
            closing: "I can help you with financing options and pricing details. Would you like an estimate?",
            with_features: false,
        },
        Intent::Availability => Template {
            greeting: "I found {count} {vehicles} currently available:",
            closing: "These vehicles are ready for immediate viewing. Would you like to stop by?",
            with_features: false,
        },
        _ => Template {
            greeting: "I found {count} {vehicles} that match your interests:",
            closing: "These vehicles are currently available. Would you like to schedule a test drive?",
            with_features: true,
        },
    }
}

/// Greeting with the count, one line per vehicle, and the intent's closing.
pub fn template_reply(vehicles: &[ScoredVehicle], name: Option<&str>, intent: Intent) -> String {
    let template = template_for(intent);
    let noun = if vehicles.len() == 1 { "vehicle" } else { "vehicles" };
    let mut lines = vec![format!(
        "{}{}",
        greeting(name),
        template
            .greeting
            .replace("{count}", &vehicles.len().to_string())
            .replace("{vehicles}", noun)
    )];

    for (i, scored) in vehicles.iter().enumerate() {
        let v = &scored.vehicle;
        let mut line = format!("{}. {} - {}", i + 1, v.title(), format_price(v.price_value()));
        if template.with_features {
            if let Some(features) = v.features.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
                line.push_str(&format!(", {}", features));
            }
        }
        lines.push(line);
    }

    lines.push(template.closing.to_string());
    lines.join("\n")
}

/// Reply when retrieval found nothing; quotes the customer's request back.
pub fn no_match_reply(query: &str, name: Option<&str>, intent: Intent) -> String {
    let opening = if intent == Intent::TestDrive {
        format!(
            "I understand you're interested in test driving something like '{}'. \
             While I don't have exact matches available for a test drive right now,",
            query
        )
    } else {
        format!(
            "Thank you for your inquiry about '{}'. \
             While I don't have exact matches in our current inventory,",
            query
        )
    };
    format!(
        "{}{} I'd be happy to help you find something similar or keep you updated \
         when we get vehicles that match your criteria. \
         Could you tell me more about your specific needs and budget?",
        greeting(name),
        opening
    )
}

const ACTION_WORDS: &[&str] = &[
    "schedule",
    "test drive",
    "contact",
    "call",
    "visit",
    "financing",
    "payment",
];

pub fn score_quality(text: &str, vehicles: &[ScoredVehicle], context: &ConversationContext) -> Quality {
    let relevance = if vehicles.is_empty() {
        0.0
    } else {
        vehicles.iter().map(|v| v.similarity_score).sum::<f64>() / vehicles.len() as f64
    };

    let len = text.chars().count();
    let completeness = if len > 200 && !vehicles.is_empty() {
        (len as f64 / 500.0).min(1.0)
    } else {
        0.0
    };

    let mut personalization: f64 = 0.0;
    if context.intent != Intent::GeneralInquiry {
        personalization += 0.3;
    }
    if !context.preferences.is_empty() {
        personalization += 0.3;
    }
    if context.budget_range.is_some() {
        personalization += 0.2;
    }
    if context.vehicle_type.is_some() {
        personalization += 0.2;
    }

    let lower = text.to_lowercase();
    let actions = ACTION_WORDS.iter().filter(|w| lower.contains(*w)).count();

    Quality {
        relevance,
        completeness,
        personalization: personalization.min(1.0),
        actionability: (actions as f64 / 3.0).min(1.0),
    }
}

/// Next steps for the salesperson, at most five.
pub fn follow_ups(context: &ConversationContext) -> Vec<String> {
    let base: &[&str] = match context.intent {
        Intent::TestDrive => &[
            "Schedule a test drive",
            "Get more vehicle details",
            "Discuss financing options",
        ],
        Intent::Pricing => &[
            "Get financing estimate",
            "Schedule a viewing",
            "Compare with similar vehicles",
        ],
        Intent::Availability => &[
            "Schedule immediate viewing",
            "Hold vehicle for you",
            "Get delivery options",
        ],
        Intent::Financing => &[
            "Get pre-approval",
            "Calculate monthly payments",
            "Discuss trade-in value",
        ],
        Intent::TradeIn => &[
            "Get a trade-in appraisal",
            "Schedule a vehicle inspection",
            "Discuss financing options",
        ],
        Intent::Features | Intent::GeneralInquiry => &[
            "Schedule a test drive",
            "Get more information",
            "Discuss pricing and financing",
        ],
    };

    let mut suggestions: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    if context.urgency == Urgency::High {
        suggestions.push("Schedule immediate appointment".to_string());
    }
    if context.budget_range.is_some() {
        suggestions.push("Find vehicles in your budget".to_string());
    }
    suggestions.truncate(MAX_FOLLOW_UPS);
    suggestions
}
