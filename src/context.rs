//! Conversation analysis.
//!
//! Reads the customer's side of a lead's thread and derives what the reply
//! should focus on: the intent of the latest message, how urgent the customer
//! sounds, a stated budget range, a preferred vehicle type and recurring
//! preference keywords. Keywords match on word boundaries.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::models::{Conversation, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TestDrive,
    Financing,
    Pricing,
    Availability,
    Features,
    TradeIn,
    #[default]
    GeneralInquiry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationContext {
    pub intent: Intent,
    pub urgency: Urgency,
    pub budget_range: Option<BudgetRange>,
    pub vehicle_type: Option<String>,
    /// Category (`color`, `transmission`, `fuel_type`, `body_style`,
    /// `features`, `make`, `model`) to the keywords seen, sorted.
    pub preferences: BTreeMap<String, Vec<String>>,
    pub customer_messages: usize,
}

// Order is priority: the first intent with a keyword in the last message wins
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (Intent::TestDrive, &["test drive", "drive", "test", "schedule"]),
    (
        Intent::Financing,
        &["finance", "financing", "loan", "credit", "payment plan"],
    ),
    (Intent::Pricing, &["price", "cost", "budget", "afford", "payment"]),
    (Intent::Availability, &["available", "in stock", "have", "stock"]),
    (
        Intent::Features,
        &["feature", "features", "spec", "specs", "specification", "option", "options"],
    ),
    (Intent::TradeIn, &["trade", "trade-in", "exchange", "old car"]),
];

const URGENCY_KEYWORDS: &[(Urgency, &[&str])] = &[
    (Urgency::High, &["urgent", "asap", "quickly", "immediately", "today"]),
    (Urgency::Medium, &["soon", "this week", "next week", "interested"]),
    (Urgency::Low, &["someday", "future", "maybe", "thinking"]),
];

const PREFERENCE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "color",
        &["color", "colour", "red", "blue", "black", "white", "silver", "gray", "grey"],
    ),
    ("transmission", &["automatic", "manual", "transmission"]),
    ("fuel_type", &["gas", "diesel", "electric", "hybrid", "fuel"]),
    (
        "body_style",
        &["sedan", "suv", "truck", "hatchback", "coupe", "convertible"],
    ),
    (
        "features",
        &["leather", "sunroof", "navigation", "backup camera", "bluetooth"],
    ),
    (
        "make",
        &["toyota", "honda", "ford", "chevrolet", "bmw", "mercedes", "audi", "lexus"],
    ),
    (
        "model",
        &["camry", "accord", "civic", "corolla", "cr-v", "rav4", "f-150", "silverado"],
    ),
];

const VEHICLE_TYPE_KEYWORDS: &[(&str, &[&str])] = &[
    ("sedan", &["sedan", "passenger"]),
    ("suv", &["suv", "crossover", "sport utility"]),
    ("truck", &["truck", "pickup", "pick-up"]),
    ("hatchback", &["hatchback", "hatch"]),
    ("coupe", &["coupe", "sports car"]),
    ("convertible", &["convertible"]),
];

static DOLLAR_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?(\d{1,3}(?:,\d{3})+|\d{4,6})\s*(?:-|to)\s*\$?(\d{1,3}(?:,\d{3})+|\d{4,6})").unwrap()
});
static K_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3})k\s*(?:-|to)\s*(\d{1,3})k\b").unwrap());

/// True when `keyword` occurs in `text` with non-alphanumeric neighbours.
fn contains_word(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before_ok = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = text[end..].chars().next().is_none_or(|c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

fn any_word(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| contains_word(text, k))
}

/// Analyze a thread in chronological order.
pub fn analyze(conversations: &[Conversation]) -> ConversationContext {
    let messages: Vec<String> = conversations
        .iter()
        .filter(|c| c.sender == Sender::Customer)
        .map(|c| c.message.to_lowercase())
        .collect();

    if messages.is_empty() {
        return ConversationContext {
            urgency: Urgency::Low,
            ..Default::default()
        };
    }

    ConversationContext {
        intent: detect_intent(&messages),
        urgency: detect_urgency(&messages),
        budget_range: extract_budget_range(&messages),
        vehicle_type: detect_vehicle_type(&messages),
        preferences: extract_preferences(&messages),
        customer_messages: messages.len(),
    }
}

/// Intent of a single message.
pub fn detect_intent_of(message: &str) -> Intent {
    let lower = message.to_lowercase();
    INTENT_KEYWORDS
        .iter()
        .find(|(_, keywords)| any_word(&lower, keywords))
        .map_or(Intent::GeneralInquiry, |(intent, _)| *intent)
}

fn detect_intent(messages: &[String]) -> Intent {
    messages
        .last()
        .map_or(Intent::GeneralInquiry, |m| detect_intent_of(m))
}

fn detect_urgency(messages: &[String]) -> Urgency {
    URGENCY_KEYWORDS
        .iter()
        .find(|(_, keywords)| messages.iter().any(|m| any_word(m, keywords)))
        .map_or(Urgency::Medium, |(urgency, _)| *urgency)
}

fn extract_budget_range(messages: &[String]) -> Option<BudgetRange> {
    let parse = |s: &str| s.replace(',', "").parse::<f64>().ok();

    for message in messages {
        if let Some(caps) = K_RANGE_RE.captures(message) {
            if let (Some(a), Some(b)) = (parse(&caps[1]), parse(&caps[2])) {
                return Some(ordered(a * 1000.0, b * 1000.0));
            }
        }
        if let Some(caps) = DOLLAR_RANGE_RE.captures(message) {
            if let (Some(a), Some(b)) = (parse(&caps[1]), parse(&caps[2])) {
                // "2021-2023" is a model-year range
                let is_year = |v: f64| (1900.0..=2100.0).contains(&v);
                if caps[0].contains('$') || !(is_year(a) && is_year(b)) {
                    return Some(ordered(a, b));
                }
            }
        }
    }
    None
}

fn ordered(a: f64, b: f64) -> BudgetRange {
    BudgetRange {
        min: a.min(b),
        max: a.max(b),
    }
}

fn detect_vehicle_type(messages: &[String]) -> Option<String> {
    VEHICLE_TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| messages.iter().any(|m| any_word(m, keywords)))
        .map(|(vehicle_type, _)| vehicle_type.to_string())
}

fn extract_preferences(messages: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut preferences = BTreeMap::new();
    for (category, keywords) in PREFERENCE_KEYWORDS {
        let mut found: Vec<String> = keywords
            .iter()
            .filter(|k| messages.iter().any(|m| contains_word(m, k)))
            .map(|k| k.to_string())
            .collect();
        if !found.is_empty() {
            found.sort();
            found.dedup();
            preferences.insert(category.to_string(), found);
        }
    }
    preferences
}

/// The most recent customer message, if any.
pub fn last_customer_message(conversations: &[Conversation]) -> Option<&str> {
    conversations
        .iter()
        .rev()
        .find(|c| c.sender == Sender::Customer)
        .map(|c| c.message.as_str())
}

/// `"Customer: …"` / `"Agent: …"` lines, headed by the customer's name.
pub fn format_transcript(conversations: &[Conversation], lead_name: Option<&str>) -> String {
    let mut parts = Vec::with_capacity(conversations.len() + 1);
    if let Some(name) = lead_name {
        parts.push(format!("Customer: {}\n", name));
    }
    for c in conversations {
        let role = match c.sender {
            Sender::Customer => "Customer",
            Sender::Agent => "Agent",
        };
        parts.push(format!("{}: {}", role, c.message));
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(sender: Sender, text: &str) -> Conversation {
        Conversation {
            id: text.to_string(),
            lead_id: "l1".to_string(),
            message: text.to_string(),
            sender,
            created_at: 0,
        }
    }

    #[test]
    fn test_empty_history() {
        let ctx = analyze(&[]);
        assert_eq!(ctx.intent, Intent::GeneralInquiry);
        assert_eq!(ctx.urgency, Urgency::Low);
        assert_eq!(ctx.customer_messages, 0);
    }

    #[test]
    fn test_intent_from_last_customer_message() {
        let history = vec![
            msg(Sender::Customer, "What's the price on the Camry?"),
            msg(Sender::Agent, "It's $24,000. Want to schedule a test drive?"),
            msg(Sender::Customer, "Can I test drive it Saturday?"),
        ];
        let ctx = analyze(&history);
        assert_eq!(ctx.intent, Intent::TestDrive);
        assert_eq!(ctx.customer_messages, 2);
        assert_eq!(ctx.preferences.get("model"), Some(&vec!["camry".to_string()]));
    }

    #[test]
    fn test_intent_priority_and_boundaries() {
        assert_eq!(detect_intent_of("Do you offer financing?"), Intent::Financing);
        assert_eq!(detect_intent_of("Is it still available?"), Intent::Availability);
        assert_eq!(detect_intent_of("What does it cost?"), Intent::Pricing);
        assert_eq!(detect_intent_of("Thinking about a trade"), Intent::TradeIn);
        // "behave" does not contain the word "have"
        assert_eq!(detect_intent_of("kids behave in it?"), Intent::GeneralInquiry);
    }

    #[test]
    fn test_urgency() {
        assert_eq!(analyze(&[msg(Sender::Customer, "need it ASAP")]).urgency, Urgency::High);
        assert_eq!(
            analyze(&[msg(Sender::Customer, "maybe next year")]).urgency,
            Urgency::Low
        );
        assert_eq!(analyze(&[msg(Sender::Customer, "hello")]).urgency, Urgency::Medium);
    }

    #[test]
    fn test_budget_ranges() {
        let ctx = analyze(&[msg(Sender::Customer, "somewhere $20,000-$30,000")]);
        assert_eq!(ctx.budget_range, Some(BudgetRange { min: 20000.0, max: 30000.0 }));

        let ctx = analyze(&[msg(Sender::Customer, "30k to 20k is fine")]);
        assert_eq!(ctx.budget_range, Some(BudgetRange { min: 20000.0, max: 30000.0 }));

        let ctx = analyze(&[msg(Sender::Customer, "a 2021-2023 model")]);
        assert_eq!(ctx.budget_range, None);
    }

    #[test]
    fn test_vehicle_type_and_preferences() {
        let ctx = analyze(&[
            msg(Sender::Customer, "Looking for a white crossover"),
            msg(Sender::Customer, "leather and a sunroof would be nice, automatic"),
        ]);
        assert_eq!(ctx.vehicle_type.as_deref(), Some("suv"));
        assert_eq!(ctx.preferences["color"], vec!["white"]);
        assert_eq!(ctx.preferences["features"], vec!["leather", "sunroof"]);
        assert_eq!(ctx.preferences["transmission"], vec!["automatic"]);
    }

    #[test]
    fn test_transcript_and_last_message() {
        let history = vec![
            msg(Sender::Customer, "Hi"),
            msg(Sender::Agent, "Hello!"),
            msg(Sender::Customer, "Any trucks?"),
            msg(Sender::Agent, "Yes"),
        ];
        assert_eq!(last_customer_message(&history), Some("Any trucks?"));
        assert_eq!(
            format_transcript(&history, Some("Dana")),
            "Customer: Dana\n\nCustomer: Hi\nAgent: Hello!\nCustomer: Any trucks?\nAgent: Yes"
        );
    }
}
