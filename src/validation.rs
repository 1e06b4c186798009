//! Quality gate for generated replies.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// SMS replies are short; anything below this is treated as a failed generation.
pub const MIN_LENGTH: usize = 20;
pub const MAX_LENGTH: usize = 1000;
const MIN_VEHICLES: usize = 1;
const MAX_VEHICLES: usize = 5;

pub const NO_VEHICLES_REPLY: &str = "I'd be happy to help you find the perfect vehicle! Could you tell me more about what you're looking for?";
pub const LOW_QUALITY_REPLY: &str = "Thank you for your inquiry. Let me help you find vehicles that match your needs. What type of car are you interested in?";
pub const GENERIC_REPLY: &str = "I can help you find vehicles, schedule test drives, and discuss financing options. What can I assist you with?";

const CALL_TO_ACTION: &str = "Would you like to schedule a test drive or get more information?";

static INAPPROPRIATE_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(offensive|inappropriate|unprofessional)\b",
        r"\b(price\s+too\s+high|expensive|overpriced)\b",
        r"\b(not\s+interested|don't\s+want|hate)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static CTA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"schedule.*test drive|contact.*us|call.*us|visit.*us|would you like|can i help|let me know|\?",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Issue {
    TooShort,
    TooLong,
    TooFewVehicles,
    TooManyVehicles,
    Inappropriate,
}

#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub issues: Vec<Issue>,
}

impl Validation {
    pub fn has(&self, issue: Issue) -> bool {
        self.issues.contains(&issue)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    pub fn new() -> Self {
        Self
    }

    /// Length and content are blocking; vehicle counts and over-length are
    /// recorded but leave the reply usable.
    pub fn validate(&self, text: &str, vehicle_count: usize) -> Validation {
        let mut issues = Vec::new();
        let mut is_valid = true;
        let len = text.trim().chars().count();

        if len < MIN_LENGTH {
            is_valid = false;
            issues.push(Issue::TooShort);
        }
        if len > MAX_LENGTH {
            issues.push(Issue::TooLong);
        }
        if vehicle_count < MIN_VEHICLES {
            issues.push(Issue::TooFewVehicles);
        }
        if vehicle_count > MAX_VEHICLES {
            issues.push(Issue::TooManyVehicles);
        }
        if contains_inappropriate(text) {
            is_valid = false;
            issues.push(Issue::Inappropriate);
        }

        Validation { is_valid, issues }
    }

    /// Canned reply for a rejected generation.
    pub fn fallback(&self, validation: &Validation) -> &'static str {
        if validation.has(Issue::TooFewVehicles) {
            NO_VEHICLES_REPLY
        } else if validation.has(Issue::Inappropriate) || validation.has(Issue::TooShort) {
            LOW_QUALITY_REPLY
        } else {
            GENERIC_REPLY
        }
    }
}

pub fn contains_inappropriate(text: &str) -> bool {
    let lower = text.to_lowercase();
    INAPPROPRIATE_RE.iter().any(|re| re.is_match(&lower))
}

pub fn has_call_to_action(text: &str) -> bool {
    CTA_RE.is_match(&text.to_lowercase())
}

/// Appends the standard test-drive question when `text` asks nothing of the customer.
pub fn ensure_call_to_action(text: &str) -> String {
    if has_call_to_action(text) {
        text.to_string()
    } else {
        format!("{} {}", text.trim_end(), CALL_TO_ACTION)
    }
}
