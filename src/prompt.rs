//! Prompt construction for SMS-style replies.
//!
//! A prompt has three parts: a system prompt carrying the persona, style
//! guidelines and tone; two few-shot examples; and the user section with the
//! customer's message and (for grounded prompts) the top retrieved vehicles.

use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::models::{format_price, group_thousands};
use crate::store::ScoredVehicle;

/// Voice of generated replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Friendly,
    Professional,
    Concise,
}

impl Tone {
    fn instruction(&self) -> &'static str {
        match self {
            Tone::Friendly => "Use contractions, casual language, and be warm and approachable.",
            Tone::Professional => "Be polite and business-like while remaining conversational.",
            Tone::Concise => "Keep responses brief and to the point while being helpful.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Built around retrieved vehicles.
    Grounded,
    /// No vehicles; asks a clarifying question.
    Generic,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    pub kind: PromptKind,
    pub system: String,
    /// Few-shot examples followed by the customer section.
    pub user: String,
}

impl Prompt {
    /// The whole prompt as one string.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

struct Example {
    input: &'static str,
    output: &'static str,
}

const GROUNDED_EXAMPLES: &[Example] = &[
    Example {
        input: "Do you have a white Tiguan under 32k?",
        output: "Hey! I found a 2021 Volkswagen Tiguan in white for $29,500 with 28,000 miles. It's in great condition and ready for a test drive. Would you like to come by this weekend to check it out?",
    },
    Example {
        input: "Looking for a 2021-2023 Civic EX around 20k.",
        output: "Perfect! I've got a 2022 Honda Civic EX with 35,000 miles for $19,800. It's loaded with features and has a clean history. When would you like to take it for a spin?",
    },
    Example {
        input: "Any hybrids under 25k?",
        output: "Great timing! I have a 2021 Toyota Prius with 42,000 miles for $23,900. It's in excellent condition and gets amazing fuel economy. Want me to hold it for you to see this week?",
    },
];

const GENERIC_EXAMPLES: &[Example] = &[
    Example {
        input: "SUV with 3rd row this weekend.",
        output: "I'd love to help you find the perfect SUV with a third row! What's your budget range, and do you have a preference for make or size? This will help me show you the best options we have available.",
    },
    Example {
        input: "Do you still have the blue Camry SE from your site?",
        output: "Let me check our current inventory for that blue Camry SE. Can you tell me what year it was and roughly when you saw it on our site? This will help me find the exact vehicle you're interested in.",
    },
    Example {
        input: "What's your best deal on a sedan?",
        output: "I'd be happy to show you our best sedan deals! To find the perfect match, what's your budget range and do you have any specific features you're looking for? We have several great options across different price points.",
    },
];

const EXAMPLES_PER_PROMPT: usize = 2;
const CARS_PER_PROMPT: usize = 3;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    agent: AgentConfig,
}

impl PromptBuilder {
    pub fn new(agent: AgentConfig) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    pub fn grounded(&self, message: &str, cars: &[ScoredVehicle]) -> Prompt {
        let user = format!(
            "{}Customer message: \"{}\"\n\nAvailable vehicles:\n{}\n\n\
             Please respond in a conversational, SMS-style manner. \
             Keep it to 2-5 short sentences with one clear next step or question.",
            examples_block(GROUNDED_EXAMPLES),
            message.trim(),
            format_cars(cars)
        );
        Prompt {
            kind: PromptKind::Grounded,
            system: self.system_prompt(),
            user,
        }
    }

    pub fn generic(&self, message: &str) -> Prompt {
        let user = format!(
            "{}Customer message: \"{}\"\n\n\
             No specific vehicles found in inventory. \
             Please respond helpfully and ask a clarifying question to better understand their needs.",
            examples_block(GENERIC_EXAMPLES),
            message.trim()
        );
        Prompt {
            kind: PromptKind::Generic,
            system: self.system_prompt(),
            user,
        }
    }

    /// Grounded when there are vehicles, generic otherwise.
    pub fn build(&self, message: &str, cars: &[ScoredVehicle]) -> Prompt {
        if cars.is_empty() {
            self.generic(message)
        } else {
            self.grounded(message, cars)
        }
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are a {} for {}.\n\n\
             Style guidelines:\n\
             - Reply as SMS: short sentences, contractions, no corporate jargon\n\
             - Be specific but casual and conversational\n\
             - Include exactly one clear next step (ask a single question or provide one CTA)\n\
             - If you aren't sure about something, ask a clarifying question\n\
             - Never invent inventory details you don't have\n\
             - Reference cars naturally in conversation (not as bullet lists)\n\
             - {}\n\
             - Keep responses to 2-5 short sentences maximum\n\
             - Personalize with customer name if available\n\n\
             When referencing vehicles, weave key details (year/make/model/price/mileage/availability) into natural prose.",
            self.agent.persona,
            self.agent.dealership_name,
            self.agent.tone.instruction()
        );

        if let Some(signature) = self.agent.signature.as_deref().filter(|s| !s.trim().is_empty()) {
            prompt.push_str(&format!("\n\nEnd responses with: {}", signature));
        }
        prompt
    }
}

fn examples_block(examples: &[Example]) -> String {
    let mut text = String::from("Examples:\n");
    for example in examples.iter().take(EXAMPLES_PER_PROMPT) {
        text.push_str(&format!("Customer: \"{}\"\n", example.input));
        text.push_str(&format!("You: \"{}\"\n\n", example.output));
    }
    text
}

/// `"1. 2021 Volkswagen Tiguan - $29,500, 28,000 miles (Features: AWD) [Match: 87.0%]"`,
/// one line per car, top three only.
pub fn format_cars(cars: &[ScoredVehicle]) -> String {
    if cars.is_empty() {
        return "No specific vehicles found.".to_string();
    }

    cars.iter()
        .take(CARS_PER_PROMPT)
        .enumerate()
        .map(|(i, car)| {
            let v = &car.vehicle;
            let mileage = match v.mileage {
                Some(m) if m > 0 => format!("{} miles", group_thousands(m)),
                _ => "Mileage available upon request".to_string(),
            };
            let mut line = format!(
                "{}. {} - {}, {}",
                i + 1,
                v.title(),
                format_price(v.price_value()),
                mileage
            );
            if let Some(features) = v.features.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
                line.push_str(&format!(" (Features: {})", features));
            }
            line.push_str(&format!(" [Match: {:.1}%]", car.similarity_score * 100.0));
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
