use crate::{config::Config, error::RecommendationError, models::Intent};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid JSON fence pattern")
});

const SYSTEM_PROMPT: &str = "You are a smart shopping assistant that turns shopping requests \
into structured search constraints. Reply with a single JSON object and nothing else.";

/// Turns a free-text shopping query into structured constraints.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, query: &str) -> Result<Intent, RecommendationError>;
}

/// Intent extraction through the OpenAI chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiIntentExtractor {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

impl OpenAiIntentExtractor {
    pub fn new(config: &Config) -> Result<Self, RecommendationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                RecommendationError::ExtractionFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            endpoint: format!(
                "{}/chat/completions",
                config.openai_base_url.trim_end_matches('/')
            ),
        })
    }

    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, RecommendationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RecommendationError::ExtractionFailed(format!("OpenAI request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RecommendationError::ExtractionFailed(format!(
                "OpenAI returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            RecommendationError::ExtractionFailed(format!("Failed to parse OpenAI response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| RecommendationError::ExtractionFailed("Empty OpenAI response".into()))
    }
}

#[async_trait]
impl IntentExtractor for OpenAiIntentExtractor {
    #[instrument(skip(self))]
    async fn extract(&self, query: &str) -> Result<Intent, RecommendationError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RecommendationError::ExtractionFailed("OpenAI API key is not configured".into())
        })?;

        let content = self.complete(api_key, &build_prompt(query)).await?;
        debug!("Extracted query info: {}", content);

        parse_intent(&content)
    }
}

fn build_prompt(query: &str) -> String {
    format!(
        r#"Extract from the shopping request below:
- category: the product category (e.g. shoes, electronics, clothing)
- budget: the price range in USD as a two-number array [min, max]
- features: the key features asked for (e.g. waterproof, lightweight, gaming)

Use null for anything the request does not mention.

Shopping request: "{}"

Respond with JSON using exactly the keys "category", "budget" and "features"."#,
        query
    )
}

/// Parse the model's reply into an intent.
///
/// The reply may wrap the object in a markdown fence or surround it with prose.
pub fn parse_intent(content: &str) -> Result<Intent, RecommendationError> {
    let json = extract_json(content).ok_or_else(|| {
        RecommendationError::MalformedIntent(format!("No JSON object in reply: {}", content))
    })?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| RecommendationError::MalformedIntent(format!("Invalid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(RecommendationError::MalformedIntent(
            "Reply is not a JSON object".to_string(),
        ));
    }

    Intent::from_json(&value)
}

fn extract_json(content: &str) -> Option<&str> {
    if let Some(captures) = JSON_FENCE.captures(content) {
        return captures.get(1).map(|m| m.as_str());
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (start < end).then(|| &content[start..=end])
}
