use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::config::Config;
use crate::gateway::{GenerationError, GenerationGateway};
use crate::models::{ApiEndpoint, PagePlan, ProjectInput, SchemaModification, StylingPlan, Table};

// Keeps log lines readable when the model sends back a whole schema.
fn preview(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...[{} chars]", &s[..cut], s.len()),
        None => s.to_string(),
    }
}

/// Pulls the JSON body out of a model reply, tolerating ```json fences and leading chatter.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    let open = trimmed.find(['{', '[']);
    let close = trimmed.rfind(['}', ']']);
    match (open, close) {
        (Some(o), Some(c)) if c > o => &trimmed[o..=c],
        _ => trimmed,
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.clone(),
            model: config.model.clone(),
        }
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, self.api_key);
        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));

        let payload = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "temperature": 0.7,
                "topK": 40,
                "topP": 0.95,
                "responseMimeType": "application/json"
            }
        });

        let response = self.client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| GenerationError::Http(e.to_string()))?;
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            error!("❌ Gemini API text generation failed with status {}: {}", status, preview(&response_text, 500));
            return Err(GenerationError::Http(format!("HTTP {}: {}", status, response_text)));
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::Parse(format!("Failed to parse response: {}", e)))?;

        parsed
            .candidates
            .iter()
            .flat_map(|c| c.content.parts.iter())
            .find_map(|part| match part {
                Part::Text { text } => Some(text.trim().to_string()),
                Part::Other(_) => None,
            })
            .ok_or_else(|| GenerationError::Other("No text content found in response".to_string()))
    }

    async fn generate_json<T: DeserializeOwned>(&self, what: &str, prompt: &str) -> Result<T, GenerationError> {
        info!("🎯 Generating {} with prompt: {}", what, preview(prompt, 120));
        let text = self.generate_text(prompt).await?;
        match serde_json::from_str(extract_json(&text)) {
            Ok(value) => {
                info!("✅ {} generated ({} chars)", what, text.len());
                Ok(value)
            }
            Err(e) => {
                error!("❌ {} reply was not valid JSON: {} ({})", what, e, preview(&text, 300));
                Err(GenerationError::Parse(format!("{}: {}", what, e)))
            }
        }
    }

    pub fn build_page_plan_prompt(input: &ProjectInput, single_page: bool) -> String {
        let layout = if single_page {
            "a single-page application. Return exactly one page"
        } else {
            "a multi-page application. Return every page the application needs"
        };
        let extra = serde_json::to_string(&input.extra).unwrap_or_default();
        format!(
            "Plan the pages of {layout}. Application purpose: {}. Additional details: {extra}. \
            Respond with JSON of the form {{\"pages\": [{{\"name\": string, \"purpose\": string, \"components\": [string]}}]}}. \
            Component entries are short UI component names.",
            input.purpose
        )
    }

    pub fn build_styling_prompt(input: &ProjectInput) -> String {
        format!(
            "Propose a color scheme for an application whose purpose is: {}. Preferred colors: {}. \
            Respond with JSON of the form {{\"colors\": {{\"<role>\": \"<hex color>\"}}}} using roles such as \
            primary, secondary, accent, background and text.",
            input.purpose, input.colors
        )
    }
}

#[async_trait]
impl GenerationGateway for GeminiClient {
    async fn generate_single_page_plan(&self, input: &ProjectInput) -> Result<PagePlan, GenerationError> {
        self.generate_json("single page plan", &Self::build_page_plan_prompt(input, true)).await
    }

    async fn generate_multiple_page_plan(&self, input: &ProjectInput) -> Result<PagePlan, GenerationError> {
        self.generate_json("multi page plan", &Self::build_page_plan_prompt(input, false)).await
    }

    async fn generate_styling_plan(&self, input: &ProjectInput) -> Result<StylingPlan, GenerationError> {
        self.generate_json("styling plan", &Self::build_styling_prompt(input)).await
    }

    async fn generate_api_plan(&self, description: &str) -> Result<Vec<ApiEndpoint>, GenerationError> {
        let prompt = format!(
            "Design the REST API for this application. {description}. \
            Respond with a JSON array of {{\"name\": string, \"endpoint\": string, \"method\": \"GET\"|\"POST\"|\"PUT\"|\"DELETE\"}}."
        );
        self.generate_json("api plan", &prompt).await
    }

    async fn generate_schema(&self, description: &str) -> Result<Vec<Table>, GenerationError> {
        let prompt = format!(
            "Design a relational database schema for this application. {description}. \
            Respond with a JSON array of tables: {{\"tableName\": string, \"columns\": [{{\"name\": string, \"type\": string, \
            \"primaryKey\": bool, \"foreignKey\": {{\"table\": string, \"column\": string}} or null}}], \
            \"relationships\": [{{\"relatedTable\": string}}]}}."
        );
        self.generate_json("database schema", &prompt).await
    }

    async fn modify_schema(&self, schema: &[Table], instruction: &str) -> Result<SchemaModification, GenerationError> {
        let current = serde_json::to_string(schema).map_err(|e| GenerationError::Other(e.to_string()))?;
        let prompt = format!(
            "Here is a database schema as JSON: {current}. Apply this change: {instruction}. \
            Respond with JSON of the form {{\"databaseSchema\": [...]}} using the same table format."
        );
        self.generate_json("schema modification", &prompt).await
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Other(serde::de::IgnoredAny),
}
