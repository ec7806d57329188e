use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{Config, GenerationConfig};
use crate::gateway::Gateway;
use crate::state::{Role, Turn};

#[derive(Serialize, Debug, PartialEq)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: WireGenerationConfig,
}

#[derive(Serialize, Debug, PartialEq)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug, PartialEq)]
struct Part {
    text: String,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    max_output_tokens: u32,
}

impl From<&GenerationConfig> for WireGenerationConfig {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Client for the Gemini `generateContent` endpoint
///
/// The sampling parameters and the optional system instruction are fixed when
/// the client is built.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    generation: GenerationConfig,
    system_instruction: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: &str, config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            generation: config.generation.clone(),
            system_instruction: config.instruction(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl Gateway for GeminiClient {
    async fn generate(&self, history: &[Turn], prompt: &str) -> Result<String> {
        let request = build_request(
            history,
            prompt,
            &self.generation,
            self.system_instruction.as_deref(),
        );

        tracing::debug!(model = %self.model, history = history.len(), "sending generateContent");

        // Key goes in a header so it never appears in a reqwest error's URL
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Gemini API request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    tracing::debug!(error = %err, "could not read error body");
                    String::new()
                }
            };
            tracing::warn!(%status, "Gemini API returned an error");
            return Err(anyhow!("Gemini API error {}: {}", status, api_error_message(&body)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let reply = extract_reply(parsed)?;
        tracing::debug!(chars = reply.chars().count(), "reply received");
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn build_request(
    history: &[Turn],
    prompt: &str,
    generation: &GenerationConfig,
    system_instruction: Option<&str>,
) -> GenerateContentRequest {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|turn| Content {
            role: Some(turn.role),
            parts: vec![Part {
                text: turn.content.clone(),
            }],
        })
        .collect();

    contents.push(Content {
        role: Some(Role::User),
        parts: vec![Part {
            text: prompt.to_string(),
        }],
    });

    GenerateContentRequest {
        contents,
        system_instruction: system_instruction.map(|text| Content {
            role: None,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }),
        generation_config: generation.into(),
    }
}

fn extract_reply(response: GenerateContentResponse) -> Result<String> {
    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);

    let candidate = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next());

    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

    let text: String = candidate
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if !text.is_empty() {
        return Ok(text);
    }

    match (block_reason, finish_reason) {
        (Some(reason), _) => Err(anyhow!("Gemini returned an empty response (blocked: {})", reason)),
        (None, Some(reason)) => Err(anyhow!("Gemini returned an empty response (finish reason: {})", reason)),
        (None, None) => Err(anyhow!("Gemini returned an empty response")),
    }
}

/// Pull the human-readable message out of a Gemini error body
fn api_error_message(body: &str) -> String {
    if body.trim().is_empty() {
        return "no error body".to_string();
    }
    match serde_json::from_str::<ErrorWrapper>(body) {
        Ok(wrapper) => match (wrapper.error.message, wrapper.error.status) {
            (Some(message), _) => message,
            (None, Some(status)) => status,
            (None, None) => body.to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}
