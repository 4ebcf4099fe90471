//! Gemini `generateContent` adapter for [`AnswerComposer`].
//!
//! Wire types are private to this module; callers only see prompt in, text out.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use medrag_core::config::AnswerSettings;

use crate::answer::AnswerComposer;

#[derive(Debug, Clone)]
pub struct GeminiComposer {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    api_key: String,
}

impl GeminiComposer {
    pub fn new(settings: &AnswerSettings, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
            api_key,
        })
    }

    /// Reads the API key from the environment variable named by `api_key_env`.
    pub fn from_settings(settings: &AnswerSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("environment variable {} is not set", settings.api_key_env))?;
        Self::new(settings, api_key)
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content { role: Some("user".to_string()), parts: vec![Part { text: prompt.to_string() }] }],
            generation_config: GenerationConfig { temperature: self.temperature, max_output_tokens: self.max_output_tokens },
        }
    }
}

impl AnswerComposer for GeminiComposer {
    fn ask(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "sending generateContent request");
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request(prompt))
            .send()
            .map_err(|e| {
                error!(error = %e, "generateContent request failed (transport)");
                anyhow!("request failed: {e}")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("generateContent returned {status}: {}", body.trim());
        }
        let parsed: GenerateResponse = response.json().context("failed to parse generateContent response")?;
        extract_text(parsed)
    }
}

fn extract_text(parsed: GenerateResponse) -> Result<String> {
    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("empty or missing content in response"))?;
    Ok(text)
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}
