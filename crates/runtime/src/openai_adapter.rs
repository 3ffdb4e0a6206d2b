use crate::ModelBackend;
use async_trait::async_trait;
use chatgate_common::{Error, Message, Result};
use chatgate_config::ModelConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const CONTENT_FILTER: &str = "content_filter";

/// Adapter for OpenAI-compatible chat completion APIs
pub struct OpenAiAdapter {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    filtered_statuses: Vec<u16>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiAdapter {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build model client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            filtered_statuses: config.filtered_statuses.clone(),
        })
    }

    fn upstream_error(&self, status: StatusCode, body: &str) -> Error {
        let json: Option<Value> = serde_json::from_str(body).ok();
        let error = json.as_ref().and_then(|j| j.get("error"));

        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());
        let code = error.and_then(|e| e.get("code")).and_then(Value::as_str);

        let message = format!("model request failed ({}): {}", status.as_u16(), message);
        if code == Some(CONTENT_FILTER) || self.filtered_statuses.contains(&status.as_u16()) {
            Error::content_filtered(message)
        } else {
            Error::generation(message)
        }
    }
}

#[async_trait]
impl ModelBackend for OpenAiAdapter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<String> {
        debug!("Requesting completion from {} with {} messages", self.model, messages.len());

        let mut request = self.client.post(&self.url).json(&CompletionRequest {
            model: &self.model,
            messages,
        });
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::generation(format!("model request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::generation(format!("could not read model response: {}", e)))?;

        if !status.is_success() {
            let err = self.upstream_error(status, &body);
            warn!("Model backend returned {}: {}", status, err);
            return Err(err);
        }

        let completion: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| Error::generation(format!("malformed model response: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::generation("model returned no choices"))?;

        if choice.finish_reason.as_deref() == Some(CONTENT_FILTER) {
            return Err(Error::content_filtered("completion stopped by provider content filter"));
        }

        choice
            .message
            .and_then(|m| m.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| Error::generation("model returned an empty completion"))
    }
}
