use crate::reasons;
use crate::Scanner;
use async_trait::async_trait;
use chatgate_common::{BlockReasonMode, Error, RationaleLocale, Result};
use chatgate_config::SafetyConfig;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Header carrying the scanning service API key
pub const AUTH_HEADER: &str = "x-pan-token";

const DEFAULT_APP_NAME: &str = "ChatGate";

/// Where and how to scan. Fields are only readable inside this module.
#[derive(Clone)]
pub struct SafetyProfile {
    endpoint: String,
    api_key: String,
    profile_id: String,
    model_name: String,
    app_name: String,
}

impl SafetyProfile {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        profile_id: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            profile_id: profile_id.into(),
            model_name: model_name.into(),
            app_name: DEFAULT_APP_NAME.to_string(),
        }
    }

    /// Build from the `safety` config section; the model name comes from the model section
    pub fn from_config(config: &SafetyConfig, model_name: &str) -> Self {
        Self::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            config.profile_id.clone(),
            model_name,
        )
        .with_app_name(config.app_name.clone())
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Scanning is on iff a non-blank profile id is configured
    pub fn is_enabled(&self) -> bool {
        !self.profile_id.trim().is_empty()
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("endpoint", &self.endpoint),
            ("api_key", &self.api_key),
            ("profile_id", &self.profile_id),
            ("model_name", &self.model_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

impl std::fmt::Debug for SafetyProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyProfile")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("profile_id", &self.profile_id)
            .field("model_name", &self.model_name)
            .field("app_name", &self.app_name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanAction {
    Allow,
    Block,
}

/// Verdict for a single scan call
#[derive(Debug, Clone, PartialEq)]
pub struct ScanVerdict {
    pub action: ScanAction,
    /// `prompt_detected` or `response_detected`, as sent by the service
    pub detected_flags: Option<Value>,
    pub scan_id: Option<String>,
    pub category: Option<String>,
}

impl ScanVerdict {
    pub fn allow() -> Self {
        Self {
            action: ScanAction::Allow,
            detected_flags: None,
            scan_id: None,
            category: None,
        }
    }

    pub fn block(detected_flags: Value) -> Self {
        Self {
            action: ScanAction::Block,
            detected_flags: Some(detected_flags),
            scan_id: None,
            category: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.action == ScanAction::Block
    }

    /// Rationale for a block; `None` for an allow
    pub fn rationale(&self, mode: BlockReasonMode, locale: RationaleLocale) -> Option<String> {
        match self.action {
            ScanAction::Allow => None,
            ScanAction::Block => Some(reasons::resolve(
                self.detected_flags.as_ref(),
                mode,
                locale,
            )),
        }
    }
}

#[derive(Serialize)]
struct ScanEnvelope<'a> {
    tr_id: String,
    session_id: &'a str,
    ai_profile: AiProfile<'a>,
    metadata: ScanMetadata<'a>,
    contents: [ScanContent<'a>; 1],
}

#[derive(Serialize)]
struct AiProfile<'a> {
    profile_id: &'a str,
}

#[derive(Serialize)]
struct ScanMetadata<'a> {
    app_name: &'a str,
    ai_model: &'a str,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ScanContent<'a> {
    Prompt { prompt: &'a str },
    Response { response: &'a str, context: &'a str },
}

impl ScanContent<'_> {
    fn kind(&self) -> &'static str {
        match self {
            ScanContent::Prompt { .. } => "prompt",
            ScanContent::Response { .. } => "response",
        }
    }
}

#[derive(Deserialize)]
struct ScanResult {
    action: ScanAction,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    scan_id: Option<String>,
    #[serde(default)]
    prompt_detected: Option<Value>,
    #[serde(default)]
    response_detected: Option<Value>,
}

/// HTTP client for the content-safety scanning service
#[derive(Debug, Clone)]
pub struct ScanClient {
    profile: SafetyProfile,
    client: Client,
}

impl ScanClient {
    /// Always succeeds. An incomplete profile is only reported.
    pub fn new(profile: SafetyProfile) -> Self {
        let missing = profile.missing_fields();
        if !missing.is_empty() {
            let err = Error::ConfigurationIncomplete(missing.join(", "));
            warn!(enabled = profile.is_enabled(), "Safety scanner: {}", err);
        }

        Self {
            profile,
            client: Client::new(),
        }
    }

    fn envelope<'a>(
        &'a self,
        conversation_id: &'a str,
        content: ScanContent<'a>,
    ) -> ScanEnvelope<'a> {
        ScanEnvelope {
            tr_id: uuid::Uuid::new_v4().to_string(),
            session_id: conversation_id,
            ai_profile: AiProfile {
                profile_id: &self.profile.profile_id,
            },
            metadata: ScanMetadata {
                app_name: &self.profile.app_name,
                ai_model: &self.profile.model_name,
            },
            contents: [content],
        }
    }

    async fn send(&self, envelope: ScanEnvelope<'_>) -> Result<ScanVerdict> {
        let kind = envelope.contents[0].kind();
        debug!(tr_id = %envelope.tr_id, session_id = envelope.session_id, "Scanning {}", kind);

        let response = self
            .client
            .post(&self.profile.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(AUTH_HEADER, &self.profile.api_key)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| Error::ScanFailed(format!("scan request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::ScanFailed(format!("could not read scan response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::ScanFailed(format!(
                "scan request failed ({}). API message: {}",
                status.as_u16(),
                upstream_message(&body, status)
            )));
        }

        let result: ScanResult = serde_json::from_str(&body)
            .map_err(|e| Error::ScanFailed(format!("malformed scan response: {}", e)))?;

        let detected_flags = match envelope.contents[0] {
            ScanContent::Prompt { .. } => result.prompt_detected,
            ScanContent::Response { .. } => result.response_detected,
        };

        Ok(ScanVerdict {
            action: result.action,
            detected_flags,
            scan_id: result.scan_id,
            category: result.category,
        })
    }
}

#[async_trait]
impl Scanner for ScanClient {
    fn enabled(&self) -> bool {
        self.profile.is_enabled()
    }

    async fn scan_prompt(&self, conversation_id: &str, prompt: &str) -> Result<ScanVerdict> {
        self.send(self.envelope(conversation_id, ScanContent::Prompt { prompt }))
            .await
    }

    async fn scan_response(
        &self,
        conversation_id: &str,
        prompt: &str,
        response: &str,
    ) -> Result<ScanVerdict> {
        self.send(self.envelope(
            conversation_id,
            ScanContent::Response {
                response,
                context: prompt,
            },
        ))
        .await
    }
}

/// `error.message`, then `message`, then the status reason
fn upstream_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(Value::as_str)
                .or_else(|| json.get("message").and_then(Value::as_str))
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string())
}
