// src/services/provider.rs
use crate::config::AppConfig;
use crate::errors::TubeMasterError;
use crate::models::{ChatMessage, VisionProviderKind};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub const MODEL_BRAIN: &str = "moonshotai/kimi-k2-instruct-0905";
pub const MODEL_VISION_GROQ: &str = "llama-3.2-90b-vision-preview";
pub const MODEL_VISION_OPENROUTER: &str = "x-ai/grok-4.1-fast";
pub const MODEL_VISION_OPENROUTER_FALLBACK: &str = "meta-llama/llama-3.2-11b-vision-instruct:free";

const BRAIN_TEMPERATURE: f32 = 0.6;
const BRAIN_MAX_TOKENS: u32 = 4096;
const VISION_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network seam: every outbound request goes through here. `post_json`
/// sets the JSON content type itself.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<TransportResponse, TubeMasterError>;

    async fn get(&self, url: &str) -> Result<TransportResponse, TubeMasterError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<TransportResponse, TubeMasterError> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|e| TubeMasterError::Transport(format!("Request to {} failed: {}", url, e)))?;
        read_response(url, response).await
    }

    async fn get(&self, url: &str) -> Result<TransportResponse, TubeMasterError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TubeMasterError::Transport(format!("Request to {} failed: {}", url, e)))?;
        read_response(url, response).await
    }
}

async fn read_response(
    url: &str,
    response: reqwest::Response,
) -> Result<TransportResponse, TubeMasterError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| {
        TubeMasterError::Transport(format!(
            "Failed to read response body from {} (HTTP {}): {}",
            url, status, e
        ))
    })?;
    Ok(TransportResponse { status, body })
}

/// What the comparison pipeline needs to know about a vision-capable provider.
pub trait VisionProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn endpoint(&self) -> &str;
    fn default_model(&self) -> &str;
    fn fallback_model(&self) -> Option<&str>;
    fn extra_headers(&self) -> Vec<(String, String)>;
}

pub struct GroqVision {
    endpoint: String,
}

impl GroqVision {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl VisionProvider for GroqVision {
    fn name(&self) -> &'static str {
        "GROQ"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn default_model(&self) -> &str {
        MODEL_VISION_GROQ
    }

    fn fallback_model(&self) -> Option<&str> {
        None
    }

    fn extra_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

pub struct OpenRouterVision {
    endpoint: String,
}

impl OpenRouterVision {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl VisionProvider for OpenRouterVision {
    fn name(&self) -> &'static str {
        "OPENROUTER"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn default_model(&self) -> &str {
        MODEL_VISION_OPENROUTER
    }

    fn fallback_model(&self) -> Option<&str> {
        Some(MODEL_VISION_OPENROUTER_FALLBACK)
    }

    // Some OpenRouter routes reject requests without app identification.
    fn extra_headers(&self) -> Vec<(String, String)> {
        vec![
            ("HTTP-Referer".to_string(), "https://tubemaster.ai".to_string()),
            ("X-Title".to_string(), "TubeMaster AI".to_string()),
        ]
    }
}

pub fn vision_provider(config: &AppConfig, kind: VisionProviderKind) -> Arc<dyn VisionProvider> {
    match kind {
        VisionProviderKind::Groq => Arc::new(GroqVision::new(config.groq_api_url.clone())),
        VisionProviderKind::OpenRouter => {
            Arc::new(OpenRouterVision::new(config.openrouter_api_url.clone()))
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// One chat-completions call, fully described.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub provider: &'a str,
    pub endpoint: &'a str,
    pub model: &'a str,
    pub extra_headers: Vec<(String, String)>,
    pub messages: &'a [ChatMessage],
    pub json_mode: bool,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

impl<'a> ChatRequest<'a> {
    /// Text-only request against the Groq "brain" model.
    pub fn brain(endpoint: &'a str, messages: &'a [ChatMessage], json_mode: bool) -> Self {
        Self {
            provider: "GROQ",
            endpoint,
            model: MODEL_BRAIN,
            extra_headers: Vec::new(),
            messages,
            json_mode,
            temperature: Some(BRAIN_TEMPERATURE),
            max_tokens: BRAIN_MAX_TOKENS,
        }
    }

    pub fn vision(
        provider: &'a dyn VisionProvider,
        model_override: Option<&'a str>,
        messages: &'a [ChatMessage],
    ) -> Self {
        Self {
            provider: provider.name(),
            endpoint: provider.endpoint(),
            model: model_override.unwrap_or_else(|| provider.default_model()),
            extra_headers: provider.extra_headers(),
            messages,
            json_mode: true,
            temperature: None,
            max_tokens: VISION_MAX_TOKENS,
        }
    }
}

pub struct ProviderClient {
    transport: Arc<dyn HttpTransport>,
}

impl ProviderClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    /// Sends the request and returns the text of the first choice.
    pub async fn complete(
        &self,
        request: &ChatRequest<'_>,
        credential: &str,
    ) -> Result<String, TubeMasterError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(TubeMasterError::missing_credential(request.provider));
        }

        let mut headers = vec![("Authorization".to_string(), format!("Bearer {}", credential))];
        headers.extend(request.extra_headers.iter().cloned());

        let body = CompletionBody {
            model: request.model,
            messages: request.messages,
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
            max_tokens: request.max_tokens,
        };
        let body = serde_json::to_value(&body).map_err(|e| {
            TubeMasterError::InvalidInput(format!("Failed to serialize request: {}", e))
        })?;

        debug!("{} request with model {}", request.provider, request.model);
        let response = self
            .transport
            .post_json(request.endpoint, &headers, &body)
            .await
            .inspect_err(|e| error!("{} call failed: {}", request.provider, e))?;

        if !response.is_success() {
            error!("{} returned HTTP {}", request.provider, response.status);
            return Err(TubeMasterError::Transport(format!(
                "{} API error ({}): {}",
                request.provider, response.status, response.body
            )));
        }

        first_choice_content(request.provider, &response.body)
    }
}

fn first_choice_content(provider: &str, body: &str) -> Result<String, TubeMasterError> {
    let data: Value = serde_json::from_str(body).map_err(|_| {
        TubeMasterError::MalformedResponse(format!("{} API returned non-JSON body: {}", provider, body))
    })?;

    let has_choices = data["choices"].as_array().is_some_and(|c| !c.is_empty());
    if !has_choices {
        if let Some(err) = data.get("error").filter(|e| !e.is_null()) {
            let message = err["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(TubeMasterError::Transport(format!(
                "{} API error: {}",
                provider, message
            )));
        }
        return Err(TubeMasterError::MalformedResponse(format!(
            "{} API returned unexpected format (no choices): {}",
            provider, body
        )));
    }

    data["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            TubeMasterError::MalformedResponse(format!(
                "{} API returned a choice without text content: {}",
                provider, body
            ))
        })
}
