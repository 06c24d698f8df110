// src/models.rs
use crate::services::normalizer;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Encoded image as handed over by the UI, usually a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload(pub String);

impl ImagePayload {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn from_bytes(content_type: &str, data: &[u8]) -> Self {
        use base64::{Engine as _, engine::general_purpose};
        Self(format!(
            "data:{};base64,{}",
            content_type,
            general_purpose::STANDARD.encode(data)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank text, or a data URI with nothing after the comma.
    pub fn is_empty(&self) -> bool {
        let encoded = self.0.trim();
        if encoded.is_empty() {
            return true;
        }
        encoded.starts_with("data:")
            && encoded
                .split_once(',')
                .is_none_or(|(_, body)| body.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionProviderKind {
    Groq,
    OpenRouter,
}

impl VisionProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Some(Self::Groq),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub image_a: Option<ImagePayload>,
    pub image_b: Option<ImagePayload>,
    pub provider: VisionProviderKind,
    pub credential: Option<String>,
}

// Outgoing chat messages

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Blocks(blocks),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

// Comparison output

/// Caller-facing identity of a compared image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    A,
    B,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub winner: Verdict,
    pub score_a: f64,
    pub score_b: f64,
    pub reasoning: String,
    pub breakdown: Vec<CriterionVerdict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionVerdict {
    pub criterion: String,
    pub winner: Verdict,
    pub explanation: String,
}

// Feature endpoint records. Model output is loosely shaped, so every field
// defaults and scalar fields accept whatever JSON type the model chose.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeywordResult {
    #[serde(deserialize_with = "lenient_text")]
    pub keyword: String,
    #[serde(deserialize_with = "lenient_text")]
    pub search_volume: String,
    #[serde(deserialize_with = "lenient_number")]
    pub difficulty: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub opportunity_score: f64,
    #[serde(deserialize_with = "lenient_text")]
    pub trend: String,
    #[serde(deserialize_with = "lenient_text")]
    pub intent: String,
    #[serde(deserialize_with = "lenient_text")]
    pub cpc: String,
    #[serde(deserialize_with = "lenient_text")]
    pub competition_density: String,
    #[serde(deserialize_with = "lenient_text")]
    pub top_competitor: String,
    #[serde(deserialize_with = "lenient_text")]
    pub video_age_avg: String,
    #[serde(deserialize_with = "lenient_text")]
    pub ctr_potential: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptSection {
    #[serde(deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(deserialize_with = "lenient_text")]
    pub content: String,
    #[serde(deserialize_with = "lenient_text")]
    pub duration: String,
    #[serde(deserialize_with = "lenient_text")]
    pub visual_cue: String,
    #[serde(deserialize_with = "lenient_text")]
    pub logic_step: String,
    #[serde(deserialize_with = "lenient_text")]
    pub psychological_trigger: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptResponse {
    #[serde(deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(deserialize_with = "lenient_text")]
    pub estimated_duration: String,
    #[serde(deserialize_with = "lenient_text")]
    pub target_audience: String,
    pub sections: Vec<ScriptSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompetitorAnalysisResult {
    #[serde(deserialize_with = "lenient_text")]
    pub channel_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub subscriber_estimate: String,
    #[serde(deserialize_with = "lenient_list")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub weaknesses: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub content_gaps: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub top_performing_topics: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub action_plan: String,
}

/// Strings as-is, numbers and booleans printed, arrays joined line by line.
/// Anything else is empty.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null | Value::Object(_) => String::new(),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Value::deserialize(deserializer).map(|value| value_text(&value))
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Value::deserialize(deserializer).map(|value| normalizer::number_or_zero(&value))
}

/// An array of scalars, or a single scalar treated as a one-item list.
fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items.iter().map(value_text).collect(),
        other => vec![value_text(&other)],
    };
    Ok(items.into_iter().filter(|item| !item.is_empty()).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailGenResult {
    pub id: Uuid,
    pub image_url: String,
    pub original_prompt: String,
    pub optimized_prompt: String,
    pub style: String,
    pub seed: u32,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

// Request bodies

#[derive(Debug, Clone, Deserialize)]
pub struct TopicRequest {
    pub topic: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptRequest {
    pub title: String,
    #[serde(default)]
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishTimeRequest {
    pub title: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub tags: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompetitorRequest {
    pub channel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailGenRequest {
    pub prompt: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub optimize: bool,
}
