// src/services/features.rs
use crate::config::AppConfig;
use crate::errors::TubeMasterError;
use crate::models::{
    ChatMessage, CompetitorAnalysisResult, KeywordResult, ScriptResponse, ThumbnailGenResult,
};
use crate::services::normalizer::RawModelResult;
use crate::services::provider::{ChatRequest, ProviderClient};
use log::{info, warn};
use rand::Rng;
use regex::Regex;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

const PAGE_CONTEXT_LIMIT: usize = 2000;
const THUMBNAIL_WIDTH: u32 = 1280;
const THUMBNAIL_HEIGHT: u32 = 720;
const IMAGE_MODEL: &str = "flux";

/// Text-model backed features. One prompt, one call, one parsed result each.
pub struct FeatureService {
    config: Arc<AppConfig>,
    client: Arc<ProviderClient>,
}

impl FeatureService {
    pub fn new(config: Arc<AppConfig>, client: Arc<ProviderClient>) -> Self {
        Self { config, client }
    }

    async fn ask_brain(&self, prompt: String, json_mode: bool) -> Result<String, TubeMasterError> {
        let messages = [ChatMessage::user_text(prompt)];
        let request = ChatRequest::brain(&self.config.groq_api_url, &messages, json_mode);
        self.client.complete(&request, &self.config.groq_api_key).await
    }

    async fn ask_brain_json(&self, prompt: String) -> Result<RawModelResult, TubeMasterError> {
        let text = self.ask_brain(prompt, true).await?;
        RawModelResult::parse(&text)
    }

    pub async fn find_keywords(&self, topic: &str) -> Result<Vec<KeywordResult>, TubeMasterError> {
        let topic = require("topic", topic)?;
        let prompt = format!(
            r#"Act as a world-class YouTube SEO expert.
Analyze the topic "{topic}" and generate exactly 10 high-potential keywords.
For EACH keyword report these 10 logic points:
1. searchVolume: estimated monthly searches.
2. difficulty: keyword difficulty, 0-100.
3. opportunityScore: 0-100.
4. trend: Rising, Stable, Falling or Seasonal.
5. intent: Informational, Educational, Entertainment or Commercial.
6. cpc: estimated cost per click in dollars.
7. competitionDensity: Low, Medium, High or Very High.
8. topCompetitor: a likely channel name.
9. videoAgeAvg: whether ranking videos are Fresh or Old.
10. ctrPotential: High, Average or Low.
Return strictly a JSON object with a key "keywords" holding an array of objects,
each with a "keyword" field plus the fields above."#
        );

        let raw = self.ask_brain_json(prompt).await?;
        let keywords: Vec<KeywordResult> = decode_rows(raw.list("keywords"));
        info!("Keyword research for '{}' returned {} rows", topic, keywords.len());
        Ok(keywords)
    }

    pub async fn generate_script(
        &self,
        title: &str,
        audience: &str,
    ) -> Result<ScriptResponse, TubeMasterError> {
        let title = require("title", title)?;
        let prompt = format!(
            r#"Write a YouTube script for "{title}" targeting "{audience}".
Use these logic sections in order: Hook, Stakes, Context, Twist, Value, Retention Spike, Emotion, Re-engagement, Payoff.
Return strictly JSON with keys: title, estimatedDuration, targetAudience, sections.
Each entry in sections has: title, content, duration, visualCue, logicStep, psychologicalTrigger."#,
            audience = audience.trim()
        );

        let raw = self.ask_brain_json(prompt).await?;
        if !raw.get("sections").is_some_and(Value::is_array) {
            return Err(TubeMasterError::MalformedResponse(
                "Invalid script format received".to_string(),
            ));
        }
        serde_json::from_value(raw.into_value()).map_err(|e| {
            TubeMasterError::MalformedResponse(format!("Invalid script format received: {}", e))
        })
    }

    pub async fn generate_titles(&self, topic: &str) -> Result<Vec<String>, TubeMasterError> {
        let topic = require("topic", topic)?;
        let prompt = format!(
            r#"Generate 10 click-worthy YouTube titles for: "{topic}". Return a JSON object with key "titles" holding an array of strings."#
        );

        let raw = self.ask_brain_json(prompt).await?;
        Ok(raw
            .list("titles")
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn suggest_best_time(
        &self,
        title: &str,
        audience: &str,
        tags: &str,
    ) -> Result<String, TubeMasterError> {
        let title = require("title", title)?;
        let mut prompt = format!(
            r#"Best time to publish the YouTube video "{title}" for "{audience}". Explain why."#,
            audience = audience.trim()
        );
        if !tags.trim().is_empty() {
            prompt.push_str(&format!(" Video tags: {}.", tags.trim()));
        }
        self.ask_brain(prompt, false).await
    }

    pub async fn analyze_competitor(
        &self,
        channel_url: &str,
    ) -> Result<CompetitorAnalysisResult, TubeMasterError> {
        let channel_url = require("channel_url", channel_url)?;
        let page_context = match self.scrape_channel(channel_url).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Channel scrape failed for {}: {}", channel_url, e);
                format!("Channel URL: {} (Scrape failed)", channel_url)
            }
        };
        let page_context: String = page_context.chars().take(PAGE_CONTEXT_LIMIT).collect();

        let prompt = format!(
            r#"Analyze this YouTube channel: {page_context}
Identify 3 strengths, 3 weaknesses, 3 content gaps, and an action plan.
Return strictly JSON with keys: channelName, subscriberEstimate, strengths, weaknesses, contentGaps, topPerformingTopics, actionPlan."#
        );

        let raw = self.ask_brain_json(prompt).await?;
        serde_json::from_value(raw.into_value()).map_err(|e| {
            TubeMasterError::MalformedResponse(format!("Invalid competitor analysis: {}", e))
        })
    }

    async fn scrape_channel(&self, channel_url: &str) -> Result<String, TubeMasterError> {
        let proxy_url = Url::parse_with_params(&self.config.scrape_proxy_url, &[("url", channel_url)])
            .map_err(|e| TubeMasterError::InvalidInput(format!("Bad proxy URL: {}", e)))?;

        let response = self.client.transport().get(proxy_url.as_str()).await?;
        if !response.is_success() {
            return Err(TubeMasterError::Transport(format!(
                "Proxy error ({})",
                response.status
            )));
        }

        let envelope: Value = serde_json::from_str(&response.body)
            .map_err(|e| TubeMasterError::MalformedResponse(format!("Proxy envelope: {}", e)))?;
        let html = envelope["contents"]
            .as_str()
            .filter(|html| !html.is_empty())
            .ok_or_else(|| {
                TubeMasterError::MalformedResponse("Could not fetch channel page".to_string())
            })?;

        let (title, description) = page_metadata(html);
        Ok(format!(
            "Channel: {}\nDesc: {}",
            title.unwrap_or_default(),
            description.unwrap_or_default()
        ))
    }

    /// Builds a thumbnail image URL, optionally rewriting the prompt first.
    /// Optimisation failures are logged and the original prompt is used.
    pub async fn generate_thumbnail(
        &self,
        prompt: &str,
        style: &str,
        mood: &str,
        optimize: bool,
    ) -> Result<ThumbnailGenResult, TubeMasterError> {
        let prompt = require("prompt", prompt)?;

        let mut optimized_prompt = prompt.to_string();
        if optimize {
            let rewrite = format!(
                r#"Rewrite this image prompt for high CTR. Style: {style}. Mood: {mood}. Original: "{prompt}". Output ONLY the prompt."#
            );
            match self.ask_brain(rewrite, false).await {
                Ok(text) if !text.trim().is_empty() => optimized_prompt = text.trim().to_string(),
                Ok(_) => warn!("Prompt optimisation returned nothing, keeping original"),
                Err(e) => warn!("Prompt optimisation failed: {}", e),
            }
        }

        let seed = rand::thread_rng().gen_range(0..1_000_000);
        let image_url = thumbnail_url(&self.config.image_gen_url, &optimized_prompt, seed)?;

        Ok(ThumbnailGenResult {
            id: Uuid::new_v4(),
            image_url,
            original_prompt: prompt.to_string(),
            optimized_prompt,
            style: style.to_string(),
            seed,
            created_at: chrono::Utc::now().timestamp_millis(),
        })
    }
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, TubeMasterError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TubeMasterError::InvalidInput(format!("{} is required", field)));
    }
    Ok(value)
}

fn decode_rows<T: DeserializeOwned>(rows: &[Value]) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match serde_json::from_value(row.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Skipping undecodable row: {}", e);
                None
            }
        })
        .collect()
}

pub fn thumbnail_url(base: &str, prompt: &str, seed: u32) -> Result<String, TubeMasterError> {
    let mut url = Url::parse(base)
        .map_err(|e| TubeMasterError::InvalidInput(format!("Bad image generation URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| TubeMasterError::InvalidInput("Image generation URL cannot be a base".to_string()))?
        .pop_if_empty()
        .push(prompt);
    url.query_pairs_mut()
        .append_pair("width", &THUMBNAIL_WIDTH.to_string())
        .append_pair("height", &THUMBNAIL_HEIGHT.to_string())
        .append_pair("seed", &seed.to_string())
        .append_pair("model", IMAGE_MODEL)
        .append_pair("nologo", "true");
    Ok(url.into())
}

/// `<title>` text and the `description` meta tag of an HTML page.
pub fn page_metadata(html: &str) -> (Option<String>, Option<String>) {
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        let title = Regex::new(r"(?s)<title>(.*?)</title>").ok()?;
        let description = Regex::new(r#"name="description" content="(.*?)""#).ok()?;
        Some((title, description))
    });
    let Some((title, description)) = patterns else {
        return (None, None);
    };

    let capture = |re: &Regex| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };
    (capture(title), capture(description))
}
