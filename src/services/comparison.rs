// src/services/comparison.rs
//! Thumbnail A/B comparison through a vision model.
//!
//! Images are compressed concurrently, presented to the model in a random
//! order to cancel its positional preference, and the verdict is mapped back
//! to the caller's A/B labels. OpenRouter gets one retry on its free-tier
//! fallback model.

use crate::config::AppConfig;
use crate::errors::TubeMasterError;
use crate::models::{
    ChatMessage, ComparisonRequest, ComparisonResult, ContentBlock, CriterionVerdict, ImagePayload,
    ImageUrl, Verdict,
};
use crate::services::image_processor::ImageProcessor;
use crate::services::normalizer::RawModelResult;
use crate::services::provider::{ChatRequest, ProviderClient, VisionProvider, vision_provider};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub const COMPARISON_RUBRIC: &str = r#"
You are a YouTube thumbnail optimization specialist running a high-stakes A/B test.
Two thumbnails follow this message: the FIRST image ("1") and the SECOND image ("2").

CONTEXT:
- Most views happen on phones, so thumbnails are seen small.
- A high click-through rate needs instant comprehension.
- Wide "B-roll" or artistic shots usually lose.
- Emotive close-ups usually win.

Score both images against two groups of factors.

CLARITY (how fast the thumbnail reads on a small screen):
1. Mobile legibility: squint at it; is the main subject still obvious? (weight 20%)
2. Facial dominance: is a face large and expressive? Close-up beats full body. (weight 15%)
3. Text readability: large, bold, high-contrast text of fewer than five words. (weight 10%)
4. Subject isolation: clear separation between subject and background. (weight 10%)
5. Visual hierarchy: one obvious focal point. (weight 5%)
6. Compositional balance: rule of thirds and deliberate framing. (weight 5%)

PULL (how strongly it makes someone click):
7. Curiosity gap: does it raise a question that demands a click? (weight 10%)
8. Color vibrancy: saturated, contrasty color instead of dull or washed out. (weight 10%)
9. Emotional impact: extreme emotion such as shock, fear or joy beats neutral. (weight 10%)
10. Lighting quality: professional lighting instead of dark or amateur. (weight 5%)

BIAS CORRECTION:
- Models tend to prefer whichever image comes last. Ignore the order you saw them in.
- Models tend to prefer "pretty" artistic images. Ignore that too.
- Prefer close-up, emotive framing over wide or artistic framing. A face close-up
  against a wide landscape wins nine times out of ten.

Respond with JSON only, in exactly this shape:
{
  "shot_type_1": "Close-up | Mid | Wide",
  "shot_type_2": "Close-up | Mid | Wide",
  "winner": "1" or "2",
  "score1": 0-10 float,
  "score2": 0-10 float,
  "reasoning": "Why the winner gets more clicks on mobile.",
  "breakdown": [
    { "criterion": "Mobile legibility", "winner": "1" or "2", "explanation": "..." }
  ]
}
Include one breakdown entry for each of the ten factors.
"#;

/// Position of an image in the message actually sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentedSlot {
    First,
    Second,
}

impl PresentedSlot {
    /// Accepts `"1"`, `1`, `"Image 1"`, `"image 2"` and similar labels.
    pub fn parse(value: &Value) -> Option<Self> {
        let label = match value {
            Value::String(s) => s.trim().to_ascii_lowercase(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        match label.as_str() {
            "1" | "1.0" | "first" => Some(Self::First),
            "2" | "2.0" | "second" => Some(Self::Second),
            _ if label.contains("image 1") => Some(Self::First),
            _ if label.contains("image 2") => Some(Self::Second),
            _ => None,
        }
    }
}

/// Maps a presentation slot back to the caller's label.
pub fn remap_slot(slot: PresentedSlot, swapped: bool) -> Verdict {
    match (slot, swapped) {
        (PresentedSlot::First, false) | (PresentedSlot::Second, true) => Verdict::A,
        (PresentedSlot::Second, false) | (PresentedSlot::First, true) => Verdict::B,
    }
}

/// Decides whether A and B trade places before presentation.
pub trait SwapStrategy: Send + Sync {
    fn should_swap(&self) -> bool;
}

/// Fair coin, seedable for reproducible runs.
pub struct RandomSwap {
    rng: Mutex<StdRng>,
}

impl RandomSwap {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSwap {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapStrategy for RandomSwap {
    fn should_swap(&self) -> bool {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_bool(0.5)
    }
}

pub struct FixedSwap(pub bool);

impl SwapStrategy for FixedSwap {
    fn should_swap(&self) -> bool {
        self.0
    }
}

pub struct ComparisonOrchestrator {
    config: Arc<AppConfig>,
    client: Arc<ProviderClient>,
    image_processor: ImageProcessor,
    swap: Arc<dyn SwapStrategy>,
}

impl ComparisonOrchestrator {
    pub fn new(
        config: Arc<AppConfig>,
        client: Arc<ProviderClient>,
        image_processor: ImageProcessor,
        swap: Arc<dyn SwapStrategy>,
    ) -> Self {
        Self {
            config,
            client,
            image_processor,
            swap,
        }
    }

    pub async fn compare(
        &self,
        request: ComparisonRequest,
    ) -> Result<ComparisonResult, TubeMasterError> {
        let (image_a, image_b) = match (request.image_a, request.image_b) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => (a, b),
            _ => {
                return Err(TubeMasterError::InvalidInput(
                    "Please upload both thumbnails for analysis.".to_string(),
                ));
            }
        };

        let provider = vision_provider(&self.config, request.provider);
        let credential = self
            .config
            .resolve_credential(request.provider, request.credential.as_deref());
        if credential.is_empty() {
            return Err(TubeMasterError::missing_credential(provider.name()));
        }

        let (compressed_a, compressed_b) = futures_util::future::join(
            self.image_processor.compress(&image_a),
            self.image_processor.compress(&image_b),
        )
        .await;

        let swapped = self.swap.should_swap();
        let (first, second) = if swapped {
            (compressed_b, compressed_a)
        } else {
            (compressed_a, compressed_b)
        };
        let messages = vec![comparison_message(&first, &second)];

        info!(
            "Comparing thumbnails via {} (swapped: {})",
            provider.name(),
            swapped
        );

        match self.attempt(provider.as_ref(), None, &messages, &credential, swapped).await {
            Ok(result) => Ok(result),
            Err(primary) => match provider.fallback_model() {
                Some(fallback_model) => {
                    warn!(
                        "Primary {} model failed ({}), retrying with {}",
                        provider.name(),
                        primary,
                        fallback_model
                    );
                    self.attempt(
                        provider.as_ref(),
                        Some(fallback_model),
                        &messages,
                        &credential,
                        swapped,
                    )
                    .await
                    .map_err(|fallback| TubeMasterError::CompositeFailure {
                        primary: primary.to_string(),
                        fallback: fallback.to_string(),
                    })
                }
                None => Err(primary),
            },
        }
    }

    async fn attempt(
        &self,
        provider: &dyn VisionProvider,
        model_override: Option<&str>,
        messages: &[ChatMessage],
        credential: &str,
        swapped: bool,
    ) -> Result<ComparisonResult, TubeMasterError> {
        let request = ChatRequest::vision(provider, model_override, messages);
        let text = self.client.complete(&request, credential).await?;
        let raw = RawModelResult::parse(&text)?;
        interpret_verdict(&raw, swapped)
    }
}

pub fn comparison_message(first: &ImagePayload, second: &ImagePayload) -> ChatMessage {
    ChatMessage::user_blocks(vec![
        ContentBlock::Text {
            text: COMPARISON_RUBRIC.to_string(),
        },
        ContentBlock::ImageUrl {
            image_url: ImageUrl {
                url: first.as_str().to_string(),
            },
        },
        ContentBlock::ImageUrl {
            image_url: ImageUrl {
                url: second.as_str().to_string(),
            },
        },
    ])
}

/// Turns the model's first/second verdict into the caller's A/B frame.
/// Scores are moved with their image; they are not reconciled with the winner.
pub fn interpret_verdict(
    raw: &RawModelResult,
    swapped: bool,
) -> Result<ComparisonResult, TubeMasterError> {
    let winner_slot = PresentedSlot::parse(&raw.value()["winner"]).ok_or_else(|| {
        TubeMasterError::MalformedResponse(format!(
            "Unrecognised winner label in model output: {}",
            raw.value()["winner"]
        ))
    })?;

    let score_first = raw.number_or_zero("score1").clamp(0.0, 10.0);
    let score_second = raw.number_or_zero("score2").clamp(0.0, 10.0);
    let (score_a, score_b) = if swapped {
        (score_second, score_first)
    } else {
        (score_first, score_second)
    };

    let breakdown = raw
        .array("breakdown")
        .iter()
        .filter_map(|item| {
            let criterion = item["criterion"].as_str().unwrap_or_default().to_string();
            match PresentedSlot::parse(&item["winner"]) {
                Some(slot) => Some(CriterionVerdict {
                    criterion,
                    winner: remap_slot(slot, swapped),
                    explanation: item["explanation"].as_str().unwrap_or_default().to_string(),
                }),
                None => {
                    warn!("Dropping breakdown row without a usable winner: {}", item);
                    None
                }
            }
        })
        .collect();

    Ok(ComparisonResult {
        winner: remap_slot(winner_slot, swapped),
        score_a,
        score_b,
        reasoning: raw.str_or_default("reasoning"),
        breakdown,
    })
}
