// src/config.rs
use crate::models::VisionProviderKind;

pub const DEFAULT_GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_IMAGE_GEN_URL: &str = "https://image.pollinations.ai/prompt";
pub const DEFAULT_SCRAPE_PROXY_URL: &str = "https://api.allorigins.win/get";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Process-wide settings, read once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub groq_api_key: String,
    pub openrouter_api_key: String,
    pub groq_api_url: String,
    pub openrouter_api_url: String,
    pub image_gen_url: String,
    pub scrape_proxy_url: String,
    pub history_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. `VITE_`-prefixed keys
    /// win over the plain ones so frontend-style env files keep working.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let first_of = |keys: &[&str]| keys.iter().find_map(|key| non_blank(*key));

        let history_limit = non_blank("HISTORY_LIMIT")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_HISTORY_LIMIT);

        Self {
            bind_addr: first_of(&["TUBEMASTER_BIND"]).unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            groq_api_key: first_of(&["VITE_GROQ_API_KEY", "GROQ_API_KEY"]).unwrap_or_default(),
            openrouter_api_key: first_of(&["VITE_OPENROUTER_API_KEY", "OPENROUTER_API_KEY"])
                .unwrap_or_default(),
            groq_api_url: first_of(&["GROQ_API_URL"])
                .unwrap_or_else(|| DEFAULT_GROQ_API_URL.into()),
            openrouter_api_url: first_of(&["OPENROUTER_API_URL"])
                .unwrap_or_else(|| DEFAULT_OPENROUTER_API_URL.into()),
            image_gen_url: first_of(&["IMAGE_GEN_URL"])
                .unwrap_or_else(|| DEFAULT_IMAGE_GEN_URL.into()),
            scrape_proxy_url: first_of(&["SCRAPE_PROXY_URL"])
                .unwrap_or_else(|| DEFAULT_SCRAPE_PROXY_URL.into()),
            history_limit,
        }
    }

    /// Explicit caller key first, then the provider's configured key, then empty.
    pub fn resolve_credential(&self, provider: VisionProviderKind, explicit: Option<&str>) -> String {
        if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
            return key.to_string();
        }
        match provider {
            VisionProviderKind::Groq => self.groq_api_key.trim().to_string(),
            VisionProviderKind::OpenRouter => self.openrouter_api_key.trim().to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
