// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TubeMasterError {
    #[error("API key is missing for {provider}. Supply a key or set the provider environment variable.")]
    MissingCredential { provider: String },

    #[error("{0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Primary & fallback models failed. Primary: {primary}. Fallback: {fallback}")]
    CompositeFailure { primary: String, fallback: String },
}

impl TubeMasterError {
    pub fn missing_credential(provider: impl Into<String>) -> Self {
        TubeMasterError::MissingCredential {
            provider: provider.into(),
        }
    }

    /// Friendly guidance for failures users commonly hit.
    pub fn hint(&self) -> Option<&'static str> {
        let message = self.to_string();
        if message.contains("content must be a string") {
            Some("The selected Groq model is text-only. Switch to OpenRouter for image analysis.")
        } else if message.contains("401") {
            Some("Authentication failed (401). Please check your API key.")
        } else if matches!(self, TubeMasterError::MissingCredential { .. }) {
            Some("Enter your API key in the settings or configure the environment variables.")
        } else {
            None
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TubeMasterError::MissingCredential { .. } => "Missing credential",
            TubeMasterError::Transport(_) => "AI service error",
            TubeMasterError::MalformedResponse(_) => "Malformed AI response",
            TubeMasterError::InvalidInput(_) => "Validation error",
            TubeMasterError::CompositeFailure { .. } => "AI service unavailable",
        }
    }
}

impl ResponseError for TubeMasterError {
    fn status_code(&self) -> StatusCode {
        match self {
            TubeMasterError::MissingCredential { .. } | TubeMasterError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            TubeMasterError::Transport(_) | TubeMasterError::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            TubeMasterError::CompositeFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = serde_json::json!({
            "error": self.label(),
            "message": self.to_string()
        });
        if let Some(hint) = self.hint() {
            body["hint"] = serde_json::Value::from(hint);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
