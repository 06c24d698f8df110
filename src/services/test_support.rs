// src/services/test_support.rs
use crate::errors::TubeMasterError;
use crate::services::provider::{HttpTransport, TransportResponse};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl RecordedPost {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// In-memory transport that replays queued responses and records every call.
/// An exhausted queue behaves like an unreachable host.
#[derive(Default)]
pub struct ScriptedTransport {
    post_responses: Mutex<VecDeque<TransportResponse>>,
    get_responses: Mutex<VecDeque<TransportResponse>>,
    posts: Mutex<Vec<RecordedPost>>,
    gets: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_post(&self, status: u16, body: String) {
        self.post_responses
            .lock()
            .unwrap()
            .push_back(TransportResponse { status, body });
    }

    pub fn push_get(&self, status: u16, body: String) {
        self.get_responses
            .lock()
            .unwrap()
            .push_back(TransportResponse { status, body });
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<TransportResponse, TubeMasterError> {
        self.posts.lock().unwrap().push(RecordedPost {
            url: url.to_string(),
            headers: headers.to_vec(),
            body: body.clone(),
        });
        self.post_responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TubeMasterError::Transport(format!("Request to {} failed: connection refused", url)))
    }

    async fn get(&self, url: &str) -> Result<TransportResponse, TubeMasterError> {
        self.gets.lock().unwrap().push(url.to_string());
        self.get_responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TubeMasterError::Transport(format!("Request to {} failed: connection refused", url)))
    }
}

/// A chat-completions body whose first choice carries `content`.
pub fn choice_body(content: &str) -> String {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}
