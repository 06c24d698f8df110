// src/services/history.rs
use crate::models::ThumbnailGenResult;
use tokio::sync::RwLock;

/// In-memory log of generated thumbnails, newest first. Lost on restart.
pub struct SessionHistory {
    items: RwLock<Vec<ThumbnailGenResult>>,
    limit: usize,
}

impl SessionHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            limit: limit.max(1),
        }
    }

    pub async fn record(&self, item: ThumbnailGenResult) {
        let mut items = self.items.write().await;
        items.insert(0, item);
        items.truncate(self.limit);
    }

    pub async fn list(&self) -> Vec<ThumbnailGenResult> {
        self.items.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(prompt: &str) -> ThumbnailGenResult {
        ThumbnailGenResult {
            id: Uuid::new_v4(),
            image_url: format!("http://images.test/{prompt}"),
            original_prompt: prompt.to_string(),
            optimized_prompt: prompt.to_string(),
            style: "photo".to_string(),
            seed: 1,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn newest_first_and_bounded() {
        let history = SessionHistory::new(2);
        history.record(item("one")).await;
        history.record(item("two")).await;
        history.record(item("three")).await;

        let prompts: Vec<String> = history
            .list()
            .await
            .into_iter()
            .map(|i| i.original_prompt)
            .collect();
        assert_eq!(prompts, vec!["three", "two"]);
    }
}
