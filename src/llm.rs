use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::AnalysisError;

/// Turns a prompt into raw completion text. Parsing the text is the caller's
/// job.
#[async_trait]
pub trait TextAnalysisClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError>;
}

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiTextAnalysis {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiTextAnalysis {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextAnalysisClient for OpenAiTextAnalysis {
    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": 1200,
                "temperature": 0.1
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            log::warn!("text analysis API error ({status}): {text}");
            return Err(AnalysisError::Status(status.as_u16()));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AnalysisError::Empty)
    }
}
