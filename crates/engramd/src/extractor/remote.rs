//! Remote completion provider for OpenAI-compatible chat APIs.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CompletionConfig;
use crate::error::{EngineError, Result};
use crate::extractor::provider::CompletionProvider;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Completion backend over a hosted OpenAI-compatible chat endpoint.
#[derive(Debug)]
pub struct RemoteCompletion {
    client: Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl RemoteCompletion {
    /// Reads the API key from the environment variable named in config.
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = env::var(&config.api_key_env).map_err(|_| {
            EngineError::Config(format!("API key env var '{}' not set", config.api_key_env))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Provider(e.to_string()))?;

        info!(
            model = %config.model,
            api_url = %config.api_url,
            "remote completion provider initialized"
        );

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Call the chat endpoint with exponential backoff on 429.
    async fn call_api(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            max_tokens: 1024,
        };

        let url = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));
        debug!(url = %url, "calling completion API");

        let mut last_error = None;
        let mut delay = Duration::from_secs(1);

        for attempt in 0..MAX_RETRIES {
            match self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();

                    if status == 429 {
                        warn!(
                            attempt = attempt + 1,
                            "rate limited by completion API, backing off {delay:?}"
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                        continue;
                    }

                    if !status.is_success() {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "unknown error".to_string());
                        return Err(EngineError::Provider(format!(
                            "completion API returned {status}: {error_text}"
                        )));
                    }

                    let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
                        EngineError::Provider(format!("malformed completion response: {e}"))
                    })?;

                    return completion
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| {
                            EngineError::Provider("completion API returned no choices".to_string())
                        });
                }
                Err(e) => {
                    let message = e.to_string();
                    last_error = Some(message.clone());
                    if attempt < MAX_RETRIES - 1 {
                        warn!(attempt = attempt + 1, error = %message, "completion request failed, retrying");
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(EngineError::Provider(format!(
            "completion API failed after {MAX_RETRIES} attempts: {}",
            last_error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

/// Strip Markdown code fences that chat models routinely wrap JSON in.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim_end_matches('`').trim()
}

#[async_trait]
impl CompletionProvider for RemoteCompletion {
    async fn complete_json(&self, system: &str, user: &str) -> Result<serde_json::Value> {
        let content = self.call_api(system, user).await?;
        let cleaned = strip_code_fences(&content);
        serde_json::from_str(cleaned)
            .map_err(|e| EngineError::Provider(format!("completion was not valid JSON: {e}")))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plain_fences() {
        let content = "```\n{\"facts\": []}\n```";
        assert_eq!(strip_code_fences(content), "{\"facts\": []}");
    }

    #[test]
    fn strips_json_fences() {
        let content = "```json\n{\"strand\": \"general\"}\n```";
        assert_eq!(strip_code_fences(content), "{\"strand\": \"general\"}");
    }

    #[test]
    fn leaves_bare_json_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }
}
