//! Documentation generator abstraction and implementations.
//!
//! [`DocumentGenerator`] turns a doc type plus retrieved code context into
//! rendered markdown. Providers mirror the embedding side: a disabled
//! stand-in, Ollama (`/api/generate`), and OpenAI chat completions, all
//! with the same backoff-and-retry treatment of transient HTTP failures.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GeneratorConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::{DocType, SearchHit};

/// Trait for documentation generators.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    fn model_name(&self) -> &str;
    /// Render documentation for `doc_type` from the retrieved context.
    async fn generate(&self, doc_type: &DocType, context: &[SearchHit])
        -> Result<String, CoreError>;
}

/// Build the generation prompt from the retrieved chunks.
fn build_prompt(doc_type: &DocType, context: &[SearchHit]) -> String {
    let mut prompt = format!(
        "Write the {} documentation for this codebase in markdown. \
         Base it only on the code excerpts below.\n",
        doc_type
    );
    for hit in context {
        prompt.push_str(&format!(
            "\n## {}:{} (lines {}-{})\n```{}\n{}\n```\n",
            hit.path, hit.name, hit.start_line, hit.end_line, hit.language, hit.text
        ));
    }
    prompt
}

/// A no-op generator that always returns errors.
pub struct DisabledGenerator;

#[async_trait]
impl DocumentGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(
        &self,
        _doc_type: &DocType,
        _context: &[SearchHit],
    ) -> Result<String, CoreError> {
        Err(CoreError::Generation(
            "generator provider is disabled".to_string(),
        ))
    }
}

/// Generator using a local Ollama instance's `/api/generate` endpoint.
pub struct OllamaGenerator {
    model: String,
    url: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> CoreResult<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| CoreError::Input("generator.model required for Ollama provider".to_string()))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            url,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl DocumentGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        doc_type: &DocType,
        context: &[SearchHit],
    ) -> Result<String, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| CoreError::Generation(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": build_prompt(doc_type, context),
            "stream": false,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/api/generate", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| CoreError::Generation(e.to_string()))?;
                        return json
                            .get("response")
                            .and_then(|r| r.as_str())
                            .map(|s| s.to_string())
                            .ok_or_else(|| {
                                CoreError::Generation(
                                    "invalid Ollama response: missing response field".to_string(),
                                )
                            });
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(CoreError::Generation(format!(
                            "Ollama API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(CoreError::Generation(format!(
                        "Ollama API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(CoreError::Generation(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            CoreError::Generation("generation failed after retries".to_string())
        }))
    }
}

/// Generator using the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiGenerator {
    model: String,
    api_key: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAiGenerator {
    pub fn new(config: &GeneratorConfig) -> CoreResult<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| CoreError::Input("generator.model required for OpenAI provider".to_string()))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| CoreError::Generation("OPENAI_API_KEY environment variable not set".to_string()))?;

        Ok(Self {
            model,
            api_key,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl DocumentGenerator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        doc_type: &DocType,
        context: &[SearchHit],
    ) -> Result<String, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| CoreError::Generation(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You are a technical writer producing accurate, concise developer documentation."},
                {"role": "user", "content": build_prompt(doc_type, context)},
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| CoreError::Generation(e.to_string()))?;
                        return json
                            .get("choices")
                            .and_then(|c| c.get(0))
                            .and_then(|c| c.get("message"))
                            .and_then(|m| m.get("content"))
                            .and_then(|c| c.as_str())
                            .map(|s| s.to_string())
                            .ok_or_else(|| {
                                CoreError::Generation(
                                    "invalid OpenAI response: missing message content".to_string(),
                                )
                            });
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(CoreError::Generation(format!(
                            "OpenAI API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(CoreError::Generation(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(CoreError::Generation(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            CoreError::Generation("generation failed after retries".to_string())
        }))
    }
}

/// Create the appropriate [`DocumentGenerator`] based on configuration.
pub fn create_generator(config: &GeneratorConfig) -> CoreResult<Arc<dyn DocumentGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config)?)),
        other => Err(CoreError::Input(format!(
            "unknown generator provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_includes_context() {
        let hits = vec![SearchHit {
            chunk_id: "src/a.py:alpha:3".to_string(),
            path: "src/a.py".to_string(),
            name: "alpha".to_string(),
            start_line: 3,
            end_line: 5,
            language: "python".to_string(),
            text: "def alpha():\n    return 1".to_string(),
            score: 0.9,
        }];
        let prompt = build_prompt(&DocType::Readme, &hits);
        assert!(prompt.contains("README"));
        assert!(prompt.contains("src/a.py:alpha (lines 3-5)"));
        assert!(prompt.contains("def alpha()"));
    }
}
