//! HTTP execution engine
//!
//! Calls either the Anthropic Messages API or an OpenAI-compatible chat
//! completions endpoint, depending on the provider's flavor. Each execution
//! is a single request; nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::parse::{SYSTEM_PROMPT, parse_bundle, user_message};
use super::{EngineError, EngineTarget, ExecutionEngine, ProgressReporter};
use crate::domain::ArtifactBundle;
use crate::providers::ApiFlavor;

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Token ceiling for a single response
const MAX_TOKENS: u32 = 8192;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Usage {
    input: u64,
    output: u64,
}

/// reqwest based engine for all registry providers
pub struct LlmEngine {
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmEngine {
    pub fn new() -> Result<Self, EngineError> {
        debug!("LlmEngine::new: called");
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(EngineError::Network)?;
        Ok(Self {
            http,
            max_tokens: MAX_TOKENS,
            timeout: REQUEST_TIMEOUT,
        })
    }

    fn anthropic_body(&self, model: &str, user: &str) -> serde_json::Value {
        debug!(%model, "LlmEngine::anthropic_body: called");
        serde_json::json!({
            "model": model,
            "max_tokens": self.max_tokens,
            "system": SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": user }
            ],
        })
    }

    fn openai_body(&self, model: &str, user: &str) -> serde_json::Value {
        debug!(%model, "LlmEngine::openai_body: called");
        let mut body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user },
            ],
        });

        // o1/o3 reasoning models take max_completion_tokens and reject temperature
        let reasoning = model.starts_with("o1") || model.starts_with("o3");
        if reasoning {
            body["max_completion_tokens"] = serde_json::json!(self.max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(self.max_tokens);
            body["temperature"] = serde_json::json!(0.7);
        }
        body
    }

    async fn post(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, EngineError> {
        debug!(%url, "LlmEngine::post: called");
        let mut request = self.http.post(url).header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::from_transport(e, self.timeout))?;

        let status = response.status().as_u16();
        if status == 429 {
            debug!("LlmEngine::post: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(EngineError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            debug!(%status, "LlmEngine::post: API error");
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::ApiError { status, message });
        }

        Ok(response)
    }

    async fn call_anthropic(
        &self,
        target: &EngineTarget,
        user: &str,
        progress: &ProgressReporter,
    ) -> Result<String, EngineError> {
        debug!(model = %target.model, "LlmEngine::call_anthropic: called");
        let key = target.api_key.clone().ok_or_else(|| EngineError::MissingCredential {
            provider: target.provider.name.clone(),
        })?;
        let url = format!("{}/messages", target.provider.base_url);
        let headers = [("x-api-key", key), ("anthropic-version", ANTHROPIC_VERSION.to_string())];

        progress.report(format!("Sending request to {}…", target.provider.name)).await;
        let response = self
            .post(&url, &headers, &self.anthropic_body(&target.model, user))
            .await?;
        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let (text, usage) = parsed.into_text()?;
        progress
            .report(format!("Received {} input / {} output tokens", usage.input, usage.output))
            .await;
        Ok(text)
    }

    async fn call_openai_compatible(
        &self,
        target: &EngineTarget,
        user: &str,
        progress: &ProgressReporter,
    ) -> Result<String, EngineError> {
        debug!(model = %target.model, "LlmEngine::call_openai_compatible: called");
        let key = match (&target.api_key, target.provider.requires_key()) {
            (Some(key), _) => key.clone(),
            // Local servers accept any bearer token
            (None, false) => target.provider.id.clone(),
            (None, true) => {
                return Err(EngineError::MissingCredential {
                    provider: target.provider.name.clone(),
                });
            }
        };
        let url = format!("{}/chat/completions", target.provider.base_url);
        let headers = [("authorization", format!("Bearer {}", key))];

        progress.report(format!("Sending request to {}…", target.provider.name)).await;
        let response = self.post(&url, &headers, &self.openai_body(&target.model, user)).await?;
        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let (text, usage) = parsed.into_text()?;
        progress
            .report(format!(
                "Received {} prompt / {} completion tokens",
                usage.input, usage.output
            ))
            .await;
        Ok(text)
    }
}

#[async_trait]
impl ExecutionEngine for LlmEngine {
    async fn execute(
        &self,
        target: &EngineTarget,
        task_description: &str,
        progress: &ProgressReporter,
    ) -> Result<ArtifactBundle, EngineError> {
        debug!(provider = %target.provider.id, model = %target.model, "LlmEngine::execute: called");
        progress
            .report(format!("Calling {} / {}…", target.provider.id, target.model))
            .await;

        let user = user_message(task_description);
        let raw = match target.provider.flavor {
            ApiFlavor::Anthropic => self.call_anthropic(target, &user, progress).await?,
            ApiFlavor::OpenAiCompatible => self.call_openai_compatible(target, &user, progress).await?,
        };

        progress.report("Parsing response…").await;
        let bundle = parse_bundle(&raw);
        progress
            .report(format!(
                "Got {} file(s), output type: {}",
                bundle.files.len(),
                bundle.output_type
            ))
            .await;
        info!(files = bundle.files.len(), "Execution produced bundle");
        Ok(bundle)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl AnthropicResponse {
    fn into_text(self) -> Result<(String, Usage), EngineError> {
        let text: String = self
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect();
        if text.is_empty() {
            return Err(EngineError::InvalidResponse("empty response from Anthropic".to_string()));
        }
        Ok((
            text,
            Usage {
                input: self.usage.input_tokens,
                output: self.usage.output_tokens,
            },
        ))
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: OpenAiUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl OpenAiResponse {
    fn into_text(self) -> Result<(String, Usage), EngineError> {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EngineError::InvalidResponse("no choices in response".to_string()))?;
        Ok((
            text,
            Usage {
                input: self.usage.prompt_tokens,
                output: self.usage.completion_tokens,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderRegistry;

    fn engine() -> LlmEngine {
        LlmEngine::new().unwrap()
    }

    #[test]
    fn test_anthropic_body() {
        let body = engine().anthropic_body("claude-sonnet-4-6", "hello");
        assert_eq!(body["model"], "claude-sonnet-4-6");
        assert_eq!(body["max_tokens"], 8192);
        assert_eq!(body["messages"][0]["content"], "hello");
        assert!(body["system"].as_str().unwrap().contains("output_type"));
    }

    #[test]
    fn test_openai_body_regular_and_reasoning_models() {
        let body = engine().openai_body("gpt-4o", "hi");
        assert_eq!(body["max_tokens"], 8192);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["messages"][0]["role"], "system");

        let body = engine().openai_body("o3-mini", "hi");
        assert_eq!(body["max_completion_tokens"], 8192);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_anthropic_response_text_and_usage() {
        let json = r#"{"content":[{"type":"text","text":"{\"a\":"},{"type":"text","text":"1}"}],
                       "usage":{"input_tokens":12,"output_tokens":34}}"#;
        let parsed: AnthropicResponse = serde_json::from_str(json).unwrap();
        let (text, usage) = parsed.into_text().unwrap();
        assert_eq!(text, "{\"a\":1}");
        assert_eq!(usage, Usage { input: 12, output: 34 });
    }

    #[test]
    fn test_openai_response_without_choices_is_invalid() {
        let parsed: OpenAiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(parsed.into_text(), Err(EngineError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let registry = ProviderRegistry::builtin();
        let target = EngineTarget {
            provider: registry.get("openai").unwrap().clone(),
            model: "gpt-4o".to_string(),
            api_key: None,
        };
        let (reporter, mut rx) = ProgressReporter::channel(8);
        let result = engine().execute(&target, "task", &reporter).await;
        drop(reporter);
        assert!(matches!(result, Err(EngineError::MissingCredential { .. })));

        let mut messages = Vec::new();
        while let Some(m) = rx.recv().await {
            messages.push(m);
        }
        assert_eq!(messages, vec!["Calling openai / gpt-4o…".to_string()]);
    }
}
