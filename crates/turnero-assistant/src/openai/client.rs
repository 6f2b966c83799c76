// OpenAI Assistants (v2) implementation of the assistant contract

use crate::config::AssistantConfig;
use crate::traits::{AssistantClient, RunRequest};
use crate::types::message::MessageList;
use crate::types::{MessageRole, Run, ToolOutput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const BETA_HEADER: &str = "openai-beta";

/// Assistants API client (HTTP direct, no SDK)
pub struct OpenAIAssistantsClient {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

impl OpenAIAssistantsClient {
    pub fn new(config: AssistantConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .context("Invalid API key format")?,
        );
        headers.insert(
            HeaderName::from_static(BETA_HEADER),
            HeaderValue::from_str(&config.beta).context("Invalid beta header value")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let response = self
            .http_client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;

        Self::parse(path, response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .http_client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;

        Self::parse(path, response).await
    }

    async fn parse<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Assistant API error on {} ({}): {}", path, status, error_text);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }

    fn build_run_payload(request: &RunRequest) -> Value {
        let mut payload = json!({ "assistant_id": request.assistant_id });
        if let Some(obj) = payload.as_object_mut() {
            if let Some(model) = &request.model {
                obj.insert("model".to_string(), json!(model));
            }
            if let Some(instructions) = &request.instructions {
                obj.insert("instructions".to_string(), json!(instructions));
            }
            if let Some(extra) = &request.additional_instructions {
                obj.insert("additional_instructions".to_string(), json!(extra));
            }
        }
        payload
    }
}

#[async_trait]
impl AssistantClient for OpenAIAssistantsClient {
    async fn create_thread(&self) -> Result<String> {
        let thread: ThreadObject = self.post("/threads", &json!({})).await?;
        tracing::debug!(thread_id = %thread.id, "Created assistant thread");
        Ok(thread.id)
    }

    async fn add_message(&self, thread_id: &str, role: MessageRole, content: &str) -> Result<()> {
        let _: Value = self
            .post(
                &format!("/threads/{}/messages", thread_id),
                &json!({ "role": role, "content": content }),
            )
            .await?;
        Ok(())
    }

    async fn start_run(&self, thread_id: &str, request: RunRequest) -> Result<Run> {
        let payload = Self::build_run_payload(&request);
        self.post(&format!("/threads/{}/runs", thread_id), &payload).await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.get(&format!("/threads/{}/runs/{}", thread_id, run_id), &[])
            .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run> {
        self.post(
            &format!("/threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            &json!({ "tool_outputs": outputs }),
        )
        .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.post(
            &format!("/threads/{}/runs/{}/cancel", thread_id, run_id),
            &json!({}),
        )
        .await
    }

    async fn latest_assistant_message(
        &self,
        thread_id: &str,
        run_id: Option<&str>,
    ) -> Result<Option<String>> {
        let mut query = vec![("order", "desc"), ("limit", "20")];
        if let Some(run_id) = run_id {
            query.push(("run_id", run_id));
        }

        let page: MessageList = self
            .get(&format!("/threads/{}/messages", thread_id), &query)
            .await?;

        Ok(page
            .data
            .iter()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.plain_text())
            .filter(|text| !text.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_payload_only_carries_overrides() {
        let payload = OpenAIAssistantsClient::build_run_payload(&RunRequest::new("asst_1"));
        assert_eq!(payload, json!({ "assistant_id": "asst_1" }));

        let payload = OpenAIAssistantsClient::build_run_payload(
            &RunRequest::new("asst_1")
                .model("gpt-4o-mini")
                .additional_instructions("Today is 2024-05-01"),
        );
        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["additional_instructions"], "Today is 2024-05-01");
        assert!(payload.get("instructions").is_none());
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let result = OpenAIAssistantsClient::new(AssistantConfig::new("bad\nkey"));
        assert!(result.is_err());
    }
}
