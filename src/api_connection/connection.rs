use dotenv::dotenv;
use reqwest::Client;
use serde_json::json;
use std::env;
use tracing::debug;

use super::endpoints::{ChatCompletionRequest, ChatCompletionResponse, Provider, OPENROUTER_CHAT_URL};
use crate::errors::ApiConnectionError;

impl Provider {
    pub fn openrouter(api_key_env_var_name: &str) -> Self {
        dotenv().ok();
        Self::OpenRouter {
            api_key: api_key_env_var_name.to_string(),
            url: OPENROUTER_CHAT_URL.to_string(),
        }
    }

    /// Same provider against another OpenAI-compatible endpoint.
    pub fn with_url(self, url: impl Into<String>) -> Self {
        match self {
            Provider::OpenRouter { api_key, .. } => Provider::OpenRouter {
                api_key,
                url: url.into(),
            },
        }
    }

    pub async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        match self {
            Provider::OpenRouter {
                api_key: api_key_env_var_name,
                url,
            } => {
                dotenv().ok();
                let actual_api_key = env::var(api_key_env_var_name)
                    .map_err(|_| ApiConnectionError::MissingApiKey(api_key_env_var_name.clone()))?;

                let client = Client::new();

                let mut request_payload = serde_json::to_value(&request)?;
                if let Some(obj) = request_payload.as_object_mut() {
                    obj.insert("provider".to_string(), json!({ "only": ["Cerebras"] }));
                }

                let site_url = env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
                let app_name = env::var("APP_NAME").unwrap_or_else(|_| "RecipeTransform".to_string());

                debug!(model = %request.model, url = %url, "sending chat completion");
                let response = client
                    .post(url)
                    .bearer_auth(actual_api_key)
                    .header("Content-Type", "application/json")
                    .header("HTTP-Referer", site_url)
                    .header("X-Title", app_name)
                    .json(&request_payload)
                    .send()
                    .await?;

                if response.status().is_success() {
                    let chat_response = response.json::<ChatCompletionResponse>().await?;
                    Ok(chat_response)
                } else {
                    let status = response.status();
                    let error_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to read error body".to_string());
                    Err(ApiConnectionError::ApiError { status, error_body })
                }
            }
        }
    }
}
