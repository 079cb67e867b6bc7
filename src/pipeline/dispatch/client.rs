use serde::{Deserialize, Serialize};

use super::DispatchError;
use crate::config::DispatchConfig;

/// Sends one composed prompt and returns the completion text.
pub trait LlmClient {
    fn complete(&self, prompt: &str) -> Result<String, DispatchError>;
}

/// Blocking client for `POST {base_url}/chat/completions` with bearer auth.
pub struct ChatCompletionClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl ChatCompletionClient {
    pub fn new(config: &DispatchConfig, api_key: &str) -> Result<Self, DispatchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DispatchError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    /// Last six characters of the key, for logs.
    pub fn key_hint(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(6)..].iter().collect();
        format!("...{tail}")
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient for ChatCompletionClient {
    fn complete(&self, prompt: &str) -> Result<String, DispatchError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    DispatchError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    DispatchError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    DispatchError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DispatchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| DispatchError::ResponseParsing(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(DispatchError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_chat_completions_shape() {
        let body = ChatRequest {
            model: "deepseek-chat",
            messages: [ChatMessage {
                role: "user",
                content: "提示\n\n主诉：无",
            }],
            stream: false,
            max_tokens: 4096,
            temperature: 0.1,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "提示\n\n主诉：无");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn response_content_is_extracted() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  结果"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("  结果"));
    }

    #[test]
    fn key_hint_shows_only_the_tail() {
        let config = DispatchConfig::default();
        let client = ChatCompletionClient::new(&config, "sk-1234567890abcdef").unwrap();
        assert_eq!(client.key_hint(), "...abcdef");
        let short = ChatCompletionClient::new(&config, "abc").unwrap();
        assert_eq!(short.key_hint(), "...abc");
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let config = DispatchConfig {
            base_url: "http://localhost:8080/v1/".into(),
            ..Default::default()
        };
        let client = ChatCompletionClient::new(&config, "k").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn llm_client_is_object_safe() {
        fn _assert(_: &dyn LlmClient) {}
    }
}
