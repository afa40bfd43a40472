use crate::{LlmProvider, ProviderError};
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CHAT_MODEL: &str = "anthropic/claude-3-5-haiku";

const SYSTEM_PROMPT: &str = "You are a website security tool. You have been asked to determine if the following URL is a phishing website.";
const TOOL_NAME: &str = "is_phishing";

/// Some non-OpenAI models put the tool call inside the message text.
static INLINE_TOOL_CALLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[TOOL_CALLS\] (\[.*?\])").expect("static regex"));

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    cfg: Arc<OpenAiConfig>,
}

impl OpenAiProvider {
    pub fn new(cfg: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }

    pub fn model(&self) -> &str {
        &self.cfg.chat_model
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    tools: serde_json::Value,
    stream: bool,
    parallel_tool_calls: bool,
    tool_choice: &'static str,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessageResp,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResp {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: ToolFunction,
}

#[derive(Debug, Deserialize)]
struct ToolFunction {
    /// JSON-encoded argument object.
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct InlineToolCall {
    arguments: GuessArgs,
}

#[derive(Debug, Deserialize)]
struct GuessArgs {
    guess: bool,
}

fn tool_definitions() -> serde_json::Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": TOOL_NAME,
                "description": "Determines if this URL is a phishing website.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "guess": {
                            "type": "boolean",
                            "description": "The guess of whether the website is a phishing website."
                        }
                    },
                    "required": ["guess"],
                    "additionalProperties": false
                }
            }
        }
    ])
}

/// Reads the boolean verdict out of a chat completion.
///
/// The first choice carrying either structured tool calls or text content
/// decides the outcome.
pub(crate) fn parse_verdict(resp: &ChatApiResponse) -> Result<bool, ProviderError> {
    for choice in &resp.choices {
        if let Some(call) = choice
            .message
            .tool_calls
            .as_ref()
            .and_then(|calls| calls.first())
        {
            let args: GuessArgs = serde_json::from_str(&call.function.arguments)
                .map_err(|e| ProviderError::InvalidResponse(format!("tool arguments: {e}")))?;
            return Ok(args.guess);
        }
        if let Some(content) = choice.message.content.as_deref().filter(|c| !c.is_empty()) {
            let captured = INLINE_TOOL_CALLS
                .captures(content)
                .and_then(|c| c.get(1))
                .ok_or_else(|| {
                    ProviderError::InvalidResponse(format!("no tool call in content: {content}"))
                })?;
            let calls: Vec<InlineToolCall> = serde_json::from_str(captured.as_str())
                .map_err(|e| ProviderError::InvalidResponse(format!("inline tool calls: {e}")))?;
            return calls
                .first()
                .map(|c| c.arguments.guess)
                .ok_or_else(|| ProviderError::InvalidResponse("empty inline tool calls".into()));
        }
    }
    Err(ProviderError::InvalidResponse("no verdict in response".into()))
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn classify_url(&self, url: &str) -> Result<bool, ProviderError> {
        let user_content = format!("This is the URL of the website: {url}");
        let body = ChatRequest {
            model: &self.cfg.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_content,
                },
            ],
            tools: tool_definitions(),
            stream: false,
            parallel_tool_calls: true,
            tool_choice: "required",
            temperature: 0.0,
        };

        let resp = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.cfg.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
            return Err(ProviderError::RequestFailed(format!(
                "status {} body {:?}",
                status, body
            )));
        }

        let parsed: ChatApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        debug!(model = %self.cfg.chat_model, choices = parsed.choices.len(), "llm response");

        parse_verdict(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(raw: serde_json::Value) -> ChatApiResponse {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn verdict_from_structured_tool_call() {
        let resp = response(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "is_phishing", "arguments": "{\"guess\": true}" }
                    }]
                }
            }]
        }));
        assert!(parse_verdict(&resp).unwrap());
    }

    #[test]
    fn verdict_from_inline_tool_call_content() {
        let resp = response(json!({
            "choices": [{
                "message": {
                    "content": "[TOOL_CALLS] [{\"name\": \"is_phishing\", \"arguments\": {\"guess\": false}}]"
                }
            }]
        }));
        assert!(!parse_verdict(&resp).unwrap());
    }

    #[test]
    fn plain_text_answer_is_rejected() {
        let resp = response(json!({
            "choices": [{ "message": { "content": "This looks fine to me." } }]
        }));
        assert!(matches!(
            parse_verdict(&resp),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn empty_choices_are_rejected() {
        let resp = response(json!({ "choices": [] }));
        assert!(parse_verdict(&resp).is_err());
    }

    #[test]
    fn non_boolean_guess_is_rejected() {
        let resp = response(json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "function": { "name": "is_phishing", "arguments": "{\"guess\": \"yes\"}" }
                    }]
                }
            }]
        }));
        assert!(parse_verdict(&resp).is_err());
    }

    #[test]
    fn request_body_forces_the_tool() {
        let body = ChatRequest {
            model: DEFAULT_CHAT_MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: "This is the URL of the website: http://a.b",
            }],
            tools: tool_definitions(),
            stream: false,
            parallel_tool_calls: true,
            tool_choice: "required",
            temperature: 0.0,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["tool_choice"], "required");
        assert_eq!(value["tools"][0]["function"]["name"], TOOL_NAME);
        assert_eq!(value["temperature"], 0.0);
    }
}
