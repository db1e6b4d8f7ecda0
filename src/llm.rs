use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::{sync::LazyLock, time::Duration};

use crate::error::UpstreamError;

#[derive(Debug, Clone)]
pub struct LlmClient {
    pub base: String,
    pub token: String,
    pub model: String,
}

/// One entry of a chat-completions `messages` list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageRef },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRef {
    pub url: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: MessageContent::Text(text.into()),
        }
    }
}

pub struct ImageChatRequest<'a> {
    pub http: &'a reqwest::Client,
    pub system: &'a str,
    pub text_prompt: &'a str,
    /// Publicly reachable image URLs, attached before the text part.
    pub image_urls: &'a [String],
    pub temperature: f32,
    pub timeout: Duration,
    pub max_tokens: Option<u32>,
}

impl LlmClient {
    #[must_use]
    pub const fn new(base: String, token: String, model: String) -> Self {
        Self { base, token, model }
    }

    /// Sends a system + user prompt in JSON mode and returns the parsed object.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the request fails or the provider answers non-2xx,
    /// `Malformed` if the reply has no content or the content is not JSON.
    pub async fn chat_json(
        &self,
        http: &reqwest::Client,
        system: &str,
        user: &str,
        temperature: f32,
        timeout: Duration,
        max_tokens: Option<u32>,
    ) -> Result<JsonValue, UpstreamError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let body = self.body(&messages, temperature, max_tokens, true);
        let content = self.complete(http, &body, timeout).await?;
        parse_json_content(&content)
    }

    /// Like `chat_json` but attaches image URLs to the user message.
    ///
    /// # Errors
    ///
    /// Same as [`LlmClient::chat_json`].
    pub async fn chat_json_images(
        &self,
        req: ImageChatRequest<'_>,
    ) -> Result<JsonValue, UpstreamError> {
        let mut parts: Vec<ContentPart> = req
            .image_urls
            .iter()
            .map(|url| ContentPart::ImageUrl {
                image_url: ImageRef { url: url.clone() },
            })
            .collect();
        parts.push(ContentPart::Text {
            text: req.text_prompt.to_string(),
        });

        let messages = [
            ChatMessage::system(req.system),
            ChatMessage {
                role: "user".into(),
                content: MessageContent::Parts(parts),
            },
        ];
        let body = self.body(&messages, req.temperature, req.max_tokens, true);
        let content = self.complete(req.http, &body, req.timeout).await?;
        parse_json_content(&content)
    }

    /// Free-text completion over an arbitrary message list. The reply is trimmed.
    ///
    /// # Errors
    ///
    /// `Unavailable` on transport/status failures, `Malformed` if the reply is
    /// missing or blank.
    pub async fn chat_text(
        &self,
        http: &reqwest::Client,
        messages: &[ChatMessage],
        temperature: f32,
        timeout: Duration,
        max_tokens: Option<u32>,
    ) -> Result<String, UpstreamError> {
        let text = self
            .chat_reply(http, messages, temperature, timeout, max_tokens)
            .await?;
        if text.is_empty() {
            return Err(UpstreamError::Malformed("LLM returned empty content".into()));
        }
        Ok(text)
    }

    /// Like [`Self::chat_text`] but a blank reply is returned as `""`.
    ///
    /// # Errors
    ///
    /// `Unavailable` on transport/status failures, `Malformed` if the envelope
    /// carries no content field.
    pub async fn chat_reply(
        &self,
        http: &reqwest::Client,
        messages: &[ChatMessage],
        temperature: f32,
        timeout: Duration,
        max_tokens: Option<u32>,
    ) -> Result<String, UpstreamError> {
        let body = self.body(messages, temperature, max_tokens, false);
        let content = self.complete(http, &body, timeout).await?;
        Ok(content.trim().to_string())
    }

    fn body(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
        json_mode: bool,
    ) -> JsonValue {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
        });
        if let Some(n) = max_tokens {
            body["max_tokens"] = json!(n);
        }
        if json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    async fn complete(
        &self,
        http: &reqwest::Client,
        body: &JsonValue,
        timeout: Duration,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/chat/completions", self.base.trim_end_matches('/'));

        let mut req = http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .json(body);

        if !self.token.trim().is_empty() {
            req = req.bearer_auth(&self.token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(UpstreamError::Unavailable(format!(
                "LLM HTTP {status}: {}",
                preview(&text)
            )));
        }

        let envelope: JsonValue = serde_json::from_str(&text)
            .map_err(|e| UpstreamError::Malformed(format!("decoding LLM envelope: {e}")))?;

        envelope
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .or_else(|| {
                envelope
                    .get("choices")
                    .and_then(|c| c.get(0))
                    .and_then(|c0| c0.get("text"))
                    .and_then(|v| v.as_str())
            })
            .map(ToString::to_string)
            .ok_or_else(|| UpstreamError::Malformed("LLM response missing content".into()))
    }
}

/// Parses a model reply that should be a JSON object: direct parse, then a
/// fenced block, then the largest balanced object.
///
/// # Errors
///
/// `Malformed` when none of the three strategies yields valid JSON.
pub fn parse_json_content(content: &str) -> Result<JsonValue, UpstreamError> {
    if let Ok(js) = serde_json::from_str::<JsonValue>(content) {
        return Ok(js);
    }
    let candidate = extract_fenced_json(content).or_else(|| extract_largest_json_object(content));
    if let Some(js) = candidate.and_then(|s| serde_json::from_str::<JsonValue>(&s).ok()) {
        return Ok(js);
    }

    Err(UpstreamError::Malformed(format!(
        "LLM did not return valid JSON. Preview: {}",
        preview(content)
    )))
}

fn preview(s: &str) -> String {
    s.chars().take(500).collect()
}

/// Extract JSON object from a ```json ... ``` fenced block.
/// Accepts ```json``` or plain ``` ``` fences (case-insensitive).
pub fn extract_fenced_json(s: &str) -> Option<String> {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        // non-greedy capture of a single JSON object inside a fence
        Regex::new(r"(?is)```(?:json)?\s*(\{.*?\})\s*```").unwrap()
    });

    FENCE_RE
        .captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Fallback: find the *largest* balanced `{ ... }` JSON-like object in text.
/// String-aware, so braces inside quotes don't count.
#[must_use]
pub fn extract_largest_json_object(s: &str) -> Option<String> {
    let mut best: Option<(usize, usize)> = None;

    let mut depth: usize = 0;
    let mut start: Option<usize> = None;

    let mut in_str = false;
    let mut esc = false;

    for (i, ch) in s.char_indices() {
        if in_str {
            if esc {
                esc = false;
            } else if ch == '\\' {
                esc = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }

        match ch {
            '"' => in_str = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(st) = start {
                        let better = best.is_none_or(|(a, b)| i - st > b - a);
                        if better {
                            best = Some((st, i));
                        }
                    }
                    start = None;
                }
            }
            _ => {}
        }
    }

    best.map(|(a, b)| s[a..=b].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_is_extracted() {
        let s = "Sure!\n```json\n{\"title\": \"Pad Thai\"}\n```\nEnjoy.";
        assert_eq!(
            extract_fenced_json(s).as_deref(),
            Some("{\"title\": \"Pad Thai\"}")
        );
    }

    #[test]
    fn largest_object_ignores_braces_in_strings() {
        let s = r#"note {"a":1} then {"title":"curly } brace","x":{"y":2}} end"#;
        assert_eq!(
            extract_largest_json_object(s).as_deref(),
            Some(r#"{"title":"curly } brace","x":{"y":2}}"#)
        );
    }

    #[test]
    fn parse_json_content_rejects_prose() {
        let err = parse_json_content("It looks like a pizza.").unwrap_err();
        assert!(matches!(err, UpstreamError::Malformed(_)));
    }

    #[test]
    fn image_parts_serialize_in_openai_shape() {
        let msg = ChatMessage {
            role: "user".into(),
            content: MessageContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageRef {
                        url: "https://img/x.jpg".into(),
                    },
                },
                ContentPart::Text { text: "hi".into() },
            ]),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": "https://img/x.jpg" } },
                    { "type": "text", "text": "hi" }
                ]
            })
        );
    }
}
