use async_trait::async_trait;
use serde::{Serialize, Serializer};

/// Who authored a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Body of a conversation entry.
///
/// `WithImages` is produced when the inbound message carried image
/// attachments; it goes out as an OpenAI vision content-parts array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    WithImages {
        text: String,
        image_urls: Vec<String>,
    },
}

impl Content {
    /// The text portion, regardless of variant.
    pub fn text(&self) -> &str {
        match self {
            Content::Text(text) | Content::WithImages { text, .. } => text,
        }
    }

    pub fn has_images(&self) -> bool {
        matches!(self, Content::WithImages { image_urls, .. } if !image_urls.is_empty())
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: WireImageUrl<'a> },
}

#[derive(Serialize)]
struct WireImageUrl<'a> {
    url: &'a str,
}

impl Serialize for Content {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Content::Text(text) => WireContent::Text(text),
            Content::WithImages { text, image_urls } => {
                let mut parts = Vec::with_capacity(image_urls.len() + 1);
                parts.push(WirePart::Text { text });
                parts.extend(image_urls.iter().map(|url| WirePart::ImageUrl {
                    image_url: WireImageUrl { url },
                }));
                WireContent::Parts(parts)
            }
        };
        wire.serialize(serializer)
    }
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn user(content: impl Into<Content>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request to an LLM provider. The whole conversation is sent as context.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

/// Response from an LLM provider: the first choice's text.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
}

/// Chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a chat request and wait for the full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_serializes_as_string() {
        let msg = Message::user("Hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "Hello"}));
    }

    #[test]
    fn image_content_serializes_as_parts() {
        let msg = Message::user(Content::WithImages {
            text: "what is this?".to_string(),
            image_urls: vec!["https://cdn.example/a.png".to_string()],
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "https://cdn.example/a.png"}}
                ]
            })
        );
    }

    #[test]
    fn content_text_accessor() {
        let c = Content::WithImages {
            text: "caption".to_string(),
            image_urls: Vec::new(),
        };
        assert_eq!(c.text(), "caption");
        assert!(!c.has_images());
        assert_eq!(Content::from("plain").text(), "plain");
    }

    #[test]
    fn rate_limit_error_reports_retry_delay() {
        let err = ProviderError::RateLimited {
            retry_after_ms: 2000,
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 2000ms");
    }
}
