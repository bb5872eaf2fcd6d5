use serde::Serialize;
use serde_json::{json, Value};

/// How a text section is interpreted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Markdown,
    PlainText,
}

/// One layout block of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBlock {
    Section {
        text: String,
        format: TextFormat,
    },
    Image {
        url: String,
        alt_text: String,
        title: String,
        block_id: String,
    },
}

impl MessageBlock {
    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Section {
            text: text.into(),
            format: TextFormat::Markdown,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::Section {
            text: text.into(),
            format: TextFormat::PlainText,
        }
    }

    /// The block in the platform's JSON block format.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Section { text, format } => {
                let kind = match format {
                    TextFormat::Markdown => "mrkdwn",
                    TextFormat::PlainText => "plain_text",
                };
                json!({
                    "type": "section",
                    "text": { "type": kind, "text": text },
                })
            }
            Self::Image {
                url,
                alt_text,
                title,
                block_id,
            } => json!({
                "type": "image",
                "image_url": url,
                "alt_text": alt_text,
                "title": { "type": "plain_text", "text": title },
                "block_id": block_id,
            }),
        }
    }

    /// Text used as the notification fallback for a message.
    pub fn fallback_text(blocks: &[MessageBlock]) -> String {
        blocks
            .iter()
            .map(|block| match block {
                Self::Section { text, .. } => text.as_str(),
                Self::Image { title, .. } => title.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Identity of a message the platform accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub conversation_id: String,
    pub message_ref: String,
}
