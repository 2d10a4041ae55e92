//! Tool descriptors and the content block model shared by client and server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named, schema-described capability published by a server.
///
/// Immutable once registered; a client's copy is a snapshot from its last
/// discovery call, not a live view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the argument mapping.
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Machine-readable category for an in-band tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorCode {
    InvalidInput,
    ExecutionFailed,
    Timeout,
    Internal,
}

/// One typed unit of tool output.
///
/// Exactly one variant is ever set; consumers match exhaustively rather
/// than probing a dynamic type tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Binary payload, base64-encoded on the wire.
    Binary {
        mime_type: String,
        data: String,
    },
    Resource {
        uri: String,
        mime_type: String,
    },
    ToolError {
        code: ToolErrorCode,
        message: String,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn resource(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Resource {
            uri: uri.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn tool_error(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self::ToolError {
            code,
            message: message.into(),
        }
    }

    /// Text content, if this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_tool_error(&self) -> bool {
        matches!(self, Self::ToolError { .. })
    }
}

/// Outcome of one invocation: an ordered sequence of content blocks.
///
/// `is_error == true` implies at least one `ToolError` block; any
/// accompanying text is advisory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// A successful result carrying a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    /// A successful result from pre-built blocks.
    pub fn from_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// A failed result carrying a single error block.
    pub fn error(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::tool_error(code, message)],
            is_error: true,
        }
    }

    /// Concatenated text of all text blocks, in order.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
