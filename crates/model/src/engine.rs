//! Inference engine boundary.
//!
//! The actual runtime (process, weights, sampler) is an external
//! collaborator; this trait is the seam. [`HttpEngine`] adapts a local
//! OpenAI-style HTTP endpoint, which is how local serving stacks expose
//! themselves.

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ChatChunk, ChatMessage};

/// Lazy, finite sequence of completion chunks. Not restartable; one call
/// to `stream_complete` per completion.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

/// The runtime hosting model weights and producing tokens.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Make a cached artifact resident.
    async fn load(&self, model_id: &str, artifact: &Path) -> Result<()>;

    /// Release everything held for this model.
    async fn unload(&self, model_id: &str) -> Result<()>;

    /// Begin one completion; chunks arrive in generation order.
    async fn start(&self, model_id: &str, messages: Vec<ChatMessage>) -> Result<ChunkStream>;
}

/// Engine speaking to a local inference server over HTTP.
pub struct HttpEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_control(&self, path: &str, model_id: &str) -> Result<()> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({"model": model_id}))
            .send()
            .await
            .map_err(|e| Error::Engine(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Engine(format!(
                "{url}: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Outcome of one server-sent-events line.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data: ") else {
        return SseLine::Skip;
    };
    if data.trim() == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => {
            let delta = event
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .unwrap_or_default();
            SseLine::Delta(delta)
        }
        Err(_) => SseLine::Skip,
    }
}

#[async_trait]
impl InferenceEngine for HttpEngine {
    async fn load(&self, model_id: &str, _artifact: &Path) -> Result<()> {
        self.post_control("/v1/models/load", model_id).await
    }

    async fn unload(&self, model_id: &str) -> Result<()> {
        self.post_control("/v1/models/unload", model_id).await
    }

    async fn start(&self, model_id: &str, messages: Vec<ChatMessage>) -> Result<ChunkStream> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CompletionRequest {
                model: model_id,
                messages,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| Error::Engine(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Engine(format!("{url}: {}", response.status())));
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut buffer = String::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(Error::Engine(e.to_string()));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line: String = buffer.drain(..=newline).collect();
                    match parse_sse_line(line.trim_end()) {
                        SseLine::Delta(delta) => yield Ok(ChatChunk::delta(delta)),
                        SseLine::Done => {
                            yield Ok(ChatChunk::final_chunk());
                            break 'outer;
                        }
                        SseLine::Skip => {}
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Delta("Hel".to_string()));
    }

    #[test]
    fn parses_done_marker() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
    }

    #[test]
    fn skips_comments_and_blanks() {
        assert_eq!(parse_sse_line(""), SseLine::Skip);
        assert_eq!(parse_sse_line(": keepalive"), SseLine::Skip);
    }

    #[test]
    fn empty_delta_tolerated() {
        let line = r#"data: {"choices":[{"delta":{}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Delta(String::new()));
    }
}
