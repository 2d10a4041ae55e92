//! Streaming chat completion client.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::engine::{ChunkStream, InferenceEngine};
use crate::error::Result;
use crate::manager::ModelSlot;
use crate::types::{ChatChunk, ChatMessage};

/// Handle to a loaded model, minted by `Manager::load`.
///
/// Tied to one load generation: once the model is unloaded, every
/// outstanding handle fails with `InvalidState` until `load` mints a
/// fresh one.
pub struct ChatClient {
    slot: Arc<ModelSlot>,
    engine: Arc<dyn InferenceEngine>,
    generation: u64,
}

impl ChatClient {
    pub(crate) fn new(
        slot: Arc<ModelSlot>,
        engine: Arc<dyn InferenceEngine>,
        generation: u64,
    ) -> Self {
        Self {
            slot,
            engine,
            generation,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.slot.entry.id
    }

    /// Begin one streaming completion.
    ///
    /// The returned sequence is lazy, finite, and terminated by exactly
    /// one final chunk; it is not restartable. Fails fast with
    /// `InvalidState` when the model is not loaded. Cancellation is
    /// observed between chunk productions: nothing is delivered after it
    /// fires, and the engine-side generation is dropped.
    pub async fn stream_complete(
        &self,
        messages: Vec<ChatMessage>,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        self.slot.ensure_generation(self.generation)?;
        let inner = self.engine.start(self.model_id(), messages).await?;
        Ok(finalize(inner, cancel))
    }
}

/// Enforce the chunk discipline over a raw engine stream: stop at the
/// first final chunk, synthesize one if the engine ends without it, and
/// emit nothing once cancellation is observed.
fn finalize(mut inner: ChunkStream, cancel: CancellationToken) -> ChunkStream {
    let stream = async_stream::stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = inner.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    let is_final = chunk.is_final;
                    yield Ok(chunk);
                    if is_final {
                        break;
                    }
                }
                Some(Err(e)) => {
                    yield Err(e);
                    break;
                }
                None => {
                    yield Ok(ChatChunk::final_chunk());
                    break;
                }
            }
        }
        // Dropping `inner` here releases the engine-side generation.
    };
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn scripted(deltas: &[&str], send_final: bool) -> ChunkStream {
        let mut chunks: Vec<Result<ChatChunk>> = deltas
            .iter()
            .map(|d| Ok(ChatChunk::delta(*d)))
            .collect();
        if send_final {
            chunks.push(Ok(ChatChunk::final_chunk()));
        }
        Box::pin(futures::stream::iter(chunks))
    }

    #[tokio::test]
    async fn exactly_one_final_chunk() {
        let mut stream = finalize(scripted(&["a", "b"], true), CancellationToken::new());
        let mut finals = 0;
        let mut after_final = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            if finals > 0 {
                after_final += 1;
            }
            if chunk.is_final {
                finals += 1;
            }
        }
        assert_eq!(finals, 1);
        assert_eq!(after_final, 0);
    }

    #[tokio::test]
    async fn synthesizes_final_when_engine_stops_early() {
        let mut stream = finalize(scripted(&["only"], false), CancellationToken::new());
        let chunks: Vec<_> = (&mut stream).collect::<Vec<_>>().await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks.last().unwrap().as_ref().unwrap().is_final);
    }

    #[tokio::test]
    async fn nothing_after_cancellation() {
        let cancel = CancellationToken::new();
        // Engine that never ends on its own.
        let inner: ChunkStream = Box::pin(async_stream::stream! {
            loop {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                yield Ok(ChatChunk::delta("tok"));
            }
        });
        let mut stream = finalize(inner, cancel.clone());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.delta, "tok");
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn engine_fault_terminates_stream() {
        let inner: ChunkStream = Box::pin(futures::stream::iter(vec![
            Ok(ChatChunk::delta("x")),
            Err(Error::Engine("connection reset".to_string())),
        ]));
        let mut stream = finalize(inner, CancellationToken::new());
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
