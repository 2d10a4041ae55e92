//! Model lifecycle manager: cache, load, unload.
//!
//! Per model: `NotCached -> Downloading -> Cached -> Loading -> Loaded ->
//! Unloaded`. Lifecycle operations on one model are serialized by a
//! per-model async mutex; completions on a loaded model run in parallel.
//!
//! The manager is constructed explicitly and passed by reference — there
//! is no process-wide instance.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::StreamExt;

use crate::catalog::{Catalog, CatalogEntry};
use crate::chat::ChatClient;
use crate::engine::InferenceEngine;
use crate::error::{Error, Result};
use crate::types::{CacheState, LoadState, ModelDescriptor};

/// Shared per-model record.
pub(crate) struct ModelSlot {
    pub(crate) entry: CatalogEntry,
    state: Mutex<SlotState>,
    /// Single-writer discipline for download/load/unload.
    op_lock: tokio::sync::Mutex<()>,
}

struct SlotState {
    cache: CacheState,
    load: LoadState,
    /// Bumped on every unload; outstanding chat clients carry the value
    /// they were minted with and go stale when it moves.
    generation: u64,
}

impl ModelSlot {
    fn new(entry: CatalogEntry, cached: bool) -> Self {
        Self {
            entry,
            state: Mutex::new(SlotState {
                cache: if cached {
                    CacheState::Cached
                } else {
                    CacheState::NotCached
                },
                load: LoadState::Unloaded,
                generation: 0,
            }),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn snapshot(&self) -> (CacheState, LoadState, u64) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        (state.cache, state.load, state.generation)
    }

    fn set(&self, f: impl FnOnce(&mut SlotState)) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state);
    }

    /// Fail unless the model is loaded under the given generation.
    pub(crate) fn ensure_generation(&self, generation: u64) -> Result<()> {
        let (_, load, current) = self.snapshot();
        if load != LoadState::Loaded {
            return Err(Error::InvalidState("model is not loaded".to_string()));
        }
        if current != generation {
            return Err(Error::InvalidState(
                "chat client is stale: model was unloaded".to_string(),
            ));
        }
        Ok(())
    }
}

/// Governs the cache/load lifecycle for every model in the catalog.
pub struct Manager {
    catalog: Catalog,
    cache_dir: PathBuf,
    engine: Arc<dyn InferenceEngine>,
    http: reqwest::Client,
    slots: Mutex<HashMap<String, Arc<ModelSlot>>>,
}

impl Manager {
    pub fn new(catalog: Catalog, cache_dir: impl Into<PathBuf>, engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            catalog,
            cache_dir: cache_dir.into(),
            engine,
            http: reqwest::Client::new(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolve an alias to a descriptor snapshot.
    pub fn resolve_alias(&self, alias: &str) -> Result<ModelDescriptor> {
        let slot = self.slot_for_alias(alias)?;
        Ok(self.describe(&slot))
    }

    pub fn is_cached(&self, descriptor: &ModelDescriptor) -> Result<bool> {
        let slot = self.slot_for_alias(&descriptor.id)?;
        Ok(slot.snapshot().0 == CacheState::Cached)
    }

    /// Fetch the model artifact into the cache.
    ///
    /// No-op (zero progress callbacks) if already cached. Progress runs
    /// monotonically non-decreasing and terminates at exactly 100; values
    /// the transfer math would put outside 0..=100 are clamped at this
    /// boundary. On failure the partial file is removed and the state
    /// returns to `NotCached`.
    pub async fn download(
        &self,
        descriptor: &ModelDescriptor,
        mut on_progress: impl FnMut(u8) + Send,
    ) -> Result<()> {
        let slot = self.slot_for_alias(&descriptor.id)?;
        let _guard = slot.op_lock.lock().await;

        if slot.snapshot().0 == CacheState::Cached {
            return Ok(());
        }

        slot.set(|s| s.cache = CacheState::Downloading);
        tracing::info!(model = %slot.entry.id, uri = %slot.entry.uri, "downloading");

        match self.fetch_artifact(&slot.entry, &mut on_progress).await {
            Ok(()) => {
                slot.set(|s| s.cache = CacheState::Cached);
                tracing::info!(model = %slot.entry.id, "cached");
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(self.partial_path(&slot.entry)).await;
                slot.set(|s| s.cache = CacheState::NotCached);
                Err(e)
            }
        }
    }

    /// Load a cached model into the engine, yielding a chat client.
    ///
    /// Idempotent while loaded: a second call returns a client for the
    /// existing instance.
    pub async fn load(&self, descriptor: &ModelDescriptor) -> Result<ChatClient> {
        let slot = self.slot_for_alias(&descriptor.id)?;
        let _guard = slot.op_lock.lock().await;

        let (cache, load, generation) = slot.snapshot();
        if load == LoadState::Loaded {
            return Ok(ChatClient::new(
                Arc::clone(&slot),
                Arc::clone(&self.engine),
                generation,
            ));
        }
        if cache != CacheState::Cached {
            return Err(Error::Load(format!(
                "model {} is not cached; download it first",
                slot.entry.id
            )));
        }

        slot.set(|s| s.load = LoadState::Loading);
        let artifact = self.artifact_path(&slot.entry);
        if let Err(e) = self.engine.load(&slot.entry.id, &artifact).await {
            slot.set(|s| s.load = LoadState::Unloaded);
            return Err(Error::Load(e.to_string()));
        }
        slot.set(|s| s.load = LoadState::Loaded);
        tracing::info!(model = %slot.entry.id, "loaded");

        let (_, _, generation) = slot.snapshot();
        Ok(ChatClient::new(
            Arc::clone(&slot),
            Arc::clone(&self.engine),
            generation,
        ))
    }

    /// Release the engine instance. Outstanding chat clients become stale
    /// and fail with `InvalidState`. A no-op when not loaded.
    pub async fn unload(&self, descriptor: &ModelDescriptor) -> Result<()> {
        let slot = self.slot_for_alias(&descriptor.id)?;
        let _guard = slot.op_lock.lock().await;

        if slot.snapshot().1 != LoadState::Loaded {
            tracing::debug!(model = %slot.entry.id, "unload: not loaded");
            return Ok(());
        }

        self.engine
            .unload(&slot.entry.id)
            .await
            .map_err(|e| Error::Engine(e.to_string()))?;
        slot.set(|s| {
            s.load = LoadState::Unloaded;
            s.generation += 1;
        });
        tracing::info!(model = %slot.entry.id, "unloaded");
        Ok(())
    }

    // --- Internal methods ---

    fn slot_for_alias(&self, alias: &str) -> Result<Arc<ModelSlot>> {
        let entry = self.catalog.resolve(alias)?.clone();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get(&entry.id) {
            return Ok(Arc::clone(slot));
        }
        let cached = self.artifact_path(&entry).exists();
        let slot = Arc::new(ModelSlot::new(entry.clone(), cached));
        slots.insert(entry.id, Arc::clone(&slot));
        Ok(slot)
    }

    fn describe(&self, slot: &ModelSlot) -> ModelDescriptor {
        let (cache, load, _) = slot.snapshot();
        ModelDescriptor {
            id: slot.entry.id.clone(),
            alias: slot.entry.alias.clone(),
            cache_state: cache,
            load_state: load,
        }
    }

    fn artifact_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.cache_dir.join(format!("{}.bin", entry.id))
    }

    fn partial_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.cache_dir.join(format!("{}.part", entry.id))
    }

    async fn fetch_artifact(
        &self,
        entry: &CatalogEntry,
        on_progress: &mut (impl FnMut(u8) + Send),
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| Error::Download(e.to_string()))?;

        let response = self
            .http
            .get(&entry.uri)
            .send()
            .await
            .map_err(|e| Error::Download(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "{}: {}",
                entry.uri,
                response.status()
            )));
        }

        let total = response.content_length().or(entry.size_bytes);
        let partial = self.partial_path(entry);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| Error::Download(e.to_string()))?;

        let mut downloaded: u64 = 0;
        let mut last_percent: u8 = 0;
        let mut bytes = response.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| Error::Download(e.to_string()))?;
            tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
                .await
                .map_err(|e| Error::Download(e.to_string()))?;
            downloaded += chunk.len() as u64;

            if let Some(total) = total.filter(|&t| t > 0) {
                // Clamp: transfers can overshoot a stale content length.
                let percent = ((downloaded.saturating_mul(100)) / total).min(100) as u8;
                if percent > last_percent {
                    last_percent = percent;
                    on_progress(percent);
                }
            }
        }

        tokio::io::AsyncWriteExt::flush(&mut file)
            .await
            .map_err(|e| Error::Download(e.to_string()))?;
        drop(file);
        tokio::fs::rename(&partial, self.artifact_path(entry))
            .await
            .map_err(|e| Error::Download(e.to_string()))?;
        self.write_manifest(entry, downloaded).await;

        // The sequence must terminate at exactly 100 even when the server
        // sent no usable length.
        if last_percent != 100 {
            on_progress(100);
        }
        Ok(())
    }

    async fn write_manifest(&self, entry: &CatalogEntry, size: u64) {
        let manifest = serde_json::json!({
            "id": entry.id,
            "alias": entry.alias,
            "size_bytes": size,
            "downloaded_at": chrono::Utc::now(),
        });
        let path = self.cache_dir.join(format!("{}.manifest.json", entry.id));
        if let Err(e) = tokio::fs::write(&path, manifest.to_string()).await {
            tracing::warn!(model = %entry.id, error = %e, "manifest write failed");
        }
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("cache_dir", &self.cache_dir)
            .field("models", &self.catalog.entries().len())
            .finish()
    }
}

/// Cache file name for a model id. Callers that pre-seed a cache (tests,
/// offline installs) must match this naming.
pub fn artifact_file_name(model_id: &str) -> String {
    format!("{model_id}.bin")
}
