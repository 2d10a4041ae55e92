//! Model catalog: alias -> concrete artifact.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One downloadable model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Concrete model id, unique within the catalog.
    pub id: String,
    /// Short alias users ask for.
    pub alias: String,
    /// Artifact location (HTTP).
    pub uri: String,
    /// Approximate artifact size, when known.
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

/// The set of models this process can serve.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Catalog shipped with the binary.
    pub fn builtin() -> Self {
        Self::new(vec![
            CatalogEntry {
                id: "qwen2.5-14b-instruct-q4".to_string(),
                alias: "qwen2.5-14b".to_string(),
                uri: "https://models.purser.dev/qwen2.5-14b-instruct-q4.bin".to_string(),
                size_bytes: Some(9_200_000_000),
            },
            CatalogEntry {
                id: "phi-3.5-mini-instruct-q4".to_string(),
                alias: "phi-3.5-mini".to_string(),
                uri: "https://models.purser.dev/phi-3.5-mini-instruct-q4.bin".to_string(),
                size_bytes: Some(2_400_000_000),
            },
        ])
    }

    /// Add an entry, e.g. from configuration.
    pub fn push(&mut self, entry: CatalogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Resolve an alias (or exact id) to its entry.
    pub fn resolve(&self, alias: &str) -> Result<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.alias == alias || e.id == alias)
            .ok_or_else(|| Error::ModelNotFound(alias.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_alias_and_id() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.resolve("qwen2.5-14b").unwrap().id,
            "qwen2.5-14b-instruct-q4"
        );
        assert_eq!(
            catalog.resolve("phi-3.5-mini-instruct-q4").unwrap().alias,
            "phi-3.5-mini"
        );
    }

    #[test]
    fn unknown_alias_is_model_not_found() {
        let err = Catalog::builtin().resolve("gpt-99").unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(alias) if alias == "gpt-99"));
    }
}
