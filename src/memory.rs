//! Per-document persistent memory of past Q&A.
//!
//! Each PDF gets its own JSON file named from the basename and a hash of
//! the absolute path, so distinct paths never share a file. Appends are
//! atomic: the new list is written to a sibling temp file and renamed
//! over the target, so concurrent readers see either the old or the new
//! file, never a torn write.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::agent::events::ProvenanceEntry;
use crate::core::relevance::{cosine_similarity, overlap_tokens};
use crate::embedding::Embedder;
use crate::error::QaError;

/// Hex characters of the path hash used in memory filenames.
const PATH_HASH_LEN: usize = 10;

/// A persisted Q&A record for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique id (UUID v4).
    pub id: String,
    /// Epoch seconds when the answer was recorded.
    pub timestamp: i64,
    /// The question asked.
    pub question: String,
    /// The answer produced.
    pub answer: String,
    /// Verifier confidence at the time.
    pub confidence: f32,
    /// Quality flags at the time.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Evidence attribution at the time.
    #[serde(default)]
    pub provenance: Vec<ProvenanceEntry>,
    /// Embedding of the answer, when the embedding service was
    /// available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Model that produced the answer.
    pub model_id: String,
}

/// A memory entry paired with its recall similarity.
#[derive(Debug, Clone)]
pub struct RecalledMemory {
    /// The stored entry.
    pub entry: MemoryEntry,
    /// Similarity to the current query in `[0, 1]`.
    pub similarity: f32,
}

/// Store of per-document memory files under one directory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    /// Creates a store rooted at `dir`. The directory is created lazily
    /// on first append.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Memory file path for a document:
    /// `memory_<basename>_<hash10>.json`, where the hash is the first
    /// ten hex characters of sha256 over the absolute path.
    #[must_use]
    pub fn file_for(&self, pdf_path: &Path) -> PathBuf {
        let abs = std::path::absolute(pdf_path).unwrap_or_else(|_| pdf_path.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(abs.to_string_lossy().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        let hash = &digest[..PATH_HASH_LEN];

        let base = abs
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());

        self.dir.join(format!("memory_{base}_{hash}.json"))
    }

    /// Loads all entries for a document. Returns an empty list when the
    /// file is missing or unreadable.
    #[must_use]
    pub fn load(&self, pdf_path: &Path) -> Vec<MemoryEntry> {
        let path = self.file_for(pdf_path);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Appends one entry to a document's memory.
    ///
    /// Read-modify-write with an atomic rename over the target.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Memory`] when the file cannot be written.
    pub fn append(&self, pdf_path: &Path, entry: MemoryEntry) -> Result<(), QaError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| QaError::Memory {
            message: format!("cannot create {}: {e}", self.dir.display()),
        })?;

        let path = self.file_for(pdf_path);
        let mut entries = self.load(pdf_path);
        entries.push(entry);

        let serialized = serde_json::to_string_pretty(&entries).map_err(|e| QaError::Memory {
            message: format!("serialization failed: {e}"),
        })?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serialized).map_err(|e| QaError::Memory {
            message: format!("write failed: {e}"),
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| QaError::Memory {
            message: format!("rename failed: {e}"),
        })?;
        Ok(())
    }

    /// Deletes a document's memory file if present.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Memory`] when the file exists but cannot be
    /// removed.
    pub fn clear(&self, pdf_path: &Path) -> Result<(), QaError> {
        let path = self.file_for(pdf_path);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(QaError::Memory {
                message: format!("remove failed: {e}"),
            }),
        }
    }

    /// Lists all memory files in the store directory, sorted.
    #[must_use]
    pub fn list_all(&self) -> Vec<PathBuf> {
        let Ok(read_dir) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = read_dir
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("memory_") && n.ends_with(".json"))
            })
            .collect();
        paths.sort();
        paths
    }

    /// Ranks entries by relevance to a query: cosine similarity against
    /// stored answer embeddings, with a token-overlap fallback over the
    /// question+answer text for entries without embeddings.
    pub async fn find_relevant(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        entries: &[MemoryEntry],
        top_k: usize,
    ) -> Vec<RecalledMemory> {
        if entries.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let q_vec = embedder.embed(query).await;
        let q_tokens = overlap_tokens(query);

        let mut recalled: Vec<RecalledMemory> = entries
            .iter()
            .filter_map(|entry| {
                let similarity = match (&q_vec, &entry.embedding) {
                    (Some(q), Some(e)) => cosine_similarity(q, e),
                    _ => {
                        let text = format!("{} {}", entry.question, entry.answer);
                        let e_tokens = overlap_tokens(&text);
                        let overlap = q_tokens.intersection(&e_tokens).count();
                        #[allow(clippy::cast_precision_loss)]
                        let sim = overlap as f32 / q_tokens.len().max(1) as f32;
                        sim.clamp(0.0, 1.0)
                    }
                };
                (similarity > 0.0).then(|| RecalledMemory {
                    entry: entry.clone(),
                    similarity,
                })
            })
            .collect();

        recalled.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        recalled.truncate(top_k);
        recalled
    }
}
