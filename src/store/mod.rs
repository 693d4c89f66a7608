//! Persistent per-case stores
//!
//! A case moves from `Absent` to `Populated` on its first committed append and
//! only grows afterwards. Each case lives in its own directory under the
//! repository root, addressed by a digest of the namespace so any string is a
//! valid namespace.

pub mod case;
pub mod ledger;
pub mod lock;
pub mod persist;

pub use case::CaseStore;
pub use ledger::{MetadataLedger, MetadataRecord};
pub use lock::WriterLock;
pub use persist::Manifest;

use crate::error::{CasedexError, Result};
use chrono::{DateTime, Utc};
use persist::LoadOutcome;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// How many times a reader re-reads the manifest when a concurrent save
/// prunes the generation it was loading
const LOAD_ATTEMPTS: usize = 3;

/// Lifecycle state of one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreState {
    Absent,
    Populated {
        dimension: usize,
        count: usize,
        generation: u64,
    },
}

/// Summary of one persisted case
#[derive(Debug, Clone, Serialize)]
pub struct CaseSummary {
    pub namespace: String,
    pub dimension: usize,
    pub vectors: usize,
    pub documents: usize,
    pub embedding_model: Option<String>,
    pub generation: u64,
    pub updated_at: DateTime<Utc>,
}

impl From<&Manifest> for CaseSummary {
    fn from(manifest: &Manifest) -> Self {
        Self {
            namespace: manifest.namespace.clone(),
            dimension: manifest.dimension,
            vectors: manifest.count,
            documents: manifest.documents,
            embedding_model: manifest.embedding_model.clone(),
            generation: manifest.generation,
            updated_at: manifest.updated_at,
        }
    }
}

/// Root directory holding every case store
#[derive(Debug, Clone)]
pub struct CaseRepository {
    root: PathBuf,
}

impl CaseRepository {
    /// Open (creating if needed) a repository at `root`
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).map_err(|e| {
            CasedexError::io(
                e,
                format!("Failed to create store root: {}", root.display()),
            )
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of `namespace`'s store
    pub fn case_dir(&self, namespace: &str) -> PathBuf {
        let digest = blake3::hash(namespace.as_bytes()).to_hex();
        self.root.join(format!("case-{}", &digest[..24]))
    }

    pub fn state(&self, namespace: &str) -> Result<StoreState> {
        Ok(
            match persist::read_manifest(&self.case_dir(namespace), namespace)? {
                None => StoreState::Absent,
                Some(m) => StoreState::Populated {
                    dimension: m.dimension,
                    count: m.count,
                    generation: m.generation,
                },
            },
        )
    }

    /// Load the committed store, `None` if the case is Absent
    pub fn load(&self, namespace: &str) -> Result<Option<CaseStore>> {
        let dir = self.case_dir(namespace);

        let mut last_missing = String::new();
        for attempt in 0..LOAD_ATTEMPTS {
            let manifest = match persist::read_manifest(&dir, namespace)? {
                Some(manifest) => manifest,
                None => return Ok(None),
            };

            match persist::load_generation(&dir, &manifest)? {
                LoadOutcome::Loaded(store) => {
                    tracing::debug!(
                        "Loaded case '{}' generation {} ({} vectors)",
                        namespace,
                        store.generation(),
                        store.len()
                    );
                    return Ok(Some(store));
                }
                LoadOutcome::ArtifactMissing(file) => {
                    // A newer manifest means the generation was pruned under us
                    let current = persist::read_manifest(&dir, namespace)?;
                    if current.map(|m| m.generation) == Some(manifest.generation) {
                        return Err(CasedexError::corruption(
                            namespace,
                            format!("artifact {} is missing", file),
                        ));
                    }
                    tracing::debug!(
                        "Generation {} of case '{}' replaced during load (attempt {})",
                        manifest.generation,
                        namespace,
                        attempt + 1
                    );
                    last_missing = file;
                }
            }
        }

        Err(CasedexError::corruption(
            namespace,
            format!(
                "artifact {} kept disappearing across {} load attempts",
                last_missing, LOAD_ATTEMPTS
            ),
        ))
    }

    /// Load the committed store or fail with `StoreAbsent`
    pub fn load_existing(&self, namespace: &str) -> Result<CaseStore> {
        self.load(namespace)?
            .ok_or_else(|| CasedexError::StoreAbsent {
                namespace: namespace.to_string(),
            })
    }

    /// Load the store, or start an empty one of `dimension` if Absent.
    ///
    /// An existing store of another dimension fails with `DimensionMismatch`.
    pub fn open_or_create(&self, namespace: &str, dimension: usize) -> Result<CaseStore> {
        match self.load(namespace)? {
            Some(store) if store.dimension() != dimension => {
                Err(CasedexError::DimensionMismatch {
                    expected: store.dimension(),
                    actual: dimension,
                })
            }
            Some(store) => Ok(store),
            None => {
                tracing::debug!("Case '{}' is absent, starting a new store", namespace);
                CaseStore::new(namespace, dimension)
            }
        }
    }

    /// Take the writer lock for `namespace`
    pub fn lock(&self, namespace: &str) -> Result<WriterLock> {
        WriterLock::acquire(&self.case_dir(namespace), namespace)
    }

    /// Atomically persist `store` as its next generation.
    ///
    /// Requires the namespace's writer lock, and refuses to overwrite a
    /// generation newer than the one `store` was loaded from.
    pub fn save(&self, store: &mut CaseStore, lock: &WriterLock) -> Result<Manifest> {
        if lock.namespace() != store.namespace() {
            return Err(CasedexError::Other(anyhow::anyhow!(
                "writer lock for case '{}' cannot save case '{}'",
                lock.namespace(),
                store.namespace()
            )));
        }

        let dir = self.case_dir(store.namespace());
        let committed = persist::read_manifest(&dir, store.namespace())?
            .map(|m| m.generation)
            .unwrap_or(0);
        if committed != store.generation() {
            return Err(CasedexError::StaleStore {
                namespace: store.namespace().to_string(),
                committed,
                loaded: store.generation(),
            });
        }

        let manifest = persist::save_generation(&dir, store)?;
        store.set_generation(manifest.generation);

        tracing::info!(
            "Saved case '{}' generation {} ({} vectors, {} documents)",
            manifest.namespace,
            manifest.generation,
            manifest.count,
            manifest.documents
        );

        Ok(manifest)
    }

    /// Summaries of every committed case, sorted by namespace
    pub fn list_cases(&self) -> Result<Vec<CaseSummary>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            CasedexError::io(
                e,
                format!("Failed to read store root: {}", self.root.display()),
            )
        })?;

        let mut cases = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CasedexError::io(e, "Failed to read directory entry"))?;
            let path = entry.path();
            if !path.is_dir() || !entry.file_name().to_string_lossy().starts_with("case-") {
                continue;
            }

            let manifest_path = path.join(persist::MANIFEST_FILE);
            let content = match fs::read(&manifest_path) {
                Ok(content) => content,
                Err(_) => continue,
            };
            match serde_json::from_slice::<Manifest>(&content) {
                Ok(manifest) => cases.push(CaseSummary::from(&manifest)),
                Err(e) => tracing::warn!(
                    "Skipping unreadable manifest {}: {}",
                    manifest_path.display(),
                    e
                ),
            }
        }

        cases.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        Ok(cases)
    }

    /// Summary of one case, `None` if Absent
    pub fn stats(&self, namespace: &str) -> Result<Option<CaseSummary>> {
        Ok(persist::read_manifest(&self.case_dir(namespace), namespace)?
            .as_ref()
            .map(CaseSummary::from))
    }
}
