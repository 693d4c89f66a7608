//! On-disk layout of a case store
//!
//! Each save writes a new generation of three artifacts and then commits it by
//! atomically replacing `MANIFEST.json`:
//!
//! ```text
//! case-<hash>/
//!   MANIFEST.json          namespace, generation, counts, artifact checksums
//!   index-<g>.json         index structure header
//!   vectors-<g>.f32        little-endian f32, row-major
//!   metadata-<g>.json.zst  zstd-compressed JSON array of metadata records
//! ```
//!
//! A crash before the manifest rename leaves the previous generation in force.

use super::case::CaseStore;
use super::ledger::{MetadataLedger, MetadataRecord};
use crate::error::{CasedexError, Result};
use crate::index::{FlatL2Index, IndexKind, VectorIndex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

pub const MANIFEST_FILE: &str = "MANIFEST.json";
pub const SCHEMA_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

/// One persisted artifact and its BLAKE3 digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub file: String,
    pub blake3: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFiles {
    pub index: ArtifactRef,
    pub vectors: ArtifactRef,
    pub metadata: ArtifactRef,
}

/// Commit record naming the current generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub namespace: String,
    pub generation: u64,
    pub kind: IndexKind,
    pub dimension: usize,
    pub count: usize,
    pub documents: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub files: ManifestFiles,
}

/// Serialized index structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IndexHeader {
    kind: IndexKind,
    dimension: usize,
    count: usize,
}

/// Result of attempting to load the generation a manifest names
pub(crate) enum LoadOutcome {
    Loaded(CaseStore),
    /// An artifact vanished, most likely pruned by a concurrent save
    ArtifactMissing(String),
}

/// Read the manifest, `None` if the case has never been committed
pub(crate) fn read_manifest(dir: &Path, namespace: &str) -> Result<Option<Manifest>> {
    let path = dir.join(MANIFEST_FILE);
    let content = match fs::read(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CasedexError::io(
                e,
                format!("Failed to read manifest: {}", path.display()),
            ))
        }
    };

    let manifest: Manifest = serde_json::from_slice(&content)
        .map_err(|e| CasedexError::corruption(namespace, format!("unreadable manifest: {}", e)))?;

    if manifest.schema_version != SCHEMA_VERSION {
        return Err(CasedexError::corruption(
            namespace,
            format!("unsupported schema version {}", manifest.schema_version),
        ));
    }
    if manifest.namespace != namespace {
        return Err(CasedexError::corruption(
            namespace,
            format!(
                "manifest belongs to case '{}' (directory collision)",
                manifest.namespace
            ),
        ));
    }

    Ok(Some(manifest))
}

/// Load and verify the generation named by `manifest`
pub(crate) fn load_generation(dir: &Path, manifest: &Manifest) -> Result<LoadOutcome> {
    let ns = manifest.namespace.as_str();

    let header_bytes = match read_artifact(dir, ns, &manifest.files.index)? {
        Some(bytes) => bytes,
        None => return Ok(LoadOutcome::ArtifactMissing(manifest.files.index.file.clone())),
    };
    let vector_bytes = match read_artifact(dir, ns, &manifest.files.vectors)? {
        Some(bytes) => bytes,
        None => return Ok(LoadOutcome::ArtifactMissing(manifest.files.vectors.file.clone())),
    };
    let metadata_bytes = match read_artifact(dir, ns, &manifest.files.metadata)? {
        Some(bytes) => bytes,
        None => {
            return Ok(LoadOutcome::ArtifactMissing(
                manifest.files.metadata.file.clone(),
            ))
        }
    };

    let header: IndexHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| CasedexError::corruption(ns, format!("unreadable index header: {}", e)))?;
    if header.kind != manifest.kind || header.dimension != manifest.dimension {
        return Err(CasedexError::corruption(
            ns,
            format!(
                "index header ({:?}, {}D) disagrees with manifest ({:?}, {}D)",
                header.kind, header.dimension, manifest.kind, manifest.dimension
            ),
        ));
    }

    let index = FlatL2Index::from_raw(header.dimension, decode_vectors(ns, &vector_bytes)?)
        .map_err(|e| CasedexError::corruption(ns, format!("invalid vector data: {}", e)))?;

    let json = zstd::decode_all(&metadata_bytes[..])
        .map_err(|e| CasedexError::corruption(ns, format!("undecodable metadata: {}", e)))?;
    let records: Vec<MetadataRecord> = serde_json::from_slice(&json)
        .map_err(|e| CasedexError::corruption(ns, format!("unreadable metadata: {}", e)))?;

    if index.len() != records.len() {
        return Err(CasedexError::corruption(
            ns,
            format!(
                "vector count {} != metadata count {}",
                index.len(),
                records.len()
            ),
        ));
    }
    if header.count != records.len() || manifest.count != records.len() {
        return Err(CasedexError::corruption(
            ns,
            format!(
                "index header count {} / manifest count {} != ledger length {}",
                header.count,
                manifest.count,
                records.len()
            ),
        ));
    }

    let store = CaseStore::from_parts(
        manifest.namespace.clone(),
        index,
        MetadataLedger::from_records(records),
        manifest.embedding_model.clone(),
        manifest.generation,
    )?;

    Ok(LoadOutcome::Loaded(store))
}

/// Write the next generation of `store` and commit it. Returns the manifest.
pub(crate) fn save_generation(dir: &Path, store: &CaseStore) -> Result<Manifest> {
    let generation = store.generation() + 1;
    let ns = store.namespace();

    fs::create_dir_all(dir).map_err(|e| {
        CasedexError::io(e, format!("Failed to create case directory: {}", dir.display()))
    })?;

    let header = IndexHeader {
        kind: store.index().kind(),
        dimension: store.dimension(),
        count: store.len(),
    };
    let header_bytes = serde_json::to_vec_pretty(&header).map_err(|e| CasedexError::Json {
        source: e,
        context: "Failed to serialize index header".to_string(),
    })?;

    let vector_bytes: Vec<u8> = store
        .index()
        .as_raw()
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();

    let metadata_json =
        serde_json::to_vec(store.ledger().records()).map_err(|e| CasedexError::Json {
            source: e,
            context: "Failed to serialize metadata ledger".to_string(),
        })?;
    let metadata_bytes = zstd::encode_all(&metadata_json[..], ZSTD_LEVEL)
        .map_err(|e| CasedexError::io(e, "Failed to compress metadata ledger"))?;

    let files = ManifestFiles {
        index: write_artifact(dir, &format!("index-{}.json", generation), &header_bytes)?,
        vectors: write_artifact(dir, &format!("vectors-{}.f32", generation), &vector_bytes)?,
        metadata: write_artifact(
            dir,
            &format!("metadata-{}.json.zst", generation),
            &metadata_bytes,
        )?,
    };

    let manifest = Manifest {
        schema_version: SCHEMA_VERSION,
        namespace: ns.to_string(),
        generation,
        kind: header.kind,
        dimension: header.dimension,
        count: header.count,
        documents: store.ledger().document_count(),
        embedding_model: store.embedding_model().map(str::to_string),
        updated_at: Utc::now(),
        files,
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest).map_err(|e| CasedexError::Json {
        source: e,
        context: "Failed to serialize manifest".to_string(),
    })?;

    // Commit point
    atomic_write(dir, MANIFEST_FILE, &manifest_bytes)?;
    sync_dir(dir);

    prune_generations(dir, generation);

    Ok(manifest)
}

fn read_artifact(dir: &Path, namespace: &str, artifact: &ArtifactRef) -> Result<Option<Vec<u8>>> {
    let path = dir.join(&artifact.file);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CasedexError::io(
                e,
                format!("Failed to read artifact: {}", path.display()),
            ))
        }
    };

    let digest = blake3::hash(&bytes).to_hex().to_string();
    if digest != artifact.blake3 {
        return Err(CasedexError::corruption(
            namespace,
            format!("checksum mismatch for {}", artifact.file),
        ));
    }

    Ok(Some(bytes))
}

fn decode_vectors(namespace: &str, bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(CasedexError::corruption(
            namespace,
            format!("vector file length {} is not a multiple of 4", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn write_artifact(dir: &Path, name: &str, data: &[u8]) -> Result<ArtifactRef> {
    atomic_write(dir, name, data)?;
    Ok(ArtifactRef {
        file: name.to_string(),
        blake3: blake3::hash(data).to_hex().to_string(),
        bytes: data.len() as u64,
    })
}

/// Write to a temporary file, fsync, then rename over `name`
fn atomic_write(dir: &Path, name: &str, data: &[u8]) -> Result<()> {
    let temp_path = dir.join(format!(".{}.tmp-{}", name, uuid::Uuid::new_v4()));
    let final_path = dir.join(name);

    let mut file = fs::File::create(&temp_path).map_err(|e| {
        CasedexError::io(e, format!("Failed to create temp file: {}", temp_path.display()))
    })?;
    file.write_all(data).map_err(|e| {
        CasedexError::io(e, format!("Failed to write temp file: {}", temp_path.display()))
    })?;
    file.sync_all().map_err(|e| {
        CasedexError::io(e, format!("Failed to sync temp file: {}", temp_path.display()))
    })?;
    drop(file);

    fs::rename(&temp_path, &final_path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        CasedexError::io(
            e,
            format!(
                "Failed to rename {} -> {}",
                temp_path.display(),
                final_path.display()
            ),
        )
    })
}

fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        if let Err(e) = handle.sync_all() {
            tracing::debug!("Failed to sync directory {}: {}", dir.display(), e);
        }
    }
}

/// Generation number encoded in an artifact file name
fn artifact_generation(name: &str) -> Option<u64> {
    let stem = name
        .strip_prefix("index-")
        .and_then(|s| s.strip_suffix(".json"))
        .or_else(|| {
            name.strip_prefix("vectors-")
                .and_then(|s| s.strip_suffix(".f32"))
        })
        .or_else(|| {
            name.strip_prefix("metadata-")
                .and_then(|s| s.strip_suffix(".json.zst"))
        })?;
    stem.parse().ok()
}

/// Remove artifacts older than the previous generation and leftover temp files.
///
/// The previous generation is kept so readers that loaded the old manifest can
/// still read its artifacts.
fn prune_generations(dir: &Path, current: u64) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to scan {} for old generations: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let stale = match artifact_generation(&name) {
            Some(g) => g + 1 < current,
            None => name.starts_with('.') && name.contains(".tmp-"),
        };
        if stale {
            if let Err(e) = fs::remove_file(entry.path()) {
                tracing::warn!("Failed to remove stale artifact {}: {}", name, e);
            } else {
                tracing::debug!("Pruned stale artifact {}", name);
            }
        }
    }
}
