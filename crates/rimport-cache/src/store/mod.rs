//! On-disk artifact store
//!
//! Layout under the cache root:
//!
//! ```text
//! entries/<d[0..2]>/<digest>/meta.json
//! entries/<d[0..2]>/<digest>/<fingerprint>.src
//! tmp/                                   staging for atomic writes
//! ```
//!
//! Bytes are written before the metadata that references them, and both are
//! moved into place with a rename from `tmp/`. Metadata commits from one
//! process are serialized so a revalidation never overwrites a newer entry.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use parking_lot::Mutex;
use rimport_core::utils::verify_fingerprint;
use rimport_core::{FetchResult, Fingerprint, ImportError, ModulePath};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::entry::{elapsed_since, EntryMeta};
use crate::{CacheEntry, CacheKey, CacheResult};

const ENTRIES_DIR: &str = "entries";
const STAGING_DIR: &str = "tmp";
const META_FILE: &str = "meta.json";
const BLOB_EXTENSION: &str = "src";

/// Staging files and unreferenced blobs younger than this may belong to a
/// writer in flight
const WRITER_GRACE: Duration = Duration::from_secs(60 * 60);

/// Persistent cache of fetched module sources
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    /// Root directory for storage
    root_path: Utf8PathBuf,
    /// Held while metadata is read-compared or replaced
    commit_lock: Arc<Mutex<()>>,
}

impl ArtifactCache {
    /// Open (creating if needed) a cache rooted at `root_path`
    pub fn new<P: AsRef<Utf8Path>>(root_path: P) -> CacheResult<Self> {
        let root_path = root_path.as_ref().to_path_buf();

        for dir in [ENTRIES_DIR, STAGING_DIR] {
            fs::create_dir_all(root_path.join(dir))
                .map_err(|e| ImportError::io(format!("Failed to create cache directory {}", root_path), e))?;
        }

        Ok(Self {
            root_path,
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Get the root path of the cache
    pub fn root_path(&self) -> &Utf8Path {
        &self.root_path
    }

    fn entries_dir(&self) -> Utf8PathBuf {
        self.root_path.join(ENTRIES_DIR)
    }

    fn staging_dir(&self) -> Utf8PathBuf {
        self.root_path.join(STAGING_DIR)
    }

    fn entry_dir(&self, key: &CacheKey) -> Utf8PathBuf {
        let digest = key.digest();
        self.entries_dir().join(&digest[0..2]).join(&digest)
    }

    /// Look up an entry.
    ///
    /// Returns `Ok(None)` on a miss and `CacheCorruption` when the entry
    /// exists but its metadata is unreadable or its bytes fail verification.
    /// Freshness is the caller's decision.
    pub fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        let dir = self.entry_dir(key);

        // A concurrent put may swap the blob between reading meta and bytes
        for _ in 0..2 {
            let Some(meta) = read_meta(&dir, key)? else {
                return Ok(None);
            };

            match fs::read(blob_path(dir.as_std_path(), &meta.fingerprint)) {
                Ok(bytes) => {
                    verify_fingerprint(&bytes, &meta.fingerprint, &key.to_string())?;
                    return Ok(Some(meta.into_entry(bytes)));
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(ImportError::io(format!("Failed to read cached bytes for {}", key), e))
                },
            }
        }

        Err(ImportError::CacheCorruption {
            key: key.to_string(),
            reason: "content file is missing".to_string(),
        })
    }

    /// Store fetched bytes under `key`, replacing any previous entry
    pub fn put(&self, key: &CacheKey, fetched: &FetchResult) -> CacheResult<CacheEntry> {
        let dir = self.entry_dir(key);
        fs::create_dir_all(&dir)
            .map_err(|e| ImportError::io(format!("Failed to create cache entry {}", dir), e))?;

        let blob = blob_path(dir.as_std_path(), &fetched.fingerprint);
        self.write_atomic(&blob, &fetched.bytes)?;

        let meta = EntryMeta::from_fetch(key, fetched);
        {
            let _guard = self.commit_lock.lock();
            self.write_meta(&dir, &meta)?;
        }
        if let Ok(Some(committed)) = read_meta(&dir, key) {
            sweep_blobs(dir.as_std_path(), &committed.fingerprint);
        }

        debug!(key = %key, fingerprint = %meta.fingerprint, size = meta.size, "stored cache entry");
        Ok(meta.into_entry(fetched.bytes.clone()))
    }

    /// Mark the entry as just validated without rewriting its bytes.
    ///
    /// Only an entry still holding `expected` is touched; `Ok(None)` means it
    /// is missing or was replaced in the meantime and the caller should `put`.
    pub fn touch(&self, key: &CacheKey, expected: &Fingerprint) -> CacheResult<Option<CacheEntry>> {
        let dir = self.entry_dir(key);
        {
            let _guard = self.commit_lock.lock();
            let Some(mut meta) = read_meta(&dir, key)? else {
                return Ok(None);
            };
            if meta.fingerprint != *expected {
                debug!(key = %key, current = %meta.fingerprint, "entry replaced before revalidation");
                return Ok(None);
            }

            meta.last_validated = Utc::now();
            self.write_meta(&dir, &meta)?;
        }

        self.get(key)
    }

    /// Remove one entry. Returns whether anything was removed.
    pub fn invalidate(&self, key: &CacheKey) -> CacheResult<bool> {
        let removed = remove_entry_dir(self.entry_dir(key).as_std_path())?;
        if removed {
            debug!(key = %key, "invalidated cache entry");
        }
        Ok(removed)
    }

    /// Remove every entry whose module lies under `prefix`
    pub fn invalidate_prefix(&self, prefix: &ModulePath) -> CacheResult<usize> {
        let mut removed = 0;
        for (dir, meta) in self.scan() {
            let Some(meta) = meta else { continue };
            if meta.module.starts_with(prefix) && remove_entry_dir(&dir)? {
                removed += 1;
            }
        }

        debug!(prefix = %prefix, removed, "invalidated cache prefix");
        Ok(removed)
    }

    /// Remove every entry. Returns the number of entries removed.
    pub fn clear(&self) -> CacheResult<usize> {
        let count = self.scan().len();
        let entries = self.entries_dir();

        match fs::remove_dir_all(&entries) {
            Ok(()) => {},
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => return Err(ImportError::io(format!("Failed to clear cache {}", entries), e)),
        }
        fs::create_dir_all(&entries)
            .map_err(|e| ImportError::io(format!("Failed to recreate cache directory {}", entries), e))?;

        Ok(count)
    }

    /// Summarize the cache contents, classifying entries against `ttl`
    pub fn stats(&self, ttl: Duration) -> CacheStats {
        let mut stats = CacheStats::default();

        for (dir, meta) in self.scan() {
            stats.total_entries += 1;
            match meta {
                Some(meta) => {
                    stats.total_bytes += meta.size;
                    if meta.is_fresh(ttl) {
                        stats.fresh_entries += 1;
                    } else {
                        stats.stale_entries += 1;
                    }
                },
                None => {
                    debug!(entry = %dir.display(), "unreadable cache entry");
                    stats.corrupt_entries += 1;
                },
            }
        }

        stats
    }

    /// Remove entries not validated within `older_than`, plus unreadable
    /// entries and abandoned staging files. Kept entries lose blobs their
    /// metadata no longer references.
    pub fn prune(&self, older_than: Duration) -> CacheResult<PruneResult> {
        let mut result = PruneResult::default();

        for (dir, meta) in self.scan() {
            let size = match &meta {
                Some(meta) if elapsed_since(meta.last_validated) < older_than => {
                    result.freed_space += sweep_blobs(&dir, &meta.fingerprint);
                    continue;
                },
                Some(meta) => meta.size,
                None => 0,
            };
            if remove_entry_dir(&dir)? {
                result.entries_removed += 1;
                result.freed_space += size;
            }
        }

        self.prune_staging();
        Ok(result)
    }

    /// All entry directories with their metadata, `None` when unreadable
    fn scan(&self) -> Vec<(PathBuf, Option<EntryMeta>)> {
        WalkDir::new(self.entries_dir())
            .min_depth(3)
            .max_depth(3)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && entry.file_name() == META_FILE)
            .filter_map(|entry| {
                let dir = entry.path().parent()?.to_path_buf();
                let meta = fs::read(entry.path())
                    .ok()
                    .and_then(|raw| serde_json::from_slice::<EntryMeta>(&raw).ok());
                Some((dir, meta))
            })
            .collect()
    }

    fn prune_staging(&self) {
        let Ok(entries) = fs::read_dir(self.staging_dir()) else {
            return;
        };

        for entry in entries.filter_map(Result::ok) {
            let abandoned = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .map_or(false, |age| age >= WRITER_GRACE);
            if abandoned {
                if let Err(e) = fs::remove_file(entry.path()) {
                    warn!(path = %entry.path().display(), error = %e, "failed to remove staging file");
                }
            }
        }
    }

    fn write_meta(&self, dir: &Utf8Path, meta: &EntryMeta) -> CacheResult<()> {
        let json = serde_json::to_vec_pretty(meta).map_err(|e| ImportError::Io {
            message: "Failed to serialize cache metadata".to_string(),
            detail: e.to_string(),
        })?;
        self.write_atomic(dir.join(META_FILE).as_std_path(), &json)
    }

    /// Write through a staging file and rename into place
    fn write_atomic(&self, target: &Path, contents: &[u8]) -> CacheResult<()> {
        let mut staged = NamedTempFile::new_in(self.staging_dir())
            .map_err(|e| ImportError::io("Failed to create staging file".to_string(), e))?;

        staged
            .write_all(contents)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| ImportError::io("Failed to write staging file".to_string(), e))?;

        staged
            .persist(target)
            .map_err(|e| ImportError::io(format!("Failed to commit {}", target.display()), e.error))?;
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Number of entries within the TTL
    pub fresh_entries: usize,
    /// Number of entries past the TTL
    pub stale_entries: usize,
    /// Entries whose metadata could not be read
    pub corrupt_entries: usize,
    /// Sum of cached source sizes
    pub total_bytes: u64,
}

/// Result of a prune operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneResult {
    /// Number of entries removed
    pub entries_removed: usize,
    /// Bytes freed
    pub freed_space: u64,
}

impl PruneResult {
    /// Format freed space in human-readable format
    pub fn format_freed_space(&self) -> String {
        format_bytes(self.freed_space)
    }
}

/// Format a byte count in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

fn blob_path(dir: &Path, fingerprint: &Fingerprint) -> PathBuf {
    dir.join(format!("{}.{}", fingerprint.to_hex(), BLOB_EXTENSION))
}

fn read_meta(dir: &Utf8Path, key: &CacheKey) -> CacheResult<Option<EntryMeta>> {
    let raw = match fs::read(dir.join(META_FILE)) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ImportError::io(format!("Failed to read cache metadata for {}", key), e)),
    };

    let meta: EntryMeta = serde_json::from_slice(&raw).map_err(|e| ImportError::CacheCorruption {
        key: key.to_string(),
        reason: format!("unreadable metadata: {}", e),
    })?;

    if meta.key() != *key {
        return Err(ImportError::CacheCorruption {
            key: key.to_string(),
            reason: format!("entry belongs to {}", meta.key()),
        });
    }

    Ok(Some(meta))
}

/// Drop blobs other than `keep` that are past the writer grace period.
/// Returns the bytes freed.
fn sweep_blobs(dir: &Path, keep: &Fingerprint) -> u64 {
    let current = format!("{}.{}", keep.to_hex(), BLOB_EXTENSION);
    let Ok(files) = fs::read_dir(dir) else { return 0 };

    let mut freed = 0;
    for file in files.filter_map(Result::ok) {
        let name = file.file_name();
        let is_blob = Path::new(&name).extension().map_or(false, |ext| ext == BLOB_EXTENSION);
        if !is_blob || name == *current {
            continue;
        }

        // Blobs of concurrent writers land before their metadata does
        let Ok(metadata) = file.metadata() else { continue };
        let old_enough = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map_or(false, |age| age >= WRITER_GRACE);
        if !old_enough {
            continue;
        }
        match fs::remove_file(file.path()) {
            Ok(()) => freed += metadata.len(),
            Err(e) => debug!(path = %file.path().display(), error = %e, "failed to remove stale blob"),
        }
    }
    freed
}

fn remove_entry_dir(dir: &Path) -> CacheResult<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ImportError::io(format!("Failed to remove cache entry {}", dir.display()), e)),
    }
}
