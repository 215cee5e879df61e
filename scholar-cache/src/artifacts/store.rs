//! Artifact store implementation with deduplication and LRU garbage collection

use crate::artifacts::{
    is_sha256_hex, sha256_hex, ArtifactInfo, ArtifactMetadata, ArtifactStoreConfig, CompactReport,
    DiskUsage,
};
use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Temp files younger than this may belong to a write in progress
const TEMP_FILE_GRACE: Duration = Duration::from_secs(60);

const MB: f64 = 1024.0 * 1024.0;

/// On-disk index record
#[derive(Debug, Serialize, Deserialize)]
struct IndexRecord {
    artifact_id: String,
    metadata: ArtifactMetadata,
}

/// In-memory mirror of the index and blob directories
#[derive(Default)]
struct StoreState {
    /// artifact id -> metadata
    index: HashMap<String, ArtifactMetadata>,

    /// hash -> number of index entries pointing at it
    refs: HashMap<String, u64>,

    /// hash -> blob size on disk
    blobs: HashMap<String, u64>,

    /// Sum of blob sizes
    used_bytes: u64,
}

impl StoreState {
    fn add_ref(&mut self, hash: &str) {
        *self.refs.entry(hash.to_string()).or_insert(0) += 1;
    }

    /// Drop one reference and return how many remain
    fn release_ref(&mut self, hash: &str) -> u64 {
        match self.refs.get_mut(hash) {
            Some(count) if *count > 1 => {
                *count -= 1;
                *count
            }
            _ => {
                self.refs.remove(hash);
                0
            }
        }
    }

    fn is_referenced(&self, hash: &str) -> bool {
        self.refs.get(hash).copied().unwrap_or(0) > 0
    }

    fn add_blob(&mut self, hash: &str, size: u64) {
        if let Some(previous) = self.blobs.insert(hash.to_string(), size) {
            self.used_bytes = self.used_bytes.saturating_sub(previous);
        }
        self.used_bytes += size;
    }

    fn remove_blob(&mut self, hash: &str) -> u64 {
        let size = self.blobs.remove(hash).unwrap_or(0);
        self.used_bytes = self.used_bytes.saturating_sub(size);
        size
    }
}

/// Content-addressed, size-bounded blob store
///
/// All index and blob mutations happen under one mutex, taken once per
/// mutation. Garbage collection re-takes it for every victim, so concurrent
/// stores and reads interleave with a long sweep.
pub struct ArtifactStore {
    config: ArtifactStoreConfig,
    state: Mutex<StoreState>,
}

impl ArtifactStore {
    /// Open the store, creating the directory layout and loading the index from disk
    pub fn open(config: ArtifactStoreConfig) -> Result<Self> {
        config.validate()?;

        for dir in [config.artifacts_dir(), config.index_dir(), config.tmp_dir()] {
            fs::create_dir_all(&dir)?;
        }

        let (state, corrupt) = load_state(&config)?;
        info!(
            base_dir = %config.base_dir.display(),
            artifacts = state.blobs.len(),
            index_entries = state.index.len(),
            used_bytes = state.used_bytes,
            corrupt_index_removed = corrupt,
            "Opened artifact store"
        );

        Ok(Self {
            config,
            state: Mutex::new(state),
        })
    }

    pub fn config(&self) -> &ArtifactStoreConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        blob_path(&self.config, hash)
    }

    /// Index records are named after the hash of the id, never the id itself
    fn index_path(&self, artifact_id: &str) -> PathBuf {
        self.config
            .index_dir()
            .join(format!("{}.json", sha256_hex(artifact_id.as_bytes())))
    }

    fn write_temp(&self, bytes: &[u8]) -> Result<PathBuf> {
        let tmp = self.config.tmp_dir().join(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, bytes)?;
        Ok(tmp)
    }

    fn write_atomic(&self, dest: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = self.write_temp(bytes)?;
        if let Err(e) = fs::rename(&tmp, dest) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn write_index(&self, artifact_id: &str, metadata: &ArtifactMetadata) -> Result<()> {
        let record = IndexRecord {
            artifact_id: artifact_id.to_string(),
            metadata: metadata.clone(),
        };
        let raw = serde_json::to_vec_pretty(&record)?;
        self.write_atomic(&self.index_path(artifact_id), &raw)
    }

    /// Store `content` under `artifact_id`
    ///
    /// The blob is written only if no blob with the same hash exists; the
    /// index record is always (over)written. Runs garbage collection when the
    /// store ends up over its size limit.
    pub fn store(
        &self,
        artifact_id: &str,
        content: &[u8],
        info: ArtifactInfo,
    ) -> Result<ArtifactMetadata> {
        let hash = sha256_hex(content);
        let size = content.len() as u64;
        let dest = self.blob_path(&hash);

        let have_blob = self.state().blobs.contains_key(&hash) && dest.exists();
        let staged = if have_blob {
            None
        } else {
            Some(self.write_temp(content)?)
        };

        let now = Utc::now();
        let metadata = ArtifactMetadata {
            hash_value: hash.clone(),
            size,
            mime_type: info.mime_type,
            etag: info.etag,
            last_modified: info.last_modified,
            stored_at: now,
            last_accessed: now,
        };

        let overage = {
            let mut state = self.state();

            // GC may have removed an unreferenced blob since the check above
            let present = state.blobs.contains_key(&hash) && dest.exists();
            match staged {
                // another writer got there first
                Some(tmp) if present => {
                    let _ = fs::remove_file(&tmp);
                }
                Some(tmp) => self.install_blob(&mut state, &tmp, &dest, &hash, size)?,
                None if present => {}
                None => {
                    let tmp = self.write_temp(content)?;
                    self.install_blob(&mut state, &tmp, &dest, &hash, size)?;
                }
            }

            self.write_index(artifact_id, &metadata)?;
            if let Some(previous) = state.index.insert(artifact_id.to_string(), metadata.clone()) {
                state.release_ref(&previous.hash_value);
            }
            state.add_ref(&hash);

            state.used_bytes.saturating_sub(self.config.size_limit_bytes)
        };

        debug!(artifact_id, hash = %hash, size, deduplicated = have_blob, "Stored artifact");

        if overage > 0 {
            let margin =
                (self.config.size_limit_bytes as f64 * self.config.gc_margin_fraction) as u64;
            let freed = self.collect(overage + margin, Some(artifact_id));
            if freed < overage {
                warn!(overage, freed, "Artifact store still over its size limit after GC");
            }
        }

        Ok(metadata)
    }

    /// Move a staged temp file into place. Caller holds the state lock
    fn install_blob(
        &self,
        state: &mut StoreState,
        tmp: &Path,
        dest: &Path,
        hash: &str,
        size: u64,
    ) -> Result<()> {
        if let Some(shard) = dest.parent() {
            fs::create_dir_all(shard)?;
        }
        if let Err(e) = fs::rename(tmp, dest) {
            let _ = fs::remove_file(tmp);
            return Err(e.into());
        }
        state.add_blob(hash, size);
        Ok(())
    }

    /// Content and metadata for an id, refreshing its access time
    ///
    /// An index record whose blob is missing or truncated is logged and
    /// reported as not found.
    pub fn retrieve(&self, artifact_id: &str) -> Option<(Vec<u8>, ArtifactMetadata)> {
        let metadata = self.state().index.get(artifact_id).cloned()?;

        let content = match fs::read(self.blob_path(&metadata.hash_value)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let integrity = CacheError::Integrity {
                    artifact_id: artifact_id.to_string(),
                    hash: metadata.hash_value.clone(),
                };
                error!(error = %integrity, "Artifact blob missing");
                return None;
            }
            Err(e) => {
                warn!(artifact_id, error = %e, "Reading artifact blob failed");
                return None;
            }
        };

        if content.len() as u64 != metadata.size {
            error!(
                artifact_id,
                expected = metadata.size,
                actual = content.len(),
                "Artifact blob has the wrong size"
            );
            return None;
        }

        let metadata = self.touch(artifact_id, &metadata.hash_value).unwrap_or(metadata);
        Some((content, metadata))
    }

    fn touch(&self, artifact_id: &str, hash: &str) -> Option<ArtifactMetadata> {
        let mut state = self.state();
        let metadata = state.index.get_mut(artifact_id)?;
        if metadata.hash_value != hash {
            return None;
        }

        let now = Utc::now();
        if now > metadata.last_accessed {
            metadata.last_accessed = now;
        }
        let updated = metadata.clone();

        if let Err(e) = self.write_index(artifact_id, &updated) {
            warn!(artifact_id, error = %e, "Persisting artifact access time failed");
        }
        Some(updated)
    }

    /// Blob content by hash, without touching any index record
    pub fn retrieve_by_hash(&self, hash: &str) -> Option<Vec<u8>> {
        if !is_sha256_hex(hash) || !self.state().blobs.contains_key(hash) {
            return None;
        }
        fs::read(self.blob_path(hash)).ok()
    }

    pub fn exists(&self, artifact_id: &str) -> bool {
        self.state().index.contains_key(artifact_id)
    }

    /// Metadata only; the blob is not read
    pub fn get_metadata(&self, artifact_id: &str) -> Option<ArtifactMetadata> {
        self.state().index.get(artifact_id).cloned()
    }

    /// Every indexed id with its metadata, sorted by id
    pub fn list_artifacts(&self) -> Vec<(String, ArtifactMetadata)> {
        let mut artifacts: Vec<(String, ArtifactMetadata)> = self
            .state()
            .index
            .iter()
            .map(|(id, metadata)| (id.clone(), metadata.clone()))
            .collect();
        artifacts.sort_by(|a, b| a.0.cmp(&b.0));
        artifacts
    }

    /// Remove the index record for `artifact_id`
    ///
    /// The blob stays on disk until garbage collection or the orphan sweep
    /// finds it unreferenced.
    pub fn delete(&self, artifact_id: &str) -> bool {
        let mut state = self.state();
        if !state.index.contains_key(artifact_id) {
            return false;
        }

        if let Err(e) = remove_file_if_exists(&self.index_path(artifact_id)) {
            warn!(artifact_id, error = %e, "Deleting artifact index record failed");
            return false;
        }
        if let Some(metadata) = state.index.remove(artifact_id) {
            state.release_ref(&metadata.hash_value);
        }

        debug!(artifact_id, "Deleted artifact index record");
        true
    }

    pub fn get_disk_usage(&self) -> DiskUsage {
        let state = self.state();
        let limit = self.config.size_limit_bytes;

        DiskUsage {
            used_bytes: state.used_bytes,
            used_mb: state.used_bytes as f64 / MB,
            used_percent: state.used_bytes as f64 / limit as f64 * 100.0,
            artifact_count: state.blobs.len(),
            index_count: state.index.len(),
            limit_mb: limit as f64 / MB,
        }
    }

    /// Free at least `bytes_to_free` bytes if that much is reclaimable
    ///
    /// Unreferenced blobs go first, then index records in least recently
    /// accessed order. A blob is deleted only once no record references it.
    /// Returns the bytes actually freed.
    pub fn garbage_collect(&self, bytes_to_free: u64) -> u64 {
        self.collect(bytes_to_free, None)
    }

    fn collect(&self, bytes_to_free: u64, protect: Option<&str>) -> u64 {
        if bytes_to_free == 0 {
            return 0;
        }

        let mut freed = 0;
        let mut blobs_removed = 0;
        let mut records_removed = 0;

        let unreferenced: Vec<String> = {
            let state = self.state();
            state
                .blobs
                .keys()
                .filter(|hash| !state.is_referenced(hash))
                .cloned()
                .collect()
        };
        for hash in unreferenced {
            if freed >= bytes_to_free {
                break;
            }
            let mut state = self.state();
            if state.is_referenced(&hash) {
                continue;
            }
            if let Some(size) = self.remove_blob_locked(&mut state, &hash) {
                freed += size;
                blobs_removed += 1;
            }
        }

        let mut candidates: Vec<(String, DateTime<Utc>, DateTime<Utc>)> = {
            let state = self.state();
            state
                .index
                .iter()
                .filter(|(id, _)| Some(id.as_str()) != protect)
                .map(|(id, m)| (id.clone(), m.last_accessed, m.stored_at))
                .collect()
        };
        candidates.sort_by(|a, b| (a.1, a.2).cmp(&(b.1, b.2)));

        for (artifact_id, _, _) in candidates {
            if freed >= bytes_to_free {
                break;
            }

            let mut state = self.state();
            let Some(hash) = state.index.get(&artifact_id).map(|m| m.hash_value.clone()) else {
                continue;
            };
            if let Err(e) = remove_file_if_exists(&self.index_path(&artifact_id)) {
                warn!(artifact_id = %artifact_id, error = %e, "GC could not remove index record");
                continue;
            }
            state.index.remove(&artifact_id);
            records_removed += 1;
            debug!(artifact_id = %artifact_id, "GC evicted artifact");

            if state.release_ref(&hash) == 0 {
                if let Some(size) = self.remove_blob_locked(&mut state, &hash) {
                    freed += size;
                    blobs_removed += 1;
                }
            }
        }

        info!(
            requested = bytes_to_free,
            freed, records_removed, blobs_removed, "Artifact garbage collection finished"
        );
        freed
    }

    fn remove_blob_locked(&self, state: &mut StoreState, hash: &str) -> Option<u64> {
        match remove_file_if_exists(&self.blob_path(hash)) {
            Ok(()) => Some(state.remove_blob(hash)),
            Err(e) => {
                warn!(hash, error = %e, "Removing artifact blob failed");
                None
            }
        }
    }

    /// Delete blobs on disk that no index record references
    pub fn clean_orphaned_artifacts(&self) -> Result<u64> {
        let mut removed = 0;

        for shard in fs::read_dir(self.config.artifacts_dir())? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }

            for file in fs::read_dir(shard.path())? {
                let file = file?;
                let name = file.file_name().to_string_lossy().into_owned();

                let mut state = self.state();
                if state.is_referenced(&name) {
                    if !state.blobs.contains_key(&name) {
                        state.add_blob(&name, file.metadata()?.len());
                    }
                    continue;
                }

                match remove_file_if_exists(&file.path()) {
                    Ok(()) => {
                        state.remove_blob(&name);
                        removed += 1;
                        debug!(file = %name, "Removed orphaned artifact");
                    }
                    Err(e) => warn!(file = %name, error = %e, "Removing orphaned artifact failed"),
                }
            }
        }

        if removed > 0 {
            info!(removed, "Cleaned orphaned artifacts");
        }
        Ok(removed)
    }

    /// Remove stale temp files and unreadable index records, reload usage
    /// from disk and sweep orphaned blobs
    pub fn compact(&self) -> Result<CompactReport> {
        let temp_files_removed = self.remove_stale_temp_files()?;

        let corrupt_index_removed = {
            let mut state = self.state();
            let (fresh, corrupt) = load_state(&self.config)?;
            *state = fresh;
            corrupt
        };

        let orphans_removed = self.clean_orphaned_artifacts()?;

        let state = self.state();
        let report = CompactReport {
            orphans_removed,
            artifacts_remaining: state.blobs.len(),
            index_entries: state.index.len(),
            temp_files_removed,
            corrupt_index_removed,
        };

        info!(?report, "Compacted artifact store");
        Ok(report)
    }

    fn remove_stale_temp_files(&self) -> Result<u64> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in fs::read_dir(self.config.tmp_dir())? {
            let entry = entry?;
            let modified = entry.metadata()?.modified()?;
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age >= TEMP_FILE_GRACE {
                remove_file_if_exists(&entry.path())?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Remove every blob and index record
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state();

        for dir in [
            self.config.artifacts_dir(),
            self.config.index_dir(),
            self.config.tmp_dir(),
        ] {
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            fs::create_dir_all(&dir)?;
        }

        let (records, blobs) = (state.index.len(), state.blobs.len());
        *state = StoreState::default();

        info!(records, blobs, "Cleared artifact store");
        Ok(())
    }
}

fn blob_path(config: &ArtifactStoreConfig, hash: &str) -> PathBuf {
    let shard = hash.get(..2).unwrap_or("00");
    config.artifacts_dir().join(shard).join(hash)
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Read the index and blob directories. Unreadable index records are deleted
/// and counted.
fn load_state(config: &ArtifactStoreConfig) -> Result<(StoreState, u64)> {
    let mut state = StoreState::default();
    let mut corrupt = 0;

    for entry in fs::read_dir(config.index_dir())? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let record = fs::read(&path)
            .ok()
            .and_then(|raw| serde_json::from_slice::<IndexRecord>(&raw).ok())
            .filter(|record| is_sha256_hex(&record.metadata.hash_value));

        match record {
            Some(record) => {
                state.add_ref(&record.metadata.hash_value);
                state.index.insert(record.artifact_id, record.metadata);
            }
            None => {
                warn!(path = %path.display(), "Removing unreadable artifact index record");
                remove_file_if_exists(&path)?;
                corrupt += 1;
            }
        }
    }

    for shard in fs::read_dir(config.artifacts_dir())? {
        let shard = shard?;
        if !shard.file_type()?.is_dir() {
            continue;
        }
        for file in fs::read_dir(shard.path())? {
            let file = file?;
            let name = file.file_name().to_string_lossy().into_owned();
            if is_sha256_hex(&name) && file.file_type()?.is_file() {
                state.add_blob(&name, file.metadata()?.len());
            }
        }
    }

    Ok((state, corrupt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn create_test_store(limit_bytes: u64) -> (ArtifactStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let config = ArtifactStoreConfig::new(temp_dir.path()).size_limit_bytes(limit_bytes);
        let store = ArtifactStore::open(config).expect("open should succeed");
        (store, temp_dir)
    }

    #[test]
    fn test_layout_on_disk() {
        let (store, dir) = create_test_store(1 << 20);
        let meta = store.store("pmc:PMC1:pdf", b"%PDF-1.7", ArtifactInfo::new()).unwrap();

        let blob = dir
            .path()
            .join("artifacts")
            .join(&meta.hash_value[..2])
            .join(&meta.hash_value);
        assert!(blob.is_file());

        let index = dir
            .path()
            .join("index")
            .join(format!("{}.json", sha256_hex(b"pmc:PMC1:pdf")));
        assert!(index.is_file());
    }

    #[test]
    fn test_overwrite_moves_reference() {
        let (store, _dir) = create_test_store(1 << 20);
        let first = store.store("id", b"one", ArtifactInfo::new()).unwrap();
        let second = store.store("id", b"two", ArtifactInfo::new()).unwrap();
        assert_ne!(first.hash_value, second.hash_value);

        let usage = store.get_disk_usage();
        assert_eq!(usage.index_count, 1);
        // the old blob lingers until collected
        assert_eq!(usage.artifact_count, 2);

        let freed = store.garbage_collect(1);
        assert_eq!(freed, 3);
        assert_eq!(store.retrieve("id").unwrap().0, b"two");
        assert_eq!(store.get_disk_usage().artifact_count, 1);
    }

    #[test]
    fn test_retrieve_updates_last_accessed() {
        let (store, _dir) = create_test_store(1 << 20);
        let stored = store.store("id", b"payload", ArtifactInfo::new()).unwrap();
        std::thread::sleep(Duration::from_millis(10));

        let (_, retrieved) = store.retrieve("id").unwrap();
        assert!(retrieved.last_accessed > stored.last_accessed);
        assert_eq!(retrieved.stored_at, stored.stored_at);
        assert_eq!(store.get_metadata("id").unwrap(), retrieved);
    }

    #[test]
    fn test_missing_blob_is_not_found() {
        let (store, _dir) = create_test_store(1 << 20);
        let meta = store.store("id", b"payload", ArtifactInfo::new()).unwrap();
        fs::remove_file(store.blob_path(&meta.hash_value)).unwrap();

        assert!(store.exists("id"));
        assert!(store.retrieve("id").is_none());
    }

    #[test]
    fn test_delete_keeps_shared_blob() {
        let (store, _dir) = create_test_store(1 << 20);
        let meta = store.store("a", b"same", ArtifactInfo::new()).unwrap();
        store.store("b", b"same", ArtifactInfo::new()).unwrap();

        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert_eq!(store.clean_orphaned_artifacts().unwrap(), 0);
        assert_eq!(store.retrieve("b").unwrap().0, b"same");

        assert!(store.delete("b"));
        assert_eq!(store.clean_orphaned_artifacts().unwrap(), 1);
        assert!(store.retrieve_by_hash(&meta.hash_value).is_none());
    }

    #[test]
    fn test_retrieve_by_hash_rejects_paths() {
        let (store, _dir) = create_test_store(1 << 20);
        let meta = store.store("id", b"content", ArtifactInfo::new()).unwrap();
        assert_eq!(store.retrieve_by_hash(&meta.hash_value).unwrap(), b"content");
        assert!(store.retrieve_by_hash("../../index").is_none());
    }

    #[test]
    fn test_compact_removes_debris() {
        let (store, dir) = create_test_store(1 << 20);
        store.store("keep", b"keep", ArtifactInfo::new()).unwrap();

        // unreadable index record
        fs::write(dir.path().join("index").join("junk.json"), b"{not json").unwrap();
        // orphaned blob
        let orphan = sha256_hex(b"orphan");
        let shard = dir.path().join("artifacts").join(&orphan[..2]);
        fs::create_dir_all(&shard).unwrap();
        fs::write(shard.join(&orphan), b"orphan").unwrap();
        // stale and fresh temp files
        let stale = dir.path().join("tmp").join("stale.tmp");
        fs::write(&stale, b"x").unwrap();
        File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();
        fs::write(dir.path().join("tmp").join("fresh.tmp"), b"y").unwrap();

        let report = store.compact().unwrap();
        assert_eq!(
            report,
            CompactReport {
                orphans_removed: 1,
                artifacts_remaining: 1,
                index_entries: 1,
                temp_files_removed: 1,
                corrupt_index_removed: 1,
            }
        );
        assert_eq!(store.get_disk_usage().used_bytes, 4);
    }

    #[test]
    fn test_clear() {
        let (store, _dir) = create_test_store(1 << 20);
        store.store("a", b"1", ArtifactInfo::new()).unwrap();
        store.store("b", b"2", ArtifactInfo::new()).unwrap();

        store.clear().unwrap();
        assert_eq!(store.get_disk_usage(), DiskUsage {
            limit_mb: 1.0,
            ..Default::default()
        });
        assert!(store.list_artifacts().is_empty());
        // still usable
        store.store("c", b"3", ArtifactInfo::new()).unwrap();
        assert!(store.exists("c"));
    }

    #[test]
    fn test_list_artifacts_sorted() {
        let (store, _dir) = create_test_store(1 << 20);
        store.store("b", b"2", ArtifactInfo::new()).unwrap();
        store.store("a", b"1", ArtifactInfo::new()).unwrap();
        let ids: Vec<String> = store.list_artifacts().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
