//! Snapshot: save/load a full collection to/from disk.

use crate::error::Result;
use crate::persistence::serialization::{self, CollectionSnapshot, SnapshotManifest};
use std::fs;
use std::path::{Path, PathBuf};

/// Manages saving and loading collection snapshots.
pub struct SnapshotManager {
    dir: PathBuf,
}

impl SnapshotManager {
    /// Create a snapshot manager for the given directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.bin")
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Save a snapshot. The data file is replaced atomically via rename.
    pub fn save(&self, snapshot: &CollectionSnapshot) -> Result<()> {
        let data = serialization::to_bincode(snapshot)?;
        let tmp = self.dir.join("snapshot.bin.tmp");
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, self.snapshot_path())?;

        let manifest = serialization::to_json(&SnapshotManifest::from(snapshot))?;
        fs::write(self.manifest_path(), &manifest)?;

        Ok(())
    }

    /// Load a snapshot from disk, or return None if no snapshot exists.
    pub fn load(&self) -> Result<Option<CollectionSnapshot>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let snapshot: CollectionSnapshot = serialization::from_bincode(&data)?;
        Ok(Some(snapshot))
    }

    /// Read the JSON manifest, if a snapshot has been written.
    pub fn manifest(&self) -> Result<Option<SnapshotManifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        Ok(Some(serialization::from_json(&data)?))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }
}
