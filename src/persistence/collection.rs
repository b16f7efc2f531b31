//! On-disk collection: WAL + snapshots for crash-safe appends.

use crate::collection::{Collection, CollectionRows, NearestRows, RowTable, StoredRow};
use crate::error::Result;
use crate::persistence::serialization::CollectionSnapshot;
use crate::persistence::snapshot::SnapshotManager;
use crate::persistence::wal::WriteAheadLog;
use crate::record::Metadata;
use crate::vector::FeatureVector;
use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration for a persistent collection.
#[derive(Debug, Clone)]
pub struct PersistentCollectionConfig {
    /// Snapshot and truncate the WAL after this many appends.
    pub checkpoint_interval: usize,
}

impl Default for PersistentCollectionConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1000,
        }
    }
}

/// A named collection stored under `<root>/<name>/`.
///
/// Every append is written to the WAL and fsynced before it becomes visible in
/// memory, so a failed write leaves the collection unchanged.
pub struct PersistentCollection {
    name: String,
    dir: PathBuf,
    table: RowTable,
    wal: WriteAheadLog,
    snapshot_mgr: SnapshotManager,
    wal_count: usize,
    config: PersistentCollectionConfig,
}

impl fmt::Debug for PersistentCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentCollection")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("count", &self.table.len())
            .field("wal_count", &self.wal_count)
            .finish()
    }
}

impl PersistentCollection {
    /// Open the collection `name` under `root`, creating it if absent.
    pub fn get_or_create(
        root: impl AsRef<Path>,
        name: &str,
        config: PersistentCollectionConfig,
    ) -> Result<Self> {
        let dir = root.as_ref().join(name);
        std::fs::create_dir_all(&dir)?;

        let snapshot_mgr = SnapshotManager::new(&dir)?;
        let mut wal = WriteAheadLog::open(dir.join("wal.log"))?;
        let mut table = RowTable::default();

        if let Some(snapshot) = snapshot_mgr.load()? {
            for row in snapshot.rows {
                Self::apply_row(&mut table, row)?;
            }
        }

        let replay = wal.replay()?;
        let dropped = wal.discard_tail(replay.valid_len)?;
        if dropped > 0 {
            tracing::warn!(collection = name, bytes = dropped, "cut damaged WAL tail");
        }

        let wal_count = replay.rows.len();
        for row in replay.rows {
            // A crash between snapshot and WAL truncation leaves rows in both.
            if table.contains(&row.id) {
                continue;
            }
            Self::apply_row(&mut table, row)?;
        }

        tracing::info!(
            collection = name,
            records = table.len(),
            replayed = wal_count,
            "opened collection"
        );

        Ok(Self {
            name: name.to_string(),
            dir,
            table,
            wal,
            snapshot_mgr,
            wal_count,
            config,
        })
    }

    fn apply_row(table: &mut RowTable, row: StoredRow) -> Result<()> {
        let vector = FeatureVector::new(row.data);
        table.check_insert(&row.id, &vector)?;
        table.push(row.id, vector, row.metadata);
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Force a checkpoint: snapshot + truncate WAL.
    pub fn checkpoint(&mut self) -> Result<()> {
        let snapshot = CollectionSnapshot {
            name: self.name.clone(),
            rows: self.table.stored_rows(),
            dimension: self.table.dimension(),
        };
        self.snapshot_mgr.save(&snapshot)?;
        self.wal.truncate()?;
        self.wal_count = 0;

        tracing::info!(collection = %self.name, records = snapshot.rows.len(), "checkpoint written");
        Ok(())
    }

    fn maybe_checkpoint(&mut self) -> Result<()> {
        if self.wal_count >= self.config.checkpoint_interval {
            self.checkpoint()?;
        }
        Ok(())
    }
}

impl Collection for PersistentCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&mut self, id: &str, vector: &FeatureVector, metadata: &Metadata) -> Result<()> {
        self.table.check_insert(id, vector)?;

        // WAL first
        self.wal.append(&StoredRow {
            id: id.to_string(),
            data: vector.as_slice().to_vec(),
            metadata: metadata.clone(),
        })?;

        self.table
            .push(id.to_string(), vector.clone(), metadata.clone());
        self.wal_count += 1;

        // The row is durable in the WAL already; a failed checkpoint only delays compaction.
        if let Err(e) = self.maybe_checkpoint() {
            tracing::warn!(collection = %self.name, error = %e, "checkpoint failed");
        }
        Ok(())
    }

    fn get_all(&self) -> Result<CollectionRows> {
        Ok(self.table.all())
    }

    fn count(&self) -> usize {
        self.table.len()
    }

    fn query_nearest(&self, vector: &FeatureVector, k: usize) -> Result<NearestRows> {
        self.table.nearest(vector, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(checkpoint_interval: usize) -> PersistentCollectionConfig {
        PersistentCollectionConfig {
            checkpoint_interval,
        }
    }

    fn meta(label: &str) -> Metadata {
        Metadata::new().with(Metadata::LABEL_KEY, label)
    }

    #[test]
    fn test_append_and_query() {
        let dir = TempDir::new().unwrap();
        let mut c = PersistentCollection::get_or_create(dir.path(), "songs", config(100)).unwrap();

        c.append("a", &FeatureVector::new(vec![1.0, 0.0, 0.0]), &meta("rock"))
            .unwrap();
        c.append("b", &FeatureVector::new(vec![0.0, 1.0, 0.0]), &meta("jazz"))
            .unwrap();

        let res = c
            .query_nearest(&FeatureVector::new(vec![1.0, 0.0, 0.0]), 1)
            .unwrap();
        assert_eq!(res.ids, vec!["a"]);
        assert_eq!(res.metadatas[0].get("label"), Some("rock"));
    }

    #[test]
    fn test_wal_recovery() {
        let dir = TempDir::new().unwrap();

        {
            let mut c =
                PersistentCollection::get_or_create(dir.path(), "songs", config(10_000)).unwrap();
            for i in 0..3 {
                c.append(
                    &format!("id{}", i),
                    &FeatureVector::new(vec![i as f32, 1.0]),
                    &meta("rock"),
                )
                .unwrap();
            }
            assert_eq!(c.count(), 3);
        }

        let c = PersistentCollection::get_or_create(dir.path(), "songs", config(10_000)).unwrap();
        assert_eq!(c.count(), 3);
        let rows = c.get_all().unwrap();
        assert_eq!(rows.ids, vec!["id0", "id1", "id2"]);
        assert_eq!(rows.vectors[2].as_slice(), &[2.0, 1.0]);
    }

    #[test]
    fn test_checkpoint_and_recovery() {
        let dir = TempDir::new().unwrap();

        {
            let mut c =
                PersistentCollection::get_or_create(dir.path(), "songs", config(2)).unwrap();
            c.append("a", &FeatureVector::new(vec![1.0, 0.0]), &meta("rock"))
                .unwrap();
            c.append("b", &FeatureVector::new(vec![0.0, 1.0]), &meta("pop"))
                .unwrap();
            // Checkpoint happened after the second append
            assert!(c.dir().join("snapshot.bin").exists());
            c.append("c", &FeatureVector::new(vec![1.0, 1.0]), &meta("jazz"))
                .unwrap();
        }

        let c = PersistentCollection::get_or_create(dir.path(), "songs", config(10_000)).unwrap();
        assert_eq!(c.count(), 3);
        assert_eq!(c.get_all().unwrap().metadatas[2].get("label"), Some("jazz"));
    }

    #[test]
    fn test_rows_in_snapshot_and_wal_not_duplicated() {
        let dir = TempDir::new().unwrap();

        {
            let mut c =
                PersistentCollection::get_or_create(dir.path(), "songs", config(10_000)).unwrap();
            c.append("a", &FeatureVector::new(vec![1.0]), &meta("rock"))
                .unwrap();
            // Snapshot without truncating the WAL, as if the process died mid-checkpoint
            let snapshot = CollectionSnapshot {
                name: "songs".to_string(),
                rows: c.table.stored_rows(),
                dimension: Some(1),
            };
            c.snapshot_mgr.save(&snapshot).unwrap();
        }

        let c = PersistentCollection::get_or_create(dir.path(), "songs", config(10_000)).unwrap();
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_appends_after_torn_tail_survive_restart() {
        use std::io::Write;

        let dir = TempDir::new().unwrap();
        {
            let mut c =
                PersistentCollection::get_or_create(dir.path(), "songs", config(10_000)).unwrap();
            c.append("a", &FeatureVector::new(vec![1.0, 0.0]), &meta("rock"))
                .unwrap();
        }

        // Crash mid-frame
        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(dir.path().join("songs").join("wal.log"))
                .unwrap();
            file.write_all(&[0xAB, 0xCD, 0xEF]).unwrap();
        }

        {
            let mut c =
                PersistentCollection::get_or_create(dir.path(), "songs", config(10_000)).unwrap();
            assert_eq!(c.count(), 1);
            c.append("b", &FeatureVector::new(vec![0.0, 1.0]), &meta("jazz"))
                .unwrap();
            assert_eq!(c.count(), 2);
        }

        let c = PersistentCollection::get_or_create(dir.path(), "songs", config(10_000)).unwrap();
        assert_eq!(c.count(), 2);
        assert_eq!(c.get_all().unwrap().ids, vec!["a", "b"]);
    }

    #[test]
    fn test_separate_collections_are_isolated() {
        let dir = TempDir::new().unwrap();
        let mut songs =
            PersistentCollection::get_or_create(dir.path(), "songs", config(100)).unwrap();
        let images =
            PersistentCollection::get_or_create(dir.path(), "images", config(100)).unwrap();

        songs
            .append("a", &FeatureVector::new(vec![1.0]), &meta("rock"))
            .unwrap();
        assert_eq!(songs.count(), 1);
        assert_eq!(images.count(), 0);
    }

    #[test]
    fn test_many_records_recovery() {
        let dir = TempDir::new().unwrap();

        {
            let mut c =
                PersistentCollection::get_or_create(dir.path(), "songs", config(250)).unwrap();
            for i in 0..1000 {
                c.append(
                    &format!("v{}", i),
                    &FeatureVector::new(vec![i as f32, (i * 2) as f32]),
                    &meta("rock"),
                )
                .unwrap();
            }
        }

        let c = PersistentCollection::get_or_create(dir.path(), "songs", config(10_000)).unwrap();
        assert_eq!(c.count(), 1000);
    }
}
