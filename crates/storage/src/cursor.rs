use std::path::{Path, PathBuf};
use std::sync::Mutex;

use buildwatch_core::BuilderCursor;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::error::StorageError;
use crate::files;

/// Per-builder resumption cursors.
///
/// Each value is the last build index consumed from that builder's feed and
/// never moves backward. `register` and `advance` only touch memory; when the
/// registry is opened on a directory, [`CursorRegistry::persist`] writes a
/// builder's current value to `{dir}/{builder}.json`. That call blocks, so
/// async callers run it on the blocking pool.
#[derive(Debug)]
pub struct CursorRegistry {
    cursors: DashMap<String, u64>,
    dir: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl CursorRegistry {
    /// A registry that forgets everything on drop.
    pub fn in_memory() -> Self {
        Self {
            cursors: DashMap::new(),
            dir: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Open (or create) a file-backed registry and load every persisted cursor.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        let cursors: DashMap<String, u64> = files::load_dir::<BuilderCursor>(&dir)?
            .into_iter()
            .map(|c| (c.builder_name, c.last_consumed_index))
            .collect();

        info!(dir = %dir.display(), count = cursors.len(), "Cursor registry opened");
        Ok(Self {
            cursors,
            dir: Some(dir),
            write_lock: Mutex::new(()),
        })
    }

    /// Record `starting_index` for a builder. Creates the cursor if absent;
    /// otherwise only raises it, never lowers it. Returns the effective value.
    pub fn register(&self, builder: &str, starting_index: u64) -> u64 {
        match self.cursors.entry(builder.to_string()) {
            Entry::Occupied(mut slot) => {
                if *slot.get() < starting_index {
                    *slot.get_mut() = starting_index;
                }
                *slot.get()
            }
            Entry::Vacant(slot) => *slot.insert(starting_index),
        }
    }

    /// Move a registered cursor strictly forward.
    pub fn advance(&self, builder: &str, new_index: u64) -> Result<(), StorageError> {
        let mut slot = self
            .cursors
            .get_mut(builder)
            .ok_or_else(|| StorageError::UnknownBuilder(builder.to_string()))?;
        let current = *slot;
        if new_index <= current {
            return Err(StorageError::MonotonicityViolation {
                builder: builder.to_string(),
                current,
                requested: new_index,
            });
        }
        *slot = new_index;
        Ok(())
    }

    pub fn read(&self, builder: &str) -> Option<u64> {
        self.cursors.get(builder).map(|v| *v)
    }

    /// All cursors, sorted by builder name.
    pub fn snapshot(&self) -> Vec<BuilderCursor> {
        let mut all: Vec<BuilderCursor> = self
            .cursors
            .iter()
            .map(|e| BuilderCursor {
                builder_name: e.key().clone(),
                last_consumed_index: *e.value(),
            })
            .collect();
        all.sort_by(|a, b| a.builder_name.cmp(&b.builder_name));
        all
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Write the builder's current cursor to disk. No-op for an in-memory
    /// registry or an unknown builder.
    ///
    /// Writes are serialized and each one reads the value after taking the
    /// write lock, so the file never ends up behind memory once every
    /// pending `persist` has returned.
    pub fn persist(&self, builder: &str) -> Result<(), StorageError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let Some(index) = self.read(builder) else {
            return Ok(());
        };
        let cursor = BuilderCursor {
            builder_name: builder.to_string(),
            last_consumed_index: index,
        };
        files::write_atomic(&files::entry_path(dir, builder), &cursor)
    }
}
