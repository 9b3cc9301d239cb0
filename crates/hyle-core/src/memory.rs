// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The in-memory source suite.
//!
//! [`MemoryStore`] is a shared volume of serialized assets with a change
//! journal; [`MemoryLoader`] and [`MemorySource`] front the same store for
//! the pipeline and for the import loop, and [`MemoryRecordStore`] is the
//! matching record store. Together they stand in for production sources in
//! tests and demos.
//!
//! Mutations made through the store's own API (insert, rename, remove,
//! touch) land in the journal and surface on the next scan. Sidecar writes
//! made by the pipeline itself do not journal; otherwise every import would
//! echo back as a fresh change.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{AssetError, AssetResult};
use crate::format::FormatTag;
use crate::id::AssetId;
use crate::loader::LoaderConfig;
use crate::record::{AssetRecord, Fingerprint, RecordStore};
use crate::reference::{AssetPath, AssetReference};
use crate::source::{Source, SourceBytes, SourceChange};

#[derive(Debug, Clone)]
struct StoredItem {
    format: FormatTag,
    bytes: Vec<u8>,
    fingerprint: Fingerprint,
    mtime: u64,
}

#[derive(Debug, Default)]
struct VolumeState {
    items: HashMap<String, StoredItem>,
    sidecars: HashMap<String, Vec<u8>>,
    id_index: HashMap<AssetId, String>,
    journal: Vec<SourceChange>,
    ignored: HashSet<String>,
    clock: u64,
}

/// A shared in-memory volume of serialized assets, keyed by locator.
#[derive(Debug)]
pub struct MemoryStore {
    scheme: String,
    state: Mutex<VolumeState>,
}

impl MemoryStore {
    /// Creates an empty volume serving `scheme`.
    pub fn new(scheme: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            scheme: scheme.into(),
            state: Mutex::new(VolumeState::default()),
        })
    }

    /// The scheme this volume serves.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Puts content at a locator and journals the change. Overwrites any
    /// previous content, and resumes following a forgotten locator.
    pub fn insert(&self, locator: impl Into<String>, format: impl Into<FormatTag>, bytes: Vec<u8>) {
        let locator = locator.into();
        let format = format.into();
        let mut state = self.lock();
        state.clock += 1;
        let item = StoredItem {
            format: format.clone(),
            fingerprint: Fingerprint::of(&bytes),
            mtime: state.clock,
            bytes,
        };
        state.ignored.remove(&locator);
        state.journal.push(SourceChange::Upserted {
            path: self.path(&locator),
            format,
            fingerprint: item.fingerprint,
            mtime: item.mtime,
        });
        state.items.insert(locator, item);
    }

    /// Moves content to a new locator, keeping its format, and journals the
    /// move. Sidecar and id index follow the content.
    pub fn rename(&self, from: &str, to: impl Into<String>) {
        self.rename_inner(from, to.into(), None);
    }

    /// Moves content to a new locator and changes its serialized format at
    /// the same time.
    pub fn rename_with_format(&self, from: &str, to: impl Into<String>, format: impl Into<FormatTag>) {
        self.rename_inner(from, to.into(), Some(format.into()));
    }

    /// Deletes the content at a locator and journals the removal. Any
    /// sidecar stays behind until someone clears it.
    pub fn remove(&self, locator: &str) {
        let mut state = self.lock();
        if state.items.remove(locator).is_none() {
            return;
        }
        state.ignored.remove(locator);
        state.journal.push(SourceChange::Removed {
            path: self.path(locator),
        });
    }

    /// Replaces the sidecar at a locator as an external edit, journaling a
    /// metadata change.
    pub fn touch_metadata(&self, locator: &str, bytes: Vec<u8>) {
        let mut state = self.lock();
        if !state.items.contains_key(locator) {
            return;
        }
        state.clock += 1;
        let mtime = state.clock;
        state.sidecars.insert(locator.to_owned(), bytes);
        state.ignored.remove(locator);
        state.journal.push(SourceChange::MetadataTouched {
            path: self.path(locator),
            mtime,
        });
    }

    fn rename_inner(&self, from: &str, to: String, format: Option<FormatTag>) {
        let mut state = self.lock();
        let Some(mut item) = state.items.remove(from) else {
            return;
        };
        if let Some(format) = format {
            item.format = format;
        }
        if let Some(sidecar) = state.sidecars.remove(from) {
            state.sidecars.insert(to.clone(), sidecar);
        }
        for locator in state.id_index.values_mut() {
            if locator == from {
                *locator = to.clone();
            }
        }
        state.ignored.remove(from);
        state.ignored.remove(&to);
        state.journal.push(SourceChange::Moved {
            from: self.path(from),
            to: self.path(&to),
            format: item.format.clone(),
            fingerprint: item.fingerprint,
            mtime: item.mtime,
        });
        state.items.insert(to, item);
    }

    fn path(&self, locator: &str) -> AssetPath {
        AssetPath::new(self.scheme.clone(), locator)
    }

    fn lock(&self) -> MutexGuard<'_, VolumeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_item(&self, locator: &str) -> Option<SourceBytes> {
        let state = self.lock();
        state.items.get(locator).map(|item| SourceBytes {
            format: item.format.clone(),
            bytes: item.bytes.clone(),
        })
    }

    fn read_sidecar(&self, locator: &str) -> Option<Vec<u8>> {
        self.lock().sidecars.get(locator).cloned()
    }

    /// Pipeline-side sidecar write: silent, and indexes the asset id for
    /// id-form reads.
    fn write_sidecar(&self, id: Option<AssetId>, locator: &str, bytes: Vec<u8>) {
        let mut state = self.lock();
        state.sidecars.insert(locator.to_owned(), bytes);
        if let Some(id) = id {
            state.id_index.insert(id, locator.to_owned());
        }
    }

    fn clear_sidecar(&self, locator: &str) {
        let mut state = self.lock();
        state.sidecars.remove(locator);
        state.id_index.retain(|_, indexed| indexed != locator);
    }

    fn locator_for(&self, id: &AssetId) -> Option<String> {
        self.lock().id_index.get(id).cloned()
    }

    fn drain_journal(&self) -> Vec<SourceChange> {
        let mut state = self.lock();
        let drained: Vec<SourceChange> = state.journal.drain(..).collect();
        drained
            .into_iter()
            .filter(|change| !state.ignored.contains(change.path().locator()))
            .collect()
    }

    fn ignore(&self, locator: &str) {
        self.lock().ignored.insert(locator.to_owned());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryLoader — pipeline-facing view of a MemoryStore
// ─────────────────────────────────────────────────────────────────────────────

/// Loader over a [`MemoryStore`].
///
/// Its static id derives from the store's scheme, so two sessions serving
/// the same scheme agree on the loader id.
#[derive(Debug, Clone)]
pub struct MemoryLoader {
    config: LoaderConfig,
    store: Arc<MemoryStore>,
}

impl MemoryLoader {
    /// Creates the writable loader for a store.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        let tag = format!("memory/{}", store.scheme());
        let config = LoaderConfig::static_tag(&tag, format!("memory loader ({})", store.scheme()))
            .with_scheme(store.scheme())
            .with_id_support()
            .with_writable();
        Self { config, store }
    }

    /// Creates a read-only loader for a store, under its own static id.
    pub fn read_only(store: Arc<MemoryStore>) -> Self {
        let tag = format!("memory-ro/{}", store.scheme());
        let config = LoaderConfig::static_tag(&tag, format!("memory loader ro ({})", store.scheme()))
            .with_scheme(store.scheme())
            .with_id_support();
        Self { config, store }
    }

    pub(crate) fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub(crate) fn check_path_supported(&self, _path: &AssetPath) -> bool {
        true
    }

    pub(crate) async fn read(&self, reference: &AssetReference) -> AssetResult<SourceBytes> {
        let locator = self.resolve_locator(reference)?;
        self.store
            .read_item(&locator)
            .ok_or_else(|| AssetError::NotFound {
                reference: reference.to_string(),
            })
    }

    pub(crate) async fn read_metadata(
        &self,
        reference: &AssetReference,
    ) -> AssetResult<Option<Vec<u8>>> {
        let locator = self.resolve_locator(reference)?;
        Ok(self.store.read_sidecar(&locator))
    }

    pub(crate) async fn write_metadata(
        &self,
        id: &AssetId,
        path: &AssetPath,
        bytes: Vec<u8>,
    ) -> AssetResult<()> {
        if path.scheme() != self.store.scheme() {
            return Err(AssetError::NotFound {
                reference: path.to_string(),
            });
        }
        self.store.write_sidecar(Some(*id), path.locator(), bytes);
        Ok(())
    }

    fn resolve_locator(&self, reference: &AssetReference) -> AssetResult<String> {
        match reference {
            AssetReference::Path(path) if path.scheme() == self.store.scheme() => {
                Ok(path.locator().to_owned())
            }
            AssetReference::Path(_) => Err(AssetError::NotFound {
                reference: reference.to_string(),
            }),
            AssetReference::Id(id) => {
                self.store
                    .locator_for(id)
                    .ok_or_else(|| AssetError::NotFound {
                        reference: reference.to_string(),
                    })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemorySource — change feed over the same MemoryStore
// ─────────────────────────────────────────────────────────────────────────────

/// Source over a [`MemoryStore`], serving the import loop.
#[derive(Debug, Clone)]
pub struct MemorySource {
    store: Arc<MemoryStore>,
}

impl MemorySource {
    /// Creates the source view of a store.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    fn own_locator<'a>(&self, path: &'a AssetPath) -> AssetResult<&'a str> {
        if path.scheme() == self.store.scheme() {
            Ok(path.locator())
        } else {
            Err(AssetError::NotFound {
                reference: path.to_string(),
            })
        }
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn scan(&self) -> AssetResult<Vec<SourceChange>> {
        Ok(self.store.drain_journal())
    }

    async fn read(&self, path: &AssetPath) -> AssetResult<SourceBytes> {
        let locator = self.own_locator(path)?;
        self.store
            .read_item(locator)
            .ok_or_else(|| AssetError::NotFound {
                reference: path.to_string(),
            })
    }

    async fn read_metadata(&self, path: &AssetPath) -> AssetResult<Option<Vec<u8>>> {
        let locator = self.own_locator(path)?;
        Ok(self.store.read_sidecar(locator))
    }

    async fn write_metadata(&self, path: &AssetPath, bytes: Vec<u8>) -> AssetResult<()> {
        let locator = self.own_locator(path)?;
        self.store.write_sidecar(None, locator, bytes);
        Ok(())
    }

    async fn clear_metadata(&self, path: &AssetPath) -> AssetResult<()> {
        let locator = self.own_locator(path)?;
        self.store.clear_sidecar(locator);
        Ok(())
    }

    async fn forget(&self, path: &AssetPath) -> AssetResult<()> {
        let locator = self.own_locator(path)?;
        self.store.ignore(locator);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryRecordStore — record store backed by process memory
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RecordState {
    by_path: HashMap<AssetPath, AssetRecord>,
    by_id: HashMap<AssetId, AssetPath>,
}

/// Record store backed by process memory, for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<RecordState>,
}

impl MemoryRecordStore {
    /// Creates an empty record store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, reference: &AssetReference) -> AssetResult<Option<AssetRecord>> {
        let state = self.lock();
        let record = match reference {
            AssetReference::Path(path) => state.by_path.get(path),
            AssetReference::Id(id) => state
                .by_id
                .get(id)
                .and_then(|path| state.by_path.get(path)),
        };
        Ok(record.cloned())
    }

    async fn save(&self, records: Vec<AssetRecord>) -> AssetResult<()> {
        let mut state = self.lock();
        for record in records {
            // A moved asset leaves no stale entry under its old path.
            if let Some(previous) = state.by_id.get(&record.asset).cloned() {
                if previous != record.path {
                    state.by_path.remove(&previous);
                }
            }
            state.by_id.insert(record.asset, record.path.clone());
            state.by_path.insert(record.path.clone(), record);
        }
        Ok(())
    }

    async fn clear(&self, reference: &AssetReference) -> AssetResult<()> {
        let mut state = self.lock();
        let path = match reference {
            AssetReference::Path(path) => Some(path.clone()),
            AssetReference::Id(id) => state.by_id.get(id).cloned(),
        };
        if let Some(path) = path {
            if let Some(record) = state.by_path.remove(&path) {
                state.by_id.remove(&record.asset);
            }
        }
        Ok(())
    }
}
