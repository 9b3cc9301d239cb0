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

//! Per-type asset storage.
//!
//! One [`AssetStorage`] instance serves one asset type and owns the
//! per-reference state machine:
//!
//! ```text
//! New -> Loading -> Importing -> Imported
//!                             \-> Error
//! Loading -> Error
//! ```
//!
//! [`AssetStorage::tick`] is the single mutation point. It dispatches reads
//! for `New` entries, hands completed reads to the resolved importer, and
//! promotes completed imports, draining completions that asynchronous
//! tasks deliver over internal channels. Nothing here blocks: spawned work
//! lands on later ticks, and callers poll [`AssetStorage::get`] until the
//! value is there. Dropping every handle abandons an entry; in-flight work
//! still runs to completion and its result is discarded when it arrives
//! for a slot the sweep has cleared or an attempt that was superseded.
//!
//! Ticking requires an ambient tokio runtime for the spawned read and
//! import tasks. Distinct storages share no state and may tick from
//! different threads freely.

use std::collections::HashMap;
use std::sync::Arc;

use hyle_core::descriptor::AssetTypeDescriptor;
use hyle_core::error::{AssetError, AssetResult};
use hyle_core::id::LoaderId;
use hyle_core::importer::{ImportedAsset, Importer};
use hyle_core::reference::AssetReference;
use hyle_core::registry::{ImporterRegistry, LoaderRegistry};
use hyle_core::source::SourceBytes;
use hyle_core::value::AssetValue;

use crate::handle::{AssetHandle, HandleCell, LoadState, SlotId};

/// Completed loader read, delivered over the storage's read channel.
struct ReadDone {
    slot: SlotId,
    attempt: u32,
    result: AssetResult<SourceBytes>,
}

/// Completed importer conversion, delivered over the import channel.
struct ImportDone {
    slot: SlotId,
    attempt: u32,
    result: AssetResult<Vec<ImportedAsset>>,
}

struct StoredEntry {
    cell: Arc<HandleCell>,
    state: LoadState,
    /// Bumped on every restart or supersession; completions carrying an
    /// older attempt are discarded.
    attempt: u32,
    /// The loader that served the dispatch, once resolved.
    loader: Option<LoaderId>,
    value: Option<AssetValue>,
    error: Option<AssetError>,
    /// Fresh bytes injected by the import loop, awaiting the next tick.
    supplied: Option<SourceBytes>,
}

struct Slot {
    generation: u32,
    entry: Option<StoredEntry>,
}

/// Notice that a swept reference is no longer tracked by this storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNotice {
    /// The reference whose entry was removed.
    pub reference: AssetReference,
    /// The loader that had served it, if dispatch had happened.
    pub loader: Option<LoaderId>,
}

/// Counters for status reporting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Entries awaiting dispatch.
    pub new: usize,
    /// Entries with a read in flight.
    pub loading: usize,
    /// Entries with an import in flight.
    pub importing: usize,
    /// Entries holding a value.
    pub imported: usize,
    /// Entries in the error state.
    pub errored: usize,
    /// Reads dispatched over the storage's lifetime.
    pub dispatched_reads: u64,
    /// Imports finished over the storage's lifetime.
    pub finished_imports: u64,
    /// Attempts that ended in the error state over the lifetime.
    pub failed_attempts: u64,
}

/// Deduplicating, polling storage for one asset type.
pub struct AssetStorage {
    descriptor: AssetTypeDescriptor,
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_reference: HashMap<AssetReference, SlotId>,
    reads_tx: flume::Sender<ReadDone>,
    reads_rx: flume::Receiver<ReadDone>,
    imports_tx: flume::Sender<ImportDone>,
    imports_rx: flume::Receiver<ImportDone>,
    released: Vec<ReleaseNotice>,
    dispatched_reads: u64,
    finished_imports: u64,
    failed_attempts: u64,
}

impl AssetStorage {
    /// Creates an empty storage for the given type.
    pub fn new(descriptor: AssetTypeDescriptor) -> Self {
        let (reads_tx, reads_rx) = flume::unbounded();
        let (imports_tx, imports_rx) = flume::unbounded();
        log::debug!("AssetStorage({}): Initialized.", descriptor.name);
        Self {
            descriptor,
            slots: Vec::new(),
            free: Vec::new(),
            by_reference: HashMap::new(),
            reads_tx,
            reads_rx,
            imports_tx,
            imports_rx,
            released: Vec::new(),
            dispatched_reads: 0,
            finished_imports: 0,
            failed_attempts: 0,
        }
    }

    /// The type this storage serves.
    pub fn descriptor(&self) -> &AssetTypeDescriptor {
        &self.descriptor
    }

    /// Returns a handle for a reference, creating a `New` entry on first
    /// sight and reusing the existing entry afterwards.
    ///
    /// While any handle is alive, at most one entry exists per reference
    /// and the load dispatches exactly once. Obtaining a reference whose
    /// entry sits in `Error` restarts the entry at `New`; nothing retries
    /// silently.
    pub fn obtain(&mut self, reference: &AssetReference) -> AssetHandle {
        if let Some(slot_id) = self.by_reference.get(reference).copied() {
            let mut existing = None;
            if let Some(entry) = self.entry_mut(slot_id) {
                let restarted = if entry.state == LoadState::Error {
                    entry.state = LoadState::New;
                    entry.attempt += 1;
                    entry.loader = None;
                    entry.value = None;
                    entry.error = None;
                    entry.supplied = None;
                    true
                } else {
                    false
                };
                existing = Some((AssetHandle::new(entry.cell.clone()), restarted));
            }
            if let Some((handle, restarted)) = existing {
                if restarted {
                    log::debug!(
                        "AssetStorage({}): Restarting '{reference}' after error.",
                        self.descriptor.name
                    );
                }
                return handle;
            }
        }

        let slot_id = self.allocate();
        let cell = Arc::new(HandleCell {
            slot: slot_id,
            reference: reference.clone(),
        });
        self.slots[slot_id.index as usize].entry = Some(StoredEntry {
            cell: cell.clone(),
            state: LoadState::New,
            attempt: 0,
            loader: None,
            value: None,
            error: None,
            supplied: None,
        });
        self.by_reference.insert(reference.clone(), slot_id);
        log::trace!(
            "AssetStorage({}): Tracking '{reference}'.",
            self.descriptor.name
        );
        AssetHandle::new(cell)
    }

    /// Runs one scheduling pass: dispatches `New` entries, starts imports
    /// for supplied and completed reads, and promotes completed imports.
    ///
    /// Must not run concurrently with itself for one instance, which the
    /// `&mut` receiver enforces. Never blocks.
    pub fn tick(&mut self, loaders: &LoaderRegistry, importers: &ImporterRegistry) {
        self.dispatch_new(loaders);
        self.start_supplied_imports(importers);
        self.drain_reads(importers);
        self.drain_imports();
    }

    /// Injects freshly imported source bytes for a reference.
    ///
    /// Only entries currently in `Loading` or `Importing` take the bytes;
    /// the next tick hands them straight to the import stage, superseding
    /// whatever was in flight. Other states ignore the supply.
    pub fn supply(&mut self, reference: &AssetReference, bytes: SourceBytes) {
        let Some(slot_id) = self.by_reference.get(reference).copied() else {
            return;
        };
        let Some(entry) = self.entry_mut(slot_id) else {
            return;
        };
        if matches!(entry.state, LoadState::Loading | LoadState::Importing) {
            entry.supplied = Some(bytes);
        }
    }

    /// The imported value, once the entry reached `Imported`. Callers
    /// poll; every earlier state reads as absence.
    pub fn get(&self, handle: &AssetHandle) -> Option<&AssetValue> {
        let entry = self.entry(handle.slot())?;
        if entry.state == LoadState::Imported {
            entry.value.as_ref()
        } else {
            None
        }
    }

    /// The entry's current state, if the handle still points at one.
    pub fn state(&self, handle: &AssetHandle) -> Option<LoadState> {
        self.entry(handle.slot()).map(|entry| entry.state)
    }

    /// The terminal error, once the entry reached `Error`.
    pub fn error(&self, handle: &AssetHandle) -> Option<&AssetError> {
        let entry = self.entry(handle.slot())?;
        if entry.state == LoadState::Error {
            entry.error.as_ref()
        } else {
            None
        }
    }

    /// Removes every entry with no external holder and records one release
    /// notice per removed entry. Returns how many were removed.
    ///
    /// Run after a tick. Work still in flight for a removed entry finishes
    /// on its own and is discarded when its completion finds the slot
    /// cleared.
    pub fn sweep(&mut self) -> usize {
        let mut removed = 0;
        for index in 0..self.slots.len() {
            let unused = match self.slots[index].entry.as_ref() {
                Some(entry) => Arc::strong_count(&entry.cell) == 1,
                None => false,
            };
            if !unused {
                continue;
            }
            let Some(entry) = self.slots[index].entry.take() else {
                continue;
            };
            self.free.push(index as u32);
            self.by_reference.remove(&entry.cell.reference);
            log::trace!(
                "AssetStorage({}): Swept '{}'.",
                self.descriptor.name,
                entry.cell.reference
            );
            self.released.push(ReleaseNotice {
                reference: entry.cell.reference.clone(),
                loader: entry.loader,
            });
            removed += 1;
        }
        removed
    }

    /// Drains the release notices accumulated by sweeps.
    pub fn take_released(&mut self) -> Vec<ReleaseNotice> {
        std::mem::take(&mut self.released)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.by_reference.len()
    }

    /// Whether no entry is live.
    pub fn is_empty(&self) -> bool {
        self.by_reference.is_empty()
    }

    /// Current per-state counts plus lifetime counters.
    pub fn stats(&self) -> StorageStats {
        let mut stats = StorageStats {
            dispatched_reads: self.dispatched_reads,
            finished_imports: self.finished_imports,
            failed_attempts: self.failed_attempts,
            ..StorageStats::default()
        };
        for slot in &self.slots {
            let Some(entry) = slot.entry.as_ref() else {
                continue;
            };
            match entry.state {
                LoadState::New => stats.new += 1,
                LoadState::Loading => stats.loading += 1,
                LoadState::Importing => stats.importing += 1,
                LoadState::Imported => stats.imported += 1,
                LoadState::Error => stats.errored += 1,
            }
        }
        stats
    }

    // ─── tick phases ────────────────────────────────────────────────────────

    fn dispatch_new(&mut self, loaders: &LoaderRegistry) {
        for index in 0..self.slots.len() {
            let generation = self.slots[index].generation;
            let Some(entry) = self.slots[index].entry.as_mut() else {
                continue;
            };
            if entry.state != LoadState::New {
                continue;
            }
            let reference = entry.cell.reference.clone();
            match loaders.resolve(&reference).cloned() {
                Some(loader) => {
                    let loader_id = loader.id();
                    entry.state = LoadState::Loading;
                    entry.loader = Some(loader_id);
                    let attempt = entry.attempt;
                    let slot = SlotId {
                        index: index as u32,
                        generation,
                    };
                    self.dispatched_reads += 1;
                    log::trace!(
                        "AssetStorage({}): Read dispatched for '{reference}'.",
                        self.descriptor.name
                    );
                    let tx = self.reads_tx.clone();
                    tokio::spawn(async move {
                        let result = loader.read(&reference).await;
                        let _ = tx.send(ReadDone {
                            slot,
                            attempt,
                            result,
                        });
                    });
                }
                None => {
                    entry.state = LoadState::Error;
                    entry.error = Some(AssetError::NotFound {
                        reference: reference.to_string(),
                    });
                    self.failed_attempts += 1;
                    log::warn!(
                        "AssetStorage({}): No loader serves '{reference}'.",
                        self.descriptor.name
                    );
                }
            }
        }
    }

    fn start_supplied_imports(&mut self, importers: &ImporterRegistry) {
        for index in 0..self.slots.len() {
            let generation = self.slots[index].generation;
            let Some(entry) = self.slots[index].entry.as_mut() else {
                continue;
            };
            if !matches!(entry.state, LoadState::Loading | LoadState::Importing) {
                continue;
            }
            let Some(bytes) = entry.supplied.take() else {
                continue;
            };
            // Supplied bytes supersede whatever is in flight for the entry.
            entry.attempt += 1;
            let attempt = entry.attempt;
            let slot = SlotId {
                index: index as u32,
                generation,
            };
            match importers.resolve(&self.descriptor, &bytes.format).cloned() {
                Some(importer) => {
                    entry.state = LoadState::Importing;
                    self.spawn_import(slot, attempt, importer, bytes);
                }
                None => {
                    let reference = entry.cell.reference.clone();
                    entry.state = LoadState::Error;
                    entry.error = Some(AssetError::UnsupportedFormat {
                        format: bytes.format.clone(),
                    });
                    self.failed_attempts += 1;
                    log::warn!(
                        "AssetStorage({}): No importer for '{reference}' from {:?}.",
                        self.descriptor.name,
                        bytes.format
                    );
                }
            }
        }
    }

    fn drain_reads(&mut self, importers: &ImporterRegistry) {
        let completed: Vec<ReadDone> = self.reads_rx.try_iter().collect();
        for done in completed {
            self.finish_read(done, importers);
        }
    }

    fn finish_read(&mut self, done: ReadDone, importers: &ImporterRegistry) {
        let index = done.slot.index as usize;
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        if slot.generation != done.slot.generation {
            return;
        }
        let Some(entry) = slot.entry.as_mut() else {
            return;
        };
        if entry.attempt != done.attempt || entry.state != LoadState::Loading {
            log::trace!(
                "AssetStorage({}): Discarded a stale read completion.",
                self.descriptor.name
            );
            return;
        }
        match done.result {
            Ok(bytes) => match importers.resolve(&self.descriptor, &bytes.format).cloned() {
                Some(importer) => {
                    entry.state = LoadState::Importing;
                    self.spawn_import(done.slot, done.attempt, importer, bytes);
                }
                None => {
                    let reference = entry.cell.reference.clone();
                    entry.state = LoadState::Error;
                    entry.error = Some(AssetError::UnsupportedFormat {
                        format: bytes.format.clone(),
                    });
                    self.failed_attempts += 1;
                    log::warn!(
                        "AssetStorage({}): No importer for '{reference}' from {:?}.",
                        self.descriptor.name,
                        bytes.format
                    );
                }
            },
            Err(e) => {
                let reference = entry.cell.reference.clone();
                entry.state = LoadState::Error;
                entry.error = Some(e.clone());
                self.failed_attempts += 1;
                log::warn!(
                    "AssetStorage({}): Read failed for '{reference}': {e}",
                    self.descriptor.name
                );
            }
        }
    }

    fn drain_imports(&mut self) {
        let completed: Vec<ImportDone> = self.imports_rx.try_iter().collect();
        for done in completed {
            let index = done.slot.index as usize;
            let Some(slot) = self.slots.get_mut(index) else {
                continue;
            };
            if slot.generation != done.slot.generation {
                continue;
            }
            let Some(entry) = slot.entry.as_mut() else {
                continue;
            };
            if entry.attempt != done.attempt || entry.state != LoadState::Importing {
                log::trace!(
                    "AssetStorage({}): Discarded a stale import completion.",
                    self.descriptor.name
                );
                continue;
            }
            match done.result {
                Ok(mut assets) if !assets.is_empty() => {
                    // The entry keeps the payload's first asset; secondary
                    // assets are the import loop's concern.
                    let first = assets.swap_remove(0);
                    entry.value = Some(first.value);
                    entry.error = None;
                    entry.state = LoadState::Imported;
                    self.finished_imports += 1;
                    log::trace!(
                        "AssetStorage({}): '{}' imported.",
                        self.descriptor.name,
                        entry.cell.reference
                    );
                }
                Ok(_) => {
                    entry.state = LoadState::Error;
                    entry.error = Some(AssetError::DecodeError {
                        reason: "importer produced no assets".into(),
                    });
                    self.failed_attempts += 1;
                }
                Err(e) => {
                    let reference = entry.cell.reference.clone();
                    entry.state = LoadState::Error;
                    entry.error = Some(e.clone());
                    self.failed_attempts += 1;
                    log::warn!(
                        "AssetStorage({}): Import failed for '{reference}': {e}",
                        self.descriptor.name
                    );
                }
            }
        }
    }

    fn spawn_import(&self, slot: SlotId, attempt: u32, importer: Importer, bytes: SourceBytes) {
        log::trace!(
            "AssetStorage({}): Import dispatched via '{}'.",
            self.descriptor.name,
            importer.config().name
        );
        let descriptor = self.descriptor.clone();
        let tx = self.imports_tx.clone();
        tokio::spawn(async move {
            let result = importer.import(&descriptor, &bytes.format, &bytes.bytes).await;
            let _ = tx.send(ImportDone {
                slot,
                attempt,
                result,
            });
        });
    }

    // ─── slot plumbing ──────────────────────────────────────────────────────

    fn allocate(&mut self) -> SlotId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            SlotId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: None,
            });
            SlotId {
                index,
                generation: 0,
            }
        }
    }

    fn entry(&self, slot_id: SlotId) -> Option<&StoredEntry> {
        let slot = self.slots.get(slot_id.index as usize)?;
        if slot.generation != slot_id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, slot_id: SlotId) -> Option<&mut StoredEntry> {
        let slot = self.slots.get_mut(slot_id.index as usize)?;
        if slot.generation != slot_id.generation {
            return None;
        }
        slot.entry.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyle_core::descriptor::Origin;
    use hyle_core::format::format_set;
    use hyle_core::id::AssetTypeId;

    fn level_descriptor() -> AssetTypeDescriptor {
        let id = AssetTypeId::from_tag("LevelData");
        AssetTypeDescriptor {
            id,
            name: "LevelData".into(),
            formats: format_set(["json"]),
            origin: Origin::Static,
            decode_hint: Some(id),
        }
    }

    fn reference(text: &str) -> AssetReference {
        text.parse().expect("valid reference")
    }

    #[test]
    fn test_obtain_deduplicates_per_reference() {
        let mut storage = AssetStorage::new(level_descriptor());
        let r = reference("memory://levels/forest.json");
        let first = storage.obtain(&r);
        let second = storage.obtain(&r);
        assert_eq!(first, second);
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.state(&first), Some(LoadState::New));
    }

    #[test]
    fn test_unresolvable_reference_errors_without_dispatch() {
        let mut storage = AssetStorage::new(level_descriptor());
        let loaders = LoaderRegistry::new();
        let importers = ImporterRegistry::new();
        let handle = storage.obtain(&reference("memory://missing.json"));

        storage.tick(&loaders, &importers);
        assert_eq!(storage.state(&handle), Some(LoadState::Error));
        assert!(matches!(
            storage.error(&handle),
            Some(AssetError::NotFound { .. })
        ));
        assert!(storage.get(&handle).is_none());
        let stats = storage.stats();
        assert_eq!(stats.dispatched_reads, 0);
        assert_eq!(stats.failed_attempts, 1);
    }

    #[test]
    fn test_obtain_restarts_an_errored_entry() {
        let mut storage = AssetStorage::new(level_descriptor());
        let loaders = LoaderRegistry::new();
        let importers = ImporterRegistry::new();
        let r = reference("memory://missing.json");
        let handle = storage.obtain(&r);
        storage.tick(&loaders, &importers);
        assert_eq!(storage.state(&handle), Some(LoadState::Error));

        let again = storage.obtain(&r);
        assert_eq!(handle, again);
        assert_eq!(storage.state(&handle), Some(LoadState::New));
        assert!(storage.error(&handle).is_none());

        // Ticking without a loader fails the fresh attempt too.
        storage.tick(&loaders, &importers);
        assert_eq!(storage.stats().failed_attempts, 2);
    }

    #[test]
    fn test_sweep_removes_unheld_entries_and_notifies_once() {
        let mut storage = AssetStorage::new(level_descriptor());
        let r = reference("memory://levels/forest.json");
        let handle = storage.obtain(&r);

        // Held entries survive the sweep.
        assert_eq!(storage.sweep(), 0);
        assert_eq!(storage.len(), 1);

        drop(handle);
        assert_eq!(storage.sweep(), 1);
        assert_eq!(storage.len(), 0);
        let notices = storage.take_released();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].reference, r);
        assert_eq!(notices[0].loader, None);

        // The notice was drained; nothing is reported twice.
        assert_eq!(storage.sweep(), 0);
        assert!(storage.take_released().is_empty());
    }

    #[test]
    fn test_slots_are_reused_after_sweep() {
        let mut storage = AssetStorage::new(level_descriptor());
        let first = storage.obtain(&reference("memory://a.json"));
        drop(first);
        storage.sweep();

        let second = storage.obtain(&reference("memory://b.json"));
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.state(&second), Some(LoadState::New));
        assert_eq!(storage.stats().new, 1);
    }

    #[test]
    fn test_supply_is_ignored_outside_inflight_states() {
        let mut storage = AssetStorage::new(level_descriptor());
        let r = reference("memory://levels/forest.json");
        let handle = storage.obtain(&r);
        storage.supply(
            &r,
            SourceBytes {
                format: "json".into(),
                bytes: b"{}".to_vec(),
            },
        );
        // Still New: nothing was in flight to supersede.
        assert_eq!(storage.state(&handle), Some(LoadState::New));
    }
}
