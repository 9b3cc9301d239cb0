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

//! The import orchestration loop.
//!
//! [`ImportManager::process`] runs one reconciliation pass: scan every
//! tracked source, classify each raw change against the record store, and
//! apply the per-class policy. A failure while handling one item never
//! halts the pass; the item is queued again for the next one. Successfully
//! (re)imported bytes are handed to the matching per-type storage, and
//! storage release notices are relayed back to the owning source so its
//! change feed stops following unreferenced items.

use std::sync::Arc;

use hyle_core::descriptor::AssetTypeDescriptor;
use hyle_core::error::{AssetError, AssetResult};
use hyle_core::id::{AssetId, AssetTypeId, ImporterId, LoaderId};
use hyle_core::importer::ImportedAsset;
use hyle_core::record::{AssetRecord, Fingerprint, RecordStore};
use hyle_core::reference::{AssetPath, AssetReference};
use hyle_core::registry::{ImporterRegistry, LoaderRegistry, TypeRegistry};
use hyle_core::source::{Source, SourceBytes, SourceChange};
use hyle_store::StorageHub;

use crate::classify::{classify, ChangeClass};
use crate::sidecar::Sidecar;

/// Tunables for the orchestration loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportConfig {
    /// Upper bound on events handled per pass; 0 means unbounded. Events
    /// over the budget carry into the next pass.
    pub max_events_per_scan: usize,
}

/// What one [`ImportManager::process`] pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReport {
    /// Raw events the scans produced this pass.
    pub scanned: usize,
    /// Classified events handled to completion.
    pub handled: usize,
    /// Events whose handling failed; they run again next pass.
    pub failed: usize,
    /// Events pushed over the budget into the next pass.
    pub deferred: usize,
    /// Storage entries given fresh bytes.
    pub supplied: usize,
    /// Release notices relayed to their sources.
    pub forgotten: usize,
}

struct TrackedSource {
    loader: LoaderId,
    source: Arc<dyn Source>,
}

/// Bytes to hand to the per-type storage once the pass has persisted them.
type Supply = (AssetTypeId, AssetReference, SourceBytes);

/// Reconciles tracked sources against the persistent record store.
pub struct ImportManager {
    sources: Vec<TrackedSource>,
    records: Arc<dyn RecordStore>,
    config: ImportConfig,
    /// Failed and over-budget events waiting for the next pass.
    pending: Vec<(usize, SourceChange)>,
}

impl ImportManager {
    /// Creates a manager over a record store with default tunables.
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self::with_config(records, ImportConfig::default())
    }

    /// Creates a manager with explicit tunables.
    pub fn with_config(records: Arc<dyn RecordStore>, config: ImportConfig) -> Self {
        Self {
            sources: Vec::new(),
            records,
            config,
            pending: Vec::new(),
        }
    }

    /// Tracks a source, naming the registered loader that fronts it. The
    /// loader is where sidecar writes and release relays go.
    pub fn track(&mut self, loader: LoaderId, source: Arc<dyn Source>) {
        log::info!("ImportManager: Tracking a source behind loader {loader}.");
        self.sources.push(TrackedSource { loader, source });
    }

    /// Number of tracked sources.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Runs one reconciliation pass.
    ///
    /// Scans every tracked source, handles the classified events within the
    /// configured budget, feeds freshly imported bytes to the matching
    /// storages in `hub`, and relays the hub's release notices back to the
    /// owning sources. Per-item failures are captured in the report and
    /// queued for the next pass; only the pass bookkeeping itself can fail.
    pub async fn process(
        &mut self,
        types: &TypeRegistry,
        loaders: &LoaderRegistry,
        importers: &ImporterRegistry,
        hub: &mut StorageHub,
    ) -> AssetResult<ProcessReport> {
        let mut report = ProcessReport::default();
        let mut queue = std::mem::take(&mut self.pending);

        for (index, tracked) in self.sources.iter().enumerate() {
            match tracked.source.scan().await {
                Ok(changes) => {
                    report.scanned += changes.len();
                    queue.extend(changes.into_iter().map(|change| (index, change)));
                }
                Err(e) => {
                    log::warn!("ImportManager: Scan of source {index} failed: {e}");
                }
            }
        }

        let budget = self.config.max_events_per_scan;
        if budget > 0 && queue.len() > budget {
            self.pending = queue.split_off(budget);
            report.deferred = self.pending.len();
        }

        let mut supplies: Vec<Supply> = Vec::new();
        for (index, change) in queue {
            let tracked = &self.sources[index];

            // For a move, the record store knows the item under its old
            // path; everything else keys by the event's own path.
            let key = match &change {
                SourceChange::Moved { from, .. } => from.clone(),
                other => other.path().clone(),
            };
            let prior = match self.records.get(&AssetReference::Path(key)).await {
                Ok(prior) => prior,
                Err(e) => {
                    log::warn!("ImportManager: Record lookup failed for '{}': {e}", change.path());
                    report.failed += 1;
                    self.pending.push((index, change));
                    continue;
                }
            };
            let Some(class) = classify(&change, prior.as_ref()) else {
                log::trace!("ImportManager: Nothing to do for '{}'.", change.path());
                continue;
            };

            match apply(class, tracked, self.records.as_ref(), types, loaders, importers).await {
                Ok(supply) => {
                    report.handled += 1;
                    supplies.extend(supply);
                }
                Err(e) => {
                    log::warn!("ImportManager: Handling '{}' failed: {e}", change.path());
                    report.failed += 1;
                    self.pending.push((index, change));
                }
            }
        }

        for (type_id, reference, bytes) in supplies {
            if let Some(storage) = hub.get_mut(&type_id) {
                storage.supply(&reference, bytes);
                report.supplied += 1;
            }
        }

        for notice in hub.take_released() {
            let Some(path) = notice.reference.path() else {
                continue;
            };
            let Some(tracked) = notice
                .loader
                .and_then(|loader| self.sources.iter().find(|tracked| tracked.loader == loader))
            else {
                continue;
            };
            match tracked.source.forget(path).await {
                Ok(()) => report.forgotten += 1,
                Err(e) => log::warn!("ImportManager: Forgetting '{path}' failed: {e}"),
            }
        }

        log::debug!(
            "ImportManager: Pass done: {} scanned, {} handled, {} failed, {} deferred.",
            report.scanned,
            report.handled,
            report.failed,
            report.deferred
        );
        Ok(report)
    }
}

/// Applies the policy for one classified change. Returns the bytes to hand
/// to storage when the change produced a (re)import.
async fn apply(
    class: ChangeClass,
    tracked: &TrackedSource,
    records: &dyn RecordStore,
    types: &TypeRegistry,
    loaders: &LoaderRegistry,
    importers: &ImporterRegistry,
) -> AssetResult<Option<Supply>> {
    match class {
        ChangeClass::Added {
            path,
            format,
            fingerprint,
            mtime,
        } => {
            let descriptor = types
                .first_for_format(&format)
                .ok_or_else(|| AssetError::UnsupportedFormat {
                    format: format.clone(),
                })?
                .clone();
            let importer =
                importers
                    .resolve(&descriptor, &format)
                    .ok_or_else(|| AssetError::UnsupportedFormat {
                        format: format.clone(),
                    })?;
            let bytes = tracked.source.read(&path).await?;
            // A pre-existing sidecar means another session already minted
            // an id for this item; keep it.
            let sidecar = tracked
                .source
                .read_metadata(&path)
                .await?
                .and_then(|bytes| Sidecar::from_bytes(&bytes).ok());
            let principal =
                principal(importer.import(&descriptor, &bytes.format, &bytes.bytes).await?)?;
            let asset_id = sidecar
                .map(|sidecar| sidecar.asset_id)
                .or(principal.id)
                .unwrap_or_else(AssetId::fresh);

            records
                .save(vec![AssetRecord {
                    asset: asset_id,
                    path: path.clone(),
                    type_id: descriptor.id,
                    importer: importer.id(),
                    format: bytes.format.clone(),
                    fingerprint,
                    mtime,
                    dependencies: principal.dependencies,
                }])
                .await?;
            persist_sidecar(tracked, loaders, asset_id, &path, importer.id()).await;
            log::info!(
                "ImportManager: Imported new '{path}' as '{}' ({asset_id}).",
                descriptor.name
            );
            Ok(Some((descriptor.id, AssetReference::Path(path), bytes)))
        }

        ChangeClass::Modified {
            record,
            fingerprint,
            mtime,
            ..
        } => {
            let descriptor = lookup_type(types, &record)?;
            let (bytes, metadata) = tokio::join!(
                tracked.source.read(&record.path),
                tracked.source.read_metadata(&record.path)
            );
            let bytes = bytes?;
            let sidecar = metadata?.and_then(|bytes| Sidecar::from_bytes(&bytes).ok());
            if let Some(sidecar) = sidecar {
                if sidecar.asset_id != record.asset {
                    log::warn!(
                        "ImportManager: Sidecar id for '{}' disagrees with its record.",
                        record.path
                    );
                }
            }
            // Same format: keep the importer that produced the prior
            // import. A format change re-resolves.
            let importer = if bytes.format == record.format {
                importers
                    .get(&record.importer)
                    .or_else(|| importers.resolve(&descriptor, &bytes.format))
            } else {
                importers.resolve(&descriptor, &bytes.format)
            }
            .ok_or_else(|| AssetError::UnsupportedFormat {
                format: bytes.format.clone(),
            })?;
            let principal =
                principal(importer.import(&descriptor, &bytes.format, &bytes.bytes).await?)?;

            // Assets only: path, type and id stay as they were.
            records
                .save(vec![AssetRecord {
                    asset: record.asset,
                    path: record.path.clone(),
                    type_id: record.type_id,
                    importer: importer.id(),
                    format: bytes.format.clone(),
                    fingerprint,
                    mtime,
                    dependencies: principal.dependencies,
                }])
                .await?;
            log::debug!("ImportManager: Re-imported modified '{}'.", record.path);
            Ok(Some((
                record.type_id,
                AssetReference::Path(record.path),
                bytes,
            )))
        }

        ChangeClass::RenamedPathOnly { record, to, mtime } => {
            let mut updated = record;
            log::debug!("ImportManager: Moved '{}' to '{to}'.", updated.path);
            updated.path = to;
            updated.mtime = mtime;
            records.save(vec![updated]).await?;
            Ok(None)
        }

        ChangeClass::RenamedFormatChanged {
            record,
            to,
            format,
            fingerprint,
            mtime,
        } => {
            let descriptor = lookup_type(types, &record)?;
            let importer =
                importers
                    .resolve(&descriptor, &format)
                    .ok_or_else(|| AssetError::UnsupportedFormat {
                        format: format.clone(),
                    })?;
            if importer.id() == record.importer {
                // The new format lands on the same importer: plain
                // modified handling, at the new path.
                let mut moved = record;
                moved.path = to;
                return Box::pin(apply(
                    ChangeClass::Modified {
                        record: moved,
                        format,
                        fingerprint,
                        mtime,
                    },
                    tracked,
                    records,
                    types,
                    loaders,
                    importers,
                ))
                .await;
            }

            let bytes = tracked.source.read(&to).await?;
            let principal =
                principal(importer.import(&descriptor, &bytes.format, &bytes.bytes).await?)?;
            records
                .save(vec![AssetRecord {
                    asset: record.asset,
                    path: to.clone(),
                    type_id: record.type_id,
                    importer: importer.id(),
                    format: bytes.format.clone(),
                    fingerprint,
                    mtime,
                    dependencies: principal.dependencies,
                }])
                .await?;
            persist_sidecar(tracked, loaders, record.asset, &to, importer.id()).await;
            log::debug!(
                "ImportManager: Re-imported '{to}' after a format-changing move."
            );
            Ok(Some((record.type_id, AssetReference::Path(to), bytes)))
        }

        ChangeClass::Removed { record } => {
            records
                .clear(&AssetReference::Path(record.path.clone()))
                .await?;
            tracked.source.clear_metadata(&record.path).await?;
            log::info!("ImportManager: Purged removed '{}'.", record.path);
            Ok(None)
        }

        ChangeClass::MetadataChanged { record, mtime } => {
            let descriptor = lookup_type(types, &record)?;
            let (bytes, metadata) = tokio::join!(
                tracked.source.read(&record.path),
                tracked.source.read_metadata(&record.path)
            );
            let bytes = bytes?;
            let sidecar = metadata?.and_then(|bytes| Sidecar::from_bytes(&bytes).ok());
            // An edited sidecar may reassign the importer; honor it when it
            // is bound and still fits the content.
            let importer = sidecar
                .and_then(|sidecar| importers.get(&sidecar.importer_id))
                .filter(|importer| importer.supported_formats().contains(&bytes.format))
                .or_else(|| importers.resolve(&descriptor, &bytes.format))
                .ok_or_else(|| AssetError::UnsupportedFormat {
                    format: bytes.format.clone(),
                })?;
            let principal =
                principal(importer.import(&descriptor, &bytes.format, &bytes.bytes).await?)?;
            let asset_id = sidecar
                .map(|sidecar| sidecar.asset_id)
                .unwrap_or(record.asset);

            records
                .save(vec![AssetRecord {
                    asset: asset_id,
                    path: record.path.clone(),
                    type_id: record.type_id,
                    importer: importer.id(),
                    format: bytes.format.clone(),
                    fingerprint: Fingerprint::of(&bytes.bytes),
                    mtime,
                    dependencies: principal.dependencies,
                }])
                .await?;
            persist_sidecar(tracked, loaders, asset_id, &record.path, importer.id()).await;
            log::debug!(
                "ImportManager: Re-imported '{}' after a sidecar edit.",
                record.path
            );
            Ok(Some((
                record.type_id,
                AssetReference::Path(record.path),
                bytes,
            )))
        }
    }
}

fn lookup_type(
    types: &TypeRegistry,
    record: &AssetRecord,
) -> AssetResult<AssetTypeDescriptor> {
    types
        .lookup(&record.type_id)
        .cloned()
        .ok_or_else(|| AssetError::Conflict {
            detail: format!(
                "type {} of '{}' is not registered in this session",
                record.type_id, record.path
            ),
        })
}

/// The asset the record tracks: the first one the importer produced.
fn principal(mut assets: Vec<ImportedAsset>) -> AssetResult<ImportedAsset> {
    if assets.is_empty() {
        return Err(AssetError::DecodeError {
            reason: "importer produced no assets".into(),
        });
    }
    if assets.len() > 1 {
        log::debug!(
            "ImportManager: Keeping the first of {} imported assets.",
            assets.len()
        );
    }
    Ok(assets.swap_remove(0))
}

/// Writes the canonical sidecar through the source's loader. Refusals are
/// logged, not fatal: the record store already holds the import, and a
/// read-only source simply cannot keep ids across sessions.
async fn persist_sidecar(
    tracked: &TrackedSource,
    loaders: &LoaderRegistry,
    asset_id: AssetId,
    path: &AssetPath,
    importer_id: ImporterId,
) {
    let sidecar = Sidecar {
        asset_id,
        importer_id,
    };
    let bytes = match sidecar.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("ImportManager: Sidecar encode failed for '{path}': {e}");
            return;
        }
    };
    match loaders.get(&tracked.loader) {
        Some(loader) => {
            if let Err(e) = loader.write_metadata(&asset_id, path, bytes).await {
                log::debug!("ImportManager: Sidecar write skipped for '{path}': {e}");
            }
        }
        None => {
            log::debug!("ImportManager: No loader bound for '{path}'; sidecar not persisted.");
        }
    }
}
