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

// Asset pipeline sandbox
// Wires registries, an in-memory source, the import loop and per-type
// storage together and walks one asset through its whole life.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hyle_core::format::format_set;
use hyle_core::importer::{Importer, JsonImporter, RonImporter};
use hyle_core::loader::Loader;
use hyle_core::memory::{MemoryLoader, MemoryRecordStore, MemorySource, MemoryStore};
use hyle_core::reference::AssetReference;
use hyle_core::registry::{ImporterRegistry, LoaderRegistry, TypeRegistry};
use hyle_core::value::DynValue;
use hyle_import::ImportManager;
use hyle_store::{LoadState, StorageHub};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // One in-memory volume plays the part of a production source.
    let store = MemoryStore::new("memory");
    store.insert(
        "levels/forest.json",
        "json",
        br#"{"name": "forest", "spawn_points": 3, "dependencies": ["memory://levels/meadow.json"]}"#
            .to_vec(),
    );
    store.insert(
        "levels/meadow.json",
        "json",
        br#"{"name": "meadow", "spawn_points": 1}"#.to_vec(),
    );

    // Session registries: one static type, one derived dynamic type, the
    // memory loader, and the built-in importers.
    let mut types = TypeRegistry::new();
    let level = types
        .register_static("LevelData", "LevelData", format_set(["json", "ron"]))
        .context("registering LevelData")?;
    let generated = types.register_dynamic_from_static(
        "LevelData",
        "GeneratedLevel",
        format_set(["json"]),
    );
    log::info!("Types: static {level}, dynamic-from-static {generated}");

    let mut loaders = LoaderRegistry::new();
    let loader = loaders
        .register_static(Loader::Memory(MemoryLoader::new(store.clone())))
        .context("registering the memory loader")?;

    let mut importers = ImporterRegistry::new();
    importers
        .register_static(Importer::Json(JsonImporter::new()), &[(level, "json".into())])
        .context("registering the JSON importer")?;
    importers
        .register_static(Importer::Ron(RonImporter::new()), &[(level, "ron".into())])
        .context("registering the RON importer")?;

    let records = Arc::new(MemoryRecordStore::new());
    let mut manager = ImportManager::new(records);
    manager.track(loader, Arc::new(MemorySource::new(store.clone())));
    let mut hub = StorageHub::new();

    // First reconciliation pass: both files are discovered, imported and
    // recorded, and each gets a sidecar with its minted id.
    let report = manager
        .process(&types, &loaders, &importers, &mut hub)
        .await
        .context("initial reconciliation pass")?;
    log::info!(
        "Initial pass: {} scanned, {} handled.",
        report.scanned,
        report.handled
    );

    // A consumer asks for the forest level and polls until it lands.
    let descriptor = types.lookup(&level).context("LevelData descriptor")?.clone();
    let reference: AssetReference = "memory://levels/forest.json".parse()?;
    let handle = hub.storage_mut(&descriptor).obtain(&reference);

    let mut ticks = 0;
    loop {
        hub.tick_all(&loaders, &importers);
        manager
            .process(&types, &loaders, &importers, &mut hub)
            .await
            .context("reconciliation pass")?;
        ticks += 1;

        let storage = hub.get(&level).context("LevelData storage")?;
        match storage.state(&handle) {
            Some(LoadState::Imported) => break,
            Some(LoadState::Error) => {
                anyhow::bail!("load failed: {:?}", storage.error(&handle));
            }
            _ => tokio::time::sleep(Duration::from_millis(5)).await,
        }
        anyhow::ensure!(ticks < 100, "asset never arrived");
    }

    let storage = hub.get(&level).context("LevelData storage")?;
    let value = storage.get(&handle).context("imported value")?;
    let mapping = value.as_dynamic().context("dynamic value")?;
    log::info!(
        "Loaded '{}' after {ticks} tick(s): spawn_points = {:?}",
        mapping.get("name").and_then(DynValue::as_str).unwrap_or("?"),
        mapping.get("spawn_points").and_then(DynValue::as_i64)
    );
    let stats = storage.stats();
    log::info!(
        "Storage: {} imported, {} read(s) dispatched.",
        stats.imported,
        stats.dispatched_reads
    );

    // Edit the file: the next passes pick the change up and the storage
    // serves the new payload after an explicit re-obtain.
    store.insert(
        "levels/forest.json",
        "json",
        br#"{"name": "forest", "spawn_points": 5}"#.to_vec(),
    );
    manager
        .process(&types, &loaders, &importers, &mut hub)
        .await
        .context("pass after edit")?;
    log::info!("Re-imported the edited forest level.");

    // Drop the handle: the sweep evicts the entry and the source is told
    // to stop following the path.
    drop(handle);
    let swept = hub.sweep_all();
    let report = manager
        .process(&types, &loaders, &importers, &mut hub)
        .await
        .context("release relay pass")?;
    log::info!(
        "Swept {swept} entr{} and relayed {} forget(s).",
        if swept == 1 { "y" } else { "ies" },
        report.forgotten
    );

    Ok(())
}
