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

//! One storage per asset type, in one place.

use std::collections::HashMap;

use hyle_core::descriptor::AssetTypeDescriptor;
use hyle_core::id::AssetTypeId;
use hyle_core::registry::{ImporterRegistry, LoaderRegistry};

use crate::storage::{AssetStorage, ReleaseNotice};

/// The per-type [`AssetStorage`] instances of one session, keyed by type id.
///
/// The hub owns no policy of its own: it creates a storage the first time a
/// type is asked for and fans `tick`/`sweep` out to every instance. Distinct
/// storages share no state, so an embedder wanting real parallelism can take
/// them out of the hub and tick them from separate tasks instead.
#[derive(Default)]
pub struct StorageHub {
    storages: HashMap<AssetTypeId, AssetStorage>,
}

impl StorageHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// The storage for a type, created on first use.
    pub fn storage_mut(&mut self, descriptor: &AssetTypeDescriptor) -> &mut AssetStorage {
        self.storages
            .entry(descriptor.id)
            .or_insert_with(|| AssetStorage::new(descriptor.clone()))
    }

    /// The storage for an already-seen type id.
    pub fn get(&self, type_id: &AssetTypeId) -> Option<&AssetStorage> {
        self.storages.get(type_id)
    }

    /// Mutable access to the storage for an already-seen type id.
    pub fn get_mut(&mut self, type_id: &AssetTypeId) -> Option<&mut AssetStorage> {
        self.storages.get_mut(type_id)
    }

    /// Ticks every storage once.
    pub fn tick_all(&mut self, loaders: &LoaderRegistry, importers: &ImporterRegistry) {
        for storage in self.storages.values_mut() {
            storage.tick(loaders, importers);
        }
    }

    /// Sweeps every storage. Returns how many entries were removed in
    /// total; the notices land in [`Self::take_released`].
    pub fn sweep_all(&mut self) -> usize {
        self.storages
            .values_mut()
            .map(|storage| storage.sweep())
            .sum()
    }

    /// Drains the release notices of every storage.
    pub fn take_released(&mut self) -> Vec<ReleaseNotice> {
        self.storages
            .values_mut()
            .flat_map(|storage| storage.take_released())
            .collect()
    }

    /// Number of per-type storages the hub holds.
    pub fn len(&self) -> usize {
        self.storages.len()
    }

    /// Whether the hub holds no storage yet.
    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyle_core::descriptor::Origin;
    use hyle_core::format::format_set;

    fn descriptor(tag: &str) -> AssetTypeDescriptor {
        let id = AssetTypeId::from_tag(tag);
        AssetTypeDescriptor {
            id,
            name: tag.into(),
            formats: format_set(["json"]),
            origin: Origin::Static,
            decode_hint: Some(id),
        }
    }

    #[test]
    fn test_storage_is_created_once_per_type() {
        let mut hub = StorageHub::new();
        let level = descriptor("LevelData");
        let dialogue = descriptor("DialogueData");

        hub.storage_mut(&level)
            .obtain(&"memory://a.json".parse().expect("valid"));
        hub.storage_mut(&level)
            .obtain(&"memory://b.json".parse().expect("valid"));
        hub.storage_mut(&dialogue);

        assert_eq!(hub.len(), 2);
        assert_eq!(hub.get(&level.id).expect("present").len(), 2);
    }

    #[test]
    fn test_sweep_all_collects_notices_across_types() {
        let mut hub = StorageHub::new();
        let level = descriptor("LevelData");
        let dialogue = descriptor("DialogueData");
        let a = hub
            .storage_mut(&level)
            .obtain(&"memory://a.json".parse().expect("valid"));
        let b = hub
            .storage_mut(&dialogue)
            .obtain(&"memory://b.json".parse().expect("valid"));

        drop(a);
        drop(b);
        assert_eq!(hub.sweep_all(), 2);
        assert_eq!(hub.take_released().len(), 2);
        assert!(hub.take_released().is_empty());
    }
}
