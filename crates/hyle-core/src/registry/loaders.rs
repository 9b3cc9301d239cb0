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

//! The loader registry.

use std::collections::{BTreeMap, HashMap};

use crate::descriptor::Origin;
use crate::error::{AssetError, AssetResult};
use crate::id::LoaderId;
use crate::loader::{Loader, LoaderConfig};
use crate::reference::{AssetPath, AssetReference};

/// Serializable form of the statically-registered loader configurations.
pub type LoaderSnapshot = BTreeMap<LoaderId, LoaderConfig>;

struct LoaderEntry {
    config: LoaderConfig,
    /// Absent for entries seeded from a snapshot and not yet bound.
    implementation: Option<Loader>,
}

/// All loaders known to one session, keyed by id.
///
/// Candidate resolution is deterministic: the scheme filter runs first,
/// then each surviving loader's own path filter, and ties fall to the
/// earlier registration. Callers take the first candidate.
#[derive(Default)]
pub struct LoaderRegistry {
    entries: HashMap<LoaderId, LoaderEntry>,
    order: Vec<LoaderId>,
}

impl LoaderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a compile-time-tagged loader.
    ///
    /// Binds the implementation to a matching snapshot-seeded entry if one
    /// exists. Fails with [`AssetError::Conflict`] when the id is already
    /// held by a different configuration, or when the loader's config does
    /// not carry [`Origin::Static`].
    pub fn register_static(&mut self, loader: Loader) -> AssetResult<LoaderId> {
        if loader.config().origin != Origin::Static {
            return Err(AssetError::Conflict {
                detail: format!(
                    "loader '{}' has a runtime id and cannot register as static",
                    loader.config().name
                ),
            });
        }
        self.insert_bound(loader)
    }

    /// Registers a runtime loader under its fresh id.
    pub fn register_dynamic(&mut self, loader: Loader) -> AssetResult<LoaderId> {
        if loader.config().origin != Origin::Dynamic {
            return Err(AssetError::Conflict {
                detail: format!(
                    "loader '{}' has a static id and cannot register as dynamic",
                    loader.config().name
                ),
            });
        }
        self.insert_bound(loader)
    }

    /// Fetches a bound loader by id.
    pub fn get(&self, id: &LoaderId) -> Option<&Loader> {
        self.entries.get(id)?.implementation.as_ref()
    }

    /// Fetches a configuration by id, bound or not.
    pub fn config(&self, id: &LoaderId) -> Option<&LoaderConfig> {
        self.entries.get(id).map(|entry| &entry.config)
    }

    /// Ordered candidates for a path: scheme match, then the loader's own
    /// finer filter, earliest registration first.
    pub fn resolve_for_path(&self, path: &AssetPath) -> Vec<&Loader> {
        self.bound_in_order()
            .filter(|loader| loader.supported_schemes().contains(path.scheme()))
            .filter(|loader| loader.check_path_supported(path))
            .collect()
    }

    /// The first loader claiming id-form references, if any.
    pub fn resolve_for_id(&self) -> Option<&Loader> {
        self.bound_in_order().find(|loader| loader.config().supports_ids)
    }

    /// The winning loader for a reference, if any: the first path candidate
    /// for path form, the first id-capable loader for id form.
    pub fn resolve(&self, reference: &AssetReference) -> Option<&Loader> {
        match reference {
            AssetReference::Path(path) => self.resolve_for_path(path).into_iter().next(),
            AssetReference::Id(_) => self.resolve_for_id(),
        }
    }

    /// Number of known loader entries, bound or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no loader entry is known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Emits the statically-registered configurations. Dynamic entries
    /// never appear.
    pub fn snapshot(&self) -> LoaderSnapshot {
        self.entries
            .values()
            .filter(|entry| entry.config.origin == Origin::Static)
            .map(|entry| (entry.config.id, entry.config.clone()))
            .collect()
    }

    /// [`Self::snapshot`] as bytes.
    pub fn snapshot_bytes(&self) -> AssetResult<Vec<u8>> {
        super::encode_snapshot(&self.snapshot())
    }

    /// Merges configurations from a snapshot. Merged entries stay unbound,
    /// invisible to resolution, until [`Self::register_static`] supplies
    /// the implementation.
    pub fn merge(&mut self, snapshot: LoaderSnapshot) -> AssetResult<()> {
        for (id, config) in snapshot {
            match self.entries.get(&id) {
                Some(existing) if existing.config != config => {
                    return Err(AssetError::Conflict {
                        detail: format!(
                            "loader id {id} already registered as '{}'",
                            existing.config.name
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    log::debug!("LoaderRegistry: Seeded unbound config '{}'.", config.name);
                    self.order.push(id);
                    self.entries.insert(
                        id,
                        LoaderEntry {
                            config,
                            implementation: None,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// [`Self::merge`] from bytes.
    pub fn merge_bytes(&mut self, bytes: &[u8]) -> AssetResult<()> {
        self.merge(super::decode_snapshot(bytes)?)
    }

    fn insert_bound(&mut self, loader: Loader) -> AssetResult<LoaderId> {
        let config = loader.config().clone();
        let id = config.id;
        match self.entries.get_mut(&id) {
            Some(existing) if existing.config != config => Err(AssetError::Conflict {
                detail: format!(
                    "loader id {id} already registered as '{}'",
                    existing.config.name
                ),
            }),
            Some(existing) => {
                // Bind a snapshot-seeded entry; an already-bound duplicate
                // registration keeps the first implementation.
                if existing.implementation.is_none() {
                    log::debug!("LoaderRegistry: Bound '{}' ({id}).", config.name);
                    existing.implementation = Some(loader);
                }
                Ok(id)
            }
            None => {
                log::debug!(
                    "LoaderRegistry: Registered '{}' ({:?}, {id}).",
                    config.name,
                    config.origin
                );
                self.order.push(id);
                self.entries.insert(
                    id,
                    LoaderEntry {
                        config,
                        implementation: Some(loader),
                    },
                );
                Ok(id)
            }
        }
    }

    fn bound_in_order(&self) -> impl Iterator<Item = &Loader> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id)?.implementation.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatTag;
    use crate::loader::DynamicLoader;
    use crate::source::SourceBytes;

    fn dynamic_loader(name: &str, scheme: &str) -> Loader {
        let config = LoaderConfig::dynamic(name).with_scheme(scheme);
        Loader::Dynamic(DynamicLoader::new(config, |_reference| async {
            Ok(SourceBytes {
                format: FormatTag::from("json"),
                bytes: Vec::new(),
            })
        }))
    }

    fn static_loader(tag: &str, scheme: &str) -> Loader {
        let config = LoaderConfig::static_tag(tag, tag).with_scheme(scheme);
        Loader::Dynamic(DynamicLoader::new(config, |_reference| async {
            Ok(SourceBytes {
                format: FormatTag::from("json"),
                bytes: Vec::new(),
            })
        }))
    }

    #[test]
    fn test_scheme_filter_and_registration_order_tie_break() {
        let mut registry = LoaderRegistry::new();
        let first = registry
            .register_dynamic(dynamic_loader("first", "memory"))
            .expect("register");
        registry
            .register_dynamic(dynamic_loader("second", "memory"))
            .expect("register");
        registry
            .register_dynamic(dynamic_loader("other", "net"))
            .expect("register");

        let path = AssetPath::new("memory", "a.json");
        let candidates = registry.resolve_for_path(&path);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id(), first);

        let winner = registry
            .resolve(&AssetReference::Path(path))
            .expect("a candidate");
        assert_eq!(winner.id(), first);
    }

    #[test]
    fn test_path_filter_runs_after_scheme_match() {
        let mut registry = LoaderRegistry::new();
        let config = LoaderConfig::dynamic("json only").with_scheme("memory");
        let picky = Loader::Dynamic(
            DynamicLoader::new(config, |_reference| async {
                Ok(SourceBytes {
                    format: FormatTag::from("json"),
                    bytes: Vec::new(),
                })
            })
            .with_path_filter(|path| path.locator().ends_with(".json")),
        );
        registry.register_dynamic(picky).expect("register");

        assert_eq!(registry.resolve_for_path(&AssetPath::new("memory", "a.json")).len(), 1);
        assert!(registry.resolve_for_path(&AssetPath::new("memory", "a.png")).is_empty());
    }

    #[test]
    fn test_origin_mismatch_is_rejected() {
        let mut registry = LoaderRegistry::new();
        let err = registry
            .register_static(dynamic_loader("runtime", "memory"))
            .unwrap_err();
        assert!(matches!(err, AssetError::Conflict { .. }));
    }

    #[test]
    fn test_snapshot_seeds_unbound_entries_until_registration_binds() {
        let mut registry = LoaderRegistry::new();
        registry
            .register_static(static_loader("pack", "memory"))
            .expect("register");
        registry
            .register_dynamic(dynamic_loader("scratch", "memory"))
            .expect("register");
        let bytes = registry.snapshot_bytes().expect("encode");

        let mut seeded = LoaderRegistry::new();
        seeded.merge_bytes(&bytes).expect("merge");
        assert_eq!(seeded.len(), 1);
        // Unbound entries never resolve.
        assert!(seeded
            .resolve_for_path(&AssetPath::new("memory", "a.json"))
            .is_empty());

        let id = seeded
            .register_static(static_loader("pack", "memory"))
            .expect("binding registration");
        assert!(seeded.get(&id).is_some());
        assert_eq!(
            seeded
                .resolve_for_path(&AssetPath::new("memory", "a.json"))
                .len(),
            1
        );
    }

    #[test]
    fn test_binding_with_divergent_config_is_a_conflict() {
        let mut registry = LoaderRegistry::new();
        registry
            .register_static(static_loader("pack", "memory"))
            .expect("register");
        let bytes = registry.snapshot_bytes().expect("encode");

        let mut seeded = LoaderRegistry::new();
        seeded.merge_bytes(&bytes).expect("merge");
        let err = seeded
            .register_static(static_loader("pack", "net"))
            .unwrap_err();
        assert!(matches!(err, AssetError::Conflict { .. }));
    }
}
