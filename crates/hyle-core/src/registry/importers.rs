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

//! The importer registry.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::descriptor::{AssetTypeDescriptor, Origin};
use crate::error::{AssetError, AssetResult};
use crate::format::FormatTag;
use crate::id::{AssetTypeId, ImporterId};
use crate::importer::{Importer, ImporterConfig};

/// One capability claim: "this importer converts this type from this
/// format".
pub type ImporterClaim = (AssetTypeId, FormatTag);

/// Serializable form of the statically-registered importers and their
/// claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterSnapshot {
    /// Static configurations keyed by id.
    pub configs: BTreeMap<ImporterId, ImporterConfig>,
    /// Claims held by static importers.
    pub claims: BTreeMap<ImporterClaim, ImporterId>,
}

struct ImporterEntry {
    config: ImporterConfig,
    /// Absent for entries seeded from a snapshot and not yet bound.
    implementation: Option<Importer>,
}

/// All importers known to one session, keyed by id and by claim.
///
/// A `(type, format)` pair belongs to at most one importer, enforced when
/// the claim is made. Lookup therefore never disambiguates: it either
/// finds the one claim holder or reports a miss.
#[derive(Default)]
pub struct ImporterRegistry {
    entries: HashMap<ImporterId, ImporterEntry>,
    claims: HashMap<ImporterClaim, ImporterId>,
}

impl ImporterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a compile-time-tagged importer with its claims.
    ///
    /// Registration is atomic: if any claim is rejected, nothing is
    /// inserted. Fails with [`AssetError::AmbiguousImporter`] when a claim
    /// is already held by another importer, [`AssetError::UnsupportedFormat`]
    /// when a claim names a format outside the importer's declared set, and
    /// [`AssetError::Conflict`] on id or origin mismatches.
    pub fn register_static(
        &mut self,
        importer: Importer,
        claims: &[ImporterClaim],
    ) -> AssetResult<ImporterId> {
        if importer.config().origin != Origin::Static {
            return Err(AssetError::Conflict {
                detail: format!(
                    "importer '{}' has a runtime id and cannot register as static",
                    importer.config().name
                ),
            });
        }
        self.insert_bound(importer, claims)
    }

    /// Registers a runtime importer with its claims.
    pub fn register_dynamic(
        &mut self,
        importer: Importer,
        claims: &[ImporterClaim],
    ) -> AssetResult<ImporterId> {
        if importer.config().origin != Origin::Dynamic {
            return Err(AssetError::Conflict {
                detail: format!(
                    "importer '{}' has a static id and cannot register as dynamic",
                    importer.config().name
                ),
            });
        }
        self.insert_bound(importer, claims)
    }

    /// Fetches a bound importer by id.
    pub fn get(&self, id: &ImporterId) -> Option<&Importer> {
        self.entries.get(id)?.implementation.as_ref()
    }

    /// Fetches a configuration by id, bound or not.
    pub fn config(&self, id: &ImporterId) -> Option<&ImporterConfig> {
        self.entries.get(id).map(|entry| &entry.config)
    }

    /// The bound holder of the exact `(type, format)` claim, if any.
    pub fn resolve_direct(&self, type_id: &AssetTypeId, format: &FormatTag) -> Option<&Importer> {
        let id = self.claims.get(&(*type_id, format.clone()))?;
        self.get(id)
    }

    /// Resolves an importer for a descriptor, consulting the descriptor's
    /// decode hint when the type holds no claim of its own.
    pub fn resolve(
        &self,
        descriptor: &AssetTypeDescriptor,
        format: &FormatTag,
    ) -> Option<&Importer> {
        if let Some(importer) = self.resolve_direct(&descriptor.id, format) {
            return Some(importer);
        }
        let hint = descriptor.decode_hint?;
        if hint == descriptor.id {
            return None;
        }
        self.resolve_direct(&hint, format)
    }

    /// Number of known importer entries, bound or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no importer entry is known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Emits the statically-registered configurations and their claims.
    /// Dynamic entries never appear.
    pub fn snapshot(&self) -> ImporterSnapshot {
        let configs: BTreeMap<ImporterId, ImporterConfig> = self
            .entries
            .values()
            .filter(|entry| entry.config.origin == Origin::Static)
            .map(|entry| (entry.config.id, entry.config.clone()))
            .collect();
        let claims = self
            .claims
            .iter()
            .filter(|(_, id)| configs.contains_key(id))
            .map(|(claim, id)| (claim.clone(), *id))
            .collect();
        ImporterSnapshot { configs, claims }
    }

    /// [`Self::snapshot`] as bytes.
    pub fn snapshot_bytes(&self) -> AssetResult<Vec<u8>> {
        super::encode_snapshot(&self.snapshot())
    }

    /// Merges configurations and claims from a snapshot. Merged claims take
    /// part in ambiguity checking at once; resolution serves them only
    /// after a matching registration binds the implementation.
    pub fn merge(&mut self, snapshot: ImporterSnapshot) -> AssetResult<()> {
        for (id, config) in snapshot.configs {
            match self.entries.get(&id) {
                Some(existing) if existing.config != config => {
                    return Err(AssetError::Conflict {
                        detail: format!(
                            "importer id {id} already registered as '{}'",
                            existing.config.name
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    log::debug!("ImporterRegistry: Seeded unbound config '{}'.", config.name);
                    self.entries.insert(
                        id,
                        ImporterEntry {
                            config,
                            implementation: None,
                        },
                    );
                }
            }
        }
        for (claim, id) in snapshot.claims {
            match self.claims.get(&claim) {
                Some(existing) if *existing != id => {
                    return Err(AssetError::AmbiguousImporter {
                        type_id: claim.0,
                        format: claim.1,
                        existing: *existing,
                    });
                }
                Some(_) => {}
                None => {
                    self.claims.insert(claim, id);
                }
            }
        }
        Ok(())
    }

    /// [`Self::merge`] from bytes.
    pub fn merge_bytes(&mut self, bytes: &[u8]) -> AssetResult<()> {
        self.merge(super::decode_snapshot(bytes)?)
    }

    fn insert_bound(
        &mut self,
        importer: Importer,
        claims: &[ImporterClaim],
    ) -> AssetResult<ImporterId> {
        let config = importer.config().clone();
        let id = config.id;

        if let Some(existing) = self.entries.get(&id) {
            if existing.config != config {
                return Err(AssetError::Conflict {
                    detail: format!(
                        "importer id {id} already registered as '{}'",
                        existing.config.name
                    ),
                });
            }
        }
        // Validate every claim before touching any state, so a rejected
        // registration leaves no partial claims behind.
        for (type_id, format) in claims {
            if !importer.supported_formats().contains(format) {
                return Err(AssetError::UnsupportedFormat {
                    format: format.clone(),
                });
            }
            if let Some(existing) = self.claims.get(&(*type_id, format.clone())) {
                if *existing != id {
                    return Err(AssetError::AmbiguousImporter {
                        type_id: *type_id,
                        format: format.clone(),
                        existing: *existing,
                    });
                }
            }
        }

        match self.entries.get_mut(&id) {
            Some(existing) => {
                if existing.implementation.is_none() {
                    log::debug!("ImporterRegistry: Bound '{}' ({id}).", config.name);
                    existing.implementation = Some(importer);
                }
            }
            None => {
                log::debug!(
                    "ImporterRegistry: Registered '{}' ({:?}, {id}).",
                    config.name,
                    config.origin
                );
                self.entries.insert(
                    id,
                    ImporterEntry {
                        config,
                        implementation: Some(importer),
                    },
                );
            }
        }
        for (type_id, format) in claims {
            self.claims.insert((*type_id, format.clone()), id);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_set;
    use crate::importer::{DynamicImporter, JsonImporter, RonImporter};

    fn type_descriptor(tag: &str, hint: Option<AssetTypeId>) -> AssetTypeDescriptor {
        let id = match hint {
            Some(_) => AssetTypeId::fresh(),
            None => AssetTypeId::from_tag(tag),
        };
        AssetTypeDescriptor {
            id,
            name: tag.into(),
            formats: format_set(["json", "ron"]),
            origin: if hint.is_some() { Origin::Dynamic } else { Origin::Static },
            decode_hint: hint.or(Some(id)),
        }
    }

    fn dynamic_json_importer(name: &str) -> Importer {
        let config = ImporterConfig::dynamic(name).with_format("json");
        Importer::Dynamic(DynamicImporter::new(config, |_descriptor, _format, _bytes| async {
            Ok(Vec::new())
        }))
    }

    #[test]
    fn test_claims_resolve_directly() {
        let mut registry = ImporterRegistry::new();
        let level = type_descriptor("LevelData", None);
        let id = registry
            .register_static(
                Importer::Json(JsonImporter::new()),
                &[(level.id, "json".into())],
            )
            .expect("register");
        let resolved = registry.resolve(&level, &"json".into()).expect("claimed");
        assert_eq!(resolved.id(), id);
        assert!(registry.resolve(&level, &"ron".into()).is_none());
    }

    #[test]
    fn test_second_claim_on_taken_pair_is_ambiguous() {
        let mut registry = ImporterRegistry::new();
        let level = type_descriptor("LevelData", None);
        registry
            .register_static(
                Importer::Json(JsonImporter::new()),
                &[(level.id, "json".into())],
            )
            .expect("register");
        let err = registry
            .register_dynamic(dynamic_json_importer("rival"), &[(level.id, "json".into())])
            .unwrap_err();
        assert!(matches!(err, AssetError::AmbiguousImporter { .. }));
    }

    #[test]
    fn test_rejected_registration_leaves_no_partial_claims() {
        let mut registry = ImporterRegistry::new();
        let level = type_descriptor("LevelData", None);
        let dialogue = type_descriptor("DialogueData", None);
        registry
            .register_static(
                Importer::Json(JsonImporter::new()),
                &[(level.id, "json".into())],
            )
            .expect("register");

        // One fresh claim plus one ambiguous claim: the whole call fails.
        let err = registry
            .register_dynamic(
                dynamic_json_importer("rival"),
                &[(dialogue.id, "json".into()), (level.id, "json".into())],
            )
            .unwrap_err();
        assert!(matches!(err, AssetError::AmbiguousImporter { .. }));
        assert!(registry.resolve(&dialogue, &"json".into()).is_none());
    }

    #[test]
    fn test_claim_outside_declared_formats_is_rejected() {
        let mut registry = ImporterRegistry::new();
        let level = type_descriptor("LevelData", None);
        let err = registry
            .register_static(
                Importer::Json(JsonImporter::new()),
                &[(level.id, "ron".into())],
            )
            .unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_decode_hint_falls_back_to_the_static_claim() {
        let mut registry = ImporterRegistry::new();
        let level = type_descriptor("LevelData", None);
        registry
            .register_static(
                Importer::Json(JsonImporter::new()),
                &[(level.id, "json".into())],
            )
            .expect("register");

        // A dynamic type borrowing LevelData's decode routine resolves the
        // claim registered for LevelData.
        let derived = type_descriptor("GeneratedLevel", Some(level.id));
        assert!(registry.resolve_direct(&derived.id, &"json".into()).is_none());
        let resolved = registry.resolve(&derived, &"json".into()).expect("fallback");
        assert_eq!(resolved.id(), ImporterId::from_tag("json"));
    }

    #[test]
    fn test_snapshot_round_trips_and_claims_stay_guarded() {
        let mut registry = ImporterRegistry::new();
        let level = type_descriptor("LevelData", None);
        registry
            .register_static(
                Importer::Json(JsonImporter::new()),
                &[(level.id, "json".into())],
            )
            .expect("register");
        registry
            .register_dynamic(dynamic_json_importer("scratch"), &[])
            .expect("register");
        let bytes = registry.snapshot_bytes().expect("encode");

        let mut seeded = ImporterRegistry::new();
        seeded.merge_bytes(&bytes).expect("merge");
        assert_eq!(seeded.len(), 1);
        // Unbound: the claim blocks rivals but resolves nothing yet.
        assert!(seeded.resolve(&level, &"json".into()).is_none());
        let err = seeded
            .register_dynamic(dynamic_json_importer("rival"), &[(level.id, "json".into())])
            .unwrap_err();
        assert!(matches!(err, AssetError::AmbiguousImporter { .. }));

        seeded
            .register_static(
                Importer::Json(JsonImporter::new()),
                &[(level.id, "json".into())],
            )
            .expect("binding registration");
        assert!(seeded.resolve(&level, &"json".into()).is_some());
    }

    #[test]
    fn test_ron_importer_registers_alongside_json() {
        let mut registry = ImporterRegistry::new();
        let level = type_descriptor("LevelData", None);
        registry
            .register_static(
                Importer::Json(JsonImporter::new()),
                &[(level.id, "json".into())],
            )
            .expect("register json");
        registry
            .register_static(
                Importer::Ron(RonImporter::new()),
                &[(level.id, "ron".into())],
            )
            .expect("register ron");
        assert!(registry.resolve(&level, &"json".into()).is_some());
        assert!(registry.resolve(&level, &"ron".into()).is_some());
    }
}
