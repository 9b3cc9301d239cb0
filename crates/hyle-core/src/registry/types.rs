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

//! The asset type registry.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::descriptor::{AssetTypeDescriptor, Origin};
use crate::error::{AssetError, AssetResult};
use crate::format::FormatTag;
use crate::id::AssetTypeId;

/// Serializable form of the statically-registered types.
pub type TypeSnapshot = BTreeMap<AssetTypeId, AssetTypeDescriptor>;

/// All asset types known to one session, keyed by id.
///
/// Registration order is remembered: it decides type inference for freshly
/// discovered source items (first registered type supporting the item's
/// format wins).
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: HashMap<AssetTypeId, AssetTypeDescriptor>,
    order: Vec<AssetTypeId>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a compile-time-tagged type under its deterministic id.
    ///
    /// Re-registering a tag with identical data is idempotent and returns
    /// the same id. Re-registering it with different data fails with
    /// [`AssetError::Conflict`].
    pub fn register_static(
        &mut self,
        tag: &str,
        name: impl Into<String>,
        formats: BTreeSet<FormatTag>,
    ) -> AssetResult<AssetTypeId> {
        let id = AssetTypeId::from_tag(tag);
        let descriptor = AssetTypeDescriptor {
            id,
            name: name.into(),
            formats,
            origin: Origin::Static,
            decode_hint: Some(id),
        };
        self.insert_checked(descriptor)?;
        Ok(id)
    }

    /// Registers a runtime-only type under a fresh id.
    pub fn register_dynamic(
        &mut self,
        name: impl Into<String>,
        formats: BTreeSet<FormatTag>,
    ) -> AssetTypeId {
        let id = AssetTypeId::fresh();
        let descriptor = AssetTypeDescriptor {
            id,
            name: name.into(),
            formats,
            origin: Origin::Dynamic,
            decode_hint: None,
        };
        self.insert_new(descriptor);
        id
    }

    /// Registers a runtime type that reuses the deserialization routine of
    /// the static type tagged `tag`.
    ///
    /// The new type keeps its own identity everywhere; only decode routing
    /// follows the hint. Used when many logically distinct types share one
    /// compile-time representation.
    pub fn register_dynamic_from_static(
        &mut self,
        tag: &str,
        name: impl Into<String>,
        formats: BTreeSet<FormatTag>,
    ) -> AssetTypeId {
        let id = AssetTypeId::fresh();
        let descriptor = AssetTypeDescriptor {
            id,
            name: name.into(),
            formats,
            origin: Origin::Dynamic,
            decode_hint: Some(AssetTypeId::from_tag(tag)),
        };
        self.insert_new(descriptor);
        id
    }

    /// Fetches a descriptor by id.
    pub fn lookup(&self, id: &AssetTypeId) -> Option<&AssetTypeDescriptor> {
        self.entries.get(id)
    }

    /// Iterates descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &AssetTypeDescriptor> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// The first registered type supporting `format`, if any.
    pub fn first_for_format(&self, format: &FormatTag) -> Option<&AssetTypeDescriptor> {
        self.iter().find(|descriptor| descriptor.supports_format(format))
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no type has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Emits the statically-registered descriptors, keyed by their
    /// deterministic ids. Dynamic entries never appear.
    pub fn snapshot(&self) -> TypeSnapshot {
        self.entries
            .iter()
            .filter(|(_, descriptor)| descriptor.origin == Origin::Static)
            .map(|(id, descriptor)| (*id, descriptor.clone()))
            .collect()
    }

    /// [`Self::snapshot`] as bytes.
    pub fn snapshot_bytes(&self) -> AssetResult<Vec<u8>> {
        super::encode_snapshot(&self.snapshot())
    }

    /// Merges a snapshot, seeding this registry without re-executing
    /// registration code. Entries already present must match exactly.
    pub fn merge(&mut self, snapshot: TypeSnapshot) -> AssetResult<()> {
        for (_, descriptor) in snapshot {
            self.insert_checked(descriptor)?;
        }
        Ok(())
    }

    /// [`Self::merge`] from bytes.
    pub fn merge_bytes(&mut self, bytes: &[u8]) -> AssetResult<()> {
        self.merge(super::decode_snapshot(bytes)?)
    }

    fn insert_checked(&mut self, descriptor: AssetTypeDescriptor) -> AssetResult<()> {
        if let Some(existing) = self.entries.get(&descriptor.id) {
            if *existing != descriptor {
                return Err(AssetError::Conflict {
                    detail: format!(
                        "type id {} already registered as '{}'",
                        descriptor.id, existing.name
                    ),
                });
            }
            return Ok(());
        }
        self.insert_new(descriptor);
        Ok(())
    }

    fn insert_new(&mut self, descriptor: AssetTypeDescriptor) {
        log::debug!(
            "TypeRegistry: Registered '{}' ({:?}, {}).",
            descriptor.name,
            descriptor.origin,
            descriptor.id
        );
        self.order.push(descriptor.id);
        self.entries.insert(descriptor.id, descriptor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_set;

    #[test]
    fn test_static_registration_is_deterministic_and_idempotent() {
        let mut a = TypeRegistry::new();
        let mut b = TypeRegistry::new();
        let id_a = a
            .register_static("LevelData", "LevelData", format_set(["json"]))
            .expect("first registration");
        let id_b = b
            .register_static("LevelData", "LevelData", format_set(["json"]))
            .expect("registration in a second session");
        assert_eq!(id_a, id_b);

        let again = a
            .register_static("LevelData", "LevelData", format_set(["json"]))
            .expect("identical re-registration is idempotent");
        assert_eq!(again, id_a);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_conflicting_static_registration_is_rejected() {
        let mut registry = TypeRegistry::new();
        registry
            .register_static("LevelData", "LevelData", format_set(["json"]))
            .expect("first registration");
        let err = registry
            .register_static("LevelData", "LevelData", format_set(["ron"]))
            .unwrap_err();
        assert!(matches!(err, AssetError::Conflict { .. }));
    }

    #[test]
    fn test_dynamic_ids_are_unique_and_hinted_types_keep_identity() {
        let mut registry = TypeRegistry::new();
        let first = registry.register_dynamic("Blob", format_set(["json"]));
        let second = registry.register_dynamic("Blob", format_set(["json"]));
        assert_ne!(first, second);

        let derived =
            registry.register_dynamic_from_static("LevelData", "GeneratedLevel", format_set(["json"]));
        let descriptor = registry.lookup(&derived).expect("registered");
        assert!(!descriptor.is_static());
        assert!(descriptor.is_from_static());
        assert_eq!(descriptor.decode_hint, Some(AssetTypeId::from_tag("LevelData")));
    }

    #[test]
    fn test_format_inference_follows_registration_order() {
        let mut registry = TypeRegistry::new();
        let first = registry
            .register_static("LevelData", "LevelData", format_set(["json"]))
            .expect("register");
        registry
            .register_static("DialogueData", "DialogueData", format_set(["json", "ron"]))
            .expect("register");
        let inferred = registry.first_for_format(&"json".into()).expect("some match");
        assert_eq!(inferred.id, first);
        let ron_only = registry.first_for_format(&"ron".into()).expect("some match");
        assert_eq!(ron_only.name, "DialogueData");
        assert!(registry.first_for_format(&"wav".into()).is_none());
    }

    #[test]
    fn test_snapshot_holds_static_entries_only_and_round_trips() {
        let mut registry = TypeRegistry::new();
        let stable = registry
            .register_static("LevelData", "LevelData", format_set(["json"]))
            .expect("register");
        registry.register_dynamic("Scratch", format_set(["json"]));

        let bytes = registry.snapshot_bytes().expect("encode");
        let mut seeded = TypeRegistry::new();
        seeded.merge_bytes(&bytes).expect("merge");
        assert_eq!(seeded.len(), 1);
        assert!(seeded.lookup(&stable).is_some());
    }

    #[test]
    fn test_merge_rejects_divergent_entries() {
        let mut registry = TypeRegistry::new();
        registry
            .register_static("LevelData", "LevelData", format_set(["json"]))
            .expect("register");
        let snapshot = registry.snapshot();

        let mut other = TypeRegistry::new();
        other
            .register_static("LevelData", "LevelData", format_set(["ron"]))
            .expect("register");
        let err = other.merge(snapshot).unwrap_err();
        assert!(matches!(err, AssetError::Conflict { .. }));
    }
}
