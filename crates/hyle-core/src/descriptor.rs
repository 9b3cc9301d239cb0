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

//! Asset type descriptors and registration origin.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::format::FormatTag;
use crate::id::AssetTypeId;

/// How an entity entered its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Registered from a compile-time tag; id is stable across builds.
    Static,
    /// Registered at runtime; id is valid for this process only.
    Dynamic,
}

/// Everything the pipeline knows about one registered asset type.
///
/// The descriptor's own `id` is the sole identity input everywhere: registry
/// keys, storage keys, and persisted records all compare by it. The
/// `decode_hint` only routes deserialization. A dynamically registered type
/// may point its hint at a static type to borrow that type's decode routine
/// without becoming that type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTypeDescriptor {
    /// The type's identity.
    pub id: AssetTypeId,
    /// Human-readable name for diagnostics and logs.
    pub name: String,
    /// Serialized formats assets of this type may arrive in.
    pub formats: BTreeSet<FormatTag>,
    /// Whether the type was registered statically or at runtime.
    pub origin: Origin,
    /// Id of the static type whose deserialization routine applies.
    pub decode_hint: Option<AssetTypeId>,
}

impl AssetTypeDescriptor {
    /// True only for a genuinely static type: its hint points at itself.
    pub fn is_static(&self) -> bool {
        self.decode_hint == Some(self.id)
    }

    /// True whenever any static deserialization routine applies, including
    /// for dynamic types borrowing one.
    pub fn is_from_static(&self) -> bool {
        self.decode_hint.is_some()
    }

    /// Whether assets of this type may arrive in `format`.
    pub fn supports_format(&self, format: &FormatTag) -> bool {
        self.formats.contains(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_set;

    fn descriptor(id: AssetTypeId, origin: Origin, hint: Option<AssetTypeId>) -> AssetTypeDescriptor {
        AssetTypeDescriptor {
            id,
            name: "test".into(),
            formats: format_set(["json"]),
            origin,
            decode_hint: hint,
        }
    }

    #[test]
    fn test_static_predicates() {
        let id = AssetTypeId::from_tag("level");
        let d = descriptor(id, Origin::Static, Some(id));
        assert!(d.is_static());
        assert!(d.is_from_static());
    }

    #[test]
    fn test_dynamic_with_borrowed_routine_is_not_static() {
        let routine = AssetTypeId::from_tag("level");
        let d = descriptor(AssetTypeId::fresh(), Origin::Dynamic, Some(routine));
        assert!(!d.is_static());
        assert!(d.is_from_static());
    }

    #[test]
    fn test_plain_dynamic_has_neither() {
        let d = descriptor(AssetTypeId::fresh(), Origin::Dynamic, None);
        assert!(!d.is_static());
        assert!(!d.is_from_static());
    }

    #[test]
    fn test_supports_format() {
        let id = AssetTypeId::from_tag("level");
        let d = descriptor(id, Origin::Static, Some(id));
        assert!(d.supports_format(&"json".into()));
        assert!(!d.supports_format(&"ron".into()));
    }
}
