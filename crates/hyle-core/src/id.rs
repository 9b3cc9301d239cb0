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

//! Opaque 128-bit identifiers for every registrable entity in the pipeline.
//!
//! Each identifier kind lives in its own UUID v5 namespace so that a static
//! type tag and a static loader tag can never collide even if they share the
//! same text. Statically derived ids are stable across builds and platforms
//! and may be persisted; fresh (dynamic) ids are random and only meaningful
//! within the lifetime of the process that minted them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministically derived asset type ids.
const ASSET_TYPE_NAMESPACE: Uuid = Uuid::from_u128(0x7b1d9c6354e84f0a9a660d2b8f41c5d7);
/// Namespace for deterministically derived asset ids.
const ASSET_NAMESPACE: Uuid = Uuid::from_u128(0x3a9e0f12c44b4d2aa1fe5b8d907c6e21);
/// Namespace for deterministically derived loader ids.
const LOADER_NAMESPACE: Uuid = Uuid::from_u128(0xd45417a2b96e4c7f8a0312ddfe68b90c);
/// Namespace for deterministically derived importer ids.
const IMPORTER_NAMESPACE: Uuid = Uuid::from_u128(0x5e82c3d1f07a46b89c44a6e1d2358ffa);

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $namespace:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(Uuid);

        impl $name {
            /// Derives the deterministic id for a compile-time tag.
            ///
            /// The same tag yields the same id on every build and platform,
            /// so ids produced here are safe to persist and exchange.
            pub fn from_tag(tag: &str) -> Self {
                Self(Uuid::new_v5(&$namespace, tag.as_bytes()))
            }

            /// Mints a new random id, unique within this process's lifetime.
            ///
            /// Never persist one of these as a cross-build contract.
            pub fn fresh() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the raw UUID backing this id.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(raw: Uuid) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifies a registered asset type.
    AssetTypeId,
    ASSET_TYPE_NAMESPACE
);

id_type!(
    /// Identifies one logical asset, decoupled from its physical location.
    ///
    /// An asset can be moved or renamed without breaking references to it,
    /// because references by id survive any change to the source path.
    AssetId,
    ASSET_NAMESPACE
);

id_type!(
    /// Identifies a registered loader.
    LoaderId,
    LOADER_NAMESPACE
);

id_type!(
    /// Identifies a registered importer.
    ImporterId,
    IMPORTER_NAMESPACE
);

impl AssetId {
    /// Parses the canonical hyphenated form, rejecting every variation.
    ///
    /// Accepting only the exact text `Display` produces keeps reference
    /// encoding lossless: uppercase, braced, or URN spellings decode as
    /// paths or fail instead of silently normalizing.
    pub fn parse_canonical(text: &str) -> Option<Self> {
        let parsed = Uuid::try_parse(text).ok()?;
        let id = Self(parsed);
        (id.to_string() == text).then_some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_is_deterministic() {
        let a = AssetTypeId::from_tag("texture");
        let b = AssetTypeId::from_tag("texture");
        assert_eq!(a, b);
    }

    #[test]
    fn test_namespaces_keep_kinds_apart() {
        let type_id = AssetTypeId::from_tag("mesh");
        let loader_id = LoaderId::from_tag("mesh");
        assert_ne!(type_id.as_uuid(), loader_id.as_uuid());
    }

    #[test]
    fn test_fresh_ids_differ() {
        assert_ne!(AssetId::fresh(), AssetId::fresh());
    }

    #[test]
    fn test_parse_canonical_round_trips() {
        let id = AssetId::fresh();
        let text = id.to_string();
        assert_eq!(AssetId::parse_canonical(&text), Some(id));
    }

    #[test]
    fn test_parse_canonical_rejects_variants() {
        let id = AssetId::fresh();
        let upper = id.to_string().to_uppercase();
        assert_eq!(AssetId::parse_canonical(&upper), None);
        let braced = format!("{{{id}}}");
        assert_eq!(AssetId::parse_canonical(&braced), None);
        assert_eq!(AssetId::parse_canonical("not-a-uuid"), None);
    }
}
