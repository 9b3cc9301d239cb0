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

//! Persistent asset records and the record store contract.
//!
//! The record store is the import loop's durable memory: one record per
//! tracked source item, holding everything needed to classify the next
//! change event without re-reading the item. The storage engine behind the
//! contract is the embedder's choice.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AssetResult;
use crate::format::FormatTag;
use crate::id::{AssetId, AssetTypeId, ImporterId};
use crate::reference::{AssetPath, AssetReference};

/// BLAKE3 digest of an asset's serialized content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hashes `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Returns the raw digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", blake3::Hash::from_bytes(self.0).to_hex())
    }
}

/// One tracked source item, as the import loop last saw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// The asset's stable id.
    pub asset: AssetId,
    /// Where the item currently lives in its source.
    pub path: AssetPath,
    /// The asset's registered type.
    pub type_id: AssetTypeId,
    /// The importer that produced the last successful import.
    pub importer: ImporterId,
    /// Serialized format of the item at the last import.
    pub format: FormatTag,
    /// Content digest at the last import.
    pub fingerprint: Fingerprint,
    /// Source modification time at the last import, seconds since epoch.
    pub mtime: u64,
    /// References this asset depends on, discovered during import.
    pub dependencies: Vec<AssetReference>,
}

/// Durable storage for [`AssetRecord`]s, keyed by reference.
///
/// A record is reachable both through its path and through its asset id;
/// implementations index both. All operations are asynchronous and must not
/// block the caller.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches the record for a reference, if one is tracked.
    async fn get(&self, reference: &AssetReference) -> AssetResult<Option<AssetRecord>>;

    /// Inserts or replaces records, keyed by their asset id and path.
    async fn save(&self, records: Vec<AssetRecord>) -> AssetResult<()>;

    /// Removes the record for a reference. Removing an untracked reference
    /// is a no-op.
    async fn clear(&self, reference: &AssetReference) -> AssetResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_content_addressed() {
        let a = Fingerprint::of(b"level one");
        let b = Fingerprint::of(b"level one");
        let c = Fingerprint::of(b"level two");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_hex_is_stable() {
        let digest = Fingerprint::of(b"x");
        assert_eq!(digest.to_string(), blake3::hash(b"x").to_hex().to_string());
    }
}
