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

//! Sidecar metadata.
//!
//! The one piece of pipeline state that lives *inside* a source: a small
//! JSON document next to each imported item, holding the asset id minted
//! for it and the importer that produced it. It is what keeps ids stable
//! across re-imports and across sessions that share the same source.

use hyle_core::error::{AssetError, AssetResult};
use hyle_core::id::{AssetId, ImporterId};
use serde::{Deserialize, Serialize};

/// The sidecar document stored next to an asset in its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sidecar {
    /// The id assigned to the asset at first import.
    pub asset_id: AssetId,
    /// The importer that produced the last persisted import.
    pub importer_id: ImporterId,
}

impl Sidecar {
    /// Encodes the document as JSON bytes.
    pub fn to_bytes(&self) -> AssetResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| AssetError::DecodeError {
            reason: format!("sidecar encode: {e}"),
        })
    }

    /// Decodes a document from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> AssetResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| AssetError::DecodeError {
            reason: format!("sidecar decode: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_round_trips_through_json() {
        let sidecar = Sidecar {
            asset_id: AssetId::fresh(),
            importer_id: ImporterId::from_tag("json"),
        };
        let bytes = sidecar.to_bytes().expect("encode");
        assert_eq!(Sidecar::from_bytes(&bytes).expect("decode"), sidecar);
    }

    #[test]
    fn test_sidecar_keys_are_stable() {
        let sidecar = Sidecar {
            asset_id: AssetId::from_tag("fixed"),
            importer_id: ImporterId::from_tag("json"),
        };
        let text = String::from_utf8(sidecar.to_bytes().expect("encode")).expect("utf-8");
        assert!(text.contains("\"asset_id\""));
        assert!(text.contains("\"importer_id\""));
    }

    #[test]
    fn test_garbage_sidecar_is_a_decode_error() {
        let err = Sidecar::from_bytes(b"not a sidecar").unwrap_err();
        assert!(matches!(err, AssetError::DecodeError { .. }));
    }
}
