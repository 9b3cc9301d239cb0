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

//! The three pipeline registries: types, loaders, importers.
//!
//! Registries are plain, explicitly constructed context objects. A session
//! builds its registries at startup, performs registrations through them,
//! and passes them by reference to whoever resolves entries; nothing here
//! is process-global. All conflict checking happens at registration time,
//! so resolution never has to disambiguate.
//!
//! Each registry can emit a snapshot of its statically-registered entries
//! and merge one back in, which is how a production deployment is seeded
//! without re-executing registration code. A merged loader or importer
//! entry arrives without an implementation; it takes part in conflict
//! checking immediately but is skipped by resolution until a matching
//! static registration binds the implementation.

mod importers;
mod loaders;
mod types;

pub use importers::*;
pub use loaders::*;
pub use types::*;

use crate::error::{AssetError, AssetResult};

/// Encodes a snapshot into bytes.
fn encode_snapshot<S: serde::Serialize>(snapshot: &S) -> AssetResult<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::serde::encode_to_vec(snapshot, config).map_err(|e| AssetError::DecodeError {
        reason: format!("snapshot encode: {e}"),
    })
}

/// Decodes a snapshot from bytes.
fn decode_snapshot<S: serde::de::DeserializeOwned>(bytes: &[u8]) -> AssetResult<S> {
    let config = bincode::config::standard();
    let (snapshot, _) =
        bincode::serde::decode_from_slice(bytes, config).map_err(|e| AssetError::DecodeError {
            reason: format!("snapshot decode: {e}"),
        })?;
    Ok(snapshot)
}
