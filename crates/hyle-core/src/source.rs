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

//! The source collaborator contract and its change feed.
//!
//! A source owns a set of externally managed items and reports how they
//! drifted since the last scan. The events here are raw observations; the
//! import loop classifies them against the record store before acting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AssetResult;
use crate::format::FormatTag;
use crate::record::Fingerprint;
use crate::reference::AssetPath;

/// Bytes read from a source, together with the format the source determined
/// for them. Only the serving loader or source understands the locator, so
/// only it can name the format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBytes {
    /// Serialized format of the payload.
    pub format: FormatTag,
    /// The payload itself.
    pub bytes: Vec<u8>,
}

/// One raw observation from a source scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceChange {
    /// A path has content the scanner had not seen, or new content.
    Upserted {
        /// The observed path.
        path: AssetPath,
        /// Format of the content now at the path.
        format: FormatTag,
        /// Digest of the content now at the path.
        fingerprint: Fingerprint,
        /// Modification time, seconds since epoch.
        mtime: u64,
    },
    /// A tracked item moved to a new path.
    Moved {
        /// Where the item used to live.
        from: AssetPath,
        /// Where it lives now.
        to: AssetPath,
        /// Format of the content at the new path.
        format: FormatTag,
        /// Digest of the content at the new path.
        fingerprint: Fingerprint,
        /// Modification time, seconds since epoch.
        mtime: u64,
    },
    /// A path no longer exists.
    Removed {
        /// The vanished path.
        path: AssetPath,
    },
    /// Only the sidecar metadata next to a path changed.
    MetadataTouched {
        /// The path whose sidecar changed.
        path: AssetPath,
        /// Modification time of the change, seconds since epoch.
        mtime: u64,
    },
}

impl SourceChange {
    /// The path the import loop keys this change by.
    pub fn path(&self) -> &AssetPath {
        match self {
            Self::Upserted { path, .. } => path,
            Self::Moved { to, .. } => to,
            Self::Removed { path } => path,
            Self::MetadataTouched { path, .. } => path,
        }
    }
}

/// One tracked external volume of serialized assets.
///
/// Concrete production sources (filesystem, network, database) live outside
/// this crate; the in-memory implementation in [`crate::memory`] serves
/// tests and demos.
#[async_trait]
pub trait Source: Send + Sync {
    /// Reports everything that changed since the previous scan. Never
    /// blocks; a scan with nothing to report returns an empty list.
    async fn scan(&self) -> AssetResult<Vec<SourceChange>>;

    /// Reads the content at a path.
    async fn read(&self, path: &AssetPath) -> AssetResult<SourceBytes>;

    /// Reads the sidecar metadata next to a path, if any.
    async fn read_metadata(&self, path: &AssetPath) -> AssetResult<Option<Vec<u8>>>;

    /// Writes the sidecar metadata next to a path.
    async fn write_metadata(&self, path: &AssetPath, bytes: Vec<u8>) -> AssetResult<()>;

    /// Drops the sidecar metadata next to a path, if any.
    async fn clear_metadata(&self, path: &AssetPath) -> AssetResult<()>;

    /// Stops following a path. Future scans will not report it unless its
    /// content changes again.
    async fn forget(&self, path: &AssetPath) -> AssetResult<()>;
}
