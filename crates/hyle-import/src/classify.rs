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

//! Change classification.
//!
//! A source scan reports raw observations; what the import loop must *do*
//! about one depends on what the record store already knows. [`classify`]
//! is that pure decision: one raw [`SourceChange`] plus the prior record
//! for its key path in, one [`ChangeClass`] out. All I/O stays in the
//! manager; this module can be tested with plain values.

use hyle_core::format::FormatTag;
use hyle_core::record::{AssetRecord, Fingerprint};
use hyle_core::reference::AssetPath;
use hyle_core::source::SourceChange;

/// What the import loop must do about one classified change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeClass {
    /// A path the record store does not know: full import plus sidecar.
    Added {
        /// Where the new item lives.
        path: AssetPath,
        /// Format of the new item.
        format: FormatTag,
        /// Digest of the new item.
        fingerprint: Fingerprint,
        /// Modification time, seconds since epoch.
        mtime: u64,
    },
    /// Known path, new content: re-import, records only.
    Modified {
        /// The record as it stood before the change.
        record: AssetRecord,
        /// Format of the content now at the path.
        format: FormatTag,
        /// Digest of the content now at the path.
        fingerprint: Fingerprint,
        /// Modification time, seconds since epoch.
        mtime: u64,
    },
    /// A tracked item moved without changing format: path update only.
    RenamedPathOnly {
        /// The record as it stood before the move.
        record: AssetRecord,
        /// Where the item lives now.
        to: AssetPath,
        /// Modification time, seconds since epoch.
        mtime: u64,
    },
    /// A tracked item moved *and* changed format: importer re-resolution.
    RenamedFormatChanged {
        /// The record as it stood before the move.
        record: AssetRecord,
        /// Where the item lives now.
        to: AssetPath,
        /// Format of the content at the new path.
        format: FormatTag,
        /// Digest of the content at the new path.
        fingerprint: Fingerprint,
        /// Modification time, seconds since epoch.
        mtime: u64,
    },
    /// A tracked item vanished: purge record and sidecar.
    Removed {
        /// The record of the vanished item.
        record: AssetRecord,
    },
    /// Only the sidecar next to a tracked item changed: full re-import.
    MetadataChanged {
        /// The record of the touched item.
        record: AssetRecord,
        /// Modification time of the change, seconds since epoch.
        mtime: u64,
    },
}

/// Classifies one raw change against the prior record for its key path
/// (for a move, the record at the *old* path).
///
/// Returns `None` when the change needs no action: content echoes whose
/// fingerprint matches the record, removals of untracked paths, and
/// sidecar touches on items the store never imported.
pub fn classify(change: &SourceChange, prior: Option<&AssetRecord>) -> Option<ChangeClass> {
    match (change, prior) {
        (
            SourceChange::Upserted {
                path,
                format,
                fingerprint,
                mtime,
            },
            None,
        ) => Some(ChangeClass::Added {
            path: path.clone(),
            format: format.clone(),
            fingerprint: *fingerprint,
            mtime: *mtime,
        }),
        (
            SourceChange::Upserted {
                format,
                fingerprint,
                mtime,
                ..
            },
            Some(record),
        ) => {
            if *fingerprint == record.fingerprint && *format == record.format {
                return None;
            }
            Some(ChangeClass::Modified {
                record: record.clone(),
                format: format.clone(),
                fingerprint: *fingerprint,
                mtime: *mtime,
            })
        }
        // A move of something the store never tracked is just a new item
        // at the destination.
        (
            SourceChange::Moved {
                to,
                format,
                fingerprint,
                mtime,
                ..
            },
            None,
        ) => Some(ChangeClass::Added {
            path: to.clone(),
            format: format.clone(),
            fingerprint: *fingerprint,
            mtime: *mtime,
        }),
        (
            SourceChange::Moved {
                to,
                format,
                fingerprint,
                mtime,
                ..
            },
            Some(record),
        ) => {
            if *format == record.format {
                Some(ChangeClass::RenamedPathOnly {
                    record: record.clone(),
                    to: to.clone(),
                    mtime: *mtime,
                })
            } else {
                Some(ChangeClass::RenamedFormatChanged {
                    record: record.clone(),
                    to: to.clone(),
                    format: format.clone(),
                    fingerprint: *fingerprint,
                    mtime: *mtime,
                })
            }
        }
        (SourceChange::Removed { .. }, Some(record)) => Some(ChangeClass::Removed {
            record: record.clone(),
        }),
        (SourceChange::Removed { .. }, None) => None,
        (SourceChange::MetadataTouched { mtime, .. }, Some(record)) => {
            Some(ChangeClass::MetadataChanged {
                record: record.clone(),
                mtime: *mtime,
            })
        }
        (SourceChange::MetadataTouched { .. }, None) => None,
    }
}
