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

//! The pipeline-wide error taxonomy.
//!
//! Every fallible operation in the asset pipeline returns [`AssetResult`].
//! A failure affecting one reference is scoped to that reference: storage
//! captures it as the entry's terminal `Error` state, and the import loop
//! logs it and retries the item on the next scan. Registration conflicts
//! are the exception and are rejected at registration time.

use thiserror::Error;

use crate::format::FormatTag;
use crate::id::{AssetTypeId, ImporterId, LoaderId};

/// Convenient alias for results of asset pipeline operations.
pub type AssetResult<T> = std::result::Result<T, AssetError>;

/// All failure modes surfaced by the asset pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// The referenced asset does not exist in the queried source.
    #[error("asset not found: {reference}")]
    NotFound {
        /// Rendered form of the reference that missed.
        reference: String,
    },

    /// A reference string decoded as neither id-form nor path-form.
    #[error("malformed asset reference: {text:?}")]
    MalformedReference {
        /// The offending input text.
        text: String,
    },

    /// The underlying source failed while reading or writing.
    #[error("source i/o failure for {reference}: {detail}")]
    SourceIoError {
        /// Rendered form of the reference being accessed.
        reference: String,
        /// Source-specific failure description.
        detail: String,
    },

    /// A write was attempted through a loader without write capability.
    #[error("loader {loader} is read-only")]
    ReadOnlySource {
        /// The loader that refused the write.
        loader: LoaderId,
    },

    /// No importer or type accepts the given serialized format.
    #[error("unsupported serialized format {format:?}")]
    UnsupportedFormat {
        /// The rejected format tag.
        format: FormatTag,
    },

    /// The bytes did not decode as the expected format.
    #[error("decode failed: {reason}")]
    DecodeError {
        /// Importer-reported reason.
        reason: String,
    },

    /// A second importer claimed an already-claimed (type, format) pair.
    #[error("importer claim ({type_id}, {format:?}) already taken by {existing}")]
    AmbiguousImporter {
        /// The contested asset type.
        type_id: AssetTypeId,
        /// The contested format.
        format: FormatTag,
        /// The importer holding the claim.
        existing: ImporterId,
    },

    /// A static id was re-registered with different data.
    #[error("conflicting registration: {detail}")]
    Conflict {
        /// What clashed with what.
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_detail() {
        let err = AssetError::DecodeError {
            reason: "unexpected end of input".into(),
        };
        assert_eq!(err.to_string(), "decode failed: unexpected end of input");
    }

    #[test]
    fn test_errors_compare_by_content() {
        let a = AssetError::MalformedReference { text: "x".into() };
        let b = AssetError::MalformedReference { text: "x".into() };
        assert_eq!(a, b);
    }
}
