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

//! Asset references and their lossless text encoding.
//!
//! A reference names an asset either by id or by path. Both forms encode to
//! one human-readable string: the id form is the canonical hyphenated UUID,
//! the path form is `scheme://locator`. Decoding tries the id form first
//! and the path form second, and `encode(decode(s)) == s` holds for every
//! valid string of either form.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AssetError;
use crate::id::AssetId;

/// Separator between a path's scheme and its locator.
const SCHEME_SEPARATOR: &str = "://";

/// A path-form asset location: a scheme plus an opaque locator.
///
/// The scheme is the sole input to loader candidate selection. Everything
/// after the separator is opaque to every component except the loader that
/// claims the scheme. The scheme must not contain `"://"` itself, or the
/// encoding stops being lossless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetPath {
    scheme: String,
    locator: String,
}

impl AssetPath {
    /// Builds a path from a scheme and a loader-specific locator.
    pub fn new(scheme: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            locator: locator.into(),
        }
    }

    /// The scheme used to select candidate loaders.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The opaque remainder of the location.
    pub fn locator(&self) -> &str {
        &self.locator
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scheme, SCHEME_SEPARATOR, self.locator)
    }
}

impl FromStr for AssetPath {
    type Err = AssetError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.split_once(SCHEME_SEPARATOR) {
            Some((scheme, locator)) if !scheme.is_empty() => {
                Ok(Self::new(scheme, locator))
            }
            _ => Err(AssetError::MalformedReference {
                text: text.to_owned(),
            }),
        }
    }
}

/// An asset named by id or by path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetReference {
    /// Reference by stable asset id.
    Id(AssetId),
    /// Reference by source path.
    Path(AssetPath),
}

impl AssetReference {
    /// Returns the id if this is an id-form reference.
    pub fn id(&self) -> Option<AssetId> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Path(_) => None,
        }
    }

    /// Returns the path if this is a path-form reference.
    pub fn path(&self) -> Option<&AssetPath> {
        match self {
            Self::Id(_) => None,
            Self::Path(path) => Some(path),
        }
    }
}

impl From<AssetId> for AssetReference {
    fn from(id: AssetId) -> Self {
        Self::Id(id)
    }
}

impl From<AssetPath> for AssetReference {
    fn from(path: AssetPath) -> Self {
        Self::Path(path)
    }
}

impl fmt::Display for AssetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Path(path) => write!(f, "{path}"),
        }
    }
}

impl FromStr for AssetReference {
    type Err = AssetError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if let Some(id) = AssetId::parse_canonical(text) {
            return Ok(Self::Id(id));
        }
        if let Ok(path) = text.parse::<AssetPath>() {
            return Ok(Self::Path(path));
        }
        Err(AssetError::MalformedReference {
            text: text.to_owned(),
        })
    }
}

// References serialize as their text encoding so serialized assets and
// records stay readable and the round-trip law carries over to storage.
impl Serialize for AssetReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

impl Serialize for AssetPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_form_round_trips() {
        let text = AssetId::fresh().to_string();
        let reference: AssetReference = text.parse().expect("id form should decode");
        assert!(matches!(reference, AssetReference::Id(_)));
        assert_eq!(reference.to_string(), text);
    }

    #[test]
    fn test_path_form_round_trips() {
        let text = "memory://levels/forest.json";
        let reference: AssetReference = text.parse().expect("path form should decode");
        let path = reference.path().expect("should be a path");
        assert_eq!(path.scheme(), "memory");
        assert_eq!(path.locator(), "levels/forest.json");
        assert_eq!(reference.to_string(), text);
    }

    #[test]
    fn test_locator_keeps_later_separators() {
        let text = "db://table://row/7";
        let reference: AssetReference = text.parse().expect("path form should decode");
        let path = reference.path().expect("should be a path");
        assert_eq!(path.scheme(), "db");
        assert_eq!(path.locator(), "table://row/7");
        assert_eq!(reference.to_string(), text);
    }

    #[test]
    fn test_empty_locator_is_valid() {
        let reference: AssetReference = "memory://".parse().expect("should decode");
        assert_eq!(reference.to_string(), "memory://");
    }

    #[test]
    fn test_malformed_inputs_are_rejected() {
        for text in ["", "no-separator", "://missing-scheme"] {
            let err = text.parse::<AssetReference>().unwrap_err();
            assert!(matches!(err, AssetError::MalformedReference { .. }));
        }
    }

    #[test]
    fn test_non_canonical_uuid_is_not_an_id() {
        let upper = AssetId::fresh().to_string().to_uppercase();
        let err = upper.parse::<AssetReference>().unwrap_err();
        assert!(matches!(err, AssetError::MalformedReference { .. }));
    }

    #[test]
    fn test_serde_uses_text_encoding() {
        let reference = AssetReference::Path(AssetPath::new("memory", "a/b.ron"));
        let json = serde_json::to_string(&reference).expect("serialize");
        assert_eq!(json, "\"memory://a/b.ron\"");
        let back: AssetReference = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, reference);
    }
}
