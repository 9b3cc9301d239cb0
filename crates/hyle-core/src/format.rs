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

//! Serialized-format tags.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A case-sensitive tag naming one serialized asset format (`"json"`, `"ron"`).
///
/// Tags are compared verbatim. Sets of tags are kept ordered so descriptor
/// snapshots serialize deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormatTag(String);

impl FormatTag {
    /// Wraps a format name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FormatTag {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds an ordered format set from anything tag-convertible.
pub fn format_set<I, T>(tags: I) -> BTreeSet<FormatTag>
where
    I: IntoIterator<Item = T>,
    T: Into<FormatTag>,
{
    tags.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_case_sensitive() {
        assert_ne!(FormatTag::from("json"), FormatTag::from("JSON"));
    }

    #[test]
    fn test_format_set_orders_and_dedups() {
        let set = format_set(["ron", "json", "ron"]);
        let names: Vec<&str> = set.iter().map(FormatTag::as_str).collect();
        assert_eq!(names, vec!["json", "ron"]);
    }
}
