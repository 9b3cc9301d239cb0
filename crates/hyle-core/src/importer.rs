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

//! Importers: serialized bytes to usable in-memory values.
//!
//! Like loaders, importers form a closed enum: the built-in JSON and RON
//! importers plus [`DynamicImporter`] for runtime-registered converters.
//! The built-ins decode into [`DynValue`] and leave structural
//! interpretation to the consuming type, which is the only workable
//! contract for dynamically registered types with no compile-time shape.
//! An importer owns the whole bytes-to-value conversion; the registry's
//! job ends at picking it.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::descriptor::{AssetTypeDescriptor, Origin};
use crate::error::{AssetError, AssetResult};
use crate::format::FormatTag;
use crate::id::{AssetId, ImporterId};
use crate::loader::BoxFuture;
use crate::reference::AssetReference;
use crate::value::{AssetValue, DynValue};

type ImportFn = Arc<
    dyn Fn(
            AssetTypeDescriptor,
            FormatTag,
            Vec<u8>,
        ) -> BoxFuture<'static, AssetResult<Vec<ImportedAsset>>>
        + Send
        + Sync,
>;

/// The registrable description of an importer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// The importer's identity.
    pub id: ImporterId,
    /// Human-readable name for diagnostics and logs.
    pub name: String,
    /// Formats this importer can decode.
    pub formats: BTreeSet<FormatTag>,
    /// Whether the importer was registered statically or at runtime.
    pub origin: Origin,
}

impl ImporterConfig {
    /// Starts a config for a compile-time-tagged importer.
    pub fn static_tag(tag: &str, name: impl Into<String>) -> Self {
        Self {
            id: ImporterId::from_tag(tag),
            name: name.into(),
            formats: BTreeSet::new(),
            origin: Origin::Static,
        }
    }

    /// Starts a config for a runtime-registered importer with a fresh id.
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            id: ImporterId::fresh(),
            name: name.into(),
            formats: BTreeSet::new(),
            origin: Origin::Dynamic,
        }
    }

    /// Declares a decodable format.
    pub fn with_format(mut self, format: impl Into<FormatTag>) -> Self {
        self.formats.insert(format.into());
        self
    }
}

/// One decoded asset produced by an import.
#[derive(Debug, Clone)]
pub struct ImportedAsset {
    /// Id the serialized form carried, if any. The import loop mints a
    /// fresh id when this is absent.
    pub id: Option<AssetId>,
    /// The usable in-memory value.
    pub value: AssetValue,
    /// References this asset depends on, discovered during decode.
    pub dependencies: Vec<AssetReference>,
}

/// Built-in importer for the `json` format.
#[derive(Debug, Clone)]
pub struct JsonImporter {
    config: ImporterConfig,
}

impl JsonImporter {
    /// Creates the importer under its stable static id.
    pub fn new() -> Self {
        Self {
            config: ImporterConfig::static_tag("json", "JSON importer").with_format("json"),
        }
    }

    fn import(
        &self,
        descriptor: &AssetTypeDescriptor,
        bytes: &[u8],
    ) -> AssetResult<Vec<ImportedAsset>> {
        let value: DynValue =
            serde_json::from_slice(bytes).map_err(|e| AssetError::DecodeError {
                reason: format!("json: {e}"),
            })?;
        finish_generic_import(descriptor, value)
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in importer for the `ron` format.
#[derive(Debug, Clone)]
pub struct RonImporter {
    config: ImporterConfig,
}

impl RonImporter {
    /// Creates the importer under its stable static id.
    pub fn new() -> Self {
        Self {
            config: ImporterConfig::static_tag("ron", "RON importer").with_format("ron"),
        }
    }

    fn import(
        &self,
        descriptor: &AssetTypeDescriptor,
        bytes: &[u8],
    ) -> AssetResult<Vec<ImportedAsset>> {
        let value: DynValue = ron::de::from_bytes(bytes).map_err(|e| AssetError::DecodeError {
            reason: format!("ron: {e}"),
        })?;
        finish_generic_import(descriptor, value)
    }
}

impl Default for RonImporter {
    fn default() -> Self {
        Self::new()
    }
}

/// A runtime-registered importer: an [`ImporterConfig`] plus its conversion
/// closure.
#[derive(Clone)]
pub struct DynamicImporter {
    config: ImporterConfig,
    import: ImportFn,
}

impl DynamicImporter {
    /// Wraps a conversion closure.
    pub fn new<I, Fut>(config: ImporterConfig, import: I) -> Self
    where
        I: Fn(AssetTypeDescriptor, FormatTag, Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AssetResult<Vec<ImportedAsset>>> + Send + 'static,
    {
        Self {
            config,
            import: Arc::new(move |descriptor, format, bytes| {
                Box::pin(import(descriptor, format, bytes))
            }),
        }
    }

    /// The importer's registrable description.
    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }
}

impl fmt::Debug for DynamicImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicImporter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Every importer the pipeline can dispatch to.
#[derive(Debug, Clone)]
pub enum Importer {
    /// Built-in JSON importer.
    Json(JsonImporter),
    /// Built-in RON importer.
    Ron(RonImporter),
    /// Runtime-registered importer.
    Dynamic(DynamicImporter),
}

impl Importer {
    /// The importer's registrable description.
    pub fn config(&self) -> &ImporterConfig {
        match self {
            Self::Json(inner) => &inner.config,
            Self::Ron(inner) => &inner.config,
            Self::Dynamic(inner) => &inner.config,
        }
    }

    /// The importer's identity.
    pub fn id(&self) -> ImporterId {
        self.config().id
    }

    /// Formats this importer can decode.
    pub fn supported_formats(&self) -> &BTreeSet<FormatTag> {
        &self.config().formats
    }

    /// Converts serialized bytes into usable values for `descriptor`.
    ///
    /// # Returns
    ///
    /// The decoded assets, possibly several from one payload. Fails with
    /// [`AssetError::UnsupportedFormat`] when called outside the declared
    /// formats and [`AssetError::DecodeError`] on malformed input.
    pub async fn import(
        &self,
        descriptor: &AssetTypeDescriptor,
        format: &FormatTag,
        bytes: &[u8],
    ) -> AssetResult<Vec<ImportedAsset>> {
        if !self.supported_formats().contains(format) {
            return Err(AssetError::UnsupportedFormat {
                format: format.clone(),
            });
        }
        match self {
            Self::Json(inner) => inner.import(descriptor, bytes),
            Self::Ron(inner) => inner.import(descriptor, bytes),
            Self::Dynamic(inner) => {
                (inner.import)(descriptor.clone(), format.clone(), bytes.to_vec()).await
            }
        }
    }
}

/// Shared tail of the built-in imports: pull the dependency list out of the
/// decoded value and hand the rest over unchanged.
///
/// The convention the built-ins understand: a top-level mapping key
/// `"dependencies"` holding a sequence of reference strings. Anything else
/// under that key is a decode failure rather than a silent skip.
fn finish_generic_import(
    descriptor: &AssetTypeDescriptor,
    value: DynValue,
) -> AssetResult<Vec<ImportedAsset>> {
    let dependencies = collect_dependencies(&value)?;
    log::trace!(
        "Imported one '{}' value with {} dependency reference(s).",
        descriptor.name,
        dependencies.len()
    );
    Ok(vec![ImportedAsset {
        id: None,
        value: AssetValue::dynamic(value),
        dependencies,
    }])
}

fn collect_dependencies(value: &DynValue) -> AssetResult<Vec<AssetReference>> {
    let Some(listed) = value.get("dependencies") else {
        return Ok(Vec::new());
    };
    let DynValue::Sequence(items) = listed else {
        return Err(AssetError::DecodeError {
            reason: "\"dependencies\" must be a sequence of reference strings".into(),
        });
    };
    items
        .iter()
        .map(|item| {
            let text = item.as_str().ok_or_else(|| AssetError::DecodeError {
                reason: "\"dependencies\" entries must be reference strings".into(),
            })?;
            text.parse::<AssetReference>()
                .map_err(|e| AssetError::DecodeError {
                    reason: format!("bad dependency reference: {e}"),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_set;
    use crate::id::AssetTypeId;
    use crate::reference::AssetPath;

    fn level_descriptor() -> AssetTypeDescriptor {
        let id = AssetTypeId::from_tag("LevelData");
        AssetTypeDescriptor {
            id,
            name: "LevelData".into(),
            formats: format_set(["json", "ron"]),
            origin: Origin::Static,
            decode_hint: Some(id),
        }
    }

    #[tokio::test]
    async fn test_json_import_decodes_mapping() {
        let importer = Importer::Json(JsonImporter::new());
        let bytes = br#"{"name": "forest", "spawn_points": 3}"#;
        let assets = importer
            .import(&level_descriptor(), &"json".into(), bytes)
            .await
            .expect("import should succeed");
        assert_eq!(assets.len(), 1);
        let value = assets[0].value.as_dynamic().expect("dynamic value");
        assert_eq!(value.get("name").and_then(DynValue::as_str), Some("forest"));
        assert_eq!(
            value.get("spawn_points").and_then(DynValue::as_i64),
            Some(3)
        );
    }

    #[tokio::test]
    async fn test_ron_import_decodes_mapping() {
        let importer = Importer::Ron(RonImporter::new());
        let bytes = br#"{"hp": 10, "label": "slime"}"#;
        let assets = importer
            .import(&level_descriptor(), &"ron".into(), bytes)
            .await
            .expect("import should succeed");
        let value = assets[0].value.as_dynamic().expect("dynamic value");
        assert_eq!(value.get("hp").and_then(DynValue::as_i64), Some(10));
    }

    #[tokio::test]
    async fn test_dependencies_are_collected() {
        let importer = Importer::Json(JsonImporter::new());
        let bytes = br#"{"name": "forest", "dependencies": ["memory://textures/bark.json"]}"#;
        let assets = importer
            .import(&level_descriptor(), &"json".into(), bytes)
            .await
            .expect("import should succeed");
        assert_eq!(
            assets[0].dependencies,
            vec![AssetReference::Path(AssetPath::new(
                "memory",
                "textures/bark.json"
            ))]
        );
    }

    #[tokio::test]
    async fn test_malformed_dependency_is_a_decode_error() {
        let importer = Importer::Json(JsonImporter::new());
        let bytes = br#"{"dependencies": [42]}"#;
        let err = importer
            .import(&level_descriptor(), &"json".into(), bytes)
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::DecodeError { .. }));
    }

    #[tokio::test]
    async fn test_undeclared_format_is_rejected() {
        let importer = Importer::Json(JsonImporter::new());
        let err = importer
            .import(&level_descriptor(), &"ron".into(), b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_a_decode_error() {
        let importer = Importer::Json(JsonImporter::new());
        let err = importer
            .import(&level_descriptor(), &"json".into(), b"not json")
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::DecodeError { .. }));
    }
}
