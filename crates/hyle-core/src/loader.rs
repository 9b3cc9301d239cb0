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

//! Loaders: how serialized bytes enter the pipeline.
//!
//! A loader fronts one kind of external source. The set of loaders is a
//! closed enum: one variant per implementation shipped with the pipeline,
//! plus [`DynamicLoader`], a capability table of closures through which
//! runtime-registered sources participate without open-ended trait objects.
//!
//! Loaders never pick themselves: [`crate::registry::LoaderRegistry`]
//! resolves candidates by scheme and asks each remaining candidate for a
//! fine-grained `check_path_supported` verdict.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::descriptor::Origin;
use crate::error::{AssetError, AssetResult};
use crate::id::{AssetId, LoaderId};
use crate::memory::MemoryLoader;
use crate::reference::{AssetPath, AssetReference};
use crate::source::SourceBytes;

/// Boxed future type used by dynamic capability tables.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type ReadFn =
    Arc<dyn Fn(AssetReference) -> BoxFuture<'static, AssetResult<SourceBytes>> + Send + Sync>;
type ReadMetadataFn =
    Arc<dyn Fn(AssetReference) -> BoxFuture<'static, AssetResult<Option<Vec<u8>>>> + Send + Sync>;
type WriteMetadataFn =
    Arc<dyn Fn(AssetId, AssetPath, Vec<u8>) -> BoxFuture<'static, AssetResult<()>> + Send + Sync>;
type PathFilterFn = Arc<dyn Fn(&AssetPath) -> bool + Send + Sync>;

/// The registrable description of a loader.
///
/// This is the part of a loader a registry snapshot can carry: everything
/// except the implementation itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// The loader's identity.
    pub id: LoaderId,
    /// Human-readable name for diagnostics and logs.
    pub name: String,
    /// Schemes this loader claims.
    pub schemes: BTreeSet<String>,
    /// Whether the loader resolves id-form references on its own.
    pub supports_ids: bool,
    /// Whether the loader accepts metadata writes.
    pub writable: bool,
    /// Whether the loader was registered statically or at runtime.
    pub origin: Origin,
}

impl LoaderConfig {
    /// Starts a config for a compile-time-tagged loader. The id derives
    /// from the tag and is stable across builds.
    pub fn static_tag(tag: &str, name: impl Into<String>) -> Self {
        Self {
            id: LoaderId::from_tag(tag),
            name: name.into(),
            schemes: BTreeSet::new(),
            supports_ids: false,
            writable: false,
            origin: Origin::Static,
        }
    }

    /// Starts a config for a runtime-registered loader with a fresh id.
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            id: LoaderId::fresh(),
            name: name.into(),
            schemes: BTreeSet::new(),
            supports_ids: false,
            writable: false,
            origin: Origin::Dynamic,
        }
    }

    /// Claims a scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.schemes.insert(scheme.into());
        self
    }

    /// Marks the loader as able to resolve id-form references.
    pub fn with_id_support(mut self) -> Self {
        self.supports_ids = true;
        self
    }

    /// Marks the loader as accepting metadata writes.
    pub fn with_writable(mut self) -> Self {
        self.writable = true;
        self
    }
}

/// A runtime-registered loader: a [`LoaderConfig`] plus a capability table.
///
/// Capabilities the table does not provide degrade gracefully: a missing
/// metadata reader reports no sidecar, and a missing metadata writer leaves
/// the loader read-only.
#[derive(Clone)]
pub struct DynamicLoader {
    config: LoaderConfig,
    read: ReadFn,
    read_metadata: Option<ReadMetadataFn>,
    write_metadata: Option<WriteMetadataFn>,
    path_filter: Option<PathFilterFn>,
}

impl DynamicLoader {
    /// Builds the table around the one mandatory capability, reading.
    pub fn new<R, Fut>(config: LoaderConfig, read: R) -> Self
    where
        R: Fn(AssetReference) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AssetResult<SourceBytes>> + Send + 'static,
    {
        Self {
            config,
            read: Arc::new(move |reference| Box::pin(read(reference))),
            read_metadata: None,
            write_metadata: None,
            path_filter: None,
        }
    }

    /// Adds sidecar metadata reading.
    pub fn with_read_metadata<M, Fut>(mut self, read_metadata: M) -> Self
    where
        M: Fn(AssetReference) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AssetResult<Option<Vec<u8>>>> + Send + 'static,
    {
        self.read_metadata = Some(Arc::new(move |reference| Box::pin(read_metadata(reference))));
        self
    }

    /// Adds sidecar metadata writing and flips the config to writable.
    pub fn with_write_metadata<W, Fut>(mut self, write_metadata: W) -> Self
    where
        W: Fn(AssetId, AssetPath, Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AssetResult<()>> + Send + 'static,
    {
        self.config.writable = true;
        self.write_metadata = Some(Arc::new(move |id, path, bytes| {
            Box::pin(write_metadata(id, path, bytes))
        }));
        self
    }

    /// Adds a fine-grained path filter applied after the scheme match.
    pub fn with_path_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&AssetPath) -> bool + Send + Sync + 'static,
    {
        self.path_filter = Some(Arc::new(filter));
        self
    }

    /// The loader's registrable description.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn check_path_supported(&self, path: &AssetPath) -> bool {
        self.path_filter.as_ref().map(|filter| filter(path)).unwrap_or(true)
    }
}

impl fmt::Debug for DynamicLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicLoader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Every loader the pipeline can dispatch to.
#[derive(Debug, Clone)]
pub enum Loader {
    /// Loader over an in-memory volume, used by tests and demos.
    Memory(MemoryLoader),
    /// Runtime-registered loader backed by a capability table.
    Dynamic(DynamicLoader),
}

impl Loader {
    /// The loader's registrable description.
    pub fn config(&self) -> &LoaderConfig {
        match self {
            Self::Memory(inner) => inner.config(),
            Self::Dynamic(inner) => &inner.config,
        }
    }

    /// The loader's identity.
    pub fn id(&self) -> LoaderId {
        self.config().id
    }

    /// Schemes this loader claims.
    pub fn supported_schemes(&self) -> &BTreeSet<String> {
        &self.config().schemes
    }

    /// Fine-grained filter applied after the scheme match.
    pub fn check_path_supported(&self, path: &AssetPath) -> bool {
        match self {
            Self::Memory(inner) => inner.check_path_supported(path),
            Self::Dynamic(inner) => inner.check_path_supported(path),
        }
    }

    /// Reads the serialized content behind a reference.
    ///
    /// # Returns
    ///
    /// The bytes plus the format the loader determined for them. Fails with
    /// [`AssetError::NotFound`] for unknown references and
    /// [`AssetError::SourceIoError`] for source failures.
    pub async fn read(&self, reference: &AssetReference) -> AssetResult<SourceBytes> {
        match self {
            Self::Memory(inner) => inner.read(reference).await,
            Self::Dynamic(inner) => (inner.read)(reference.clone()).await,
        }
    }

    /// Reads the sidecar metadata behind a reference, if any.
    pub async fn read_metadata(&self, reference: &AssetReference) -> AssetResult<Option<Vec<u8>>> {
        match self {
            Self::Memory(inner) => inner.read_metadata(reference).await,
            Self::Dynamic(inner) => match &inner.read_metadata {
                Some(read_metadata) => read_metadata(reference.clone()).await,
                None => Ok(None),
            },
        }
    }

    /// Writes sidecar metadata for an asset at a path.
    ///
    /// Fails with [`AssetError::ReadOnlySource`] when the loader declares no
    /// write capability.
    pub async fn write_metadata(
        &self,
        id: &AssetId,
        path: &AssetPath,
        bytes: Vec<u8>,
    ) -> AssetResult<()> {
        if !self.config().writable {
            return Err(AssetError::ReadOnlySource { loader: self.id() });
        }
        match self {
            Self::Memory(inner) => inner.write_metadata(id, path, bytes).await,
            Self::Dynamic(inner) => match &inner.write_metadata {
                Some(write_metadata) => write_metadata(*id, path.clone(), bytes).await,
                None => Err(AssetError::ReadOnlySource { loader: self.id() }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatTag;

    fn fixed_payload_loader() -> Loader {
        let config = LoaderConfig::dynamic("fixed").with_scheme("fixed");
        Loader::Dynamic(DynamicLoader::new(config, |_reference| async {
            Ok(SourceBytes {
                format: FormatTag::from("json"),
                bytes: b"{}".to_vec(),
            })
        }))
    }

    #[tokio::test]
    async fn test_dynamic_read_serves_payload() {
        let loader = fixed_payload_loader();
        let reference: AssetReference = "fixed://anything".parse().expect("valid");
        let got = loader.read(&reference).await.expect("read should succeed");
        assert_eq!(got.format, FormatTag::from("json"));
        assert_eq!(got.bytes, b"{}");
    }

    #[tokio::test]
    async fn test_missing_metadata_capability_reports_no_sidecar() {
        let loader = fixed_payload_loader();
        let reference: AssetReference = "fixed://anything".parse().expect("valid");
        let sidecar = loader.read_metadata(&reference).await.expect("ok");
        assert_eq!(sidecar, None);
    }

    #[tokio::test]
    async fn test_write_without_capability_is_read_only() {
        let loader = fixed_payload_loader();
        let path = AssetPath::new("fixed", "a.json");
        let err = loader
            .write_metadata(&AssetId::fresh(), &path, vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::ReadOnlySource { .. }));
    }

    #[test]
    fn test_path_filter_narrows_support() {
        let config = LoaderConfig::dynamic("filtered").with_scheme("fixed");
        let loader = Loader::Dynamic(
            DynamicLoader::new(config, |_reference| async {
                Err(AssetError::NotFound {
                    reference: "unused".into(),
                })
            })
            .with_path_filter(|path| path.locator().ends_with(".json")),
        );
        assert!(loader.check_path_supported(&AssetPath::new("fixed", "a.json")));
        assert!(!loader.check_path_supported(&AssetPath::new("fixed", "a.png")));
    }
}
