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

//! # Hyle Store
//!
//! Per-type asset storage on top of the `hyle-core` contracts: the handle
//! arena, the per-reference load state machine with deduplication and
//! eviction, and the [`StorageHub`] that holds one storage per registered
//! asset type.
//!
//! Nothing here blocks. [`AssetStorage::tick`] dispatches loader reads and
//! importer conversions onto the ambient tokio runtime and drains their
//! completions on later ticks; consumers poll [`AssetStorage::get`] with
//! their handles until the value arrives.

#![warn(missing_docs)]

pub mod handle;
pub mod hub;
pub mod storage;

pub use handle::{AssetHandle, LoadState};
pub use hub::StorageHub;
pub use storage::{AssetStorage, ReleaseNotice, StorageStats};
