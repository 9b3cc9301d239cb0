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

//! # Hyle Core
//!
//! Foundational crate of the asset pipeline: identifiers, references,
//! type descriptors, the loader and importer abstractions, their
//! registries, the record store and source contracts, and the in-memory
//! source suite used by tests and demos.
//!
//! This crate defines the common language of the pipeline but holds no
//! state machine: per-type storage lives in `hyle-store` and the import
//! orchestration loop in `hyle-import`.

#![warn(missing_docs)]

pub mod descriptor;
pub mod error;
pub mod format;
pub mod id;
pub mod importer;
pub mod loader;
pub mod memory;
pub mod record;
pub mod reference;
pub mod registry;
pub mod source;
pub mod value;
