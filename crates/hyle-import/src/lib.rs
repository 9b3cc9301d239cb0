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

//! # Hyle Import
//!
//! The orchestration side of the asset pipeline: [`ImportManager`] scans
//! tracked sources for change events, classifies each event against the
//! persistent record store, and applies the per-class reconciliation
//! policy through the registered loaders and importers. Freshly imported
//! bytes are fed back into the per-type storages, and storage-originated
//! release notices are relayed to the owning sources.

#![warn(missing_docs)]

pub mod classify;
pub mod manager;
pub mod sidecar;

pub use classify::ChangeClass;
pub use manager::{ImportConfig, ImportManager, ProcessReport};
pub use sidecar::Sidecar;
