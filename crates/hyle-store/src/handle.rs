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

//! Handles into per-type asset storage.

use std::fmt;
use std::sync::Arc;

use hyle_core::reference::AssetReference;

/// Index plus generation of one storage slot.
///
/// The generation guards against index reuse: a handle whose generation no
/// longer matches the slot's sees the entry as gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// The identity cell one stored entry shares with all of its handles.
///
/// The storage keeps exactly one owning reference to the cell; every
/// outstanding handle owns another. An entry counts as in use while the
/// cell's owner count exceeds the storage's baseline of one.
#[derive(Debug)]
pub struct HandleCell {
    pub(crate) slot: SlotId,
    pub(crate) reference: AssetReference,
}

/// Shared-ownership key to one stored, possibly-not-yet-loaded asset.
///
/// Cloning a handle adds a live owner; dropping one releases it. Handles
/// grant no access by themselves: readers poll the owning storage with
/// them.
#[derive(Clone)]
pub struct AssetHandle {
    cell: Arc<HandleCell>,
}

impl AssetHandle {
    pub(crate) fn new(cell: Arc<HandleCell>) -> Self {
        Self { cell }
    }

    /// The reference this handle was obtained for.
    pub fn reference(&self) -> &AssetReference {
        &self.cell.reference
    }

    pub(crate) fn slot(&self) -> SlotId {
        self.cell.slot
    }
}

// Two handles are equal when they share an identity cell, which is exactly
// when they came from the same stored entry.
impl PartialEq for AssetHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Eq for AssetHandle {}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("slot", &self.cell.slot)
            .field("reference", &self.cell.reference)
            .finish()
    }
}

/// Where a stored entry stands in its current load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Created, not yet dispatched.
    New,
    /// A loader read is in flight.
    Loading,
    /// An importer conversion is in flight.
    Importing,
    /// The value is available.
    Imported,
    /// The attempt failed; the error is recorded on the entry.
    Error,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::New => write!(f, "New"),
            LoadState::Loading => write!(f, "Loading"),
            LoadState::Importing => write!(f, "Importing"),
            LoadState::Imported => write!(f, "Imported"),
            LoadState::Error => write!(f, "Error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_compare_by_identity_cell() {
        let cell = Arc::new(HandleCell {
            slot: SlotId {
                index: 0,
                generation: 0,
            },
            reference: "memory://a.json".parse().expect("valid"),
        });
        let a = AssetHandle::new(cell.clone());
        let b = a.clone();
        let other = AssetHandle::new(Arc::new(HandleCell {
            slot: SlotId {
                index: 0,
                generation: 0,
            },
            reference: "memory://a.json".parse().expect("valid"),
        }));
        assert_eq!(a, b);
        assert_ne!(a, other);
    }
}
