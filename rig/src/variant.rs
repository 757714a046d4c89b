// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One fully or partially resolved combination of axis choices.
//!
//! Axes attach their chosen values to a [`Variant`] under their own
//! [`AxisId`], so independently authored axes never step on each
//! other's data. Clones are shallow: the attachments themselves are
//! shared, and attaching to a clone never disturbs the original.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Identifier of one configuration axis, also the key its attachment
/// lives under.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AxisId(pub &'static str);

impl std::fmt::Display for AxisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Default)]
pub struct Variant {
    values: HashMap<AxisId, Arc<dyn Any + Send + Sync>>,
}

impl Variant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach this axis's chosen value, replacing any previous
    /// attachment under the same id.
    pub fn attach<T: Any + Send + Sync>(&mut self, id: AxisId, value: T) {
        self.values.insert(id, Arc::new(value));
    }

    /// The value attached under `id`, if it exists and has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, id: AxisId) -> Option<&T> {
        self.values.get(&id).and_then(|v| v.downcast_ref::<T>())
    }

    /// Remove just this axis's attachment. Returns whether one was
    /// present.
    pub fn detach(&mut self, id: AxisId) -> bool {
        self.values.remove(&id).is_some()
    }

    pub fn carries(&self, id: AxisId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn axes(&self) -> impl Iterator<Item = AxisId> + '_ {
        self.values.keys().copied()
    }
}

impl std::fmt::Debug for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<AxisId> = self.values.keys().copied().collect();
        ids.sort();
        f.debug_tuple("Variant").field(&ids).finish()
    }
}
