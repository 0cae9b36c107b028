//! Per-kind id → (description, native handle) bookkeeping
//!
//! An entry is keyed by the id issued when it was first created. Its native
//! handle may later be replaced (a marker re-attached after clustering is
//! disabled), so callbacks arriving with a native id go through a reverse
//! index.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::models::OverlayKind;
use crate::native::NativeId;

/// Live native handle of a registry entry
pub trait NativeHandle {
    /// `None` while the entity is not directly attached to the map
    fn native_id(&self) -> Option<&str>;
}

impl NativeHandle for NativeId {
    fn native_id(&self) -> Option<&str> {
        Some(self)
    }
}

/// Marker handles are detached while the clustering coordinator renders them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerHandle {
    Attached(NativeId),
    Clustered,
}

impl NativeHandle for MarkerHandle {
    fn native_id(&self) -> Option<&str> {
        match self {
            MarkerHandle::Attached(id) => Some(id),
            MarkerHandle::Clustered => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry<D, H> {
    pub description: D,
    pub handle: H,
}

#[derive(Debug)]
pub struct OverlayRegistry<D, H> {
    kind: OverlayKind,
    entries: BTreeMap<String, RegistryEntry<D, H>>,
    by_native_id: HashMap<NativeId, String>,
}

impl<D, H: NativeHandle> OverlayRegistry<D, H> {
    pub fn new(kind: OverlayKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
            by_native_id: HashMap::new(),
        }
    }

    pub fn kind(&self) -> OverlayKind {
        self.kind
    }

    /// Record a new entry
    ///
    /// Ids are expected to be unique while live. If the SDK reissues one, the
    /// displaced entry is unindexed, logged and handed back to the caller.
    pub fn insert(&mut self, id: String, description: D, handle: H) -> Option<RegistryEntry<D, H>> {
        let previous = self.entries.remove(&id);
        if let Some(previous) = &previous {
            warn!("{} id {} was reissued while still live, replacing its entry", self.kind, id);
            self.unindex(&previous.handle);
        }
        if let Some(native_id) = handle.native_id() {
            self.by_native_id.insert(native_id.to_string(), id.clone());
        }
        self.entries.insert(id, RegistryEntry { description, handle });
        previous
    }

    pub fn get(&self, id: &str) -> Option<&RegistryEntry<D, H>> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<RegistryEntry<D, H>> {
        let entry = self.entries.remove(id)?;
        self.unindex(&entry.handle);
        Some(entry)
    }

    /// Swap the native handle, returning the old one
    pub fn replace_handle(&mut self, id: &str, handle: H) -> Option<H> {
        let entry = self.entries.get_mut(id)?;
        let previous = std::mem::replace(&mut entry.handle, handle);
        if let Some(native_id) = previous.native_id() {
            self.by_native_id.remove(native_id);
        }
        if let Some(native_id) = entry.handle.native_id() {
            self.by_native_id.insert(native_id.to_string(), id.to_string());
        }
        Some(previous)
    }

    pub fn description_mut(&mut self, id: &str) -> Option<&mut D> {
        self.entries.get_mut(id).map(|entry| &mut entry.description)
    }

    /// Registry id currently bound to a native handle id
    pub fn id_for_native(&self, native_id: &str) -> Option<&str> {
        self.by_native_id.get(native_id).map(String::as_str)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegistryEntry<D, H>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return every entry in id order
    pub fn drain(&mut self) -> Vec<(String, RegistryEntry<D, H>)> {
        self.by_native_id.clear();
        std::mem::take(&mut self.entries).into_iter().collect()
    }

    fn unindex(&mut self, handle: &H) {
        if let Some(native_id) = handle.native_id() {
            self.by_native_id.remove(native_id);
        }
    }
}
