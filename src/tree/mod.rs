//! The resource namespace.
//!
//! Entries live in a flat arena indexed by [`EntryId`], with parent /
//! first-child / next-sibling links forming an intrusive tree. The root is a
//! permanent namespace entry with an empty name.
//!
//! ```text
//! /                       (namespace)
//! +-- app                 (namespace)
//! |   +-- temp            (input, numeric, "degC")
//! +-- obs                 (namespace)
//!     +-- temp_avg        (observation)
//! ```
//!
//! An entry stays alive while it carries a resource or has children. When
//! the last of both goes away the entry is released, and so are any
//! ancestors that become empty as a result.

pub mod id;
pub mod path;

pub use id::EntryId;

use crate::error::{HubError, Result};
use crate::resource::{IoPoint, Observation, Resource, ResourceKind};
use crate::types::{DataType, MAX_RESOURCE_PATH_LEN};
use serde::{Deserialize, Serialize};
use tracing::info;

/// What an entry currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Namespace,
    Input,
    Output,
    Observation,
    Placeholder,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Namespace => write!(f, "namespace"),
            EntryKind::Input => write!(f, "input"),
            EntryKind::Output => write!(f, "output"),
            EntryKind::Observation => write!(f, "observation"),
            EntryKind::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Which fixed-type resource to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Input,
    Output,
}

/// A single node in the namespace.
#[derive(Debug)]
pub struct Entry {
    pub id: EntryId,
    /// Path segment (empty for the root)
    pub name: String,
    /// Parent entry (INVALID for the root)
    pub parent: EntryId,
    /// First child (intrusive linked list)
    pub first_child: EntryId,
    /// Next sibling (intrusive linked list)
    pub next_sibling: EntryId,
    /// None for a namespace
    pub resource: Option<Resource>,
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        self.resource
            .as_ref()
            .map_or(EntryKind::Namespace, Resource::entry_kind)
    }
}

/// Arena-backed namespace tree.
#[derive(Debug)]
pub struct ResourceTree {
    entries: Vec<Option<Entry>>,
    live: usize,
}

impl Default for ResourceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTree {
    pub const ROOT: EntryId = EntryId(0);

    pub fn new() -> Self {
        let root = Entry {
            id: Self::ROOT,
            name: String::new(),
            parent: EntryId::INVALID,
            first_child: EntryId::INVALID,
            next_sibling: EntryId::INVALID,
            resource: None,
        };
        Self {
            entries: vec![Some(root)],
            live: 1,
        }
    }

    /// Number of live entries, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live <= 1
    }

    #[inline]
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        if id.is_valid() {
            self.entries.get(id.index()).and_then(Option::as_ref)
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        if id.is_valid() {
            self.entries.get_mut(id.index()).and_then(Option::as_mut)
        } else {
            None
        }
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.get(id).is_some()
    }

    pub fn resource(&self, id: EntryId) -> Option<&Resource> {
        self.get(id).and_then(|e| e.resource.as_ref())
    }

    pub fn resource_mut(&mut self, id: EntryId) -> Option<&mut Resource> {
        self.get_mut(id).and_then(|e| e.resource.as_mut())
    }

    /// Kind of a live entry; `None` for a released id.
    pub fn kind(&self, id: EntryId) -> Option<EntryKind> {
        self.get(id).map(Entry::kind)
    }

    /// Ids of every live entry carrying a resource, in arena order.
    pub fn resource_ids(&self) -> Vec<EntryId> {
        self.entries
            .iter()
            .flatten()
            .filter(|e| e.resource.is_some())
            .map(|e| e.id)
            .collect()
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    pub fn first_child(&self, id: EntryId) -> Option<EntryId> {
        self.get(id).map(|e| e.first_child).filter(|c| c.is_valid())
    }

    pub fn next_sibling(&self, id: EntryId) -> Option<EntryId> {
        self.get(id).map(|e| e.next_sibling).filter(|s| s.is_valid())
    }

    /// Iterate over the children of an entry, in insertion order.
    pub fn children(&self, parent: EntryId) -> ChildIter<'_> {
        ChildIter {
            tree: self,
            current: self.first_child(parent).unwrap_or(EntryId::INVALID),
        }
    }

    fn find_child(&self, parent: EntryId, name: &str) -> Option<EntryId> {
        self.children(parent).find(|e| e.name == name).map(|e| e.id)
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Resolve `path` relative to `base`, optionally creating namespace
    /// entries along the way.
    ///
    /// When creating, a path whose absolute form would exceed
    /// [`MAX_RESOURCE_PATH_LEN`] is `Malformed` and nothing is created.
    pub fn resolve(&mut self, base: EntryId, path: &str, create: bool) -> Result<EntryId> {
        let segments = path::split(path)?;
        if !self.contains(base) {
            return Err(HubError::NotFound(format!("base entry {} is gone", base)));
        }
        if create {
            let base_len = if base == Self::ROOT {
                0
            } else {
                self.path(Self::ROOT, base)?.len()
            };
            let len = base_len + segments.iter().map(|s| s.len() + 1).sum::<usize>();
            if len > MAX_RESOURCE_PATH_LEN {
                return Err(HubError::Malformed(format!(
                    "'{}' would be {} bytes long, over the {} byte limit",
                    path, len, MAX_RESOURCE_PATH_LEN
                )));
            }
        }

        let mut cur = base;
        for segment in segments {
            cur = match self.find_child(cur, segment) {
                Some(child) => child,
                None if create => self.add_child(cur, segment),
                None => return Err(HubError::NotFound(path.to_string())),
            };
        }
        Ok(cur)
    }

    /// Resolve without creating anything.
    pub fn lookup(&self, base: EntryId, path: &str) -> Result<EntryId> {
        let segments = path::split(path)?;
        let mut cur = base;
        if !self.contains(cur) {
            return Err(HubError::NotFound(format!("base entry {} is gone", base)));
        }
        for segment in segments {
            cur = self
                .find_child(cur, segment)
                .ok_or_else(|| HubError::NotFound(path.to_string()))?;
        }
        Ok(cur)
    }

    /// Render the path of `id` relative to `base`, with a leading `/`.
    pub fn path(&self, base: EntryId, id: EntryId) -> Result<String> {
        let mut names = Vec::new();
        let mut cur = id;
        while cur != base {
            let entry = self
                .get(cur)
                .filter(|e| e.parent.is_valid())
                .ok_or_else(|| HubError::NotFound(format!("{} is not under {}", id, base)))?;
            names.push(entry.name.as_str());
            cur = entry.parent;
        }
        names.reverse();

        let rendered = format!("/{}", names.join("/"));
        if rendered.len() > MAX_RESOURCE_PATH_LEN {
            return Err(HubError::Overflow(format!(
                "path of {} exceeds {} bytes",
                id, MAX_RESOURCE_PATH_LEN
            )));
        }
        Ok(rendered)
    }

    /// Absolute path of an entry. Falls back to the entry id when the path
    /// cannot be rendered; used for log messages.
    pub fn display_path(&self, id: EntryId) -> String {
        self.path(Self::ROOT, id).unwrap_or_else(|_| id.to_string())
    }

    // ========================================================================
    // Creation
    // ========================================================================

    fn add_child(&mut self, parent: EntryId, name: &str) -> EntryId {
        let id = EntryId(self.entries.len() as u32);
        self.entries.push(Some(Entry {
            id,
            name: name.to_string(),
            parent,
            first_child: EntryId::INVALID,
            next_sibling: EntryId::INVALID,
            resource: None,
        }));
        self.live += 1;

        let first = self.entries[parent.index()]
            .as_ref()
            .map_or(EntryId::INVALID, |e| e.first_child);
        if !first.is_valid() {
            self.entry_mut(parent).first_child = id;
        } else {
            let mut cur = first;
            loop {
                let next = self.entry(cur).next_sibling;
                if !next.is_valid() {
                    self.entry_mut(cur).next_sibling = id;
                    break;
                }
                cur = next;
            }
        }
        id
    }

    /// Resolve (creating as needed) and make sure the entry carries a
    /// resource. A namespace becomes a Placeholder, keeping its children.
    pub fn get_or_create_resource(&mut self, base: EntryId, path: &str) -> Result<EntryId> {
        let id = self.resolve_resource_slot(base, path)?;
        let entry = self.entry_mut(id);
        if entry.resource.is_none() {
            entry.resource = Some(Resource::placeholder());
        }
        Ok(id)
    }

    /// Get or create an Input or Output.
    ///
    /// Returns the entry and whether a new Input/Output came into being.
    /// Re-requesting the same kind with the same type and units is a no-op;
    /// anything else already at the path is a `KindConflict`.
    pub fn get_or_create_io(
        &mut self,
        base: EntryId,
        path: &str,
        io_kind: IoKind,
        data_type: DataType,
        units: &str,
    ) -> Result<(EntryId, bool)> {
        let id = self.resolve_resource_slot(base, path)?;
        let wanted = match io_kind {
            IoKind::Input => EntryKind::Input,
            IoKind::Output => EntryKind::Output,
        };

        let entry = self.entry_mut(id);
        match entry.kind() {
            EntryKind::Namespace | EntryKind::Placeholder => {}
            kind if kind == wanted => {
                let same = entry
                    .resource
                    .as_ref()
                    .is_some_and(|r| r.fixed_type() == Some(data_type) && r.core.units == units);
                if same {
                    return Ok((id, false));
                }
                return Err(HubError::KindConflict(format!(
                    "{} '{}' already exists with a different type or units",
                    kind, path
                )));
            }
            kind => {
                return Err(HubError::KindConflict(format!(
                    "'{}' is already an {}",
                    path, kind
                )));
            }
        }

        let io = IoPoint::new(data_type);
        let kind = match io_kind {
            IoKind::Input => ResourceKind::Input(io),
            IoKind::Output => ResourceKind::Output(io),
        };
        let res = entry.resource.get_or_insert_with(Resource::placeholder);
        res.core.units = units.to_string();
        res.change_kind(kind);
        info!("Created {} {} ({}, '{}')", wanted, self.display_path(id), data_type, units);
        Ok((id, true))
    }

    /// Get or create an Observation. Returns whether it is new.
    pub fn get_or_create_observation(&mut self, base: EntryId, path: &str) -> Result<(EntryId, bool)> {
        let id = self.resolve_resource_slot(base, path)?;
        let entry = self.entry_mut(id);
        match entry.kind() {
            EntryKind::Observation => return Ok((id, false)),
            EntryKind::Namespace | EntryKind::Placeholder => {}
            kind => {
                return Err(HubError::KindConflict(format!(
                    "'{}' is already an {}",
                    path, kind
                )));
            }
        }

        let res = entry.resource.get_or_insert_with(Resource::placeholder);
        res.change_kind(ResourceKind::Observation(Box::new(Observation::new())));
        info!("Created observation {}", self.display_path(id));
        Ok((id, true))
    }

    fn resolve_resource_slot(&mut self, base: EntryId, path: &str) -> Result<EntryId> {
        let id = self.resolve(base, path, true)?;
        if id == Self::ROOT {
            return Err(HubError::Malformed(
                "the root namespace cannot carry a resource".to_string(),
            ));
        }
        Ok(id)
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Delete the Input, Output or Observation at `id`.
    ///
    /// If administrative settings are attached the resource becomes a
    /// Placeholder and `true` is returned; otherwise the resource is released
    /// along with any ancestors left empty.
    pub fn delete_resource(&mut self, id: EntryId) -> bool {
        let Some(res) = self.resource_mut(id) else {
            return false;
        };
        if res.has_admin_settings() {
            res.change_kind(ResourceKind::Placeholder);
            return true;
        }
        self.entry_mut(id).resource = None;
        self.release_if_empty(id);
        false
    }

    /// Release a Placeholder that no longer carries any settings.
    ///
    /// Returns true if it was released.
    pub fn release_placeholder(&mut self, id: EntryId) -> bool {
        let releasable = self
            .resource(id)
            .is_some_and(|r| r.entry_kind() == EntryKind::Placeholder && !r.has_admin_settings());
        if releasable {
            self.entry_mut(id).resource = None;
            self.release_if_empty(id);
        }
        releasable
    }

    /// Release `id` and its ancestors for as long as they are empty namespaces.
    fn release_if_empty(&mut self, id: EntryId) {
        let mut cur = id;
        while cur != Self::ROOT {
            let Some(entry) = self.get(cur) else {
                return;
            };
            if entry.resource.is_some() || entry.first_child.is_valid() {
                return;
            }
            let parent = entry.parent;
            self.unlink(cur);
            self.entries[cur.index()] = None;
            self.live -= 1;
            cur = parent;
        }
    }

    fn unlink(&mut self, id: EntryId) {
        let (parent, next) = {
            let entry = self.entry(id);
            (entry.parent, entry.next_sibling)
        };
        if !parent.is_valid() {
            return;
        }
        let first = self.entry(parent).first_child;
        if first == id {
            self.entry_mut(parent).first_child = next;
            return;
        }
        let mut cur = first;
        while cur.is_valid() {
            let sibling = self.entry(cur).next_sibling;
            if sibling == id {
                self.entry_mut(cur).next_sibling = next;
                return;
            }
            cur = sibling;
        }
    }

    /// Live entry by id. A dangling id here is a broken tree invariant.
    fn entry(&self, id: EntryId) -> &Entry {
        match self.get(id) {
            Some(entry) => entry,
            None => panic!("tree link points at released entry {}", id),
        }
    }

    fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        match self.get_mut(id) {
            Some(entry) => entry,
            None => panic!("tree link points at released entry {}", id),
        }
    }
}

/// Iterator over the children of an entry.
pub struct ChildIter<'a> {
    tree: &'a ResourceTree,
    current: EntryId,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.tree.get(self.current)?;
        self.current = entry.next_sibling;
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::TypedSample;
    use crate::types::DataSample;

    const ROOT: EntryId = ResourceTree::ROOT;

    #[test]
    fn test_resolve_creates_namespaces() {
        let mut tree = ResourceTree::new();
        let id = tree.resolve(ROOT, "/a/b/c", true).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.kind(id), Some(EntryKind::Namespace));
        assert_eq!(tree.path(ROOT, id).unwrap(), "/a/b/c");
        assert_eq!(tree.resolve(ROOT, "a/b/c", false).unwrap(), id);
        assert!(tree.resolve(ROOT, "/a/x", false).unwrap_err().is_not_found());
    }

    #[test]
    fn test_resolve_malformed_creates_nothing() {
        let mut tree = ResourceTree::new();
        assert!(matches!(
            tree.resolve(ROOT, "/a/b.c", true),
            Err(HubError::Malformed(_))
        ));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_relative_path() {
        let mut tree = ResourceTree::new();
        let app = tree.resolve(ROOT, "/app", true).unwrap();
        let leaf = tree.resolve(app, "x/y", true).unwrap();
        assert_eq!(tree.path(app, leaf).unwrap(), "/x/y");
        assert_eq!(tree.path(ROOT, leaf).unwrap(), "/app/x/y");

        let other = tree.resolve(ROOT, "/other", true).unwrap();
        assert!(tree.path(other, leaf).unwrap_err().is_not_found());
    }

    #[test]
    fn test_overlong_path_rejected_on_create() {
        let mut tree = ResourceTree::new();
        let seg = "s".repeat(30);
        let path = format!("/{}/{}/{}", seg, seg, seg);
        assert!(matches!(
            tree.resolve(ROOT, &path, true),
            Err(HubError::Malformed(_))
        ));
        assert_eq!(tree.len(), 1);

        // Exactly at the limit is fine and renders back.
        let longest = format!("/{}/{}", "a".repeat(40), "b".repeat(37));
        assert_eq!(longest.len(), MAX_RESOURCE_PATH_LEN);
        let id = tree.resolve(ROOT, &longest, true).unwrap();
        assert_eq!(tree.path(ROOT, id).unwrap(), longest);
    }

    #[test]
    fn test_overlong_path_counts_the_base() {
        let mut tree = ResourceTree::new();
        let app = tree.resolve(ROOT, &format!("/{}", "a".repeat(60)), true).unwrap();
        assert!(tree.resolve(app, &"b".repeat(20), true).is_err());
        assert!(tree.resolve(app, &"b".repeat(17), true).is_ok());
    }

    #[test]
    fn test_children_in_insertion_order() {
        let mut tree = ResourceTree::new();
        for name in ["c", "a", "b"] {
            tree.resolve(ROOT, name, true).unwrap();
        }
        let names: Vec<_> = tree.children(ROOT).map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_placeholder_keeps_children() {
        let mut tree = ResourceTree::new();
        let child = tree.resolve(ROOT, "/a/b", true).unwrap();
        let a = tree.get_or_create_resource(ROOT, "/a").unwrap();
        assert_eq!(tree.kind(a), Some(EntryKind::Placeholder));
        assert_eq!(tree.first_child(a), Some(child));
    }

    #[test]
    fn test_io_idempotent_and_conflicts() {
        let mut tree = ResourceTree::new();
        let (id, created) = tree
            .get_or_create_io(ROOT, "/app/temp", IoKind::Input, DataType::Numeric, "degC")
            .unwrap();
        assert!(created);
        let (again, created) = tree
            .get_or_create_io(ROOT, "/app/temp", IoKind::Input, DataType::Numeric, "degC")
            .unwrap();
        assert_eq!(id, again);
        assert!(!created);

        let err = tree
            .get_or_create_io(ROOT, "/app/temp", IoKind::Input, DataType::Boolean, "degC")
            .unwrap_err();
        assert!(matches!(err, HubError::KindConflict(_)));
        let err = tree
            .get_or_create_io(ROOT, "/app/temp", IoKind::Output, DataType::Numeric, "degC")
            .unwrap_err();
        assert!(matches!(err, HubError::KindConflict(_)));
        assert!(tree.get_or_create_observation(ROOT, "/app/temp").is_err());
        assert_eq!(tree.kind(id), Some(EntryKind::Input));
    }

    #[test]
    fn test_observation_idempotent() {
        let mut tree = ResourceTree::new();
        let (id, created) = tree.get_or_create_observation(ROOT, "/obs/x").unwrap();
        assert!(created);
        tree.resource_mut(id)
            .unwrap()
            .observation_mut()
            .unwrap()
            .set_max_count(5);
        let (again, created) = tree.get_or_create_observation(ROOT, "/obs/x").unwrap();
        assert_eq!(id, again);
        assert!(!created);
        assert_eq!(tree.resource(id).unwrap().observation().unwrap().max_count(), 5);
    }

    #[test]
    fn test_placeholder_to_input_keeps_settings() {
        let mut tree = ResourceTree::new();
        let id = tree.get_or_create_resource(ROOT, "/app/led").unwrap();
        tree.resource_mut(id).unwrap().core.default_value = Some(TypedSample::new(
            DataType::Boolean,
            DataSample::boolean(1.0, true),
        ));
        let (io, _) = tree
            .get_or_create_io(ROOT, "/app/led", IoKind::Output, DataType::Boolean, "")
            .unwrap();
        assert_eq!(io, id);
        let res = tree.resource(id).unwrap();
        assert_eq!(res.core.current.as_ref().unwrap().sample.as_bool(), Some(true));
    }

    #[test]
    fn test_delete_prunes_empty_ancestors() {
        let mut tree = ResourceTree::new();
        tree.resolve(ROOT, "/keep", true).unwrap();
        let keep_child = tree
            .get_or_create_io(ROOT, "/keep/x", IoKind::Input, DataType::Trigger, "")
            .unwrap()
            .0;
        let (id, _) = tree
            .get_or_create_io(ROOT, "/a/b/c", IoKind::Input, DataType::Numeric, "")
            .unwrap();
        assert!(!tree.delete_resource(id));
        assert!(!tree.contains(id));
        assert!(tree.lookup(ROOT, "/a").is_err());
        assert!(tree.contains(keep_child));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_delete_with_settings_becomes_placeholder() {
        let mut tree = ResourceTree::new();
        let (id, _) = tree
            .get_or_create_io(ROOT, "/a/x", IoKind::Input, DataType::Numeric, "")
            .unwrap();
        tree.resource_mut(id).unwrap().core.destinations.push(EntryId(99));
        assert!(tree.delete_resource(id));
        assert_eq!(tree.kind(id), Some(EntryKind::Placeholder));
        assert_eq!(tree.resource(id).unwrap().core.destinations, vec![EntryId(99)]);

        tree.resource_mut(id).unwrap().core.destinations.clear();
        assert!(tree.release_placeholder(id));
        assert!(!tree.contains(id));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_ids_not_reused() {
        let mut tree = ResourceTree::new();
        let (a, _) = tree
            .get_or_create_io(ROOT, "/a", IoKind::Input, DataType::Numeric, "")
            .unwrap();
        tree.delete_resource(a);
        let (b, _) = tree
            .get_or_create_io(ROOT, "/a", IoKind::Input, DataType::Numeric, "")
            .unwrap();
        assert_ne!(a, b);
        assert!(tree.get(a).is_none());
    }

    #[test]
    fn test_resource_on_root_rejected() {
        let mut tree = ResourceTree::new();
        assert!(tree.get_or_create_resource(ROOT, "/").is_err());
    }
}
