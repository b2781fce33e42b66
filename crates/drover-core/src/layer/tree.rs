//! Arena-backed layer tree.
//!
//! Objects are stored by [`LayerId`]. Every object records its parent's id,
//! and every parent records the set of its children's ids. Both sides are
//! only ever changed together, through the methods of [`LayerTree`].

use std::collections::{BTreeMap, VecDeque};

use drover_proto::name::LayerId;
use drover_proto::{DrError, DrResult};

use super::data::RscLayerObject;
use crate::keys::LayerOwner;

/// The layer tree of one resource or snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerTree {
    owner: LayerOwner,
    root: Option<LayerId>,
    objects: BTreeMap<LayerId, RscLayerObject>,
}

impl LayerTree {
    pub fn new(owner: LayerOwner) -> Self {
        Self {
            owner,
            root: None,
            objects: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> &LayerOwner {
        &self.owner
    }

    pub fn root(&self) -> Option<LayerId> {
        self.root
    }

    pub fn root_object(&self) -> Option<&RscLayerObject> {
        self.root.and_then(|id| self.objects.get(&id))
    }

    pub fn get(&self, id: LayerId) -> Option<&RscLayerObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut RscLayerObject> {
        self.objects.get_mut(&id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Every object, in id order.
    pub fn objects(&self) -> impl Iterator<Item = &RscLayerObject> {
        self.objects.values()
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut RscLayerObject> {
        self.objects.values_mut()
    }

    /// Ids reachable from the root, parents before children.
    pub fn breadth_first(&self) -> Vec<LayerId> {
        let mut out = Vec::with_capacity(self.objects.len());
        let mut queue: VecDeque<LayerId> = self.root.into_iter().collect();
        while let Some(id) = queue.pop_front() {
            out.push(id);
            if let Some(obj) = self.objects.get(&id) {
                queue.extend(obj.children.iter().copied());
            }
        }
        out
    }

    /// Add `obj` below `parent`, or as the root when `parent` is `None`.
    pub fn insert(&mut self, mut obj: RscLayerObject, parent: Option<LayerId>) -> DrResult<()> {
        let id = obj.id;
        if self.objects.contains_key(&id) {
            return Err(DrError::implementation(format!(
                "layer object {} already exists in {}",
                id, self.owner
            )));
        }
        if obj.owner != self.owner {
            return Err(DrError::implementation(format!(
                "layer object {} of {} inserted into tree of {}",
                id, obj.owner, self.owner
            )));
        }

        match parent {
            None => {
                if let Some(root) = self.root {
                    return Err(DrError::implementation(format!(
                        "{} already has root layer object {}",
                        self.owner, root
                    )));
                }
                self.root = Some(id);
            }
            Some(pid) => {
                let parent_obj = self.objects.get_mut(&pid).ok_or_else(|| {
                    DrError::implementation(format!(
                        "parent layer object {} missing in {}",
                        pid, self.owner
                    ))
                })?;
                parent_obj.children.insert(id);
            }
        }

        obj.parent = parent;
        obj.children.clear();
        self.objects.insert(id, obj);
        Ok(())
    }

    /// Move `id` below `new_parent`, keeping both sides of the link in step.
    pub fn set_parent(&mut self, id: LayerId, new_parent: Option<LayerId>) -> DrResult<()> {
        let old_parent = self
            .objects
            .get(&id)
            .ok_or_else(|| DrError::implementation(format!("layer object {} missing", id)))?
            .parent;

        if old_parent == new_parent {
            if let Some(pid) = new_parent {
                if let Some(p) = self.objects.get_mut(&pid) {
                    p.children.insert(id);
                }
            }
            return Ok(());
        }

        match new_parent {
            None => {
                if self.root.is_some_and(|root| root != id) {
                    return Err(DrError::implementation(format!(
                        "cannot make {} the root of {}: root already set",
                        id, self.owner
                    )));
                }
            }
            Some(pid) => {
                if !self.objects.contains_key(&pid) {
                    return Err(DrError::implementation(format!(
                        "parent layer object {} missing in {}",
                        pid, self.owner
                    )));
                }
                if self.is_ancestor_or_self(id, pid) {
                    return Err(DrError::implementation(format!(
                        "moving layer object {} below {} would create a cycle",
                        id, pid
                    )));
                }
            }
        }

        match old_parent {
            Some(old) => {
                if let Some(p) = self.objects.get_mut(&old) {
                    p.children.remove(&id);
                }
            }
            None => self.root = None,
        }
        match new_parent {
            Some(pid) => {
                if let Some(p) = self.objects.get_mut(&pid) {
                    p.children.insert(id);
                }
            }
            None => self.root = Some(id),
        }
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.parent = new_parent;
        }
        Ok(())
    }

    /// Remove `id` and everything below it. Returns the removed ids.
    pub fn remove_subtree(&mut self, id: LayerId) -> Vec<LayerId> {
        let Some(obj) = self.objects.get(&id) else {
            return Vec::new();
        };
        match obj.parent {
            Some(pid) => {
                if let Some(p) = self.objects.get_mut(&pid) {
                    p.children.remove(&id);
                }
            }
            None => {
                if self.root == Some(id) {
                    self.root = None;
                }
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(obj) = self.objects.remove(&next) {
                stack.extend(obj.children.iter().copied());
                removed.push(next);
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.objects.clear();
    }

    fn is_ancestor_or_self(&self, ancestor: LayerId, mut id: LayerId) -> bool {
        // Bounded by the number of objects so a corrupt chain cannot spin.
        for _ in 0..=self.objects.len() {
            if id == ancestor {
                return true;
            }
            match self.objects.get(&id).and_then(|o| o.parent) {
                Some(pid) => id = pid,
                None => return false,
            }
        }
        true
    }
}

/// Validate the structural invariants of a finished tree: both sides of
/// every parent link agree, every object belongs to the tree's owner, and
/// every object is reachable from the root.
pub fn check_tree(tree: &LayerTree) -> DrResult<()> {
    let broken = |what: String| {
        Err(DrError::implementation(format!(
            "layer tree of {} is inconsistent: {}",
            tree.owner, what
        )))
    };

    for obj in tree.objects.values() {
        if obj.owner != tree.owner {
            return broken(format!("object {} is owned by {}", obj.id, obj.owner));
        }
        match obj.parent {
            Some(pid) => match tree.objects.get(&pid) {
                Some(parent) if parent.children.contains(&obj.id) => {}
                Some(_) => {
                    return broken(format!("{} is not a child of its parent {}", obj.id, pid));
                }
                None => return broken(format!("parent {} of {} is missing", pid, obj.id)),
            },
            None => {
                if tree.root != Some(obj.id) {
                    return broken(format!("{} has no parent but is not the root", obj.id));
                }
            }
        }
        for child in &obj.children {
            match tree.objects.get(child) {
                Some(c) if c.parent == Some(obj.id) => {}
                _ => return broken(format!("child {} of {} does not point back", child, obj.id)),
            }
        }
    }

    if let Some(root) = tree.root {
        if !tree.objects.contains_key(&root) {
            return broken(format!("root {} is missing", root));
        }
    }
    let reachable = tree.breadth_first().len();
    if reachable != tree.objects.len() {
        return broken(format!(
            "{} of {} objects unreachable from the root",
            tree.objects.len() - reachable,
            tree.objects.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ResourceKey;
    use crate::layer::data::RscLayerData;
    use drover_proto::kind::LayerKind;
    use drover_proto::name::{NodeName, ResourceName, RscSuffix};

    fn owner() -> LayerOwner {
        LayerOwner::Resource(ResourceKey::new(
            NodeName::new("alpha").unwrap(),
            ResourceName::new("r0").unwrap(),
        ))
    }

    fn obj(id: u32, kind: LayerKind) -> RscLayerObject {
        RscLayerObject::new(
            LayerId(id),
            RscSuffix::data(),
            owner(),
            RscLayerData::empty(kind).unwrap(),
        )
    }

    fn three_level() -> LayerTree {
        let mut tree = LayerTree::new(owner());
        tree.insert(obj(1, LayerKind::Luks), None).unwrap();
        tree.insert(obj(2, LayerKind::Writecache), Some(LayerId(1))).unwrap();
        tree.insert(obj(3, LayerKind::Storage), Some(LayerId(2))).unwrap();
        tree
    }

    #[test]
    fn test_insert_links_both_sides() {
        let tree = three_level();
        assert_eq!(tree.root(), Some(LayerId(1)));
        assert!(tree.get(LayerId(1)).unwrap().has_child(LayerId(2)));
        assert_eq!(tree.get(LayerId(3)).unwrap().parent(), Some(LayerId(2)));
        assert_eq!(tree.breadth_first(), vec![LayerId(1), LayerId(2), LayerId(3)]);
        check_tree(&tree).unwrap();
    }

    #[test]
    fn test_second_root_rejected() {
        let mut tree = three_level();
        assert!(tree.insert(obj(9, LayerKind::Storage), None).is_err());
        assert!(tree.insert(obj(3, LayerKind::Storage), Some(LayerId(1))).is_err());
    }

    #[test]
    fn test_set_parent_moves_child() {
        let mut tree = three_level();
        tree.set_parent(LayerId(3), Some(LayerId(1))).unwrap();
        assert!(tree.get(LayerId(1)).unwrap().has_child(LayerId(3)));
        assert!(!tree.get(LayerId(2)).unwrap().has_child(LayerId(3)));
        check_tree(&tree).unwrap();
    }

    #[test]
    fn test_set_parent_rejects_cycle() {
        let mut tree = three_level();
        assert!(tree.set_parent(LayerId(1), Some(LayerId(3))).is_err());
        check_tree(&tree).unwrap();
    }

    #[test]
    fn test_remove_subtree() {
        let mut tree = three_level();
        let mut removed = tree.remove_subtree(LayerId(2));
        removed.sort();
        assert_eq!(removed, vec![LayerId(2), LayerId(3)]);
        assert_eq!(tree.len(), 1);
        assert!(!tree.get(LayerId(1)).unwrap().has_child(LayerId(2)));
        check_tree(&tree).unwrap();
    }

    #[test]
    fn test_check_tree_detects_broken_link() {
        let mut tree = three_level();
        tree.get_mut(LayerId(2)).unwrap().children.clear();
        assert!(check_tree(&tree).is_err());
    }
}
