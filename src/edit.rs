//! Pure structural primitives on the nested form.
//!
//! Each function takes the current tree by reference and returns a new tree;
//! the input is never modified.

use rustc_hash::{FxBuildHasher, FxHashSet};

use crate::error::{Result, TreeError};
use crate::model::{Layer, LayerId};

/// Removes a layer (with its subtree) from wherever it sits.
///
/// Returns the new tree and the removed subtree.
pub fn remove_layer<P: Clone>(root: &Layer<P>, id: LayerId) -> Result<(Layer<P>, Layer<P>)> {
    if id == root.id {
        return Err(TreeError::RootImmovable);
    }
    let mut tree = root.clone();
    let removed = take(&mut tree, id).ok_or(TreeError::NotFound { id })?;
    Ok((tree, removed))
}

/// Inserts `node` as a child of `parent` at `index` (clamped to the child count).
///
/// The ids of `node`'s subtree must not already occur in `root`.
pub fn insert_layer<P: Clone>(
    root: &Layer<P>,
    node: Layer<P>,
    parent: LayerId,
    index: usize,
) -> Result<Layer<P>> {
    let mut existing = FxHashSet::with_capacity_and_hasher(root.subtree_len(), FxBuildHasher);
    collect_ids(root, &mut existing);
    if let Some(id) = first_shared_id(&node, &existing) {
        return Err(TreeError::DuplicateId { id });
    }
    let mut tree = root.clone();
    let target = find_mut(&mut tree, parent).ok_or(TreeError::NotFound { id: parent })?;
    if !target.kind.can_own_children() {
        return Err(TreeError::ChildrenOnLeaf {
            id: parent,
            count: target.children().len() + 1,
        });
    }
    let children = target.children.get_or_insert_with(Vec::new);
    let index = index.min(children.len());
    children.insert(index, node);
    Ok(tree)
}

/// Moves a layer under `parent` at `index`, counted after the layer has been
/// removed from its current position.
pub fn move_layer<P: Clone>(
    root: &Layer<P>,
    id: LayerId,
    parent: LayerId,
    index: usize,
) -> Result<Layer<P>> {
    let (tree, node) = remove_layer(root, id)?;
    if node.find(parent).is_some() {
        return Err(TreeError::Cycle { id, parent });
    }
    let mut tree = tree;
    let target = find_mut(&mut tree, parent).ok_or(TreeError::NotFound { id: parent })?;
    if !target.kind.can_own_children() {
        return Err(TreeError::ChildrenOnLeaf {
            id: parent,
            count: target.children().len() + 1,
        });
    }
    let children = target.children.get_or_insert_with(Vec::new);
    let index = index.min(children.len());
    children.insert(index, node);
    Ok(tree)
}

fn take<P>(layer: &mut Layer<P>, id: LayerId) -> Option<Layer<P>> {
    let children = layer.children.as_mut()?;
    if let Some(pos) = children.iter().position(|child| child.id == id) {
        return Some(children.remove(pos));
    }
    children.iter_mut().find_map(|child| take(child, id))
}

fn find_mut<P>(layer: &mut Layer<P>, id: LayerId) -> Option<&mut Layer<P>> {
    if layer.id == id {
        return Some(layer);
    }
    layer
        .children
        .as_mut()?
        .iter_mut()
        .find_map(|child| find_mut(child, id))
}

fn collect_ids<P>(layer: &Layer<P>, out: &mut FxHashSet<LayerId>) {
    out.insert(layer.id);
    for child in layer.children() {
        collect_ids(child, out);
    }
}

fn first_shared_id<P>(layer: &Layer<P>, existing: &FxHashSet<LayerId>) -> Option<LayerId> {
    if existing.contains(&layer.id) {
        return Some(layer.id);
    }
    layer
        .children()
        .iter()
        .find_map(|child| first_shared_id(child, existing))
}
