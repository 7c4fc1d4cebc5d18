use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::error::{Result, TreeError};
use crate::model::{Layer, LayerId, LayerKind, LayerModel};

/// Arena entry: a layer without its nested children.
#[derive(Clone, Debug)]
pub struct LayerNode<P> {
    pub id: LayerId,
    pub kind: LayerKind,
    pub locked: bool,
    pub payload: P,
    parent: Option<LayerId>,
    children: Option<Vec<LayerId>>,
}

impl<P> LayerNode<P> {
    /// Parent id (`None` only for the root container).
    pub const fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    /// Child ids, or `None` for kinds that cannot own children.
    pub fn children(&self) -> Option<&[LayerId]> {
        self.children.as_deref()
    }
}

/// Page tree stored as an arena keyed by id with a parent side index.
///
/// The nested [`Layer`] form is the external representation; this type is the
/// authoritative snapshot the engine reads. It is immutable: structural
/// operations produce a new nested tree, which the caller turns back into a
/// `LayerTree` with [`LayerTree::from_layer`].
#[derive(Clone, Debug)]
pub struct LayerTree<P = ()> {
    nodes: FxHashMap<LayerId, LayerNode<P>>,
}

impl<P> LayerTree<P> {
    /// Builds the arena from a nested tree, checking the structural invariants.
    pub fn from_layer(root: Layer<P>) -> Result<Self> {
        if !root.id.is_root() || !root.kind.can_own_children() {
            return Err(TreeError::InvalidRoot { id: root.id });
        }
        let capacity = root.subtree_len();
        let mut nodes = FxHashMap::with_capacity_and_hasher(capacity, FxBuildHasher);
        let mut stack = vec![(None, root)];
        while let Some((parent, layer)) = stack.pop() {
            let Layer {
                id,
                kind,
                locked,
                children,
                payload,
            } = layer;
            if parent.is_some() && id.is_root() {
                return Err(TreeError::InvalidRoot { id });
            }
            if let Some(children) = &children
                && !children.is_empty()
                && !kind.can_own_children()
            {
                return Err(TreeError::ChildrenOnLeaf {
                    id,
                    count: children.len(),
                });
            }
            let child_ids = children
                .as_ref()
                .map(|children| children.iter().map(|child| child.id).collect());
            let node = LayerNode {
                id,
                kind,
                locked,
                payload,
                parent,
                children: child_ids,
            };
            if nodes.insert(id, node).is_some() {
                return Err(TreeError::DuplicateId { id });
            }
            if let Some(children) = children {
                stack.extend(children.into_iter().rev().map(|child| (Some(id), child)));
            }
        }
        Ok(Self { nodes })
    }

    /// Returns the arena entry of a layer.
    pub fn get(&self, id: LayerId) -> Option<&LayerNode<P>> {
        self.nodes.get(&id)
    }

    /// Returns the opaque payload of a layer.
    pub fn payload(&self, id: LayerId) -> Option<&P> {
        self.nodes.get(&id).map(|node| &node.payload)
    }

    /// Number of layers, including the root container.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a valid tree holds at least the root container.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth of a layer (the root container is at depth 0).
    pub fn depth(&self, id: LayerId) -> Option<usize> {
        let mut node = self.nodes.get(&id)?;
        let mut depth = 0;
        while let Some(parent) = node.parent {
            node = self.nodes.get(&parent)?;
            depth += 1;
        }
        Some(depth)
    }

    /// Iterates over the ids of a layer's ancestors, nearest first.
    pub fn ancestors(&self, id: LayerId) -> impl Iterator<Item = LayerId> + '_ {
        let mut current = self.nodes.get(&id).and_then(|node| node.parent);
        std::iter::from_fn(move || {
            let id = current?;
            current = self.nodes.get(&id).and_then(|node| node.parent);
            Some(id)
        })
    }
}

impl<P> LayerTree<P> {
    /// Consumes the arena and returns the nested form, moving payloads out.
    pub fn into_layer(mut self) -> Result<Layer<P>> {
        take_subtree(&mut self.nodes, LayerId::ROOT)
            .ok_or(TreeError::InvalidRoot { id: LayerId::ROOT })
    }
}

fn take_subtree<P>(
    nodes: &mut FxHashMap<LayerId, LayerNode<P>>,
    id: LayerId,
) -> Option<Layer<P>> {
    let node = nodes.remove(&id)?;
    let children = node.children.map(|children| {
        children
            .into_iter()
            .filter_map(|child| take_subtree(nodes, child))
            .collect()
    });
    Some(Layer {
        id: node.id,
        kind: node.kind,
        locked: node.locked,
        children,
        payload: node.payload,
    })
}

impl<P: Clone> LayerTree<P> {
    /// Rebuilds the nested form of the whole tree.
    pub fn to_layer(&self) -> Result<Layer<P>> {
        self.subtree(LayerId::ROOT)
            .ok_or(TreeError::InvalidRoot { id: LayerId::ROOT })
    }

    /// Rebuilds the nested form of a subtree.
    pub fn subtree(&self, id: LayerId) -> Option<Layer<P>> {
        let node = self.nodes.get(&id)?;
        let children = node.children.as_ref().map(|children| {
            children
                .iter()
                .filter_map(|&child| self.subtree(child))
                .collect()
        });
        Some(Layer {
            id: node.id,
            kind: node.kind,
            locked: node.locked,
            children,
            payload: node.payload.clone(),
        })
    }
}

impl<P> LayerModel for LayerTree<P> {
    fn root(&self) -> Option<LayerId> {
        self.nodes.contains_key(&LayerId::ROOT).then_some(LayerId::ROOT)
    }

    fn children(&self, id: LayerId) -> &[LayerId] {
        self.nodes
            .get(&id)
            .and_then(|node| node.children.as_deref())
            .unwrap_or(&[])
    }

    fn contains(&self, id: LayerId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn kind(&self, id: LayerId) -> Option<LayerKind> {
        self.nodes.get(&id).map(|node| node.kind)
    }

    fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    fn is_locked(&self, id: LayerId) -> bool {
        self.nodes.get(&id).is_some_and(|node| node.locked)
    }

    fn size_hint(&self) -> usize {
        self.nodes.len()
    }
}

impl<P> TryFrom<Layer<P>> for LayerTree<P> {
    type Error = TreeError;

    fn try_from(root: Layer<P>) -> Result<Self> {
        Self::from_layer(root)
    }
}
