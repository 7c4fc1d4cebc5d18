use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::model::{LayerId, LayerKind, LayerModel, OrderKey};
use crate::tree::LayerTree;

/// One row of the linear view of the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatLayer {
    pub id: LayerId,
    pub kind: LayerKind,
    pub depth: u16,
    pub parent: Option<LayerId>,
    /// Stored sibling index (unaffected by visual-order overrides).
    pub index: usize,
    /// The node is collapsed and its children are omitted from the sequence.
    pub collapsed: bool,
    pub can_have_children: bool,
    pub child_count: usize,
}

impl FlatLayer {
    /// Returns `true` if the row's children follow it in the sequence.
    #[inline]
    pub const fn shows_children(&self) -> bool {
        self.child_count > 0 && !self.collapsed
    }
}

/// Depth-first linearization of a tree with a fast id lookup.
#[derive(Clone, Debug, Default)]
pub struct Flattened {
    rows: Vec<FlatLayer>,
    index: FxHashMap<LayerId, usize>,
    truncated: bool,
}

impl Flattened {
    pub fn rows(&self) -> &[FlatLayer] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the row of a visible layer.
    pub fn get(&self, id: LayerId) -> Option<&FlatLayer> {
        self.position(id).and_then(|pos| self.rows.get(pos))
    }

    /// Returns the sequence position of a visible layer.
    pub fn position(&self, id: LayerId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Returns `true` if a revisited id cut the traversal short.
    ///
    /// This means the model is not a proper tree; the caller decides how to
    /// surface it.
    pub const fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FlatLayer> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a Flattened {
    type Item = &'a FlatLayer;
    type IntoIter = std::slice::Iter<'a, FlatLayer>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Linearizes `model` depth-first, skipping the subtrees of collapsed nodes.
///
/// Sibling groups where `order` yields at least one override are presented in
/// override order (stable; missing overrides rank as `0`).
pub fn flatten<M, O>(model: &M, collapsed: &FxHashSet<LayerId>, order: &O) -> Flattened
where
    M: LayerModel + ?Sized,
    O: OrderKey<M> + ?Sized,
{
    let hint = model.size_hint();
    let mut out = Flattened {
        rows: Vec::with_capacity(hint),
        index: FxHashMap::with_capacity_and_hasher(hint, FxBuildHasher),
        truncated: false,
    };
    let Some(root) = model.root() else {
        return out;
    };
    let mut walker = Walker {
        model,
        collapsed,
        order,
        visited: FxHashSet::with_capacity_and_hasher(hint, FxBuildHasher),
        out: &mut out,
    };
    walker.visit(root, 0, None, 0);
    if out.truncated {
        tracing::warn!(rows = out.rows.len(), "layer tree revisits a node; flatten truncated");
    }
    out
}

struct Walker<'a, M: ?Sized, O: ?Sized> {
    model: &'a M,
    collapsed: &'a FxHashSet<LayerId>,
    order: &'a O,
    visited: FxHashSet<LayerId>,
    out: &'a mut Flattened,
}

impl<M, O> Walker<'_, M, O>
where
    M: LayerModel + ?Sized,
    O: OrderKey<M> + ?Sized,
{
    fn visit(&mut self, id: LayerId, depth: u16, parent: Option<LayerId>, index: usize) {
        if !self.visited.insert(id) {
            self.out.truncated = true;
            return;
        }
        let Some(kind) = self.model.kind(id) else {
            self.out.truncated = true;
            return;
        };
        let children = self.model.children(id);
        let collapsed = !children.is_empty() && self.collapsed.contains(&id);
        let pos = self.out.rows.len();
        self.out.rows.push(FlatLayer {
            id,
            kind,
            depth,
            parent,
            index,
            collapsed,
            can_have_children: kind.can_own_children(),
            child_count: children.len(),
        });
        self.out.index.insert(id, pos);
        if collapsed {
            return;
        }

        let mut group: SmallVec<[(i32, usize, LayerId); 8]> = children
            .iter()
            .copied()
            .enumerate()
            .map(|(idx, child)| (0, idx, child))
            .collect();
        let mut overridden = false;
        for entry in &mut group {
            if let Some(rank) = self.order.order(self.model, entry.2) {
                entry.0 = rank;
                overridden = true;
            }
        }
        if overridden {
            group.sort_by_key(|&(rank, _, _)| rank);
        }
        for (_, idx, child) in group {
            self.visit(child, depth.saturating_add(1), Some(id), idx);
        }
    }
}

/// Responsive breakpoint selecting which visual-order override applies.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Breakpoint {
    #[default]
    Desktop,
    Tablet,
    Mobile,
}

/// Payloads that carry per-breakpoint visual-order overrides.
pub trait ResponsiveOrder {
    fn visual_order(&self, breakpoint: Breakpoint) -> Option<i32>;
}

/// Order key reading [`ResponsiveOrder`] payloads at one breakpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByBreakpoint(pub Breakpoint);

impl<P: ResponsiveOrder> OrderKey<LayerTree<P>> for ByBreakpoint {
    fn order(&self, model: &LayerTree<P>, id: LayerId) -> Option<i32> {
        model.payload(id)?.visual_order(self.0)
    }
}
