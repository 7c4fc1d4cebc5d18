use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::error::{Result, TreeError};
use crate::flatten::Flattened;
use crate::model::{Layer, LayerId, LayerModel};
use crate::tree::LayerTree;
use crate::validate::ResolvedDrop;

/// A structural move: `id` goes under `parent` before the first remaining
/// sibling whose stored index is `>= index` (or last if there is none).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerMove {
    pub id: LayerId,
    pub parent: LayerId,
    pub index: usize,
}

impl From<ResolvedDrop> for LayerMove {
    fn from(drop: ResolvedDrop) -> Self {
        Self {
            id: drop.dragged,
            parent: drop.parent,
            index: drop.index,
        }
    }
}

#[derive(Clone, Copy)]
struct Entry {
    id: LayerId,
    parent: Option<LayerId>,
    index: usize,
}

/// Rebuilds the nested tree from a flattened sequence, optionally applying a
/// move.
///
/// Subtrees hidden under collapsed rows are carried over from `tree`. The rows
/// must have been flattened from this same snapshot: a row whose parent or
/// stored index disagrees with `tree`, or a layer the rows do not cover, fails
/// with a stale error. Any integrity failure aborts the rebuild; the caller
/// keeps its tree.
pub fn rebuild<P: Clone>(
    tree: &LayerTree<P>,
    flat: &Flattened,
    mv: Option<LayerMove>,
) -> Result<Layer<P>> {
    if flat.truncated() {
        return Err(TreeError::Truncated);
    }
    let mut entries = expand_hidden(tree, flat)?;

    let moved = match mv {
        Some(mv) => Some(apply_move(tree, &mut entries, mv)?),
        None => None,
    };

    let mut groups: FxHashMap<LayerId, SmallVec<[usize; 8]>> =
        FxHashMap::with_capacity_and_hasher(entries.len(), FxBuildHasher);
    let mut roots: SmallVec<[usize; 1]> = SmallVec::new();
    for (pos, entry) in entries.iter().enumerate() {
        if moved.is_some_and(|(moved_pos, _)| moved_pos == pos) {
            continue;
        }
        match entry.parent {
            Some(parent) => groups.entry(parent).or_default().push(pos),
            None => roots.push(pos),
        }
    }
    for members in groups.values_mut() {
        members.sort_by_key(|&pos| entries[pos].index);
    }
    if let Some((moved_pos, mv)) = moved {
        let members = groups.entry(mv.parent).or_default();
        let at = members
            .iter()
            .position(|&pos| entries[pos].index >= mv.index)
            .unwrap_or(members.len());
        members.insert(at, moved_pos);
    }

    let [root_pos] = roots.as_slice() else {
        return Err(TreeError::InvalidRoot {
            id: roots.first().map_or(LayerId::ROOT, |&pos| entries[pos].id),
        });
    };
    let mut builder = Builder {
        tree,
        entries: &entries,
        groups: &groups,
        built: 0,
    };
    let root = builder.build(entries[*root_pos].id)?;
    if builder.built != entries.len() {
        return Err(TreeError::Orphaned {
            count: entries.len() - builder.built,
        });
    }
    Ok(root)
}

/// Turns the visible rows into entries and re-attaches collapsed subtrees.
fn expand_hidden<P>(tree: &LayerTree<P>, flat: &Flattened) -> Result<Vec<Entry>> {
    let mut entries = Vec::with_capacity(tree.len().max(flat.len()));
    let mut seen = FxHashSet::with_capacity_and_hasher(tree.len(), FxBuildHasher);
    let mut stack: Vec<LayerId> = Vec::new();
    for row in flat {
        let Some(node) = tree.get(row.id) else {
            return Err(TreeError::NotFound { id: row.id });
        };
        let stored = match row.parent {
            Some(parent) => tree.children(parent).get(row.index).copied(),
            None => Some(row.id),
        };
        if node.parent() != row.parent || stored != Some(row.id) {
            return Err(TreeError::StaleRow { id: row.id });
        }
        if !seen.insert(row.id) {
            return Err(TreeError::DuplicateId { id: row.id });
        }
        entries.push(Entry {
            id: row.id,
            parent: row.parent,
            index: row.index,
        });
        if !row.collapsed {
            continue;
        }
        stack.push(row.id);
        while let Some(parent) = stack.pop() {
            for (index, &child) in tree.children(parent).iter().enumerate() {
                if !seen.insert(child) {
                    return Err(TreeError::DuplicateId { id: child });
                }
                entries.push(Entry {
                    id: child,
                    parent: Some(parent),
                    index,
                });
                stack.push(child);
            }
        }
    }
    if entries.len() != tree.len() {
        return Err(TreeError::StaleSequence {
            rows: entries.len(),
            layers: tree.len(),
        });
    }
    Ok(entries)
}

fn apply_move<P>(
    tree: &LayerTree<P>,
    entries: &mut [Entry],
    mv: LayerMove,
) -> Result<(usize, LayerMove)> {
    if mv.id.is_root() {
        return Err(TreeError::RootImmovable);
    }
    let pos = entries
        .iter()
        .position(|entry| entry.id == mv.id)
        .ok_or(TreeError::NotFound { id: mv.id })?;
    let Some(parent) = tree.get(mv.parent) else {
        return Err(TreeError::NotFound { id: mv.parent });
    };
    if !parent.kind.can_own_children() {
        return Err(TreeError::ChildrenOnLeaf {
            id: mv.parent,
            count: tree.children(mv.parent).len() + 1,
        });
    }
    if tree.is_ancestor_or_self(mv.id, mv.parent) {
        return Err(TreeError::Cycle {
            id: mv.id,
            parent: mv.parent,
        });
    }
    let entry = &mut entries[pos];
    entry.parent = Some(mv.parent);
    Ok((pos, mv))
}

struct Builder<'a, P> {
    tree: &'a LayerTree<P>,
    entries: &'a [Entry],
    groups: &'a FxHashMap<LayerId, SmallVec<[usize; 8]>>,
    built: usize,
}

impl<P: Clone> Builder<'_, P> {
    fn build(&mut self, id: LayerId) -> Result<Layer<P>> {
        let node = self.tree.get(id).ok_or(TreeError::NotFound { id })?;
        self.built += 1;
        let groups = self.groups;
        let children = match groups.get(&id) {
            Some(members) if !members.is_empty() => {
                if !node.kind.can_own_children() {
                    return Err(TreeError::ChildrenOnLeaf {
                        id,
                        count: members.len(),
                    });
                }
                let mut children = Vec::with_capacity(members.len());
                for &pos in members {
                    children.push(self.build(self.entries[pos].id)?);
                }
                Some(children)
            }
            _ => node.children().map(|_| Vec::new()),
        };
        Ok(Layer {
            id,
            kind: node.kind,
            locked: node.locked,
            children,
            payload: node.payload.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use crate::model::{LayerKind, NoOrder};
    use crate::tree::fixtures::page;
    use rustc_hash::FxHashSet;

    fn child_ids(layer: &Layer, id: u64) -> Vec<u64> {
        layer
            .find(LayerId(id))
            .unwrap()
            .children()
            .iter()
            .map(|child| child.id.0)
            .collect()
    }

    fn collapsed(ids: &[u64]) -> FxHashSet<LayerId> {
        ids.iter().map(|&id| LayerId(id)).collect()
    }

    #[test]
    fn round_trip_without_move() {
        let tree = LayerTree::from_layer(page()).unwrap();
        for set in [vec![], vec![1], vec![1, 2, 3], vec![0]] {
            let flat = flatten(&tree, &collapsed(&set), &NoOrder);
            assert_eq!(rebuild(&tree, &flat, None).unwrap(), page(), "collapsed {set:?}");
        }
    }

    #[test]
    fn moves_leaf_into_sibling_container() {
        let tree = LayerTree::from_layer(page()).unwrap();
        let flat = flatten(&tree, &FxHashSet::default(), &NoOrder);
        // Drop 12 below 21 (the first child of B).
        let mv = LayerMove {
            id: LayerId(12),
            parent: LayerId(2),
            index: 1,
        };
        let out = rebuild(&tree, &flat, Some(mv)).unwrap();

        assert_eq!(child_ids(&out, 1), vec![11, 13]);
        assert_eq!(child_ids(&out, 2), vec![21, 12, 22]);
        assert_eq!(out.find(LayerId(3)), page().find(LayerId(3)));
    }

    #[test]
    fn reorders_within_parent() {
        let tree = LayerTree::from_layer(page()).unwrap();
        let flat = flatten(&tree, &FxHashSet::default(), &NoOrder);
        let down = LayerMove {
            id: LayerId(11),
            parent: LayerId(1),
            index: 2,
        };
        assert_eq!(child_ids(&rebuild(&tree, &flat, Some(down)).unwrap(), 1), vec![12, 11, 13]);

        let up = LayerMove {
            id: LayerId(13),
            parent: LayerId(1),
            index: 0,
        };
        assert_eq!(child_ids(&rebuild(&tree, &flat, Some(up)).unwrap(), 1), vec![13, 11, 12]);

        let last = LayerMove {
            id: LayerId(11),
            parent: LayerId(1),
            index: 3,
        };
        assert_eq!(child_ids(&rebuild(&tree, &flat, Some(last)).unwrap(), 1), vec![12, 13, 11]);
    }

    #[test]
    fn move_to_current_slot_is_identity() {
        let tree = LayerTree::from_layer(page()).unwrap();
        let flat = flatten(&tree, &FxHashSet::default(), &NoOrder);
        for index in [1, 2] {
            let mv = LayerMove {
                id: LayerId(12),
                parent: LayerId(1),
                index,
            };
            assert_eq!(rebuild(&tree, &flat, Some(mv)).unwrap(), page());
        }
    }

    #[test]
    fn moves_subtree_with_its_children() {
        let tree = LayerTree::from_layer(page()).unwrap();
        let flat = flatten(&tree, &collapsed(&[1]), &NoOrder);
        let mv = LayerMove {
            id: LayerId(1),
            parent: LayerId(2),
            index: 2,
        };
        let out = rebuild(&tree, &flat, Some(mv)).unwrap();
        assert_eq!(child_ids(&out, 0), vec![2, 3]);
        assert_eq!(child_ids(&out, 2), vec![21, 22, 1]);
        assert_eq!(child_ids(&out, 1), vec![11, 12, 13]);
    }

    #[test]
    fn inserts_into_collapsed_container() {
        let tree = LayerTree::from_layer(page()).unwrap();
        let flat = flatten(&tree, &collapsed(&[2]), &NoOrder);
        let mv = LayerMove {
            id: LayerId(11),
            parent: LayerId(2),
            index: 2,
        };
        let out = rebuild(&tree, &flat, Some(mv)).unwrap();
        assert_eq!(child_ids(&out, 2), vec![21, 22, 11]);
    }

    #[test]
    fn empty_container_keeps_empty_children() {
        let root = Layer::bare(0, LayerKind::Container).with_children(vec![
            Layer::bare(1, LayerKind::Section).with_children(vec![Layer::bare(2, LayerKind::Text)]),
            Layer::bare(3, LayerKind::Section),
        ]);
        let tree = LayerTree::from_layer(root).unwrap();
        let flat = flatten(&tree, &FxHashSet::default(), &NoOrder);
        let mv = LayerMove {
            id: LayerId(2),
            parent: LayerId(3),
            index: 0,
        };
        let out = rebuild(&tree, &flat, Some(mv)).unwrap();
        assert_eq!(out.find(LayerId(1)).unwrap().children, Some(Vec::new()));
        assert_eq!(out.find(LayerId(2)).unwrap().children, None);
        assert_eq!(child_ids(&out, 3), vec![2]);
    }

    #[test]
    fn integrity_failures_abort() {
        let tree = LayerTree::from_layer(page()).unwrap();
        let flat = flatten(&tree, &FxHashSet::default(), &NoOrder);
        let cases = [
            (
                LayerMove {
                    id: LayerId(99),
                    parent: LayerId(1),
                    index: 0,
                },
                TreeError::NotFound { id: LayerId(99) },
            ),
            (
                LayerMove {
                    id: LayerId(1),
                    parent: LayerId(99),
                    index: 0,
                },
                TreeError::NotFound { id: LayerId(99) },
            ),
            (
                LayerMove {
                    id: LayerId(1),
                    parent: LayerId(1),
                    index: 0,
                },
                TreeError::Cycle {
                    id: LayerId(1),
                    parent: LayerId(1),
                },
            ),
            (
                LayerMove {
                    id: LayerId(12),
                    parent: LayerId(22),
                    index: 0,
                },
                TreeError::ChildrenOnLeaf {
                    id: LayerId(22),
                    count: 1,
                },
            ),
            (
                LayerMove {
                    id: LayerId::ROOT,
                    parent: LayerId(1),
                    index: 0,
                },
                TreeError::RootImmovable,
            ),
        ];
        for (mv, expected) in cases {
            assert_eq!(rebuild(&tree, &flat, Some(mv)), Err(expected));
        }
    }

    #[test]
    fn rows_from_another_tree_are_rejected() {
        let tree = LayerTree::from_layer(page()).unwrap();
        let other = Layer::bare(0, LayerKind::Container)
            .with_children(vec![Layer::bare(77, LayerKind::Text)]);
        let other = LayerTree::from_layer(other).unwrap();
        let flat = flatten(&other, &FxHashSet::default(), &NoOrder);
        assert_eq!(
            rebuild(&tree, &flat, None),
            Err(TreeError::NotFound { id: LayerId(77) })
        );
    }

    #[test]
    fn rows_missing_a_new_layer_are_stale() {
        let before = LayerTree::from_layer(page()).unwrap();
        let flat = flatten(&before, &FxHashSet::default(), &NoOrder);

        // Another editor appended 14 to A after the rows were flattened.
        let mut page = page();
        page.children.as_mut().unwrap()[0]
            .children
            .as_mut()
            .unwrap()
            .push(Layer::bare(14, LayerKind::Image));
        let after = LayerTree::from_layer(page).unwrap();
        let mv = LayerMove {
            id: LayerId(21),
            parent: LayerId(1),
            index: 0,
        };
        assert_eq!(
            rebuild(&after, &flat, Some(mv)),
            Err(TreeError::StaleSequence {
                rows: 10,
                layers: 11
            })
        );
    }

    #[test]
    fn rows_with_shifted_indices_are_stale() {
        let before = LayerTree::from_layer(page()).unwrap();
        let flat = flatten(&before, &FxHashSet::default(), &NoOrder);

        let mut page = page();
        page.children.as_mut().unwrap()[0]
            .children
            .as_mut()
            .unwrap()
            .insert(0, Layer::bare(14, LayerKind::Image));
        let after = LayerTree::from_layer(page).unwrap();
        let err = rebuild(&after, &flat, None).unwrap_err();
        assert_eq!(err, TreeError::StaleRow { id: LayerId(11) });
        assert!(err.is_stale());
    }

    #[test]
    fn rows_from_a_moved_layer_are_stale() {
        let before = LayerTree::from_layer(page()).unwrap();
        let flat = flatten(&before, &FxHashSet::default(), &NoOrder);
        let mv = LayerMove {
            id: LayerId(31),
            parent: LayerId(2),
            index: 2,
        };
        let after = LayerTree::from_layer(rebuild(&before, &flat, Some(mv)).unwrap()).unwrap();
        assert_eq!(
            rebuild(&after, &flat, None),
            Err(TreeError::StaleRow { id: LayerId(31) })
        );
    }
}
