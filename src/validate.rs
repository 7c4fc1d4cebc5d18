use crate::classify::Placement;
use crate::error::PlacementError;
use crate::model::{LayerId, LayerModel};

/// Placement resolved to a destination parent and stored insertion index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedDrop {
    pub dragged: LayerId,
    pub target: LayerId,
    pub placement: Placement,
    pub parent: LayerId,
    /// Insertion index among the parent's children, in stored (pre-move)
    /// index space.
    pub index: usize,
}

/// Resolves a placement to `(parent, index)`.
///
/// `Above` inserts at the target's index, `Below` right after it and `Inside`
/// appends to the target's children. The parent is `None` when the target is
/// the root container and the placement is an edge.
pub fn resolve_drop<M>(
    model: &M,
    target: LayerId,
    placement: Placement,
) -> Result<(Option<LayerId>, usize), PlacementError>
where
    M: LayerModel + ?Sized,
{
    if !model.contains(target) {
        return Err(PlacementError::NotFound { id: target });
    }
    Ok(match placement {
        Placement::Inside => (Some(target), model.children(target).len()),
        Placement::Above | Placement::Below => {
            let Some(parent) = model.parent(target) else {
                return Ok((None, 0));
            };
            let index = model.index_in_parent(target).unwrap_or(0);
            let index = if placement == Placement::Below {
                index + 1
            } else {
                index
            };
            (Some(parent), index)
        }
    })
}

/// Checks a drop against the structural rules.
///
/// Checks run in order and stop at the first failure: unknown ids, drop onto
/// itself, drop into its own subtree, `Inside` a non-container, destination
/// outside the root container. Moving the root container and edits touching
/// `locked` layers are refused afterwards.
pub fn validate<M>(
    model: &M,
    dragged: LayerId,
    target: LayerId,
    placement: Placement,
) -> Result<ResolvedDrop, PlacementError>
where
    M: LayerModel + ?Sized,
{
    if !model.contains(dragged) {
        return Err(PlacementError::NotFound { id: dragged });
    }
    if !model.contains(target) {
        return Err(PlacementError::NotFound { id: target });
    }
    if dragged == target {
        return Err(PlacementError::NoOp);
    }
    if model.is_ancestor_or_self(dragged, target) {
        return Err(PlacementError::IntoOwnSubtree { dragged });
    }
    if placement == Placement::Inside && !model.can_have_children(target) {
        return Err(PlacementError::NotAContainer { target });
    }
    let (parent, index) = resolve_drop(model, target, placement)?;
    let Some(parent) = parent else {
        return Err(PlacementError::OutsideRoot);
    };
    check_destination(model, dragged, parent)?;
    Ok(ResolvedDrop {
        dragged,
        target,
        placement,
        parent,
        index,
    })
}

/// Checks that `dragged` may be re-parented under `parent`.
///
/// Shared by both placement strategies: the zone classifier reaches it
/// through [`validate`], the projection engine calls it directly.
pub fn check_destination<M>(
    model: &M,
    dragged: LayerId,
    parent: LayerId,
) -> Result<(), PlacementError>
where
    M: LayerModel + ?Sized,
{
    if !model.contains(parent) {
        return Err(PlacementError::NotFound { id: parent });
    }
    if dragged.is_root() {
        return Err(PlacementError::RootImmovable);
    }
    if model.is_ancestor_or_self(dragged, parent) {
        return Err(PlacementError::IntoOwnSubtree { dragged });
    }
    if !model.can_have_children(parent) {
        return Err(PlacementError::NotAContainer { target: parent });
    }
    if model.is_locked(dragged) {
        return Err(PlacementError::Locked { id: dragged });
    }
    if model.is_locked(parent) {
        return Err(PlacementError::Locked { id: parent });
    }
    if let Some(old_parent) = model.parent(dragged)
        && old_parent != parent
        && model.is_locked(old_parent)
    {
        return Err(PlacementError::Locked { id: old_parent });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Layer, LayerKind};
    use crate::tree::LayerTree;
    use crate::tree::fixtures::page;

    fn tree() -> LayerTree {
        LayerTree::from_layer(page()).unwrap()
    }

    #[test]
    fn resolves_edges_and_inside() {
        let tree = tree();
        assert_eq!(
            resolve_drop(&tree, LayerId(21), Placement::Above),
            Ok((Some(LayerId(2)), 0))
        );
        assert_eq!(
            resolve_drop(&tree, LayerId(21), Placement::Below),
            Ok((Some(LayerId(2)), 1))
        );
        assert_eq!(
            resolve_drop(&tree, LayerId(2), Placement::Inside),
            Ok((Some(LayerId(2)), 2))
        );
        assert_eq!(resolve_drop(&tree, LayerId::ROOT, Placement::Above), Ok((None, 0)));
    }

    #[test]
    fn accepts_cross_container_move() {
        let drop = validate(&tree(), LayerId(12), LayerId(21), Placement::Below).unwrap();
        assert_eq!(drop.parent, LayerId(2));
        assert_eq!(drop.index, 1);
    }

    #[test]
    fn rejects_drop_on_itself() {
        for placement in [Placement::Above, Placement::Below, Placement::Inside] {
            assert_eq!(
                validate(&tree(), LayerId(1), LayerId(1), placement),
                Err(PlacementError::NoOp)
            );
        }
    }

    #[test]
    fn rejects_nesting_into_own_subtree() {
        for placement in [Placement::Above, Placement::Below, Placement::Inside] {
            assert_eq!(
                validate(&tree(), LayerId(1), LayerId(12), placement),
                Err(PlacementError::IntoOwnSubtree {
                    dragged: LayerId(1)
                })
            );
        }
    }

    #[test]
    fn rejects_inside_leaf() {
        assert_eq!(
            validate(&tree(), LayerId(12), LayerId(22), Placement::Inside),
            Err(PlacementError::NotAContainer {
                target: LayerId(22)
            })
        );
    }

    #[test]
    fn rejects_edges_of_root() {
        assert_eq!(
            validate(&tree(), LayerId(12), LayerId::ROOT, Placement::Below),
            Err(PlacementError::OutsideRoot)
        );
        assert!(validate(&tree(), LayerId(12), LayerId::ROOT, Placement::Inside).is_ok());
    }

    #[test]
    fn root_cannot_be_dragged() {
        // The root contains every layer, so the subtree rule fires first.
        assert_eq!(
            validate(&tree(), LayerId::ROOT, LayerId(1), Placement::Inside),
            Err(PlacementError::IntoOwnSubtree {
                dragged: LayerId::ROOT
            })
        );
    }

    #[test]
    fn unknown_ids_are_not_found() {
        assert_eq!(
            validate(&tree(), LayerId(99), LayerId(1), Placement::Inside),
            Err(PlacementError::NotFound { id: LayerId(99) })
        );
    }

    #[test]
    fn destination_checks() {
        let tree = tree();
        assert_eq!(check_destination(&tree, LayerId(12), LayerId(2)), Ok(()));
        assert_eq!(
            check_destination(&tree, LayerId(1), LayerId(1)),
            Err(PlacementError::IntoOwnSubtree {
                dragged: LayerId(1)
            })
        );
        assert_eq!(
            check_destination(&tree, LayerId(12), LayerId(21)),
            Err(PlacementError::NotAContainer {
                target: LayerId(21)
            })
        );
        assert_eq!(
            check_destination(&tree, LayerId::ROOT, LayerId(2)),
            Err(PlacementError::RootImmovable)
        );
    }

    #[test]
    fn locked_layers_block_structural_edits() {
        let root = Layer::bare(0, LayerKind::Container).with_children(vec![
            Layer::bare(1, LayerKind::Section)
                .locked(true)
                .with_children(vec![Layer::bare(11, LayerKind::Text)]),
            Layer::bare(2, LayerKind::Section).with_children(vec![
                Layer::bare(21, LayerKind::Text).locked(true),
                Layer::bare(22, LayerKind::Text),
            ]),
        ]);
        let tree = LayerTree::from_layer(root).unwrap();

        assert_eq!(
            validate(&tree, LayerId(22), LayerId(1), Placement::Inside),
            Err(PlacementError::Locked { id: LayerId(1) })
        );
        assert_eq!(
            validate(&tree, LayerId(21), LayerId(22), Placement::Below),
            Err(PlacementError::Locked { id: LayerId(21) })
        );
        assert_eq!(
            validate(&tree, LayerId(11), LayerId(22), Placement::Below),
            Err(PlacementError::Locked { id: LayerId(1) })
        );
        // Reordering around a locked sibling is fine.
        assert!(validate(&tree, LayerId(22), LayerId(21), Placement::Above).is_ok());
    }
}
