#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PlacementError;
use crate::flatten::FlatLayer;
use crate::model::{LayerId, LayerModel};

/// Structural intent of a drop relative to a target layer.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placement {
    Above,
    Below,
    Inside,
}

/// Vertical extent of a rendered row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub top: f32,
    pub height: f32,
}

impl Bounds {
    pub const fn new(top: f32, height: f32) -> Self {
        Self { top, height }
    }
}

/// Edge band sizes, as fractions of the row height.
///
/// A band of `0.15` means the top 15% of the row yields [`Placement::Above`],
/// the bottom 15% [`Placement::Below`] and the rest [`Placement::Inside`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DropZones {
    /// Strong container currently showing its children.
    pub strong_expanded: f32,
    /// Strong container that is empty or collapsed.
    pub strong_empty: f32,
    /// Container-capable kind that is not a strong container.
    pub weak: f32,
}

impl DropZones {
    pub const fn new() -> Self {
        Self {
            strong_expanded: 0.15,
            strong_empty: 0.10,
            weak: 0.20,
        }
    }

    const fn band_for(&self, target: &FlatLayer) -> f32 {
        if target.kind.is_strong_container() {
            if target.shows_children() {
                self.strong_expanded
            } else {
                self.strong_empty
            }
        } else {
            self.weak
        }
    }
}

impl Default for DropZones {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-move classifier input.
#[derive(Clone, Copy, Debug)]
pub struct HoverProbe<'a> {
    /// Row under the pointer.
    pub target: &'a FlatLayer,
    /// Rendered bounds of that row.
    pub bounds: Bounds,
    /// Layer being dragged.
    pub dragged: LayerId,
    /// Pointer offset within the dragged row, captured at gesture start.
    pub grab_offset: f32,
    /// Live pointer position.
    pub pointer_y: f32,
}

impl HoverProbe<'_> {
    /// Pointer position within the target row, in `0.0..=1.0`.
    pub fn relative_y(&self) -> Option<f32> {
        let height = self.bounds.height;
        if !height.is_finite() || height <= 0.0 {
            return None;
        }
        let y = (self.pointer_y + self.grab_offset - self.bounds.top) / height;
        if y.is_nan() {
            return None;
        }
        Some(y.clamp(0.0, 1.0))
    }
}

/// Turns a pointer position over a row into a placement.
///
/// The root container always yields [`Placement::Inside`]. Edge placements
/// that would move the dragged layer out of its own strong container, or to
/// the level above the root container, are refused.
pub fn classify<M>(
    model: &M,
    probe: &HoverProbe<'_>,
    zones: &DropZones,
) -> Result<Placement, PlacementError>
where
    M: LayerModel + ?Sized,
{
    let target = probe.target;
    if target.id.is_root() {
        return Ok(Placement::Inside);
    }
    let relative_y = probe.relative_y().ok_or(PlacementError::OffTarget)?;

    let raw = if target.can_have_children {
        let band = zones.band_for(target);
        if relative_y < band {
            Placement::Above
        } else if relative_y > 1.0 - band {
            Placement::Below
        } else {
            Placement::Inside
        }
    } else if relative_y < 0.5 {
        Placement::Above
    } else {
        Placement::Below
    };

    tracing::trace!(
        target = %target.id,
        dragged = %probe.dragged,
        relative_y,
        placement = ?raw,
        "classified hover"
    );

    if raw == Placement::Inside {
        return Ok(raw);
    }
    if target.parent.is_none() {
        return Err(PlacementError::OutsideRoot);
    }
    if target.kind.is_strong_container() && model.parent(probe.dragged) == Some(target.id) {
        return Err(PlacementError::Escape);
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::{Flattened, flatten};
    use crate::model::{Layer, LayerKind, NoOrder};
    use crate::tree::LayerTree;
    use crate::tree::fixtures::page;
    use rustc_hash::FxHashSet;

    fn setup(collapsed: &[u64]) -> (LayerTree, Flattened) {
        let tree = LayerTree::from_layer(page()).unwrap();
        let collapsed: FxHashSet<_> = collapsed.iter().map(|&id| LayerId(id)).collect();
        let flat = flatten(&tree, &collapsed, &NoOrder);
        (tree, flat)
    }

    fn at(
        tree: &LayerTree,
        flat: &Flattened,
        target: u64,
        dragged: u64,
        fraction: f32,
    ) -> Result<Placement, PlacementError> {
        let probe = HoverProbe {
            target: flat.get(LayerId(target)).unwrap(),
            bounds: Bounds::new(100.0, 40.0),
            dragged: LayerId(dragged),
            grab_offset: 0.0,
            pointer_y: 100.0 + 40.0 * fraction,
        };
        classify(tree, &probe, &DropZones::default())
    }

    #[test]
    fn root_is_always_inside() {
        let (tree, flat) = setup(&[]);
        for fraction in [0.0, 0.01, 0.5, 0.99, 1.0, -3.0, 7.0] {
            assert_eq!(at(&tree, &flat, 0, 12, fraction), Ok(Placement::Inside));
        }
    }

    #[test]
    fn leaf_splits_in_half() {
        let (tree, flat) = setup(&[]);
        assert_eq!(at(&tree, &flat, 21, 12, 0.49), Ok(Placement::Above));
        assert_eq!(at(&tree, &flat, 21, 12, 0.5), Ok(Placement::Below));
        assert_eq!(at(&tree, &flat, 21, 12, 2.0), Ok(Placement::Below));
    }

    #[test]
    fn expanded_strong_container_has_narrow_bands() {
        let (tree, flat) = setup(&[]);
        assert_eq!(at(&tree, &flat, 2, 12, 0.1), Ok(Placement::Above));
        assert_eq!(at(&tree, &flat, 2, 12, 0.2), Ok(Placement::Inside));
        assert_eq!(at(&tree, &flat, 2, 12, 0.8), Ok(Placement::Inside));
        assert_eq!(at(&tree, &flat, 2, 12, 0.9), Ok(Placement::Below));
    }

    #[test]
    fn collapsed_strong_container_has_larger_interior() {
        let (tree, flat) = setup(&[2]);
        assert_eq!(at(&tree, &flat, 2, 12, 0.12), Ok(Placement::Inside));
        assert_eq!(at(&tree, &flat, 2, 12, 0.88), Ok(Placement::Inside));
        assert_eq!(at(&tree, &flat, 2, 12, 0.05), Ok(Placement::Above));
        assert_eq!(at(&tree, &flat, 2, 12, 0.95), Ok(Placement::Below));
    }

    #[test]
    fn weak_container_uses_moderate_bands() {
        let (tree, flat) = setup(&[]);
        assert_eq!(at(&tree, &flat, 3, 12, 0.15), Ok(Placement::Above));
        assert_eq!(at(&tree, &flat, 3, 12, 0.25), Ok(Placement::Inside));
        assert_eq!(at(&tree, &flat, 3, 12, 0.85), Ok(Placement::Below));
    }

    #[test]
    fn grab_offset_shifts_the_hover_point() {
        let (tree, flat) = setup(&[]);
        let probe = HoverProbe {
            target: flat.get(LayerId(21)).unwrap(),
            bounds: Bounds::new(100.0, 40.0),
            dragged: LayerId(12),
            grab_offset: 30.0,
            pointer_y: 100.0,
        };
        assert_eq!(classify(&tree, &probe, &DropZones::default()), Ok(Placement::Below));
    }

    #[test]
    fn edges_of_own_strong_parent_are_refused() {
        let (tree, flat) = setup(&[]);
        assert_eq!(at(&tree, &flat, 1, 12, 0.05), Err(PlacementError::Escape));
        assert_eq!(at(&tree, &flat, 1, 12, 0.95), Err(PlacementError::Escape));
        assert_eq!(at(&tree, &flat, 1, 12, 0.5), Ok(Placement::Inside));
    }

    #[test]
    fn edges_of_own_weak_parent_are_allowed() {
        let (tree, flat) = setup(&[]);
        assert_eq!(at(&tree, &flat, 3, 31, 0.05), Ok(Placement::Above));
    }

    #[test]
    fn edges_of_grandparent_container_are_allowed() {
        let root = Layer::bare(0, LayerKind::Container).with_children(vec![
            Layer::bare(1, LayerKind::Section).with_children(vec![
                Layer::bare(2, LayerKind::Column)
                    .with_children(vec![Layer::bare(3, LayerKind::Text)]),
            ]),
        ]);
        let tree = LayerTree::from_layer(root).unwrap();
        let flat = flatten(&tree, &FxHashSet::default(), &NoOrder);
        // Hovering the grandparent edge is a deliberate move to the page level.
        assert_eq!(at(&tree, &flat, 1, 3, 0.02), Ok(Placement::Above));
        // The direct parent is still guarded.
        assert_eq!(at(&tree, &flat, 2, 3, 0.02), Err(PlacementError::Escape));
    }

    #[test]
    fn cross_container_edges_are_allowed() {
        let (tree, flat) = setup(&[]);
        assert_eq!(at(&tree, &flat, 2, 12, 0.05), Ok(Placement::Above));
        assert_eq!(at(&tree, &flat, 22, 12, 0.9), Ok(Placement::Below));
    }

    #[test]
    fn degenerate_bounds_are_off_target() {
        let (tree, flat) = setup(&[]);
        let probe = HoverProbe {
            target: flat.get(LayerId(21)).unwrap(),
            bounds: Bounds::new(0.0, 0.0),
            dragged: LayerId(12),
            grab_offset: 0.0,
            pointer_y: 5.0,
        };
        assert_eq!(
            classify(&tree, &probe, &DropZones::default()),
            Err(PlacementError::OffTarget)
        );
    }
}
