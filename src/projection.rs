//! Depth projection from a continuous horizontal drag offset.
//!
//! An alternative to the zone classifier: the dragged row is placed at the
//! hovered row's position and its depth follows the horizontal offset,
//! clamped to what the neighbouring rows allow.

use smallvec::SmallVec;

use crate::edit::move_layer;
use crate::error::{Result, TreeError};
use crate::flatten::{FlatLayer, Flattened};
use crate::model::{Layer, LayerId};

/// Projected destination of the dragged row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Projection {
    pub depth: u16,
    pub min_depth: u16,
    pub max_depth: u16,
    /// New parent; `None` means the projection left the root container.
    pub parent: Option<LayerId>,
    /// Insertion index among the parent's children once the dragged layer
    /// has been removed.
    pub index: usize,
}

/// Converts a horizontal pointer offset into a signed depth delta.
pub fn depth_delta(offset_x: f32, indent_width: f32) -> i32 {
    if !offset_x.is_finite() || !indent_width.is_finite() || indent_width <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation)]
    let delta = (offset_x / indent_width).round() as i32;
    delta
}

/// Projects where `active` lands when hovering `over` with `depth_delta`.
///
/// The subtree of `active` moves with it, so hovering a row inside that
/// subtree yields `None`. A positive delta over a container-capable row
/// always nests exactly one level inside it.
pub fn project(
    flat: &Flattened,
    active: LayerId,
    over: LayerId,
    depth_delta: i32,
) -> Option<Projection> {
    let active_pos = flat.position(active)?;
    let over_pos = flat.position(over)?;
    let rows = flat.rows();
    let active_row = &rows[active_pos];
    if active.is_root() {
        return None;
    }

    // Lift the active subtree out of the sequence.
    let subtree_end = rows[active_pos + 1..]
        .iter()
        .position(|row| row.depth <= active_row.depth)
        .map_or(rows.len(), |offset| active_pos + 1 + offset);
    if (active_pos + 1..subtree_end).contains(&over_pos) {
        return None;
    }
    let over_row = &rows[over_pos];

    if depth_delta > 0 && over != active && over_row.can_have_children {
        let index = append_index(over_row, active_row);
        return Some(Projection {
            depth: over_row.depth.saturating_add(1),
            min_depth: over_row.depth.saturating_add(1),
            max_depth: over_row.depth.saturating_add(1),
            parent: Some(over),
            index,
        });
    }

    let mut items: SmallVec<[&FlatLayer; 32]> = rows[..active_pos]
        .iter()
        .chain(&rows[subtree_end..])
        .collect();
    let over_index = items.iter().position(|row| row.id == over).unwrap_or(active_pos);
    let over_index = over_index.min(items.len());
    items.insert(over_index, active_row);
    if over_pos > active_pos && over != active {
        // Dragging downwards lands after the hovered row.
        items.swap(over_index, over_index + 1);
    }
    let new_pos = items
        .iter()
        .position(|row| row.id == active)
        .unwrap_or(over_index);

    let previous = new_pos.checked_sub(1).map(|pos| items[pos]);
    let next = items.get(new_pos + 1).copied();

    let max_depth = previous.map_or(0, |row| {
        if row.can_have_children {
            row.depth.saturating_add(1)
        } else {
            row.depth
        }
    });
    // Depth 0 belongs to the root container.
    let min_depth = next.map_or(1, |row| row.depth.max(1));
    if min_depth > max_depth {
        return None;
    }
    let wanted = i64::from(over_row.depth) + i64::from(depth_delta);
    let depth = u16::try_from(wanted.clamp(i64::from(min_depth), i64::from(max_depth)))
        .unwrap_or(max_depth);

    let parent = resolve_parent(&items[..new_pos], depth);
    let index = match parent {
        Some(parent) => insert_index(&items[..new_pos], parent, active_row, flat),
        None => 0,
    };
    Some(Projection {
        depth,
        min_depth,
        max_depth,
        parent,
        index,
    })
}

/// Nearest prior container-capable row one level above `depth`.
fn resolve_parent(before: &[&FlatLayer], depth: u16) -> Option<LayerId> {
    let parent_depth = depth.checked_sub(1)?;
    for row in before.iter().rev() {
        if row.depth < parent_depth {
            return None;
        }
        if row.depth == parent_depth {
            return row.can_have_children.then_some(row.id);
        }
    }
    None
}

fn append_index(parent: &FlatLayer, active: &FlatLayer) -> usize {
    if active.parent == Some(parent.id) {
        parent.child_count.saturating_sub(1)
    } else {
        parent.child_count
    }
}

fn insert_index(
    before: &[&FlatLayer],
    parent: LayerId,
    active: &FlatLayer,
    flat: &Flattened,
) -> usize {
    if let Some(parent_row) = flat.get(parent)
        && parent_row.collapsed
    {
        return append_index(parent_row, active);
    }
    let Some(sibling) = before.iter().rev().find(|row| row.parent == Some(parent)) else {
        return 0;
    };
    let shift = usize::from(active.parent == Some(parent) && active.index < sibling.index);
    sibling.index - shift + 1
}

/// Applies a projection to the nested tree.
pub fn move_projected<P: Clone>(
    root: &Layer<P>,
    active: LayerId,
    projection: &Projection,
) -> Result<Layer<P>> {
    let parent = projection
        .parent
        .ok_or(TreeError::OutsideRoot { id: active })?;
    move_layer(root, active, parent, projection.index)
}
