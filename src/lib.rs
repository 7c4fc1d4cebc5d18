//! Layer-tree engine for visual page builders: flattening, drop-zone
//! classification, move validation, depth projection and tree rebuild.
//!
//! Feature flags:
//! - `keymap`: crossterm-based key bindings and `LayerTreeState::handle_key*` helpers.
//! - `serde`: serde support for layers, drag settings and `LayerTreeSnapshot`.

mod action;
mod classify;
mod edit;
mod error;
mod flatten;
#[cfg(feature = "keymap")]
mod keymap;
mod model;
pub mod prelude;
mod projection;
mod rebuild;
mod state;
mod tree;
mod validate;

pub use action::{LayerAction, LayerEvent};
pub use classify::{Bounds, DropZones, HoverProbe, Placement, classify};
pub use edit::{insert_layer, move_layer, remove_layer};
pub use error::{PlacementError, Result, TreeError};
pub use flatten::{Breakpoint, ByBreakpoint, FlatLayer, Flattened, ResponsiveOrder, flatten};
#[cfg(feature = "keymap")]
pub use keymap::{KeymapProfile, LayerKeyBindings};
pub use model::{
    Layer, LayerId, LayerKind, LayerModel, NoOrder, OrderKey, can_own_children, is_root,
};
pub use projection::{Projection, depth_delta, move_projected, project};
pub use rebuild::{LayerMove, rebuild};
pub use state::{
    CancelReason, DragConfig, DragEnd, DragPhase, DragSession, DropMode, DropTarget,
    LayerTreeSnapshot, LayerTreeState, LockGate, NoLocks, PendingDrop, PointerSample,
};
pub use tree::{LayerNode, LayerTree};
pub use validate::{ResolvedDrop, check_destination, resolve_drop, validate};
