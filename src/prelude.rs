pub use crate::{
    Bounds, DragConfig, DragEnd, DropMode, DropZones, Layer, LayerAction, LayerEvent, LayerId,
    LayerKind, LayerModel, LayerTree, LayerTreeSnapshot, LayerTreeState, LockGate, NoLocks,
    NoOrder, OrderKey, Placement, PlacementError, PointerSample, TreeError,
};

#[cfg(feature = "keymap")]
pub use crate::{KeymapProfile, LayerKeyBindings};
