use thiserror::Error;

use crate::model::LayerId;

pub type Result<T> = std::result::Result<T, TreeError>;

/// Structural integrity and input-shape failures.
///
/// These indicate a programming error or corrupt data. Operations that hit
/// one abort and leave the caller's tree untouched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("root layer must be the reserved container, found {id}")]
    InvalidRoot { id: LayerId },

    #[error("layer {id} appears more than once in the tree")]
    DuplicateId { id: LayerId },

    #[error("layer {id} cannot own children but holds {count}")]
    ChildrenOnLeaf { id: LayerId, count: usize },

    #[error("layer {id} not found")]
    NotFound { id: LayerId },

    #[error("moving {id} under {parent} would create a cycle")]
    Cycle { id: LayerId, parent: LayerId },

    #[error("flattened sequence was truncated by a revisited layer")]
    Truncated,

    #[error("flattened row {id} no longer matches its place in the tree")]
    StaleRow { id: LayerId },

    #[error("flattened sequence covers {rows} layer(s) but the tree holds {layers}")]
    StaleSequence { rows: usize, layers: usize },

    #[error("{count} layer(s) are unreachable from the root after rebuild")]
    Orphaned { count: usize },

    #[error("the root container cannot be moved or removed")]
    RootImmovable,

    #[error("layer {id} would be placed outside the root container")]
    OutsideRoot { id: LayerId },
}

/// Reasons a drop placement is refused.
///
/// Most variants are expected policy outcomes during a drag; see
/// [`PlacementError::is_policy`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("layer {id} not found")]
    NotFound { id: LayerId },

    #[error("layer dropped onto itself")]
    NoOp,

    #[error("cannot nest {dragged} inside itself or its own subtree")]
    IntoOwnSubtree { dragged: LayerId },

    #[error("layer {target} cannot own children")]
    NotAContainer { target: LayerId },

    #[error("placement would leave the root container")]
    OutsideRoot,

    #[error("the root container cannot be moved")]
    RootImmovable,

    #[error("layer {id} is locked")]
    Locked { id: LayerId },

    #[error("layer {id} is locked by another editor")]
    LockedByOther { id: LayerId },

    #[error("placement would move the layer out of its container")]
    Escape,

    #[error("pointer is not over a measurable target")]
    OffTarget,
}

impl TreeError {
    /// Returns `true` when rows were flattened from a different tree snapshot.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleRow { .. } | Self::StaleSequence { .. })
    }
}

impl PlacementError {
    /// Returns `true` for expected, silent rejections (as opposed to lookup
    /// failures that point at a caller bug).
    #[must_use]
    pub const fn is_policy(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_classification() {
        assert!(PlacementError::OutsideRoot.is_policy());
        assert!(PlacementError::LockedByOther { id: LayerId(3) }.is_policy());
        assert!(!PlacementError::NotFound { id: LayerId(3) }.is_policy());
    }

    #[test]
    fn messages_name_layers() {
        let err = TreeError::ChildrenOnLeaf {
            id: LayerId(4),
            count: 2,
        };
        assert_eq!(err.to_string(), "layer #4 cannot own children but holds 2");
    }
}
