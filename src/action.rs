/// Commands a user or application can issue against the layer panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerAction<Custom = ()> {
    /// Move selection to the previous visible row.
    SelectPrev,
    /// Move selection to the next visible row.
    SelectNext,
    /// Move selection to the parent layer.
    SelectParent,
    /// Select the first visible row.
    SelectFirst,
    /// Select the last visible row.
    SelectLast,
    /// Collapse or expand the selected layer.
    ToggleCollapse,
    /// Collapse every layer that has children.
    CollapseAll,
    /// Expand every layer.
    ExpandAll,
    /// Abort the active drag gesture.
    CancelDrag,
    /// Swap the selected layer with its previous sibling.
    MoveUp,
    /// Swap the selected layer with its next sibling.
    MoveDown,
    /// Nest the selected layer one level deeper, under the row above it.
    Indent,
    /// Move the selected layer out of its parent, right below it.
    Outdent,
    /// Custom action forwarded to the caller without internal handling.
    Custom(Custom),
}

impl<C> LayerAction<C> {
    /// Returns `true` for actions that change the tree structure.
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::MoveUp | Self::MoveDown | Self::Indent | Self::Outdent)
    }
}

/// Result of handling an action or key event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerEvent<Custom = ()> {
    /// The action was handled internally and state was updated.
    Handled,
    /// The action was ignored (e.g., nothing selected / nothing to do).
    Unhandled,
    /// The action is forwarded to the caller for handling.
    Action(LayerAction<Custom>),
}
