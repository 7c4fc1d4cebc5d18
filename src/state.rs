use rustc_hash::{FxBuildHasher, FxHashSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::action::{LayerAction, LayerEvent};
use crate::classify::{Bounds, DropZones, HoverProbe, Placement, classify};
use crate::error::{PlacementError, TreeError};
use crate::flatten::{Flattened, flatten};
use crate::model::{Layer, LayerId, LayerModel, NoOrder, OrderKey};
use crate::projection::{Projection, depth_delta, move_projected, project};
use crate::rebuild::rebuild;
use crate::tree::LayerTree;
use crate::validate::{ResolvedDrop, check_destination, validate};

#[cfg(feature = "keymap")]
use crate::keymap::LayerKeyBindings;
#[cfg(feature = "keymap")]
use crossterm::event::KeyEvent;

/// Collaboration gate: reports layers currently held by another editor.
pub trait LockGate {
    fn is_locked_by_other(&self, id: LayerId) -> bool;
}

impl<F> LockGate for F
where
    F: Fn(LayerId) -> bool,
{
    #[inline]
    fn is_locked_by_other(&self, id: LayerId) -> bool {
        self(id)
    }
}

/// Gate for single-user editing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLocks;

impl LockGate for NoLocks {
    #[inline]
    fn is_locked_by_other(&self, _id: LayerId) -> bool {
        false
    }
}

/// Placement strategy used for a gesture.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DropMode {
    /// Discrete above/below/inside zones from the pointer's vertical position.
    #[default]
    Zones,
    /// Depth follows the horizontal drag offset.
    Projection,
}

/// Drag interaction settings.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragConfig {
    /// Pointer travel (in pixels) before a press turns into a drag.
    pub threshold: f32,
    pub zones: DropZones,
    pub mode: DropMode,
    /// Horizontal pixels per depth level in projection mode.
    pub indent_width: f32,
}

impl DragConfig {
    pub const fn new() -> Self {
        Self {
            threshold: 4.0,
            zones: DropZones::new(),
            mode: DropMode::Zones,
            indent_width: 16.0,
        }
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: DropMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn with_zones(mut self, zones: DropZones) -> Self {
        self.zones = zones;
        self
    }

    #[must_use]
    pub const fn with_indent_width(mut self, indent_width: f32) -> Self {
        self.indent_width = indent_width;
        self
    }
}

impl Default for DragConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Pointer position with the row under it, already hit-tested by the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    /// Hovered row and its bounds; `None` outside any droppable region.
    pub over: Option<(LayerId, Bounds)>,
}

impl PointerSample {
    pub const fn over(id: LayerId, bounds: Bounds, x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            over: Some((id, bounds)),
        }
    }

    pub const fn outside(x: f32, y: f32) -> Self {
        Self { x, y, over: None }
    }
}

/// Accepted drop destination for the current pointer position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropTarget {
    Zone(ResolvedDrop),
    Projected {
        over: LayerId,
        projection: Projection,
    },
}

impl DropTarget {
    /// Hovered layer.
    pub const fn over(&self) -> LayerId {
        match self {
            Self::Zone(drop) => drop.target,
            Self::Projected { over, .. } => *over,
        }
    }

    /// Destination parent.
    pub const fn parent(&self) -> Option<LayerId> {
        match self {
            Self::Zone(drop) => Some(drop.parent),
            Self::Projected { projection, .. } => projection.parent,
        }
    }
}

/// Live state of an active drag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragSession {
    pub dragged: LayerId,
    pub hovered: Option<LayerId>,
    pub placement: Option<Placement>,
    pub grab_offset: f32,
    pub mode: DropMode,
    origin_x: f32,
    target: Option<DropTarget>,
}

impl DragSession {
    pub const fn target(&self) -> Option<DropTarget> {
        self.target
    }
}

/// Gesture lifecycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragPhase {
    Idle,
    /// Pointer is down but has not travelled past the drag threshold.
    Pressed {
        id: LayerId,
        x: f32,
        y: f32,
        grab_offset: f32,
    },
    Dragging(DragSession),
    /// Released with a valid target; waiting for [`LayerTreeState::resolve`].
    Resolving,
}

/// A released gesture awaiting its commit.
#[derive(Debug)]
#[must_use = "a pending drop blocks new gestures until it is resolved"]
pub struct PendingDrop {
    gesture: u64,
    dragged: LayerId,
    target: DropTarget,
}

impl PendingDrop {
    pub const fn dragged(&self) -> LayerId {
        self.dragged
    }

    pub const fn target(&self) -> DropTarget {
        self.target
    }
}

/// How a gesture ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragEnd {
    /// Exactly one new tree was handed to the commit callback.
    Committed,
    /// Released before the drag threshold: a plain selection click.
    Clicked(LayerId),
    /// No mutation happened.
    Cancelled(CancelReason),
    /// No gesture was in progress.
    Ignored,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// Released without a valid drop target.
    NoTarget,
    /// Cancelled explicitly.
    Aborted,
    /// The pending drop no longer belongs to the current gesture.
    Stale,
    Rejected(PlacementError),
    Integrity(TreeError),
}

/// Layer panel state: collapsed layers, selection, flattened-row cache and
/// the drag gesture.
pub struct LayerTreeState {
    collapsed: FxHashSet<LayerId>,
    // Cached rows to avoid re-flattening on every pointer move.
    flat: Flattened,
    // Marks whether `flat` must be rebuilt.
    dirty: bool,
    selected: Option<LayerId>,
    config: DragConfig,
    phase: DragPhase,
    gesture: u64,
    #[cfg(feature = "keymap")]
    keymap: LayerKeyBindings,
}

/// Snapshot of view state (collapsed layers and selection).
///
/// With the `serde` feature enabled, this type derives `Serialize`/`Deserialize`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerTreeSnapshot {
    /// Collapsed layers, sorted by id.
    pub collapsed: Vec<LayerId>,
    pub selected: Option<LayerId>,
}

impl Default for LayerTreeState {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerTreeState {
    /// Creates a new empty state with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a state with preallocated capacity for the given number of layers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            collapsed: FxHashSet::with_capacity_and_hasher(capacity, FxBuildHasher),
            flat: Flattened::default(),
            dirty: true,
            selected: None,
            config: DragConfig::new(),
            phase: DragPhase::Idle,
            gesture: 0,
            #[cfg(feature = "keymap")]
            keymap: LayerKeyBindings::new(),
        }
    }

    /// Replaces the drag settings.
    #[must_use]
    pub const fn with_config(mut self, config: DragConfig) -> Self {
        self.config = config;
        self
    }

    pub const fn config(&self) -> &DragConfig {
        &self.config
    }

    /// Replaces the drag settings; a gesture in progress keeps its mode.
    pub const fn set_config(&mut self, config: DragConfig) {
        self.config = config;
    }

    #[cfg(feature = "keymap")]
    /// Returns a mutable reference to the key binding set.
    pub const fn keymap_mut(&mut self) -> &mut LayerKeyBindings {
        &mut self.keymap
    }

    /// Returns the cached rows (call `ensure_flattened` first).
    pub const fn flattened(&self) -> &Flattened {
        &self.flat
    }

    /// Captures a snapshot of the current state for persistence or restore.
    pub fn snapshot(&self) -> LayerTreeSnapshot {
        let mut collapsed: Vec<_> = self.collapsed.iter().copied().collect();
        collapsed.sort_unstable();
        LayerTreeSnapshot {
            collapsed,
            selected: self.selected,
        }
    }

    /// Restores state from a previously captured snapshot.
    pub fn restore(&mut self, snapshot: LayerTreeSnapshot) {
        self.collapsed = snapshot.collapsed.into_iter().collect();
        self.selected = snapshot.selected;
        self.dirty = true;
    }

    /// Marks the row cache as dirty. Call after replacing the tree.
    pub const fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Returns the selected layer, if any.
    pub const fn selected_id(&self) -> Option<LayerId> {
        self.selected
    }

    /// Selects a layer without revealing it.
    pub const fn select(&mut self, id: Option<LayerId>) {
        self.selected = id;
    }

    /// Expands all ancestors of the layer and selects it.
    pub fn select_by_id<M: LayerModel + ?Sized>(&mut self, model: &M, id: LayerId) -> bool {
        if !self.expand_to(model, id) {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn is_collapsed(&self, id: LayerId) -> bool {
        self.collapsed.contains(&id)
    }

    /// Toggles the collapsed state of a layer.
    pub fn toggle(&mut self, id: LayerId) {
        if !self.collapsed.insert(id) {
            self.collapsed.remove(&id);
        }
        self.dirty = true;
    }

    /// Sets the collapsed state of a layer.
    pub fn set_collapsed(&mut self, id: LayerId, collapsed: bool) {
        if collapsed {
            self.collapsed.insert(id);
        } else {
            self.collapsed.remove(&id);
        }
        self.dirty = true;
    }

    /// Expands all ancestors of the layer so it becomes visible.
    pub fn expand_to<M: LayerModel + ?Sized>(&mut self, model: &M, id: LayerId) -> bool {
        if !model.contains(id) {
            return false;
        }
        let limit = model.size_hint().max(1);
        let mut current = model.parent(id);
        let mut steps = 0usize;
        while let Some(ancestor) = current {
            self.collapsed.remove(&ancestor);
            steps += 1;
            if steps > limit {
                break;
            }
            current = model.parent(ancestor);
        }
        self.dirty = true;
        true
    }

    /// Collapses every layer that has children.
    pub fn collapse_all<M: LayerModel + ?Sized>(&mut self, model: &M) {
        self.collapsed.clear();
        let hint = model.size_hint();
        if let Some(root) = model.root() {
            let mut stack = Vec::with_capacity(hint.max(1));
            stack.push(root);
            while let Some(node) = stack.pop() {
                let children = model.children(node);
                if !children.is_empty() && self.collapsed.insert(node) {
                    stack.extend(children.iter().copied());
                }
            }
        }
        self.dirty = true;
    }

    /// Expands every layer.
    pub fn expand_all(&mut self) {
        self.collapsed.clear();
        self.dirty = true;
    }

    /// Drops collapsed/selected ids that no longer exist in the model.
    pub fn prune_removed<M: LayerModel + ?Sized>(&mut self, model: &M) {
        self.collapsed.retain(|id| model.contains(*id));
        if self.selected.is_some_and(|id| !model.contains(id)) {
            self.selected = None;
        }
        self.dirty = true;
    }

    /// Ensures the row cache is up to date (if marked dirty).
    pub fn ensure_flattened<M: LayerModel + ?Sized>(&mut self, model: &M) {
        self.ensure_flattened_ordered(model, &NoOrder);
    }

    /// Ensures the row cache is up to date, presenting siblings by `order`.
    pub fn ensure_flattened_ordered<M, O>(&mut self, model: &M, order: &O)
    where
        M: LayerModel + ?Sized,
        O: OrderKey<M> + ?Sized,
    {
        if !self.dirty {
            return;
        }
        self.flat = flatten(model, &self.collapsed, order);
        self.dirty = false;
    }

    pub const fn phase(&self) -> &DragPhase {
        &self.phase
    }

    pub const fn is_dragging(&self) -> bool {
        matches!(self.phase, DragPhase::Dragging(_))
    }

    /// Layer under the pointer during a drag.
    pub const fn hovered(&self) -> Option<LayerId> {
        match &self.phase {
            DragPhase::Dragging(session) => session.hovered,
            _ => None,
        }
    }

    /// Accepted placement for the current pointer position (drop indicator).
    pub const fn placement(&self) -> Option<Placement> {
        match &self.phase {
            DragPhase::Dragging(session) => session.placement,
            _ => None,
        }
    }

    /// Presses the pointer on a layer. Refused while another gesture is
    /// still in progress.
    pub fn pointer_down<M: LayerModel + ?Sized>(
        &mut self,
        model: &M,
        id: LayerId,
        x: f32,
        y: f32,
        grab_offset: f32,
    ) -> bool {
        if !matches!(self.phase, DragPhase::Idle) || !model.contains(id) {
            return false;
        }
        self.gesture = self.gesture.wrapping_add(1);
        self.phase = DragPhase::Pressed {
            id,
            x,
            y,
            grab_offset,
        };
        true
    }

    /// Feeds a pointer move. Starts the drag once the threshold is passed and
    /// returns the accepted placement for the hovered row.
    pub fn pointer_move<M, G>(
        &mut self,
        model: &M,
        sample: PointerSample,
        gate: &G,
    ) -> Option<Placement>
    where
        M: LayerModel + ?Sized,
        G: LockGate + ?Sized,
    {
        if let DragPhase::Pressed {
            id,
            x,
            y,
            grab_offset,
        } = self.phase
        {
            if (sample.x - x).hypot(sample.y - y) < self.config.threshold {
                return None;
            }
            self.selected = Some(id);
            self.phase = DragPhase::Dragging(DragSession {
                dragged: id,
                hovered: None,
                placement: None,
                grab_offset,
                mode: self.config.mode,
                origin_x: x,
                target: None,
            });
            tracing::debug!(dragged = %id, mode = ?self.config.mode, "drag started");
        }

        let DragPhase::Dragging(mut session) = self.phase else {
            return None;
        };
        self.ensure_flattened(model);
        session.hovered = sample.over.map(|(id, _)| id);
        match self.evaluate(model, &session, sample, gate) {
            Ok((placement, target)) => {
                session.placement = Some(placement);
                session.target = Some(target);
            }
            Err(reason) => {
                if session.hovered.is_some() {
                    tracing::trace!(dragged = %session.dragged, %reason, "no valid drop");
                }
                session.placement = None;
                session.target = None;
            }
        }
        self.phase = DragPhase::Dragging(session);
        session.placement
    }

    fn evaluate<M, G>(
        &self,
        model: &M,
        session: &DragSession,
        sample: PointerSample,
        gate: &G,
    ) -> Result<(Placement, DropTarget), PlacementError>
    where
        M: LayerModel + ?Sized,
        G: LockGate + ?Sized,
    {
        let Some((over, bounds)) = sample.over else {
            return Err(PlacementError::OffTarget);
        };
        let dragged = session.dragged;
        let row = self.flat.get(over).ok_or(PlacementError::NotFound { id: over })?;
        let (placement, target) = match session.mode {
            DropMode::Zones => {
                let probe = HoverProbe {
                    target: row,
                    bounds,
                    dragged,
                    grab_offset: session.grab_offset,
                    pointer_y: sample.y,
                };
                let placement = classify(model, &probe, &self.config.zones)?;
                let drop = validate(model, dragged, over, placement)?;
                (placement, DropTarget::Zone(drop))
            }
            DropMode::Projection => {
                if over != dragged && model.is_ancestor_or_self(dragged, over) {
                    return Err(PlacementError::IntoOwnSubtree { dragged });
                }
                let delta = depth_delta(sample.x - session.origin_x, self.config.indent_width);
                let projection =
                    project(&self.flat, dragged, over, delta).ok_or(PlacementError::OutsideRoot)?;
                let parent = projection.parent.ok_or(PlacementError::OutsideRoot)?;
                check_destination(model, dragged, parent)?;
                let placement = if parent == over {
                    Placement::Inside
                } else if self.flat.position(over) > self.flat.position(dragged) {
                    Placement::Below
                } else {
                    Placement::Above
                };
                (placement, DropTarget::Projected { over, projection })
            }
        };
        check_gate(gate, dragged, &target)?;
        Ok((placement, target))
    }

    /// Releases the pointer.
    ///
    /// With a valid target the state enters [`DragPhase::Resolving`] and the
    /// returned [`PendingDrop`] must be passed to [`Self::resolve`]; no new
    /// gesture can start until then. Otherwise the gesture ends here.
    pub fn release(&mut self) -> Result<PendingDrop, DragEnd> {
        match std::mem::replace(&mut self.phase, DragPhase::Idle) {
            DragPhase::Idle => Err(DragEnd::Ignored),
            DragPhase::Resolving => {
                self.phase = DragPhase::Resolving;
                Err(DragEnd::Ignored)
            }
            DragPhase::Pressed { id, .. } => {
                self.selected = Some(id);
                Err(DragEnd::Clicked(id))
            }
            DragPhase::Dragging(session) => {
                if let Some(target) = session.target {
                    self.phase = DragPhase::Resolving;
                    Ok(PendingDrop {
                        gesture: self.gesture,
                        dragged: session.dragged,
                        target,
                    })
                } else {
                    tracing::debug!(dragged = %session.dragged, "drag cancelled: no drop target");
                    Err(DragEnd::Cancelled(CancelReason::NoTarget))
                }
            }
        }
    }

    /// Commits a released gesture against the current tree.
    ///
    /// The lock gate is consulted again for the dragged layer and the
    /// destination. On success `on_commit` receives the new tree exactly once.
    pub fn resolve<P, G, F>(
        &mut self,
        pending: PendingDrop,
        tree: &LayerTree<P>,
        gate: &G,
        on_commit: F,
    ) -> DragEnd
    where
        P: Clone,
        G: LockGate + ?Sized,
        F: FnOnce(Layer<P>),
    {
        if !matches!(self.phase, DragPhase::Resolving) || pending.gesture != self.gesture {
            return DragEnd::Cancelled(CancelReason::Stale);
        }
        let outcome = match pending.target {
            DropTarget::Zone(drop) => {
                self.apply_zone(tree, drop.dragged, drop.target, drop.placement, gate)
            }
            DropTarget::Projected { projection, .. } => {
                self.apply_projection(tree, pending.dragged, &projection, gate)
            }
        };
        self.phase = DragPhase::Idle;
        match outcome {
            Ok(layer) => {
                tracing::debug!(
                    dragged = %pending.dragged,
                    parent = ?pending.target.parent(),
                    "drag committed"
                );
                self.dirty = true;
                on_commit(layer);
                DragEnd::Committed
            }
            Err(reason) => {
                log_cancel(pending.dragged, &reason);
                DragEnd::Cancelled(reason)
            }
        }
    }

    /// Releases the pointer and commits in one step.
    pub fn pointer_up<P, G, F>(&mut self, tree: &LayerTree<P>, gate: &G, on_commit: F) -> DragEnd
    where
        P: Clone,
        G: LockGate + ?Sized,
        F: FnOnce(Layer<P>),
    {
        match self.release() {
            Ok(pending) => self.resolve(pending, tree, gate, on_commit),
            Err(end) => end,
        }
    }

    /// Aborts the current gesture. Selection is kept.
    ///
    /// Returns [`DragEnd::Ignored`] when no gesture was in progress.
    pub fn cancel(&mut self) -> DragEnd {
        if matches!(self.phase, DragPhase::Idle) {
            return DragEnd::Ignored;
        }
        tracing::debug!("drag cancelled");
        self.phase = DragPhase::Idle;
        DragEnd::Cancelled(CancelReason::Aborted)
    }

    fn apply_zone<P, G>(
        &mut self,
        tree: &LayerTree<P>,
        dragged: LayerId,
        target: LayerId,
        placement: Placement,
        gate: &G,
    ) -> Result<Layer<P>, CancelReason>
    where
        P: Clone,
        G: LockGate + ?Sized,
    {
        let drop = validate(tree, dragged, target, placement).map_err(CancelReason::Rejected)?;
        check_gate(gate, dragged, &DropTarget::Zone(drop)).map_err(CancelReason::Rejected)?;
        self.ensure_flattened(tree);
        match rebuild(tree, &self.flat, Some(drop.into())) {
            Err(err) if err.is_stale() => {
                // The tree changed without `invalidate`; re-derive rows from this snapshot.
                tracing::debug!(%dragged, reason = %err, "row cache stale, re-flattening");
                self.dirty = true;
                let fresh = flatten(tree, &self.collapsed, &NoOrder);
                rebuild(tree, &fresh, Some(drop.into())).map_err(CancelReason::Integrity)
            }
            outcome => outcome.map_err(CancelReason::Integrity),
        }
    }

    fn apply_projection<P, G>(
        &mut self,
        tree: &LayerTree<P>,
        dragged: LayerId,
        projection: &Projection,
        gate: &G,
    ) -> Result<Layer<P>, CancelReason>
    where
        P: Clone,
        G: LockGate + ?Sized,
    {
        let parent = projection
            .parent
            .ok_or(CancelReason::Rejected(PlacementError::OutsideRoot))?;
        check_destination(tree, dragged, parent).map_err(CancelReason::Rejected)?;
        let target = DropTarget::Projected {
            over: parent,
            projection: *projection,
        };
        check_gate(gate, dragged, &target).map_err(CancelReason::Rejected)?;
        let root = tree.to_layer().map_err(CancelReason::Integrity)?;
        move_projected(&root, dragged, projection).map_err(CancelReason::Integrity)
    }

    /// Handles a navigation/view action and returns the resulting event.
    ///
    /// Structural actions are forwarded as [`LayerEvent::Action`]; apply them
    /// with [`Self::handle_edit_action`].
    pub fn handle_action<M: LayerModel + ?Sized, C>(
        &mut self,
        model: &M,
        action: LayerAction<C>,
    ) -> LayerEvent<C> {
        if matches!(&action, LayerAction::Custom(_)) || action.is_structural() {
            return LayerEvent::Action(action);
        }
        self.ensure_flattened(model);
        if self.flat.is_empty() {
            return LayerEvent::Unhandled;
        }

        match action {
            LayerAction::SelectPrev => {
                let pos = self.selected_position().unwrap_or(0);
                self.select_position(pos.saturating_sub(1));
                LayerEvent::Handled
            }
            LayerAction::SelectNext => {
                let next = self.selected_position().map_or(0, |pos| pos + 1);
                self.select_position(next.min(self.flat.len() - 1));
                LayerEvent::Handled
            }
            LayerAction::SelectParent => {
                let Some(parent) = self
                    .selected
                    .and_then(|id| self.flat.get(id))
                    .and_then(|row| row.parent)
                else {
                    return LayerEvent::Unhandled;
                };
                self.selected = Some(parent);
                LayerEvent::Handled
            }
            LayerAction::SelectFirst => {
                self.select_position(0);
                LayerEvent::Handled
            }
            LayerAction::SelectLast => {
                self.select_position(self.flat.len() - 1);
                LayerEvent::Handled
            }
            LayerAction::ToggleCollapse => {
                if let Some(row) = self.selected.and_then(|id| self.flat.get(id))
                    && row.child_count > 0
                {
                    let id = row.id;
                    self.toggle(id);
                    return LayerEvent::Handled;
                }
                LayerEvent::Unhandled
            }
            LayerAction::CollapseAll => {
                self.collapse_all(model);
                LayerEvent::Handled
            }
            LayerAction::ExpandAll => {
                self.expand_all();
                LayerEvent::Handled
            }
            LayerAction::CancelDrag => match self.cancel() {
                DragEnd::Ignored => LayerEvent::Unhandled,
                _ => LayerEvent::Handled,
            },
            LayerAction::MoveUp
            | LayerAction::MoveDown
            | LayerAction::Indent
            | LayerAction::Outdent
            | LayerAction::Custom(_) => LayerEvent::Action(action),
        }
    }

    /// Applies a structural action to the selected layer.
    ///
    /// Returns the new tree, or `None` if the action is not structural,
    /// nothing is selected, a gesture is in progress or the move is rejected.
    pub fn handle_edit_action<P, G, C>(
        &mut self,
        tree: &LayerTree<P>,
        action: LayerAction<C>,
        gate: &G,
    ) -> Option<Layer<P>>
    where
        P: Clone,
        G: LockGate + ?Sized,
    {
        if !action.is_structural() || !matches!(self.phase, DragPhase::Idle) {
            return None;
        }
        let selected = self.selected?;
        self.ensure_flattened(tree);
        let outcome = match action {
            LayerAction::MoveUp | LayerAction::MoveDown => {
                let parent = tree.parent(selected)?;
                let index = tree.index_in_parent(selected)?;
                let siblings = tree.children(parent);
                let (sibling, placement) = if matches!(action, LayerAction::MoveUp) {
                    (siblings.get(index.checked_sub(1)?)?, Placement::Above)
                } else {
                    (siblings.get(index + 1)?, Placement::Below)
                };
                self.apply_zone(tree, selected, *sibling, placement, gate)
            }
            LayerAction::Outdent => {
                let parent = tree.parent(selected)?;
                self.apply_zone(tree, selected, parent, Placement::Below, gate)
            }
            LayerAction::Indent => {
                let projection = project(&self.flat, selected, selected, 1)?;
                self.apply_projection(tree, selected, &projection, gate)
            }
            _ => return None,
        };
        match outcome {
            Ok(layer) => {
                self.dirty = true;
                Some(layer)
            }
            Err(reason) => {
                log_cancel(selected, &reason);
                None
            }
        }
    }

    #[cfg(feature = "keymap")]
    /// Resolves a key event into an action and handles it.
    pub fn handle_key<M: LayerModel + ?Sized>(
        &mut self,
        model: &M,
        key: KeyEvent,
    ) -> LayerEvent<()> {
        let Some(action) = self.keymap.resolve(key) else {
            return LayerEvent::Unhandled;
        };
        self.handle_action(model, action)
    }

    #[cfg(feature = "keymap")]
    /// Resolves a key event with a custom mapping and handles it.
    pub fn handle_key_with<M, C, F>(&mut self, model: &M, key: KeyEvent, custom: F) -> LayerEvent<C>
    where
        M: LayerModel + ?Sized,
        F: Fn(KeyEvent) -> Option<C>,
    {
        let Some(action) = self.keymap.resolve_with(key, custom) else {
            return LayerEvent::Unhandled;
        };
        self.handle_action(model, action)
    }

    fn selected_position(&self) -> Option<usize> {
        self.selected.and_then(|id| self.flat.position(id))
    }

    fn select_position(&mut self, pos: usize) {
        if let Some(row) = self.flat.rows().get(pos) {
            self.selected = Some(row.id);
        }
    }
}

fn check_gate<G: LockGate + ?Sized>(
    gate: &G,
    dragged: LayerId,
    target: &DropTarget,
) -> Result<(), PlacementError> {
    let candidates = [Some(dragged), Some(target.over()), target.parent()];
    for id in candidates.into_iter().flatten() {
        if gate.is_locked_by_other(id) {
            return Err(PlacementError::LockedByOther { id });
        }
    }
    Ok(())
}

fn log_cancel(dragged: LayerId, reason: &CancelReason) {
    match reason {
        CancelReason::Integrity(err) => {
            tracing::warn!(%dragged, error = %err, "structural move aborted");
        }
        CancelReason::Rejected(err) => {
            tracing::debug!(%dragged, reason = %err, "structural move rejected");
        }
        CancelReason::NoTarget | CancelReason::Aborted | CancelReason::Stale => {
            tracing::debug!(%dragged, ?reason, "structural move cancelled");
        }
    }
}
