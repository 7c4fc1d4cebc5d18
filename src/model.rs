use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identifier of a layer.
///
/// Identifiers are opaque to the engine; only [`LayerId::ROOT`] carries meaning.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

impl LayerId {
    /// Reserved id of the single root container of a page.
    pub const ROOT: Self = Self(0);

    /// Returns `true` for the reserved root container id.
    #[inline]
    pub const fn is_root(self) -> bool {
        self.0 == Self::ROOT.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Returns `true` if `id` is the reserved root container.
#[inline]
pub const fn is_root(id: LayerId) -> bool {
    id.is_root()
}

/// Element kind of a layer. Child ownership is decided by the kind.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Container,
    Section,
    Grid,
    Column,
    Form,
    Link,
    Span,
    Label,
    Text,
    Heading,
    Paragraph,
    Image,
    Video,
    Icon,
    Button,
    Input,
    Textarea,
    Select,
    Checkbox,
    Divider,
    Embed,
}

impl LayerKind {
    /// Returns `true` if layers of this kind may own children.
    #[inline]
    pub const fn can_own_children(self) -> bool {
        matches!(
            self,
            Self::Container
                | Self::Section
                | Self::Grid
                | Self::Column
                | Self::Form
                | Self::Link
                | Self::Span
                | Self::Label
        )
    }

    /// Returns `true` for kinds whose purpose is grouping children.
    ///
    /// Weak containers (`Link`, `Span`, `Label`) accept children but are
    /// primarily content; the drop-zone classifier gives them smaller
    /// interiors.
    #[inline]
    pub const fn is_strong_container(self) -> bool {
        matches!(
            self,
            Self::Container | Self::Section | Self::Grid | Self::Column | Self::Form
        )
    }
}

/// Returns `true` if layers of `kind` may own children.
#[inline]
pub const fn can_own_children(kind: LayerKind) -> bool {
    kind.can_own_children()
}

/// Nested form of a page layer.
///
/// `children` is `None` for kinds that cannot own children and `Some` (possibly
/// empty) otherwise. `payload` is carried through every structural operation
/// without being inspected.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer<P = ()> {
    pub id: LayerId,
    pub kind: LayerKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub locked: bool,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub children: Option<Vec<Layer<P>>>,
    pub payload: P,
}

impl<P> Layer<P> {
    /// Creates a layer with an empty child list if `kind` can own children.
    pub fn new(id: LayerId, kind: LayerKind, payload: P) -> Self {
        Self {
            id,
            kind,
            locked: false,
            children: kind.can_own_children().then(Vec::new),
            payload,
        }
    }

    /// Replaces the child list.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = Some(children);
        self
    }

    /// Sets the structural lock flag.
    #[must_use]
    pub const fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Returns the children, or an empty slice for childless kinds.
    pub fn children(&self) -> &[Self] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Finds a layer by id in this subtree (preorder).
    pub fn find(&self, id: LayerId) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    /// Counts the layers of this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(Self::subtree_len).sum::<usize>()
    }
}

impl Layer<()> {
    /// Shorthand for a layer without payload.
    pub fn bare(id: u64, kind: LayerKind) -> Self {
        Self::new(LayerId(id), kind, ())
    }
}

/// Read-only tree contract used by the flattener, classifier and validator.
///
/// A proper tree is expected (not a DAG):
/// - one root, the reserved [`LayerId::ROOT`] container;
/// - each non-root node has exactly one parent;
/// - identifiers are stable between frames (for selection/collapse state).
pub trait LayerModel {
    /// Returns the root container id (or `None` if the model is empty).
    fn root(&self) -> Option<LayerId>;
    /// Returns the node's children in stored order.
    fn children(&self, id: LayerId) -> &[LayerId];
    /// Returns `true` if the node exists in the model.
    fn contains(&self, id: LayerId) -> bool;
    /// Returns the node's kind.
    fn kind(&self, id: LayerId) -> Option<LayerKind>;
    /// Returns the node's parent.
    fn parent(&self, id: LayerId) -> Option<LayerId>;
    /// Returns `true` if the node forbids structural edits.
    fn is_locked(&self, _id: LayerId) -> bool {
        false
    }
    /// Returns an approximate size hint (not required to be exact).
    fn size_hint(&self) -> usize {
        0
    }

    /// Returns `true` if the node exists and its kind may own children.
    fn can_have_children(&self, id: LayerId) -> bool {
        self.kind(id).is_some_and(LayerKind::can_own_children)
    }

    /// Returns the node's stored index among its siblings.
    fn index_in_parent(&self, id: LayerId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Returns `true` if `node` is `ancestor` or lies in its subtree.
    ///
    /// Walks parent links, so the cost is bounded by the node's depth. The
    /// walk gives up after `size_hint` steps to stay finite on corrupt input.
    fn is_ancestor_or_self(&self, ancestor: LayerId, node: LayerId) -> bool {
        let limit = self.size_hint().max(1);
        let mut current = Some(node);
        let mut steps = 0usize;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > limit {
                return false;
            }
            current = self.parent(id);
        }
        false
    }
}

/// Secondary sort key for sibling groups (e.g. a responsive visual order).
pub trait OrderKey<M: LayerModel + ?Sized> {
    /// Returns the override rank of the node, if it has one.
    fn order(&self, model: &M, id: LayerId) -> Option<i32>;
}

impl<M, F> OrderKey<M> for F
where
    M: LayerModel + ?Sized,
    F: Fn(&M, LayerId) -> Option<i32>,
{
    #[inline]
    fn order(&self, model: &M, id: LayerId) -> Option<i32> {
        self(model, id)
    }
}

/// Order key that never overrides stored order.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOrder;

impl<M: LayerModel + ?Sized> OrderKey<M> for NoOrder {
    #[inline]
    fn order(&self, _model: &M, _id: LayerId) -> Option<i32> {
        None
    }
}
