//! Graph Nodes
//!
//! This module defines the node handle that lives in the animation graph,
//! the closed set of node kinds, and the three behaviors every kind shares:
//! memoized evaluation, attach/detach bookkeeping, and native promotion.
//!
//! # Edges
//!
//! Inputs ("parents") are fixed when a node is constructed. The reverse
//! edges ("children") are registered only while the node is attached. A
//! parent that gains its first child attaches itself to its own parents,
//! and a parent that loses its last child detaches itself, so activation
//! travels up the graph like a reference count.
//!
//! Because a node can only name inputs that already exist, the graph is
//! acyclic by construction.
//!
//! # Ownership
//!
//! A child holds its parents through its kind; an attached parent holds its
//! children in its child list. The resulting reference cycle is what keeps an
//! attached subgraph alive and is broken by `detach`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::animation::{SpringStep, TimingStep};
use crate::error::{AnimatedError, Result};
use crate::graph::FrameScheduler;
use crate::native::{NativeConfig, NativeOp, NativeTag};
use crate::nodes::{
    ArithmeticNode, CondNode, DiffClampNode, FunctorNode, InterpolationNode, PropsNode,
    TransformNode,
};
use crate::value::Value;

/// Unique identifier for a node in the animation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the animation graph.
pub enum NodeKind {
    /// A settable leaf holding a number.
    Value(Cell<f64>),

    /// The shared loop clock. Its value is the current frame timestamp.
    Clock,

    /// Arithmetic over operands.
    Op(ArithmeticNode),

    /// An arbitrary pure function over input nodes.
    Functor(FunctorNode),

    /// Branch select. Only the selected branch is evaluated.
    Cond(CondNode),

    /// Piecewise-linear range mapping.
    Interpolation(InterpolationNode),

    /// A list of transform entries with animated or static values.
    Transform(TransformNode),

    /// Rate-limited accumulator over its input.
    DiffClamp(DiffClampNode),

    /// One spring integrator, stepped against the clock.
    Spring(SpringStep),

    /// Copies its input into a target value node when evaluated.
    Timing(TimingStep),

    /// Commit-capable sink pushing property values to a consumer.
    Props(PropsNode),
}

/// Parent list returned by [`NodeKind::parents`].
pub(crate) type Parents = SmallVec<[Node; 4]>;

impl NodeKind {
    /// Name of the kind, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Value(_) => "value",
            NodeKind::Clock => "clock",
            NodeKind::Op(op) => op.op().name(),
            NodeKind::Functor(_) => "functor",
            NodeKind::Cond(_) => "cond",
            NodeKind::Interpolation(_) => "interpolation",
            NodeKind::Transform(_) => "transform",
            NodeKind::DiffClamp(_) => "diffclamp",
            NodeKind::Spring(_) => "spring",
            NodeKind::Timing(_) => "timing",
            NodeKind::Props(_) => "props",
        }
    }

    /// Input nodes, in declaration order.
    pub(crate) fn parents(&self) -> Parents {
        match self {
            NodeKind::Value(_) | NodeKind::Clock => Parents::new(),
            NodeKind::Op(op) => op.parents(),
            NodeKind::Functor(functor) => functor.parents(),
            NodeKind::Cond(cond) => cond.parents(),
            NodeKind::Interpolation(interpolation) => interpolation.parents(),
            NodeKind::Transform(transform) => transform.parents(),
            NodeKind::DiffClamp(diff_clamp) => diff_clamp.parents(),
            NodeKind::Spring(spring) => spring.parents(),
            NodeKind::Timing(timing) => timing.parents(),
            NodeKind::Props(props) => props.parents(),
        }
    }

    /// Whether this kind has a native projection.
    pub fn supports_native(&self) -> bool {
        !matches!(
            self,
            NodeKind::Clock | NodeKind::Functor(_) | NodeKind::Spring(_) | NodeKind::Timing(_)
        )
    }
}

struct NodeInner {
    id: NodeId,
    kind: NodeKind,

    /// Consumers registered by attach.
    children: RefCell<SmallVec<[Node; 2]>>,

    /// Scheduler epoch the memoized value was computed in. Zero means never.
    stamp: Cell<u64>,
    /// Scheduler revision observed when the memo was computed.
    computed_at: Cell<u64>,
    /// Revision of the last write to this node.
    changed_at: Cell<u64>,
    /// `(revision, latest upstream change)` from the last dependency walk.
    upstream: Cell<Option<(u64, u64)>>,
    memo: RefCell<Value>,

    native: Cell<bool>,
    native_tag: Cell<Option<NativeTag>>,
}

/// Shared handle to a node in the animation graph.
///
/// Cloning the handle is cheap and yields the same node.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

impl Node {
    pub(crate) fn from_kind(kind: NodeKind) -> Self {
        Self(Rc::new(NodeInner {
            id: NodeId::new(),
            kind,
            children: RefCell::new(SmallVec::new()),
            stamp: Cell::new(0),
            computed_at: Cell::new(0),
            changed_at: Cell::new(0),
            upstream: Cell::new(None),
            memo: RefCell::new(Value::Null),
            native: Cell::new(false),
            native_tag: Cell::new(None),
        }))
    }

    /// Create a settable value node.
    pub fn value(initial: f64) -> Self {
        Self::from_kind(NodeKind::Value(Cell::new(initial)))
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// Name of the node's kind.
    pub fn kind_name(&self) -> &'static str {
        self.0.kind.name()
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Get the node's current value.
    ///
    /// The node is recomputed only if its memo was computed in an earlier
    /// frame or a value upstream of it was written since; otherwise the memo
    /// is returned as is. A failed evaluation leaves the node unstamped.
    pub fn get_value(&self, scheduler: &FrameScheduler) -> Result<Value> {
        if self.is_current(scheduler) {
            return Ok(self.0.memo.borrow().clone());
        }

        let value = self.evaluate(scheduler)?;
        *self.0.memo.borrow_mut() = value.clone();
        // Stamp after evaluation: a node that wrote a value while
        // evaluating is still current.
        self.0.stamp.set(scheduler.epoch());
        self.0.computed_at.set(scheduler.revision());
        Ok(value)
    }

    fn is_current(&self, scheduler: &FrameScheduler) -> bool {
        self.0.stamp.get() == scheduler.epoch()
            && self.last_change(scheduler) <= self.0.computed_at.get()
    }

    /// Revision of the latest write to this node or any node upstream of it.
    ///
    /// The walk is cached per revision, so a pull touches each ancestor once
    /// between writes.
    fn last_change(&self, scheduler: &FrameScheduler) -> u64 {
        let revision = scheduler.revision();
        if let Some((checked, latest)) = self.0.upstream.get() {
            if checked == revision {
                return latest;
            }
        }

        let latest = self
            .0
            .kind
            .parents()
            .iter()
            .map(|parent| parent.last_change(scheduler))
            .fold(self.0.changed_at.get(), u64::max);
        self.0.upstream.set(Some((revision, latest)));
        latest
    }

    /// Shorthand for `get_value(..)?.as_number()`.
    pub fn number(&self, scheduler: &FrameScheduler) -> Result<f64> {
        self.get_value(scheduler)?.as_number()
    }

    fn evaluate(&self, scheduler: &FrameScheduler) -> Result<Value> {
        match &self.0.kind {
            NodeKind::Value(cell) => Ok(Value::Number(cell.get())),
            NodeKind::Clock => Ok(Value::Number(scheduler.now())),
            NodeKind::Op(op) => op.evaluate(scheduler),
            NodeKind::Functor(functor) => functor.evaluate(scheduler),
            NodeKind::Cond(cond) => cond.evaluate(scheduler),
            NodeKind::Interpolation(interpolation) => interpolation.evaluate(scheduler),
            NodeKind::Transform(transform) => transform.evaluate(scheduler),
            NodeKind::DiffClamp(diff_clamp) => diff_clamp.evaluate(scheduler),
            NodeKind::Spring(spring) => spring.evaluate(scheduler),
            NodeKind::Timing(timing) => timing.evaluate(scheduler),
            NodeKind::Props(props) => props.evaluate(scheduler),
        }
    }

    /// Set a value node.
    ///
    /// Invalidates the memos downstream of the node, marks it dirty for the
    /// next property flush, and mirrors the write to the native side when
    /// the node has a native tag.
    pub fn set_value(&self, scheduler: &FrameScheduler, value: f64) -> Result<()> {
        let NodeKind::Value(cell) = &self.0.kind else {
            return Err(AnimatedError::NotSettable {
                node: self.id(),
                kind: self.kind_name(),
            });
        };

        cell.set(value);
        self.0.changed_at.set(scheduler.next_revision());
        scheduler.mark_dirty(self);

        if let Some(tag) = self.0.native_tag.get() {
            scheduler
                .native()
                .execute(NativeOp::SetValue { tag, value });
        }
        Ok(())
    }

    /// Whether the flush pass stops at this node and commits it.
    pub fn is_committable(&self) -> bool {
        matches!(self.0.kind, NodeKind::Props(_))
    }

    /// Push the node's value to its consumer. No-op for kinds that cannot
    /// commit.
    pub fn commit(&self, scheduler: &FrameScheduler) -> Result<()> {
        match &self.0.kind {
            NodeKind::Props(props) => props.commit(self, scheduler),
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Attach / detach
    // ------------------------------------------------------------------

    /// Snapshot of the currently registered children.
    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().iter().cloned().collect()
    }

    /// Number of registered children.
    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    /// Input nodes of this node.
    pub fn parents(&self) -> Vec<Node> {
        self.0.kind.parents().into_vec()
    }

    /// Register this node as a child of each of its parents.
    ///
    /// Explicitly attaching a node makes it a graph root.
    pub fn attach(&self, scheduler: &FrameScheduler) -> Result<()> {
        trace!(node = %self.id(), kind = self.kind_name(), "attach");
        for parent in self.0.kind.parents() {
            parent.add_child(scheduler, self)?;
        }
        Ok(())
    }

    /// Unregister this node from each of its parents and release its native
    /// tag.
    pub fn detach(&self, scheduler: &FrameScheduler) -> Result<()> {
        trace!(node = %self.id(), kind = self.kind_name(), "detach");
        for parent in self.0.kind.parents() {
            parent.remove_child(scheduler, self)?;
        }
        if let Some(tag) = self.0.native_tag.take() {
            scheduler.native().execute(NativeOp::DropNode { tag });
        }
        Ok(())
    }

    fn add_child(&self, scheduler: &FrameScheduler, child: &Node) -> Result<()> {
        // Native parents only accept native children.
        if self.is_native() {
            child.make_native(scheduler)?;
        }

        if self.0.children.borrow().is_empty() {
            self.attach(scheduler)?;
        }
        self.0.children.borrow_mut().push(child.clone());

        if self.is_native() {
            scheduler.native().execute(NativeOp::ConnectNodes {
                parent: self.native_tag(scheduler)?,
                child: child.native_tag(scheduler)?,
            });
        }
        Ok(())
    }

    fn remove_child(&self, scheduler: &FrameScheduler, child: &Node) -> Result<()> {
        let index = self
            .0
            .children
            .borrow()
            .iter()
            .position(|existing| existing.id() == child.id());

        let Some(index) = index else {
            warn!(
                parent = %self.id(),
                child = %child.id(),
                "trying to remove a child that doesn't exist"
            );
            return Ok(());
        };

        if let (Some(parent), Some(child_tag)) = (self.0.native_tag.get(), child.0.native_tag.get())
        {
            scheduler.native().execute(NativeOp::DisconnectNodes {
                parent,
                child: child_tag,
            });
        }

        let now_empty = {
            let mut children = self.0.children.borrow_mut();
            children.remove(index);
            children.is_empty()
        };
        if now_empty {
            self.detach(scheduler)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Native projection
    // ------------------------------------------------------------------

    /// Whether the node has been promoted to native execution.
    pub fn is_native(&self) -> bool {
        self.0.native.get()
    }

    /// Promote this node to native execution.
    ///
    /// Inputs are promoted first so the node's config can reference their
    /// tags; children already attached are promoted and connected after.
    pub fn make_native(&self, scheduler: &FrameScheduler) -> Result<()> {
        if self.is_native() {
            return Ok(());
        }
        if !self.0.kind.supports_native() {
            return Err(AnimatedError::NativeUnsupported {
                kind: self.kind_name(),
            });
        }

        for parent in self.0.kind.parents() {
            parent.make_native(scheduler)?;
        }
        // A parent may have promoted us while walking its own children.
        if self.is_native() {
            return Ok(());
        }
        self.0.native.set(true);

        for child in self.children() {
            child.make_native(scheduler)?;
            scheduler.native().execute(NativeOp::ConnectNodes {
                parent: self.native_tag(scheduler)?,
                child: child.native_tag(scheduler)?,
            });
        }
        Ok(())
    }

    /// The node's native tag, registering the node with the executor on
    /// first use.
    pub fn native_tag(&self, scheduler: &FrameScheduler) -> Result<NativeTag> {
        if !self.is_native() {
            return Err(AnimatedError::NotNative { node: self.id() });
        }
        if let Some(tag) = self.0.native_tag.get() {
            return Ok(tag);
        }

        let config = self.native_config(scheduler)?;
        let tag = scheduler.native().create_node(config);
        self.0.native_tag.set(Some(tag));
        Ok(tag)
    }

    /// Serializable description of this node for an out-of-process executor.
    ///
    /// Node inputs are referenced by native tag, so they must already be
    /// native.
    pub fn native_config(&self, scheduler: &FrameScheduler) -> Result<NativeConfig> {
        match &self.0.kind {
            NodeKind::Value(cell) => Ok(NativeConfig::Value { value: cell.get() }),
            NodeKind::Op(op) => op.native_config(scheduler),
            NodeKind::Cond(cond) => cond.native_config(scheduler),
            NodeKind::Interpolation(interpolation) => interpolation.native_config(scheduler),
            NodeKind::Transform(transform) => transform.native_config(scheduler),
            NodeKind::DiffClamp(diff_clamp) => diff_clamp.native_config(scheduler),
            NodeKind::Props(props) => props.native_config(scheduler),
            NodeKind::Clock
            | NodeKind::Functor(_)
            | NodeKind::Spring(_)
            | NodeKind::Timing(_) => Err(AnimatedError::NativeUnsupported {
                kind: self.kind_name(),
            }),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.0.id)
            .field("kind", &self.kind_name())
            .field("children", &self.child_count())
            .field("native", &self.is_native())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::cell::Cell;
    use tracing_test::traced_test;

    fn counting_functor(input: &Node, calls: &Rc<Cell<u32>>) -> Node {
        let calls = Rc::clone(calls);
        Node::functor(vec![input.clone()], move |values| {
            calls.set(calls.get() + 1);
            Ok(Value::from(values[0].as_number()? * 2.0))
        })
    }

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn value_node_reads_and_writes() {
        let scheduler = FrameScheduler::new();
        let value = Node::value(3.0);
        assert_eq!(value.number(&scheduler).unwrap(), 3.0);

        value.set_value(&scheduler, 7.0).unwrap();
        assert_eq!(value.number(&scheduler).unwrap(), 7.0);
    }

    #[test]
    fn set_value_rejects_derived_nodes() {
        let scheduler = FrameScheduler::new();
        let sum = Node::add(Node::value(1.0), 2.0);
        let err = sum.set_value(&scheduler, 1.0).unwrap_err();
        assert!(matches!(err, AnimatedError::NotSettable { kind: "addition", .. }));
    }

    #[test]
    fn evaluation_is_memoized_within_an_epoch() {
        let scheduler = FrameScheduler::new();
        let calls = Rc::new(Cell::new(0));
        let input = Node::value(2.0);
        let doubled = counting_functor(&input, &calls);

        assert_eq!(doubled.number(&scheduler).unwrap(), 4.0);
        assert_eq!(doubled.number(&scheduler).unwrap(), 4.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn set_value_invalidates_dependents() {
        let scheduler = FrameScheduler::new();
        let calls = Rc::new(Cell::new(0));
        let input = Node::value(2.0);
        let doubled = counting_functor(&input, &calls);

        assert_eq!(doubled.number(&scheduler).unwrap(), 4.0);
        input.set_value(&scheduler, 5.0).unwrap();
        assert_eq!(doubled.number(&scheduler).unwrap(), 10.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn new_frame_invalidates_memo() {
        let scheduler = FrameScheduler::new();
        let calls = Rc::new(Cell::new(0));
        let doubled = counting_functor(&Node::value(1.0), &calls);

        doubled.number(&scheduler).unwrap();
        scheduler.run_frame(16.0);
        doubled.number(&scheduler).unwrap();
        doubled.number(&scheduler).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn unrelated_write_keeps_memo() {
        let scheduler = FrameScheduler::new();
        let calls = Rc::new(Cell::new(0));
        let input = Node::value(1.0);
        let doubled = counting_functor(&input, &calls);
        let unrelated = Node::value(0.0);

        scheduler.run_frame(16.0);
        assert_eq!(doubled.number(&scheduler).unwrap(), 2.0);
        unrelated.set_value(&scheduler, 5.0).unwrap();
        assert_eq!(doubled.number(&scheduler).unwrap(), 2.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn write_recomputes_only_its_descendants() {
        let scheduler = FrameScheduler::new();
        let left_calls = Rc::new(Cell::new(0));
        let right_calls = Rc::new(Cell::new(0));
        let left = Node::value(1.0);
        let right = Node::value(2.0);
        let left_doubled = counting_functor(&left, &left_calls);
        let right_doubled = counting_functor(&right, &right_calls);
        let sum = Node::add(&left_doubled, &right_doubled);

        assert_eq!(sum.number(&scheduler).unwrap(), 6.0);
        left.set_value(&scheduler, 3.0).unwrap();
        assert_eq!(sum.number(&scheduler).unwrap(), 10.0);
        assert_eq!(sum.number(&scheduler).unwrap(), 10.0);
        assert_eq!((left_calls.get(), right_calls.get()), (2, 1));
    }

    #[test]
    fn attach_registers_and_activates_parents() {
        let scheduler = FrameScheduler::new();
        let base = Node::value(1.0);
        let sum = Node::add(&base, 1.0);
        let scaled = Node::multiply(&sum, 2.0);

        scaled.attach(&scheduler).unwrap();
        assert_eq!(sum.child_count(), 1);
        // `sum` gained its first child, so it attached itself to `base`.
        assert_eq!(base.child_count(), 1);
        assert_eq!(base.children()[0], sum);

        scaled.detach(&scheduler).unwrap();
        assert_eq!(sum.child_count(), 0);
        assert_eq!(base.child_count(), 0);
    }

    #[test]
    fn detach_keeps_shared_parent_alive() {
        let scheduler = FrameScheduler::new();
        let base = Node::value(1.0);
        let a = Node::add(&base, 1.0);
        let b = Node::add(&base, 2.0);

        a.attach(&scheduler).unwrap();
        b.attach(&scheduler).unwrap();
        assert_eq!(base.child_count(), 2);

        a.detach(&scheduler).unwrap();
        assert_eq!(base.child_count(), 1);
        assert_eq!(base.children()[0], b);
    }

    #[test]
    #[traced_test]
    fn removing_unknown_child_is_a_noop() {
        let scheduler = FrameScheduler::new();
        let base = Node::value(1.0);
        let sum = Node::add(&base, 1.0);

        // Never attached: detaching only warns.
        sum.detach(&scheduler).unwrap();
        assert_eq!(base.child_count(), 0);
        assert!(logs_contain("trying to remove a child that doesn't exist"));
    }

    #[test]
    fn unsupported_kinds_cannot_become_native() {
        let scheduler = FrameScheduler::new();
        let functor = Node::functor(vec![Node::value(1.0)], |v| Ok(v[0].clone()));
        let err = functor.make_native(&scheduler).unwrap_err();
        assert!(matches!(err, AnimatedError::NativeUnsupported { kind: "functor" }));
        assert!(matches!(
            scheduler.clock().native_config(&scheduler),
            Err(AnimatedError::NativeUnsupported { kind: "clock" })
        ));
    }

    #[test]
    fn native_tag_requires_native_mode() {
        let scheduler = FrameScheduler::new();
        let value = Node::value(0.0);
        assert!(matches!(
            value.native_tag(&scheduler),
            Err(AnimatedError::NotNative { .. })
        ));

        value.make_native(&scheduler).unwrap();
        let tag = value.native_tag(&scheduler).unwrap();
        assert_eq!(value.native_tag(&scheduler).unwrap(), tag);
    }

    #[test]
    fn native_parent_promotes_attached_child() {
        let scheduler = FrameScheduler::new();
        let base = Node::value(1.0);
        base.make_native(&scheduler).unwrap();

        let sum = Node::add(&base, 1.0);
        sum.attach(&scheduler).unwrap();
        assert!(sum.is_native());
    }

    #[test]
    fn native_parent_rejects_unsupported_child() {
        let scheduler = FrameScheduler::new();
        let base = Node::value(1.0);
        base.make_native(&scheduler).unwrap();

        let functor = Node::functor(vec![base.clone()], |v| Ok(v[0].clone()));
        let err = functor.attach(&scheduler).unwrap_err();
        assert!(matches!(err, AnimatedError::NativeUnsupported { .. }));
        assert_eq!(base.child_count(), 0);
    }
}
