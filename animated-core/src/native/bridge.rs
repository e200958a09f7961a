//! Native Bridge
//!
//! The bridge is the only path from the local graph to a native executor.
//! It allocates tags and animation ids, forwards [`NativeOp`]s to the
//! installed [`NativeExecutor`], and routes completion events back to the
//! animation that started them.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::config::{AnimationConfig, AnimationId, NativeConfig, NativeOp, NativeTag};
use crate::error::Result;
use crate::graph::FrameScheduler;

/// Receiver of native ops.
pub trait NativeExecutor {
    fn execute(&mut self, op: NativeOp);
}

impl<E: NativeExecutor> NativeExecutor for Rc<RefCell<E>> {
    fn execute(&mut self, op: NativeOp) {
        self.borrow_mut().execute(op);
    }
}

/// Executor that logs and discards every op.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingExecutor;

impl NativeExecutor for TracingExecutor {
    fn execute(&mut self, op: NativeOp) {
        debug!(?op, "no native executor installed; dropping op");
    }
}

/// Executor that records ops for batching over a transport.
#[derive(Debug, Default, Clone)]
pub struct OpQueue {
    ops: Vec<NativeOp>,
}

impl OpQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[NativeOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Take every recorded op, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<NativeOp> {
        std::mem::take(&mut self.ops)
    }

    /// Encode the recorded ops as a JSON array.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.ops)?)
    }

    /// Encode the recorded ops as a MessagePack array of maps.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(&self.ops)?)
    }
}

impl NativeExecutor for OpQueue {
    fn execute(&mut self, op: NativeOp) {
        self.ops.push(op);
    }
}

/// Callback run when a native animation ends.
pub type EndHandler = Box<dyn FnOnce(&FrameScheduler, bool)>;

/// Tag and id allocator in front of the installed [`NativeExecutor`].
///
/// It also holds the end handlers of native animations until the executor
/// reports them.
pub struct NativeBridge {
    executor: RefCell<Box<dyn NativeExecutor>>,
    next_tag: Cell<u32>,
    next_animation: Cell<u32>,
    end_handlers: RefCell<HashMap<AnimationId, EndHandler>>,
}

impl NativeBridge {
    /// Wrap `executor`. Tags and animation ids start at 1.
    pub fn new(executor: Box<dyn NativeExecutor>) -> Self {
        Self {
            executor: RefCell::new(executor),
            next_tag: Cell::new(1),
            next_animation: Cell::new(1),
            end_handlers: RefCell::new(HashMap::new()),
        }
    }

    /// Send one op to the executor.
    pub fn execute(&self, op: NativeOp) {
        trace!(?op, "native op");
        self.executor.borrow_mut().execute(op);
    }

    /// Allocate a tag and create the node on the native side.
    pub fn create_node(&self, config: NativeConfig) -> NativeTag {
        let tag = NativeTag(self.next_tag.get());
        self.next_tag.set(tag.0 + 1);
        self.execute(NativeOp::CreateNode { tag, config });
        tag
    }

    /// Allocate an id for a native animation.
    pub fn next_animation_id(&self) -> AnimationId {
        let id = AnimationId(self.next_animation.get());
        self.next_animation.set(id.0 + 1);
        id
    }

    /// Start driving `node_tag` natively. `on_end` runs when the executor
    /// reports the animation ended.
    pub fn start_animation(
        &self,
        animation_id: AnimationId,
        node_tag: NativeTag,
        config: AnimationConfig,
        on_end: EndHandler,
    ) {
        self.end_handlers.borrow_mut().insert(animation_id, on_end);
        self.execute(NativeOp::StartAnimatingNode {
            animation_id,
            node_tag,
            config,
        });
    }

    /// Stop a native animation. Its end handler is dropped without running;
    /// the caller completes the animation locally.
    pub fn stop_animation(&self, animation_id: AnimationId) {
        self.end_handlers.borrow_mut().remove(&animation_id);
        self.execute(NativeOp::StopAnimation { animation_id });
    }

    /// Number of native animations waiting for an end event.
    pub fn running_animations(&self) -> usize {
        self.end_handlers.borrow().len()
    }

    pub(crate) fn animation_ended(
        &self,
        scheduler: &FrameScheduler,
        animation_id: AnimationId,
        finished: bool,
    ) {
        let handler = self.end_handlers.borrow_mut().remove(&animation_id);
        match handler {
            Some(handler) => handler(scheduler, finished),
            None => warn!(animation = %animation_id, "end event for unknown native animation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn recording_scheduler() -> (FrameScheduler, Rc<RefCell<OpQueue>>) {
        let queue = Rc::new(RefCell::new(OpQueue::new()));
        let scheduler = FrameScheduler::new().with_executor(Rc::clone(&queue));
        (scheduler, queue)
    }

    #[test]
    fn native_tag_emits_create_node_once() {
        let (scheduler, queue) = recording_scheduler();
        let value = Node::value(2.0);
        value.make_native(&scheduler).unwrap();

        let tag = value.native_tag(&scheduler).unwrap();
        value.native_tag(&scheduler).unwrap();
        assert_eq!(
            queue.borrow().ops(),
            &[NativeOp::CreateNode {
                tag,
                config: NativeConfig::Value { value: 2.0 },
            }]
        );
    }

    #[test]
    fn attach_under_native_parent_connects_and_detach_drops() {
        let (scheduler, queue) = recording_scheduler();
        let base = Node::value(1.0);
        base.make_native(&scheduler).unwrap();
        let sum = Node::add(&base, 1.0);

        sum.attach(&scheduler).unwrap();
        let base_tag = base.native_tag(&scheduler).unwrap();
        let sum_tag = sum.native_tag(&scheduler).unwrap();
        assert!(queue.borrow().ops().contains(&NativeOp::ConnectNodes {
            parent: base_tag,
            child: sum_tag,
        }));

        queue.borrow_mut().drain();
        sum.detach(&scheduler).unwrap();
        assert_eq!(
            queue.borrow().ops(),
            &[
                NativeOp::DisconnectNodes {
                    parent: base_tag,
                    child: sum_tag,
                },
                // `base` lost its last child and detached as well.
                NativeOp::DropNode { tag: base_tag },
                NativeOp::DropNode { tag: sum_tag },
            ]
        );
    }

    #[test]
    fn writing_a_native_value_emits_set_value() {
        let (scheduler, queue) = recording_scheduler();
        let value = Node::value(0.0);
        value.make_native(&scheduler).unwrap();
        let tag = value.native_tag(&scheduler).unwrap();

        value.set_value(&scheduler, 5.0).unwrap();
        assert_eq!(
            queue.borrow().ops().last(),
            Some(&NativeOp::SetValue { tag, value: 5.0 })
        );
    }

    #[test]
    fn end_events_run_their_handler_once() {
        let scheduler = FrameScheduler::new();
        let ended = Rc::new(Cell::new(None));
        let id = scheduler.native().next_animation_id();

        let slot = Rc::clone(&ended);
        scheduler.native().start_animation(
            id,
            NativeTag(1),
            AnimationConfig::Spring(crate::animation::SpringConfig::default().build().unwrap()),
            Box::new(move |_, finished| slot.set(Some(finished))),
        );
        assert_eq!(scheduler.native().running_animations(), 1);

        scheduler.native_animation_ended(id, true);
        scheduler.native_animation_ended(id, false);
        assert_eq!(ended.get(), Some(true));
        assert_eq!(scheduler.native().running_animations(), 0);
    }

    #[test]
    fn queue_encodes_batches() {
        let mut queue = OpQueue::new();
        queue.execute(NativeOp::SetValue {
            tag: NativeTag(1),
            value: 0.5,
        });
        queue.execute(NativeOp::DropNode { tag: NativeTag(1) });

        assert_eq!(
            queue.to_json().unwrap(),
            r#"[{"op":"setValue","tag":1,"value":0.5},{"op":"dropNode","tag":1}]"#
        );

        let bytes = queue.to_msgpack().unwrap();
        let decoded: serde_json::Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, serde_json::to_value(queue.ops()).unwrap());
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
    }
}
