//! Timing step nodes.

use crate::error::{AnimatedError, Result};
use crate::graph::{FrameScheduler, Node, NodeKind, Parents};
use crate::value::Value;

/// Node state for [`NodeKind::Timing`].
///
/// Evaluating the node copies its input's value into a target value node.
/// Memoization bounds the write to once per frame for each change of the
/// input.
pub struct TimingStep {
    target: Node,
    input: Node,
}

impl TimingStep {
    /// The value node written on evaluation.
    pub fn target(&self) -> &Node {
        &self.target
    }

    pub(crate) fn parents(&self) -> Parents {
        Parents::from_elem(self.input.clone(), 1)
    }

    pub(crate) fn evaluate(&self, scheduler: &FrameScheduler) -> Result<Value> {
        let value = self.input.number(scheduler)?;
        self.target.set_value(scheduler, value)?;
        Ok(Value::Number(value))
    }
}

impl Node {
    /// Create a step that writes `input` into the value node `target` each
    /// time it is evaluated.
    pub fn timing_step(target: &Node, input: &Node) -> Result<Node> {
        if !matches!(target.kind(), NodeKind::Value(_)) {
            return Err(AnimatedError::NotSettable {
                node: target.id(),
                kind: target.kind_name(),
            });
        }
        Ok(Node::from_kind(NodeKind::Timing(TimingStep {
            target: target.clone(),
            input: input.clone(),
        })))
    }
}
