//! Rate-limited accumulator.
//!
//! A diff-clamp node follows the *changes* of its input rather than its
//! value: each evaluation adds the input's delta since the previous
//! evaluation to an accumulator clamped to `[min, max]`. This makes it the
//! one combinator whose output is not a pure function of its input.
//!
//! The running state advances only when the node is actually evaluated, so
//! it inherits the memoization contract: however many consumers pull the
//! node, the state advances once per change of its input. Pulling again in
//! a later frame with an unchanged input adds a zero delta.

use std::cell::Cell;

use crate::error::Result;
use crate::graph::{FrameScheduler, Node, NodeKind, Parents};
use crate::native::NativeConfig;
use crate::value::Value;

/// Running state of a diff-clamp accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffClampState {
    /// Clamped accumulator.
    pub value: f64,
    /// Input seen at the previous evaluation.
    pub last: f64,
}

impl DiffClampState {
    /// Fold one input sample into `state`, seeding it on the first sample.
    pub fn advance(state: Option<Self>, input: f64, min: f64, max: f64) -> Self {
        let state = state.unwrap_or(Self {
            value: input,
            last: input,
        });
        let diff = input - state.last;
        Self {
            value: (state.value + diff).max(min).min(max),
            last: input,
        }
    }
}

/// Node state for [`NodeKind::DiffClamp`].
pub struct DiffClampNode {
    input: Node,
    min: f64,
    max: f64,
    state: Cell<Option<DiffClampState>>,
}

impl DiffClampNode {
    /// Current accumulator state, `None` before the first evaluation.
    pub fn state(&self) -> Option<DiffClampState> {
        self.state.get()
    }

    pub(crate) fn parents(&self) -> Parents {
        Parents::from_elem(self.input.clone(), 1)
    }

    pub(crate) fn evaluate(&self, scheduler: &FrameScheduler) -> Result<Value> {
        let input = self.input.number(scheduler)?;
        let next = DiffClampState::advance(self.state.get(), input, self.min, self.max);
        self.state.set(Some(next));
        Ok(Value::Number(next.value))
    }

    pub(crate) fn native_config(&self, scheduler: &FrameScheduler) -> Result<NativeConfig> {
        Ok(NativeConfig::Diffclamp {
            input: self.input.native_tag(scheduler)?,
            min: self.min,
            max: self.max,
        })
    }
}

impl Node {
    /// Accumulate changes of `input`, clamped to `[min, max]`.
    pub fn diff_clamp(input: &Node, min: f64, max: f64) -> Node {
        Node::from_kind(NodeKind::DiffClamp(DiffClampNode {
            input: input.clone(),
            min,
            max,
            state: Cell::new(None),
        }))
    }
}
