//! N-ary function nodes.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::Result;
use crate::graph::{FrameScheduler, Node, NodeKind, Parents};
use crate::value::Value;

/// Projection from input values to an output value.
pub type Processor = Rc<dyn Fn(&[Value]) -> Result<Value>>;

/// Node state for [`NodeKind::Functor`].
///
/// The processor must be free of side effects: it runs at most once per
/// frame for each change of its inputs, and its result is reused for every
/// consumer.
pub struct FunctorNode {
    inputs: Vec<Node>,
    processor: Processor,
}

impl FunctorNode {
    pub(crate) fn parents(&self) -> Parents {
        self.inputs.iter().cloned().collect()
    }

    pub(crate) fn evaluate(&self, scheduler: &FrameScheduler) -> Result<Value> {
        let values = self
            .inputs
            .iter()
            .map(|input| input.get_value(scheduler))
            .collect::<Result<SmallVec<[Value; 4]>>>()?;
        (self.processor)(&values)
    }
}

impl Node {
    /// Map the current values of `inputs` through `processor`.
    ///
    /// Functor nodes have no native projection.
    pub fn functor<F>(inputs: Vec<Node>, processor: F) -> Node
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Node::from_kind(NodeKind::Functor(FunctorNode {
            inputs,
            processor: Rc::new(processor),
        }))
    }
}
