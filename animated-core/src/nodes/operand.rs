//! Operands: a literal or a node reference.

use std::fmt;

use crate::error::Result;
use crate::graph::{FrameScheduler, Node};
use crate::native::NativeOperand;
use crate::value::Value;

/// An input that is either a fixed value or another node.
///
/// Only node operands become graph edges.
#[derive(Clone)]
pub enum Operand {
    Literal(Value),
    Node(Node),
}

impl Operand {
    /// Resolve the operand's current value.
    pub fn read(&self, scheduler: &FrameScheduler) -> Result<Value> {
        match self {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Node(node) => node.get_value(scheduler),
        }
    }

    /// The referenced node, if any.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Operand::Literal(_) => None,
            Operand::Node(node) => Some(node),
        }
    }

    pub(crate) fn to_native(&self, scheduler: &FrameScheduler) -> Result<NativeOperand> {
        match self {
            Operand::Literal(value) => Ok(NativeOperand::Value(value.clone())),
            Operand::Node(node) => Ok(NativeOperand::Node(node.native_tag(scheduler)?)),
        }
    }
}

impl From<Node> for Operand {
    fn from(node: Node) -> Self {
        Operand::Node(node)
    }
}

impl From<&Node> for Operand {
    fn from(node: &Node) -> Self {
        Operand::Node(node.clone())
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Literal(Value::Number(n))
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Literal(Value::from(s))
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Operand::Node(node) => f.debug_tuple("Node").field(&node.id()).finish(),
        }
    }
}
