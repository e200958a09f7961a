//! Arithmetic combinators.

use smallvec::SmallVec;
use tracing::warn;

use super::Operand;
use crate::error::Result;
use crate::graph::{FrameScheduler, Node, NodeKind, Parents};
use crate::native::NativeConfig;
use crate::value::Value;

/// Binary operation folded left over a node's operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl ArithmeticOp {
    /// Native type name of the operation.
    pub fn name(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "addition",
            ArithmeticOp::Subtract => "subtraction",
            ArithmeticOp::Multiply => "multiplication",
            ArithmeticOp::Divide => "division",
            ArithmeticOp::Modulo => "modulus",
        }
    }

    /// Apply the operation to two numbers.
    ///
    /// Division by zero yields 0. Modulo always has the sign of the divisor.
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Subtract => a - b,
            ArithmeticOp::Multiply => a * b,
            ArithmeticOp::Divide => {
                if b == 0.0 {
                    warn!(dividend = a, "division by zero in animated division");
                    0.0
                } else {
                    a / b
                }
            }
            ArithmeticOp::Modulo => ((a % b) + b) % b,
        }
    }

    /// Fold the operation over `values`. An empty list yields 0.
    pub fn fold(self, values: &[f64]) -> f64 {
        let Some((first, rest)) = values.split_first() else {
            return 0.0;
        };
        rest.iter().fold(*first, |acc, &next| self.apply(acc, next))
    }
}

/// Node state for [`NodeKind::Op`].
pub struct ArithmeticNode {
    op: ArithmeticOp,
    operands: SmallVec<[Operand; 2]>,
}

impl ArithmeticNode {
    pub fn op(&self) -> ArithmeticOp {
        self.op
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub(crate) fn parents(&self) -> Parents {
        self.operands.iter().filter_map(Operand::as_node).cloned().collect()
    }

    pub(crate) fn evaluate(&self, scheduler: &FrameScheduler) -> Result<Value> {
        let values = self
            .operands
            .iter()
            .map(|operand| operand.read(scheduler)?.as_number())
            .collect::<Result<SmallVec<[f64; 2]>>>()?;
        Ok(Value::Number(self.op.fold(&values)))
    }

    pub(crate) fn native_config(&self, scheduler: &FrameScheduler) -> Result<NativeConfig> {
        let input = self
            .operands
            .iter()
            .map(|operand| operand.to_native(scheduler))
            .collect::<Result<Vec<_>>>()?;
        Ok(NativeConfig::arithmetic(self.op, input))
    }
}

impl Node {
    /// Fold `op` over `operands`.
    pub fn arithmetic<I>(op: ArithmeticOp, operands: I) -> Node
    where
        I: IntoIterator<Item = Operand>,
    {
        Node::from_kind(NodeKind::Op(ArithmeticNode {
            op,
            operands: operands.into_iter().collect(),
        }))
    }

    pub fn add(a: impl Into<Operand>, b: impl Into<Operand>) -> Node {
        Node::arithmetic(ArithmeticOp::Add, [a.into(), b.into()])
    }

    pub fn subtract(a: impl Into<Operand>, b: impl Into<Operand>) -> Node {
        Node::arithmetic(ArithmeticOp::Subtract, [a.into(), b.into()])
    }

    pub fn multiply(a: impl Into<Operand>, b: impl Into<Operand>) -> Node {
        Node::arithmetic(ArithmeticOp::Multiply, [a.into(), b.into()])
    }

    pub fn divide(a: impl Into<Operand>, b: impl Into<Operand>) -> Node {
        Node::arithmetic(ArithmeticOp::Divide, [a.into(), b.into()])
    }

    pub fn modulo(a: impl Into<Operand>, modulus: f64) -> Node {
        Node::arithmetic(ArithmeticOp::Modulo, [a.into(), Operand::from(modulus)])
    }
}
