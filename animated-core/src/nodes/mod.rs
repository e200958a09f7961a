//! Combinator nodes.
//!
//! Each module adds one node kind: its state struct, its projection from
//! parent values, its native config, and a constructor on [`Node`].
//!
//! [`Node`]: crate::graph::Node

mod arithmetic;
mod cond;
mod diff_clamp;
mod functor;
mod interpolation;
mod operand;
mod props;
mod transform;

pub use arithmetic::{ArithmeticNode, ArithmeticOp};
pub use cond::CondNode;
pub use diff_clamp::{DiffClampNode, DiffClampState};
pub use functor::{FunctorNode, Processor};
pub use interpolation::{Extrapolate, InterpolationConfig, InterpolationNode};
pub use operand::Operand;
pub use props::{PropsNode, PropsSink};
pub use transform::{TransformEntry, TransformNode, NATIVE_TRANSFORM_PROPERTIES};
