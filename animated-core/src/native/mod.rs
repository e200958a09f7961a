//! Native Projection
//!
//! Nodes promoted with `make_native` are mirrored to an out-of-process
//! executor as a stream of [`NativeOp`]s. This module holds the wire types,
//! the bridge that emits them, and [`NativeGraph`], an in-process executor
//! that evaluates the mirrored graph.

mod bridge;
mod config;
mod graph;

pub use bridge::{EndHandler, NativeBridge, NativeExecutor, OpQueue, TracingExecutor};
pub use config::{
    AnimationConfig, AnimationId, NativeConfig, NativeOp, NativeOperand, NativeTag,
    TransformConfig,
};
pub use graph::NativeGraph;
