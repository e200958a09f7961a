//! Animation Graph
//!
//! This module implements the dataflow graph that drives animated values
//! and the scheduler that evaluates it once per frame.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph where:
//!
//! - Nodes produce values (constants, the clock, springs, combinators)
//! - Edges run from an input ("parent") to the node that reads it ("child")
//!
//! Evaluation is pull-based: reading a node recomputes it only if its memo
//! was computed in an earlier frame or a value upstream of it was written
//! since, recursing into parents as needed. Changes are pushed only as far
//! as the dirty set, which the scheduler turns into commits after each
//! frame.
//!
//! # Design Decisions
//!
//! 1. Node kinds are a closed enum, so dispatch over evaluation, parents,
//!    and native projection is a single `match`.
//!
//! 2. All process-wide state (clock, queues, dirty set, native tags) lives in
//!    an explicit [`FrameScheduler`], so independent graphs never share
//!    state.
//!
//! 3. Child registration acts as a reference count: only transitions to and
//!    from zero children recurse.

mod node;
mod scheduler;

pub use node::{Node, NodeId, NodeKind};
pub(crate) use node::Parents;
pub use scheduler::{FrameHost, FrameScheduler, ManualHost, StepFn};
