//! Animated Core
//!
//! This crate provides an incrementally evaluated dataflow graph for
//! animated values. It implements:
//!
//! - A node graph with memoized, pull-based evaluation that recomputes only
//!   what a write reaches
//! - Combinator nodes (arithmetic, functors, conditionals, interpolation,
//!   transform lists, diff-clamp, property sinks)
//! - A closed-form damped spring integrator, spring animations and
//!   frame-table animations
//! - A frame scheduler that steps animations and flushes property updates
//! - Native projection of subgraphs to an out-of-process executor
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Node handles, memoized evaluation, attach/detach, scheduler
//! - `nodes`: Combinator node kinds
//! - `animation`: Spring and frame-table drivers, timing step, lifecycle
//! - `native`: Wire format, native bridge, and reference executor
//!
//! # Example
//!
//! ```rust
//! use animated_core::animation::{Animation, SpringAnimation, SpringConfig};
//! use animated_core::graph::{FrameScheduler, Node};
//!
//! let scheduler = FrameScheduler::new();
//! let progress = Node::value(0.0);
//! let width = Node::multiply(&progress, 200.0);
//!
//! let mut spring = SpringAnimation::new(SpringConfig::to(1.0)).unwrap();
//! spring.start(&scheduler, &progress, None).unwrap();
//!
//! for frame in 0..300 {
//!     scheduler.tick(frame as f64 * 16.0);
//! }
//! assert_eq!(width.number(&scheduler).unwrap(), 200.0);
//! ```

pub mod animation;
pub mod error;
pub mod graph;
pub mod native;
pub mod nodes;
pub mod value;

pub use error::{AnimatedError, Result};
pub use graph::{FrameScheduler, Node, NodeId, NodeKind};
pub use value::Value;
