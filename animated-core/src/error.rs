//! Error types for the animation graph.

use thiserror::Error;

use crate::graph::NodeId;
use crate::native::NativeTag;

/// Errors produced while building, evaluating, or projecting a node graph.
#[derive(Debug, Error)]
pub enum AnimatedError {
    /// Spring parameters from more than one preset family were supplied.
    #[error(
        "You can define one of bounciness/speed, tension/friction, or stiffness/damping/mass, but not more than one"
    )]
    MixedSpringPresets,

    /// A spring parameter resolved to zero or a negative value.
    #[error("{name} value must be greater than 0 (got {value})")]
    NonPositiveParameter { name: &'static str, value: f64 },

    /// The node kind has no native projection.
    #[error("node type `{kind}` cannot be used as a native animated node")]
    NativeUnsupported { kind: &'static str },

    /// A native tag was requested from a node that was never made native.
    #[error("attempt to get native tag from node {node} not marked as native")]
    NotNative { node: NodeId },

    /// `set_value` was called on a node that is not a settable leaf.
    #[error("node {node} of type `{kind}` cannot be set")]
    NotSettable { node: NodeId, kind: &'static str },

    /// A node produced a value of the wrong shape for its consumer.
    #[error("expected a {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Interpolation ranges are malformed.
    #[error("invalid interpolation config: {0}")]
    InvalidInterpolation(String),

    /// A transform property the native side does not understand.
    #[error("property `{property}` is not supported by native animated transforms")]
    UnsupportedTransform { property: String },

    /// A native op referenced a tag the executor never created.
    #[error("unknown native node {tag}")]
    UnknownNativeNode { tag: NativeTag },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnimatedError>;
