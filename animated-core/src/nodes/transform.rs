//! Transform lists such as `[{translateX: x}, {rotate: "45deg"}]`.

use indexmap::IndexMap;

use crate::error::{AnimatedError, Result};
use crate::graph::{FrameScheduler, Node, NodeKind, Parents};
use crate::native::{NativeConfig, TransformConfig};
use crate::value::Value;

use super::Operand;

/// Transform properties an out-of-process executor can animate.
pub const NATIVE_TRANSFORM_PROPERTIES: &[&str] = &[
    "translateX",
    "translateY",
    "scale",
    "scaleX",
    "scaleY",
    "rotate",
    "rotateX",
    "rotateY",
    "rotateZ",
    "perspective",
];

/// One entry of a transform list.
#[derive(Debug, Clone)]
pub struct TransformEntry {
    pub property: String,
    pub value: Operand,
}

/// Node state for [`NodeKind::Transform`].
pub struct TransformNode {
    entries: Vec<TransformEntry>,
}

impl TransformNode {
    pub fn entries(&self) -> &[TransformEntry] {
        &self.entries
    }

    pub(crate) fn parents(&self) -> Parents {
        self.entries
            .iter()
            .filter_map(|entry| entry.value.as_node())
            .cloned()
            .collect()
    }

    pub(crate) fn evaluate(&self, scheduler: &FrameScheduler) -> Result<Value> {
        let mut list = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let mut map = IndexMap::with_capacity(1);
            map.insert(entry.property.clone(), entry.value.read(scheduler)?);
            list.push(Value::Map(map));
        }
        Ok(Value::List(list))
    }

    pub(crate) fn native_config(&self, scheduler: &FrameScheduler) -> Result<NativeConfig> {
        let mut transforms = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !NATIVE_TRANSFORM_PROPERTIES.contains(&entry.property.as_str()) {
                return Err(AnimatedError::UnsupportedTransform {
                    property: entry.property.clone(),
                });
            }
            let property = entry.property.clone();
            transforms.push(match &entry.value {
                Operand::Node(node) => TransformConfig::Animated {
                    property,
                    node_tag: node.native_tag(scheduler)?,
                },
                Operand::Literal(value) => TransformConfig::Static {
                    property,
                    value: value.clone(),
                },
            });
        }
        Ok(NativeConfig::Transform { transforms })
    }
}

impl Node {
    /// Build a transform list from `(property, operand)` pairs, in order.
    pub fn transform<I, K>(entries: I) -> Node
    where
        I: IntoIterator<Item = (K, Operand)>,
        K: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(property, value)| TransformEntry {
                property: property.into(),
                value,
            })
            .collect();
        Node::from_kind(NodeKind::Transform(TransformNode { entries }))
    }
}
