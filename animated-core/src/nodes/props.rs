//! Property sinks.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{AnimatedError, Result};
use crate::graph::{FrameScheduler, Node, NodeKind, Parents};
use crate::native::NativeConfig;
use crate::value::Value;

/// Consumer of committed property values.
pub type PropsSink = Rc<dyn Fn(&IndexMap<String, Value>)>;

/// Node state for [`NodeKind::Props`].
///
/// A props node maps property names to nodes. It is where the flush pass
/// stops: committing it evaluates every property and hands the map to the
/// sink.
pub struct PropsNode {
    props: IndexMap<String, Node>,
    sink: PropsSink,
}

impl PropsNode {
    pub fn props(&self) -> &IndexMap<String, Node> {
        &self.props
    }

    pub(crate) fn parents(&self) -> Parents {
        self.props.values().cloned().collect()
    }

    pub(crate) fn evaluate(&self, scheduler: &FrameScheduler) -> Result<Value> {
        let mut values = IndexMap::with_capacity(self.props.len());
        for (name, node) in &self.props {
            values.insert(name.clone(), node.get_value(scheduler)?);
        }
        Ok(Value::Map(values))
    }

    pub(crate) fn commit(&self, node: &Node, scheduler: &FrameScheduler) -> Result<()> {
        match node.get_value(scheduler)? {
            Value::Map(values) => {
                (self.sink)(&values);
                Ok(())
            }
            other => Err(AnimatedError::TypeMismatch {
                expected: "map",
                found: other.type_name(),
            }),
        }
    }

    pub(crate) fn native_config(&self, scheduler: &FrameScheduler) -> Result<NativeConfig> {
        let mut props = IndexMap::with_capacity(self.props.len());
        for (name, node) in &self.props {
            props.insert(name.clone(), node.native_tag(scheduler)?);
        }
        Ok(NativeConfig::Props { props })
    }
}

impl Node {
    /// Create a props node that pushes its values to `sink` on commit.
    pub fn props<F>(props: IndexMap<String, Node>, sink: F) -> Node
    where
        F: Fn(&IndexMap<String, Value>) + 'static,
    {
        Node::from_kind(NodeKind::Props(PropsNode {
            props,
            sink: Rc::new(sink),
        }))
    }
}
