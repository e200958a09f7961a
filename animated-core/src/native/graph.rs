//! Reference native executor.
//!
//! `NativeGraph` applies [`NativeOp`]s to an in-memory node table and
//! evaluates it with the same projection functions the local graph uses.
//! Spring and frame-table drivers are stepped with the same functions the
//! local drivers use. It serves as the executor for headless hosts and as
//! the oracle for local/native equivalence.

use std::cell::Cell;
use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{trace, warn};

use super::bridge::NativeExecutor;
use super::config::{
    AnimationConfig, AnimationId, NativeConfig, NativeOp, NativeOperand, NativeTag,
    TransformConfig,
};
use crate::animation::{FramePlayback, FramesParams, SpringMotion, SpringParams};
use crate::error::{AnimatedError, Result};
use crate::nodes::{ArithmeticOp, DiffClampState, InterpolationConfig};
use crate::value::Value;

struct NativeNode {
    config: NativeConfig,
    /// Current value of a value node.
    value: Cell<f64>,
    diff_clamp: Cell<Option<DiffClampState>>,
    children: Vec<NativeTag>,
}

struct NativeAnimation {
    node: NativeTag,
    driver: NativeDriver,
}

enum NativeDriver {
    Spring {
        params: SpringParams,
        motion: SpringMotion,
        started_at: Option<f64>,
        iterations_done: u32,
        start_position: f64,
    },
    Frames {
        params: FramesParams,
        playback: FramePlayback,
    },
}

impl NativeDriver {
    fn new(config: AnimationConfig, start_position: f64) -> Self {
        match config {
            AnimationConfig::Spring(params) => NativeDriver::Spring {
                motion: SpringMotion::new(start_position, params.initial_velocity),
                params,
                started_at: None,
                iterations_done: 0,
                start_position,
            },
            AnimationConfig::Frames(params) => NativeDriver::Frames {
                params,
                playback: FramePlayback::default(),
            },
        }
    }

    /// Step the driven `value` to `now`. Returns whether the animation ended.
    fn advance(&mut self, now: f64, value: &Cell<f64>) -> bool {
        match self {
            NativeDriver::Spring {
                params,
                motion,
                started_at,
                iterations_done,
                start_position,
            } => {
                let started_at = *started_at.get_or_insert(now);
                if now - started_at < params.delay {
                    return false;
                }

                motion.position = value.get();
                motion.advance(now, params);
                value.set(motion.position);
                if !motion.finished {
                    return false;
                }

                *iterations_done += 1;
                if params.repeats_after(*iterations_done) {
                    *motion = SpringMotion::new(*start_position, params.initial_velocity);
                    value.set(*start_position);
                    return false;
                }
                true
            }
            NativeDriver::Frames { params, playback } => {
                if let Some(sample) = playback.advance(now, value.get(), params) {
                    value.set(sample);
                }
                playback.finished
            }
        }
    }
}

/// In-memory executor that evaluates native nodes and drives their
/// animations.
#[derive(Default)]
pub struct NativeGraph {
    nodes: HashMap<NativeTag, NativeNode>,
    animations: IndexMap<AnimationId, NativeAnimation>,
    /// Animations that lost their node, reported by the next `step`.
    dropped: Vec<(AnimationId, bool)>,
}

impl NativeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a node with `tag` exists.
    pub fn contains(&self, tag: NativeTag) -> bool {
        self.nodes.contains_key(&tag)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Config the node `tag` was created with.
    pub fn config(&self, tag: NativeTag) -> Option<&NativeConfig> {
        self.nodes.get(&tag).map(|node| &node.config)
    }

    /// Children connected under `tag`, in connection order.
    pub fn children(&self, tag: NativeTag) -> &[NativeTag] {
        self.nodes
            .get(&tag)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Number of animations still being stepped.
    pub fn running_animations(&self) -> usize {
        self.animations.len()
    }

    fn node(&self, tag: NativeTag) -> Result<&NativeNode> {
        self.nodes
            .get(&tag)
            .ok_or(AnimatedError::UnknownNativeNode { tag })
    }

    /// Evaluate the node `tag`.
    pub fn value(&self, tag: NativeTag) -> Result<Value> {
        let node = self.node(tag)?;
        match &node.config {
            NativeConfig::Value { .. } => Ok(Value::Number(node.value.get())),
            NativeConfig::Addition { input } => self.fold(ArithmeticOp::Add, input),
            NativeConfig::Subtraction { input } => self.fold(ArithmeticOp::Subtract, input),
            NativeConfig::Multiplication { input } => self.fold(ArithmeticOp::Multiply, input),
            NativeConfig::Division { input } => self.fold(ArithmeticOp::Divide, input),
            NativeConfig::Modulus { input } => self.fold(ArithmeticOp::Modulo, input),
            NativeConfig::Interpolation {
                input,
                input_range,
                output_range,
                extrapolate_left,
                extrapolate_right,
            } => {
                let interpolation = InterpolationConfig {
                    input_range: input_range.clone(),
                    output_range: output_range.clone(),
                    extrapolate_left: *extrapolate_left,
                    extrapolate_right: *extrapolate_right,
                };
                interpolation.validate()?;
                Ok(Value::Number(interpolation.apply(self.number(*input)?)))
            }
            NativeConfig::Diffclamp { input, min, max } => {
                let input = self.number(*input)?;
                let next = DiffClampState::advance(node.diff_clamp.get(), input, *min, *max);
                node.diff_clamp.set(Some(next));
                Ok(Value::Number(next.value))
            }
            NativeConfig::Cond {
                condition,
                if_block,
                else_block,
            } => {
                if self.operand(condition)?.is_truthy() {
                    self.operand(if_block)
                } else {
                    self.operand(else_block)
                }
            }
            NativeConfig::Transform { transforms } => {
                let mut list = Vec::with_capacity(transforms.len());
                for transform in transforms {
                    let (property, value) = match transform {
                        TransformConfig::Animated { property, node_tag } => {
                            (property, self.value(*node_tag)?)
                        }
                        TransformConfig::Static { property, value } => (property, value.clone()),
                    };
                    let mut entry = IndexMap::with_capacity(1);
                    entry.insert(property.clone(), value);
                    list.push(Value::Map(entry));
                }
                Ok(Value::List(list))
            }
            NativeConfig::Props { props } => {
                let mut values = IndexMap::with_capacity(props.len());
                for (name, tag) in props {
                    values.insert(name.clone(), self.value(*tag)?);
                }
                Ok(Value::Map(values))
            }
        }
    }

    pub fn number(&self, tag: NativeTag) -> Result<f64> {
        self.value(tag)?.as_number()
    }

    fn fold(&self, op: ArithmeticOp, input: &[NativeOperand]) -> Result<Value> {
        let values = input
            .iter()
            .map(|operand| self.operand(operand)?.as_number())
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Number(op.fold(&values)))
    }

    fn operand(&self, operand: &NativeOperand) -> Result<Value> {
        match operand {
            NativeOperand::Node(tag) => self.value(*tag),
            NativeOperand::Value(value) => Ok(value.clone()),
        }
    }

    /// Step every running animation to `now` (milliseconds).
    ///
    /// Returns the animations that ended since the previous step and whether
    /// each came to rest on its own. Animations whose node was dropped end
    /// unfinished.
    pub fn step(&mut self, now: f64) -> Vec<(AnimationId, bool)> {
        let mut ended = std::mem::take(&mut self.dropped);

        for (id, animation) in self.animations.iter_mut() {
            let Some(node) = self.nodes.get(&animation.node) else {
                ended.push((*id, false));
                continue;
            };
            if animation.driver.advance(now, &node.value) {
                ended.push((*id, true));
            }
        }

        self.animations
            .retain(|id, _| !ended.iter().any(|(ended_id, _)| ended_id == id));
        ended
    }

    fn start_animation(&mut self, id: AnimationId, node_tag: NativeTag, config: AnimationConfig) {
        let start_position = match self.nodes.get(&node_tag) {
            Some(node) if matches!(node.config, NativeConfig::Value { .. }) => node.value.get(),
            Some(_) => {
                warn!(tag = %node_tag, animation = %id, "only value nodes can be animated");
                self.dropped.push((id, false));
                return;
            }
            None => {
                warn!(tag = %node_tag, animation = %id, "animating unknown native node");
                self.dropped.push((id, false));
                return;
            }
        };

        self.animations.insert(
            id,
            NativeAnimation {
                node: node_tag,
                driver: NativeDriver::new(config, start_position),
            },
        );
    }

    fn drop_node(&mut self, tag: NativeTag) {
        self.nodes.remove(&tag);
        let dropped = &mut self.dropped;
        self.animations.retain(|id, animation| {
            if animation.node != tag {
                return true;
            }
            trace!(%tag, animation = %id, "animated node dropped");
            dropped.push((*id, false));
            false
        });
    }
}

impl NativeExecutor for NativeGraph {
    fn execute(&mut self, op: NativeOp) {
        trace!(?op, "applying native op");
        match op {
            NativeOp::CreateNode { tag, config } => {
                let value = match config {
                    NativeConfig::Value { value } => value,
                    _ => 0.0,
                };
                self.nodes.insert(
                    tag,
                    NativeNode {
                        config,
                        value: Cell::new(value),
                        diff_clamp: Cell::new(None),
                        children: Vec::new(),
                    },
                );
            }
            NativeOp::DropNode { tag } => self.drop_node(tag),
            NativeOp::ConnectNodes { parent, child } => match self.nodes.get_mut(&parent) {
                Some(node) => node.children.push(child),
                None => warn!(%parent, %child, "connecting unknown native node"),
            },
            NativeOp::DisconnectNodes { parent, child } => {
                if let Some(node) = self.nodes.get_mut(&parent) {
                    node.children.retain(|existing| *existing != child);
                }
            }
            NativeOp::SetValue { tag, value } => match self.nodes.get(&tag) {
                Some(node) if matches!(node.config, NativeConfig::Value { .. }) => {
                    node.value.set(value);
                }
                _ => warn!(%tag, "setting value of a missing or non-value native node"),
            },
            NativeOp::StartAnimatingNode {
                animation_id,
                node_tag,
                config,
            } => self.start_animation(animation_id, node_tag, config),
            NativeOp::StopAnimation { animation_id } => {
                self.animations.shift_remove(&animation_id);
            }
        }
    }
}
