//! Piecewise-linear interpolation.

use serde::{Deserialize, Serialize};

use crate::error::{AnimatedError, Result};
use crate::graph::{FrameScheduler, Node, NodeKind, Parents};
use crate::native::NativeConfig;
use crate::value::Value;

/// Behavior outside the input range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extrapolate {
    /// Continue the nearest segment.
    #[default]
    Extend,
    /// Hold the edge of the output range.
    Clamp,
    /// Return the input unchanged.
    Identity,
}

/// Mapping from an input range onto an output range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationConfig {
    pub input_range: Vec<f64>,
    pub output_range: Vec<f64>,
    #[serde(default)]
    pub extrapolate_left: Extrapolate,
    #[serde(default)]
    pub extrapolate_right: Extrapolate,
}

impl InterpolationConfig {
    pub fn new(input_range: Vec<f64>, output_range: Vec<f64>) -> Self {
        Self {
            input_range,
            output_range,
            extrapolate_left: Extrapolate::Extend,
            extrapolate_right: Extrapolate::Extend,
        }
    }

    /// Set both extrapolation modes.
    pub fn extrapolate(mut self, mode: Extrapolate) -> Self {
        self.extrapolate_left = mode;
        self.extrapolate_right = mode;
        self
    }

    /// Check range lengths and ordering.
    pub fn validate(&self) -> Result<()> {
        if self.input_range.len() < 2 {
            return Err(AnimatedError::InvalidInterpolation(
                "inputRange must have at least 2 elements".to_string(),
            ));
        }
        if self.input_range.len() != self.output_range.len() {
            return Err(AnimatedError::InvalidInterpolation(format!(
                "inputRange ({}) and outputRange ({}) must have the same length",
                self.input_range.len(),
                self.output_range.len()
            )));
        }
        if let Some(pair) = self.input_range.windows(2).find(|pair| pair[1] < pair[0]) {
            return Err(AnimatedError::InvalidInterpolation(format!(
                "inputRange must be monotonically non-decreasing ({} > {})",
                pair[0], pair[1]
            )));
        }
        Ok(())
    }

    /// Map `input` through the configured ranges.
    pub fn apply(&self, input: f64) -> f64 {
        let index = find_range(input, &self.input_range);
        interpolate(
            input,
            self.input_range[index],
            self.input_range[index + 1],
            self.output_range[index],
            self.output_range[index + 1],
            self.extrapolate_left,
            self.extrapolate_right,
        )
    }
}

/// Index of the segment `input` falls into.
fn find_range(input: f64, range: &[f64]) -> usize {
    let mut index = 1;
    while index < range.len() - 1 {
        if range[index] >= input {
            break;
        }
        index += 1;
    }
    index - 1
}

fn interpolate(
    input: f64,
    input_min: f64,
    input_max: f64,
    output_min: f64,
    output_max: f64,
    left: Extrapolate,
    right: Extrapolate,
) -> f64 {
    let mut result = input;

    if result < input_min {
        match left {
            Extrapolate::Identity => return result,
            Extrapolate::Clamp => result = input_min,
            Extrapolate::Extend => {}
        }
    }
    if result > input_max {
        match right {
            Extrapolate::Identity => return result,
            Extrapolate::Clamp => result = input_max,
            Extrapolate::Extend => {}
        }
    }

    if output_min == output_max {
        return output_min;
    }
    if input_min == input_max {
        return if input <= input_min { output_min } else { output_max };
    }

    output_min + (output_max - output_min) * (result - input_min) / (input_max - input_min)
}

/// Node state for [`NodeKind::Interpolation`].
pub struct InterpolationNode {
    input: Node,
    config: InterpolationConfig,
}

impl InterpolationNode {
    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    pub(crate) fn parents(&self) -> Parents {
        Parents::from_elem(self.input.clone(), 1)
    }

    pub(crate) fn evaluate(&self, scheduler: &FrameScheduler) -> Result<Value> {
        let input = self.input.number(scheduler)?;
        Ok(Value::Number(self.config.apply(input)))
    }

    pub(crate) fn native_config(&self, scheduler: &FrameScheduler) -> Result<NativeConfig> {
        Ok(NativeConfig::Interpolation {
            input: self.input.native_tag(scheduler)?,
            input_range: self.config.input_range.clone(),
            output_range: self.config.output_range.clone(),
            extrapolate_left: self.config.extrapolate_left,
            extrapolate_right: self.config.extrapolate_right,
        })
    }
}

impl Node {
    /// Interpolate `input` through `config`.
    pub fn interpolate(input: &Node, config: InterpolationConfig) -> Result<Node> {
        config.validate()?;
        Ok(Node::from_kind(NodeKind::Interpolation(InterpolationNode {
            input: input.clone(),
            config,
        })))
    }
}
