//! Serializable descriptions of native nodes and the ops that drive them.
//!
//! These types are the wire format between the local graph and an
//! out-of-process executor. Field names follow the executor's camelCase
//! convention.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::animation::{FramesParams, SpringParams};
use crate::nodes::{ArithmeticOp, Extrapolate};
use crate::value::Value;

/// Handle of a node on the native side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeTag(pub u32);

impl fmt::Display for NativeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Handle of a running native animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimationId(pub u32);

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anim{}", self.0)
    }
}

/// An operand as seen by the executor: another native node or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NativeOperand {
    Node(NativeTag),
    Value(Value),
}

/// One entry of a native transform list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransformConfig {
    Animated {
        property: String,
        #[serde(rename = "nodeTag")]
        node_tag: NativeTag,
    },
    Static {
        property: String,
        value: Value,
    },
}

/// Node description sent with `CreateNode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NativeConfig {
    Value {
        value: f64,
    },
    Addition {
        input: Vec<NativeOperand>,
    },
    Subtraction {
        input: Vec<NativeOperand>,
    },
    Multiplication {
        input: Vec<NativeOperand>,
    },
    Division {
        input: Vec<NativeOperand>,
    },
    Modulus {
        input: Vec<NativeOperand>,
    },
    Interpolation {
        input: NativeTag,
        #[serde(rename = "inputRange")]
        input_range: Vec<f64>,
        #[serde(rename = "outputRange")]
        output_range: Vec<f64>,
        #[serde(rename = "extrapolateLeft")]
        extrapolate_left: Extrapolate,
        #[serde(rename = "extrapolateRight")]
        extrapolate_right: Extrapolate,
    },
    Diffclamp {
        input: NativeTag,
        min: f64,
        max: f64,
    },
    Cond {
        condition: NativeOperand,
        #[serde(rename = "ifBlock")]
        if_block: NativeOperand,
        #[serde(rename = "elseBlock")]
        else_block: NativeOperand,
    },
    Transform {
        transforms: Vec<TransformConfig>,
    },
    Props {
        props: IndexMap<String, NativeTag>,
    },
}

impl NativeConfig {
    /// Config for an arithmetic node.
    pub fn arithmetic(op: ArithmeticOp, input: Vec<NativeOperand>) -> Self {
        match op {
            ArithmeticOp::Add => NativeConfig::Addition { input },
            ArithmeticOp::Subtract => NativeConfig::Subtraction { input },
            ArithmeticOp::Multiply => NativeConfig::Multiplication { input },
            ArithmeticOp::Divide => NativeConfig::Division { input },
            ArithmeticOp::Modulo => NativeConfig::Modulus { input },
        }
    }
}

/// Animation driver description sent with `StartAnimatingNode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnimationConfig {
    Spring(SpringParams),
    /// Precomputed 60 Hz frame table.
    Frames(FramesParams),
}

/// A single instruction to the native executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum NativeOp {
    CreateNode {
        tag: NativeTag,
        config: NativeConfig,
    },
    DropNode {
        tag: NativeTag,
    },
    ConnectNodes {
        parent: NativeTag,
        child: NativeTag,
    },
    DisconnectNodes {
        parent: NativeTag,
        child: NativeTag,
    },
    SetValue {
        tag: NativeTag,
        value: f64,
    },
    StartAnimatingNode {
        #[serde(rename = "animationId")]
        animation_id: AnimationId,
        #[serde(rename = "nodeTag")]
        node_tag: NativeTag,
        config: AnimationConfig,
    },
    StopAnimation {
        #[serde(rename = "animationId")]
        animation_id: AnimationId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_node_wire_format() {
        let op = NativeOp::CreateNode {
            tag: NativeTag(3),
            config: NativeConfig::Addition {
                input: vec![
                    NativeOperand::Node(NativeTag(1)),
                    NativeOperand::Value(Value::Number(2.0)),
                ],
            },
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({
                "op": "createNode",
                "tag": 3,
                "config": {
                    "type": "addition",
                    "input": [{"node": 1}, {"value": 2.0}]
                }
            })
        );
    }

    #[test]
    fn cond_and_transform_use_camel_case_fields() {
        let cond = NativeConfig::Cond {
            condition: NativeOperand::Node(NativeTag(1)),
            if_block: NativeOperand::Value(Value::from("45deg")),
            else_block: NativeOperand::Value(Value::from("0deg")),
        };
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json["type"], "cond");
        assert_eq!(json["ifBlock"], json!({"value": "45deg"}));

        let transform = TransformConfig::Animated {
            property: "rotate".to_string(),
            node_tag: NativeTag(7),
        };
        assert_eq!(
            serde_json::to_value(&transform).unwrap(),
            json!({"type": "animated", "property": "rotate", "nodeTag": 7})
        );
    }

    #[test]
    fn ops_parse_back_from_json() {
        let json = r#"{"op":"startAnimatingNode","animationId":4,"nodeTag":2,
            "config":{"type":"spring","stiffness":100.0,"damping":10.0,"mass":1.0,
            "toValue":1.0,"initialVelocity":0.0,"overshootClamping":false,
            "restSpeedThreshold":0.001,"restDisplacementThreshold":0.001,
            "delay":0.0,"iterations":1,"isInteraction":true,"useNativeDriver":true}}"#;
        let op: NativeOp = serde_json::from_str(json).unwrap();
        let NativeOp::StartAnimatingNode { animation_id, node_tag, config } = op else {
            panic!("expected startAnimatingNode");
        };
        assert_eq!(animation_id, AnimationId(4));
        assert_eq!(node_tag, NativeTag(2));
        let AnimationConfig::Spring(params) = config else {
            panic!("expected a spring config");
        };
        assert_eq!(params.to_value, 1.0);
        assert_eq!(params.iterations, 1);
    }
}
