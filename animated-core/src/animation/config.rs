//! Spring configuration and preset conversion.
//!
//! A spring can be described by physical parameters
//! (stiffness/damping/mass) or by one of two Origami presets
//! (bounciness/speed or tension/friction). Presets resolve to physical
//! parameters with mass 1.

use serde::{Deserialize, Serialize};

use crate::error::{AnimatedError, Result};

/// Caller-facing spring configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpringConfig {
    pub to_value: Option<f64>,
    pub velocity: Option<f64>,
    pub overshoot_clamping: Option<bool>,
    pub rest_displacement_threshold: Option<f64>,
    pub rest_speed_threshold: Option<f64>,

    pub stiffness: Option<f64>,
    pub damping: Option<f64>,
    pub mass: Option<f64>,

    pub bounciness: Option<f64>,
    pub speed: Option<f64>,

    pub tension: Option<f64>,
    pub friction: Option<f64>,

    /// Milliseconds of loop time to wait before stepping.
    pub delay: Option<f64>,
    /// Number of runs; `-1` repeats forever.
    pub iterations: Option<i32>,
    pub is_interaction: Option<bool>,
    pub use_native_driver: Option<bool>,
}

/// Resolved, immutable spring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    pub to_value: f64,
    pub initial_velocity: f64,
    pub overshoot_clamping: bool,
    pub rest_speed_threshold: f64,
    pub rest_displacement_threshold: f64,
    pub delay: f64,
    pub iterations: i32,
    pub is_interaction: bool,
    pub use_native_driver: bool,
}

impl SpringParams {
    /// Whether another run follows after `completed` runs have finished.
    pub fn repeats_after(&self, completed: u32) -> bool {
        self.iterations < 0 || i64::from(completed) < i64::from(self.iterations)
    }
}

impl SpringConfig {
    /// Configuration springing towards `to_value` with default physics.
    pub fn to(to_value: f64) -> Self {
        Self {
            to_value: Some(to_value),
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve presets and defaults.
    pub fn build(&self) -> Result<SpringParams> {
        let (stiffness, damping, mass) = self.resolve_physics()?;

        for (name, value) in [("stiffness", stiffness), ("damping", damping), ("mass", mass)] {
            if value <= 0.0 || value.is_nan() {
                return Err(AnimatedError::NonPositiveParameter { name, value });
            }
        }

        Ok(SpringParams {
            stiffness,
            damping,
            mass,
            to_value: self.to_value.unwrap_or(0.0),
            initial_velocity: self.velocity.unwrap_or(0.0),
            overshoot_clamping: self.overshoot_clamping.unwrap_or(false),
            rest_speed_threshold: self.rest_speed_threshold.unwrap_or(0.001),
            rest_displacement_threshold: self.rest_displacement_threshold.unwrap_or(0.001),
            delay: self.delay.unwrap_or(0.0),
            iterations: self.iterations.unwrap_or(1),
            is_interaction: self.is_interaction.unwrap_or(true),
            use_native_driver: self.use_native_driver.unwrap_or(false),
        })
    }

    fn resolve_physics(&self) -> Result<(f64, f64, f64)> {
        let physical = self.stiffness.is_some() || self.damping.is_some() || self.mass.is_some();
        let bouncy = self.bounciness.is_some() || self.speed.is_some();
        let origami = self.tension.is_some() || self.friction.is_some();

        if physical {
            if bouncy || origami {
                return Err(AnimatedError::MixedSpringPresets);
            }
            return Ok((
                self.stiffness.unwrap_or(100.0),
                self.damping.unwrap_or(10.0),
                self.mass.unwrap_or(1.0),
            ));
        }

        if bouncy {
            if origami {
                return Err(AnimatedError::MixedSpringPresets);
            }
            let (stiffness, damping) = from_bounciness_and_speed(
                self.bounciness.unwrap_or(8.0),
                self.speed.unwrap_or(12.0),
            );
            return Ok((stiffness, damping, 1.0));
        }

        let (stiffness, damping) = from_origami_tension_and_friction(
            self.tension.unwrap_or(40.0),
            self.friction.unwrap_or(7.0),
        );
        Ok((stiffness, damping, 1.0))
    }
}

fn stiffness_from_origami(tension: f64) -> f64 {
    (tension - 30.0) * 3.62 + 194.0
}

fn damping_from_origami(friction: f64) -> f64 {
    (friction - 8.0) * 3.0 + 25.0
}

/// Origami tension/friction to `(stiffness, damping)`.
pub fn from_origami_tension_and_friction(tension: f64, friction: f64) -> (f64, f64) {
    (stiffness_from_origami(tension), damping_from_origami(friction))
}

/// Origami bounciness/speed to `(stiffness, damping)`.
pub fn from_bounciness_and_speed(bounciness: f64, speed: f64) -> (f64, f64) {
    fn normalize(value: f64, start: f64, end: f64) -> f64 {
        (value - start) / (end - start)
    }

    fn project_normal(n: f64, start: f64, end: f64) -> f64 {
        start + n * (end - start)
    }

    fn linear(t: f64, start: f64, end: f64) -> f64 {
        t * end + (1.0 - t) * start
    }

    fn quadratic_out(t: f64, start: f64, end: f64) -> f64 {
        linear(2.0 * t - t * t, start, end)
    }

    // Friction that gives no bounce for a given tension, fitted piecewise.
    fn no_bounce(tension: f64) -> f64 {
        let x = tension;
        if x <= 18.0 {
            0.0007 * x.powi(3) - 0.031 * x.powi(2) + 0.64 * x + 1.28
        } else if x <= 44.0 {
            0.000044 * x.powi(3) - 0.006 * x.powi(2) + 0.36 * x + 2.0
        } else {
            0.00000045 * x.powi(3) - 0.000332 * x.powi(2) + 0.1078 * x + 5.84
        }
    }

    let b = project_normal(normalize(bounciness / 1.7, 0.0, 20.0), 0.0, 0.8);
    let s = normalize(speed / 1.7, 0.0, 20.0);
    let tension = project_normal(s, 0.5, 200.0);
    let friction = quadratic_out(b, no_bounce(tension), 0.01);

    from_origami_tension_and_friction(tension, friction)
}
