//! Damped Spring Integrator
//!
//! Closed-form damped harmonic oscillator, advanced state to state.
//!
//! # Algorithm
//!
//! Each advance takes the elapsed loop time since the previous advance
//! (clamped to [`MAX_FRAME_DELTA_MS`] so a stalled frame cannot launch the
//! spring), and evaluates the exact trajectory of
//!
//! ```text
//! m·x'' + c·x' + k·x = 0
//! ```
//!
//! starting from the current displacement `x0 = to − position` and velocity
//! over that delta. The oscillator is linear and autonomous, so chaining
//! deltas reproduces the single trajectory from the start position.
//!
//! - Underdamped (`ζ < 1`): decaying sinusoid at `ω1 = ω0·√(1 − ζ²)`.
//! - Otherwise the critically damped form is used.
//!
//! The spring rests once it overshoots with clamping enabled, or once both
//! its speed and its displacement fall under the rest thresholds. On rest it
//! snaps to the target with zero velocity.

use std::cell::{Cell, RefCell};

use crate::error::Result;
use crate::graph::{FrameScheduler, Node, NodeKind, Parents};
use crate::value::Value;

use super::config::SpringParams;

/// Upper bound on the time one advance may integrate, in milliseconds.
pub const MAX_FRAME_DELTA_MS: f64 = 64.0;

/// Physical state of one spring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringMotion {
    pub position: f64,
    pub velocity: f64,
    /// Loop timestamp of the last advance.
    pub time: Option<f64>,
    /// Seconds integrated so far.
    pub frame_time: f64,
    pub finished: bool,
}

impl SpringMotion {
    pub fn new(position: f64, velocity: f64) -> Self {
        Self {
            position,
            velocity,
            time: None,
            frame_time: 0.0,
            finished: false,
        }
    }

    /// Advance to loop time `now` (milliseconds). No-op once finished.
    pub fn advance(&mut self, now: f64, params: &SpringParams) {
        if self.finished {
            return;
        }

        let last_time = self.time.unwrap_or(now);
        let now = now.min(last_time + MAX_FRAME_DELTA_MS);
        let t = (now - last_time) / 1000.0;

        let SpringParams {
            stiffness: k,
            damping: c,
            mass: m,
            to_value,
            ..
        } = *params;

        let last_position = self.position;
        let x0 = to_value - last_position;
        let v0 = -self.velocity;

        let zeta = c / (2.0 * (k * m).sqrt());
        let omega0 = (k / m).sqrt();

        let (position, velocity) = if zeta < 1.0 {
            let omega1 = omega0 * (1.0 - zeta * zeta).sqrt();
            let envelope = (-zeta * omega0 * t).exp();
            let (sin, cos) = (omega1 * t).sin_cos();
            let a = v0 + zeta * omega0 * x0;
            let position = to_value - envelope * (a / omega1 * sin + x0 * cos);
            let velocity = zeta * omega0 * envelope * (sin * a / omega1 + x0 * cos)
                - envelope * (cos * a - omega1 * x0 * sin);
            (position, velocity)
        } else {
            let envelope = (-omega0 * t).exp();
            let position = to_value - envelope * (x0 + (v0 + omega0 * x0) * t);
            let velocity = envelope * (v0 * (t * omega0 - 1.0) + t * x0 * omega0 * omega0);
            (position, velocity)
        };

        self.time = Some(now);
        self.frame_time += t;
        self.position = position;
        self.velocity = velocity;

        let overshooting = params.overshoot_clamping
            && k != 0.0
            && if last_position < to_value {
                position > to_value
            } else {
                position < to_value
            };
        let resting_speed = velocity.abs() <= params.rest_speed_threshold;
        let resting_displacement =
            k == 0.0 || (to_value - position).abs() <= params.rest_displacement_threshold;

        if overshooting || (resting_speed && resting_displacement) {
            if k != 0.0 {
                self.position = to_value;
                self.velocity = 0.0;
            }
            self.finished = true;
        }
    }
}

/// Storage for one spring quantity: held locally or in a value node.
#[derive(Debug, Clone)]
pub enum Slot {
    Literal(f64),
    Node(Node),
}

impl Slot {
    pub fn read(&self, scheduler: &FrameScheduler) -> Result<f64> {
        match self {
            Slot::Literal(value) => Ok(*value),
            Slot::Node(node) => node.number(scheduler),
        }
    }

    /// Store `value`. Node slots go through `set_value`, so consumers see
    /// the write at the next flush.
    pub fn write(&mut self, scheduler: &FrameScheduler, value: f64) -> Result<()> {
        match self {
            Slot::Literal(slot) => {
                *slot = value;
                Ok(())
            }
            Slot::Node(node) => node.set_value(scheduler, value),
        }
    }
}

/// Where a spring reads and writes its position and finished flag.
#[derive(Debug, Clone)]
pub struct SpringTargets {
    pub position: Slot,
    pub finished: Slot,
}

/// Node state for [`NodeKind::Spring`].
///
/// Evaluating the node advances the spring to the clock's timestamp and
/// writes the result to its targets. Its only input is the clock, so
/// memoization bounds this to once per frame.
pub struct SpringStep {
    clock: Node,
    params: SpringParams,
    targets: RefCell<SpringTargets>,
    motion: Cell<SpringMotion>,
}

impl SpringStep {
    pub fn params(&self) -> &SpringParams {
        &self.params
    }

    pub fn motion(&self) -> SpringMotion {
        self.motion.get()
    }

    /// Whether the finished target is set.
    pub fn finished(&self, scheduler: &FrameScheduler) -> Result<bool> {
        Ok(self.targets.borrow().finished.read(scheduler)? != 0.0)
    }

    /// Restart from `position` with `velocity`.
    pub fn reseed(&self, scheduler: &FrameScheduler, position: f64, velocity: f64) -> Result<()> {
        self.motion.set(SpringMotion::new(position, velocity));
        let mut targets = self.targets.borrow_mut();
        targets.position.write(scheduler, position)?;
        targets.finished.write(scheduler, 0.0)
    }

    pub(crate) fn parents(&self) -> Parents {
        Parents::from_elem(self.clock.clone(), 1)
    }

    pub(crate) fn evaluate(&self, scheduler: &FrameScheduler) -> Result<Value> {
        let now = self.clock.number(scheduler)?;
        let mut targets = self.targets.borrow_mut();

        let mut motion = self.motion.get();
        motion.position = targets.position.read(scheduler)?;
        motion.finished = motion.finished || targets.finished.read(scheduler)? != 0.0;
        if motion.finished {
            self.motion.set(motion);
            return Ok(Value::Number(motion.position));
        }

        motion.advance(now, &self.params);
        self.motion.set(motion);

        targets.position.write(scheduler, motion.position)?;
        if motion.finished {
            targets.finished.write(scheduler, 1.0)?;
        }
        Ok(Value::Number(motion.position))
    }
}

impl Node {
    /// Create a spring step driven by `clock`, starting at the position
    /// target's current value with the configured initial velocity.
    pub fn spring(
        scheduler: &FrameScheduler,
        clock: &Node,
        params: SpringParams,
        targets: SpringTargets,
    ) -> Result<Node> {
        let position = targets.position.read(scheduler)?;
        let motion = SpringMotion::new(position, params.initial_velocity);
        Ok(Node::from_kind(NodeKind::Spring(SpringStep {
            clock: clock.clone(),
            params,
            targets: RefCell::new(targets),
            motion: Cell::new(motion),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::SpringConfig;

    fn params(config: SpringConfig) -> SpringParams {
        config.build().unwrap()
    }

    fn physical(stiffness: f64, damping: f64, to_value: f64) -> SpringParams {
        params(SpringConfig {
            stiffness: Some(stiffness),
            damping: Some(damping),
            mass: Some(1.0),
            to_value: Some(to_value),
            ..SpringConfig::default()
        })
    }

    fn energy(motion: &SpringMotion, params: &SpringParams) -> f64 {
        let x = motion.position - params.to_value;
        0.5 * params.stiffness * x * x + 0.5 * params.mass * motion.velocity * motion.velocity
    }

    #[test]
    fn first_advance_only_records_time() {
        let params = physical(100.0, 10.0, 0.0);
        let mut motion = SpringMotion::new(100.0, 0.0);
        motion.advance(500.0, &params);
        assert_eq!(motion.position, 100.0);
        assert_eq!(motion.time, Some(500.0));
        assert!(!motion.finished);
    }

    #[test]
    fn underdamped_spring_settles_with_decreasing_energy() {
        let params = physical(100.0, 10.0, 0.0);
        let mut motion = SpringMotion::new(100.0, 0.0);
        let mut previous = energy(&motion, &params);
        let mut crossed = false;

        let mut frames = 0;
        while !motion.finished {
            motion.advance(frames as f64 * 16.0, &params);
            let current = energy(&motion, &params);
            assert!(current <= previous + 1e-9, "energy grew at frame {frames}");
            previous = current;
            crossed |= motion.position < 0.0;
            frames += 1;
            assert!(frames < 400, "spring never came to rest");
        }

        assert!(crossed, "an underdamped spring overshoots its target");
        assert_eq!(motion.position, 0.0);
        assert_eq!(motion.velocity, 0.0);
    }

    #[test]
    fn critically_damped_spring_does_not_overshoot() {
        let params = physical(100.0, 20.0, 0.0);
        let mut motion = SpringMotion::new(100.0, 0.0);
        for frame in 0..400 {
            motion.advance(frame as f64 * 16.0, &params);
            assert!(motion.position >= 0.0);
        }
        assert!(motion.finished);
    }

    #[test]
    fn chained_steps_follow_one_trajectory() {
        let params = physical(170.0, 8.0, 1.0);
        let mut fine = SpringMotion::new(0.0, 0.0);
        let mut coarse = SpringMotion::new(0.0, 0.0);

        fine.advance(0.0, &params);
        coarse.advance(0.0, &params);
        for step in 1..=4 {
            fine.advance(step as f64 * 8.0, &params);
        }
        coarse.advance(32.0, &params);

        assert!((fine.position - coarse.position).abs() < 1e-9);
        assert!((fine.velocity - coarse.velocity).abs() < 1e-9);
    }

    #[test]
    fn long_frames_are_clamped() {
        let params = physical(100.0, 10.0, 0.0);
        let mut stalled = SpringMotion::new(100.0, 0.0);
        let mut capped = SpringMotion::new(100.0, 0.0);

        stalled.advance(0.0, &params);
        stalled.advance(1000.0, &params);
        capped.advance(0.0, &params);
        capped.advance(MAX_FRAME_DELTA_MS, &params);

        assert_eq!(stalled.position, capped.position);
        assert_eq!(stalled.time, Some(MAX_FRAME_DELTA_MS));
    }

    #[test]
    fn overshoot_clamping_stops_at_the_target() {
        let params = params(SpringConfig {
            stiffness: Some(300.0),
            damping: Some(5.0),
            to_value: Some(1.0),
            overshoot_clamping: Some(true),
            ..SpringConfig::default()
        });
        let mut motion = SpringMotion::new(0.0, 0.0);
        let mut frames = 0;
        while !motion.finished {
            motion.advance(frames as f64 * 16.0, &params);
            assert!(motion.position <= 1.0);
            frames += 1;
        }
        assert!(frames < 20);
        assert_eq!(motion.position, 1.0);
    }

    #[test]
    fn overshoot_clamping_snaps_on_first_crossing() {
        let params = params(SpringConfig {
            stiffness: Some(100.0),
            damping: Some(10.0),
            to_value: Some(0.0),
            overshoot_clamping: Some(true),
            ..SpringConfig::default()
        });
        let mut motion = SpringMotion::new(100.0, 0.0);
        let mut previous = motion.position;
        let mut frames = 0;
        while !motion.finished {
            motion.advance(frames as f64 * 16.0, &params);
            assert!(motion.position >= 0.0, "crossed the target at frame {frames}");
            assert!(motion.position <= previous);
            previous = motion.position;
            frames += 1;
            assert!(frames < 400, "spring never came to rest");
        }

        // Unclamped, this spring keeps oscillating for about 160 frames.
        assert_eq!(frames, 17);
        assert_eq!(motion.position, 0.0);
        assert_eq!(motion.velocity, 0.0);
    }

    #[test]
    fn finished_motion_stays_put() {
        let params = physical(100.0, 10.0, 0.0);
        let mut motion = SpringMotion::new(0.0, 0.0);
        motion.advance(0.0, &params);
        assert!(motion.finished);

        let settled = motion;
        motion.advance(16.0, &params);
        assert_eq!(motion, settled);
    }

    #[test]
    fn step_node_writes_its_position_target() {
        let scheduler = FrameScheduler::new();
        let value = Node::value(0.0);
        let step = Node::spring(
            &scheduler,
            scheduler.clock(),
            physical(100.0, 10.0, 1.0),
            SpringTargets {
                position: Slot::Node(value.clone()),
                finished: Slot::Literal(0.0),
            },
        )
        .unwrap();
        step.attach(&scheduler).unwrap();
        assert_eq!(scheduler.clock().children(), vec![step.clone()]);

        let NodeKind::Spring(spring) = step.kind() else {
            panic!("expected a spring step");
        };
        for frame in 0..200 {
            scheduler.run_frame(frame as f64 * 16.0);
            step.get_value(&scheduler).unwrap();
            // A second pull in the same frame must not advance again.
            let time = spring.motion().time;
            step.get_value(&scheduler).unwrap();
            assert_eq!(spring.motion().time, time);
        }

        assert!(spring.finished(&scheduler).unwrap());
        assert_eq!(value.number(&scheduler).unwrap(), 1.0);
    }
}
