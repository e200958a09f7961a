//! Animations.
//!
//! Two drivers share one lifecycle. Springs: [`SpringConfig`] resolves
//! presets into [`SpringParams`], [`SpringMotion`] integrates them, and
//! [`SpringAnimation`] wraps the integrator into a start/stop lifecycle.
//! Frame tables: [`FramesAnimation`] plays precomputed samples through a
//! [`TimingStep`].

mod config;
mod frames;
mod integrator;
mod lifecycle;
mod spring;
mod timing;

pub use config::{
    from_bounciness_and_speed, from_origami_tension_and_friction, SpringConfig, SpringParams,
};
pub use frames::{FramePlayback, FramesAnimation, FramesConfig, FramesParams, FRAMES_PER_SECOND};
pub use integrator::{Slot, SpringMotion, SpringStep, SpringTargets, MAX_FRAME_DELTA_MS};
pub use lifecycle::{Animation, AnimationStatus, EndCallback};
pub use spring::SpringAnimation;
pub use timing::TimingStep;
