//! Frame-table animations.
//!
//! The caller precomputes one sample per 60 Hz frame. Playback picks the
//! sample for the loop time elapsed since the first step and maps it onto
//! the animated value: with a `toValue` the sample is the fraction of the way
//! from the start value, without one it is an offset added to the start
//! value. Reaching the last sample finishes the animation.
//!
//! Locally the sample is written into a private progress node, and a
//! [`TimingStep`](super::TimingStep) copies it into the animated value.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::lifecycle::{Animation, AnimationStatus, EndCallback, RunState};
use crate::error::Result;
use crate::graph::{FrameScheduler, Node};
use crate::native::{AnimationConfig, AnimationId};

/// Rate the frame table is sampled at.
pub const FRAMES_PER_SECOND: f64 = 60.0;

/// Caller-facing frame animation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FramesConfig {
    /// One sample per frame at [`FRAMES_PER_SECOND`].
    pub frames: Vec<f64>,
    pub to_value: Option<f64>,
    pub is_interaction: Option<bool>,
    pub use_native_driver: Option<bool>,
}

impl FramesConfig {
    /// Play `frames` as fractions of the way to `to_value`.
    pub fn to(frames: Vec<f64>, to_value: f64) -> Self {
        Self {
            frames,
            to_value: Some(to_value),
            ..Self::default()
        }
    }

    /// The part of the configuration the executor needs.
    pub fn params(&self) -> FramesParams {
        FramesParams {
            frames: self.frames.clone(),
            to_value: self.to_value,
        }
    }
}

/// Frame table sent to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramesParams {
    pub frames: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_value: Option<f64>,
}

impl FramesParams {
    /// Value of frame `index` for an animation that started at `from`.
    fn sample(&self, index: usize, from: f64) -> f64 {
        let frame = self.frames.get(index).copied().unwrap_or(0.0);
        match self.to_value {
            Some(to_value) => from + frame * (to_value - from),
            None => from + frame,
        }
    }

    /// Value the animation ends on when started at `from`.
    pub fn final_value(&self, from: f64) -> f64 {
        match self.to_value {
            Some(to_value) => to_value,
            None => from + self.frames.last().copied().unwrap_or(0.0),
        }
    }
}

/// Playback position of one frame animation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FramePlayback {
    /// Loop time and animated value at the first step.
    pub start: Option<(f64, f64)>,
    pub finished: bool,
}

impl FramePlayback {
    /// Advance to loop time `now` (milliseconds). `current` is the animated
    /// value, read once to fix the start value.
    ///
    /// Returns the value to write, or `None` once finished.
    pub fn advance(&mut self, now: f64, current: f64, params: &FramesParams) -> Option<f64> {
        if self.finished {
            return None;
        }
        let (started_at, from) = *self.start.get_or_insert((now, current));

        let elapsed_ms = (now - started_at).max(0.0).floor();
        let index = (elapsed_ms * FRAMES_PER_SECOND / 1000.0).floor() as usize;
        if index + 1 >= params.frames.len() {
            self.finished = true;
            return Some(params.final_value(from));
        }
        Some(params.sample(index, from))
    }
}

/// An animation that plays a precomputed frame table.
pub struct FramesAnimation {
    config: FramesConfig,
    run: Option<Rc<FramesRun>>,
}

impl FramesAnimation {
    pub fn new(config: FramesConfig) -> Self {
        Self { config, run: None }
    }

    pub fn config(&self) -> &FramesConfig {
        &self.config
    }

    /// Id of the native animation, when running on the native driver.
    pub fn native_animation_id(&self) -> Option<AnimationId> {
        match self.run.as_deref()?.driver {
            FramesDriver::Native { animation_id } => Some(animation_id),
            FramesDriver::Local { .. } => None,
        }
    }
}

impl Animation for FramesAnimation {
    fn start(
        &mut self,
        scheduler: &FrameScheduler,
        value: &Node,
        on_end: Option<EndCallback>,
    ) -> Result<()> {
        if self.status() == AnimationStatus::Running {
            self.stop(scheduler)?;
        }

        let params = self.config.params();
        let start_value = value.number(scheduler)?;
        let driver = if self.config.use_native_driver.unwrap_or(false) {
            value.make_native(scheduler)?;
            FramesDriver::Native {
                animation_id: scheduler.native().next_animation_id(),
            }
        } else {
            let progress = Node::value(start_value);
            let step = Node::timing_step(value, &progress)?;
            FramesDriver::Local {
                progress,
                step,
                playback: Cell::new(FramePlayback::default()),
            }
        };

        let is_interaction = self.config.is_interaction.unwrap_or(true);
        let run = Rc::new(FramesRun {
            params,
            value: value.clone(),
            start_value,
            driver,
            state: RunState::begin(scheduler, is_interaction, on_end),
        });
        debug!(
            value = %value.id(),
            frames = run.params.frames.len(),
            "starting frame animation"
        );

        match &run.driver {
            FramesDriver::Local { step, .. } => {
                step.attach(scheduler)?;
                run.schedule(scheduler);
            }
            FramesDriver::Native { animation_id } => {
                let node_tag = value.native_tag(scheduler)?;
                let handler_run = Rc::clone(&run);
                scheduler.native().start_animation(
                    *animation_id,
                    node_tag,
                    AnimationConfig::Frames(run.params.clone()),
                    Box::new(move |scheduler, finished| {
                        if let Err(err) = handler_run.native_ended(scheduler, finished) {
                            error!(error = %err, "failed to complete native frame animation");
                        }
                    }),
                );
            }
        }

        self.run = Some(run);
        Ok(())
    }

    fn stop(&mut self, scheduler: &FrameScheduler) -> Result<()> {
        match &self.run {
            Some(run) if run.state.is_running() => run.stop(scheduler),
            _ => Ok(()),
        }
    }

    fn status(&self) -> AnimationStatus {
        self.run
            .as_ref()
            .map_or(AnimationStatus::Idle, |run| run.state.status())
    }
}

enum FramesDriver {
    Local {
        progress: Node,
        step: Node,
        playback: Cell<FramePlayback>,
    },
    Native {
        animation_id: AnimationId,
    },
}

struct FramesRun {
    params: FramesParams,
    value: Node,
    start_value: f64,
    driver: FramesDriver,
    state: RunState,
}

impl FramesRun {
    fn schedule(self: &Rc<Self>, scheduler: &FrameScheduler) {
        let run = Rc::clone(self);
        scheduler.request_step(move |scheduler| run.step(scheduler));
    }

    fn step(self: &Rc<Self>, scheduler: &FrameScheduler) -> Result<()> {
        if !self.state.is_running() {
            return Ok(());
        }
        match self.advance(scheduler) {
            Ok(true) => self.complete(scheduler, true),
            Ok(false) => {
                self.schedule(scheduler);
                Ok(())
            }
            // Re-enqueue on failure so the step retries next frame.
            Err(err) => {
                self.schedule(scheduler);
                Err(err)
            }
        }
    }

    /// Write this frame's sample. Returns whether the table is exhausted.
    fn advance(&self, scheduler: &FrameScheduler) -> Result<bool> {
        let FramesDriver::Local {
            progress,
            step,
            playback,
        } = &self.driver
        else {
            return Ok(false);
        };

        let mut next = playback.get();
        let current = self.value.number(scheduler)?;
        if let Some(sample) = next.advance(scheduler.now(), current, &self.params) {
            progress.set_value(scheduler, sample)?;
        }
        step.get_value(scheduler)?;
        playback.set(next);
        Ok(next.finished)
    }

    fn stop(&self, scheduler: &FrameScheduler) -> Result<()> {
        if let FramesDriver::Native { animation_id } = &self.driver {
            scheduler.native().stop_animation(*animation_id);
        }
        self.complete(scheduler, false)
    }

    fn native_ended(&self, scheduler: &FrameScheduler, finished: bool) -> Result<()> {
        if finished {
            self.value
                .set_value(scheduler, self.params.final_value(self.start_value))?;
        }
        self.complete(scheduler, finished)
    }

    fn complete(&self, scheduler: &FrameScheduler, finished: bool) -> Result<()> {
        if !self.state.is_running() {
            return Ok(());
        }
        debug!(value = %self.value.id(), finished, "frame animation ended");

        let detached = match &self.driver {
            FramesDriver::Local { step, .. } => step.detach(scheduler),
            FramesDriver::Native { .. } => Ok(()),
        };
        self.state.end(scheduler, finished);
        detached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::native::{NativeOp, OpQueue};

    fn quarters() -> Vec<f64> {
        vec![0.0, 0.25, 0.5, 0.75, 1.0]
    }

    fn recorder() -> (Rc<RefCell<Vec<bool>>>, EndCallback) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, Box::new(move |finished| sink.borrow_mut().push(finished)))
    }

    #[test]
    fn samples_are_fractions_of_the_way_to_the_target() {
        let params = FramesConfig::to(quarters(), 100.0).params();
        let mut playback = FramePlayback::default();

        // 16 ms frames land on table indices 0, 0, 1, 2, 3, 4.
        let values: Vec<_> = (0..6)
            .map(|frame| playback.advance(1000.0 + frame as f64 * 16.0, 20.0, &params))
            .collect();
        assert_eq!(
            values,
            vec![
                Some(20.0),
                Some(20.0),
                Some(40.0),
                Some(60.0),
                Some(80.0),
                Some(100.0)
            ]
        );
        assert!(playback.finished);
        assert_eq!(playback.advance(2000.0, 0.0, &params), None);
    }

    #[test]
    fn without_target_samples_are_offsets() {
        let params = FramesParams {
            frames: vec![0.0, 5.0, 10.0],
            to_value: None,
        };
        let mut playback = FramePlayback::default();
        assert_eq!(playback.advance(0.0, 3.0, &params), Some(3.0));
        // The start value is fixed on the first step.
        assert_eq!(playback.advance(17.0, 99.0, &params), Some(8.0));
        assert_eq!(playback.advance(34.0, 99.0, &params), Some(13.0));
        assert!(playback.finished);
        assert_eq!(params.final_value(3.0), 13.0);
    }

    #[test]
    fn empty_table_finishes_on_the_first_step() {
        let params = FramesConfig::to(Vec::new(), 4.0).params();
        let mut playback = FramePlayback::default();
        assert_eq!(playback.advance(0.0, 1.0, &params), Some(4.0));
        assert!(playback.finished);
    }

    #[test]
    fn wire_format_omits_a_missing_target() {
        let with_target = AnimationConfig::Frames(FramesConfig::to(vec![0.0, 1.0], 2.0).params());
        assert_eq!(
            serde_json::to_string(&with_target).unwrap(),
            r#"{"type":"frames","frames":[0.0,1.0],"toValue":2.0}"#
        );

        let offsets: AnimationConfig =
            serde_json::from_str(r#"{"type":"frames","frames":[0.0,1.0]}"#).unwrap();
        assert_eq!(
            offsets,
            AnimationConfig::Frames(FramesParams {
                frames: vec![0.0, 1.0],
                to_value: None,
            })
        );
    }

    #[test]
    fn local_run_plays_the_table_and_reports_once() {
        let scheduler = FrameScheduler::new();
        let value = Node::value(0.0);
        let (ended, on_end) = recorder();

        let mut animation = FramesAnimation::new(FramesConfig::to(quarters(), 100.0));
        animation.start(&scheduler, &value, Some(on_end)).unwrap();
        assert_eq!(scheduler.interaction_count(), 1);

        let mut seen = Vec::new();
        for frame in 0..10 {
            scheduler.tick(frame as f64 * 16.0);
            seen.push(value.number(&scheduler).unwrap());
        }

        assert_eq!(&seen[..6], &[0.0, 0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_eq!(animation.status(), AnimationStatus::Finished);
        assert_eq!(*ended.borrow(), vec![true]);
        assert_eq!(scheduler.interaction_count(), 0);
        assert_eq!(scheduler.pending_steps(), 0);
    }

    #[test]
    fn stop_leaves_the_value_and_reports_unfinished() {
        let scheduler = FrameScheduler::new();
        let value = Node::value(0.0);
        let (ended, on_end) = recorder();

        let mut animation = FramesAnimation::new(FramesConfig::to(quarters(), 100.0));
        animation.start(&scheduler, &value, Some(on_end)).unwrap();
        for frame in 0..4 {
            scheduler.tick(frame as f64 * 16.0);
        }
        animation.stop(&scheduler).unwrap();
        for frame in 4..10 {
            scheduler.tick(frame as f64 * 16.0);
        }

        assert_eq!(value.number(&scheduler).unwrap(), 50.0);
        assert_eq!(animation.status(), AnimationStatus::Stopped);
        assert_eq!(*ended.borrow(), vec![false]);
    }

    #[test]
    fn native_driver_sends_the_frame_table() {
        let queue = Rc::new(RefCell::new(OpQueue::new()));
        let scheduler = FrameScheduler::new().with_executor(Rc::clone(&queue));
        let value = Node::value(10.0);
        let (ended, on_end) = recorder();

        let mut animation = FramesAnimation::new(FramesConfig {
            use_native_driver: Some(true),
            ..FramesConfig::to(quarters(), 20.0)
        });
        animation.start(&scheduler, &value, Some(on_end)).unwrap();

        let id = animation.native_animation_id().unwrap();
        assert!(matches!(
            queue.borrow().ops().last(),
            Some(NativeOp::StartAnimatingNode {
                animation_id,
                config: AnimationConfig::Frames(params),
                ..
            }) if *animation_id == id && params.to_value == Some(20.0)
        ));
        assert_eq!(scheduler.pending_steps(), 0);

        scheduler.native_animation_ended(id, true);
        assert_eq!(*ended.borrow(), vec![true]);
        assert_eq!(value.number(&scheduler).unwrap(), 20.0);
    }
}
