//! Spring animation lifecycle.
//!
//! A [`SpringAnimation`] drives one value node towards its target. Locally
//! it builds a spring step node on the shared clock and evaluates it once per
//! frame from a self-rescheduling step; with the native driver it hands the
//! whole animation to the executor and waits for its end event.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, error};

use super::config::{SpringConfig, SpringParams};
use super::integrator::{Slot, SpringTargets};
use super::lifecycle::{Animation, AnimationStatus, EndCallback, RunState};
use crate::error::Result;
use crate::graph::{FrameScheduler, Node, NodeKind};
use crate::native::{AnimationConfig, AnimationId};

/// A spring animation.
pub struct SpringAnimation {
    params: SpringParams,
    run: Option<Rc<SpringRun>>,
}

impl SpringAnimation {
    pub fn new(config: SpringConfig) -> Result<Self> {
        Ok(Self::from_params(config.build()?))
    }

    pub fn from_params(params: SpringParams) -> Self {
        Self { params, run: None }
    }

    pub fn params(&self) -> &SpringParams {
        &self.params
    }

    /// Id of the native animation, when running on the native driver.
    pub fn native_animation_id(&self) -> Option<AnimationId> {
        match self.run.as_deref()?.driver {
            RunDriver::Native { animation_id } => Some(animation_id),
            RunDriver::Local { .. } => None,
        }
    }
}

impl Animation for SpringAnimation {
    fn start(
        &mut self,
        scheduler: &FrameScheduler,
        value: &Node,
        on_end: Option<EndCallback>,
    ) -> Result<()> {
        if self.status() == AnimationStatus::Running {
            self.stop(scheduler)?;
        }

        let start_position = value.number(scheduler)?;
        let driver = if self.params.use_native_driver {
            value.make_native(scheduler)?;
            RunDriver::Native {
                animation_id: scheduler.native().next_animation_id(),
            }
        } else {
            let finished = Node::value(0.0);
            let step = Node::spring(
                scheduler,
                scheduler.clock(),
                self.params.clone(),
                SpringTargets {
                    position: Slot::Node(value.clone()),
                    finished: Slot::Node(finished.clone()),
                },
            )?;
            RunDriver::Local { step, finished }
        };

        let run = Rc::new(SpringRun {
            params: self.params.clone(),
            value: value.clone(),
            driver,
            state: RunState::begin(scheduler, self.params.is_interaction, on_end),
            iterations_done: Cell::new(0),
            started_at: Cell::new(None),
            start_position,
        });

        debug!(
            value = %value.id(),
            from = start_position,
            to = self.params.to_value,
            native = self.params.use_native_driver,
            "starting spring"
        );

        match &run.driver {
            RunDriver::Local { step, .. } => {
                step.attach(scheduler)?;
                run.schedule(scheduler);
            }
            RunDriver::Native { animation_id } => {
                let node_tag = value.native_tag(scheduler)?;
                let handler_run = Rc::clone(&run);
                scheduler.native().start_animation(
                    *animation_id,
                    node_tag,
                    AnimationConfig::Spring(self.params.clone()),
                    Box::new(move |scheduler, finished| {
                        if let Err(err) = handler_run.native_ended(scheduler, finished) {
                            error!(error = %err, "failed to complete native spring");
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

enum RunDriver {
    Local { step: Node, finished: Node },
    Native { animation_id: AnimationId },
}

/// State of one `start` call, shared with the scheduled steps.
struct SpringRun {
    params: SpringParams,
    value: Node,
    driver: RunDriver,
    state: RunState,
    iterations_done: Cell<u32>,
    /// Loop time of the first frame after `start`.
    started_at: Cell<Option<f64>>,
    start_position: f64,
}

impl SpringRun {
    fn schedule(self: &Rc<Self>, scheduler: &FrameScheduler) {
        let run = Rc::clone(self);
        scheduler.request_step(move |scheduler| run.step(scheduler));
    }

    fn step(self: &Rc<Self>, scheduler: &FrameScheduler) -> Result<()> {
        if !self.state.is_running() {
            return Ok(());
        }
        let RunDriver::Local { step, .. } = &self.driver else {
            return Ok(());
        };

        let now = scheduler.now();
        let started_at = match self.started_at.get() {
            Some(started_at) => started_at,
            None => {
                self.started_at.set(Some(now));
                now
            }
        };
        if now - started_at < self.params.delay {
            self.schedule(scheduler);
            return Ok(());
        }

        // Re-enqueue on failure so the step retries next frame.
        if let Err(err) = step.get_value(scheduler) {
            self.schedule(scheduler);
            return Err(err);
        }
        let NodeKind::Spring(spring) = step.kind() else {
            return Ok(());
        };
        if !spring.finished(scheduler)? {
            self.schedule(scheduler);
            return Ok(());
        }

        let done = self.iterations_done.get() + 1;
        self.iterations_done.set(done);
        if self.params.repeats_after(done) {
            spring.reseed(scheduler, self.start_position, self.params.initial_velocity)?;
            self.schedule(scheduler);
            return Ok(());
        }
        self.complete(scheduler, true)
    }

    fn stop(&self, scheduler: &FrameScheduler) -> Result<()> {
        match &self.driver {
            RunDriver::Local { finished, .. } => finished.set_value(scheduler, 1.0)?,
            RunDriver::Native { animation_id } => scheduler.native().stop_animation(*animation_id),
        }
        self.complete(scheduler, false)
    }

    fn native_ended(&self, scheduler: &FrameScheduler, finished: bool) -> Result<()> {
        if finished {
            // The executor rests exactly on the target.
            self.value.set_value(scheduler, self.params.to_value)?;
        }
        self.complete(scheduler, finished)
    }

    /// End the run once: release the step, close the interaction, and run
    /// the end callback.
    fn complete(&self, scheduler: &FrameScheduler, finished: bool) -> Result<()> {
        if !self.state.is_running() {
            return Ok(());
        }
        debug!(value = %self.value.id(), finished, "spring ended");

        let detached = match &self.driver {
            RunDriver::Local { step, .. } => step.detach(scheduler),
            RunDriver::Native { .. } => Ok(()),
        };
        self.state.end(scheduler, finished);
        detached
    }
}
