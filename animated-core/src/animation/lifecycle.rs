//! Start/stop lifecycle shared by every animation driver.

use std::cell::Cell;

use crate::error::Result;
use crate::graph::{FrameScheduler, Node};

/// Called once when an animation ends; `true` if it came to rest on its own.
pub type EndCallback = Box<dyn FnOnce(bool)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationStatus {
    Idle,
    Running,
    Finished,
    Stopped,
}

/// Start/stop lifecycle shared by animations.
pub trait Animation {
    /// Start driving `value`. A running animation is stopped first.
    fn start(
        &mut self,
        scheduler: &FrameScheduler,
        value: &Node,
        on_end: Option<EndCallback>,
    ) -> Result<()>;

    /// Stop the animation, leaving the value where it is.
    fn stop(&mut self, scheduler: &FrameScheduler) -> Result<()>;

    fn status(&self) -> AnimationStatus;
}

/// Status, end callback, and interaction handle of one `start` call.
pub(crate) struct RunState {
    status: Cell<AnimationStatus>,
    on_end: Cell<Option<EndCallback>>,
    is_interaction: bool,
}

impl RunState {
    /// Enter the running state, opening an interaction if requested.
    pub(crate) fn begin(
        scheduler: &FrameScheduler,
        is_interaction: bool,
        on_end: Option<EndCallback>,
    ) -> Self {
        if is_interaction {
            scheduler.begin_interaction();
        }
        Self {
            status: Cell::new(AnimationStatus::Running),
            on_end: Cell::new(on_end),
            is_interaction,
        }
    }

    pub(crate) fn status(&self) -> AnimationStatus {
        self.status.get()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.status.get() == AnimationStatus::Running
    }

    /// Leave the running state and run the end callback. Only the first call
    /// has an effect.
    pub(crate) fn end(&self, scheduler: &FrameScheduler, finished: bool) {
        if !self.is_running() {
            return;
        }
        self.status.set(if finished {
            AnimationStatus::Finished
        } else {
            AnimationStatus::Stopped
        });
        if self.is_interaction {
            scheduler.end_interaction();
        }
        if let Some(on_end) = self.on_end.take() {
            on_end(finished);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn end_runs_the_callback_once_and_closes_the_interaction() {
        let scheduler = FrameScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);

        let state = RunState::begin(
            &scheduler,
            true,
            Some(Box::new(move |finished| sink.borrow_mut().push(finished))),
        );
        assert_eq!(scheduler.interaction_count(), 1);

        state.end(&scheduler, false);
        state.end(&scheduler, true);
        assert_eq!(state.status(), AnimationStatus::Stopped);
        assert_eq!(*log.borrow(), vec![false]);
        assert_eq!(scheduler.interaction_count(), 0);
    }
}
