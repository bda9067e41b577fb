//! Gradual volume changes for one application.
//!
//! A fade remembers the application's volume before it starts, so an
//! interrupted fade can put things back the way they were.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::AudioBackend;
use crate::controller::AudioController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    Completed,
    /// Interrupted and the initial volume was written back.
    Restored,
    /// The application has no session (or it disappeared mid-fade).
    NotFound,
}

pub struct SessionContainer<'a, B: AudioBackend> {
    controller: &'a AudioController<B>,
    session_name: String,
    initial_volume: u8,
}

impl<'a, B: AudioBackend> SessionContainer<'a, B> {
    /// Captures the current volume of `session_name`, `None` when it has no
    /// matching session.
    pub fn capture(controller: &'a AudioController<B>, session_name: &str) -> Option<Self> {
        let initial_volume = controller.get_application_volume(session_name)?;
        Some(Self {
            controller,
            session_name: session_name.to_string(),
            initial_volume,
        })
    }

    pub fn initial_volume(&self) -> u8 {
        self.initial_volume
    }

    pub fn restore(&self) -> bool {
        info!(
            session = %self.session_name,
            volume = self.initial_volume,
            "restoring initial volume"
        );
        self.controller
            .set_application_volume(&self.session_name, self.initial_volume)
    }

    /// Moves the volume from its initial value to `target` in `steps` linear
    /// steps. `stop` is checked between steps; when raised the fade is
    /// abandoned and the initial volume restored.
    pub fn fade_to(&self, target: u8, steps: u32, step_delay: Duration, stop: &AtomicBool) -> FadeOutcome {
        let steps = steps.max(1);
        let from = f32::from(self.initial_volume);
        let to = f32::from(target);

        for step in 1..=steps {
            if stop.load(Ordering::Relaxed) {
                self.restore();
                return FadeOutcome::Restored;
            }

            let volume = (from + (to - from) * step as f32 / steps as f32).round() as u8;
            debug!(session = %self.session_name, step, volume, "fade step");
            if !self.controller.set_application_volume(&self.session_name, volume) {
                return FadeOutcome::NotFound;
            }
            if step < steps {
                sleep(step_delay);
            }
        }

        FadeOutcome::Completed
    }
}
