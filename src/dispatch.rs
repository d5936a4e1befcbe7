//! Click debouncing: every rendered button is either idle or cooling.
//!
//! A click on an idle button emits one `run-macro` frame and locks the
//! button; a timer unlocks it after the quiescence window. Timers are never
//! cancelled, so they may fire after their render pass has been replaced.

use crate::channel::FrameSink;
use crate::protocol::Outbound;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(100);

/// Identity of a button within one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonId {
    pub generation: u64,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Idle,
    Cooling,
}

/// Lock flags for the buttons of one render pass.
#[derive(Debug, Clone, Default)]
pub struct CooldownMap {
    locked: HashMap<ButtonId, bool>,
}

impl CooldownMap {
    /// One idle entry per rendered button.
    pub fn new(buttons: impl IntoIterator<Item = ButtonId>) -> Self {
        Self {
            locked: buttons.into_iter().map(|id| (id, false)).collect(),
        }
    }

    pub fn state(&self, id: ButtonId) -> Option<ButtonState> {
        self.locked
            .get(&id)
            .map(|&locked| if locked { ButtonState::Cooling } else { ButtonState::Idle })
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.locked.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.locked.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    button: ButtonId,
    due: Instant,
}

pub struct CommandDispatcher {
    cooldown: Duration,
    timers: Vec<Timer>,
}

impl CommandDispatcher {
    pub fn new(cooldown: Duration) -> Self {
        // A zero window would make the lock meaningless
        let cooldown = if cooldown.is_zero() { DEFAULT_COOLDOWN } else { cooldown };
        Self { cooldown, timers: Vec::new() }
    }

    #[allow(dead_code)]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Handle a click. Returns true when a command was sent.
    pub fn click(
        &mut self,
        map: &mut CooldownMap,
        button: ButtonId,
        macro_name: &str,
        now: Instant,
        sink: &mut dyn FrameSink,
    ) -> bool {
        match map.locked.get_mut(&button) {
            Some(locked) if !*locked => {
                *locked = true;
                sink.send(Outbound::RunMacro(macro_name.to_string()));
                self.timers.push(Timer { button, due: now + self.cooldown });
                info!("Running macro '{}' (button {})", macro_name, button.index);
                true
            }
            Some(_) => {
                debug!("Dropped click on cooling button {}", button.index);
                false
            }
            None => {
                debug!("Click on unknown button {:?}", button);
                false
            }
        }
    }

    /// Fire every due timer. Timers for buttons missing from `map` are no-ops.
    pub fn fire_due(&mut self, map: &mut CooldownMap, now: Instant) {
        self.timers.retain(|timer| {
            if timer.due > now {
                return true;
            }
            if let Some(locked) = map.locked.get_mut(&timer.button) {
                *locked = false;
            }
            false
        });
    }

    /// Earliest pending deadline, for sizing the loop's poll timeout
    pub fn next_due(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.due).min()
    }

    #[allow(dead_code)]
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
