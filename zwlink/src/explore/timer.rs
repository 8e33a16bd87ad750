//! One timer shared by every explore queue slot.

use crate::Instant;

/// Milliseconds from `now` until `deadline`, negative once it has
/// passed. Survives the tick counter wrapping.
pub fn remaining(deadline: Instant, now: Instant) -> i32 {
    deadline.ticks().wrapping_sub(now.ticks()) as i32
}

/// Whether `deadline` is at or before `now`.
pub fn expired(deadline: Instant, now: Instant) -> bool {
    remaining(deadline, now) <= 0
}

/// A single deadline, always set to the soonest one any slot is
/// waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SharedTimer {
    deadline: Option<Instant>,
}

impl Default for SharedTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedTimer {
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Reprogram to the soonest of `deadlines`, or stop if there are
    /// none.
    pub fn rearm<I>(&mut self, deadlines: I, now: Instant)
    where
        I: IntoIterator<Item = Instant>,
    {
        self.deadline = deadlines
            .into_iter()
            .min_by_key(|&deadline| remaining(deadline, now));
    }

    /// True once, when the programmed deadline has passed. The timer
    /// stops itself when it fires.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if expired(deadline, now) => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
