//! Cooldown gate between detection cycles.
//!
//! Timestamps are milliseconds from a free-running `u32` counter, so every
//! comparison is done on the wrapped difference `now - last`, never on the
//! raw values.

/// Monotonic milliseconds, wrapping at `u32::MAX`.
pub type Millis = u32;

pub const DEFAULT_COOLDOWN_MS: Millis = 5_000;
pub const MIN_COOLDOWN_MS: Millis = 1_000;
pub const MAX_COOLDOWN_MS: Millis = 60_000;

/// True while `now` is less than `duration` after `last`.
#[inline]
pub fn in_cooldown(now: Millis, last: Millis, duration: Millis) -> bool {
    now.wrapping_sub(last) < duration
}

/// Milliseconds until the gate opens again, floored at zero.
#[inline]
pub fn time_remaining(now: Millis, last: Millis, duration: Millis) -> Millis {
    duration.saturating_sub(now.wrapping_sub(last))
}

/// When the last detection cycle finished (success or not).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownState {
    last_activation: Option<Millis>,
}

impl CooldownState {
    pub const fn new() -> Self {
        Self { last_activation: None }
    }

    pub fn last_activation(&self) -> Option<Millis> {
        self.last_activation
    }

    /// Re-arm the gate. Called exactly once per completed detection cycle.
    pub fn arm(&mut self, now: Millis) {
        self.last_activation = Some(now);
    }

    /// Nothing has been detected yet, so there is nothing to cool down from.
    pub fn is_active(&self, now: Millis, duration: Millis) -> bool {
        match self.last_activation {
            Some(last) => in_cooldown(now, last, duration),
            None => false,
        }
    }

    pub fn remaining(&self, now: Millis, duration: Millis) -> Millis {
        match self.last_activation {
            Some(last) => time_remaining(now, last, duration),
            None => 0,
        }
    }
}
