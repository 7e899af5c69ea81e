//! Fixed-length detection window.
//!
//! While the window runs the chase animation keeps stepping and the reader is
//! polled until the first non-zero id is captured. A captured id does not end
//! the window: it completes only when its full duration has elapsed, so the
//! show has the same length however quickly the token reads.

use crate::cooldown::Millis;
use crate::token::TokenId;

pub const DETECTION_WINDOW_MS: Millis = 3_000;
/// Chase step interval at the start of the window.
pub const CHASE_SLOW_MS: Millis = 150;
/// Chase step interval at the end of the window.
pub const CHASE_FAST_MS: Millis = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Idle,
    Running { started: Millis },
    Complete,
}

pub struct DetectionWindow<T: TokenId> {
    state: WindowState,
    duration_ms: Millis,
    captured: T,
    attempts: u32,
}

impl<T: TokenId> DetectionWindow<T> {
    pub fn new(duration_ms: Millis) -> Self {
        Self {
            state: WindowState::Idle,
            duration_ms,
            captured: T::NONE,
            attempts: 0,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn start(&mut self, now: Millis) {
        self.state = WindowState::Running { started: now };
        self.captured = T::NONE;
        self.attempts = 0;
    }

    /// Milliseconds since `start`, or 0 when not running.
    pub fn elapsed(&self, now: Millis) -> Millis {
        match self.state {
            WindowState::Running { started } => now.wrapping_sub(started),
            _ => 0,
        }
    }

    /// Advance to `now`. Returns true while the window is still running.
    pub fn step(&mut self, now: Millis) -> bool {
        match self.state {
            WindowState::Running { started } => {
                if now.wrapping_sub(started) >= self.duration_ms {
                    self.state = WindowState::Complete;
                    false
                } else {
                    true
                }
            }
            WindowState::Idle | WindowState::Complete => false,
        }
    }

    /// Only read while running and nothing has been captured yet.
    pub fn wants_read(&self) -> bool {
        matches!(self.state, WindowState::Running { .. }) && self.captured.is_none()
    }

    /// Record one read attempt. The first non-zero id is kept; later ones
    /// are ignored.
    pub fn offer(&mut self, id: T) {
        if !self.wants_read() {
            return;
        }
        self.attempts += 1;
        if !id.is_none() {
            self.captured = id;
        }
    }

    /// The id captured so far, or `NONE`.
    pub fn captured(&self) -> T {
        self.captured
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Chase interval for the current point in the window.
    pub fn chase_interval(&self, now: Millis) -> Millis {
        chase_interval_ms(self.elapsed(now), self.duration_ms)
    }
}

/// Linear interpolation from `CHASE_SLOW_MS` at the start of the window to
/// `CHASE_FAST_MS` at its end.
pub fn chase_interval_ms(elapsed: Millis, duration: Millis) -> Millis {
    if duration == 0 || elapsed >= duration {
        return CHASE_FAST_MS;
    }
    let span = (CHASE_SLOW_MS - CHASE_FAST_MS) as u64;
    let drop = span * elapsed as u64 / duration as u64;
    (CHASE_SLOW_MS as u64 - drop).max(CHASE_FAST_MS as u64) as Millis
}
