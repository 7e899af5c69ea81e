//! Token identities and the reader abstraction the controller polls.

use core::fmt::{Debug, UpperHex};

/// Identifier read from a band or wand.
///
/// Zero is reserved for "nothing read" and is never a valid identity.
pub trait TokenId: Copy + Eq + Debug + UpperHex {
    const NONE: Self;

    #[inline]
    fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Widen to 64 bits for reporting.
    fn widen(self) -> u64;
}

impl TokenId for u32 {
    const NONE: Self = 0;

    fn widen(self) -> u64 {
        self as u64
    }
}

impl TokenId for u64 {
    const NONE: Self = 0;

    fn widen(self) -> u64 {
        self
    }
}

/// A source of tokens (RFID reader, IR receiver).
///
/// Implementations must never block for longer than a short per-attempt
/// timeout; the detection window calls `poll` every few milliseconds.
pub trait TokenReader {
    type Id: TokenId;

    /// Attempt a read. Returns `Self::Id::NONE` when nothing was read.
    fn poll(&mut self) -> Self::Id;

    /// Cheap presence check. A reader may capture the identifier here and
    /// hand it out on the next `poll`.
    fn is_present(&mut self) -> bool;

    /// Whether the reader came up and is still producing decodable frames.
    fn is_healthy(&self) -> bool;

    /// Drop anything latched since the last read.
    fn discard(&mut self);
}

/// Single-slot buffer used by readers whose presence check already yields the
/// identifier (a completed frame is both "present" and "read").
#[derive(Debug, Clone, Copy)]
pub struct PendingRead<T: TokenId> {
    slot: Option<T>,
}

impl<T: TokenId> PendingRead<T> {
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Store a freshly decoded id. Zero is dropped.
    pub fn stash(&mut self, id: T) {
        if !id.is_none() {
            self.slot = Some(id);
        }
    }

    pub fn is_some(&self) -> bool {
        self.slot.is_some()
    }

    /// Hand out the stashed id, or `NONE`.
    pub fn take(&mut self) -> T {
        self.slot.take().unwrap_or(T::NONE)
    }
}

impl<T: TokenId> Default for PendingRead<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Consecutive decode failures before a reader reports itself unhealthy.
pub const UNHEALTHY_STREAK: u8 = 5;
/// Quiet time after the last failure before the streak is forgotten.
pub const HEALTH_RECOVERY_MS: u32 = 5_000;

/// Tracks a streak of undecodable frames (parity errors, unknown formats,
/// overflowed captures). A good frame or a quiet line clears it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadHealth {
    streak: u8,
    last_failure_ms: Option<u32>,
}

impl ReadHealth {
    pub const fn new() -> Self {
        Self {
            streak: 0,
            last_failure_ms: None,
        }
    }

    pub fn record_success(&mut self) {
        self.streak = 0;
        self.last_failure_ms = None;
    }

    pub fn record_failure(&mut self, now_ms: u32) {
        if self.expired(now_ms) {
            self.streak = 0;
        }
        self.streak = self.streak.saturating_add(1);
        self.last_failure_ms = Some(now_ms);
    }

    pub fn streak(&self) -> u8 {
        self.streak
    }

    pub fn is_healthy(&self, now_ms: u32) -> bool {
        self.streak < UNHEALTHY_STREAK || self.expired(now_ms)
    }

    fn expired(&self, now_ms: u32) -> bool {
        match self.last_failure_ms {
            Some(at) => now_ms.wrapping_sub(at) >= HEALTH_RECOVERY_MS,
            None => true,
        }
    }
}
