use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use portable_atomic::AtomicU64;

use crate::cooldown::Millis;
use crate::events::{Activation, ActivationQueue};
use crate::homeassistant::Stats;
use crate::remote::{Command, RemoteChannel, RemoteControlState, DEFAULT_BRIGHTNESS};

/// Shared state between Core 0 (controller) and Core 1 (network).
pub struct Shared {
    // Remote control - written by Core 1, read by Core 0
    enabled: AtomicBool,
    brightness: AtomicU8,
    cooldown_ms: AtomicU32,
    auto_close: AtomicBool,
    /// Set when the remote state changed and should be republished.
    state_dirty: AtomicBool,

    // Statistics - written by Core 0, read by Core 1
    activation_count: AtomicU32,
    time_until_ready_ms: AtomicU32,
    last_wand: AtomicU64,

    pub activations: ActivationQueue,
}

impl Shared {
    pub const fn new() -> Self {
        let defaults = RemoteControlState::new();
        Self {
            enabled: AtomicBool::new(defaults.system_enabled),
            brightness: AtomicU8::new(DEFAULT_BRIGHTNESS),
            cooldown_ms: AtomicU32::new(defaults.cooldown_ms),
            auto_close: AtomicBool::new(defaults.auto_close_enabled),
            state_dirty: AtomicBool::new(false),
            activation_count: AtomicU32::new(0),
            time_until_ready_ms: AtomicU32::new(0),
            last_wand: AtomicU64::new(0),
            activations: ActivationQueue::new(),
        }
    }

    pub fn remote_state(&self) -> RemoteControlState {
        RemoteControlState {
            system_enabled: self.enabled.load(Ordering::Acquire),
            brightness: self.brightness.load(Ordering::Relaxed),
            cooldown_ms: self.cooldown_ms.load(Ordering::Relaxed),
            auto_close_enabled: self.auto_close.load(Ordering::Relaxed),
        }
    }

    /// Apply a remote command (called from Core 1). Rejected commands leave
    /// every value as it was.
    pub fn apply(&self, command: Command) -> Result<(), &'static str> {
        let mut state = self.remote_state();
        command.apply(&mut state)?;

        self.brightness.store(state.brightness, Ordering::Relaxed);
        self.cooldown_ms.store(state.cooldown_ms, Ordering::Relaxed);
        self.auto_close.store(state.auto_close_enabled, Ordering::Relaxed);
        self.enabled.store(state.system_enabled, Ordering::Release);
        self.state_dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Check and clear the republish flag (called from Core 1).
    pub fn take_state_dirty(&self) -> bool {
        self.state_dirty.swap(false, Ordering::AcqRel)
    }

    /// Count an activation and queue it for publishing (called from Core 0).
    pub fn record_activation(&self, activation: Activation) {
        self.activation_count.fetch_add(1, Ordering::Relaxed);
        self.last_wand.store(activation.token_id, Ordering::Relaxed);
        self.activations.push(activation);
    }

    pub fn set_time_until_ready(&self, remaining_ms: Millis) {
        self.time_until_ready_ms.store(remaining_ms, Ordering::Relaxed);
    }

    pub fn stats(&self, uptime_secs: u64) -> Stats {
        Stats {
            activations: self.activation_count.load(Ordering::Relaxed),
            uptime_secs,
            time_until_ready_ms: self.time_until_ready_ms.load(Ordering::Relaxed),
            last_wand: self.last_wand.load(Ordering::Relaxed),
        }
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

/// Global shared state - static for cross-core access.
pub static SHARED: Shared = Shared::new();

/// The controller's view of the remote side: reads settings from, and
/// reports into, a `Shared`.
pub struct SharedRemote {
    shared: &'static Shared,
    uptime_ms: fn() -> u64,
}

impl SharedRemote {
    pub fn new(shared: &'static Shared, uptime_ms: fn() -> u64) -> Self {
        Self { shared, uptime_ms }
    }
}

impl RemoteChannel for SharedRemote {
    fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    fn brightness(&self) -> u8 {
        self.shared.brightness.load(Ordering::Relaxed)
    }

    fn cooldown_ms(&self) -> Millis {
        self.shared.cooldown_ms.load(Ordering::Relaxed)
    }

    fn is_auto_close_enabled(&self) -> bool {
        self.shared.auto_close.load(Ordering::Relaxed)
    }

    fn notify_activation(&mut self, token_id: u64, name: &'static str) {
        self.shared.record_activation(Activation {
            token_id,
            name,
            at_ms: (self.uptime_ms)(),
        });
    }

    fn report_time_until_ready(&mut self, remaining_ms: Millis) {
        self.shared.set_time_until_ready(remaining_ms);
    }
}
