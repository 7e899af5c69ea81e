//! Remote control state and the channel the controller talks to.
//!
//! Values arrive asynchronously from Home Assistant. They are validated here,
//! at the boundary, so the controller only ever sees in-range settings.

use crate::cooldown::{Millis, DEFAULT_COOLDOWN_MS, MAX_COOLDOWN_MS, MIN_COOLDOWN_MS};

pub const DEFAULT_BRIGHTNESS: u8 = 80;

/// Name reported for tokens that are not in the catalog.
pub const UNKNOWN_NAME: &str = "Unknown";

/// What the controller reads from, and reports to, the remote side.
pub trait RemoteChannel {
    fn is_enabled(&self) -> bool;

    fn brightness(&self) -> u8;

    fn cooldown_ms(&self) -> Millis;

    fn is_auto_close_enabled(&self) -> bool;

    /// A detection cycle resolved a token.
    fn notify_activation(&mut self, token_id: u64, name: &'static str);

    /// Remaining cooldown, refreshed every loop iteration.
    fn report_time_until_ready(&mut self, remaining_ms: Millis);
}

/// Snapshot of the remotely controlled settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteControlState {
    pub system_enabled: bool,
    pub brightness: u8,
    pub cooldown_ms: Millis,
    pub auto_close_enabled: bool,
}

impl RemoteControlState {
    pub const fn new() -> Self {
        Self {
            system_enabled: true,
            brightness: DEFAULT_BRIGHTNESS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            auto_close_enabled: true,
        }
    }
}

impl Default for RemoteControlState {
    fn default() -> Self {
        Self::new()
    }
}

/// A validated change requested by the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetEnabled(bool),
    SetBrightness(u8),
    SetCooldown(Millis),
}

impl Command {
    /// Apply to `state`. Out-of-range values are rejected and leave it
    /// untouched.
    pub fn apply(self, state: &mut RemoteControlState) -> Result<(), &'static str> {
        match self {
            Command::SetEnabled(on) => state.system_enabled = on,
            Command::SetBrightness(level) => state.brightness = level,
            Command::SetCooldown(ms) => {
                if !(MIN_COOLDOWN_MS..=MAX_COOLDOWN_MS).contains(&ms) {
                    return Err("cooldown out of range");
                }
                state.cooldown_ms = ms;
            }
        }
        Ok(())
    }
}

/// Parse an ON/OFF switch payload.
pub fn parse_switch(payload: &str) -> Result<bool, &'static str> {
    match payload.trim() {
        "ON" | "on" => Ok(true),
        "OFF" | "off" => Ok(false),
        _ => Err("switch payload must be ON or OFF"),
    }
}

/// Parse a brightness payload (0-255).
pub fn parse_brightness(payload: &str) -> Result<u8, &'static str> {
    let value: i64 = payload.trim().parse().map_err(|_| "brightness is not a number")?;
    if !(0..=255).contains(&value) {
        return Err("brightness out of range");
    }
    Ok(value as u8)
}

/// Parse a cooldown payload in milliseconds (1-60 s).
pub fn parse_cooldown(payload: &str) -> Result<Millis, &'static str> {
    let value: i64 = payload.trim().parse().map_err(|_| "cooldown is not a number")?;
    if value < MIN_COOLDOWN_MS as i64 || value > MAX_COOLDOWN_MS as i64 {
        return Err("cooldown out of range");
    }
    Ok(value as Millis)
}
