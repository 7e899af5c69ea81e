//! Home Assistant topics and payloads.

use core::fmt::Write as FmtWrite;
use heapless::String as HString;

use crate::cooldown::Millis;
use crate::remote::{parse_brightness, parse_cooldown, parse_switch, Command, RemoteControlState};

pub const STATUS_TOPIC: &str = "homeassistant/magicband/status";
pub const COMMAND_TOPIC: &str = "homeassistant/magicband/command";
pub const STATE_TOPIC: &str = "homeassistant/magicband/state";
pub const WAND_TOPIC: &str = "homeassistant/magicband/wand";
pub const BRIGHTNESS_SET_TOPIC: &str = "homeassistant/magicband/brightness/set";
pub const COOLDOWN_SET_TOPIC: &str = "homeassistant/magicband/cooldown/set";
pub const STATS_TOPIC: &str = "homeassistant/magicband/stats";

pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

/// Topics the controller listens on.
pub const SUBSCRIPTIONS: [&str; 3] = [COMMAND_TOPIC, BRIGHTNESS_SET_TOPIC, COOLDOWN_SET_TOPIC];

pub const STATS_INTERVAL_MS: u64 = 30_000;

/// Counters published on the stats topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub activations: u32,
    pub uptime_secs: u64,
    pub time_until_ready_ms: Millis,
    pub last_wand: u64,
}

/// Turn an incoming message into a validated command.
pub fn parse_command(topic: &str, payload: &[u8]) -> Result<Command, &'static str> {
    let text = core::str::from_utf8(payload).map_err(|_| "payload is not UTF-8")?;
    match topic {
        COMMAND_TOPIC => parse_switch(text).map(Command::SetEnabled),
        BRIGHTNESS_SET_TOPIC => parse_brightness(text).map(Command::SetBrightness),
        COOLDOWN_SET_TOPIC => parse_cooldown(text).map(Command::SetCooldown),
        _ => Err("unhandled topic"),
    }
}

fn push_json_str<const N: usize>(out: &mut HString<N>, s: &str) -> Result<(), ()> {
    out.push('"')?;
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\"")?,
            '\\' => out.push_str("\\\\")?,
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32).map_err(|_| ())?,
            c => out.push(c)?,
        }
    }
    out.push('"')
}

/// `{"enabled":"ON","brightness":80,"cooldown":5000,"auto_close":true}`
pub fn state_payload(state: &RemoteControlState) -> HString<128> {
    let mut out = HString::new();
    let _ = write!(
        out,
        r#"{{"enabled":"{}","brightness":{},"cooldown":{},"auto_close":{}}}"#,
        if state.system_enabled { "ON" } else { "OFF" },
        state.brightness,
        state.cooldown_ms,
        state.auto_close_enabled
    );
    out
}

/// Activation event. The id is sent as a decimal string so 64-bit values
/// survive JSON number parsing on the other end.
pub fn activation_payload(token_id: u64, timestamp_ms: u64, name: &str) -> HString<160> {
    let mut out = HString::new();
    let _ = write!(out, r#"{{"wand_id":"{}","timestamp":{},"name":"#, token_id, timestamp_ms);
    let _ = push_json_str(&mut out, name);
    let _ = out.push('}');
    out
}

/// `time_until_ready` is reported in whole seconds.
pub fn stats_payload(stats: &Stats) -> HString<160> {
    let mut out = HString::new();
    let _ = write!(
        out,
        r#"{{"activations":{},"uptime":{},"time_until_ready":{},"last_wand":"{}"}}"#,
        stats.activations,
        stats.uptime_secs,
        stats.time_until_ready_ms / 1000,
        stats.last_wand
    );
    out
}
