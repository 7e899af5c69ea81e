//! Build-time configuration.
//!
//! Network credentials and policies are embedded at compile time:
//!
//!   MAGICBAND_SSID=MyWiFi \
//!   MAGICBAND_PASSWORD=secret123 \
//!   MAGICBAND_MQTT_HOST=192.168.1.10 \
//!   cargo build --release

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_CLIENT_ID: &str = "magicband_controller";

#[derive(Clone)]
pub struct Config {
    pub ssid: &'static str,
    pub password: &'static str,
    pub mqtt_host: &'static str,
    pub mqtt_port: u16,
    pub mqtt_user: Option<&'static str>,
    pub mqtt_password: Option<&'static str>,
    pub client_id: &'static str,
    /// Publish activations for tokens missing from the catalog.
    pub report_unknown: bool,
}

impl Config {
    pub fn get() -> Self {
        Self {
            ssid: option_env!("MAGICBAND_SSID").unwrap_or("unconfigured"),
            password: option_env!("MAGICBAND_PASSWORD").unwrap_or(""),
            mqtt_host: option_env!("MAGICBAND_MQTT_HOST").unwrap_or("192.168.1.1"),
            mqtt_port: match option_env!("MAGICBAND_MQTT_PORT") {
                Some(s) => parse_port(s),
                None => DEFAULT_MQTT_PORT,
            },
            mqtt_user: non_empty(option_env!("MAGICBAND_MQTT_USER")),
            mqtt_password: non_empty(option_env!("MAGICBAND_MQTT_PASSWORD")),
            client_id: match option_env!("MAGICBAND_CLIENT_ID") {
                Some(s) if !s.is_empty() => s,
                _ => DEFAULT_CLIENT_ID,
            },
            report_unknown: match option_env!("MAGICBAND_REPORT_UNKNOWN") {
                Some(s) => parse_flag(s),
                None => false,
            },
        }
    }
}

fn non_empty(value: Option<&'static str>) -> Option<&'static str> {
    value.filter(|s| !s.is_empty())
}

/// Parse a port number; anything unparseable falls back to the MQTT default.
pub const fn parse_port(s: &str) -> u16 {
    let bytes = s.as_bytes();
    let mut result: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        if digit >= b'0' && digit <= b'9' {
            result = result * 10 + (digit - b'0') as u32;
            if result > u16::MAX as u32 {
                return DEFAULT_MQTT_PORT;
            }
        }
        i += 1;
    }
    if result == 0 { DEFAULT_MQTT_PORT } else { result as u16 }
}

/// `1`, `true`, `yes` and `on` (any case) enable a flag.
pub fn parse_flag(s: &str) -> bool {
    let s = s.trim();
    s == "1"
        || s.eq_ignore_ascii_case("true")
        || s.eq_ignore_ascii_case("yes")
        || s.eq_ignore_ascii_case("on")
}
