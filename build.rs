//! Build script for compile-time configuration injection.
//!
//! Set environment variables before building to configure the firmware:
//!
//!   MAGICBAND_SSID=MyWiFi \
//!   MAGICBAND_PASSWORD=secret123 \
//!   MAGICBAND_MQTT_HOST=192.168.1.10 \
//!   MAGICBAND_MQTT_PORT=1883 \
//!   MAGICBAND_MQTT_USER=magicband \
//!   MAGICBAND_MQTT_PASSWORD=secret \
//!   cargo build --release
//!
//! Wand build: `cargo build --release --no-default-features --features esp32,wand`

fn main() {
    // Re-run build script if these environment variables change
    println!("cargo::rerun-if-env-changed=MAGICBAND_SSID");
    println!("cargo::rerun-if-env-changed=MAGICBAND_PASSWORD");
    println!("cargo::rerun-if-env-changed=MAGICBAND_MQTT_HOST");
    println!("cargo::rerun-if-env-changed=MAGICBAND_MQTT_PORT");
    println!("cargo::rerun-if-env-changed=MAGICBAND_MQTT_USER");
    println!("cargo::rerun-if-env-changed=MAGICBAND_MQTT_PASSWORD");
    println!("cargo::rerun-if-env-changed=MAGICBAND_CLIENT_ID");
    println!("cargo::rerun-if-env-changed=MAGICBAND_REPORT_UNKNOWN");
}
