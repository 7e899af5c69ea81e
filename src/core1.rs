//! Core 1: WiFi and the Home Assistant MQTT session.
//!
//! This core handles network operations:
//! - WiFi connection management with automatic reconnection
//! - DHCP client for IP address acquisition
//! - The MQTT session (commands in, state/activations/stats out)

use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};
use smoltcp::iface::{Config as IfaceConfig, Interface, SocketSet, SocketStorage};
use smoltcp::socket::dhcpv4::{Event as DhcpEvent, Socket as DhcpSocket};
use smoltcp::time::Instant as SmoltcpInstant;
use smoltcp::wire::{HardwareAddress, IpCidr};

use crate::broker::Broker;
use crate::config::Config;
use crate::shared::SHARED;
use crate::{WIFI_CONTROLLER, WIFI_DEVICE};

// WiFi connection constants
const WIFI_CONNECT_TIMEOUT_MS: u64 = 10_000;
const WIFI_MAX_RETRIES_BEFORE_RESET: u8 = 3;
const WIFI_RESET_COOLDOWN_MS: u64 = 30_000;

const STATUS_LOG_MS: u64 = 30_000;

/// Core 1 main loop: WiFi, DHCP and MQTT.
pub fn run() -> ! {
    log::info!("Core 1 started (network)");

    // Give Core 0 time to finish setup
    esp_radio_rtos_driver::usleep(100_000);

    // Take WiFi handles from statics
    let handles = critical_section::with(|cs| {
        let device = WIFI_DEVICE.borrow_ref_mut(cs).take();
        let controller = WIFI_CONTROLLER.borrow_ref_mut(cs).take();
        device.zip(controller)
    });
    let Some((mut wifi_device, mut wifi_controller)) = handles else {
        log::error!("core1: WiFi handles missing, network disabled");
        idle_forever();
    };

    let config = Config::get();
    log::info!(
        "config: ssid={}, broker={}:{}, client={}",
        config.ssid,
        config.mqtt_host,
        config.mqtt_port,
        config.client_id
    );

    let mut wifi_state = WifiState::new();

    // Create smoltcp interface
    let mac = esp_radio::wifi::sta_mac();
    let hw_addr = HardwareAddress::Ethernet(smoltcp::wire::EthernetAddress(mac));
    let mut iface = Interface::new(IfaceConfig::new(hw_addr), &mut wifi_device, SmoltcpInstant::ZERO);

    // Socket storage for DHCP and the broker connection
    let mut socket_storage: [SocketStorage; 4] = Default::default();
    let mut sockets = SocketSet::new(&mut socket_storage[..]);

    let dhcp_handle = sockets.add(DhcpSocket::new());

    let mut broker = match Broker::new(&mut sockets, &config) {
        Ok(broker) => Some(broker),
        Err(e) => {
            log::error!("mqtt: {} ({}), remote control disabled", e, config.mqtt_host);
            None
        }
    };

    crate::heap_debug::log_heap_stats("core1:after_init");

    let mut last_log: u64 = 0;
    let mut last_wdt_feed: u64 = 0;
    let mut ip_configured = false;

    loop {
        let now_ms = crate::clock::uptime_ms();
        let smoltcp_now = SmoltcpInstant::from_millis(now_ms as i64);

        // 1. Maintain WiFi connection
        let was_configured = ip_configured;
        wifi_state.maintain(&mut wifi_controller, &config, now_ms, &mut ip_configured);

        if wifi_state.connected {
            // Poll the network interface
            iface.poll(smoltcp_now, &mut wifi_device, &mut sockets);

            // Handle DHCP events
            let dhcp_socket = sockets.get_mut::<DhcpSocket>(dhcp_handle);
            if let Some(event) = dhcp_socket.poll() {
                match event {
                    DhcpEvent::Configured(dhcp_config) => {
                        let addr = dhcp_config.address;
                        iface.update_ip_addrs(|addrs| {
                            addrs.clear();
                            addrs.push(IpCidr::Ipv4(addr)).ok();
                        });
                        if let Some(router) = dhcp_config.router {
                            iface.routes_mut().add_default_ipv4_route(router).ok();
                        }
                        log::info!("dhcp: IP={}", addr);
                        crate::heap_debug::log_heap_stats("core1:dhcp_configured");
                        ip_configured = true;
                    }
                    DhcpEvent::Deconfigured => {
                        log::warn!("dhcp: deconfigured");
                        iface.update_ip_addrs(|addrs| addrs.clear());
                        ip_configured = false;
                    }
                }
            }

            // 2. MQTT session, only once we have an IP
            if ip_configured {
                if let Some(broker) = broker.as_mut() {
                    broker.poll(&mut iface, &mut sockets, now_ms);
                }
            }
        }

        if was_configured && !ip_configured {
            if let Some(broker) = broker.as_mut() {
                broker.link_down(&mut sockets);
            }
        }

        // 3. Status logging
        if now_ms - last_log > STATUS_LOG_MS {
            last_log = now_ms;
            let stats = SHARED.stats(now_ms / 1000);
            log::info!(
                "status: {} activations, wifi={}, mqtt={}, queued={}",
                stats.activations,
                if wifi_state.connected { "up" } else { "down" },
                if broker.as_ref().is_some_and(Broker::is_connected) { "up" } else { "down" },
                SHARED.activations.len()
            );
            crate::heap_debug::warn_if_low(8, "core1:status");
        }

        // 4. Feed watchdog from Core 1 as backup
        if now_ms - last_wdt_feed >= 5000 {
            last_wdt_feed = now_ms;
            crate::feed_watchdog();
        }

        // Yield to scheduler so the WiFi driver tasks can run
        esp_radio_rtos_driver::usleep(10_000);
    }
}

fn idle_forever() -> ! {
    loop {
        crate::feed_watchdog();
        esp_radio_rtos_driver::usleep(1_000_000);
    }
}

/// WiFi connection state machine.
struct WifiState {
    connected: bool,
    connecting: bool,
    connect_started: u64,
    retry_count: u8,
    cooldown_until: u64,
}

impl WifiState {
    fn new() -> Self {
        Self {
            connected: false,
            connecting: false,
            connect_started: 0,
            retry_count: 0,
            cooldown_until: 0,
        }
    }

    fn maintain(
        &mut self,
        controller: &mut WifiController<'_>,
        config: &Config,
        now_ms: u64,
        ip_configured: &mut bool,
    ) {
        use alloc::string::ToString;

        if !self.connected {
            if now_ms < self.cooldown_until {
                // Waiting out the retry interval
            } else if !self.connecting {
                log::info!("wifi: connecting to {}", config.ssid);

                // Ensure WiFi is stopped before (re)configuring to avoid ESP-IDF errors
                let _ = controller.stop();
                esp_radio_rtos_driver::usleep(10_000);

                let client_config = ClientConfig::default()
                    .with_ssid(config.ssid.to_string())
                    .with_password(config.password.to_string());
                if let Err(e) = controller.set_config(&ModeConfig::Client(client_config)) {
                    log::error!("wifi: set_config failed: {:?}", e);
                }
                if let Err(e) = controller.start() {
                    log::error!("wifi: start failed: {:?}", e);
                }
                if let Err(e) = controller.connect() {
                    log::error!("wifi: connect failed: {:?}", e);
                }
                self.connecting = true;
                self.connect_started = now_ms;
            } else if controller.is_connected().unwrap_or(false) {
                log::info!("wifi: connected");
                self.connected = true;
                self.connecting = false;
                self.retry_count = 0;
            } else if now_ms - self.connect_started > WIFI_CONNECT_TIMEOUT_MS {
                self.retry_count = self.retry_count.saturating_add(1);
                log::warn!(
                    "wifi: connection timeout (attempt {}/{})",
                    self.retry_count,
                    WIFI_MAX_RETRIES_BEFORE_RESET
                );

                if self.retry_count >= WIFI_MAX_RETRIES_BEFORE_RESET {
                    // Power-cycle the radio and back off before the next round
                    log::warn!("wifi: power-cycling radio after {} failures", self.retry_count);
                    self.power_cycle(controller);
                    self.retry_count = 0;
                    self.cooldown_until = now_ms + WIFI_RESET_COOLDOWN_MS;
                }

                self.connecting = false;
            }
        } else if !controller.is_connected().unwrap_or(false) {
            log::warn!("wifi: disconnected, will power-cycle radio");
            self.connected = false;
            self.connecting = false;
            *ip_configured = false;
            self.power_cycle(controller);
            self.cooldown_until = now_ms + WIFI_RESET_COOLDOWN_MS;
        }
    }

    fn power_cycle(&mut self, controller: &mut WifiController<'_>) {
        if let Err(e) = controller.disconnect() {
            log::warn!("wifi: disconnect failed: {:?}", e);
        }
        if let Err(e) = controller.stop() {
            log::warn!("wifi: stop failed: {:?}", e);
        }
        crate::feed_watchdog(); // Feed before blocking sleep
        esp_radio_rtos_driver::usleep(100_000);
    }
}
