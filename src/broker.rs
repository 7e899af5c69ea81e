//! MQTT session with the Home Assistant broker.
//!
//! Keeps one TCP socket open to the broker, publishes activations, state and
//! statistics, and applies incoming commands to `SHARED`. Everything is
//! non-blocking: `poll` is called from the core 1 loop right after the
//! interface poll and returns immediately.

use heapless::Vec;
use smoltcp::iface::{Interface, SocketHandle, SocketSet};
use smoltcp::socket::tcp::{Socket as TcpSocket, SocketBuffer, State as TcpState};
use smoltcp::wire::{IpAddress, Ipv4Address};

use crate::config::Config;
use crate::homeassistant::{self, Stats};
use crate::mqtt::{self, Connect, Packet, Will, KEEPALIVE_SECS};
use crate::remote::Command;
use crate::shared::SHARED;

const RECONNECT_INTERVAL_MS: u64 = 5_000;
const CONNECT_TIMEOUT_MS: u64 = 10_000;
const PING_INTERVAL_MS: u64 = KEEPALIVE_SECS as u64 * 1000 / 2;
const PING_TIMEOUT_MS: u64 = KEEPALIVE_SECS as u64 * 1000;
const LOCAL_PORT_FIRST: u16 = 49152;
const LOCAL_PORT_LAST: u16 = 65000;

const RX_ACCUM: usize = 512;
const TX_SCRATCH: usize = 384;

const TX_FULL: &str = "tx buffer full";

// Socket buffers live in statics to keep them off the core 1 stack
static mut MQTT_RX: [u8; 1024] = [0; 1024];
static mut MQTT_TX: [u8; 1024] = [0; 1024];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Session {
    Disconnected { retry_at: u64 },
    Connecting { since: u64 },
    AwaitingConnAck { since: u64 },
    Ready { last_tx: u64, ping_sent: Option<u64> },
}

/// What a received packet asks us to do, detached from the receive buffer.
enum Incoming {
    ConnAck(u8),
    Command(Result<Command, &'static str>),
    PingResp,
    Ignored,
}

pub struct Broker {
    handle: SocketHandle,
    remote: (Ipv4Address, u16),
    config: Config,
    session: Session,
    rx: Vec<u8, RX_ACCUM>,
    last_stats: u64,
    packet_id: u16,
    local_port: u16,
}

impl Broker {
    /// Create the broker socket. Fails if the configured host is not an
    /// IPv4 address.
    pub fn new(sockets: &mut SocketSet<'_>, config: &Config) -> Result<Self, &'static str> {
        let ip = parse_ipv4(config.mqtt_host).ok_or("invalid broker address")?;

        // SAFETY: Broker::new is called once, from core 1, before the loop starts
        let rx = SocketBuffer::new(unsafe { &mut (*core::ptr::addr_of_mut!(MQTT_RX))[..] });
        let tx = SocketBuffer::new(unsafe { &mut (*core::ptr::addr_of_mut!(MQTT_TX))[..] });
        let handle = sockets.add(TcpSocket::new(rx, tx));

        Ok(Self {
            handle,
            remote: (ip, config.mqtt_port),
            config: config.clone(),
            session: Session::Disconnected { retry_at: 0 },
            rx: Vec::new(),
            last_stats: 0,
            packet_id: 0,
            local_port: LOCAL_PORT_FIRST,
        })
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.session, Session::Ready { .. })
    }

    /// Network went away; drop the session and reconnect as soon as it is back.
    pub fn link_down(&mut self, sockets: &mut SocketSet<'_>) {
        if !matches!(self.session, Session::Disconnected { .. }) {
            log::warn!("mqtt: network down, session dropped");
            sockets.get_mut::<TcpSocket>(self.handle).abort();
        }
        self.rx.clear();
        self.session = Session::Disconnected { retry_at: 0 };
    }

    pub fn poll(&mut self, iface: &mut Interface, sockets: &mut SocketSet<'_>, now: u64) {
        let result = match self.session {
            Session::Disconnected { retry_at } => {
                if now >= retry_at {
                    self.start_connect(iface, sockets, now)
                } else {
                    Ok(())
                }
            }
            Session::Connecting { since } => self.poll_connecting(sockets, now, since),
            Session::AwaitingConnAck { since } => {
                if now - since > CONNECT_TIMEOUT_MS {
                    Err("no CONNACK from broker")
                } else {
                    self.receive(sockets, now)
                }
            }
            Session::Ready { .. } => self.poll_ready(sockets, now),
        };

        if let Err(e) = result {
            self.fail(sockets, now, e);
        }
    }

    fn fail(&mut self, sockets: &mut SocketSet<'_>, now: u64, reason: &str) {
        log::warn!("mqtt: {}, retrying in {}s", reason, RECONNECT_INTERVAL_MS / 1000);
        sockets.get_mut::<TcpSocket>(self.handle).abort();
        self.rx.clear();
        self.session = Session::Disconnected {
            retry_at: now + RECONNECT_INTERVAL_MS,
        };
    }

    fn start_connect(
        &mut self,
        iface: &mut Interface,
        sockets: &mut SocketSet<'_>,
        now: u64,
    ) -> Result<(), &'static str> {
        // A fresh local port each attempt keeps clear of TIME_WAIT leftovers
        self.local_port = if self.local_port >= LOCAL_PORT_LAST {
            LOCAL_PORT_FIRST
        } else {
            self.local_port + 1
        };

        let socket = sockets.get_mut::<TcpSocket>(self.handle);
        if socket.is_open() {
            socket.abort();
        }
        let (ip, port) = self.remote;
        log::info!("mqtt: connecting to {}:{}", ip, port);
        socket
            .connect(iface.context(), (IpAddress::Ipv4(ip), port), self.local_port)
            .map_err(|_| "connect initiation failed")?;
        self.session = Session::Connecting { since: now };
        Ok(())
    }

    fn poll_connecting(
        &mut self,
        sockets: &mut SocketSet<'_>,
        now: u64,
        since: u64,
    ) -> Result<(), &'static str> {
        let socket = sockets.get_mut::<TcpSocket>(self.handle);
        if socket.may_send() {
            let mut buf = [0u8; TX_SCRATCH];
            let connect = Connect {
                client_id: self.config.client_id,
                username: self.config.mqtt_user,
                password: self.config.mqtt_password,
                will: Some(Will {
                    topic: homeassistant::STATUS_TOPIC,
                    payload: homeassistant::OFFLINE.as_bytes(),
                    retain: true,
                }),
                keep_alive_secs: KEEPALIVE_SECS,
            };
            let n = mqtt::encode_connect(&mut buf, &connect)?;
            self.send(sockets, &buf[..n])?;
            self.session = Session::AwaitingConnAck { since: now };
            return Ok(());
        }
        if socket.state() == TcpState::Closed {
            return Err("connection refused");
        }
        if now - since > CONNECT_TIMEOUT_MS {
            return Err("connection timeout");
        }
        Ok(())
    }

    fn poll_ready(&mut self, sockets: &mut SocketSet<'_>, now: u64) -> Result<(), &'static str> {
        let state = sockets.get_mut::<TcpSocket>(self.handle).state();
        if matches!(state, TcpState::Closed | TcpState::CloseWait) {
            return Err("connection closed by broker");
        }

        self.receive(sockets, now)?;
        let Session::Ready { last_tx, ping_sent } = self.session else {
            return Ok(());
        };

        self.publish_pending_activation(sockets, now)?;

        if SHARED.take_state_dirty() {
            self.publish_state(sockets, now)?;
        }

        if now - self.last_stats >= homeassistant::STATS_INTERVAL_MS {
            self.last_stats = now;
            self.publish_stats(sockets, now)?;
        }

        match ping_sent {
            Some(sent) if now - sent > PING_TIMEOUT_MS => return Err("ping timeout"),
            Some(_) => {}
            None if now - last_tx >= PING_INTERVAL_MS => {
                let mut buf = [0u8; 2];
                let n = mqtt::encode_pingreq(&mut buf)?;
                self.send(sockets, &buf[..n])?;
                self.session = Session::Ready {
                    last_tx: now,
                    ping_sent: Some(now),
                };
            }
            None => {}
        }
        Ok(())
    }

    /// Pull bytes off the socket and handle every complete packet.
    fn receive(&mut self, sockets: &mut SocketSet<'_>, now: u64) -> Result<(), &'static str> {
        {
            let socket = sockets.get_mut::<TcpSocket>(self.handle);
            if socket.can_recv() {
                let mut chunk = [0u8; 256];
                let room = (RX_ACCUM - self.rx.len()).min(chunk.len());
                let n = socket
                    .recv_slice(&mut chunk[..room])
                    .map_err(|_| "receive failed")?;
                self.rx
                    .extend_from_slice(&chunk[..n])
                    .map_err(|_| "receive buffer overflow")?;
            }
        }

        while let Some(incoming) = self.next_incoming()? {
            match incoming {
                Incoming::ConnAck(0) => self.on_connected(sockets, now)?,
                Incoming::ConnAck(code) => return Err(mqtt::connack_reason(code)),
                Incoming::Command(Ok(command)) => match SHARED.apply(command) {
                    Ok(()) => log::info!("mqtt: applied {:?}", command),
                    Err(e) => log::warn!("mqtt: rejected {:?}: {}", command, e),
                },
                Incoming::Command(Err(e)) => log::warn!("mqtt: ignored command: {}", e),
                Incoming::PingResp => {
                    if let Session::Ready { last_tx, .. } = self.session {
                        self.session = Session::Ready {
                            last_tx,
                            ping_sent: None,
                        };
                    }
                }
                Incoming::Ignored => {}
            }
        }
        Ok(())
    }

    fn next_incoming(&mut self) -> Result<Option<Incoming>, &'static str> {
        let (incoming, used) = match mqtt::decode(&self.rx)? {
            Some((packet, used)) => {
                let incoming = match packet {
                    Packet::ConnAck { code, .. } => Incoming::ConnAck(code),
                    Packet::Publish { topic, payload, .. } => {
                        Incoming::Command(homeassistant::parse_command(topic, payload))
                    }
                    Packet::PingResp => Incoming::PingResp,
                    Packet::SubAck { granted, .. } => {
                        if granted == 0x80 {
                            log::warn!("mqtt: subscription refused");
                        }
                        Incoming::Ignored
                    }
                    Packet::Other(kind) => {
                        log::debug!("mqtt: ignoring packet type {}", kind);
                        Incoming::Ignored
                    }
                };
                (incoming, used)
            }
            None if self.rx.is_full() => return Err("packet larger than receive buffer"),
            None => return Ok(None),
        };

        let rest = self.rx.len() - used;
        self.rx.copy_within(used.., 0);
        self.rx.truncate(rest);
        Ok(Some(incoming))
    }

    fn on_connected(&mut self, sockets: &mut SocketSet<'_>, now: u64) -> Result<(), &'static str> {
        log::info!("mqtt: connected as {}", self.config.client_id);
        self.session = Session::Ready {
            last_tx: now,
            ping_sent: None,
        };

        self.publish(
            sockets,
            now,
            homeassistant::STATUS_TOPIC,
            homeassistant::ONLINE.as_bytes(),
            true,
        )?;

        let mut buf = [0u8; TX_SCRATCH];
        self.packet_id = self.packet_id.wrapping_add(1).max(1);
        let n = mqtt::encode_subscribe(&mut buf, self.packet_id, &homeassistant::SUBSCRIPTIONS)?;
        self.send(sockets, &buf[..n])?;

        self.publish_state(sockets, now)?;
        self.last_stats = now;
        self.publish_stats(sockets, now)
    }

    fn publish_state(&mut self, sockets: &mut SocketSet<'_>, now: u64) -> Result<(), &'static str> {
        let payload = homeassistant::state_payload(&SHARED.remote_state());
        self.publish(sockets, now, homeassistant::STATE_TOPIC, payload.as_bytes(), true)
    }

    fn publish_stats(&mut self, sockets: &mut SocketSet<'_>, now: u64) -> Result<(), &'static str> {
        let stats: Stats = SHARED.stats(now / 1000);
        let payload = homeassistant::stats_payload(&stats);
        self.publish(sockets, now, homeassistant::STATS_TOPIC, payload.as_bytes(), false)
    }

    /// Publish the oldest queued activation; it leaves the queue only once it
    /// is in the socket buffer.
    fn publish_pending_activation(
        &mut self,
        sockets: &mut SocketSet<'_>,
        now: u64,
    ) -> Result<(), &'static str> {
        let Some(activation) = SHARED.activations.peek() else {
            return Ok(());
        };
        let payload =
            homeassistant::activation_payload(activation.token_id, activation.at_ms, activation.name);
        match self.publish(sockets, now, homeassistant::WAND_TOPIC, payload.as_bytes(), false) {
            Ok(()) => {
                log::info!("mqtt: published activation {}", activation.token_id);
                SHARED.activations.commit(&activation);
                Ok(())
            }
            Err(e) if e == TX_FULL => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn publish(
        &mut self,
        sockets: &mut SocketSet<'_>,
        now: u64,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), &'static str> {
        let mut buf = [0u8; TX_SCRATCH];
        let n = mqtt::encode_publish(&mut buf, topic, payload, retain)?;
        self.send(sockets, &buf[..n])?;
        if let Session::Ready { ping_sent, .. } = self.session {
            self.session = Session::Ready {
                last_tx: now,
                ping_sent,
            };
        }
        Ok(())
    }

    /// Queue a whole packet or nothing.
    fn send(&mut self, sockets: &mut SocketSet<'_>, bytes: &[u8]) -> Result<(), &'static str> {
        let socket = sockets.get_mut::<TcpSocket>(self.handle);
        if !socket.can_send() || socket.send_capacity() - socket.send_queue() < bytes.len() {
            return Err(TX_FULL);
        }
        socket.send_slice(bytes).map_err(|_| "send failed")?;
        Ok(())
    }
}

/// Parse an IPv4 address from a string without heap allocation.
fn parse_ipv4(s: &str) -> Option<Ipv4Address> {
    let mut octets = [0u8; 4];
    let mut octet_idx = 0;

    for part in s.split('.') {
        if octet_idx >= 4 {
            return None;
        }
        octets[octet_idx] = part.parse().ok()?;
        octet_idx += 1;
    }

    if octet_idx == 4 {
        Some(Ipv4Address::new(octets[0], octets[1], octets[2], octets[3]))
    } else {
        None
    }
}
