//! DFPlayer Mini on a blocking UART.

use esp_hal::delay::Delay;
use esp_hal::uart::Uart;
use esp_hal::Blocking;

use crate::dfplayer::{self, Command, Reply, DEFAULT_VOLUME, DEVICE_SD, FRAME_LEN};
use crate::presentation::Track;
use crate::stage::EffectPlayer;

/// How long to wait for the module to report in after a reset.
const ONLINE_TIMEOUT_MS: u32 = 2_000;
const POLL_MS: u32 = 10;

pub struct DfPlayer {
    uart: Uart<'static, Blocking>,
    ready: bool,
}

impl DfPlayer {
    /// Reset the module and wait for it to come online.
    ///
    /// A module that never answers leaves the player in the not-ready state;
    /// every later call is then a no-op.
    pub fn new(uart: Uart<'static, Blocking>) -> Self {
        let mut player = Self { uart, ready: false };
        let delay = Delay::new();

        player.send(&dfplayer::frame(Command::Reset, 0, false));

        let mut waited = 0;
        while waited < ONLINE_TIMEOUT_MS {
            match player.poll_reply() {
                Some(Reply::Online(_)) | Some(Reply::CardInserted) => {
                    player.ready = true;
                    break;
                }
                Some(Reply::Error(code)) => {
                    log::warn!("audio: module reported error {}", code);
                    break;
                }
                _ => {}
            }
            delay.delay_millis(POLL_MS);
            waited += POLL_MS;
            crate::feed_watchdog();
        }

        if !player.ready {
            log::warn!("audio: DFPlayer did not respond, running without sound");
            return player;
        }

        player.send(&dfplayer::frame(Command::OutputDevice, DEVICE_SD, false));
        delay.delay_millis(200);
        player.set_volume(DEFAULT_VOLUME);
        player.send(&dfplayer::frame(Command::Equalizer, 0, false));
        log::info!("audio: DFPlayer ready, volume {}", DEFAULT_VOLUME);
        player
    }

    pub fn set_volume(&mut self, level: u8) {
        self.send(&dfplayer::volume(level));
    }

    fn send(&mut self, frame: &[u8; FRAME_LEN]) {
        let mut sent = 0;
        while sent < frame.len() {
            match self.uart.write(&frame[sent..]) {
                Ok(n) => sent += n,
                Err(e) => {
                    log::warn!("audio: uart write failed: {:?}", e);
                    return;
                }
            }
        }
        let _ = self.uart.flush();
    }

    /// Read one reply frame if a whole one is waiting.
    fn poll_reply(&mut self) -> Option<Reply> {
        if !self.uart.read_ready() {
            return None;
        }
        let mut buf = [0u8; FRAME_LEN * 2];
        let mut len = 0;
        let delay = Delay::new();
        // A frame takes about 10 ms at 9600 baud
        for _ in 0..5 {
            if self.uart.read_ready() {
                match self.uart.read(&mut buf[len..]) {
                    Ok(n) => len += n,
                    Err(e) => {
                        log::debug!("audio: uart read failed: {:?}", e);
                        return None;
                    }
                }
            }
            if len >= FRAME_LEN || len == buf.len() {
                break;
            }
            delay.delay_millis(5);
        }

        let start = dfplayer::find_start(&buf[..len])?;
        match dfplayer::parse_reply(&buf[start..len]) {
            Ok(reply) => Some(reply),
            Err(e) => {
                log::debug!("audio: {}", e);
                None
            }
        }
    }
}

impl EffectPlayer for DfPlayer {
    fn play(&mut self, track: Track) {
        if !self.ready {
            return;
        }
        log::debug!("audio: play track {}", track.0);
        self.send(&dfplayer::play_track(track.0));
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
