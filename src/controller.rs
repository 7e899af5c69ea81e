//! Detection-reaction controller.
//!
//! One call to [`Controller::run_iteration`] runs at most one complete
//! detect -> animate -> identify -> react -> cooldown cycle. The controller owns
//! the catalog (and so every rotation cursor) and the cooldown clock; nothing
//! else mutates them.

use crate::catalog::Catalog;
use crate::cooldown::{CooldownState, Millis};
use crate::detection::{DetectionWindow, DETECTION_WINDOW_MS};
use crate::presentation::{color, Presentation, Track};
use crate::remote::{RemoteChannel, UNKNOWN_NAME};
use crate::token::{TokenId, TokenReader};

// Timing constants
const POLL_SPACING_MS: Millis = 10;
const DETECT_CUE_MS: Millis = 300;
const COLOR_HOLD_MS: Millis = 200;
const CHIME_MS: Millis = 1_500;
const BETWEEN_SOUNDS_MS: Millis = 500;
const BAND_SOUND_MS: Millis = 3_000;
const LINGER_MS: Millis = 1_000;
const ERROR_SOUND_MS: Millis = 1_500;
const ALERT_FLASHES: u8 = 3;
const ALERT_INTERVAL_MS: Millis = 200;
const READER_WARN_INTERVAL_MS: Millis = 10_000;

/// Time source for the cycle. On hardware `delay_ms` busy-waits; in tests it
/// just advances a counter.
pub trait Clock {
    fn now_ms(&self) -> Millis;

    fn delay_ms(&mut self, ms: Millis);
}

/// How a detection cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Catalog hit at `index`.
    Recognized { index: usize },
    /// An id was read but is not in the catalog.
    Unknown { token_id: u64 },
    /// Nothing could be read during the window.
    ReadFailure,
}

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Disabled,
    CoolingDown,
    ReaderUnavailable,
    Idle,
    Reacted(Outcome),
}

pub struct Controller<R, P, C, K>
where
    R: TokenReader,
{
    reader: R,
    stage: P,
    remote: C,
    clock: K,
    catalog: Catalog<R::Id>,
    cooldown: CooldownState,
    report_unknown: bool,
    reader_warned_at: Option<Millis>,
    /// The strip is showing the cooldown pulse.
    pulsing: bool,
}

impl<R, P, C, K> Controller<R, P, C, K>
where
    R: TokenReader,
    P: Presentation,
    C: RemoteChannel,
    K: Clock,
{
    pub fn new(reader: R, stage: P, remote: C, clock: K, catalog: Catalog<R::Id>) -> Self {
        Self {
            reader,
            stage,
            remote,
            clock,
            catalog,
            cooldown: CooldownState::new(),
            report_unknown: false,
            reader_warned_at: None,
            pulsing: false,
        }
    }

    /// Also notify the remote side about tokens missing from the catalog.
    pub fn with_unknown_reporting(mut self, enabled: bool) -> Self {
        self.report_unknown = enabled;
        self
    }

    pub fn catalog(&self) -> &Catalog<R::Id> {
        &self.catalog
    }

    pub fn cooldown(&self) -> &CooldownState {
        &self.cooldown
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn stage(&self) -> &P {
        &self.stage
    }

    pub fn remote(&self) -> &C {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut C {
        &mut self.remote
    }

    pub fn clock_mut(&mut self) -> &mut K {
        &mut self.clock
    }

    /// Run one control-loop iteration at `now`.
    ///
    /// Cheap when nothing is going on: no token, disabled, or cooling down.
    /// When a token is present this blocks for the detection window and the
    /// reaction that follows.
    ///
    /// Taps made while the gate is closed are thrown away, never replayed.
    pub fn run_iteration(&mut self, now: Millis) -> Tick {
        let cooldown_ms = self.remote.cooldown_ms();
        self.remote
            .report_time_until_ready(self.cooldown.remaining(now, cooldown_ms));

        if !self.remote.is_enabled() {
            self.reader.discard();
            self.end_pulse();
            return Tick::Disabled;
        }

        self.stage.set_brightness(self.remote.brightness());

        if self.cooldown.is_active(now, cooldown_ms) {
            self.reader.discard();
            self.stage.cooldown_pulse(now);
            self.pulsing = true;
            return Tick::CoolingDown;
        }

        self.end_pulse();

        if !self.reader.is_healthy() {
            self.reader.discard();
            self.warn_reader_unavailable(now);
            return Tick::ReaderUnavailable;
        }

        if !self.reader.is_present() {
            return Tick::Idle;
        }

        log::info!("controller: token present, starting detection");

        if self.stage.is_effect_system_ready() {
            self.stage.play_effect(Track::CHIME);
            self.clock.delay_ms(DETECT_CUE_MS);
        }

        let token = self.run_detection_window();

        let outcome = if token.is_none() {
            log::warn!("controller: no token read during detection window");
            self.alert();
            Outcome::ReadFailure
        } else {
            self.react(token)
        };

        // The band is usually still held against the reader here
        self.reader.discard();
        self.cooldown.arm(now);
        Tick::Reacted(outcome)
    }

    /// Run the full window, stepping the chase and reading until the first
    /// non-zero id. Returns that id or `NONE`.
    fn run_detection_window(&mut self) -> R::Id {
        let mut window: DetectionWindow<R::Id> = DetectionWindow::new(DETECTION_WINDOW_MS);
        let started = self.clock.now_ms();
        window.start(started);
        self.stage.start_chase(started);

        loop {
            let t = self.clock.now_ms();
            if !window.step(t) {
                break;
            }

            self.stage.step_chase(t, window.chase_interval(t));

            if window.wants_read() {
                window.offer(self.reader.poll());
                if !window.captured().is_none() {
                    log::info!(
                        "controller: read {:X} after {} attempts ({}ms)",
                        window.captured(),
                        window.attempts(),
                        window.elapsed(t)
                    );
                }
            }

            self.clock.delay_ms(POLL_SPACING_MS);
        }

        self.stage.stop_chase();
        window.captured()
    }

    fn react(&mut self, token: R::Id) -> Outcome {
        let Some((index, entry)) = self.catalog.lookup_mut(token) else {
            log::warn!("controller: unknown token {:X}", token);
            self.alert();
            if self.report_unknown {
                self.remote.notify_activation(token.widen(), UNKNOWN_NAME);
            }
            return Outcome::Unknown {
                token_id: token.widen(),
            };
        };

        let (band_color, track, name) = (entry.color, entry.current_sound(), entry.display_name);
        entry.advance();
        log::info!("controller: {} ({:X}) activated", name, token);

        self.stage.set_color(band_color);
        self.clock.delay_ms(COLOR_HOLD_MS);

        let audio = self.stage.is_effect_system_ready();
        if audio {
            self.stage.play_effect(Track::CHIME);
            self.clock.delay_ms(CHIME_MS);
        }

        self.clock.delay_ms(BETWEEN_SOUNDS_MS);

        if audio {
            self.stage.play_effect(track);
            self.clock.delay_ms(BAND_SOUND_MS);
        }

        self.clock.delay_ms(LINGER_MS);
        self.stage.fade_out();

        self.remote.notify_activation(token.widen(), name);
        Outcome::Recognized { index }
    }

    fn end_pulse(&mut self) {
        if self.pulsing {
            self.pulsing = false;
            self.stage.end_cooldown();
        }
    }

    /// Red flashes plus the error sound.
    fn alert(&mut self) {
        self.stage.flash(color::RED, ALERT_FLASHES, ALERT_INTERVAL_MS);
        if self.stage.is_effect_system_ready() {
            self.stage.play_effect(Track::ERROR);
            self.clock.delay_ms(ERROR_SOUND_MS);
        }
    }

    fn warn_reader_unavailable(&mut self, now: Millis) {
        let due = match self.reader_warned_at {
            Some(at) => now.wrapping_sub(at) >= READER_WARN_INTERVAL_MS,
            None => true,
        };
        if due {
            self.reader_warned_at = Some(now);
            log::warn!("controller: token reader not healthy, skipping detection");
        }
    }
}
