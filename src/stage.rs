//! The prop's lights and speaker behind one `Presentation`.

use smart_leds::{SmartLedsWrite, RGB8};

use crate::controller::Clock;
use crate::cooldown::Millis;
use crate::led::LedStrip;
use crate::presentation::{Presentation, Track};

/// Something that can play numbered sound effects.
pub trait EffectPlayer {
    fn play(&mut self, track: Track);

    fn is_ready(&self) -> bool;
}

pub struct Stage<W, A, K> {
    strip: LedStrip<W>,
    audio: A,
    clock: K,
}

impl<W, A, K> Stage<W, A, K>
where
    W: SmartLedsWrite<Color = RGB8>,
    W::Error: core::fmt::Debug,
    A: EffectPlayer,
    K: Clock,
{
    pub fn new(strip: LedStrip<W>, audio: A, clock: K) -> Self {
        Self { strip, audio, clock }
    }

    pub fn strip(&self) -> &LedStrip<W> {
        &self.strip
    }

    pub fn strip_mut(&mut self) -> &mut LedStrip<W> {
        &mut self.strip
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    /// Boot animation followed by the chime, when sound is available.
    pub fn startup(&mut self) {
        let clock = &mut self.clock;
        self.strip.startup_sequence(|ms| clock.delay_ms(ms));
        if self.audio.is_ready() {
            self.audio.play(Track::CHIME);
        }
    }
}

impl<W, A, K> Presentation for Stage<W, A, K>
where
    W: SmartLedsWrite<Color = RGB8>,
    W::Error: core::fmt::Debug,
    A: EffectPlayer,
    K: Clock,
{
    fn set_brightness(&mut self, level: u8) {
        self.strip.set_brightness(level);
    }

    fn set_color(&mut self, color: RGB8) {
        self.strip.set_color(color);
    }

    fn start_chase(&mut self, now: Millis) {
        self.strip.start_chase(now);
    }

    fn step_chase(&mut self, now: Millis, interval_ms: Millis) {
        self.strip.step_chase(now, interval_ms);
    }

    fn stop_chase(&mut self) {
        self.strip.stop_chase();
    }

    fn fade_out(&mut self) {
        let clock = &mut self.clock;
        self.strip.fade_out(|ms| clock.delay_ms(ms));
    }

    fn flash(&mut self, color: RGB8, count: u8, interval_ms: Millis) {
        let clock = &mut self.clock;
        self.strip.flash(color, count, interval_ms, |ms| clock.delay_ms(ms));
    }

    fn cooldown_pulse(&mut self, now: Millis) {
        self.strip.cooldown_pulse(now);
    }

    fn end_cooldown(&mut self) {
        self.strip.end_cooldown();
    }

    fn play_effect(&mut self, track: Track) {
        if self.audio.is_ready() {
            self.audio.play(track);
        } else {
            log::debug!("stage: audio not ready, skipping track {}", track.0);
        }
    }

    fn is_effect_system_ready(&self) -> bool {
        self.audio.is_ready()
    }
}
