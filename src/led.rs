//! WS2812 strip effects on top of any `smart_leds` writer.
//!
//! The strip keeps its own frame and a global brightness that is applied on
//! every write, so dimming never loses the underlying colors. LED 0 sits
//! behind the reader and is never lit by the chase.

use smart_leds::hsv::{hsv2rgb, Hsv};
use smart_leds::{brightness, SmartLedsWrite, RGB8};

use crate::cooldown::Millis;
use crate::presentation::color;
use crate::remote::DEFAULT_BRIGHTNESS;

pub const NUM_LEDS: usize = 17;

const FADE_STEP_MS: Millis = 20;
const PULSE_STEP_MS: Millis = 30;
pub const PULSE_MIN: u8 = 10;
pub const PULSE_MAX: u8 = 80;
const PULSE_DELTA: u8 = 5;
const TAIL1_FADE: u8 = 128;
const TAIL2_FADE: u8 = 192;

/// Scale a color down by `by`/256.
pub fn fade_by(c: RGB8, by: u8) -> RGB8 {
    let keep = 256 - by as u16;
    RGB8 {
        r: (c.r as u16 * keep / 256) as u8,
        g: (c.g as u16 * keep / 256) as u8,
        b: (c.b as u16 * keep / 256) as u8,
    }
}

#[derive(Debug, Clone, Copy)]
struct Chase {
    position: usize,
    last_step: Millis,
    saved_level: u8,
}

#[derive(Debug, Clone, Copy)]
struct Pulse {
    level: u8,
    rising: bool,
    last_step: Option<Millis>,
}

impl Pulse {
    const fn new() -> Self {
        Self {
            level: PULSE_MIN,
            rising: true,
            last_step: None,
        }
    }

    fn advance(&mut self) {
        if self.rising {
            self.level = self.level.saturating_add(PULSE_DELTA);
            if self.level >= PULSE_MAX {
                self.rising = false;
            }
        } else if self.level <= PULSE_MIN {
            self.level = PULSE_MIN;
            self.rising = true;
        } else {
            self.level -= PULSE_DELTA;
        }
    }
}

pub struct LedStrip<W> {
    writer: W,
    frame: [RGB8; NUM_LEDS],
    /// Brightness requested by the remote side.
    base_level: u8,
    /// Brightness applied on the next write.
    level: u8,
    /// Color of the last reaction or alert, breathed during cooldown.
    accent: RGB8,
    chase: Option<Chase>,
    pulse: Pulse,
}

impl<W> LedStrip<W>
where
    W: SmartLedsWrite<Color = RGB8>,
    W::Error: core::fmt::Debug,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frame: [color::BLACK; NUM_LEDS],
            base_level: DEFAULT_BRIGHTNESS,
            level: DEFAULT_BRIGHTNESS,
            accent: color::BLACK,
            chase: None,
            pulse: Pulse::new(),
        }
    }

    pub fn frame(&self) -> &[RGB8; NUM_LEDS] {
        &self.frame
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_chasing(&self) -> bool {
        self.chase.is_some()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn show(&mut self) {
        let frame = self.frame;
        if let Err(e) = self.writer.write(brightness(frame.iter().cloned(), self.level)) {
            log::warn!("led: write failed: {:?}", e);
        }
    }

    fn fill(&mut self, c: RGB8) {
        self.frame = [c; NUM_LEDS];
    }

    /// Takes effect on the next write.
    pub fn set_brightness(&mut self, level: u8) {
        self.base_level = level;
        if self.chase.is_none() {
            self.level = level;
        }
    }

    pub fn set_color(&mut self, c: RGB8) {
        self.accent = c;
        self.fill(c);
        self.show();
    }

    pub fn clear(&mut self) {
        self.fill(color::BLACK);
        self.show();
    }

    /// Dim blue shown while the rest of the hardware comes up.
    pub fn boot_indicator(&mut self) {
        self.fill(color::BLUE);
        self.level = 30;
        self.show();
    }

    pub fn start_chase(&mut self, now: Millis) {
        self.chase = Some(Chase {
            position: 1,
            last_step: now,
            saved_level: self.level,
        });
        self.level = DEFAULT_BRIGHTNESS;
        self.clear();
    }

    /// Move the chase head one LED if `interval_ms` has passed.
    pub fn step_chase(&mut self, now: Millis, interval_ms: Millis) {
        let Some(mut chase) = self.chase else {
            return;
        };
        if now.wrapping_sub(chase.last_step) < interval_ms {
            return;
        }
        chase.last_step = now;

        let head = chase.position;
        self.frame = [color::BLACK; NUM_LEDS];
        self.frame[head] = color::CHASE;
        if head > 1 {
            self.frame[head - 1] = fade_by(color::CHASE, TAIL1_FADE);
        }
        if head > 2 {
            self.frame[head - 2] = fade_by(color::CHASE, TAIL2_FADE);
        }
        self.show();

        chase.position = if head + 1 >= NUM_LEDS { 1 } else { head + 1 };
        self.chase = Some(chase);
    }

    pub fn stop_chase(&mut self) {
        if let Some(chase) = self.chase.take() {
            self.clear();
            self.level = chase.saved_level;
        }
    }

    /// Ramp brightness to zero one step at a time, then blank the strip and
    /// restore the remote brightness.
    pub fn fade_out<F: FnMut(Millis)>(&mut self, mut pause: F) {
        for level in (0..=self.level).rev() {
            self.level = level;
            self.show();
            pause(FADE_STEP_MS);
        }
        self.fill(color::BLACK);
        self.level = self.base_level;
        self.show();
    }

    /// Blink `c` on and off `count` times. The cooldown that follows breathes `c`.
    pub fn flash<F: FnMut(Millis)>(&mut self, c: RGB8, count: u8, interval_ms: Millis, mut pause: F) {
        self.accent = c;
        let saved = self.level;
        self.level = DEFAULT_BRIGHTNESS;
        for _ in 0..count {
            self.fill(c);
            self.show();
            pause(interval_ms);
            self.clear();
            pause(interval_ms);
        }
        self.level = saved;
    }

    /// Breathe the last reaction color between `PULSE_MIN` and `PULSE_MAX`.
    pub fn cooldown_pulse(&mut self, now: Millis) {
        if let Some(last) = self.pulse.last_step {
            if now.wrapping_sub(last) < PULSE_STEP_MS {
                return;
            }
        }
        self.pulse.last_step = Some(now);
        self.pulse.advance();

        self.fill(self.accent);
        self.level = self.pulse.level;
        self.show();
    }

    /// Blank the strip after the last pulse and restart the breath from the
    /// bottom next time.
    pub fn end_cooldown(&mut self) {
        self.pulse = Pulse::new();
        self.level = self.base_level;
        self.clear();
    }

    /// Power-on animation: rainbow sweep up, white flash, fade to black.
    pub fn startup_sequence<F: FnMut(Millis)>(&mut self, mut pause: F) {
        self.clear();
        pause(100);

        for val in (0..=120u8).step_by(10) {
            for (i, led) in self.frame.iter_mut().enumerate() {
                let hue = (i * 255 / NUM_LEDS) as u8;
                *led = hsv2rgb(Hsv { hue, sat: 255, val });
            }
            self.show();
            pause(30);
        }

        self.fill(color::WHITE);
        self.level = 60;
        self.show();
        pause(200);

        for level in (0..=60u8).rev().step_by(5) {
            self.level = level;
            self.show();
            pause(50);
        }

        self.level = self.base_level;
        self.clear();
    }
}
