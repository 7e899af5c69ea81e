//! Lights and sound, as seen by the controller.

use smart_leds::RGB8;

use crate::cooldown::Millis;

/// A track number on the DFPlayer SD card (`0001.mp3` is track 1).
///
/// Files are numbered by alphabetical order of the source assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Track(pub u16);

impl Track {
    pub const ADDAMS_FAMILY: Track = Track(1);
    pub const CHIME: Track = Track(2);
    pub const ERROR: Track = Track(3);
    pub const EXCELLENT: Track = Track(4);
    pub const FOOLISH: Track = Track(5);
    pub const HELLO: Track = Track(6);
    pub const IMPERIAL_MARCH: Track = Track(7);
    pub const OPERATIONAL: Track = Track(8);
    pub const PIRATE_CLIP: Track = Track(9);
    pub const STARTOURS: Track = Track(10);
    pub const TAP_START: Track = Track(11);
    pub const VADER_BREATHING: Track = Track(12);
    pub const WIZARD_HARRY: Track = Track(13);
}

/// Named colors used by the catalog and the alert path.
pub mod color {
    use smart_leds::RGB8;

    pub const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };
    pub const RED: RGB8 = RGB8 { r: 255, g: 0, b: 0 };
    pub const GREEN: RGB8 = RGB8 { r: 0, g: 128, b: 0 };
    pub const BLUE: RGB8 = RGB8 { r: 0, g: 0, b: 255 };
    pub const PURPLE: RGB8 = RGB8 { r: 128, g: 0, b: 128 };
    pub const GOLD: RGB8 = RGB8 { r: 255, g: 215, b: 0 };
    pub const WHITE: RGB8 = RGB8 { r: 255, g: 255, b: 255 };
    /// Chase color while a token is being read.
    pub const CHASE: RGB8 = RGB8 { r: 0, g: 150, b: 255 };
}

/// Presentation output: the LED strip plus the sound module.
///
/// Methods that take time (`fade_out`, `flash`) block until done. The chase
/// and the cooldown pulse are non-blocking and advance on `now`.
pub trait Presentation {
    /// Base brightness for everything that follows.
    fn set_brightness(&mut self, level: u8);

    fn set_color(&mut self, color: RGB8);

    fn start_chase(&mut self, now: Millis);

    /// Advance the chase if at least `interval_ms` passed since its last step.
    fn step_chase(&mut self, now: Millis, interval_ms: Millis);

    fn stop_chase(&mut self);

    fn fade_out(&mut self);

    fn flash(&mut self, color: RGB8, count: u8, interval_ms: Millis);

    /// Breathe the current color while the cooldown runs.
    fn cooldown_pulse(&mut self, now: Millis);

    /// Called once when the cooldown is over; the pulse must not stay lit.
    fn end_cooldown(&mut self);

    fn play_effect(&mut self, track: Track);

    /// False when the sound module never came up.
    fn is_effect_system_ready(&self) -> bool;
}
