//! Unit tests for the detection-reaction controller.
//!
//! The reader, presentation, remote channel and clock are replaced by
//! recording stand-ins so every cycle runs instantly on synthetic time.

#![allow(dead_code)]

#[path = "../src/catalog.rs"]
mod catalog;
#[path = "../src/controller.rs"]
mod controller;
#[path = "../src/cooldown.rs"]
mod cooldown;
#[path = "../src/detection.rs"]
mod detection;
#[path = "../src/presentation.rs"]
mod presentation;
#[path = "../src/remote.rs"]
mod remote;
#[path = "../src/token.rs"]
mod token;

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use smart_leds::RGB8;

use catalog::{BandSpec, Catalog};
use controller::{Clock, Controller, Outcome, Tick};
use cooldown::Millis;
use presentation::{color, Presentation, Track};
use remote::{RemoteChannel, DEFAULT_BRIGHTNESS};
use token::{PendingRead, TokenReader};

const BAND: u64 = 0x27CB_1805;
const WAND: u64 = 0x0000_5555;
const STRANGER: u64 = 0xDEAD_BEEF;
// 34-bit style id that does not fit in 32 bits
const WIDE_BAND: u64 = 0x0104_27CB_1805_0000;

static SPECS: &[BandSpec<u64>] = &[
    BandSpec {
        token_id: BAND,
        name: "Band 1",
        color: color::BLUE,
        sounds: &[Track::HELLO],
    },
    BandSpec {
        token_id: WAND,
        name: "Wand 1",
        color: color::GOLD,
        sounds: &[Track::WIZARD_HARRY, Track::EXCELLENT, Track::ADDAMS_FAMILY],
    },
    BandSpec {
        token_id: WIDE_BAND,
        name: "Band 64",
        color: color::PURPLE,
        sounds: &[Track::STARTOURS],
    },
];

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Clone, Default)]
struct TestClock {
    now: Rc<Cell<Millis>>,
}

impl TestClock {
    fn set(&self, ms: Millis) {
        self.now.set(ms);
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }

    fn delay_ms(&mut self, ms: Millis) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

/// `reads` scripts what the detection window sees. `latched` behaves like a
/// hardware frame that finished in the background; `held` re-latches on
/// every poll, as a band left on the reader does.
struct ScriptedReader {
    present: bool,
    healthy: bool,
    reads: VecDeque<u64>,
    latched: PendingRead<u64>,
    held: Option<u64>,
    polls: u32,
    discards: u32,
}

impl ScriptedReader {
    fn new(reads: &[u64]) -> Self {
        Self {
            present: true,
            healthy: true,
            reads: reads.iter().copied().collect(),
            latched: PendingRead::new(),
            held: None,
            polls: 0,
            discards: 0,
        }
    }
}

impl TokenReader for ScriptedReader {
    type Id = u64;

    fn poll(&mut self) -> u64 {
        self.polls += 1;
        let id = if self.latched.is_some() {
            self.latched.take()
        } else {
            self.reads.pop_front().unwrap_or(0)
        };
        if let Some(held) = self.held {
            self.latched.stash(held);
        }
        id
    }

    fn is_present(&mut self) -> bool {
        self.present || self.latched.is_some()
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn discard(&mut self) {
        self.discards += 1;
        self.latched.take();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Show {
    Brightness(u8),
    Color(RGB8),
    ChaseStart,
    ChaseStep,
    ChaseStop,
    FadeOut,
    Flash(RGB8, u8),
    Pulse,
    EndCooldown,
    Play(Track),
}

struct RecordingStage {
    log: Vec<Show>,
    chase_at: Vec<Millis>,
    audio_ready: bool,
}

impl RecordingStage {
    fn played(&self) -> Vec<Track> {
        self.log
            .iter()
            .filter_map(|s| match s {
                Show::Play(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    fn count(&self, wanted: Show) -> usize {
        self.log.iter().filter(|s| **s == wanted).count()
    }
}

impl Presentation for RecordingStage {
    fn set_brightness(&mut self, level: u8) {
        self.log.push(Show::Brightness(level));
    }

    fn set_color(&mut self, color: RGB8) {
        self.log.push(Show::Color(color));
    }

    fn start_chase(&mut self, _now: Millis) {
        self.log.push(Show::ChaseStart);
    }

    fn step_chase(&mut self, now: Millis, _interval_ms: Millis) {
        self.chase_at.push(now);
        self.log.push(Show::ChaseStep);
    }

    fn stop_chase(&mut self) {
        self.log.push(Show::ChaseStop);
    }

    fn fade_out(&mut self) {
        self.log.push(Show::FadeOut);
    }

    fn flash(&mut self, color: RGB8, count: u8, _interval_ms: Millis) {
        self.log.push(Show::Flash(color, count));
    }

    fn cooldown_pulse(&mut self, _now: Millis) {
        self.log.push(Show::Pulse);
    }

    fn end_cooldown(&mut self) {
        self.log.push(Show::EndCooldown);
    }

    fn play_effect(&mut self, track: Track) {
        self.log.push(Show::Play(track));
    }

    fn is_effect_system_ready(&self) -> bool {
        self.audio_ready
    }
}

struct RemoteStub {
    enabled: bool,
    brightness: u8,
    cooldown_ms: Millis,
    activations: Vec<(u64, &'static str)>,
    time_until_ready: Option<Millis>,
}

impl Default for RemoteStub {
    fn default() -> Self {
        Self {
            enabled: true,
            brightness: DEFAULT_BRIGHTNESS,
            cooldown_ms: 5_000,
            activations: Vec::new(),
            time_until_ready: None,
        }
    }
}

impl RemoteChannel for RemoteStub {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn brightness(&self) -> u8 {
        self.brightness
    }

    fn cooldown_ms(&self) -> Millis {
        self.cooldown_ms
    }

    fn is_auto_close_enabled(&self) -> bool {
        true
    }

    fn notify_activation(&mut self, token_id: u64, name: &'static str) {
        self.activations.push((token_id, name));
    }

    fn report_time_until_ready(&mut self, remaining_ms: Millis) {
        self.time_until_ready = Some(remaining_ms);
    }
}

type TestController = Controller<ScriptedReader, RecordingStage, RemoteStub, TestClock>;

fn setup(reads: &[u64], audio_ready: bool) -> (TestController, TestClock) {
    let clock = TestClock::default();
    clock.set(1_000);
    let stage = RecordingStage {
        log: Vec::new(),
        chase_at: Vec::new(),
        audio_ready,
    };
    let controller = Controller::new(
        ScriptedReader::new(reads),
        stage,
        RemoteStub::default(),
        clock.clone(),
        Catalog::from_specs(SPECS),
    );
    (controller, clock)
}

// ============================================================================
// Tests for a recognized token
// ============================================================================

#[test]
fn test_recognized_band_plays_chime_then_band_sound() {
    let (mut c, clock) = setup(&[0, 0, BAND], true);
    let now = clock.now_ms();

    assert_eq!(c.run_iteration(now), Tick::Reacted(Outcome::Recognized { index: 0 }));

    // Detection cue, reaction chime, then the band's own sound
    assert_eq!(c.stage().played(), vec![Track::CHIME, Track::CHIME, Track::HELLO]);
    assert_eq!(c.stage().count(Show::Color(color::BLUE)), 1);
    assert_eq!(c.stage().count(Show::FadeOut), 1);
    assert_eq!(c.remote().activations, vec![(BAND, "Band 1")]);
    assert_eq!(c.catalog().get(0).unwrap().rotation_cursor(), 0);
    assert_eq!(c.cooldown().last_activation(), Some(now));
}

#[test]
fn test_second_detection_within_cooldown_shows_pulse_only() {
    let (mut c, clock) = setup(&[BAND], true);
    let now = clock.now_ms();
    c.run_iteration(now);
    let plays = c.stage().played().len();
    let polls = c.reader_mut().polls;

    c.reader_mut().reads.push_back(BAND);
    assert_eq!(c.run_iteration(now + 2_000), Tick::CoolingDown);

    assert_eq!(c.stage().played().len(), plays);
    assert_eq!(c.stage().log.last(), Some(&Show::Pulse));
    assert_eq!(c.reader_mut().polls, polls);
    assert_eq!(c.remote().activations.len(), 1);
    assert_eq!(c.remote().time_until_ready, Some(3_000));
}

#[test]
fn test_window_runs_full_length_after_early_read() {
    let (mut c, clock) = setup(&[0, 0, 0, 0, 0, BAND], false);
    let start = clock.now_ms();

    assert_eq!(c.run_iteration(start), Tick::Reacted(Outcome::Recognized { index: 0 }));

    // The read lands at 50 ms; no more polls, but the chase keeps going
    assert_eq!(c.reader_mut().polls, 6);
    assert_eq!(c.stage().count(Show::ChaseStep), 300);
    assert_eq!(c.stage().chase_at.first(), Some(&start));
    assert_eq!(c.stage().chase_at.last(), Some(&(start + 2_990)));
    assert_eq!(c.stage().chase_at.iter().filter(|&&t| t > start + 50).count(), 294);
    assert_eq!(c.stage().count(Show::ChaseStart), 1);
    assert_eq!(c.stage().count(Show::ChaseStop), 1);
    // Window, color hold, gap and linger; no sound delays without audio
    assert_eq!(clock.now_ms() - start, 3_000 + 200 + 500 + 1_000);
}

#[test]
fn test_sound_rotation_advances_per_reaction() {
    let (mut c, clock) = setup(&[], true);
    let mut band_sounds = Vec::new();

    for _ in 0..4 {
        c.reader_mut().reads.push_back(WAND);
        let before = c.stage().played().len();
        let now = clock.now_ms();
        assert_eq!(c.run_iteration(now), Tick::Reacted(Outcome::Recognized { index: 1 }));
        band_sounds.push(*c.stage().played()[before..].last().unwrap());
    }

    assert_eq!(
        band_sounds,
        vec![
            Track::WIZARD_HARRY,
            Track::EXCELLENT,
            Track::ADDAMS_FAMILY,
            Track::WIZARD_HARRY
        ]
    );
}

#[test]
fn test_wide_id_recognized_and_reported_in_full() {
    let (mut c, clock) = setup(&[WIDE_BAND], true);
    let now = clock.now_ms();

    assert_eq!(c.run_iteration(now), Tick::Reacted(Outcome::Recognized { index: 2 }));
    assert_eq!(c.stage().played(), vec![Track::CHIME, Track::CHIME, Track::STARTOURS]);
    assert_eq!(c.stage().count(Show::Color(color::PURPLE)), 1);
    assert_eq!(c.remote().activations, vec![(WIDE_BAND, "Band 64")]);
}

#[test]
fn test_wide_id_truncated_to_32_bits_is_unknown() {
    let low = WIDE_BAND & 0xFFFF_FFFF;
    let (mut c, clock) = setup(&[low], false);

    assert_eq!(
        c.run_iteration(clock.now_ms()),
        Tick::Reacted(Outcome::Unknown { token_id: low })
    );
}

#[test]
fn test_reaction_without_audio_still_lights() {
    let (mut c, clock) = setup(&[BAND], false);
    let now = clock.now_ms();

    assert_eq!(c.run_iteration(now), Tick::Reacted(Outcome::Recognized { index: 0 }));
    assert!(c.stage().played().is_empty());
    assert_eq!(c.stage().count(Show::Color(color::BLUE)), 1);
    assert_eq!(c.remote().activations.len(), 1);
}

// ============================================================================
// Tests for unknown tokens and read failures
// ============================================================================

#[test]
fn test_unknown_token_alerts_without_touching_catalog() {
    let (mut c, clock) = setup(&[STRANGER], true);
    let now = clock.now_ms();

    assert_eq!(
        c.run_iteration(now),
        Tick::Reacted(Outcome::Unknown { token_id: STRANGER })
    );
    assert_eq!(c.stage().count(Show::Flash(color::RED, 3)), 1);
    assert_eq!(c.stage().played(), vec![Track::CHIME, Track::ERROR]);
    assert!(c.catalog().iter().all(|e| e.rotation_cursor() == 0));
    assert!(c.remote().activations.is_empty());
    assert_eq!(c.cooldown().last_activation(), Some(now));
}

#[test]
fn test_unknown_token_reported_when_enabled() {
    let (c, clock) = setup(&[STRANGER], false);
    let mut c = c.with_unknown_reporting(true);
    let now = clock.now_ms();

    c.run_iteration(now);
    assert_eq!(c.remote().activations, vec![(STRANGER, "Unknown")]);
}

#[test]
fn test_read_failure_alerts_and_rearms_cooldown() {
    let (mut c, clock) = setup(&[], true);
    let now = clock.now_ms();

    assert_eq!(c.run_iteration(now), Tick::Reacted(Outcome::ReadFailure));
    // Polled on every step of the window
    assert_eq!(c.reader_mut().polls, 300);
    assert_eq!(c.stage().count(Show::Flash(color::RED, 3)), 1);
    assert_eq!(c.stage().played(), vec![Track::CHIME, Track::ERROR]);
    assert!(c.remote().activations.is_empty());
    assert_eq!(c.cooldown().last_activation(), Some(now));
    assert_eq!(c.run_iteration(now + 100), Tick::CoolingDown);
}

// ============================================================================
// Tests for reads that arrive while the gate is closed
// ============================================================================

#[test]
fn test_tap_during_cooldown_is_not_replayed() {
    let (mut c, clock) = setup(&[BAND], false);
    c.remote_mut().cooldown_ms = 20_000;
    let start = clock.now_ms();
    assert_eq!(c.run_iteration(start), Tick::Reacted(Outcome::Recognized { index: 0 }));

    // Band waved at 13 s, frame finishes in the background
    c.reader_mut().present = false;
    c.reader_mut().latched.stash(BAND);
    assert_eq!(c.run_iteration(13_000), Tick::CoolingDown);

    assert_eq!(c.run_iteration(26_000), Tick::Idle);
    assert_eq!(c.remote().activations.len(), 1);
    assert!(!c.reader_mut().latched.is_some());
}

#[test]
fn test_tap_while_disabled_is_not_replayed() {
    let (mut c, clock) = setup(&[], false);
    c.reader_mut().present = false;
    c.remote_mut().enabled = false;

    c.reader_mut().latched.stash(BAND);
    assert_eq!(c.run_iteration(clock.now_ms()), Tick::Disabled);

    c.remote_mut().enabled = true;
    assert_eq!(c.run_iteration(clock.now_ms() + 100), Tick::Idle);
    assert_eq!(c.reader_mut().polls, 0);
    assert!(c.remote().activations.is_empty());
}

#[test]
fn test_band_left_on_reader_does_not_retrigger() {
    let (mut c, clock) = setup(&[BAND], false);
    // Shorter than the reaction itself, so the next tick is past the cooldown
    c.remote_mut().cooldown_ms = 3_000;
    c.reader_mut().held = Some(BAND);
    c.run_iteration(clock.now_ms());

    c.reader_mut().present = false;
    c.reader_mut().held = None;
    assert_eq!(c.run_iteration(clock.now_ms()), Tick::Idle);
    assert_eq!(c.remote().activations.len(), 1);
}

#[test]
fn test_fresh_tap_after_cooldown_still_reacts() {
    let (mut c, clock) = setup(&[BAND], false);
    let start = clock.now_ms();
    c.run_iteration(start);
    c.reader_mut().present = false;

    c.reader_mut().latched.stash(BAND);
    assert_eq!(c.run_iteration(start + 1_000), Tick::CoolingDown);

    c.reader_mut().latched.stash(BAND);
    assert_eq!(
        c.run_iteration(start + 5_000),
        Tick::Reacted(Outcome::Recognized { index: 0 })
    );
    assert_eq!(c.remote().activations.len(), 2);
}

#[test]
fn test_unhealthy_reader_drops_latched_frames() {
    let (mut c, clock) = setup(&[], false);
    c.reader_mut().present = false;
    c.reader_mut().healthy = false;
    c.reader_mut().latched.stash(BAND);

    assert_eq!(c.run_iteration(clock.now_ms()), Tick::ReaderUnavailable);
    c.reader_mut().healthy = true;
    assert_eq!(c.run_iteration(clock.now_ms()), Tick::Idle);
}

// ============================================================================
// Tests for the cooldown pulse
// ============================================================================

#[test]
fn test_pulse_ended_once_when_cooldown_expires() {
    let (mut c, clock) = setup(&[BAND], false);
    let start = clock.now_ms();
    c.run_iteration(start);
    c.reader_mut().present = false;

    for t in (start + 100..start + 5_000).step_by(500) {
        assert_eq!(c.run_iteration(t), Tick::CoolingDown);
    }
    assert_eq!(c.stage().count(Show::EndCooldown), 0);

    for t in start + 5_000..start + 5_010 {
        assert_eq!(c.run_iteration(t), Tick::Idle);
    }
    assert_eq!(c.stage().count(Show::EndCooldown), 1);
}

#[test]
fn test_pulse_ended_when_disabled_mid_cooldown() {
    let (mut c, clock) = setup(&[BAND], false);
    let start = clock.now_ms();
    c.run_iteration(start);
    assert_eq!(c.run_iteration(start + 1_000), Tick::CoolingDown);

    c.remote_mut().enabled = false;
    assert_eq!(c.run_iteration(start + 1_500), Tick::Disabled);
    assert_eq!(c.run_iteration(start + 2_000), Tick::Disabled);
    assert_eq!(c.stage().count(Show::EndCooldown), 1);
}

// ============================================================================
// Tests for remote control
// ============================================================================

#[test]
fn test_cooldown_change_applies_to_next_cycle() {
    let (mut c, clock) = setup(&[BAND], false);
    let start = clock.now_ms();
    c.run_iteration(start);

    c.remote_mut().cooldown_ms = 10_000;
    c.reader_mut().reads.push_back(BAND);

    // Past the old 5 s default but inside the new 10 s
    assert_eq!(c.run_iteration(start + 7_000), Tick::CoolingDown);
    assert_eq!(c.remote().time_until_ready, Some(3_000));

    clock.set(start + 10_000);
    assert_eq!(
        c.run_iteration(start + 10_000),
        Tick::Reacted(Outcome::Recognized { index: 0 })
    );
}

#[test]
fn test_disable_mid_cooldown_and_reenable() {
    let (mut c, clock) = setup(&[BAND], false);
    let start = clock.now_ms();
    c.run_iteration(start);
    let pulses = c.stage().count(Show::Pulse);

    c.remote_mut().enabled = false;
    c.reader_mut().reads.push_back(BAND);
    for t in [start + 1_000, start + 2_000, start + 2_500] {
        assert_eq!(c.run_iteration(t), Tick::Disabled);
    }
    assert_eq!(c.stage().count(Show::Pulse), pulses);
    assert_eq!(c.cooldown().last_activation(), Some(start));
    assert_eq!(c.reader_mut().reads.len(), 1);

    c.remote_mut().enabled = true;
    assert_eq!(c.run_iteration(start + 3_000), Tick::CoolingDown);
    clock.set(start + 6_000);
    assert_eq!(
        c.run_iteration(start + 6_000),
        Tick::Reacted(Outcome::Recognized { index: 0 })
    );
}

#[test]
fn test_time_until_ready_reported_while_disabled() {
    let (mut c, clock) = setup(&[BAND], false);
    let start = clock.now_ms();
    c.run_iteration(start);

    c.remote_mut().enabled = false;
    c.run_iteration(start + 4_000);
    assert_eq!(c.remote().time_until_ready, Some(1_000));
}

#[test]
fn test_brightness_follows_remote() {
    let (mut c, clock) = setup(&[], false);
    c.reader_mut().present = false;
    c.remote_mut().brightness = 200;

    assert_eq!(c.run_iteration(clock.now_ms()), Tick::Idle);
    assert_eq!(c.stage().log, vec![Show::Brightness(200)]);
}

// ============================================================================
// Tests for idle paths
// ============================================================================

#[test]
fn test_no_token_is_idle() {
    let (mut c, clock) = setup(&[BAND], true);
    c.reader_mut().present = false;

    assert_eq!(c.run_iteration(clock.now_ms()), Tick::Idle);
    assert_eq!(c.reader_mut().polls, 0);
    assert!(c.stage().played().is_empty());
    assert_eq!(c.cooldown().last_activation(), None);
}

#[test]
fn test_unhealthy_reader_skips_detection() {
    let (mut c, clock) = setup(&[BAND], true);
    c.reader_mut().healthy = false;

    assert_eq!(c.run_iteration(clock.now_ms()), Tick::ReaderUnavailable);
    assert_eq!(c.reader_mut().polls, 0);
    assert_eq!(c.cooldown().last_activation(), None);
}
