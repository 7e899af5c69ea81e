//! Static reaction tables for each token source.
//!
//! Band ids are the card UID as read (most significant byte first). Wand ids
//! are the 32-bit MagiQuest wand number.

use crate::catalog::BandSpec;
use crate::presentation::{color, Track};

#[cfg_attr(not(feature = "rfid"), allow(dead_code))]
pub static BANDS: &[BandSpec<u64>] = &[
    BandSpec {
        token_id: 0x27CB_1805,
        name: "Band 1",
        color: color::BLUE,
        sounds: &[Track::HELLO],
    },
    BandSpec {
        token_id: 0xACD1_E700,
        name: "Band 2",
        color: color::GREEN,
        sounds: &[Track::FOOLISH],
    },
    BandSpec {
        token_id: 0x3456_7890,
        name: "Band 3",
        color: color::PURPLE,
        sounds: &[Track::OPERATIONAL],
    },
    BandSpec {
        token_id: 0x4567_8901,
        name: "Band 4",
        color: color::PURPLE,
        sounds: &[Track::OPERATIONAL],
    },
    BandSpec {
        token_id: 0x5678_9012,
        name: "Band 5",
        color: color::PURPLE,
        sounds: &[Track::OPERATIONAL],
    },
];

#[cfg_attr(not(feature = "wand"), allow(dead_code))]
pub static WANDS: &[BandSpec<u32>] = &[
    BandSpec {
        token_id: 20451,
        name: "Wand 1",
        color: color::GOLD,
        sounds: &[Track::WIZARD_HARRY, Track::EXCELLENT, Track::ADDAMS_FAMILY],
    },
    BandSpec {
        token_id: 22171,
        name: "Wand 2",
        color: color::RED,
        sounds: &[Track::IMPERIAL_MARCH, Track::VADER_BREATHING],
    },
    BandSpec {
        token_id: 22752,
        name: "Wand 3",
        color: color::GREEN,
        sounds: &[Track::STARTOURS, Track::PIRATE_CLIP, Track::TAP_START],
    },
];
