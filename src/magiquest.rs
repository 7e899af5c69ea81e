//! MagiQuest wand IR frame decoding.
//!
//! A frame is 56 bits sent MSB first. Every bit is one mark followed by one
//! space with a fixed 1150 us period: a short mark (280 us) and long space
//! encode 0, an even split (580/600 us) encodes 1. The last 16 bits carry the
//! swing magnitude and the 32 bits before them the wand id.

pub const PERIOD_US: u32 = 1_150;
pub const MARK_ZERO_US: u32 = 280;
pub const SPACE_ZERO_US: u32 = 850;
pub const MARK_ONE_US: u32 = 580;
pub const SPACE_ONE_US: u32 = 600;
pub const FRAME_BITS: usize = 56;

const TOLERANCE_PERCENT: u32 = 25;

/// A decoded wand cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagiQuestFrame {
    pub wand_id: u32,
    pub magnitude: u16,
}

impl MagiQuestFrame {
    fn from_bits(bits: u64) -> Self {
        Self {
            magnitude: (bits & 0xFFFF) as u16,
            wand_id: ((bits >> 16) & 0xFFFF_FFFF) as u32,
        }
    }
}

/// True when `measured` is within the tolerance of `expected`.
fn matches(measured: u32, expected: u32) -> bool {
    let low = expected * (100 - TOLERANCE_PERCENT) / 100;
    let high = expected * (100 + TOLERANCE_PERCENT) / 100;
    (low..=high).contains(&measured)
}

/// Decode alternating mark/space durations in microseconds, starting with a
/// mark. The trailing mark has no space after it (the line goes idle), so its
/// bit is judged from the mark length alone.
pub fn decode(durations: &[u32]) -> Result<MagiQuestFrame, &'static str> {
    if durations.len() < 2 * FRAME_BITS - 1 {
        return Err("frame too short");
    }

    let mut bits: u64 = 0;
    let mut count = 0usize;

    for pair in durations.chunks(2) {
        let mark = pair[0];
        if mark == 0 {
            return Err("zero-length mark");
        }

        let bit = match pair.get(1) {
            Some(&space) => {
                if !matches(mark + space, PERIOD_US) {
                    return Err("bit period out of tolerance");
                }
                // 25/75 split is a zero, 50/50 is a one
                space / mark <= 1
            }
            None => mark >= (MARK_ZERO_US + MARK_ONE_US) / 2,
        };

        bits = (bits << 1) | bit as u64;
        count += 1;
    }

    if count != FRAME_BITS {
        return Err("unexpected frame length");
    }

    Ok(MagiQuestFrame::from_bits(bits))
}
