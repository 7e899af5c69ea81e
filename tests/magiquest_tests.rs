//! Unit tests for MagiQuest wand frame decoding.
//!
//! Pulse trains are synthesized from the nominal mark/space timings, with
//! some jitter where noted.

#[path = "../src/magiquest.rs"]
mod magiquest;

use magiquest::{
    decode, MagiQuestFrame, FRAME_BITS, MARK_ONE_US, MARK_ZERO_US, SPACE_ONE_US, SPACE_ZERO_US,
};

/// Mark/space durations for a 56-bit frame. The final space is dropped, as
/// the receiver sees the line go idle after the last mark.
fn pulses(wand_id: u32, magnitude: u16) -> Vec<u32> {
    let bits = ((wand_id as u64) << 16) | magnitude as u64;
    let mut out = Vec::new();
    for i in (0..FRAME_BITS).rev() {
        if (bits >> i) & 1 == 1 {
            out.push(MARK_ONE_US);
            out.push(SPACE_ONE_US);
        } else {
            out.push(MARK_ZERO_US);
            out.push(SPACE_ZERO_US);
        }
    }
    out.pop();
    out
}

// ============================================================================
// Tests for decode
// ============================================================================

#[test]
fn test_decode_wand_id_and_magnitude() {
    let frame = decode(&pulses(20451, 0x0123)).unwrap();
    assert_eq!(
        frame,
        MagiQuestFrame {
            wand_id: 20451,
            magnitude: 0x0123
        }
    );
}

#[test]
fn test_decode_full_width_id() {
    let frame = decode(&pulses(0xDEAD_BEEF, 0xFFFF)).unwrap();
    assert_eq!(frame.wand_id, 0xDEAD_BEEF);
    assert_eq!(frame.magnitude, 0xFFFF);
}

#[test]
fn test_decode_trailing_one_bit() {
    let frame = decode(&pulses(22171, 0x0001)).unwrap();
    assert_eq!(frame.magnitude & 1, 1);
    let frame = decode(&pulses(22171, 0x0002)).unwrap();
    assert_eq!(frame.magnitude & 1, 0);
}

#[test]
fn test_decode_tolerates_jitter() {
    let jittered: Vec<u32> = pulses(22752, 0x00AA)
        .iter()
        .enumerate()
        .map(|(i, &d)| if i % 3 == 0 { d + 40 } else { d - 30 })
        .collect();
    assert_eq!(decode(&jittered).unwrap().wand_id, 22752);
}

#[test]
fn test_decode_rejects_trailing_extra_bits() {
    // 0x0123 ends on a one; close that bit and run two more zeros after it
    let mut train = pulses(20451, 0x0123);
    train.extend_from_slice(&[SPACE_ONE_US, MARK_ZERO_US, SPACE_ZERO_US, MARK_ZERO_US]);
    assert_eq!(decode(&train), Err("unexpected frame length"));
}

#[test]
fn test_decode_short_train() {
    let mut train = pulses(20451, 0);
    train.truncate(60);
    assert_eq!(decode(&train), Err("frame too short"));
    assert_eq!(decode(&[]), Err("frame too short"));
}

#[test]
fn test_decode_rejects_bad_period() {
    let mut train = pulses(20451, 0);
    train[11] = 3_000;
    assert_eq!(decode(&train), Err("bit period out of tolerance"));
}

#[test]
fn test_decode_rejects_zero_mark() {
    let mut train = pulses(20451, 0);
    train[4] = 0;
    assert_eq!(decode(&train), Err("zero-length mark"));
}
