//! DFPlayer Mini serial protocol.
//!
//! Every message is a fixed 10-byte frame:
//!
//!   `7E FF 06 CMD ACK PH PL CKH CKL EF`
//!
//! where the checksum is the two's complement of the sum of bytes 1..=6.

pub const FRAME_LEN: usize = 10;
pub const MAX_VOLUME: u8 = 30;
pub const DEFAULT_VOLUME: u8 = 24;

const START: u8 = 0x7E;
const VERSION: u8 = 0xFF;
const LENGTH: u8 = 0x06;
const END: u8 = 0xEF;

/// Commands sent to the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    PlayTrack = 0x03,
    Volume = 0x06,
    Equalizer = 0x07,
    OutputDevice = 0x09,
    Reset = 0x0C,
}

/// Output device parameter for the SD card.
pub const DEVICE_SD: u16 = 0x0002;

/// Messages the module sends back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    CardInserted,
    CardRemoved,
    PlayFinished(u16),
    Online(u16),
    Error(u16),
    Ack,
    Status(u16),
    Other { command: u8, param: u16 },
}

fn checksum(body: &[u8]) -> u16 {
    let sum = body.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
    0u16.wrapping_sub(sum)
}

/// Build a command frame. `ack` asks the module to confirm with `Reply::Ack`.
pub fn frame(command: Command, param: u16, ack: bool) -> [u8; FRAME_LEN] {
    let [ph, pl] = param.to_be_bytes();
    let mut out = [START, VERSION, LENGTH, command as u8, ack as u8, ph, pl, 0, 0, END];
    let [ch, cl] = checksum(&out[1..7]).to_be_bytes();
    out[7] = ch;
    out[8] = cl;
    out
}

pub fn play_track(track: u16) -> [u8; FRAME_LEN] {
    frame(Command::PlayTrack, track, false)
}

/// Volume frame, clamped to the module's 0-30 range.
pub fn volume(level: u8) -> [u8; FRAME_LEN] {
    frame(Command::Volume, level.min(MAX_VOLUME) as u16, false)
}

/// Parse one reply frame.
pub fn parse_reply(data: &[u8]) -> Result<Reply, &'static str> {
    if data.len() < FRAME_LEN {
        return Err("short frame");
    }
    let data = &data[..FRAME_LEN];
    if data[0] != START || data[9] != END {
        return Err("bad framing");
    }
    if data[1] != VERSION || data[2] != LENGTH {
        return Err("bad header");
    }
    let expected = u16::from_be_bytes([data[7], data[8]]);
    if checksum(&data[1..7]) != expected {
        return Err("checksum mismatch");
    }

    let command = data[3];
    let param = u16::from_be_bytes([data[5], data[6]]);
    Ok(match command {
        0x3A => Reply::CardInserted,
        0x3B => Reply::CardRemoved,
        0x3D => Reply::PlayFinished(param),
        0x3F => Reply::Online(param),
        0x40 => Reply::Error(param),
        0x41 => Reply::Ack,
        0x42 => Reply::Status(param),
        _ => Reply::Other { command, param },
    })
}

/// Offset of the next start byte, for resynchronising a byte stream.
pub fn find_start(data: &[u8]) -> Option<usize> {
    data.iter().position(|&b| b == START)
}
