//! Wiegand 26/34-bit frame decoding.

/// Decoded Wiegand credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiegandRead {
    pub facility: u32,
    pub card: u32,
    pub raw_data: u32,
}

impl WiegandRead {
    /// Card UID in reading order (the reader sends it byte-reversed).
    pub fn to_uid(&self) -> u32 {
        self.raw_data.swap_bytes()
    }

    /// Token id for the catalog.
    pub fn token_id(&self) -> u64 {
        self.to_uid() as u64
    }
}

/// Decode a completed frame of `count` bits.
pub fn decode(count: u32, bits: u64) -> Option<WiegandRead> {
    match count {
        26 => decode_26(bits),
        34 => decode_34(bits),
        _ => {
            log::warn!("wiegand: unknown format ({} bits)", count);
            None
        }
    }
}

/// 1 even parity + 8 facility + 16 card + 1 odd parity.
pub fn decode_26(raw: u64) -> Option<WiegandRead> {
    let raw = raw as u32;
    let leading = (raw >> 25) & 1;
    let trailing = raw & 1;
    let data = (raw >> 1) & 0xFF_FFFF;

    // Even parity on upper 12 bits, odd parity on lower 12 bits
    let upper = data >> 12;
    let lower = data & 0xFFF;
    let even_ok = (upper.count_ones() % 2) == leading;
    let odd_ok = (lower.count_ones() % 2) != trailing;
    if !even_ok || !odd_ok {
        log::warn!("wiegand: 26-bit parity failed");
        return None;
    }

    Some(WiegandRead {
        facility: (data >> 16) & 0xFF,
        card: data & 0xFFFF,
        raw_data: data,
    })
}

/// 1 even parity + 32 data + 1 odd parity.
pub fn decode_34(raw: u64) -> Option<WiegandRead> {
    let leading = ((raw >> 33) & 1) as u32;
    let trailing = (raw & 1) as u32;
    let data = ((raw >> 1) & 0xFFFF_FFFF) as u32;

    // Even parity on upper 16 bits, odd parity on lower 16 bits
    let upper = data >> 16;
    let lower = data & 0xFFFF;
    let even_ok = (upper.count_ones() % 2) == leading;
    let odd_ok = (lower.count_ones() % 2) != trailing;
    if !even_ok || !odd_ok {
        log::warn!("wiegand: 34-bit parity failed");
        return None;
    }

    Some(WiegandRead {
        facility: (data >> 16) & 0xFF,
        card: data & 0xFFFF,
        raw_data: data,
    })
}
