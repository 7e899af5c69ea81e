//! Minimal MQTT 3.1.1 client codec.
//!
//! Only what a QoS 0 client needs: CONNECT (with last will), PUBLISH,
//! SUBSCRIBE and PINGREQ out; CONNACK, PUBLISH, SUBACK and
//! PINGRESP in. Encoders write into a caller buffer and return the number of
//! bytes used. The decoder works on a receive buffer that may hold a partial
//! packet and reports `Ok(None)` until the whole packet has arrived.

pub const KEEPALIVE_SECS: u16 = 60;

/// Largest value the remaining-length varint can carry.
pub const MAX_REMAINING_LEN: usize = 268_435_455;

const CONNECT: u8 = 0x10;
const CONNACK: u8 = 2;
const PUBLISH: u8 = 0x30;
const PUBLISH_TYPE: u8 = 3;
const SUBSCRIBE: u8 = 0x82;
const SUBACK: u8 = 9;
const PINGREQ: u8 = 0xC0;
const PINGRESP: u8 = 13;

// CONNECT flags
const CLEAN_SESSION: u8 = 0x02;
const WILL_FLAG: u8 = 0x04;
const WILL_RETAIN: u8 = 0x20;
const PASSWORD_FLAG: u8 = 0x40;
const USERNAME_FLAG: u8 = 0x80;

/// Message the broker publishes for us if the connection drops.
#[derive(Debug, Clone, Copy)]
pub struct Will<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub retain: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Connect<'a> {
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub will: Option<Will<'a>>,
    pub keep_alive_secs: u16,
}

/// A packet received from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    ConnAck { session_present: bool, code: u8 },
    Publish { topic: &'a str, payload: &'a [u8], retain: bool },
    SubAck { packet_id: u16, granted: u8 },
    PingResp,
    /// Any other packet type; skipped by the caller.
    Other(u8),
}

/// Human-readable CONNACK return code.
pub fn connack_reason(code: u8) -> &'static str {
    match code {
        0 => "accepted",
        1 => "unacceptable protocol version",
        2 => "identifier rejected",
        3 => "server unavailable",
        4 => "bad user name or password",
        5 => "not authorized",
        _ => "unknown return code",
    }
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self, b: u8) -> Result<(), &'static str> {
        let slot = self.buf.get_mut(self.pos).ok_or("buffer too small")?;
        *slot = b;
        self.pos += 1;
        Ok(())
    }

    fn u16(&mut self, v: u16) -> Result<(), &'static str> {
        self.bytes(&v.to_be_bytes())
    }

    fn bytes(&mut self, data: &[u8]) -> Result<(), &'static str> {
        let end = self.pos + data.len();
        if end > self.buf.len() {
            return Err("buffer too small");
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    /// Length-prefixed string or binary field.
    fn field(&mut self, data: &[u8]) -> Result<(), &'static str> {
        if data.len() > u16::MAX as usize {
            return Err("field too long");
        }
        self.u16(data.len() as u16)?;
        self.bytes(data)
    }

    fn header(&mut self, first: u8, remaining: usize) -> Result<(), &'static str> {
        self.u8(first)?;
        let mut encoded = [0u8; 4];
        let n = encode_remaining_length(remaining, &mut encoded)?;
        self.bytes(&encoded[..n])
    }
}

/// Encode the remaining-length varint. Returns the number of bytes written.
pub fn encode_remaining_length(mut len: usize, out: &mut [u8; 4]) -> Result<usize, &'static str> {
    if len > MAX_REMAINING_LEN {
        return Err("packet too large");
    }
    let mut i = 0;
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out[i] = byte;
        i += 1;
        if len == 0 {
            return Ok(i);
        }
    }
}

/// Decode the remaining-length varint at the start of `data`.
///
/// `Ok(None)` means more bytes are needed.
pub fn decode_remaining_length(data: &[u8]) -> Result<Option<(usize, usize)>, &'static str> {
    let mut value = 0usize;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i == 4 {
            return Err("malformed remaining length");
        }
        value |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        shift += 7;
    }
    if data.len() >= 4 {
        return Err("malformed remaining length");
    }
    Ok(None)
}

fn field_len(s: &[u8]) -> usize {
    2 + s.len()
}

pub fn encode_connect(buf: &mut [u8], c: &Connect<'_>) -> Result<usize, &'static str> {
    let mut flags = CLEAN_SESSION;
    // Protocol name, level, flags, keepalive
    let mut remaining = 10 + field_len(c.client_id.as_bytes());

    if let Some(will) = &c.will {
        flags |= WILL_FLAG;
        if will.retain {
            flags |= WILL_RETAIN;
        }
        remaining += field_len(will.topic.as_bytes()) + field_len(will.payload);
    }
    if let Some(user) = c.username {
        flags |= USERNAME_FLAG;
        remaining += field_len(user.as_bytes());
    }
    if let Some(pass) = c.password {
        // A password without a user name is a protocol violation
        if c.username.is_none() {
            return Err("password without user name");
        }
        flags |= PASSWORD_FLAG;
        remaining += field_len(pass.as_bytes());
    }

    let mut w = Writer::new(buf);
    w.header(CONNECT, remaining)?;
    w.field(b"MQTT")?;
    w.u8(4)?;
    w.u8(flags)?;
    w.u16(c.keep_alive_secs)?;
    w.field(c.client_id.as_bytes())?;
    if let Some(will) = &c.will {
        w.field(will.topic.as_bytes())?;
        w.field(will.payload)?;
    }
    if let Some(user) = c.username {
        w.field(user.as_bytes())?;
    }
    if let Some(pass) = c.password {
        w.field(pass.as_bytes())?;
    }
    Ok(w.pos)
}

/// QoS 0 publish.
pub fn encode_publish(
    buf: &mut [u8],
    topic: &str,
    payload: &[u8],
    retain: bool,
) -> Result<usize, &'static str> {
    let remaining = field_len(topic.as_bytes()) + payload.len();
    let mut w = Writer::new(buf);
    w.header(PUBLISH | retain as u8, remaining)?;
    w.field(topic.as_bytes())?;
    w.bytes(payload)?;
    Ok(w.pos)
}

/// Subscribe to `topics` at QoS 0.
pub fn encode_subscribe(buf: &mut [u8], packet_id: u16, topics: &[&str]) -> Result<usize, &'static str> {
    if topics.is_empty() {
        return Err("no topics");
    }
    let remaining = 2 + topics.iter().map(|t| field_len(t.as_bytes()) + 1).sum::<usize>();
    let mut w = Writer::new(buf);
    w.header(SUBSCRIBE, remaining)?;
    w.u16(packet_id)?;
    for topic in topics {
        w.field(topic.as_bytes())?;
        w.u8(0)?;
    }
    Ok(w.pos)
}

pub fn encode_pingreq(buf: &mut [u8]) -> Result<usize, &'static str> {
    let mut w = Writer::new(buf);
    w.header(PINGREQ, 0)?;
    Ok(w.pos)
}

fn read_u16(data: &[u8], at: usize) -> Result<u16, &'static str> {
    match data.get(at..at + 2) {
        Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
        None => Err("truncated packet"),
    }
}

/// Decode one packet from the front of `data`.
///
/// Returns the packet and the number of bytes it occupied, or `Ok(None)` if
/// `data` does not yet hold a whole packet.
pub fn decode(data: &[u8]) -> Result<Option<(Packet<'_>, usize)>, &'static str> {
    let Some(&first) = data.first() else {
        return Ok(None);
    };
    let Some((remaining, len_bytes)) = decode_remaining_length(&data[1..])? else {
        return Ok(None);
    };
    let header_len = 1 + len_bytes;
    let total = header_len + remaining;
    if data.len() < total {
        return Ok(None);
    }
    let body = &data[header_len..total];

    let packet = match first >> 4 {
        CONNACK => {
            if body.len() != 2 {
                return Err("bad CONNACK length");
            }
            Packet::ConnAck {
                session_present: body[0] & 0x01 != 0,
                code: body[1],
            }
        }
        PUBLISH_TYPE => {
            let qos = (first >> 1) & 0x03;
            let topic_len = read_u16(body, 0)? as usize;
            let topic_end = 2 + topic_len;
            let topic = body.get(2..topic_end).ok_or("truncated packet")?;
            let topic = core::str::from_utf8(topic).map_err(|_| "topic is not UTF-8")?;
            // QoS 1/2 carry a packet id we never acknowledge; skip it
            let payload_start = if qos > 0 { topic_end + 2 } else { topic_end };
            let payload = body.get(payload_start..).ok_or("truncated packet")?;
            Packet::Publish {
                topic,
                payload,
                retain: first & 0x01 != 0,
            }
        }
        SUBACK => Packet::SubAck {
            packet_id: read_u16(body, 0)?,
            granted: *body.get(2).ok_or("truncated packet")?,
        },
        PINGRESP => Packet::PingResp,
        other => Packet::Other(other),
    };

    Ok(Some((packet, total)))
}
