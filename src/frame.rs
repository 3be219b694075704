//! Transport-independent APRS frame model.
//!
//! A [`Frame`] is the unit passed through the gateway regardless of whether
//! it arrived over the serial KISS link or the APRS-IS network stream. The
//! textual form `SRC>DEST,PATH1,PATH2:BODY` is the canonical representation
//! used by APRS-IS and must round-trip through [`Frame::parse`] /
//! [`Frame::to_string`].

use crate::error::{GateError, Result};
use bytes::Bytes;
use std::fmt;

/// Destination sentinel for bulletin-style broadcast messages.
pub const BULLETIN_DEST: &str = "BLN";

/// A single AX.25 station address: callsign plus 4-bit SSID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Address {
    /// Callsign, at most 6 meaningful characters, upper-case by convention.
    pub call: String,
    /// Secondary station identifier, 0..=15.
    pub ssid: u8,
}

impl Address {
    pub fn new(call: impl Into<String>, ssid: u8) -> Self {
        Self {
            call: call.into().trim().to_string(),
            ssid,
        }
    }

    /// Parse the textual `CALL` or `CALL-SSID` form.
    ///
    /// An SSID suffix that does not parse as a small integer falls back to 0
    /// rather than failing, matching relay-stream reality where path entries
    /// carry decorations like a trailing `*` (digipeated marker, dropped
    /// here) or non-numeric suffixes.
    pub fn parse(s: &str) -> Address {
        let s = s.trim();
        match s.split_once('-') {
            Some((call, ssid)) => Address {
                call: call.to_string(),
                ssid: ssid.trim_end_matches('*').parse().unwrap_or(0),
            },
            None => Address {
                call: s.trim_end_matches('*').to_string(),
                ssid: 0,
            },
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.call)
        } else {
            write!(f, "{}-{}", self.call, self.ssid)
        }
    }
}

/// First-byte type discriminator of an APRS information field.
///
/// Only the classification needed for routing decisions is modeled here;
/// decoding the payload sub-fields (coordinates, symbols, telemetry values)
/// is out of scope for the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Position,
    Message,
    Status,
    Object,
    Item,
    Telemetry,
    Weather,
    ThirdParty,
    Query,
    Capabilities,
    MicE,
    Unknown(u8),
    Empty,
}

impl PacketType {
    pub fn from_byte(b: u8) -> PacketType {
        match b {
            b'!' | b'=' | b'/' | b'@' => PacketType::Position,
            b':' => PacketType::Message,
            b'>' => PacketType::Status,
            b';' => PacketType::Object,
            b')' => PacketType::Item,
            b'T' => PacketType::Telemetry,
            b'_' => PacketType::Weather,
            b'}' => PacketType::ThirdParty,
            b'?' => PacketType::Query,
            b'<' => PacketType::Capabilities,
            b'`' | b'\'' => PacketType::MicE,
            other => PacketType::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PacketType::Position => "position",
            PacketType::Message => "message",
            PacketType::Status => "status",
            PacketType::Object => "object",
            PacketType::Item => "item",
            PacketType::Telemetry => "telemetry",
            PacketType::Weather => "weather",
            PacketType::ThirdParty => "third-party",
            PacketType::Query => "query",
            PacketType::Capabilities => "capabilities",
            PacketType::MicE => "mic-e",
            PacketType::Unknown(_) => "unknown",
            PacketType::Empty => "empty",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque packet payload (the AX.25 information field).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Info(pub Bytes);

impl Info {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Type discriminator taken from the first payload byte.
    pub fn packet_type(&self) -> PacketType {
        match self.0.first() {
            Some(&b) => PacketType::from_byte(b),
            None => PacketType::Empty,
        }
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for Info {
    fn from(s: &str) -> Self {
        Info(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Vec<u8>> for Info {
    fn from(v: Vec<u8>) -> Self {
        Info(Bytes::from(v))
    }
}

/// A station-to-station APRS message extracted from a `:` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AprsMessage {
    /// Addressee callsign from the 9-character fixed-width field.
    pub recipient: Address,
    /// Message text, including any trailing `{NN` message number.
    pub text: String,
}

impl AprsMessage {
    /// Acknowledgements are not interesting to a human recipient.
    pub fn is_ack(&self) -> bool {
        self.text.starts_with("ack")
    }

    /// Bulletins are messages addressed to the `BLN*` group.
    pub fn is_bulletin(&self) -> bool {
        self.recipient.call.starts_with(BULLETIN_DEST)
    }
}

/// A station-to-station packet: who sent it, where it is headed, through
/// which digipeaters, and its opaque body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub source: Address,
    pub dest: Address,
    /// Digipeater path in traversal order (first entry = first hop), 0-8 entries.
    pub path: Vec<Address>,
    pub body: Info,
}

impl Frame {
    /// Parse the canonical `SRC>DEST[,PATH1,PATH2,...]:BODY` textual form.
    pub fn parse(line: &str) -> Result<Frame> {
        let (header, body) = line
            .split_once(':')
            .ok_or_else(|| GateError::Parse(line.to_string()))?;
        let (source, route) = header
            .split_once('>')
            .ok_or_else(|| GateError::Parse(line.to_string()))?;
        if source.is_empty() || route.is_empty() {
            return Err(GateError::Parse(line.to_string()));
        }

        let mut hops = route.split(',');
        // split on a non-empty string always yields at least one item
        let dest = hops.next().unwrap_or_default();

        Ok(Frame {
            source: Address::parse(source),
            dest: Address::parse(dest),
            path: hops.map(Address::parse).collect(),
            body: Info::from(body),
        })
    }

    /// For third-party (`}`) bodies, the re-parsed embedded frame.
    pub fn third_party_inner(&self) -> Option<Frame> {
        if self.body.packet_type() != PacketType::ThirdParty {
            return None;
        }
        let inner = String::from_utf8_lossy(&self.body.as_bytes()[1..]);
        Frame::parse(&inner).ok()
    }

    /// Extract the addressee and text of a message body, if this is one.
    ///
    /// Message format: `:ADDRESSEE:text` with a 9-character space-padded
    /// addressee field.
    pub fn message(&self) -> Option<AprsMessage> {
        let b = self.body.as_bytes();
        if b.len() < 11 || b[0] != b':' || b[10] != b':' {
            return None;
        }
        let addressee = String::from_utf8_lossy(&b[1..10]);
        Some(AprsMessage {
            recipient: Address::parse(addressee.trim()),
            text: String::from_utf8_lossy(&b[11..]).into_owned(),
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.source, self.dest)?;
        for hop in &self.path {
            write!(f, ",{}", hop)?;
        }
        write!(f, ":{}", self.body)
    }
}
