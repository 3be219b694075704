//! AX.25 UI frame codec.
//!
//! Addresses on the wire are ASCII shifted left by one bit, with the low bit
//! of each octet reserved for control flags. The 7th octet of each address
//! carries the SSID in its low nibble (after the shift) plus the
//! command/response mask bits; bit 0 marks the end of the repeater path.
//!
//! Frames handled here are the KISS-framed layout: a leading data octet to
//! skip, destination and source addresses, zero or more path addresses,
//! `control 0x03` / `PID 0xF0`, the body verbatim, and a trailing delimiter
//! octet. [`decode_frame`] strips the framing octets; the encoders emit them
//! so encode and decode mirror each other exactly.

use crate::error::{GateError, Result};
use crate::frame::{Address, Frame, Info};
use bytes::{BufMut, Bytes, BytesMut};

/// Minimum structural size: destination plus source address.
pub const MIN_FRAME: usize = 14;

/// SSID mask for the command role (destination of a digipeated command).
const SET_SSID_MASK: u8 = 0x70 << 1;
/// SSID mask for the response/clear role.
const CLEAR_SSID_MASK: u8 = 0x30 << 1;

const CONTROL_UI: u8 = 0x03;
const PID_NONE: u8 = 0xF0;

/// KISS data-frame command octet, leading every frame on the stream.
const KISS_DATA: u8 = 0x00;
/// KISS frame delimiter.
const KISS_FEND: u8 = 0xC0;

fn decode_address(raw: &[u8]) -> Address {
    debug_assert_eq!(raw.len(), 7);
    let call: String = raw[..6]
        .iter()
        .map(|&b| (b >> 1) as char)
        .collect::<String>()
        .trim()
        .to_string();
    Address {
        call,
        ssid: (raw[6] >> 1) & 0x0F,
    }
}

fn encode_address(a: &Address, ssid_mask: u8, out: &mut BytesMut) {
    let mut call = [b' '; 6];
    for (slot, b) in call.iter_mut().zip(a.call.bytes()) {
        *slot = b;
    }
    for b in call {
        out.put_u8(b << 1);
    }
    out.put_u8(ssid_mask | ((a.ssid & 0x0F) << 1));
}

/// Decode one delimiter-terminated AX.25 UI frame.
///
/// # Errors
///
/// [`GateError::ShortFrame`] when the input cannot hold two addresses plus
/// the leading and trailing framing octets; [`GateError::TruncatedFrame`]
/// when the control/PID pair after the path is missing or wrong. Both are
/// skip-and-continue conditions for the stream reader, never session-fatal.
pub fn decode_frame(raw: &[u8]) -> Result<Frame> {
    // Two framing octets surround the addresses, so the smallest input that
    // reaches the address slices is MIN_FRAME + 2 bytes.
    if raw.len() < MIN_FRAME + 2 {
        return Err(GateError::ShortFrame);
    }

    // Drop the trailing delimiter; skip the leading KISS command octet.
    let frame = &raw[..raw.len() - 1];
    let dest = decode_address(&frame[1..8]);
    let source = decode_address(&frame[8..15]);

    let mut rest = &frame[15..];
    let mut path = Vec::new();
    while rest.len() > 7 && rest[0] != CONTROL_UI {
        path.push(decode_address(&rest[..7]));
        rest = &rest[7..];
    }

    if rest.len() < 2 || rest[0] != CONTROL_UI || rest[1] != PID_NONE {
        return Err(GateError::TruncatedFrame);
    }

    Ok(Frame {
        source,
        dest,
        path,
        body: Info(Bytes::copy_from_slice(&rest[2..])),
    })
}

fn encode(frame: &Frame, source_mask: u8, dest_mask: u8) -> Bytes {
    let mut out = BytesMut::with_capacity(18 + 7 * frame.path.len() + frame.body.as_bytes().len());
    out.put_u8(KISS_DATA);
    encode_address(&frame.dest, dest_mask, &mut out);

    // The end-of-path bit rides on the last path entry, or on the source
    // address when there is no path at all.
    let mut smask = source_mask;
    if frame.path.is_empty() {
        smask |= 1;
    }
    encode_address(&frame.source, smask, &mut out);

    for (i, hop) in frame.path.iter().enumerate() {
        let mut mask = CLEAR_SSID_MASK;
        if i == frame.path.len() - 1 {
            mask |= 1;
        }
        encode_address(hop, mask, &mut out);
    }

    out.put_u8(CONTROL_UI);
    out.put_u8(PID_NONE);
    out.put_slice(frame.body.as_bytes());
    out.put_u8(KISS_FEND);
    out.freeze()
}

/// Encode an outbound command frame (source carries the command-indicator mask).
pub fn encode_command(frame: &Frame) -> Bytes {
    encode(frame, SET_SSID_MASK, CLEAR_SSID_MASK)
}

/// Encode an outbound response frame (mask roles swapped).
pub fn encode_response(frame: &Frame) -> Bytes {
    encode(frame, CLEAR_SSID_MASK, SET_SSID_MASK)
}
