#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]

//! APRS gateway: bridges AX.25/KISS packet-radio traffic and the APRS-IS
//! network relay into one fan-out stream consumed by loggers and notifiers.

pub mod aprsis;
pub mod ax25;
pub mod bus;
pub mod config;
pub mod dedup;
pub mod endpoints {
    pub mod net;
    pub mod serial;
}
pub mod error;
pub mod frame;
pub mod framing;
pub mod notify;
