//! Serial KISS ingestion endpoint.
//!
//! Reads raw bytes from the TNC serial port, splits KISS frames, decodes
//! them as AX.25 and submits the result to the frame bus. Malformed frames
//! are skipped; stream errors end the session and the port is reopened
//! after a fixed delay, forever, until cancellation.

use crate::ax25::decode_frame;
use crate::bus::{submit, FrameBus};
use crate::config::SerialConfig;
use crate::error::{GateError, Result};
use crate::framing::KissParser;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const REOPEN_DELAY: Duration = Duration::from_secs(1);

/// Run the serial ingestion loop until cancellation.
pub async fn run(config: SerialConfig, bus: FrameBus, token: CancellationToken) -> Result<()> {
    loop {
        if token.is_cancelled() {
            break;
        }
        match open_and_read(&config, &bus, &token).await {
            Ok(()) => {
                if token.is_cancelled() {
                    break;
                }
                warn!("serial port {} closed, reopening", config.device);
            }
            Err(e) => {
                if token.is_cancelled() {
                    break;
                }
                warn!("serial port {} error: {} (reopening)", config.device, e);
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(REOPEN_DELAY) => {}
            _ = token.cancelled() => break,
        }
    }
    info!("serial endpoint {} stopped", config.device);
    Ok(())
}

async fn open_and_read(
    config: &SerialConfig,
    bus: &FrameBus,
    token: &CancellationToken,
) -> Result<()> {
    let mut port = tokio_serial::new(&config.device, config.baud)
        .open_native_async()
        .map_err(|e| GateError::serial(&config.device, e))?;

    info!("serial endpoint {} open at {} baud", config.device, config.baud);

    let mut parser = KissParser::new();
    let mut buf = [0u8; 4096];

    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            read = port.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    return Ok(()); // EOF
                }
                parser.push(&buf[..n]);
                while let Some(raw) = parser.parse_next() {
                    match decode_frame(&raw) {
                        Ok(frame) => submit(bus, frame),
                        // Malformed input, not a stream failure
                        Err(e) => debug!("dropping undecodable frame: {}", e),
                    }
                }
            }
        }
    }
}
