//! APRS-IS ingestion endpoint.
//!
//! Owns the reconnect loop around [`IsClient`]: dial, authenticate, stream
//! frames into the bus; on any session error wait the configured backoff
//! and start over. Runs until cancellation; credential preconditions were
//! already checked at startup.

use crate::aprsis::IsClient;
use crate::bus::{submit, FrameBus};
use crate::config::AprsIsConfig;
use crate::error::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run the APRS-IS ingestion loop until cancellation.
pub async fn run(config: AprsIsConfig, bus: FrameBus, token: CancellationToken) -> Result<()> {
    let backoff = Duration::from_secs(config.backoff_secs);
    loop {
        if token.is_cancelled() {
            break;
        }
        tokio::select! {
            _ = token.cancelled() => break,
            res = session(&config, &bus) => {
                // session() only returns on error
                if let Err(e) = res {
                    warn!("aprsis session ended: {} (reconnecting)", e);
                }
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = token.cancelled() => break,
        }
    }
    info!("aprsis endpoint stopped");
    Ok(())
}

/// One dial/auth/stream cycle. Never returns Ok: streaming continues until
/// a stream, watchdog or auth failure surfaces.
async fn session(config: &AprsIsConfig, bus: &FrameBus) -> Result<()> {
    info!("connecting to {}", config.server);
    let mut client = IsClient::dial(
        &config.server,
        Duration::from_secs(config.watchdog_secs),
    )
    .await?;

    if let Some(path) = &config.rawlog {
        let file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        client.set_raw_log(Box::new(file));
    }

    client
        .auth(&config.callsign, &config.passcode, config.filter.as_deref())
        .await?;
    info!("logged in to {} as {}", config.server, config.callsign);

    loop {
        let frame = client.next().await?;
        submit(bus, frame);
    }
}
