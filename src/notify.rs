//! Notification routing and delivery.
//!
//! Notifiers are loaded once at startup from a JSON side-car file and are
//! immutable for the process lifetime. Routing matches each distinct frame
//! against every enabled notifier; deliveries run on their own tasks with a
//! bounded fixed-interval retry and never feed errors back into the pipeline.

use crate::bus::FrameSub;
use crate::dedup::DedupCache;
use crate::error::{GateError, Result};
use crate::frame::{Frame, BULLETIN_DEST};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Maximum delivery attempts per notification before giving up.
pub const MAX_ATTEMPTS: u32 = 10;

/// Fixed interval between delivery attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// The closed set of delivery services.
///
/// Being a serde enum, an unrecognized driver name fails configuration
/// deserialization, which aborts startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Prowl,
    Webhook,
    Nma,
}

/// One configured notification target.
#[derive(Debug, Clone, Deserialize)]
pub struct Notifier {
    pub name: String,
    pub driver: Driver,
    /// Callsign this notifier watches for.
    pub to: String,
    #[serde(default)]
    pub disabled: bool,
    /// Driver-specific settings (API keys, URLs, priorities).
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// The payload handed to a driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub event: String,
    pub msg: String,
}

/// Load the notifier side-car file. Any failure here (unreadable file, bad
/// JSON, unknown driver name) is a fatal startup condition.
pub async fn load_notifiers(path: impl AsRef<Path>) -> Result<Vec<Notifier>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| GateError::config(format!("reading {}: {}", path.display(), e)))?;
    let notifiers: Vec<Notifier> = serde_json::from_str(&raw)
        .map_err(|e| GateError::config(format!("parsing {}: {}", path.display(), e)))?;
    Ok(notifiers)
}

/// Match a frame against the configured notifiers.
///
/// Per notifier, in priority order: direct addressee, then message
/// addressee (excluding acks), then bulletin broadcast against the `BLN`
/// sentinel. First rule wins.
pub fn route<'a>(frame: &Frame, notifiers: &'a [Notifier]) -> Vec<(&'a Notifier, Notification)> {
    let event = frame.body.packet_type().name().to_string();
    let message = frame.message();

    let mut matches = Vec::new();
    for n in notifiers {
        if n.disabled {
            continue;
        }
        if frame.dest.call == n.to {
            matches.push((
                n,
                Notification {
                    event: event.clone(),
                    msg: format!("{}: {}", frame.source, frame.body),
                },
            ));
        } else if let Some(msg) = &message {
            if msg.is_ack() {
                continue;
            }
            let hit = msg.recipient.call == n.to || (msg.is_bulletin() && n.to == BULLETIN_DEST);
            if hit {
                matches.push((
                    n,
                    Notification {
                        event: event.clone(),
                        msg: format!("{}: {}", frame.source, msg.text),
                    },
                ));
            }
        }
    }
    matches
}

/// Capability interface over the delivery services. One implementation per
/// transport; tests inject their own.
#[async_trait]
pub trait NotifyDriver: Send + Sync {
    async fn deliver(&self, notifier: &Notifier, note: &Notification) -> Result<()>;
}

/// Delivery over the HTTP push services (prowl, webhook, nma).
pub struct HttpDriver {
    client: reqwest::Client,
}

impl HttpDriver {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn setting<'a>(n: &'a Notifier, key: &str) -> Result<&'a str> {
        n.config
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| GateError::driver(format!("{}: missing config key '{}'", n.name, key)))
    }
}

impl Default for HttpDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Form fields shared by the prowl and nma push APIs.
fn push_params<'a>(n: &'a Notifier, note: &'a Notification) -> Result<[(&'static str, &'a str); 5]> {
    Ok([
        ("apikey", HttpDriver::setting(n, "apikey")?),
        (
            "application",
            n.config.get("application").map_or("aprsgate", String::as_str),
        ),
        ("event", note.event.as_str()),
        ("description", note.msg.as_str()),
        (
            "priority",
            n.config.get("priority").map_or("0", String::as_str),
        ),
    ])
}

#[async_trait]
impl NotifyDriver for HttpDriver {
    async fn deliver(&self, n: &Notifier, note: &Notification) -> Result<()> {
        let response = match n.driver {
            Driver::Webhook => self
                .client
                .post(Self::setting(n, "url")?)
                .json(note)
                .send()
                .await,
            Driver::Prowl => {
                let params = push_params(n, note)?;
                self.client
                    .post("https://api.prowlapp.com/publicapi/add")
                    .form(&params)
                    .send()
                    .await
            }
            Driver::Nma => {
                let params = push_params(n, note)?;
                self.client
                    .post("https://www.notifymyandroid.com/publicapi/notify")
                    .form(&params)
                    .send()
                    .await
            }
        };

        let response = response.map_err(|e| GateError::driver(format!("{}: {}", n.name, e)))?;
        response
            .error_for_status()
            .map_err(|e| GateError::driver(format!("{}: {}", n.name, e)))?;
        Ok(())
    }
}

/// Consumer-side pipeline: dedup, route, fire-and-forget delivery.
pub struct Dispatcher {
    notifiers: Vec<Notifier>,
    driver: Arc<dyn NotifyDriver>,
    dedup: Arc<DedupCache>,
    retry_delay: Duration,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Notifier>, driver: Arc<dyn NotifyDriver>, dedup: Arc<DedupCache>) -> Self {
        Self {
            notifiers,
            driver,
            dedup,
            retry_delay: RETRY_DELAY,
        }
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Drain the bus until it closes or cancellation.
    pub async fn run(self: Arc<Self>, mut sub: FrameSub, token: CancellationToken) {
        info!("dispatcher running with {} notifier(s)", self.notifiers.len());
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                recv = sub.recv() => match recv {
                    Ok(frame) => self.handle(&frame),
                    Err(RecvError::Lagged(n)) => {
                        warn!("dispatcher lagged, {} frame(s) dropped", n);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    /// Route one frame, spawning a delivery task per match. Duplicates
    /// within the window are suppressed before routing.
    pub fn handle(self: &Arc<Self>, frame: &Frame) {
        if self.dedup.check_and_insert(frame) {
            debug!("skipping duplicate: {}", frame);
            return;
        }
        for (notifier, note) in route(frame, &self.notifiers) {
            debug!("notifying {} of {}", notifier.name, frame);
            let driver = self.driver.clone();
            let notifier = notifier.clone();
            let delay = self.retry_delay;
            tokio::spawn(async move {
                deliver_with_retry(driver, notifier, note, delay).await;
            });
        }
    }
}

/// Retry a delivery up to [`MAX_ATTEMPTS`] times with a fixed interval
/// between attempts. Exhausting the attempts logs and gives up; errors
/// never escalate past this function.
async fn deliver_with_retry(
    driver: Arc<dyn NotifyDriver>,
    notifier: Notifier,
    note: Notification,
    delay: Duration,
) {
    for attempt in 1..=MAX_ATTEMPTS {
        match driver.deliver(&notifier, &note).await {
            Ok(()) => return,
            Err(e) => {
                warn!(
                    "notification '{}' attempt {}/{} failed: {}",
                    notifier.name, attempt, MAX_ATTEMPTS, e
                );
                if attempt < MAX_ATTEMPTS {
                    sleep(delay).await;
                }
            }
        }
    }
    error!(
        "giving up on notification '{}' after {} attempts",
        notifier.name, MAX_ATTEMPTS
    );
}
