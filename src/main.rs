#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]

use anyhow::Result;
use aprsgate::bus::create_bus;
use aprsgate::config::Config;
use aprsgate::dedup::DedupCache;
use aprsgate::frame::Frame;
use aprsgate::notify::{load_notifiers, Dispatcher, HttpDriver};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "aprsgate.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    info!("starting aprsgate with config: {}", args.config);

    let config = match Config::load(&args.config).await {
        Ok(c) => c,
        Err(e) => {
            error!("error loading config: {:#}", e);
            return Err(e);
        }
    };

    if config.aprsis.is_none() && config.serial.is_none() {
        info!("no ingestion sources configured, exiting");
        return Ok(());
    }

    // Unknown driver names or an unreadable configured file abort here.
    let notifiers = match &config.general.notifiers {
        Some(path) => match load_notifiers(path).await {
            Ok(n) => n,
            Err(e) => {
                error!("error loading notifiers: {}", e);
                return Err(e.into());
            }
        },
        None => Vec::new(),
    };
    info!("loaded {} notifier(s)", notifiers.len());

    let bus = create_bus(config.general.bus_capacity);
    let dedup = Arc::new(DedupCache::new(Duration::from_secs(
        config.general.dedup_window_secs,
    )));
    let cancel_token = CancellationToken::new();
    let mut handles = vec![];

    // Notification pipeline
    let dispatcher = Arc::new(Dispatcher::new(
        notifiers,
        Arc::new(HttpDriver::new()),
        dedup.clone(),
    ));
    handles.push(tokio::spawn(
        dispatcher.run(bus.subscribe(), cancel_token.child_token()),
    ));

    // Frame reporter
    {
        let mut sub = bus.subscribe();
        let token = cancel_token.child_token();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    recv = sub.recv() => match recv {
                        Ok(frame) => report(&frame),
                        Err(RecvError::Lagged(n)) => warn!("reporter lagged, {} frame(s) dropped", n),
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        }));
    }

    // Dedup cache sweeper
    {
        let dedup = dedup.clone();
        let token = cancel_token.child_token();
        let interval = Duration::from_secs(config.general.dedup_sweep_secs);
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => dedup.sweep(),
                }
            }
        }));
    }

    if let Some(serial) = config.serial.clone() {
        let bus = bus.clone();
        let token = cancel_token.child_token();
        handles.push(tokio::spawn(async move {
            if let Err(e) = aprsgate::endpoints::serial::run(serial, bus, token).await {
                error!("serial endpoint failed: {}", e);
            }
        }));
    }

    if let Some(aprsis) = config.aprsis.clone() {
        let bus = bus.clone();
        let token = cancel_token.child_token();
        handles.push(tokio::spawn(async move {
            if let Err(e) = aprsgate::endpoints::net::run(aprsis, bus, token).await {
                error!("aprsis endpoint failed: {}", e);
            }
        }));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
        _ = futures::future::join_all(handles.iter_mut()) => {
            info!("all tasks finished, shutting down");
        }
    }
    cancel_token.cancel();

    // Join whatever is still running; tasks that already finished were
    // drained by the select above and must not be polled again.
    handles.retain(|h| !h.is_finished());
    let drain = futures::future::join_all(handles);
    if tokio::time::timeout(Duration::from_secs(5), drain).await.is_err() {
        warn!("tasks did not stop within the shutdown grace period");
    }
    info!("shutdown complete");

    Ok(())
}

fn report(frame: &Frame) {
    info!(
        "{} sent a {} to {}: {}",
        frame.source,
        frame.body.packet_type(),
        frame.dest,
        frame.body
    );
}
