//! APRS-IS relay client.
//!
//! Session protocol: connect, send one login line
//! (`user CALL pass PASS vers <client-id> [filter F]`), then stream
//! newline-delimited records. Lines starting with `#` are server chatter and
//! go to the info handler; everything else parses as a textual [`Frame`].
//!
//! The client is generic over its transport halves so tests can drive it
//! with an in-memory duplex stream.

use crate::error::{GateError, Result};
use crate::frame::Frame;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Client identifier sent in the login line.
const CLIENT_ID: &str = concat!("aprsgate ", env!("CARGO_PKG_VERSION"));

/// Recurring server banner prefix, logged once per session.
const BANNER_PREFIX: &str = "# aprsc";

/// Sink for server informational (`#`) lines.
pub type InfoHandler = Box<dyn Fn(&str) + Send>;

/// One APRS-IS session over a pair of stream halves.
pub struct IsClient<R, W> {
    reader: BufReader<R>,
    writer: W,
    idle_timeout: Duration,
    raw_log: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    info: InfoHandler,
    // One-shot per session, reset by reconnecting
    banner_logged: bool,
    // Traffic line observed while waiting for logresp
    pending: Option<String>,
}

impl IsClient<OwnedReadHalf, OwnedWriteHalf> {
    /// Open a TCP session to the relay server.
    pub async fn dial(addr: &str, idle_timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read, write) = stream.into_split();
        Ok(Self::new(read, write, idle_timeout))
    }
}

impl<R, W> IsClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(read: R, write: W, idle_timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(read),
            writer: write,
            idle_timeout,
            raw_log: None,
            info: Box::new(|line| info!("aprsis: {}", line)),
            banner_logged: false,
            pending: None,
        }
    }

    /// Tee every raw line read from the server to this writer, independent
    /// of parse success.
    pub fn set_raw_log(&mut self, writer: Box<dyn AsyncWrite + Send + Unpin>) {
        self.raw_log = Some(writer);
    }

    /// Replace the sink for server informational lines.
    pub fn set_info_handler(&mut self, handler: InfoHandler) {
        self.info = handler;
    }

    /// Send the login line and wait for the server's verdict.
    ///
    /// Informational lines received before the `# logresp` verdict are routed
    /// to the info handler. A verdict of `unverified` while a real passcode
    /// was supplied is an authentication failure; a receive-only login
    /// (passcode `-1`) accepts it.
    pub async fn auth(&mut self, call: &str, pass: &str, filter: Option<&str>) -> Result<()> {
        let login = login_line(call, pass, filter);
        debug!("sending login: {}", login.trim_end());
        self.writer.write_all(login.as_bytes()).await?;
        self.writer.flush().await?;

        let deadline = Instant::now() + self.idle_timeout;
        loop {
            let line = self.read_line(deadline).await?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("# logresp") {
                if rest.contains("unverified") && pass != "-1" {
                    return Err(GateError::Auth(trimmed.to_string()));
                }
                return Ok(());
            }
            if trimmed.starts_with('#') {
                self.handle_info(trimmed);
                continue;
            }
            // Server started streaming without a verdict; keep the line for
            // the first next() call.
            self.pending = Some(trimmed.to_string());
            return Ok(());
        }
    }

    /// Read the next traffic frame.
    ///
    /// Comment lines are routed to the info handler and unparseable traffic
    /// is skipped with a log entry; only stream-level failures (I/O, EOF,
    /// idle watchdog expiry) surface as errors and end the session.
    ///
    /// The idle watchdog spans the whole call: server chatter (`#`
    /// keepalives) and skipped lines do not extend the deadline. Only
    /// returning a frame arms a fresh one on the following call.
    pub async fn next(&mut self) -> Result<Frame> {
        let deadline = Instant::now() + self.idle_timeout;
        loop {
            let line = match self.pending.take() {
                Some(line) => line,
                None => self.read_line(deadline).await?,
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('#') {
                self.handle_info(trimmed);
                continue;
            }
            match Frame::parse(trimmed) {
                Ok(frame) => return Ok(frame),
                Err(e) => {
                    warn!("skipping unparseable line: {} ({})", trimmed, e);
                }
            }
        }
    }

    /// One raw line, bounded by the caller's watchdog deadline. The deadline
    /// passing ends the session the same way a force-closed connection
    /// would: the read returns an error.
    async fn read_line(&mut self, deadline: Instant) -> Result<String> {
        let mut buf = Vec::new();
        let n = match timeout_at(deadline, self.reader.read_until(b'\n', &mut buf)).await {
            Ok(res) => res?,
            Err(_) => {
                return Err(GateError::Stream(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "idle watchdog expired",
                )));
            }
        };
        if n == 0 {
            return Err(GateError::Stream(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed connection",
            )));
        }
        if let Some(log) = self.raw_log.as_mut() {
            if let Err(e) = log.write_all(&buf).await {
                warn!("raw log write failed: {}", e);
            }
        }
        // Lines are supposed to be ASCII; tolerate anything else
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn handle_info(&mut self, line: &str) {
        if line.starts_with(BANNER_PREFIX) {
            if !self.banner_logged {
                (self.info)(line);
                self.banner_logged = true;
            }
            return;
        }
        (self.info)(line);
    }
}

fn login_line(call: &str, pass: &str, filter: Option<&str>) -> String {
    let mut line = format!("user {} pass {} vers {}", call, pass, CLIENT_ID);
    if let Some(f) = filter {
        line.push_str(" filter ");
        line.push_str(f);
    }
    line.push_str("\r\n");
    line
}
