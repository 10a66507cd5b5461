#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! WebSocket gift feed.
//!
//! The feed runs on a dedicated worker thread and forwards every text frame
//! unparsed over a channel. Parsing belongs to the ingestion system. After a
//! disconnect or a failed connection attempt the worker waits for the
//! configured delay and connects again, until the [`GiftFeed`] is dropped.

use std::{
    io::ErrorKind,
    net::{TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, info, warn};
use tungstenite::{error::UrlError, http::Uri, HandshakeError, Message, WebSocket};

/// Address of the local gift relay.
pub const DEFAULT_FEED_URL: &str = "ws://localhost:8765";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised by the gift feed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection or WebSocket handshake failed.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// Address that refused the connection.
        url: String,
        /// Underlying failure.
        #[source]
        source: tungstenite::Error,
    },
    /// An established connection failed.
    #[error("feed connection failed: {0}")]
    Socket(#[from] tungstenite::Error),
    /// The socket could not be configured.
    #[error("failed to configure feed socket: {0}")]
    Io(#[from] std::io::Error),
    /// The worker thread could not be started.
    #[error("failed to start the feed worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Notifications delivered by the feed worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    /// A connection was established.
    Connected,
    /// Raw text payload received from the relay.
    Payload(String),
    /// An established connection ended; a reconnect is scheduled.
    Disconnected,
}

/// Connection settings of the feed worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedConfig {
    url: String,
    reconnect_delay: Duration,
    poll_interval: Duration,
    connect_timeout: Duration,
}

impl FeedConfig {
    /// Creates settings for the relay at `url`, reconnecting after `reconnect_delay`.
    #[must_use]
    pub fn new(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bounds the TCP connect and the WebSocket handshake of each attempt.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout.max(Duration::from_millis(1));
        self
    }

    /// Overrides how often the worker checks for shutdown while idle.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Address of the relay.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Delay between a disconnect and the next connection attempt.
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }
}

/// Handle to the feed worker. Dropping it stops the worker.
#[derive(Debug)]
pub struct GiftFeed {
    events: Receiver<FeedEvent>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl GiftFeed {
    /// Starts the worker thread.
    pub fn spawn(config: FeedConfig) -> Result<Self, TransportError> {
        let (sender, events) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = Arc::clone(&shutdown);

        let worker = thread::Builder::new()
            .name("gift-feed".to_owned())
            .spawn(move || run_worker(&config, &sender, &worker_shutdown))
            .map_err(TransportError::Spawn)?;

        Ok(Self {
            events,
            shutdown,
            worker: Some(worker),
        })
    }

    /// Returns every event received since the previous call without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<FeedEvent> {
        self.events.try_iter().collect()
    }

    /// Waits up to `timeout` for the next event.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FeedEvent> {
        self.events.recv_timeout(timeout).ok()
    }
}

impl Drop for GiftFeed {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("gift feed worker panicked");
            }
        }
    }
}

enum SessionEnd {
    Closed,
    Shutdown,
}

fn run_worker(config: &FeedConfig, sender: &Sender<FeedEvent>, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        match run_session(config, sender, shutdown) {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Closed) => {
                info!(url = %config.url, "gift feed closed by the relay");
                if sender.send(FeedEvent::Disconnected).is_err() {
                    break;
                }
            }
            Err(TransportError::Connect { url, source }) => {
                warn!(%url, error = %source, "gift feed unreachable");
            }
            Err(error) => {
                warn!(%error, "gift feed connection lost");
                if sender.send(FeedEvent::Disconnected).is_err() {
                    break;
                }
            }
        }

        debug!(delay_ms = config.reconnect_delay.as_millis() as u64, "scheduling reconnect");
        sleep_unless_shutdown(config.reconnect_delay, config.poll_interval, shutdown);
    }
    debug!("gift feed worker stopped");
}

fn run_session(
    config: &FeedConfig,
    sender: &Sender<FeedEvent>,
    shutdown: &AtomicBool,
) -> Result<SessionEnd, TransportError> {
    let mut socket = connect(config).map_err(|source| TransportError::Connect {
        url: config.url.clone(),
        source,
    })?;
    socket.get_mut().set_read_timeout(Some(config.poll_interval))?;

    info!(url = %config.url, "gift feed connected");
    if sender.send(FeedEvent::Connected).is_err() {
        return Ok(SessionEnd::Shutdown);
    }

    loop {
        if shutdown.load(Ordering::Relaxed) {
            close_quietly(&mut socket);
            return Ok(SessionEnd::Shutdown);
        }

        let payload = match socket.read() {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!("dropping binary frame that is not UTF-8");
                    continue;
                }
            },
            Ok(Message::Close(_)) | Err(tungstenite::Error::ConnectionClosed) => {
                return Ok(SessionEnd::Closed);
            }
            Ok(_) => continue,
            Err(tungstenite::Error::Io(error))
                if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(error) => return Err(error.into()),
        };

        if sender.send(FeedEvent::Payload(payload)).is_err() {
            close_quietly(&mut socket);
            return Ok(SessionEnd::Shutdown);
        }
    }
}

fn connect(config: &FeedConfig) -> Result<WebSocket<TcpStream>, tungstenite::Error> {
    let stream = open_stream(config)?;
    stream.set_read_timeout(Some(config.connect_timeout))?;
    stream.set_write_timeout(Some(config.connect_timeout))?;

    let (socket, _response) =
        tungstenite::client(config.url.as_str(), stream).map_err(|error| match error {
            HandshakeError::Failure(error) => error,
            HandshakeError::Interrupted(_) => tungstenite::Error::Io(ErrorKind::TimedOut.into()),
        })?;
    socket.get_ref().set_write_timeout(None)?;
    Ok(socket)
}

/// Opens the TCP stream to the relay, giving up on each address after the connect timeout.
fn open_stream(config: &FeedConfig) -> Result<TcpStream, tungstenite::Error> {
    let uri: Uri = config
        .url
        .parse()
        .map_err(|_| tungstenite::Error::Url(UrlError::NoHostName))?;
    match uri.scheme_str() {
        Some("ws") => {}
        Some("wss") => return Err(tungstenite::Error::Url(UrlError::TlsFeatureNotEnabled)),
        _ => return Err(tungstenite::Error::Url(UrlError::UnsupportedUrlScheme)),
    }
    let host = uri
        .host()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
        .filter(|host| !host.is_empty())
        .ok_or(tungstenite::Error::Url(UrlError::EmptyHostName))?;
    let port = uri.port_u16().unwrap_or(80);

    let mut last_error = None;
    for address in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&address, config.connect_timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => {
                debug!(%address, %error, "relay address unreachable");
                last_error = Some(error);
            }
        }
    }

    Err(match last_error {
        Some(error) => tungstenite::Error::Io(error),
        None => tungstenite::Error::Url(UrlError::UnableToConnect(config.url.clone())),
    })
}

fn close_quietly(socket: &mut WebSocket<TcpStream>) {
    if let Err(error) = socket.close(None) {
        debug!(%error, "failed to close gift feed socket");
    }
}

fn sleep_unless_shutdown(delay: Duration, poll_interval: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + delay;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_is_never_zero() {
        let config = FeedConfig::new(DEFAULT_FEED_URL, Duration::from_secs(3))
            .with_poll_interval(Duration::ZERO);

        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.url(), "ws://localhost:8765");
        assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
    }

    #[test]
    fn sleep_returns_early_on_shutdown() {
        let shutdown = AtomicBool::new(true);
        let started = Instant::now();

        sleep_unless_shutdown(Duration::from_secs(10), Duration::from_millis(5), &shutdown);

        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn only_plain_websocket_urls_are_dialled() {
        let secure = FeedConfig::new("wss://relay.example:443", Duration::from_secs(1));
        assert!(matches!(
            open_stream(&secure),
            Err(tungstenite::Error::Url(UrlError::TlsFeatureNotEnabled))
        ));

        let http = FeedConfig::new("http://localhost:8765", Duration::from_secs(1));
        assert!(matches!(
            open_stream(&http),
            Err(tungstenite::Error::Url(UrlError::UnsupportedUrlScheme))
        ));
    }

    #[test]
    fn stalled_connect_does_not_hold_up_shutdown() {
        let config = FeedConfig::new("ws://10.255.255.1:8765", Duration::from_millis(20))
            .with_poll_interval(Duration::from_millis(5))
            .with_connect_timeout(Duration::from_millis(100));
        let feed = GiftFeed::spawn(config).expect("worker starts");
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        drop(feed);

        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn unreachable_relay_never_reports_a_connection() {
        let config = FeedConfig::new("ws://127.0.0.1:1", Duration::from_millis(20))
            .with_poll_interval(Duration::from_millis(5));
        let feed = GiftFeed::spawn(config).expect("worker starts");

        assert_eq!(feed.recv_timeout(Duration::from_millis(200)), None);
        drop(feed);
    }
}
