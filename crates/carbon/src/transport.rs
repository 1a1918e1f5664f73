//! Carbon Transport - plaintext lines to a Carbon daemon
//!
//! Sends batches of Carbon lines over TCP or UDP, optionally wrapped in one
//! LZ4 frame per buffer.
//!
//! # Connection lifecycle
//!
//! One connection is shared by every send on a transport. It is dialed
//! lazily, reused until `reconnect_interval` has elapsed since it was opened,
//! and dropped on any socket error so the next send redials.
//!
//! # Send pipeline
//!
//! Each buffer goes through two stages joined by a bounded channel:
//!
//! ```text
//! buffer -> [producer: spawn_blocking, optional LZ4] -> mpsc<Bytes> -> [consumer: socket writes]
//! ```
//!
//! The producer owns the channel sender and drops it on every exit path, so
//! the consumer always sees the end of the stream. If the consumer fails it
//! drops the receiver and the producer's next write fails with a broken pipe.
//!
//! On UDP each buffer becomes exactly one datagram, compressed or not.
//!
//! # Example
//!
//! ```ignore
//! let transport = CarbonTransport::new(TransportConfig::new("carbon:2003"));
//! let buffers = transport.prepare(&lines);
//! let sent = transport.send(&buffers, &CancellationToken::new()).await?;
//! ```

use std::io::{self, ErrorKind, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use cinder_config::{CompressType, GraphiteWriteConfig, Lz4Preferences};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket, lookup_host};
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

pub use cinder_config::CarbonTransport as TransportKind;

use crate::error::{Result, TransportError};
use crate::frame::{FrameCompressor, FrameError};

/// Largest UDP payload built by [`CarbonTransport::prepare`]
///
/// With LZ4 the limit applies to the plaintext. Each buffer becomes its own
/// frame, so a datagram can be a few bytes larger than this when the lines
/// do not compress.
pub const UDP_MAX_BYTES: usize = 1024;

/// Chunks in flight between producer and consumer
const PIPE_CAPACITY: usize = 16;

/// Stream chunk size handed from producer to consumer
const PIPE_CHUNK_BYTES: usize = 32 * 1024;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Carbon address (host:port)
    pub address: String,

    /// Stream or datagram socket
    pub kind: TransportKind,

    /// How long one connection is reused before it is redialed
    pub reconnect_interval: Duration,

    /// Connection timeout
    pub dial_timeout: Duration,

    /// Timeout for each socket write
    pub write_timeout: Duration,

    /// TCP keep-alive enabled
    pub tcp_keepalive: bool,

    /// TCP keep-alive interval (only used if tcp_keepalive is true)
    pub tcp_keepalive_interval: Duration,

    /// Compression applied to each buffer
    pub compress: CompressType,

    /// LZ4 frame preferences
    pub lz4: Lz4Preferences,
}

impl TransportConfig {
    /// Create a TCP config for `address` with defaults
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            kind: TransportKind::Tcp,
            reconnect_interval: Duration::from_secs(60 * 60),
            dial_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            tcp_keepalive: true,
            tcp_keepalive_interval: Duration::from_secs(15),
            compress: CompressType::Plain,
            lz4: Lz4Preferences::default(),
        }
    }

    /// Build from backend write settings
    ///
    /// `timeout` bounds both dialing and each socket write.
    pub fn from_config(write: &GraphiteWriteConfig, timeout: Duration) -> Self {
        Self::new(write.carbon_address.clone())
            .with_kind(write.carbon_transport)
            .with_reconnect_interval(write.carbon_reconnect_interval)
            .with_dial_timeout(timeout)
            .with_write_timeout(timeout)
            .with_tcp_keepalive(write.tcp_keepalive)
            .with_compression(write.compress_type, write.lz4_preferences)
    }

    /// Set transport kind
    #[must_use]
    pub fn with_kind(mut self, kind: TransportKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set reconnect interval
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set connection timeout
    #[must_use]
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set write timeout
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Enable or disable TCP keep-alive
    #[must_use]
    pub fn with_tcp_keepalive(mut self, enabled: bool) -> Self {
        self.tcp_keepalive = enabled;
        self
    }

    /// Set compression
    #[must_use]
    pub fn with_compression(mut self, compress: CompressType, lz4: Lz4Preferences) -> Self {
        self.compress = compress;
        self.lz4 = lz4;
        self
    }
}

/// Metrics for a transport
#[derive(Debug, Default)]
pub struct TransportMetrics {
    /// Buffers fully written to the socket
    pub buffers_sent: AtomicU64,

    /// Buffers that failed
    pub buffers_failed: AtomicU64,

    /// Bytes written to the socket, after compression
    pub bytes_sent: AtomicU64,

    /// Connections dialed
    pub reconnects: AtomicU64,
}

impl TransportMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            buffers_sent: AtomicU64::new(0),
            buffers_failed: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    /// Record a successfully sent buffer
    #[inline]
    pub fn record_sent(&self, byte_count: u64) {
        self.buffers_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a failed buffer
    #[inline]
    pub fn record_failed(&self) {
        self.buffers_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a new connection
    #[inline]
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of metrics
    pub fn snapshot(&self) -> TransportMetricsSnapshot {
        TransportMetricsSnapshot {
            buffers_sent: self.buffers_sent.load(Ordering::Relaxed),
            buffers_failed: self.buffers_failed.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of transport metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportMetricsSnapshot {
    pub buffers_sent: u64,
    pub buffers_failed: u64,
    pub bytes_sent: u64,
    pub reconnects: u64,
}

/// An open socket to Carbon
#[derive(Debug)]
enum Connection {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Connection {
    fn is_datagram(&self) -> bool {
        matches!(self, Self::Udp(_))
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Tcp(stream) => stream.peer_addr(),
            Self::Udp(socket) => socket.peer_addr(),
        }
    }

    /// Write one chunk, returning how many bytes reached the socket
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write_all(chunk).await.map(|()| chunk.len()),
            Self::Udp(socket) => socket.send(chunk).await,
        }
    }

    async fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush().await,
            Self::Udp(_) => Ok(()),
        }
    }
}

#[derive(Debug)]
enum ConnectionState {
    Disconnected,
    Connected { conn: Connection, since: Instant },
}

/// Carbon transport
///
/// Safe to share between tasks; sends are serialized on the connection lock.
pub struct CarbonTransport {
    config: TransportConfig,
    state: Mutex<ConnectionState>,
    metrics: TransportMetrics,
}

impl CarbonTransport {
    /// Create a transport; nothing is dialed until the first send
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            metrics: TransportMetrics::new(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Get reference to metrics
    pub fn metrics(&self) -> &TransportMetrics {
        &self.metrics
    }

    /// Group lines into send buffers
    ///
    /// TCP gets a single buffer. UDP lines are packed greedily so that no
    /// buffer exceeds [`UDP_MAX_BYTES`] unless one line alone does. Line order
    /// is preserved.
    pub fn prepare<S: AsRef<str>>(&self, lines: &[S]) -> Vec<Bytes> {
        prepare(self.config.kind, lines)
    }

    /// Send buffers in order over the shared connection
    ///
    /// Returns the number of bytes written to the socket. The first failure
    /// aborts the remaining buffers; buffers already sent stay sent.
    ///
    /// # Errors
    ///
    /// `Cancelled` if `cancel` fired before the call, `Dial` if no connection
    /// could be opened, and a socket or frame error from the pipeline.
    pub async fn send(&self, buffers: &[Bytes], cancel: &CancellationToken) -> Result<usize> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let mut state = self.state.lock().await;
        let mut total = 0;

        for buffer in buffers {
            let (mut conn, since) = self.acquire(&mut state).await?;

            match self.stream(&mut conn, buffer.clone()).await {
                Ok(written) => {
                    self.metrics.record_sent(written as u64);
                    total += written;
                    *state = ConnectionState::Connected { conn, since };
                }
                Err(e) => {
                    self.metrics.record_failed();
                    tracing::debug!(
                        address = %self.config.address,
                        transport = self.config.kind.as_str(),
                        error = %e,
                        "dropping carbon connection"
                    );
                    return Err(e);
                }
            }
        }

        Ok(total)
    }

    /// Close the connection, if any
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let ConnectionState::Connected { conn, .. } =
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
            && let Connection::Tcp(mut stream) = conn
        {
            let _ = stream.shutdown().await;
        }
    }

    /// Remote address of the current connection, or `"unknown"`
    pub async fn target(&self) -> String {
        match &*self.state.lock().await {
            ConnectionState::Connected { conn, .. } => conn
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            ConnectionState::Disconnected => "unknown".to_string(),
        }
    }

    /// Take the connection out of `state`, redialing if it is missing or stale
    ///
    /// `state` is left `Disconnected`; the caller puts the connection back
    /// once it has been used successfully.
    async fn acquire(&self, state: &mut ConnectionState) -> Result<(Connection, Instant)> {
        match std::mem::replace(state, ConnectionState::Disconnected) {
            ConnectionState::Connected { conn, since }
                if since.elapsed() < self.config.reconnect_interval =>
            {
                Ok((conn, since))
            }
            stale => {
                if matches!(stale, ConnectionState::Connected { .. }) {
                    tracing::debug!(
                        address = %self.config.address,
                        "reconnect interval elapsed, redialing carbon"
                    );
                }
                drop(stale);

                let conn = self.dial().await?;
                self.metrics.record_reconnect();
                Ok((conn, Instant::now()))
            }
        }
    }

    /// Open a new connection
    async fn dial(&self) -> Result<Connection> {
        let address = &self.config.address;

        let conn = match self.config.kind {
            TransportKind::Tcp => {
                let stream = timeout(self.config.dial_timeout, TcpStream::connect(address))
                    .await
                    .map_err(|_| dial_timed_out(address))?
                    .map_err(|e| TransportError::dial(address, e))?;
                self.configure_stream(&stream);
                Connection::Tcp(stream)
            }
            TransportKind::Udp => {
                let socket = timeout(self.config.dial_timeout, dial_udp(address))
                    .await
                    .map_err(|_| dial_timed_out(address))?
                    .map_err(|e| TransportError::dial(address, e))?;
                Connection::Udp(socket)
            }
        };

        tracing::debug!(
            address = %address,
            transport = self.config.kind.as_str(),
            "connected to carbon"
        );
        Ok(conn)
    }

    /// Apply socket options to a fresh TCP stream
    fn configure_stream(&self, stream: &TcpStream) {
        // Set TCP_NODELAY for lower latency (non-fatal if it fails)
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(
                address = %self.config.address,
                error = %e,
                "failed to set TCP_NODELAY, continuing with default buffering"
            );
        }

        if !self.config.tcp_keepalive {
            return;
        }

        let sock_ref = SockRef::from(stream);
        let keepalive = TcpKeepalive::new().with_time(self.config.tcp_keepalive_interval);

        // On Linux, also set the interval between probes
        #[cfg(target_os = "linux")]
        let keepalive = keepalive.with_interval(self.config.tcp_keepalive_interval);

        if let Err(e) = sock_ref.set_tcp_keepalive(&keepalive) {
            tracing::debug!(
                address = %self.config.address,
                error = %e,
                "failed to set TCP keep-alive, continuing without keep-alive"
            );
        }
    }

    /// Run one buffer through the producer/consumer pipeline
    async fn stream(&self, conn: &mut Connection, buffer: Bytes) -> Result<usize> {
        let (tx, rx) = mpsc::channel(PIPE_CAPACITY);
        let writer = ChannelWriter::new(tx, conn.is_datagram());
        let compress = self.config.compress;
        let prefs = self.config.lz4;

        let producer =
            tokio::task::spawn_blocking(move || produce(&buffer, compress, &prefs, writer));
        let consumed = consume(conn, rx, self.config.write_timeout).await;
        let produced = producer.await;

        // A consumer failure surfaces in the producer as a closed channel,
        // so the socket error is the one to report
        let written = consumed?;
        match produced {
            Ok(Ok(())) => Ok(written),
            Ok(Err(e)) => Err(TransportError::Frame(e)),
            Err(e) => Err(TransportError::Task(e.to_string())),
        }
    }
}

/// Group lines into send buffers for a transport kind
pub fn prepare<S: AsRef<str>>(kind: TransportKind, lines: &[S]) -> Vec<Bytes> {
    match kind {
        TransportKind::Tcp => {
            if lines.is_empty() {
                return Vec::new();
            }
            let size = lines.iter().map(|l| l.as_ref().len()).sum();
            let mut buf = BytesMut::with_capacity(size);
            for line in lines {
                buf.extend_from_slice(line.as_ref().as_bytes());
            }
            vec![buf.freeze()]
        }
        TransportKind::Udp => {
            let mut buffers = Vec::new();
            let mut current = BytesMut::with_capacity(UDP_MAX_BYTES);
            for line in lines {
                let line = line.as_ref().as_bytes();
                if !current.is_empty() && current.len() + line.len() > UDP_MAX_BYTES {
                    buffers.push(current.split().freeze());
                }
                current.extend_from_slice(line);
            }
            if !current.is_empty() {
                buffers.push(current.freeze());
            }
            buffers
        }
    }
}

fn dial_timed_out(address: &str) -> TransportError {
    TransportError::dial(
        address,
        io::Error::new(ErrorKind::TimedOut, "connection timed out"),
    )
}

async fn dial_udp(address: &str) -> io::Result<UdpSocket> {
    let peer = lookup_host(address)
        .await?
        .next()
        .ok_or_else(|| io::Error::new(ErrorKind::AddrNotAvailable, "no address resolved"))?;

    let local: SocketAddr = if peer.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(local).await?;
    socket.connect(peer).await?;
    Ok(socket)
}

/// Producer stage: write the buffer, compressed if configured
fn produce(
    buffer: &[u8],
    compress: CompressType,
    prefs: &Lz4Preferences,
    mut writer: ChannelWriter,
) -> std::result::Result<(), FrameError> {
    match compress {
        CompressType::Plain => writer.write_all(buffer)?,
        CompressType::Lz4 => {
            let mut compressor = FrameCompressor::new(writer, prefs);
            compressor.write_all(buffer)?;
            writer = compressor.finish()?;
        }
    }
    writer.finish()?;
    Ok(())
}

/// Consumer stage: copy chunks to the socket until the producer is done
async fn consume(
    conn: &mut Connection,
    mut rx: mpsc::Receiver<Bytes>,
    write_timeout: Duration,
) -> Result<usize> {
    let mut written = 0;

    while let Some(chunk) = rx.recv().await {
        let sent = timeout(write_timeout, conn.write_chunk(&chunk))
            .await
            .map_err(|_| TransportError::timed_out())?
            .map_err(TransportError::from_socket)?;

        if sent < chunk.len() {
            return Err(TransportError::ShortWrite {
                written: sent,
                expected: chunk.len(),
            });
        }
        written += sent;
    }

    timeout(write_timeout, conn.flush())
        .await
        .map_err(|_| TransportError::timed_out())?
        .map_err(TransportError::from_socket)?;

    Ok(written)
}

/// `std::io::Write` adapter feeding the pipeline channel
///
/// Stream connections get fixed-size chunks. Datagram connections get one
/// chunk per buffer, sent by [`ChannelWriter::finish`].
struct ChannelWriter {
    tx: mpsc::Sender<Bytes>,
    pending: BytesMut,
    datagram: bool,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<Bytes>, datagram: bool) -> Self {
        Self {
            tx,
            pending: BytesMut::new(),
            datagram,
        }
    }

    fn send_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = self.pending.split().freeze();
        self.tx
            .blocking_send(chunk)
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "carbon writer closed"))
    }

    /// Send whatever is left and close the channel
    fn finish(mut self) -> io::Result<()> {
        self.send_pending()
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        if !self.datagram && self.pending.len() >= PIPE_CHUNK_BYTES {
            self.send_pending()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.datagram {
            return Ok(());
        }
        self.send_pending()
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
