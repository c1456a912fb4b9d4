//! Synchronous TCP client with deadline-bounded connect and receive.
//!
//! [`TcpClient`] owns exactly one OS socket. `connect` performs a
//! non-blocking connect and waits for writability under the configured
//! timeout, then restores blocking mode; `send` is a retrying
//! partial-write loop; `receive` polls for readability under the timeout
//! and issues a single bounded read. A receive timeout is routine control
//! flow (`Ok(None)`), not an error.
//!
//! One client drives one socket from one logical thread at a time; callers
//! must not overlap operations on a single instance. The timeout is the
//! only cancellation mechanism.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::AsFd;
use std::thread;
use std::time::Duration;

use rustix::io::Errno;
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::ClientError;
use crate::escape;
use crate::readiness::{self, Readiness};
use crate::trace::{debug, trace};

/// Default maximum number of bytes read by a single [`TcpClient::receive`].
pub const DEFAULT_RECEIVE_MAX: usize = 4096;

/// Sleep between retries when a send hits a transient would-block condition.
const SEND_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Bytes stripped from both ends of a received message by default.
const TRIM_BYTES: &[u8] = b" \t\n\r\0\x0b";

/// Per-call options for [`TcpClient::receive_with`].
#[derive(Debug, Clone, Copy)]
pub struct ReceiveOptions {
    /// Maximum number of bytes read in one call.
    pub max_len: usize,
    /// Strip surrounding whitespace/control bytes from the result.
    pub trim: bool,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_RECEIVE_MAX,
            trim: true,
        }
    }
}

impl ReceiveOptions {
    /// Options returning raw bytes, untrimmed.
    #[must_use]
    pub fn raw() -> Self {
        Self {
            trim: false,
            ..Self::default()
        }
    }

    /// Replaces the per-call read limit.
    #[must_use]
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }
}

/// A synchronous TCP client for a single host:port target.
///
/// Host, port, and timeout are fixed at construction. The timeout bounds
/// the connect handshake and each receive, with millisecond granularity;
/// send has no overall deadline (the OS send buffer rarely blocks
/// indefinitely on a healthy connection).
///
/// The client exclusively owns its socket. Dropping the client releases
/// the OS resource deterministically, whether or not [`close`] was called.
///
/// [`close`]: TcpClient::close
///
/// # Examples
///
/// ```no_run
/// use simpletcp::TcpClient;
/// use std::time::Duration;
///
/// let mut client = TcpClient::new("127.0.0.1", 4242, Duration::from_millis(2000));
/// client.connect()?;
/// client.send("ping\n")?;
/// if let Some(reply) = client.receive()? {
///     println!("{}", String::from_utf8_lossy(&reply));
/// }
/// client.close();
/// # Ok::<(), simpletcp::ClientError>(())
/// ```
#[derive(Debug)]
pub struct TcpClient {
    host: String,
    port: u16,
    timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpClient {
    /// Creates a client for `host:port` with the given operation timeout.
    ///
    /// `host` may be an IPv4/IPv6 literal or a hostname; the address
    /// family follows whatever the platform resolver yields.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            stream: None,
        }
    }

    /// Returns the target host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the target port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the configured operation timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns whether a live connection is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns the local address of the connection.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::NotConnected`] if no connection is held.
    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        let stream = self.stream.as_ref().ok_or(ClientError::NotConnected)?;
        stream.local_addr().map_err(|e| ClientError::receive_failed(&e))
    }

    /// Returns the peer address of the connection.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::NotConnected`] if no connection is held.
    pub fn peer_addr(&self) -> Result<SocketAddr, ClientError> {
        let stream = self.stream.as_ref().ok_or(ClientError::NotConnected)?;
        stream.peer_addr().map_err(|e| ClientError::receive_failed(&e))
    }

    /// Establishes the connection, bounded by the configured timeout.
    ///
    /// Issues a non-blocking connect, waits for the socket to become
    /// writable under the timeout, then restores blocking mode. Calling
    /// this on an already-connected client drops the old handle and
    /// creates a new one.
    ///
    /// # Errors
    ///
    /// - [`ClientError::SocketCreation`] if the OS cannot allocate a socket.
    /// - [`ClientError::ConnectionFailed`] on resolver failure, a definite
    ///   connect failure, or an exceptional condition during the handshake.
    /// - [`ClientError::ConnectionTimeout`] if the timeout elapses first.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        // Re-connect simply replaces the handle.
        self.stream = None;

        let addr = self.resolve()?;
        trace!(host = %self.host, port = self.port, addr = %addr, "resolved target");

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ClientError::socket_creation(&self.host, self.port, &e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ClientError::connection_failed(&self.host, self.port, &e))?;

        match socket.connect(&addr.into()) {
            Ok(()) => {}
            Err(e) if connect_pending(&e) => self.await_connected(&socket)?,
            Err(e) => return Err(ClientError::connection_failed(&self.host, self.port, &e)),
        }

        socket
            .set_nonblocking(false)
            .map_err(|e| ClientError::connection_failed(&self.host, self.port, &e))?;

        let stream = TcpStream::from(socket);
        // Latency over batching; these are small request/response messages.
        stream
            .set_nodelay(true)
            .map_err(|e| ClientError::connection_failed(&self.host, self.port, &e))?;

        debug!(host = %self.host, port = self.port, "connected");
        self.stream = Some(stream);
        Ok(())
    }

    /// Sends a message, retrying partial writes until every byte is out.
    ///
    /// Literal `\r`/`\n` escape pairs in the message are rewritten to real
    /// control bytes first (see [`crate::escape`]). Transient would-block
    /// conditions are retried after a short sleep and never surface as
    /// errors. There is no overall deadline on send.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if [`connect`](Self::connect) has
    ///   not succeeded; no OS call is made.
    /// - [`ClientError::SendFailed`] on a non-transient write error.
    pub fn send(&mut self, message: impl AsRef<[u8]>) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        let payload = escape::normalize(message.as_ref());

        let mut offset = 0;
        while offset < payload.len() {
            match stream.write(&payload[offset..]) {
                Ok(0) => {
                    let closed = io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while sending",
                    );
                    return Err(ClientError::send_failed(&closed));
                }
                Ok(n) => {
                    trace!(bytes = n, remaining = payload.len() - offset - n, "wrote chunk");
                    offset += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(SEND_RETRY_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(ClientError::send_failed(&e)),
            }
        }

        debug!(bytes = payload.len(), "sent");
        Ok(())
    }

    /// Receives up to [`DEFAULT_RECEIVE_MAX`] bytes, trimmed, bounded by
    /// the configured timeout.
    ///
    /// Returns `Ok(None)` when the timeout elapses with no data or the
    /// peer has closed gracefully; both are routine outcomes, not errors.
    ///
    /// # Errors
    ///
    /// See [`receive_with`](Self::receive_with).
    pub fn receive(&mut self) -> Result<Option<Vec<u8>>, ClientError> {
        self.receive_with(ReceiveOptions::default())
    }

    /// Receives with explicit per-call options.
    ///
    /// Polls for readability bounded by the configured timeout, then
    /// issues a single read of at most `options.max_len` bytes.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if [`connect`](Self::connect) has
    ///   not succeeded; no OS call is made.
    /// - [`ClientError::ReceiveFailed`] if the poll or the read fails.
    pub fn receive_with(&mut self, options: ReceiveOptions) -> Result<Option<Vec<u8>>, ClientError> {
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;

        match readiness::wait_readable(stream.as_fd(), timeout)
            .map_err(|e| ClientError::receive_failed(&e))?
        {
            Readiness::TimedOut => {
                trace!(timeout_ms = timeout.as_millis() as u64, "no data before deadline");
                return Ok(None);
            }
            Readiness::Ready | Readiness::Exceptional => {}
        }

        let mut buf = vec![0u8; options.max_len];
        let n = loop {
            match stream.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                // Spurious readiness; treat like an empty poll window.
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(ClientError::receive_failed(&e)),
            }
        };

        if n == 0 {
            debug!("peer closed gracefully");
            return Ok(None);
        }
        buf.truncate(n);
        debug!(bytes = n, "received");

        if options.trim {
            Ok(Some(trim_message(&buf).to_vec()))
        } else {
            Ok(Some(buf))
        }
    }

    /// Releases the OS socket if one is held.
    ///
    /// Safe to call repeatedly and before [`connect`](Self::connect);
    /// never fails. Also runs implicitly on drop.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(host = %self.host, port = self.port, "closed");
        }
    }

    /// Resolves the target, preferring the first address the platform
    /// resolver yields. An IPv6 literal host selects the IPv6 family here.
    fn resolve(&self) -> Result<SocketAddr, ClientError> {
        let mut addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ClientError::connection_failed(&self.host, self.port, &e))?;
        addrs.next().ok_or_else(|| {
            let empty = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
            ClientError::connection_failed(&self.host, self.port, &empty)
        })
    }

    /// Waits for a pending non-blocking connect to complete.
    ///
    /// On writability, `SO_ERROR` distinguishes an established connection
    /// from an asynchronously reported failure. The socket is dropped
    /// (closed) on every error path.
    fn await_connected(&self, socket: &Socket) -> Result<(), ClientError> {
        let outcome = readiness::wait_writable(socket.as_fd(), self.timeout)
            .map_err(|e| ClientError::connection_failed(&self.host, self.port, &e))?;

        match outcome {
            Readiness::TimedOut => Err(ClientError::connection_timeout(&self.host, self.port)),
            Readiness::Ready | Readiness::Exceptional => {
                let pending = socket
                    .take_error()
                    .map_err(|e| ClientError::connection_failed(&self.host, self.port, &e))?;
                match (pending, outcome) {
                    (Some(e), _) => {
                        Err(ClientError::connection_failed(&self.host, self.port, &e))
                    }
                    (None, Readiness::Exceptional) => {
                        let e = io::Error::other("socket reported an exceptional condition");
                        Err(ClientError::connection_failed(&self.host, self.port, &e))
                    }
                    (None, _) => Ok(()),
                }
            }
        }
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Returns whether a connect error means "in progress, poll for completion".
fn connect_pending(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    err.raw_os_error()
        .map(Errno::from_raw_os_error)
        .is_some_and(|e| e == Errno::INPROGRESS || e == Errno::ALREADY || e == Errno::AGAIN)
}

fn trim_message(buf: &[u8]) -> &[u8] {
    let start = buf
        .iter()
        .position(|b| !TRIM_BYTES.contains(b))
        .unwrap_or(buf.len());
    let end = buf
        .iter()
        .rposition(|b| !TRIM_BYTES.contains(b))
        .map_or(start, |i| i + 1);
    &buf[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Instant;

    /// Echoes bytes back on each accepted connection, one at a time,
    /// until the listener is torn down with the test process.
    fn spawn_echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut buf = [0u8; 4096];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });
        addr
    }

    /// Accepts one connection, reads until the peer closes, and reports
    /// everything it observed on the wire.
    fn spawn_capture_server() -> (SocketAddr, mpsc::Receiver<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut captured = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => captured.extend_from_slice(&buf[..n]),
                }
            }
            let _ = tx.send(captured);
        });
        (addr, rx)
    }

    /// Accepts one connection and then stays silent until it is dropped.
    fn spawn_silent_server() -> (SocketAddr, mpsc::Receiver<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            // Hold the connection open until the test finishes.
            thread::sleep(Duration::from_secs(5));
            let _ = tx.send(());
        });
        (addr, rx)
    }

    fn client_for(addr: SocketAddr, timeout: Duration) -> TcpClient {
        TcpClient::new(addr.ip().to_string(), addr.port(), timeout)
    }

    #[test]
    fn connect_then_close_is_idempotent() {
        let addr = spawn_echo_server();
        let mut client = client_for(addr, Duration::from_millis(2000));

        client.connect().unwrap();
        assert!(client.is_connected());
        assert!(client.peer_addr().is_ok());

        client.close();
        assert!(!client.is_connected());
        client.close();
        assert!(!client.is_connected());
    }

    #[test]
    fn close_before_connect_is_a_no_op() {
        let mut client = TcpClient::new("localhost", 8080, Duration::from_millis(100));
        client.close();
        assert!(!client.is_connected());
    }

    #[test]
    fn echo_round_trip_preserves_bytes() {
        let addr = spawn_echo_server();
        let mut client = client_for(addr, Duration::from_millis(2000));

        client.connect().unwrap();
        client.send("Hello TCP Echo Server\n").unwrap();

        let reply = client.receive().unwrap();
        assert_eq!(reply.as_deref(), Some(b"Hello TCP Echo Server".as_ref()));
    }

    #[test]
    fn raw_receive_skips_trimming() {
        let addr = spawn_echo_server();
        let mut client = client_for(addr, Duration::from_millis(2000));

        client.connect().unwrap();
        client.send("padded \n").unwrap();

        let reply = client.receive_with(ReceiveOptions::raw()).unwrap();
        assert_eq!(reply.as_deref(), Some(b"padded \n".as_ref()));
    }

    #[test]
    fn literal_escapes_reach_peer_as_control_bytes() {
        let (addr, captured) = spawn_capture_server();
        let mut client = client_for(addr, Duration::from_millis(2000));

        client.connect().unwrap();
        client.send(r"EHLO test.local\r\n").unwrap();
        client.close();

        let observed = captured.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(observed, b"EHLO test.local\r\n");
    }

    #[test]
    fn receive_timeout_returns_none_within_budget() {
        let (addr, _hold) = spawn_silent_server();
        let mut client = client_for(addr, Duration::from_millis(300));
        client.connect().unwrap();

        let start = Instant::now();
        let reply = client.receive().unwrap();
        let elapsed = start.elapsed();

        assert!(reply.is_none());
        assert!(elapsed >= Duration::from_millis(280), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(900), "overran budget: {elapsed:?}");
    }

    #[test]
    fn sub_second_timeout_is_not_truncated_to_whole_seconds() {
        let (addr, _hold) = spawn_silent_server();
        let mut client = client_for(addr, Duration::from_millis(500));
        client.connect().unwrap();

        let start = Instant::now();
        let reply = client.receive().unwrap();
        let elapsed = start.elapsed();

        assert!(reply.is_none());
        // Truncation to whole seconds would return at ~0ms or ~1000ms.
        assert!(elapsed >= Duration::from_millis(450), "truncated down: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(950), "truncated up: {elapsed:?}");
    }

    #[test]
    fn graceful_peer_close_reads_as_no_data() {
        let (addr, captured) = spawn_capture_server();
        let mut client = client_for(addr, Duration::from_millis(2000));

        client.connect().unwrap();
        client.send("only message").unwrap();
        // Half-close from our side so the capture server finishes and
        // closes its end; the next receive observes EOF.
        client
            .stream
            .as_ref()
            .unwrap()
            .shutdown(std::net::Shutdown::Write)
            .unwrap();
        let _ = captured.recv_timeout(Duration::from_secs(5)).unwrap();

        let reply = client.receive().unwrap();
        assert!(reply.is_none());
    }

    #[test]
    fn send_without_connect_is_rejected_without_os_call() {
        let mut client = TcpClient::new("localhost", 8080, Duration::from_millis(100));
        let err = client.send("test").unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[test]
    fn receive_without_connect_is_rejected_without_os_call() {
        let mut client = TcpClient::new("localhost", 8080, Duration::from_millis(100));
        let err = client.receive().unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[test]
    fn three_lines_round_trip_in_order() {
        let addr = spawn_echo_server();
        let mut client = client_for(addr, Duration::from_millis(2000));
        client.connect().unwrap();

        for message in ["First message", "Second message", "Third message"] {
            client.send(format!("{message}\n")).unwrap();
            let reply = client.receive().unwrap();
            assert_eq!(reply.as_deref(), Some(message.as_bytes()));
        }
    }

    #[test]
    fn connect_to_refused_port_fails_with_platform_code() {
        // Bind then drop to obtain a port that actively refuses.
        let refused_addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let mut client = client_for(refused_addr, Duration::from_millis(2000));

        let err = client.connect().unwrap_err();
        match err {
            ClientError::ConnectionFailed { code, .. } => {
                assert_eq!(code, Errno::CONNREFUSED.raw_os_error());
            }
            other => panic!("expected ConnectionFailed, got {other:?}"),
        }
        assert!(!client.is_connected());
    }

    #[test]
    fn connect_to_unroutable_target_times_out_naming_host_and_port() {
        // TEST-NET style unroutable address: packets are dropped, so the
        // handshake never completes. Some sandboxed environments reject
        // immediately instead; a definite failure is acceptable there.
        let mut client = TcpClient::new("10.255.255.1", 6000, Duration::from_millis(400));

        let start = Instant::now();
        let err = client.connect().unwrap_err();
        let elapsed = start.elapsed();

        match err {
            ClientError::ConnectionTimeout { ref host, port } => {
                assert_eq!(host, "10.255.255.1");
                assert_eq!(port, 6000);
                assert!(elapsed >= Duration::from_millis(350), "returned early: {elapsed:?}");
                assert!(elapsed < Duration::from_millis(1500), "overran budget: {elapsed:?}");
                assert_eq!(err.to_string(), "Connection timeout to 10.255.255.1:6000");
            }
            ClientError::ConnectionFailed { .. } => {}
            other => panic!("expected timeout or definite failure, got {other:?}"),
        }
        assert!(!client.is_connected());
    }

    #[test]
    fn reconnect_replaces_the_handle() {
        let first = spawn_echo_server();
        let second = spawn_echo_server();
        let mut client = client_for(first, Duration::from_millis(2000));

        client.connect().unwrap();
        let first_peer = client.peer_addr().unwrap();

        // Point the same client at a new server by reconnecting through a
        // fresh instance bound to the second address.
        let mut client = client_for(second, Duration::from_millis(2000));
        client.connect().unwrap();
        client.connect().unwrap();
        assert_ne!(client.peer_addr().unwrap(), first_peer);

        client.send("still works\n").unwrap();
        assert_eq!(
            client.receive().unwrap().as_deref(),
            Some(b"still works".as_ref())
        );
    }

    #[test]
    fn larger_than_default_receive_length() {
        let addr = spawn_echo_server();
        let mut client = client_for(addr, Duration::from_millis(2000));
        client.connect().unwrap();

        let message = vec![b'x'; 8000];
        client.send(&message).unwrap();

        let options = ReceiveOptions::raw().max_len(16 * 1024);
        let mut collected = Vec::new();
        while collected.len() < message.len() {
            match client.receive_with(options).unwrap() {
                Some(chunk) => collected.extend_from_slice(&chunk),
                None => break,
            }
        }
        assert_eq!(collected, message);
    }

    #[test]
    fn trim_strips_surrounding_whitespace_and_control_bytes() {
        assert_eq!(trim_message(b"  hello \r\n"), b"hello");
        assert_eq!(trim_message(b"\0padded\x0b"), b"padded");
        assert_eq!(trim_message(b"inner  spaces kept"), b"inner  spaces kept");
        assert_eq!(trim_message(b" \r\n\t"), b"");
        assert_eq!(trim_message(b""), b"");
    }
}
