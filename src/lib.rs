//! Deadline-bounded synchronous TCP client.
//!
//! A minimal transport primitive: open a connection to `host:port` with a
//! bounded wait, send bytes reliably, and receive bytes with a bounded
//! wait, surfacing OS-level socket failures as a small typed error
//! taxonomy ([`ClientError`]) instead of generic I/O errors.
//!
//! The interesting part is the connect/timeout/retry state machine around
//! three socket operations:
//!
//! - **connect-with-timeout** — non-blocking connect, then a
//!   millisecond-granularity writability poll under the configured budget,
//!   then blocking mode restored for subsequent I/O.
//! - **write-with-retry** — a partial-write loop that recovers transient
//!   would-block conditions locally and only surfaces real failures.
//! - **read-with-timeout** — a readability poll under the budget followed
//!   by a single bounded read; an expired budget is `Ok(None)`, routine
//!   control flow for polling protocols, not an error.
//!
//! Higher protocol layers (HTTP, SMTP, FTP, echo) are built on top; this
//! crate defines no framing of its own.
//!
//! # Examples
//!
//! ```no_run
//! use simpletcp::TcpClient;
//! use std::time::Duration;
//!
//! let mut client = TcpClient::new("smtp.example.com", 587, Duration::from_millis(10_000));
//! client.connect()?;
//!
//! let greeting = client.receive()?;
//! client.send("EHLO test.local\r\n")?;
//! let capabilities = client.receive()?;
//! # Ok::<(), simpletcp::ClientError>(())
//! ```

pub mod client;
pub mod errno;
pub mod error;
pub mod escape;
pub mod readiness;
pub mod trace;

pub use client::{DEFAULT_RECEIVE_MAX, ReceiveOptions, TcpClient};
pub use error::ClientError;
pub use trace::init_tracing;
