//! Error taxonomy for client operations.
//!
//! Every failure that originates from an OS error carries the original
//! platform error code plus a description enriched by [`crate::errno`],
//! so callers can react to causes the taxonomy does not distinguish.

use std::io;

use thiserror::Error;

use crate::errno;

/// Errors surfaced by [`TcpClient`](crate::TcpClient) operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The OS could not allocate a socket. Fatal, non-retryable.
    #[error("Could not create socket to {host}:{port}. [{code}] {detail}")]
    SocketCreation {
        host: String,
        port: u16,
        /// Raw platform error code.
        code: i32,
        detail: String,
    },
    /// The connect attempt reached a definite failure, or the readiness
    /// poll during connect reported an exceptional condition.
    #[error("Failed to connect to {host}:{port}. [{code}] {detail}")]
    ConnectionFailed {
        host: String,
        port: u16,
        /// Raw platform error code.
        code: i32,
        detail: String,
    },
    /// The configured timeout elapsed before the connect handshake
    /// completed. The socket is closed before this is raised.
    #[error("Connection timeout to {host}:{port}")]
    ConnectionTimeout { host: String, port: u16 },
    /// `send`/`receive` invoked while no handle is present. Raised without
    /// touching the OS.
    #[error("Not connected to server. Make sure to call `connect` first.")]
    NotConnected,
    /// A non-transient OS error during write. Transient would-block
    /// conditions are retried internally and never surface here.
    #[error("Failed to send data. [{code}] {detail}")]
    SendFailed {
        /// Raw platform error code.
        code: i32,
        detail: String,
    },
    /// A non-transient OS error during read or the readiness poll before it.
    #[error("Failed to receive data. [{code}] {detail}")]
    ReceiveFailed {
        /// Raw platform error code.
        code: i32,
        detail: String,
    },
}

impl ClientError {
    pub(crate) fn socket_creation(host: &str, port: u16, err: &io::Error) -> Self {
        let (code, detail) = code_and_detail(err);
        Self::SocketCreation {
            host: host.to_string(),
            port,
            code,
            detail,
        }
    }

    pub(crate) fn connection_failed(host: &str, port: u16, err: &io::Error) -> Self {
        let (code, detail) = code_and_detail(err);
        Self::ConnectionFailed {
            host: host.to_string(),
            port,
            code,
            detail,
        }
    }

    pub(crate) fn connection_timeout(host: &str, port: u16) -> Self {
        Self::ConnectionTimeout {
            host: host.to_string(),
            port,
        }
    }

    pub(crate) fn send_failed(err: &io::Error) -> Self {
        let (code, detail) = code_and_detail(err);
        Self::SendFailed { code, detail }
    }

    pub(crate) fn receive_failed(err: &io::Error) -> Self {
        let (code, detail) = code_and_detail(err);
        Self::ReceiveFailed { code, detail }
    }

    /// Returns the raw platform error code, if this error carries one.
    #[must_use]
    pub fn os_error_code(&self) -> Option<i32> {
        match self {
            Self::SocketCreation { code, .. }
            | Self::ConnectionFailed { code, .. }
            | Self::SendFailed { code, .. }
            | Self::ReceiveFailed { code, .. } => Some(*code),
            Self::ConnectionTimeout { .. } | Self::NotConnected => None,
        }
    }
}

/// Extracts the raw code from an [`io::Error`] and enriches its message.
///
/// Errors without an OS code (e.g. resolver failures reported by the
/// standard library) keep code 0 and the library's own message.
fn code_and_detail(err: &io::Error) -> (i32, String) {
    let code = err.raw_os_error().unwrap_or(0);
    let detail = errno::describe(code, &err.to_string());
    (code, detail)
}
