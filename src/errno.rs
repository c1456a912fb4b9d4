//! Human-readable descriptions for platform socket error codes.
//!
//! Consulted when constructing failure values to enrich error messages.
//! The lookup has no effect on control flow: callers branch on the raw
//! code or error kind, never on these strings.

use rustix::io::Errno;

/// Returns a human-readable explanation for a platform socket error code.
///
/// Codes outside the mapped set fall back to the platform's own error
/// string, supplied by the caller as `fallback`.
#[must_use]
pub fn describe(code: i32, fallback: &str) -> String {
    let description = match Errno::from_raw_os_error(code) {
        e if e == Errno::CONNREFUSED => {
            "Connection refused - the target actively rejected the connection"
        }
        e if e == Errno::TIMEDOUT => "Connection timed out - no response from the target",
        e if e == Errno::HOSTUNREACH => "Host unreachable - no route to the destination host",
        e if e == Errno::NETUNREACH => "Network unreachable - no route to the destination network",
        e if e == Errno::ADDRINUSE => "Address already in use - the local address is already bound",
        e if e == Errno::ADDRNOTAVAIL => {
            "Address not available - the specified address is not available"
        }
        e if e == Errno::INPROGRESS => {
            "Operation in progress - connection attempt is still in progress"
        }
        e if e == Errno::ALREADY => {
            "Operation already in progress - connection attempt already started"
        }
        e if e == Errno::WOULDBLOCK || e == Errno::AGAIN => {
            "Operation would block - resource temporarily unavailable"
        }
        _ => return fallback.to_string(),
    };
    description.to_string()
}
