//! Deadline-bounded readiness polls over a single socket.
//!
//! Wraps `poll(2)` with millisecond-granularity timeouts. This is what
//! turns blocking OS calls into deadline-bounded operations: the connect
//! handshake waits for writability, `receive` waits for readability, and
//! both convert an expired budget into [`Readiness::TimedOut`] instead of
//! suspending indefinitely.

use std::io;
use std::os::fd::BorrowedFd;
use std::time::{Duration, Instant};

use rustix::event::{PollFd, PollFlags, poll};
use rustix::io::Errno;

/// Outcome of a bounded readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The socket became ready before the deadline.
    Ready,
    /// The deadline elapsed with no readiness.
    TimedOut,
    /// The poll reported an exceptional condition (POLLERR/POLLHUP/POLLNVAL).
    /// The caller should inspect `SO_ERROR` for the cause.
    Exceptional,
}

/// Waits for the socket to become writable, bounded by `timeout`.
///
/// Used during the connect handshake: a non-blocking connect reports
/// completion as writability.
///
/// # Errors
///
/// Returns an error if the poll call itself fails.
pub fn wait_writable(fd: BorrowedFd<'_>, timeout: Duration) -> io::Result<Readiness> {
    wait(fd, PollFlags::OUT, timeout)
}

/// Waits for the socket to become readable, bounded by `timeout`.
///
/// A hung-up peer is reported as [`Readiness::Ready`]: the subsequent read
/// observes the graceful close (or the pending error) directly.
///
/// # Errors
///
/// Returns an error if the poll call itself fails.
pub fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> io::Result<Readiness> {
    match wait(fd, PollFlags::IN, timeout)? {
        Readiness::Exceptional => Ok(Readiness::Ready),
        outcome => Ok(outcome),
    }
}

fn wait(fd: BorrowedFd<'_>, events: PollFlags, timeout: Duration) -> io::Result<Readiness> {
    let deadline = Instant::now() + timeout;
    loop {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            return Ok(Readiness::TimedOut);
        };
        let mut fds = [PollFd::from_borrowed_fd(fd, events)];
        match poll(&mut fds, timeout_millis(remaining)) {
            Ok(0) => return Ok(Readiness::TimedOut),
            Ok(_) => {
                let revents = fds[0].revents();
                if revents.intersects(PollFlags::ERR | PollFlags::HUP | PollFlags::NVAL) {
                    return Ok(Readiness::Exceptional);
                }
                return Ok(Readiness::Ready);
            }
            // Signal delivery; re-poll with the remaining budget.
            Err(e) if e == Errno::INTR => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Converts a remaining budget to whole milliseconds, rounding up so a
/// sub-millisecond remainder never becomes a zero-length (immediate) poll.
fn timeout_millis(remaining: Duration) -> i32 {
    let mut ms = remaining.as_millis();
    if remaining.as_nanos() % 1_000_000 != 0 {
        ms += 1;
    }
    i32::try_from(ms).unwrap_or(i32::MAX)
}
