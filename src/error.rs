// Ambient error types. Contract violations inside the real-time path
// (misuse of Memblock/Memchunk, an out-of-range sink state transition)
// stay as `assert!`/`panic!` — those are bugs, not conditions a caller
// can recover from. These types cover the things that can legitimately
// fail at runtime: OS calls and device configuration.

use std::fmt;
use std::io;

/// An OS-level failure from `rtpoll`'s `ppoll`/`poll` call or the fds
/// it manages.
#[derive(Debug)]
pub struct PollError {
    pub call: &'static str,
    pub source: io::Error,
}

impl PollError {
    pub fn last_os_error(call: &'static str) -> Self {
        Self {
            call,
            source: io::Error::last_os_error(),
        }
    }
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.call, self.source)
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Failures opening, configuring, or tearing down a device.
#[derive(Debug)]
pub enum DeviceError {
    /// A required module argument was missing or malformed.
    BadArgument { key: String, reason: String },
    /// The underlying OS resource (fd, thread) could not be created.
    Poll(PollError),
    /// The device thread panicked or exited before acknowledging
    /// shutdown.
    ThreadJoin(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::BadArgument { key, reason } => {
                write!(f, "bad argument {key:?}: {reason}")
            }
            DeviceError::Poll(e) => write!(f, "{e}"),
            DeviceError::ThreadJoin(msg) => write!(f, "device thread join failed: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::Poll(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PollError> for DeviceError {
    fn from(e: PollError) -> Self {
        DeviceError::Poll(e)
    }
}
