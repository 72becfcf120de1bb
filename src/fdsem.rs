// Fd-backed semaphore. Cross-thread wakeup that `rtpoll`
// can observe as a pollable fd instead of blocking in a way the poll
// loop can't see. Backed by `eventfd` in semaphore-less counting mode;
// `signal` writes 1, `before_poll`/`after_poll` only ever drain the
// whole accumulated count, collapsing any number of pending signals
// into "wake up once."

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::PollError;

pub struct Fdsem {
    fd: RawFd,
    pending: AtomicBool,
}

impl Fdsem {
    pub fn new() -> Result<Self, PollError> {
        // SAFETY: eventfd with no flags besides EFD_NONBLOCK/EFD_CLOEXEC,
        // which are valid for any caller.
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(PollError::last_os_error("eventfd"));
        }
        Ok(Self {
            fd,
            pending: AtomicBool::new(false),
        })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Wake up anyone blocked in poll on this fd. Safe to call from any
    /// thread, including the signal handler context PulseAudio's
    /// equivalent is also safe in.
    pub fn post(&self) {
        self.pending.store(true, Ordering::Release);
        let one: u64 = 1;
        // SAFETY: fd is open for the lifetime of self, buf is a valid
        // 8-byte value as eventfd's write(2) contract requires.
        unsafe {
            libc::write(self.fd, &one as *const u64 as *const libc::c_void, 8);
        }
    }

    /// True if `post` has been called since the last successful
    /// `wait`/drain, without needing to touch the fd. `rtpoll` uses this
    /// to skip adding an already-pending item to the poll set.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Declare intent to sleep. If a signal already landed, drains it
    /// right here and returns an error so the caller can skip the poll
    /// syscall and act on the wakeup immediately instead of sleeping
    /// only to be woken straight back up.
    pub fn before_poll(&self) -> Result<(), ()> {
        if self.pending.load(Ordering::Acquire) {
            self.after_poll();
            Err(())
        } else {
            Ok(())
        }
    }

    /// Drain the eventfd counter after poll reports it readable (or
    /// after an out-of-band check found `is_pending`). Idempotent: safe
    /// to call when nothing is pending.
    pub fn after_poll(&self) {
        let mut buf: u64 = 0;
        // SAFETY: fd is open, buf is a valid 8-byte out-pointer.
        let n = unsafe { libc::read(self.fd, &mut buf as *mut u64 as *mut libc::c_void, 8) };
        if n == 8 {
            self.pending.store(false, Ordering::Release);
        }
    }
}

impl Drop for Fdsem {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
