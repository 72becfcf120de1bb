// Async message queue. Single-producer/single-consumer
// control channel between a device's owning thread and its real-time
// device thread. Both the "new message available" and the "reply is
// ready" conditions are exposed as fds so `rtpoll` can wait on either
// alongside the device's own I/O, instead of the control thread
// blocking somewhere the poll loop can't see.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::fdsem::Fdsem;
use crate::memory::Memchunk;

/// Reserved command value: tells the receiving device thread to finish
/// its current render cycle and exit its `rtpoll` loop.
pub const MSG_SHUTDOWN: i32 = -1;

pub struct Message {
    pub command: i32,
    /// A scalar payload (e.g. a target sink state or a byte count) for
    /// commands that don't need a full memchunk.
    pub offset: i64,
    pub data: Option<Memchunk>,
}

struct Reply {
    value: i32,
    ready: bool,
}

/// The queue. Cheap to share behind an `Arc`: all interior state is
/// locked or atomic.
pub struct AsyncMsgq {
    inq: Mutex<VecDeque<Message>>,
    inq_sem: Fdsem,
    reply: Mutex<Reply>,
    reply_cv: Condvar,
    reply_sem: Fdsem,
}

impl AsyncMsgq {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            inq: Mutex::new(VecDeque::new()),
            inq_sem: Fdsem::new().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?,
            reply: Mutex::new(Reply {
                value: 0,
                ready: false,
            }),
            reply_cv: Condvar::new(),
            reply_sem: Fdsem::new().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?,
        })
    }

    /// Fire-and-forget enqueue; the sender does not wait for a reply.
    pub fn post(&self, command: i32, offset: i64, data: Option<Memchunk>) {
        self.inq.lock().unwrap().push_back(Message {
            command,
            offset,
            data,
        });
        self.inq_sem.post();
    }

    /// Enqueue and block until `done` is called on the receiving side,
    /// returning the value it passed. Only one outstanding `send` is
    /// supported at a time, matching the control channel's
    /// single-producer contract.
    pub fn send(&self, command: i32, offset: i64, data: Option<Memchunk>) -> i32 {
        {
            let mut reply = self.reply.lock().unwrap();
            reply.ready = false;
        }
        self.inq.lock().unwrap().push_back(Message {
            command,
            offset,
            data,
        });
        self.inq_sem.post();

        let mut reply = self.reply.lock().unwrap();
        while !reply.ready {
            reply = self.reply_cv.wait(reply).unwrap();
        }
        reply.value
    }

    /// Non-blocking pop for the consumer side. `rtpoll` calls this
    /// after observing `read_fd()` readable.
    pub fn get(&self) -> Option<Message> {
        self.inq.lock().unwrap().pop_front()
    }

    /// Acknowledge a message previously retrieved via `get`, waking any
    /// thread blocked in `send`.
    pub fn done(&self, value: i32) {
        let mut reply = self.reply.lock().unwrap();
        reply.value = value;
        reply.ready = true;
        self.reply_sem.post();
        self.reply_cv.notify_all();
    }

    /// Fd to register with `rtpoll` for "a message is available."
    pub fn read_fd(&self) -> std::os::unix::io::RawFd {
        self.inq_sem.fd()
    }

    /// Fd to register with `rtpoll` for "a reply became ready,"
    /// for producers that prefer polling over blocking in `send`.
    pub fn write_fd(&self) -> std::os::unix::io::RawFd {
        self.reply_sem.fd()
    }

    /// `rtpoll` before-hook for the read side: 0 to proceed toward a
    /// real poll, 1 if a wakeup was already pending (drained as a side
    /// effect), telling `rtpoll` to skip the syscall this round.
    pub fn read_before_poll(&self) -> i32 {
        if self.inq_sem.before_poll().is_err() {
            1
        } else {
            0
        }
    }

    pub fn read_after_poll(&self) {
        self.inq_sem.after_poll();
    }

    /// `rtpoll` before-hook for the write (reply-ready) side, same
    /// convention as `read_before_poll`.
    pub fn write_before_poll(&self) -> i32 {
        if self.reply_sem.before_poll().is_err() {
            1
        } else {
            0
        }
    }

    pub fn write_after_poll(&self) {
        self.reply_sem.after_poll();
    }
}
