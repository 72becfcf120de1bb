// Real-time poll loop. A single-threaded, priority-ordered
// cooperative scheduler built on `ppoll`. Items register up to three
// hooks around the syscall: `work_cb` (synchronous work before even
// considering sleep), `before_cb` (a final check just before poll, able
// to skip the syscall outright when work is already pending), and
// `after_cb` (cleanup once revents are known). Deletions are deferred
// to a post-run sweep, but a dead item is skipped in every phase of the
// run in progress the moment it's marked, not just excluded from the
// next one.

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::asyncmsgq::AsyncMsgq;
use crate::clock;
use crate::error::PollError;
use crate::fdsem::Fdsem;

pub const PRIORITY_EARLY: i32 = 0;
pub const PRIORITY_NORMAL: i32 = 1000;
pub const PRIORITY_LATE: i32 = 2000;

/// One hour, in microseconds. `set_timer` refuses deadlines further out
/// than this — a timer that far away almost always means a caller
/// passed a duration where an absolute deadline was expected.
const MAX_TIMER_AHEAD_USEC: u64 = 60 * 60 * 1_000_000;

type WorkFn = Box<dyn FnMut() -> i32 + Send>;
type BeforeFn = Box<dyn FnMut() -> i32 + Send>;
type AfterFn = Box<dyn FnMut(&[libc::pollfd]) -> i32 + Send>;

struct Item {
    priority: i32,
    fds: Vec<libc::pollfd>,
    work: Option<WorkFn>,
    before: Option<BeforeFn>,
    after: Option<AfterFn>,
    dead: Arc<AtomicBool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RtpollItemHandle(usize);

/// A capability, independent of `&mut Rtpoll`, that lets one item's hook
/// remove another item from within the same run. Mirrors the original's
/// `pa_rtpoll_item` carrying a back-pointer to its own rtpoll, which
/// lets a callback free its own item (or another one it holds a pointer
/// to) without needing the whole poll loop in scope.
#[derive(Clone)]
pub struct RtpollKill(Arc<AtomicBool>);

impl RtpollKill {
    pub fn kill(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct Rtpoll {
    items: Vec<Option<Item>>,
    packed: Vec<libc::pollfd>,
    spare: Vec<libc::pollfd>,
    ranges: Vec<(usize, usize)>,
    dirty: bool,
    /// Absolute deadline in `clock::now_usec` units, or `None` to block
    /// indefinitely.
    timer: Option<u64>,
}

impl Rtpoll {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            packed: Vec::new(),
            spare: Vec::new(),
            ranges: Vec::new(),
            dirty: false,
            timer: None,
        }
    }

    pub fn new_item(&mut self, priority: i32, fds: Vec<libc::pollfd>) -> RtpollItemHandle {
        let idx = self.items.len();
        self.items.push(Some(Item {
            priority,
            fds,
            work: None,
            before: None,
            after: None,
            dead: Arc::new(AtomicBool::new(false)),
        }));
        self.dirty = true;
        RtpollItemHandle(idx)
    }

    pub fn set_work_callback<F>(&mut self, handle: RtpollItemHandle, f: F)
    where
        F: FnMut() -> i32 + Send + 'static,
    {
        self.item_mut(handle).work = Some(Box::new(f));
    }

    pub fn set_before_callback<F>(&mut self, handle: RtpollItemHandle, f: F)
    where
        F: FnMut() -> i32 + Send + 'static,
    {
        self.item_mut(handle).before = Some(Box::new(f));
    }

    pub fn set_after_callback<F>(&mut self, handle: RtpollItemHandle, f: F)
    where
        F: FnMut(&[libc::pollfd]) -> i32 + Send + 'static,
    {
        self.item_mut(handle).after = Some(Box::new(f));
    }

    /// Mark an item for removal. It still participates in whatever
    /// phase of the current run is already past it, but every phase
    /// that hasn't reached it yet skips it. Dropped from the item list
    /// in the sweep at the end of the run.
    pub fn remove(&mut self, handle: RtpollItemHandle) {
        self.item_mut(handle).dead.store(true, Ordering::SeqCst);
    }

    /// A cloneable handle another item's hook can use to remove this
    /// item from within the same run, without borrowing `Rtpoll` itself.
    pub fn kill_handle(&self, handle: RtpollItemHandle) -> RtpollKill {
        RtpollKill(
            self.items[handle.0]
                .as_ref()
                .expect("rtpoll item handle used after removal")
                .dead
                .clone(),
        )
    }

    fn item_mut(&mut self, handle: RtpollItemHandle) -> &mut Item {
        self.items[handle.0]
            .as_mut()
            .expect("rtpoll item handle used after removal")
    }

    /// Set the absolute wakeup deadline, or `None` to wait indefinitely
    /// until an fd becomes ready.
    pub fn set_timer(&mut self, absolute_usec: Option<u64>) {
        if let Some(deadline) = absolute_usec {
            let ceiling = clock::now_usec() + MAX_TIMER_AHEAD_USEC;
            assert!(
                deadline <= ceiling,
                "rtpoll timer set more than one hour in the future"
            );
        }
        self.timer = absolute_usec;
    }

    pub fn disable_timer(&mut self) {
        self.timer = None;
    }

    fn order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| i))
            .collect();
        order.sort_by_key(|&i| self.items[i].as_ref().unwrap().priority);
        order
    }

    fn is_live(&self, idx: usize) -> bool {
        match &self.items[idx] {
            Some(item) => !item.dead.load(Ordering::SeqCst),
            None => false,
        }
    }

    fn rebuild(&mut self) {
        self.spare.clear();
        let mut ranges = vec![(0usize, 0usize); self.items.len()];
        for idx in self.order() {
            let item = self.items[idx].as_ref().unwrap();
            let start = self.spare.len();
            self.spare.extend_from_slice(&item.fds);
            ranges[idx] = (start, item.fds.len());
        }
        std::mem::swap(&mut self.packed, &mut self.spare);
        self.ranges = ranges;
        self.dirty = false;
    }

    fn sweep(&mut self) {
        let mut removed_any = false;
        for slot in self.items.iter_mut() {
            let dead = matches!(slot, Some(item) if item.dead.load(Ordering::SeqCst));
            if dead {
                *slot = None;
                removed_any = true;
            }
        }
        if removed_any {
            self.dirty = true;
        }
    }

    /// Run one iteration. Three phases around a possibly-skipped `ppoll`
    /// call:
    ///
    /// 1. `work_cb`, in priority order. Any live item's hook returning
    ///    non-zero ends the run right there — no `before_cb`, no poll,
    ///    no `after_cb` runs for anyone this iteration. Negative is an
    ///    error; positive means "there's more work, call `run` again".
    /// 2. `before_cb`, in priority order. Non-zero aborts the poll for
    ///    this iteration; every item whose `before_cb` already
    ///    succeeded this phase gets its `after_cb` invoked in reverse to
    ///    unwind, since the poll that would normally trigger it is never
    ///    going to happen. The failing item's own `after_cb` does not
    ///    run.
    /// 3. The poll syscall, then `after_cb` for every item still live,
    ///    regardless of whether it had a `work_cb`/`before_cb`.
    ///
    /// An item marked dead (via `remove` or a `RtpollKill`) partway
    /// through a phase is skipped by every later phase and every later
    /// item in the current phase, without waiting for the end-of-run
    /// sweep.
    pub fn run(&mut self) -> Result<i32, PollError> {
        if self.dirty {
            self.rebuild();
        }

        let order = self.order();

        for &idx in &order {
            if !self.is_live(idx) {
                continue;
            }
            let item = self.items[idx].as_mut().unwrap();
            if let Some(work) = item.work.as_mut() {
                let rc = work();
                if rc != 0 {
                    self.sweep();
                    if rc < 0 {
                        return Err(PollError::last_os_error("rtpoll work-hook"));
                    }
                    return Ok(rc);
                }
            }
        }

        for pfd in self.packed.iter_mut() {
            pfd.revents = 0;
        }

        let mut ran_before = Vec::with_capacity(order.len());
        let mut aborted: Option<i32> = None;
        for &idx in &order {
            if !self.is_live(idx) {
                continue;
            }
            let item = self.items[idx].as_mut().unwrap();
            if let Some(before) = item.before.as_mut() {
                let rc = before();
                if rc != 0 {
                    aborted = Some(rc);
                    break;
                }
                ran_before.push(idx);
            }
        }

        if let Some(rc) = aborted {
            for &idx in ran_before.iter().rev() {
                if !self.is_live(idx) {
                    continue;
                }
                if let Some(item) = self.items[idx].as_mut() {
                    if let Some(after) = item.after.as_mut() {
                        after(&[]);
                    }
                }
            }
            self.sweep();
            if rc < 0 {
                return Err(PollError::last_os_error("rtpoll before-hook"));
            }
            return Ok(0);
        }

        loop {
            let now = clock::now_usec();
            let ts = self.timer.map(|deadline| clock::usec_to_relative_timespec(deadline, now));
            let ts_ptr = ts
                .as_ref()
                .map(|t| t as *const libc::timespec)
                .unwrap_or(std::ptr::null());
            // SAFETY: packed is a valid pollfd array for its own
            // length; ts_ptr is either null or points at a live
            // timespec on this stack frame.
            let rc = unsafe {
                libc::ppoll(
                    self.packed.as_mut_ptr(),
                    self.packed.len() as libc::nfds_t,
                    ts_ptr,
                    std::ptr::null(),
                )
            };
            if rc >= 0 {
                break;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted || err.kind() == std::io::ErrorKind::WouldBlock {
                continue;
            }
            self.sweep();
            return Err(PollError {
                call: "ppoll",
                source: err,
            });
        }

        let mut work = 0i32;
        for &idx in &order {
            if !self.is_live(idx) {
                continue;
            }
            let (start, len) = self.ranges[idx];
            let item = self.items[idx].as_mut().unwrap();
            if let Some(after) = item.after.as_mut() {
                let revents = &self.packed[start..start + len];
                let rc = after(revents);
                if rc > 0 {
                    work += rc;
                }
            }
        }

        self.sweep();
        Ok(work)
    }

    /// Register an `Fdsem` for observation. `on_signal` runs once for
    /// every wakeup the semaphore caused, whether that was detected by
    /// `before_cb` short-circuiting the poll (signal already pending) or
    /// by `after_cb` once poll reported the fd readable.
    pub fn new_item_for_fdsem<F>(
        &mut self,
        priority: i32,
        fdsem: Arc<Fdsem>,
        on_signal: F,
    ) -> RtpollItemHandle
    where
        F: FnMut() -> i32 + Send + 'static,
    {
        let fds = vec![libc::pollfd {
            fd: fdsem.fd(),
            events: libc::POLLIN,
            revents: 0,
        }];
        let handle = self.new_item(priority, fds);
        let on_signal = Arc::new(std::sync::Mutex::new(on_signal));

        let fdsem_before = fdsem.clone();
        let on_signal_before = on_signal.clone();
        self.set_before_callback(handle, move || {
            if fdsem_before.before_poll().is_err() {
                on_signal_before.lock().unwrap()();
                1
            } else {
                0
            }
        });

        self.set_after_callback(handle, move |revents| {
            if revents.first().map_or(false, |p| p.revents & libc::POLLIN != 0) {
                fdsem.after_poll();
                on_signal.lock().unwrap()()
            } else {
                0
            }
        });
        handle
    }

    /// Register an `AsyncMsgq`'s read side. `on_message` runs from
    /// `work_cb`, draining and dispatching exactly one message per call
    /// so the outer caller's own repeated `run` calls are what drains a
    /// queue with more than one message queued, rather than looping
    /// internally here.
    pub fn new_item_for_asyncmsgq_read<F>(
        &mut self,
        priority: i32,
        queue: Arc<AsyncMsgq>,
        mut on_message: F,
    ) -> RtpollItemHandle
    where
        F: FnMut(crate::asyncmsgq::Message) -> i32 + Send + 'static,
    {
        let fds = vec![libc::pollfd {
            fd: queue.read_fd(),
            events: libc::POLLIN,
            revents: 0,
        }];
        let handle = self.new_item(priority, fds);

        let work_queue = queue.clone();
        self.set_work_callback(handle, move || match work_queue.get() {
            Some(msg) => {
                on_message(msg);
                1
            }
            None => 0,
        });

        let before_queue = queue.clone();
        self.set_before_callback(handle, move || before_queue.read_before_poll());

        self.set_after_callback(handle, move |revents| {
            if revents.first().map_or(false, |p| p.revents & libc::POLLIN != 0) {
                queue.read_after_poll();
            }
            0
        });
        handle
    }

    /// Register an `AsyncMsgq`'s write (reply-ready) side for producers
    /// that prefer polling over blocking inside `send`.
    pub fn new_item_for_asyncmsgq_write<F>(
        &mut self,
        priority: i32,
        queue: Arc<AsyncMsgq>,
        mut on_ready: F,
    ) -> RtpollItemHandle
    where
        F: FnMut() -> i32 + Send + 'static,
    {
        let fds = vec![libc::pollfd {
            fd: queue.write_fd(),
            events: libc::POLLIN,
            revents: 0,
        }];
        let handle = self.new_item(priority, fds);

        let before_queue = queue.clone();
        self.set_before_callback(handle, move || before_queue.write_before_poll());

        self.set_after_callback(handle, move |revents| {
            if revents.first().map_or(false, |p| p.revents & libc::POLLIN != 0) {
                queue.write_after_poll();
                on_ready()
            } else {
                0
            }
        });
        handle
    }
}

impl Default for Rtpoll {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw fd accessor kept separate from `new_item` for callers wiring up
/// their own before/after pair around a plain fd (e.g. the null sink's
/// render timer has no fd of its own and relies purely on the timer).
pub fn pollfd(fd: RawFd, events: libc::c_short) -> libc::pollfd {
    libc::pollfd {
        fd,
        events,
        revents: 0,
    }
}
