// Monotonic microsecond clock and timespec conversion helpers.
//
// Everything in this crate that needs "now" goes through `now_usec`
// rather than `std::time::Instant` directly, because `rtpoll` needs to
// convert a deadline into a `libc::timespec` for `ppoll`, and
// `Instant` gives no portable way to do that. We anchor to
// `CLOCK_MONOTONIC` ourselves instead.

pub const USEC_PER_SEC: u64 = 1_000_000;
pub const USEC_PER_MSEC: u64 = 1_000;

/// Current time on the monotonic clock, in microseconds since an
/// unspecified epoch. Only differences between two calls are
/// meaningful.
pub fn now_usec() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is a valid out-pointer for clock_gettime.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    assert_eq!(rc, 0, "clock_gettime(CLOCK_MONOTONIC) failed");
    ts.tv_sec as u64 * USEC_PER_SEC + (ts.tv_nsec as u64) / 1000
}

/// Convert an absolute deadline (in the same µs timebase as
/// `now_usec`) into a relative `timespec` suitable for `ppoll`, clamped
/// to zero if the deadline has already passed.
pub fn usec_to_relative_timespec(deadline_usec: u64, now: u64) -> libc::timespec {
    let remaining = deadline_usec.saturating_sub(now);
    libc::timespec {
        tv_sec: (remaining / USEC_PER_SEC) as libc::time_t,
        tv_nsec: ((remaining % USEC_PER_SEC) * 1000) as i64,
    }
}
