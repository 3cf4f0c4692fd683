// System-wide monotonic clock used for envelope timestamps.

/// Nanoseconds on `CLOCK_MONOTONIC`.
///
/// The clock is shared by every process on the host, so a timestamp written by
/// one process and read back by another still yields a meaningful difference.
#[inline]
pub fn monotonic_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // CLOCK_MONOTONIC is always available; the call cannot fail with a valid pointer
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64)
        .saturating_mul(1_000_000_000)
        .saturating_add(ts.tv_nsec as u64)
}
