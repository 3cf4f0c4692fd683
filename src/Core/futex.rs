use std::sync::atomic::AtomicU32;
use std::time::Duration;

/// Block while `atomic` still holds `expected`, for at most `timeout`.
///
/// Spurious wakeups are allowed; callers re-check their condition in a loop.
/// The futex is process-shared: producer and consumer map the same region at
/// different addresses, so the kernel must key waiters on the backing page.
#[cfg(target_os = "linux")]
pub fn futex_wait_timeout(atomic: &AtomicU32, expected: u32, timeout: Duration) {
    use std::ptr;
    use std::sync::atomic::Ordering;

    // Check condition first to avoid syscall if possible
    if atomic.load(Ordering::Relaxed) != expected || timeout.is_zero() {
        return;
    }

    // FUTEX_WAIT takes a relative timeout
    let ts = libc::timespec {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_nsec: timeout.subsec_nanos() as libc::c_long,
    };

    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT,
            expected,
            &ts as *const libc::timespec,
            ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(target_os = "linux")]
pub fn futex_wake(atomic: &AtomicU32, waiters: i32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE,
            waiters,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait_timeout(atomic: &AtomicU32, expected: u32, timeout: Duration) {
    use std::sync::atomic::Ordering;

    // Fallback for non-Linux: short sleep bounded by the timeout
    if atomic.load(Ordering::Relaxed) == expected {
        std::thread::sleep(timeout.min(Duration::from_micros(50)));
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_atomic: &AtomicU32, _waiters: i32) {
    // No-op on non-Linux
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    #[test]
    fn wait_returns_immediately_on_stale_value() {
        let word = AtomicU32::new(7);
        let start = Instant::now();
        futex_wait_timeout(&word, 3, Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_is_bounded_by_timeout() {
        let word = AtomicU32::new(0);
        let start = Instant::now();
        futex_wait_timeout(&word, 0, Duration::from_millis(20));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(word.load(Ordering::Relaxed), 0);
    }
}
