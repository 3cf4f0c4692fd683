// Pull-style transport over a POSIX message queue (Linux)

use super::{
    CompletionHandler, Delivery, Transport, TransportError, TransportFactory, TransportSetupError,
};
use crate::Bench::config::BenchConfig;
use std::ffi::CString;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const BACKEND: &str = "mqueue";
const MSG_MAX_PATH: &str = "/proc/sys/fs/mqueue/msg_max";
const MSGSIZE_MAX_PATH: &str = "/proc/sys/fs/mqueue/msgsize_max";
// Kernel defaults when the limits cannot be read
const DEFAULT_MSG_MAX: i64 = 10;
const DEFAULT_MSGSIZE_MAX: i64 = 8192;

/// Options for the POSIX message queue backend.
#[derive(Clone, Debug)]
pub struct MqueueOptions {
    /// Queue name; a leading `/` is added when missing.
    pub name: String,
    pub non_blocking: bool,
    pub unlink_at_start: bool,
    pub unlink_at_end: bool,
}

impl Default for MqueueOptions {
    fn default() -> Self {
        Self {
            name: "/mq_bench".to_string(),
            non_blocking: false,
            unlink_at_start: true,
            unlink_at_end: true,
        }
    }
}

/// System-wide limits from `/proc/sys/fs/mqueue`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueLimits {
    pub msg_max: i64,
    pub msgsize_max: i64,
}

impl QueueLimits {
    pub fn read() -> Self {
        Self {
            msg_max: read_limit(MSG_MAX_PATH, DEFAULT_MSG_MAX),
            msgsize_max: read_limit(MSGSIZE_MAX_PATH, DEFAULT_MSGSIZE_MAX),
        }
    }

    /// Clamp a request to these limits, never below 1.
    pub fn negotiate(&self, max_messages: usize, message_size: usize) -> (i64, i64) {
        let maxmsg = (max_messages.min(i64::MAX as usize) as i64).clamp(1, self.msg_max.max(1));
        let msgsize =
            (message_size.min(i64::MAX as usize) as i64).clamp(1, self.msgsize_max.max(1));
        (maxmsg, msgsize)
    }
}

fn read_limit(path: &str, fallback: i64) -> i64 {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(fallback)
}

fn queue_name(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{}", name)
    }
}

/// Absolute CLOCK_REALTIME deadline `timeout` from now, as the timed mq calls expect.
fn deadline(timeout: Duration) -> libc::timespec {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts);
    }
    ts.tv_sec += timeout.as_secs() as libc::time_t;
    ts.tv_nsec += timeout.subsec_nanos() as libc::c_long;
    if ts.tv_nsec >= 1_000_000_000 {
        ts.tv_sec += 1;
        ts.tv_nsec -= 1_000_000_000;
    }
    ts
}

fn classify(err: io::Error) -> TransportError {
    match err.raw_os_error() {
        Some(libc::EAGAIN) | Some(libc::ETIMEDOUT) | Some(libc::EINTR) => {
            TransportError::WouldBlock
        }
        _ => TransportError::Io(err),
    }
}

impl TransportFactory for MqueueOptions {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn open(
        &self,
        config: &BenchConfig,
        _completion: Arc<dyn CompletionHandler>,
    ) -> Result<Arc<dyn Transport>, TransportSetupError> {
        let name = queue_name(&self.name);
        let open_err = |source: io::Error| TransportSetupError::Open {
            backend: BACKEND,
            identifier: name.clone(),
            source,
        };
        let c_name = CString::new(name.as_str())
            .map_err(|e| open_err(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        if self.unlink_at_start {
            unsafe {
                libc::mq_unlink(c_name.as_ptr());
            }
        }

        let limits = QueueLimits::read();
        let (maxmsg, msgsize) = limits.negotiate(config.max_in_flight, config.message_size);
        if maxmsg < config.max_in_flight as i64 {
            warn!(
                requested = config.max_in_flight,
                msg_max = limits.msg_max,
                "max-messages exceeds system msg_max, capping"
            );
        }
        if msgsize < config.message_size as i64 {
            warn!(
                requested = config.message_size,
                msgsize_max = limits.msgsize_max,
                "message-size exceeds system msgsize_max, capping"
            );
        }

        let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
        attr.mq_flags = if self.non_blocking { libc::O_NONBLOCK as _ } else { 0 };
        attr.mq_maxmsg = maxmsg as _;
        attr.mq_msgsize = msgsize as _;

        let mut oflags = libc::O_CREAT | libc::O_RDWR;
        if self.non_blocking {
            oflags |= libc::O_NONBLOCK;
        }

        let mqd = unsafe {
            libc::mq_open(
                c_name.as_ptr(),
                oflags,
                0o600 as libc::mode_t,
                &attr as *const libc::mq_attr,
            )
        };
        if mqd == -1 as libc::mqd_t {
            let err = io::Error::last_os_error();
            warn!(
                queue = %name,
                "mq_open failed; /proc/sys/fs/mqueue/msg_max or msgsize_max may need raising"
            );
            return Err(open_err(err));
        }

        let mut transport = MqueueTransport {
            mqd,
            c_name,
            name: name.clone(),
            non_blocking: self.non_blocking,
            unlink_at_end: self.unlink_at_end,
            msg_capacity: 0,
            closed: AtomicBool::new(false),
        };

        let mut actual: libc::mq_attr = unsafe { std::mem::zeroed() };
        if unsafe { libc::mq_getattr(mqd, &mut actual) } == -1 {
            let err = io::Error::last_os_error();
            transport.close();
            return Err(open_err(err));
        }

        info!(
            queue = %name,
            mq_flags = actual.mq_flags as i64,
            mq_maxmsg = actual.mq_maxmsg as i64,
            mq_msgsize = actual.mq_msgsize as i64,
            "effective mq attributes"
        );

        let effective_size = actual.mq_msgsize.max(0) as usize;
        if config.message_size > effective_size {
            transport.close();
            return Err(TransportSetupError::MessageTooLarge {
                backend: BACKEND,
                requested: config.message_size,
                limit: effective_size,
            });
        }

        transport.msg_capacity = effective_size;
        Ok(Arc::new(transport))
    }
}

pub struct MqueueTransport {
    mqd: libc::mqd_t,
    c_name: CString,
    name: String,
    non_blocking: bool,
    unlink_at_end: bool,
    /// Effective `mq_msgsize`; receive buffers must be at least this large.
    msg_capacity: usize,
    closed: AtomicBool,
}

impl Transport for MqueueTransport {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn identifier(&self) -> &str {
        &self.name
    }

    fn delivery(&self) -> Delivery {
        Delivery::Pull
    }

    fn non_blocking(&self) -> bool {
        self.non_blocking
    }

    fn send(&self, payload: &[u8], timeout: Duration) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let ts = deadline(timeout);
        let ret = unsafe {
            libc::mq_timedsend(
                self.mqd,
                payload.as_ptr() as *const libc::c_char,
                payload.len(),
                0,
                &ts,
            )
        };
        if ret == 0 {
            Ok(())
        } else {
            Err(classify(io::Error::last_os_error()))
        }
    }

    fn receive(&self, buf: &mut Vec<u8>, timeout: Duration) -> Result<usize, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if buf.len() < self.msg_capacity {
            buf.resize(self.msg_capacity, 0);
        }
        let ts = deadline(timeout);
        let mut prio: libc::c_uint = 0;
        let n = unsafe {
            libc::mq_timedreceive(
                self.mqd,
                buf.as_mut_ptr() as *mut libc::c_char,
                buf.len(),
                &mut prio,
                &ts,
            )
        };
        if n >= 0 {
            Ok(n as usize)
        } else {
            Err(classify(io::Error::last_os_error()))
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        unsafe {
            libc::mq_close(self.mqd);
            if self.unlink_at_end {
                libc::mq_unlink(self.c_name.as_ptr());
            }
        }
    }
}

impl Drop for MqueueTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_get_a_leading_slash() {
        assert_eq!(queue_name("bench"), "/bench");
        assert_eq!(queue_name("/bench"), "/bench");
    }

    #[test]
    fn negotiation_caps_to_system_limits() {
        let limits = QueueLimits {
            msg_max: 10,
            msgsize_max: 8192,
        };
        assert_eq!(limits.negotiate(1024, 256), (10, 256));
        assert_eq!(limits.negotiate(4, 100_000), (4, 8192));
        assert_eq!(limits.negotiate(0, 0), (1, 1));
    }

    #[test]
    fn deadline_normalizes_nanoseconds() {
        let ts = deadline(Duration::from_millis(999));
        assert!(ts.tv_nsec >= 0 && ts.tv_nsec < 1_000_000_000);
    }
}
