use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    buffer::SampleBuffer,
    clock::Clock,
    device::{DeviceError, DeviceSession, Driver},
    sample::Sample,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PollerState {
    Idle,
    Polling,
    Stopped,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PollOutcome {
    Sampled,
    // read, but undecodable
    Dropped,
    // nothing to read, or the read failed
    Idle,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollerStats {
    pub frames_read: u64,
    pub decode_errors: u64,
    pub read_errors: u64,
    pub samples_overwritten: u64,
}

// updated by the poller, read by the host without touching the buffer lock
#[derive(Debug, Default)]
pub(crate) struct Counters {
    frames_read: AtomicU64,
    decode_errors: AtomicU64,
    read_errors: AtomicU64,
    samples_overwritten: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> PollerStats {
        PollerStats {
            frames_read: self.frames_read.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            samples_overwritten: self.samples_overwritten.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        self.frames_read.store(0, Ordering::Relaxed);
        self.decode_errors.store(0, Ordering::Relaxed);
        self.read_errors.store(0, Ordering::Relaxed);
        self.samples_overwritten.store(0, Ordering::Relaxed);
    }
}

struct RateMeter {
    since: Instant,
    samples: u64,
}

impl RateMeter {
    fn new() -> RateMeter {
        RateMeter {
            since: Instant::now(),
            samples: 0,
        }
    }

    fn record(&mut self) {
        self.samples += 1;

        let now = Instant::now();
        let elapsed = now - self.since;
        if elapsed >= Duration::from_secs(1) {
            log::debug!(
                "measured rate {} samples/s",
                (self.samples as f64 / elapsed.as_secs_f64()).round() as i64
            );

            self.samples = 0;
            self.since = now;
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum ErrorReport {
    // first error after a successful read
    First,
    // an error inside a burst, summarized later
    Suppressed,
    // once per second during a burst, with the number of errors held back
    Summary(u64),
}

// keeps a device that fails on every read (e.g. unplugged) from flooding the log
struct ErrorThrottle {
    window_start: Instant,
    suppressed: u64,
    in_burst: bool,
}

impl ErrorThrottle {
    const WINDOW: Duration = Duration::from_secs(1);

    fn new() -> ErrorThrottle {
        ErrorThrottle {
            window_start: Instant::now(),
            suppressed: 0,
            in_burst: false,
        }
    }

    fn on_error(&mut self, now: Instant) -> ErrorReport {
        if !self.in_burst {
            self.in_burst = true;
            self.window_start = now;
            self.suppressed = 0;
            return ErrorReport::First;
        }

        if now.saturating_duration_since(self.window_start) >= Self::WINDOW {
            let suppressed = self.suppressed;
            self.suppressed = 0;
            self.window_start = now;
            return ErrorReport::Summary(suppressed);
        }

        self.suppressed += 1;
        ErrorReport::Suppressed
    }

    // returns how many errors of the finished burst were never reported
    fn on_success(&mut self) -> Option<u64> {
        if !self.in_burst {
            return None;
        }

        self.in_burst = false;
        let suppressed = std::mem::take(&mut self.suppressed);

        (suppressed > 0).then_some(suppressed)
    }
}

/// Owns a device session and moves its frames into the sample buffer.
///
/// The session is opened by [`Poller::open`] and closed by [`Poller::close`]
/// (or on drop), so it lives and dies on whichever thread owns the poller.
pub struct Poller<D: Driver> {
    driver: Arc<D>,
    session: Option<D::Session>,
    buffer: Arc<SampleBuffer>,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
    next_sequence: u64,
    state: PollerState,
    rate: RateMeter,
    read_errors: ErrorThrottle,
}

impl<D: Driver> Poller<D> {
    pub(crate) fn new(
        driver: Arc<D>,
        buffer: Arc<SampleBuffer>,
        clock: Arc<dyn Clock>,
        counters: Arc<Counters>,
    ) -> Poller<D> {
        Poller {
            driver,
            session: None,
            buffer,
            clock,
            counters,
            next_sequence: 0,
            state: PollerState::Idle,
            rate: RateMeter::new(),
            read_errors: ErrorThrottle::new(),
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    // on failure the poller stays idle and nothing is written to the buffer
    pub fn open(&mut self) -> Result<(), DeviceError> {
        assert_eq!(
            self.state,
            PollerState::Idle,
            "a poller can only be opened once"
        );

        let session = self.driver.open()?;

        self.session = Some(session);
        self.state = PollerState::Polling;
        self.rate = RateMeter::new();
        self.read_errors = ErrorThrottle::new();

        Ok(())
    }

    /// Reads at most one frame and, if it decodes, writes it to the buffer.
    ///
    /// Read and decode errors are logged and counted, never returned: one bad
    /// frame must not end polling.
    pub fn poll_once(&mut self, read_timeout: Duration) -> PollOutcome {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => panic!("poll_once() called on a {:?} poller", self.state),
        };

        let read_result = session.read_raw(read_timeout);

        if let Err(err) = &read_result {
            self.counters.read_errors.fetch_add(1, Ordering::Relaxed);

            match self.read_errors.on_error(Instant::now()) {
                ErrorReport::First => log::warn!("device read error: {:?}", err),
                ErrorReport::Summary(n) => log::warn!(
                    "device read error: {:?} ({} more in the last second)",
                    err,
                    n
                ),
                ErrorReport::Suppressed => log::trace!("device read error: {:?}", err),
            }

            return PollOutcome::Idle;
        }

        if let Some(n) = self.read_errors.on_success() {
            log::info!("device reads recovered after {} more errors", n);
        }

        let frame = match read_result {
            Ok(Some(frame)) => frame,
            _ => return PollOutcome::Idle,
        };

        self.counters.frames_read.fetch_add(1, Ordering::Relaxed);

        let decoded = match self.driver.decode(&frame) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("dropping undecodable frame: {}", err);
                return PollOutcome::Dropped;
            }
        };

        let sample = Sample {
            sequence: self.next_sequence,
            host_time: self.clock.now(),
            device_time: decoded.device_time,
            values: decoded.values,
        };
        self.next_sequence += 1;

        if self.buffer.write(sample) {
            self.counters
                .samples_overwritten
                .fetch_add(1, Ordering::Relaxed);
            log::trace!("sample buffer full, dropped the oldest sample");
        }

        self.rate.record();

        PollOutcome::Sampled
    }

    /// Polls until `running` is cleared, then closes the session.
    ///
    /// The flag is checked before every read, so after it is cleared at most
    /// one more read (bounded by `read_timeout`) and one idle sleep happen.
    pub fn run(&mut self, running: &AtomicBool, read_timeout: Duration, idle_sleep: Duration) {
        while running.load(Ordering::Acquire) {
            if self.poll_once(read_timeout) == PollOutcome::Idle && !idle_sleep.is_zero() {
                thread::sleep(idle_sleep);
            }
        }

        self.close();
    }

    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
            log::debug!(
                "device session closed after {} samples",
                self.next_sequence
            );
        }

        self.state = PollerState::Stopped;
    }
}

impl<D: Driver> Drop for Poller<D> {
    fn drop(&mut self) {
        self.close();
    }
}
