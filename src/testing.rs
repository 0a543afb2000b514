use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread::{self, ThreadId},
    time::{Duration, Instant},
};

use crate::device::{DecodeError, Decoded, DeviceError, DeviceSession, Driver, RawFrame};

pub(crate) use crate::clock::FakeClock;

// frames are plain little-endian f64 channel values
pub(crate) fn frame_of(values: &[f64]) -> RawFrame {
    RawFrame::new(values.iter().flat_map(|v| v.to_le_bytes()).collect())
}

#[derive(Default)]
pub(crate) struct SpyState {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub reads: AtomicUsize,
    pub closed_on_opening_thread: AtomicBool,
    pub opening_thread: Mutex<Option<ThreadId>>,
    reads_script: Mutex<VecDeque<Result<RawFrame, DeviceError>>>,
    open_error: Mutex<Option<DeviceError>>,
}

impl SpyState {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn pending_frames(&self) -> usize {
        self.reads_script.lock().unwrap().len()
    }
}

// replays queued reads and records how it is used
pub(crate) struct SpyDriver {
    width: usize,
    any_width: bool,
    read_delay: Duration,
    pub state: Arc<SpyState>,
}

impl SpyDriver {
    pub fn new(width: usize) -> SpyDriver {
        SpyDriver {
            width,
            any_width: false,
            read_delay: Duration::ZERO,
            state: Arc::new(SpyState::default()),
        }
    }

    // every read blocks for `delay`, whether or not anything is queued
    pub fn with_read_delay(mut self, delay: Duration) -> SpyDriver {
        self.read_delay = delay;
        self
    }

    // decode frames of any length, even if that breaks the declared width
    pub fn accepting_any_width(mut self) -> SpyDriver {
        self.any_width = true;
        self
    }

    pub fn fail_next_open(&self, err: DeviceError) {
        *self.state.open_error.lock().unwrap() = Some(err);
    }

    pub fn push_values(&self, values: &[f64]) {
        self.push_frame(frame_of(values));
    }

    pub fn push_frame(&self, frame: RawFrame) {
        self.state.reads_script.lock().unwrap().push_back(Ok(frame));
    }

    pub fn push_read_error(&self, err: DeviceError) {
        self.state.reads_script.lock().unwrap().push_back(Err(err));
    }
}

impl Driver for SpyDriver {
    type Session = SpySession;

    fn width(&self) -> usize {
        self.width
    }

    fn open(&self) -> Result<SpySession, DeviceError> {
        if let Some(err) = self.state.open_error.lock().unwrap().take() {
            return Err(err);
        }

        self.state.opens.fetch_add(1, Ordering::SeqCst);
        *self.state.opening_thread.lock().unwrap() = Some(thread::current().id());

        Ok(SpySession {
            read_delay: self.read_delay,
            opened_on: thread::current().id(),
            state: Arc::clone(&self.state),
        })
    }

    fn decode(&self, frame: &RawFrame) -> Result<Decoded, DecodeError> {
        let expected = self.width * 8;
        if !self.any_width && frame.len() != expected {
            return Err(DecodeError::WrongLength {
                expected,
                actual: frame.len(),
            });
        }

        let values = frame
            .as_bytes()
            .chunks_exact(8)
            .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
            .collect();

        Ok(Decoded {
            values,
            device_time: None,
        })
    }
}

pub(crate) struct SpySession {
    read_delay: Duration,
    opened_on: ThreadId,
    state: Arc<SpyState>,
}

impl DeviceSession for SpySession {
    fn read_raw(&mut self, _timeout: Duration) -> Result<Option<RawFrame>, DeviceError> {
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }

        self.state.reads.fetch_add(1, Ordering::SeqCst);

        self.state.reads_script.lock().unwrap().pop_front().transpose()
    }

    fn close(self) {
        self.state
            .closed_on_opening_thread
            .store(thread::current().id() == self.opened_on, Ordering::SeqCst);
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// polls `condition` until it holds, failing the test after `timeout`
pub(crate) fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;

    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within {:?}", timeout);
        thread::sleep(Duration::from_millis(1));
    }
}
