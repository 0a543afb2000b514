// A session is opened on the thread that polls it and closed by that same
// thread, so `DeviceSession` does not need to be `Send`.

use std::time::Duration;

mod error;
mod frame;
mod simulated;

pub use error::{DecodeError, DeviceError, LayoutError};
pub use frame::{Field, FieldType, FrameLayout};
pub use simulated::{SimulatedSensor, SimulatedSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Vec<u8>,
}

impl RawFrame {
    pub fn new(bytes: Vec<u8>) -> RawFrame {
        RawFrame { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        RawFrame::new(bytes)
    }
}

// engineering units, plus the device's own timestamp if the protocol has one
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub values: Vec<f64>,
    pub device_time: Option<u64>,
}

pub trait DeviceSession {
    /// Reads one frame, waiting at most about `timeout`. `Ok(None)` means
    /// no data yet.
    fn read_raw(&mut self, timeout: Duration) -> Result<Option<RawFrame>, DeviceError>;

    fn close(self);
}

/// A device type: opens sessions and decodes their frames. The driver value
/// carries whatever configuration `open` needs.
pub trait Driver: Send + Sync + 'static {
    type Session: DeviceSession;

    fn width(&self) -> usize;

    fn open(&self) -> Result<Self::Session, DeviceError>;

    fn decode(&self, frame: &RawFrame) -> Result<Decoded, DecodeError>;
}
