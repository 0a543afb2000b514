//! Background polling of a physical sensor into a small shared buffer.
//!
//! A [`Controller`] owns a [`Driver`] for one device type. Starting it opens a
//! device session and polls it, either on a dedicated thread or inline on the
//! host's own calls, writing decoded [`Sample`]s into a fixed-capacity
//! [`SampleBuffer`]. The host drains that buffer with [`Controller::read`]
//! whenever it likes, without ever blocking the poller for longer than a copy.

pub mod buffer;
pub mod clock;
pub mod config;
pub mod controller;
pub mod device;
pub mod export;
pub mod poller;
pub mod sample;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::SampleBuffer;
pub use clock::{Clock, FakeClock, SystemClock, Timestamp};
pub use config::{Mode, PollerConfig};
pub use controller::{Controller, Lifecycle, StartError};
pub use device::{
    DecodeError, Decoded, DeviceError, DeviceSession, Driver, FrameLayout, RawFrame,
    SimulatedSensor,
};
pub use poller::{PollOutcome, Poller, PollerState, PollerStats};
pub use sample::{sequence_gaps, Sample};
