use std::{
    f64::consts::TAU,
    thread,
    time::{Duration, Instant},
};

use crate::device::{
    DecodeError, Decoded, DeviceError, DeviceSession, Driver, FrameLayout, RawFrame,
};

// three forces, three torques, with the device's own microsecond clock in front
const LAYOUT: &str = "T4I2I2I2I2I2I2";

const COUNTS_PER_NEWTON: f64 = 100.0;
const COUNTS_PER_NEWTON_METRE: f64 = 1000.0;

// a 6-axis force/torque sensor, frames carry raw counts
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    rate: f64,
    period: Duration,
    layout: FrameLayout,
}

impl SimulatedSensor {
    pub fn new(rate: f64) -> SimulatedSensor {
        assert!(
            rate.is_finite() && rate > 0.0,
            "sample rate must be positive, got {}",
            rate
        );

        // rates so low that one period does not fit in a Duration are rejected too
        let period = match Duration::try_from_secs_f64(1.0 / rate) {
            Ok(period) => period,
            Err(err) => panic!("sample rate {} is out of range: {}", rate, err),
        };

        let layout = match FrameLayout::parse(LAYOUT) {
            Ok(layout) => layout,
            Err(err) => unreachable!("built-in layout {:?} is invalid: {}", LAYOUT, err),
        };

        let force_scale = 1.0 / COUNTS_PER_NEWTON;
        let torque_scale = 1.0 / COUNTS_PER_NEWTON_METRE;

        SimulatedSensor {
            rate,
            period,
            layout: layout.with_scales(vec![
                force_scale,
                force_scale,
                force_scale,
                torque_scale,
                torque_scale,
                torque_scale,
            ]),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Driver for SimulatedSensor {
    type Session = SimulatedSession;

    fn width(&self) -> usize {
        self.layout.width()
    }

    fn open(&self) -> Result<SimulatedSession, DeviceError> {
        let now = Instant::now();

        log::debug!("opening simulated sensor at {} samples/s", self.rate);

        Ok(SimulatedSession {
            layout: self.layout.clone(),
            period: self.period,
            opened_at: now,
            next_sample_at: now,
            frames: 0,
        })
    }

    fn decode(&self, frame: &RawFrame) -> Result<Decoded, DecodeError> {
        self.layout.decode(frame)
    }
}

pub struct SimulatedSession {
    layout: FrameLayout,
    period: Duration,
    opened_at: Instant,
    next_sample_at: Instant,
    frames: u64,
}

impl SimulatedSession {
    fn raw_counts(t: f64) -> [f64; 6] {
        let wave = |amplitude: f64, frequency: f64| amplitude * (TAU * frequency * t).sin();

        let fx = wave(10.0, 0.5);
        let fy = wave(10.0, 1.0);
        let fz = 50.0 + wave(5.0, 5.0);
        let tx = wave(0.5, 0.5);
        let ty = wave(0.5, 1.0);
        let tz = wave(0.2, 10.0);

        [
            fx * COUNTS_PER_NEWTON,
            fy * COUNTS_PER_NEWTON,
            fz * COUNTS_PER_NEWTON,
            tx * COUNTS_PER_NEWTON_METRE,
            ty * COUNTS_PER_NEWTON_METRE,
            tz * COUNTS_PER_NEWTON_METRE,
        ]
    }
}

impl DeviceSession for SimulatedSession {
    fn read_raw(&mut self, timeout: Duration) -> Result<Option<RawFrame>, DeviceError> {
        let now = Instant::now();

        if self.next_sample_at > now {
            let wait = self.next_sample_at - now;
            if wait > timeout {
                thread::sleep(timeout);
                return Ok(None);
            }
            thread::sleep(wait);
        }

        let elapsed = self.next_sample_at - self.opened_at;
        self.next_sample_at += self.period;
        self.frames += 1;

        // the device clock is 32 bits wide and wraps
        let device_time = elapsed.as_micros() as u32;
        let counts = Self::raw_counts(elapsed.as_secs_f64());

        Ok(Some(self.layout.encode(Some(device_time), &counts)))
    }

    fn close(self) {
        log::debug!("closing simulated sensor after {} frames", self.frames);
    }
}
