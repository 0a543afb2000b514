use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
};

use thiserror::Error;

use crate::{
    buffer::SampleBuffer,
    clock::{Clock, SystemClock},
    config::{Mode, PollerConfig},
    device::{DeviceError, Driver},
    poller::{Counters, PollOutcome, Poller, PollerStats},
    sample::Sample,
};

#[derive(Error, Debug)]
pub enum StartError {
    #[error("failed to open device: {0}")]
    Device(#[from] DeviceError),
    #[error("failed to spawn poller thread: {0:?}")]
    Spawn(std::io::Error),
    #[error("poller thread exited before opening the device")]
    PollerExited,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Lifecycle {
    Unstarted,
    Running,
    Stopped,
    Closed,
}

enum Runner<D: Driver> {
    None,
    Background(thread::JoinHandle<()>),
    Inline(Poller<D>),
}

/// Host-facing handle on a polled device.
///
/// `start()` opens the device and begins polling, either on a dedicated thread
/// ([`Mode::Background`]) or one step per [`Controller::poll`] call
/// ([`Mode::Synchronous`]). `read()` hands out everything buffered since the
/// last read. `stop()` ends polling and closes the device; `close()` does the
/// same and retires the controller for good.
///
/// The buffer keeps only the newest `capacity` samples: anything older that
/// was not read in time is discarded silently, which shows up as a hole in
/// [`Sample::sequence`].
///
/// Lifecycle rules:
/// - `start()` on a running controller does nothing (and logs a warning);
/// - `start()` on a closed controller panics;
/// - `stop()` and `close()` can be called any number of times;
/// - dropping the controller closes it.
pub struct Controller<D: Driver> {
    driver: Arc<D>,
    config: PollerConfig,
    buffer: Arc<SampleBuffer>,
    running: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
    lifecycle: Lifecycle,
    runner: Runner<D>,
}

impl<D: Driver> Controller<D> {
    pub fn new(driver: D, config: PollerConfig) -> Controller<D> {
        Controller::with_clock(driver, config, Arc::new(SystemClock))
    }

    // panics if `config` is invalid or its width differs from the driver's
    pub fn with_clock(driver: D, config: PollerConfig, clock: Arc<dyn Clock>) -> Controller<D> {
        config.validate();
        assert_eq!(
            driver.width(),
            config.width,
            "driver produces {} channels but the configured width is {}",
            driver.width(),
            config.width
        );

        Controller {
            driver: Arc::new(driver),
            buffer: Arc::new(SampleBuffer::new(config.capacity, config.width)),
            config,
            running: Arc::new(AtomicBool::new(false)),
            clock,
            counters: Arc::new(Counters::default()),
            lifecycle: Lifecycle::Unstarted,
            runner: Runner::None,
        }
    }

    fn new_poller(&self) -> Poller<D> {
        Poller::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.buffer),
            Arc::clone(&self.clock),
            Arc::clone(&self.counters),
        )
    }

    // the poller, and with it the device session, is created on the spawned
    // thread and never leaves it; we only wait for the outcome of the open, not
    // for the first sample
    fn spawn_poller(&self) -> Result<thread::JoinHandle<()>, StartError> {
        let (ready_tx, ready_rx) = mpsc::channel();

        let driver = Arc::clone(&self.driver);
        let buffer = Arc::clone(&self.buffer);
        let clock = Arc::clone(&self.clock);
        let counters = Arc::clone(&self.counters);
        let running = Arc::clone(&self.running);
        let read_timeout = self.config.read_timeout;
        let idle_sleep = self.config.idle_sleep;

        let join_handle = thread::Builder::new()
            .name("sensorpoll-poller".into())
            .spawn(move || {
                let mut poller = Poller::new(driver, buffer, clock, counters);

                let result = poller.open();
                let opened = result.is_ok();

                if let Err(err) = &result {
                    log::error!("poller thread failed to open device: {:?}", err);
                }

                if let Err(err) = ready_tx.send(result) {
                    log::error!("open result send failed: {:?}", err);
                }

                if !opened {
                    return;
                }

                log::info!("poller thread started");
                poller.run(&running, read_timeout, idle_sleep);
                log::info!("poller thread gracefully finished");
            })
            .map_err(StartError::Spawn)?;

        let outcome = match ready_rx.recv() {
            Ok(Ok(())) => return Ok(join_handle),
            Ok(Err(err)) => StartError::Device(err),
            Err(_) => StartError::PollerExited,
        };

        join_poller(join_handle);

        Err(outcome)
    }

    // a device error leaves the controller as it was, so start() can be retried
    pub fn start(&mut self) -> Result<(), StartError> {
        match self.lifecycle {
            Lifecycle::Running => {
                log::warn!("start() called on a running controller, ignoring");
                return Ok(());
            }
            Lifecycle::Closed => panic!("start() called on a closed controller"),
            Lifecycle::Unstarted | Lifecycle::Stopped => {}
        }

        self.buffer.clear();
        self.counters.reset();
        self.running.store(true, Ordering::Release);

        let runner = match self.config.mode {
            Mode::Background => self.spawn_poller().map(Runner::Background),
            Mode::Synchronous => {
                let mut poller = self.new_poller();
                poller
                    .open()
                    .map(|()| Runner::Inline(poller))
                    .map_err(StartError::from)
            }
        };

        match runner {
            Ok(runner) => {
                self.runner = runner;
                self.lifecycle = Lifecycle::Running;
                log::debug!("controller started in {:?} mode", self.config.mode);
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    // waits until the device session has been closed
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        // settled before joining, so a re-raised poller panic leaves us stopped
        let was_running = self.lifecycle == Lifecycle::Running;
        if was_running {
            self.lifecycle = Lifecycle::Stopped;
        }

        match std::mem::replace(&mut self.runner, Runner::None) {
            Runner::None => {}
            Runner::Background(join_handle) => join_poller(join_handle),
            Runner::Inline(mut poller) => poller.close(),
        }

        if was_running {
            log::debug!("controller stopped, {:?}", self.counters.snapshot());
        }
    }

    // a background poller that panicked reports false here until `stop()` re-raises it
    pub fn is_polling(&self) -> bool {
        match &self.runner {
            Runner::None => false,
            Runner::Background(join_handle) => !join_handle.is_finished(),
            Runner::Inline(_) => true,
        }
    }

    // one poll iteration on the calling thread; synchronous mode only
    pub fn poll(&mut self) -> PollOutcome {
        match &mut self.runner {
            Runner::Inline(poller) => poller.poll_once(self.config.read_timeout),
            Runner::Background(_) => {
                panic!("poll() called on a controller polling in the background")
            }
            Runner::None => panic!("poll() called on a {:?} controller", self.lifecycle),
        }
    }

    // never blocks waiting for data
    pub fn read(&self) -> Vec<Sample> {
        self.buffer.drain()
    }

    pub fn close(&mut self) {
        if self.lifecycle == Lifecycle::Closed {
            return;
        }

        self.stop();
        self.lifecycle = Lifecycle::Closed;

        log::debug!("controller closed");
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn stats(&self) -> PollerStats {
        self.counters.snapshot()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }
}

// a panic on the poller thread is a programming error (e.g. a driver decoding
// the wrong number of channels), so it is carried over to the host
fn join_poller(join_handle: thread::JoinHandle<()>) {
    if let Err(payload) = join_handle.join() {
        if thread::panicking() {
            log::error!("poller thread panicked: {:?}", payload);
        } else {
            log::error!("poller thread panicked, propagating");
            std::panic::resume_unwind(payload);
        }
    }
}

impl<D: Driver> Drop for Controller<D> {
    fn drop(&mut self) {
        self.close();
    }
}
