use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Background,
    // driven one iteration at a time by the host through `poll()`
    Synchronous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    pub capacity: usize,
    // must match the driver
    pub width: usize,
    // zero means busy-polling
    pub idle_sleep: Duration,
    // also bounds how long `stop()` waits
    pub read_timeout: Duration,
    pub mode: Mode,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig {
            capacity: 32,
            width: 6,
            idle_sleep: Duration::from_millis(1),
            read_timeout: Duration::from_millis(10),
            mode: Mode::Background,
        }
    }
}

impl PollerConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) {
        assert!(self.capacity > 0, "buffer capacity must be non-zero");
        assert!(self.width > 0, "channel width must be non-zero");
        assert!(
            !self.read_timeout.is_zero(),
            "device read timeout must be non-zero"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = PollerConfig::default()
            .with_capacity(3)
            .with_width(2)
            .with_idle_sleep(Duration::ZERO)
            .with_read_timeout(Duration::from_millis(5))
            .with_mode(Mode::Synchronous);

        assert_eq!(config.capacity, 3);
        assert_eq!(config.width, 2);
        assert_eq!(config.idle_sleep, Duration::ZERO);
        assert_eq!(config.read_timeout, Duration::from_millis(5));
        assert_eq!(config.mode, Mode::Synchronous);

        config.validate();
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn zero_capacity_is_rejected() {
        PollerConfig::default().with_capacity(0).validate();
    }

    #[test]
    #[should_panic(expected = "read timeout")]
    fn zero_read_timeout_is_rejected() {
        PollerConfig::default()
            .with_read_timeout(Duration::ZERO)
            .validate();
    }
}
