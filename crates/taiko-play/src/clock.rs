use std::cell::Cell;

/// Read-only playback time source, in seconds since chart start.
pub trait PlaybackClock {
    fn now(&self) -> f64;
}

/// Clock moved by hand, for replays and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    current: Cell<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            current: Cell::new(start),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.current.set(seconds);
    }

    pub fn advance(&self, delta: f64) {
        self.current.set(self.current.get() + delta);
    }
}

impl PlaybackClock for ManualClock {
    fn now(&self) -> f64 {
        self.current.get()
    }
}
