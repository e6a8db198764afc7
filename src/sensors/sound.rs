//! Digital sound detector on a GPIO input.
//!
//! The module's D0 line goes high while noise exceeds the on-board
//! threshold. Edge detection is done in software: a rising edge fires an
//! event, repeats inside the debounce window are swallowed.

use std::time::{Duration, Instant};

use embedded_hal::digital::InputPin;

pub struct SoundDetector<P> {
    pin: P,
    debounce: Duration,
    last_level: bool,
    last_event: Option<Instant>,
}

impl<P: InputPin> SoundDetector<P> {
    pub fn new(pin: P, debounce: Duration) -> SoundDetector<P> {
        SoundDetector {
            pin,
            debounce,
            last_level: false,
            last_event: None,
        }
    }

    /// Sample the line once. Returns `true` when a debounced rising edge
    /// is seen at `now`.
    pub fn poll(&mut self, now: Instant) -> Result<bool, Error<P::Error>> {
        let level = self.pin.is_high().map_err(Error::Gpio)?;
        let rising = level && !self.last_level;
        self.last_level = level;

        if !rising {
            return Ok(false);
        }

        if let Some(last) = self.last_event {
            if now.duration_since(last) < self.debounce {
                return Ok(false);
            }
        }

        self.last_event = Some(now);
        Ok(true)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error<E> {
    #[error("gpio read failed: {0:?}")]
    Gpio(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedPin {
        levels: VecDeque<bool>,
    }

    impl ScriptedPin {
        fn new(levels: &[bool]) -> ScriptedPin {
            ScriptedPin {
                levels: levels.iter().copied().collect(),
            }
        }
    }

    impl embedded_hal::digital::ErrorType for ScriptedPin {
        type Error = core::convert::Infallible;
    }

    impl InputPin for ScriptedPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.levels.pop_front().expect("pin script exhausted"))
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.is_high().map(|level| !level)
        }
    }

    #[test]
    fn fires_on_rising_edge_only() {
        let pin = ScriptedPin::new(&[false, true, true, false, true]);
        let mut detector = SoundDetector::new(pin, Duration::ZERO);
        let t0 = Instant::now();

        assert!(!detector.poll(t0).unwrap()); // low
        assert!(detector.poll(t0 + Duration::from_millis(10)).unwrap()); // edge
        assert!(!detector.poll(t0 + Duration::from_millis(20)).unwrap()); // still high
        assert!(!detector.poll(t0 + Duration::from_millis(30)).unwrap()); // fell
        assert!(detector.poll(t0 + Duration::from_millis(40)).unwrap()); // edge again
    }

    #[test]
    fn debounce_swallows_rapid_edges() {
        let pin = ScriptedPin::new(&[true, false, true, false, true]);
        let mut detector = SoundDetector::new(pin, Duration::from_millis(200));
        let t0 = Instant::now();

        assert!(detector.poll(t0).unwrap());
        assert!(!detector.poll(t0 + Duration::from_millis(50)).unwrap());
        // second edge 100 ms after the first: inside the window
        assert!(!detector.poll(t0 + Duration::from_millis(100)).unwrap());
        assert!(!detector.poll(t0 + Duration::from_millis(150)).unwrap());
        // third edge well past the window
        assert!(detector.poll(t0 + Duration::from_millis(400)).unwrap());
    }
}
