//! 28BYJ-48 stepper motor driver (ULN2003AN board).
//!
//! Table-driven waveform generator: four GPIO lines are cycled through a
//! phase table to rotate the motor one step at a time. Direction reversal
//! walks the table backwards. The inter-step delay for a target speed is
//! `60 / (rpm * steps_per_revolution)` seconds.
//!
//! The driver is generic over [`OutputPin`] and [`DelayNs`] so the
//! sequencing logic runs under test with mock pins.

pub mod vent;

use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// Half-step sequence, smoother motion and better torque.
pub const HALF_STEP_SEQ: [[bool; 4]; 8] = [
    [true, false, false, false],
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
    [true, false, false, true],
];

/// Full-step sequence, two coils on at a time.
pub const FULL_STEP_SEQ: [[bool; 4]; 4] = [
    [true, false, false, true],
    [true, true, false, false],
    [false, true, true, false],
    [false, false, true, true],
];

/// Wave drive, one coil at a time, lowest power draw.
pub const WAVE_STEP_SEQ: [[bool; 4]; 4] = [
    [true, false, false, false],
    [false, true, false, false],
    [false, false, true, false],
    [false, false, false, true],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Half,
    Full,
    Wave,
}

impl StepMode {
    pub fn sequence(self) -> &'static [[bool; 4]] {
        match self {
            StepMode::Half => &HALF_STEP_SEQ,
            StepMode::Full => &FULL_STEP_SEQ,
            StepMode::Wave => &WAVE_STEP_SEQ,
        }
    }

    /// Steps per output-shaft revolution, gear reduction included.
    pub fn steps_per_revolution(self) -> u32 {
        match self {
            // 2048 * 2 for half-stepping
            StepMode::Half => 4096,
            StepMode::Full | StepMode::Wave => 2048,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

/// Inter-step delay for a rotation speed in RPM.
pub fn step_delay(rpm: f32, steps_per_revolution: u32) -> Duration {
    Duration::from_secs_f32(60.0 / (rpm * steps_per_revolution as f32))
}

/// Steps covering `angle` degrees of output-shaft rotation.
pub fn steps_for_angle(angle: f32, steps_per_revolution: u32) -> u32 {
    ((angle / 360.0) * steps_per_revolution as f32) as u32
}

pub struct StepperMotor<P> {
    pins: [P; 4],
    mode: StepMode,
    phase: usize,
    position: i64,
}

impl<P: OutputPin> StepperMotor<P> {
    /// Take ownership of the four coil pins and de-energize them.
    pub fn new(pins: [P; 4], mode: StepMode) -> Result<StepperMotor<P>, Error<P::Error>> {
        let mut motor = StepperMotor {
            pins,
            mode,
            phase: 0,
            position: 0,
        };
        motor.release()?;
        Ok(motor)
    }

    /// Move by `steps` steps. Coils are released afterwards to save power.
    pub fn step<D: DelayNs>(
        &mut self,
        steps: u32,
        direction: Direction,
        step_delay: Duration,
        delay: &mut D,
    ) -> Result<(), Error<P::Error>> {
        let sequence = self.mode.sequence();
        for _ in 0..steps {
            self.phase = match direction {
                Direction::Clockwise => (self.phase + 1) % sequence.len(),
                Direction::CounterClockwise => {
                    (self.phase + sequence.len() - 1) % sequence.len()
                }
            };
            self.apply(sequence[self.phase])?;
            delay.delay_us(step_delay.as_micros() as u32);
            self.position += match direction {
                Direction::Clockwise => 1,
                Direction::CounterClockwise => -1,
            };
        }
        self.release()
    }

    /// Rotate by `angle` degrees at `rpm`.
    pub fn rotate_angle<D: DelayNs>(
        &mut self,
        angle: f32,
        rpm: f32,
        direction: Direction,
        delay: &mut D,
    ) -> Result<(), Error<P::Error>> {
        let steps_per_rev = self.mode.steps_per_revolution();
        self.step(
            steps_for_angle(angle, steps_per_rev),
            direction,
            step_delay(rpm, steps_per_rev),
            delay,
        )
    }

    /// Rotate by whole (or fractional) revolutions at `rpm`.
    pub fn rotate_revolutions<D: DelayNs>(
        &mut self,
        revolutions: f32,
        rpm: f32,
        direction: Direction,
        delay: &mut D,
    ) -> Result<(), Error<P::Error>> {
        let steps_per_rev = self.mode.steps_per_revolution();
        self.step(
            (revolutions * steps_per_rev as f32) as u32,
            direction,
            step_delay(rpm, steps_per_rev),
            delay,
        )
    }

    /// De-energize all coils.
    pub fn release(&mut self) -> Result<(), Error<P::Error>> {
        self.apply([false; 4])
    }

    /// Net steps moved since startup (clockwise positive).
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn reset_position(&mut self) {
        self.position = 0;
    }

    pub fn mode(&self) -> StepMode {
        self.mode
    }

    fn apply(&mut self, pattern: [bool; 4]) -> Result<(), Error<P::Error>> {
        for (pin, level) in self.pins.iter_mut().zip(pattern) {
            if level {
                pin.set_high().map_err(Error::Gpio)?;
            } else {
                pin.set_low().map_err(Error::Gpio)?;
            }
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error<E> {
    #[error("gpio write failed: {0:?}")]
    Gpio(E),
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every pin write in a shared log so tests can reconstruct
    /// the coil patterns the driver produced.
    pub struct RecordingPin {
        pub index: usize,
        pub log: Rc<RefCell<Vec<(usize, bool)>>>,
    }

    impl embedded_hal::digital::ErrorType for RecordingPin {
        type Error = core::convert::Infallible;
    }

    impl embedded_hal::digital::OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push((self.index, false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push((self.index, true));
            Ok(())
        }
    }

    pub struct NoopDelay;

    impl embedded_hal::delay::DelayNs for NoopDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    pub fn rig() -> (
        [RecordingPin; 4],
        Rc<RefCell<Vec<(usize, bool)>>>,
    ) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let pins = [0, 1, 2, 3].map(|index| RecordingPin {
            index,
            log: log.clone(),
        });
        (pins, log)
    }

    /// Group the write log into the 4-pin patterns the driver applied.
    pub fn patterns(log: &Rc<RefCell<Vec<(usize, bool)>>>) -> Vec<[bool; 4]> {
        log.borrow()
            .chunks(4)
            .map(|chunk| {
                let mut pattern = [false; 4];
                for &(index, level) in chunk {
                    pattern[index] = level;
                }
                pattern
            })
            .collect()
    }
}
