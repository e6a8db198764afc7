//! Vent open/close drive on top of the stepper driver.
//!
//! The vent travels between step 0 (closed) and `steps_to_open` (open).
//! Moves run in small chunks with a stop flag checked in between, so a
//! `stop` command over MQTT aborts within one chunk. Positions are
//! clamped to `[0, steps_to_open]`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::payload::{MotorPosition, VentState};

use super::{step_delay, Direction, Error, StepperMotor};

/// Steps driven between stop-flag checks.
const STEP_CHUNK: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Completed,
    Stopped,
}

pub struct VentDrive<P> {
    motor: StepperMotor<P>,
    steps_to_open: u32,
    stop_flag: Arc<AtomicBool>,
}

impl<P: OutputPin> VentDrive<P> {
    /// The vent is assumed fully closed at startup; the stepper has no
    /// position feedback.
    pub fn new(motor: StepperMotor<P>, steps_to_open: u32) -> VentDrive<P> {
        VentDrive {
            motor,
            steps_to_open,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag another thread sets to abort the current move.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn steps_to_open(&self) -> u32 {
        self.steps_to_open
    }

    /// Current position clamped to the vent's travel range.
    pub fn position_steps(&self) -> u32 {
        self.motor.position().clamp(0, self.steps_to_open as i64) as u32
    }

    pub fn percentage(&self) -> f32 {
        if self.steps_to_open == 0 {
            return 0.0;
        }
        self.position_steps() as f32 / self.steps_to_open as f32 * 100.0
    }

    /// Resting state from the current position.
    pub fn state(&self) -> VentState {
        match self.position_steps() {
            0 => VentState::Closed,
            p if p >= self.steps_to_open => VentState::Open,
            _ => VentState::Partial,
        }
    }

    pub fn snapshot(&self, is_moving: bool) -> MotorPosition {
        MotorPosition {
            current_steps: self.position_steps(),
            total_steps: self.steps_to_open,
            percentage: self.percentage(),
            is_moving,
        }
    }

    /// Drive to `target` steps (clamped to the travel range) at `rpm`,
    /// reporting progress after every chunk. Returns early with
    /// [`MoveOutcome::Stopped`] when the stop flag is raised.
    pub fn move_to<D, F>(
        &mut self,
        target: u32,
        rpm: f32,
        delay: &mut D,
        mut progress: F,
    ) -> Result<MoveOutcome, Error<P::Error>>
    where
        D: DelayNs,
        F: FnMut(MotorPosition),
    {
        let target = target.min(self.steps_to_open);
        let pace = step_delay(rpm, self.motor.mode().steps_per_revolution());

        // a stale stop request must not kill the new move
        self.stop_flag.store(false, Ordering::SeqCst);

        loop {
            if self.stop_flag.swap(false, Ordering::SeqCst) {
                self.motor.release()?;
                progress(self.snapshot(false));
                return Ok(MoveOutcome::Stopped);
            }

            let current = self.position_steps();
            if current == target {
                break;
            }

            let (direction, remaining) = if target > current {
                (Direction::Clockwise, target - current)
            } else {
                (Direction::CounterClockwise, current - target)
            };
            self.motor
                .step(remaining.min(STEP_CHUNK), direction, pace, delay)?;
            progress(self.snapshot(true));
        }

        progress(self.snapshot(false));
        Ok(MoveOutcome::Completed)
    }

    /// Release the coils without moving.
    pub fn release(&mut self) -> Result<(), Error<P::Error>> {
        self.motor.release()
    }
}

/// How long a full open (or close) takes at `rpm`, for logging.
pub fn travel_time(steps_to_open: u32, rpm: f32, steps_per_revolution: u32) -> Duration {
    step_delay(rpm, steps_per_revolution) * steps_to_open
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::testing::{rig, NoopDelay};
    use crate::motor::StepMode;

    fn drive(steps_to_open: u32) -> VentDrive<crate::motor::testing::RecordingPin> {
        let (pins, _log) = rig();
        let motor = StepperMotor::new(pins, StepMode::Half).unwrap();
        VentDrive::new(motor, steps_to_open)
    }

    #[test]
    fn opens_fully_from_closed() {
        let mut vent = drive(256);
        assert_eq!(vent.state(), VentState::Closed);

        let outcome = vent
            .move_to(256, 15.0, &mut NoopDelay, |_| {})
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Completed);
        assert_eq!(vent.position_steps(), 256);
        assert_eq!(vent.state(), VentState::Open);
        assert_eq!(vent.percentage(), 100.0);
    }

    #[test]
    fn closes_back_to_zero() {
        let mut vent = drive(256);
        vent.move_to(256, 15.0, &mut NoopDelay, |_| {}).unwrap();
        vent.move_to(0, 15.0, &mut NoopDelay, |_| {}).unwrap();
        assert_eq!(vent.position_steps(), 0);
        assert_eq!(vent.state(), VentState::Closed);
    }

    #[test]
    fn target_clamped_to_travel_range() {
        let mut vent = drive(100);
        vent.move_to(10_000, 15.0, &mut NoopDelay, |_| {}).unwrap();
        assert_eq!(vent.position_steps(), 100);
    }

    #[test]
    fn stop_flag_aborts_mid_move() {
        let mut vent = drive(1000);
        let stop = vent.stop_handle();

        let outcome = vent
            .move_to(1000, 15.0, &mut NoopDelay, |position| {
                // raise stop after the first chunk reports progress
                if position.is_moving {
                    stop.store(true, std::sync::atomic::Ordering::SeqCst);
                }
            })
            .unwrap();

        assert_eq!(outcome, MoveOutcome::Stopped);
        assert!(vent.position_steps() < 1000);
        assert!(vent.position_steps() > 0);
        assert_eq!(vent.state(), VentState::Partial);
    }

    #[test]
    fn progress_reports_clamped_snapshots() {
        let mut vent = drive(128);
        let mut last = None;
        vent.move_to(128, 15.0, &mut NoopDelay, |position| {
            assert!(position.current_steps <= 128);
            last = Some(position);
        })
        .unwrap();

        let last = last.unwrap();
        assert_eq!(last.current_steps, 128);
        assert!(!last.is_moving);
        assert_eq!(last.total_steps, 128);
    }
}
