//! Vent motor controller: consumes open/close/stop/status commands from
//! the dashboard and reports position over the status topic.
//!
//! The stepper is driven on a dedicated thread (stepping is blocking,
//! delay-paced GPIO work); the async side owns the broker, forwards
//! commands over a channel and raises the stop flag, which the drive
//! checks between step chunks.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use anyhow::Context;
use futures_util::StreamExt;
use home_edge::config::{self, EdgeConfig};
use home_edge::motor::vent::{travel_time, MoveOutcome, VentDrive};
use home_edge::motor::{StepMode, StepperMotor};
use home_edge::mq::EdgeBroker;
use home_edge::payload::{
    MotorAction, MotorCommand, MotorPosition, MotorSpeed, MotorStatus, VentState,
};
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::{CdevPin, Delay};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often progress is reported while the vent is moving.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

fn status(state: VentState, message: impl Into<String>, position: MotorPosition) -> MotorStatus {
    MotorStatus {
        state,
        message: message.into(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        position: Some(position),
    }
}

fn rpm_for(speed: Option<MotorSpeed>) -> f32 {
    match speed {
        Some(MotorSpeed::Normal) => config::VENT_RPM_NORMAL,
        Some(MotorSpeed::Fast) | None => config::VENT_RPM_FAST,
    }
}

fn motor_thread(
    mut vent: VentDrive<CdevPin>,
    commands: std::sync::mpsc::Receiver<MotorCommand>,
    status_tx: tokio::sync::mpsc::Sender<MotorStatus>,
) {
    let mut delay = Delay;

    while let Ok(command) = commands.recv() {
        match command.action {
            MotorAction::Open | MotorAction::Close => {
                let opening = command.action == MotorAction::Open;
                let target = if opening { vent.steps_to_open() } else { 0 };
                let moving_state = if opening {
                    VentState::Opening
                } else {
                    VentState::Closing
                };
                let verb = if opening { "opening" } else { "closing" };

                let _ = status_tx.blocking_send(status(
                    moving_state,
                    format!("vent {verb}"),
                    vent.snapshot(true),
                ));

                let mut last_report = Instant::now();
                let progress_tx = status_tx.clone();
                let result = vent.move_to(target, rpm_for(command.speed), &mut delay, |position| {
                    if position.is_moving && last_report.elapsed() >= PROGRESS_INTERVAL {
                        last_report = Instant::now();
                        let _ = progress_tx.blocking_send(status(
                            moving_state,
                            format!("vent {verb}"),
                            position,
                        ));
                    }
                });

                let report = match result {
                    Ok(MoveOutcome::Completed) => status(
                        vent.state(),
                        format!("vent {verb} complete"),
                        vent.snapshot(false),
                    ),
                    Ok(MoveOutcome::Stopped) => status(
                        VentState::Stopped,
                        "move stopped by request",
                        vent.snapshot(false),
                    ),
                    Err(e) => {
                        tracing::error!(error = %e, "motor drive failed");
                        status(VentState::Error, e.to_string(), vent.snapshot(false))
                    }
                };
                let _ = status_tx.blocking_send(report);
            }
            MotorAction::Stop => {
                // flag already raised by the async side; reaching here
                // means no move was in flight
                let _ = status_tx.blocking_send(status(
                    vent.state(),
                    "no move in progress",
                    vent.snapshot(false),
                ));
            }
            MotorAction::Status => {
                let _ = status_tx.blocking_send(status(
                    vent.state(),
                    "position report",
                    vent.snapshot(false),
                ));
            }
        }
    }

    let _ = vent.release();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "home_edge=debug,vent_motor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let edge_config = EdgeConfig::from_env()?;

    let mut chip = Chip::new(config::GPIO_CHIP).context("open GPIO chip")?;
    let mut pins = Vec::with_capacity(4);
    for line in config::MOTOR_PINS {
        let handle = chip
            .get_line(line)?
            .request(LineRequestFlags::OUTPUT, 0, "vent-motor")?;
        pins.push(CdevPin::new(handle)?);
    }
    let pins: [CdevPin; 4] = pins
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected four motor pins"))?;

    let motor = StepperMotor::new(pins, StepMode::Half)?;
    let vent = VentDrive::new(motor, edge_config.vent_steps_to_open);
    let stop_flag = vent.stop_handle();
    tracing::info!(
        pins = ?config::MOTOR_PINS,
        steps_to_open = edge_config.vent_steps_to_open,
        full_travel = ?travel_time(
            edge_config.vent_steps_to_open,
            config::VENT_RPM_FAST,
            StepMode::Half.steps_per_revolution(),
        ),
        "stepper initialised in half-step mode"
    );

    let (command_tx, command_rx) = std::sync::mpsc::channel::<MotorCommand>();
    let (status_tx, mut status_rx) = tokio::sync::mpsc::channel::<MotorStatus>(32);
    std::thread::spawn(move || motor_thread(vent, command_rx, status_tx));

    let mut broker = EdgeBroker::from_config(&edge_config, "vent-motor")?;
    let mut messages = broker.message_stream(32);
    broker.connect().await?;
    broker
        .subscribe(&edge_config.motor_control_topic(), 1)
        .await?;

    let status_topic = edge_config.motor_status_topic();
    broker
        .publish_json(
            &status_topic,
            &MotorStatus {
                state: VentState::Closed,
                message: "vent controller ready".to_string(),
                timestamp: chrono::Utc::now().timestamp_millis(),
                position: Some(MotorPosition {
                    current_steps: 0,
                    total_steps: edge_config.vent_steps_to_open,
                    percentage: 0.0,
                    is_moving: false,
                }),
            },
            1,
        )
        .await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            message = messages.next() => {
                match message {
                    Some(Some(message)) => {
                        let command: MotorCommand = match serde_json::from_slice(message.payload()) {
                            Ok(command) => command,
                            Err(e) => {
                                tracing::warn!(error = %e, "unparseable motor command, skipping");
                                continue;
                            }
                        };
                        tracing::info!(action = ?command.action, speed = ?command.speed, "command received");

                        if command.action == MotorAction::Stop {
                            // the motor thread may be mid-move and not
                            // reading its channel; the flag reaches it
                            stop_flag.store(true, Ordering::SeqCst);
                        }
                        if command_tx.send(command).is_err() {
                            anyhow::bail!("motor thread is gone");
                        }
                    }
                    Some(None) => {
                        tracing::warn!("broker connection lost, waiting for reconnect");
                    }
                    None => break,
                }
            }
            Some(report) = status_rx.recv() => {
                if let Err(e) = broker.publish_json(&status_topic, &report, 1).await {
                    tracing::error!(error = %e, "status publish failed");
                }
            }
            _ = &mut shutdown => {
                tracing::info!("interrupted, exiting");
                break;
            }
        }
    }

    Ok(())
}
