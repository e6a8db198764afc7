//! JSON payload shapes used on the broker.
//!
//! Sensor readings all travel on the shared data topic as
//! `{"type": ..., "value": ...}` so the logger and the dashboard can route
//! on `type` alone. The motor has its own command/status topics.

use serde::{Deserialize, Serialize};

/// One sensor reading. Adjacently tagged so it serializes to the
/// `{"type": "temp", "value": 24.5}` shape every consumer expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Reading {
    /// AHT21 temperature, °C.
    Temp(f32),
    /// AHT21 relative humidity, %RH.
    Humid(f32),
    /// MPU6050 die temperature, °C.
    TempMpu(f32),
    /// MPU6050 acceleration, m/s².
    Accel(Axes),
    /// MPU6050 angular rate, rad/s.
    Gyro(Axes),
    /// Sound detector state: `true` while a noise event is active.
    Sound(bool),
    /// People counted crossing the camera line since startup.
    PeopleCount(u32),
}

impl Reading {
    /// The wire value of the `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Reading::Temp(_) => "temp",
            Reading::Humid(_) => "humid",
            Reading::TempMpu(_) => "temp_mpu",
            Reading::Accel(_) => "accel",
            Reading::Gyro(_) => "gyro",
            Reading::Sound(_) => "sound",
            Reading::PeopleCount(_) => "people_count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Axes {
    /// Round each axis to three decimals before publishing.
    pub fn rounded(self) -> Axes {
        Axes {
            x: round_to(self.x, 3),
            y: round_to(self.y, 3),
            z: round_to(self.z, 3),
        }
    }
}

/// Round `value` to `places` decimal places.
pub fn round_to(value: f32, places: u32) -> f32 {
    let factor = 10f32.powi(places as i32);
    (value * factor).round() / factor
}

/// Command published by the dashboard on the motor control topic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotorCommand {
    pub action: MotorAction,
    #[serde(default)]
    pub speed: Option<MotorSpeed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorAction {
    Open,
    Close,
    Stop,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorSpeed {
    Fast,
    Normal,
}

/// Status report published on the motor status topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotorStatus {
    pub state: VentState,
    pub message: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<MotorPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorPosition {
    pub current_steps: u32,
    pub total_steps: u32,
    pub percentage: f32,
    pub is_moving: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VentState {
    Open,
    Closed,
    Opening,
    Closing,
    Stopped,
    Partial,
    Idle,
    Error,
}
