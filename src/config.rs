//! Configuration: environment-driven settings plus the hardware layout of
//! the Pi (GPIO pins, I2C addresses, polling intervals).

use std::time::Duration;

// ---------------------------------------------------------------------------
// GPIO pins (BCM numbering)
// ---------------------------------------------------------------------------
/// ULN2003AN IN1..IN4 driving the 28BYJ-48 stepper.
pub const MOTOR_PINS: [u32; 4] = [5, 6, 12, 16];
/// Sound detector digital out (D0).
pub const SOUND_PIN: u32 = 17;
/// Character device for the GPIO controller.
pub const GPIO_CHIP: &str = "/dev/gpiochip0";

// ---------------------------------------------------------------------------
// I2C bus
// ---------------------------------------------------------------------------
pub const I2C_BUS: &str = "/dev/i2c-1";
pub const I2C_ADDR_AHT21: u8 = 0x38;
pub const I2C_ADDR_MPU6050: u8 = 0x68;

// ---------------------------------------------------------------------------
// Polling intervals
// ---------------------------------------------------------------------------
pub const AIR_PUBLISH_INTERVAL: Duration = Duration::from_secs(5);
pub const MOTION_PUBLISH_INTERVAL: Duration = Duration::from_millis(500);
pub const SOUND_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const SOUND_DEBOUNCE: Duration = Duration::from_millis(200);
pub const SOUND_HEARTBEAT: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Camera / people counter
// ---------------------------------------------------------------------------
pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;
/// Counting line, middle of the 480 px frame.
pub const COUNT_LINE_Y: f32 = 240.0;
/// Pause between capture attempts.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Vent motor
// ---------------------------------------------------------------------------
pub const VENT_RPM_FAST: f32 = 15.0;
pub const VENT_RPM_NORMAL: f32 = 8.0;
/// Steps between fully closed and fully open, half-step mode.
pub const VENT_STEPS_TO_OPEN_DEFAULT: u32 = 4096;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {name} is not a number: {source}")]
    InvalidVar {
        name: &'static str,
        source: std::num::ParseIntError,
    },
}

/// Settings shared by every edge program, read from the environment
/// (`.env` honoured via `dotenvy` in each binary).
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub mqtt_server_uri: String,
    pub device_id: String,
    pub topic_root: String,
    /// Base URL of the external object-detection service.
    pub detector_url: String,
    /// Still-capture command for the Pi camera stack.
    pub camera_command: String,
    pub firestore_project: Option<String>,
    pub firestore_api_key: Option<String>,
    pub firestore_collection: String,
    pub vent_steps_to_open: u32,
}

impl EdgeConfig {
    pub fn from_env() -> Result<EdgeConfig, Error> {
        let mqtt_server_uri = required("EDGE_MQTT_SERVER_URI")?;
        let device_id = required("EDGE_DEVICE_ID")?;
        let topic_root =
            std::env::var("EDGE_TOPIC_ROOT").unwrap_or_else(|_| "home/edge".to_string());
        let detector_url = std::env::var("EDGE_DETECTOR_URL")
            .unwrap_or_else(|_| "http://localhost:8090".to_string());
        let camera_command =
            std::env::var("EDGE_CAMERA_COMMAND").unwrap_or_else(|_| "rpicam-jpeg".to_string());
        let firestore_project = std::env::var("EDGE_FIRESTORE_PROJECT").ok();
        let firestore_api_key = std::env::var("EDGE_FIRESTORE_API_KEY").ok();
        let firestore_collection =
            std::env::var("EDGE_FIRESTORE_COLLECTION").unwrap_or_else(|_| "data".to_string());
        let vent_steps_to_open = match std::env::var("EDGE_VENT_STEPS_TO_OPEN") {
            Ok(raw) => raw.parse().map_err(|source| Error::InvalidVar {
                name: "EDGE_VENT_STEPS_TO_OPEN",
                source,
            })?,
            Err(_) => VENT_STEPS_TO_OPEN_DEFAULT,
        };

        Ok(EdgeConfig {
            mqtt_server_uri,
            device_id,
            topic_root,
            detector_url,
            camera_command,
            firestore_project,
            firestore_api_key,
            firestore_collection,
            vent_steps_to_open,
        })
    }

    pub fn sensor_data_topic(&self) -> String {
        format!("{}/sensor/data", self.topic_root)
    }

    pub fn sensor_image_topic(&self) -> String {
        format!("{}/sensor/image", self.topic_root)
    }

    pub fn motor_control_topic(&self) -> String {
        format!("{}/motor/control", self.topic_root)
    }

    pub fn motor_status_topic(&self) -> String {
        format!("{}/motor/status", self.topic_root)
    }
}

fn required(name: &'static str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| Error::MissingVar(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_root(root: &str) -> EdgeConfig {
        EdgeConfig {
            mqtt_server_uri: "tcp://localhost:1883".to_string(),
            device_id: "pi-test".to_string(),
            topic_root: root.to_string(),
            detector_url: "http://localhost:8090".to_string(),
            camera_command: "rpicam-jpeg".to_string(),
            firestore_project: None,
            firestore_api_key: None,
            firestore_collection: "data".to_string(),
            vent_steps_to_open: VENT_STEPS_TO_OPEN_DEFAULT,
        }
    }

    #[test]
    fn topics_follow_the_root() {
        let config = config_with_root("home/edge");
        assert_eq!(config.sensor_data_topic(), "home/edge/sensor/data");
        assert_eq!(config.sensor_image_topic(), "home/edge/sensor/image");
        assert_eq!(config.motor_control_topic(), "home/edge/motor/control");
        assert_eq!(config.motor_status_topic(), "home/edge/motor/status");
    }
}
