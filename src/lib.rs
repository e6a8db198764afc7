//! # Home Edge
//!
//! Home Edge is a set of edge programs running on a Raspberry Pi for a
//! small home-automation setup: environment sensors (AHT21, MPU6050, a
//! digital sound detector), a 28BYJ-48 stepper motor driving a vent
//! open/close mechanism, a camera-based people counter, and a logger that
//! persists readings to a cloud document store.
//!
//! Every program talks over MQTT using the JSON shapes in [`payload`] and
//! the broker client in [`mq`]. Each binary under `src/bin/` is one
//! standalone program: bring up one piece of hardware (or one remote
//! model), loop, publish or consume messages, exit on interrupt.

pub mod config;
pub mod logger;
pub mod motor;
pub mod mq;
pub mod payload;
pub mod sensors;
pub mod supervisor;
pub mod vision;
