//! MPU6050 motion sensor driver.
//!
//! Register-level driver: wake the device, leave accel/gyro on their
//! default ±2 g / ±250 °/s ranges, then burst-read all axes plus the die
//! temperature in one 14-byte transfer.

use embedded_hal::i2c::I2c;

use crate::payload::Axes;

const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_CONFIG: u8 = 0x1A;
const REG_GYRO_CONFIG: u8 = 0x1B;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_ACCEL_XOUT_H: u8 = 0x3B; // start of the 14-byte sensor burst
const REG_WHO_AM_I: u8 = 0x75;
const WHO_AM_I_EXPECTED: u8 = 0x68;

/// LSB/g at ±2 g.
const ACCEL_SCALE_2G: f32 = 16384.0;
/// LSB/(°/s) at ±250 °/s.
const GYRO_SCALE_250: f32 = 131.0;
const STANDARD_GRAVITY: f32 = 9.80665;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// m/s² per axis.
    pub accel: Axes,
    /// rad/s per axis.
    pub gyro: Axes,
    /// Die temperature, °C.
    pub temperature: f32,
}

pub struct Mpu6050<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Mpu6050<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Mpu6050<I2C> {
        Mpu6050 { i2c, address }
    }

    /// Verify WHO_AM_I, wake the device and set the 21 Hz low-pass filter.
    pub fn init(&mut self) -> Result<(), Error<I2C::Error>> {
        let mut who = [0u8; 1];
        self.i2c
            .write_read(self.address, &[REG_WHO_AM_I], &mut who)
            .map_err(Error::I2c)?;
        if who[0] != WHO_AM_I_EXPECTED {
            return Err(Error::UnexpectedDevice(who[0]));
        }

        // clear the SLEEP bit
        self.write_register(REG_PWR_MGMT_1, 0x00)?;
        // DLPF bandwidth 21 Hz
        self.write_register(REG_CONFIG, 0x04)?;
        // default full-scale ranges: ±250 °/s, ±2 g
        self.write_register(REG_GYRO_CONFIG, 0x00)?;
        self.write_register(REG_ACCEL_CONFIG, 0x00)?;

        tracing::info!("MPU6050 initialised (±2g, ±250°/s, DLPF 21Hz)");
        Ok(())
    }

    /// Burst-read all axes and convert to physical units.
    pub fn read(&mut self) -> Result<MotionSample, Error<I2C::Error>> {
        let mut raw = [0u8; 14];
        self.i2c
            .write_read(self.address, &[REG_ACCEL_XOUT_H], &mut raw)
            .map_err(Error::I2c)?;
        Ok(convert(&raw))
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(Error::I2c)
    }
}

fn convert(raw: &[u8; 14]) -> MotionSample {
    let word = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]);

    let accel = Axes {
        x: word(0) as f32 / ACCEL_SCALE_2G * STANDARD_GRAVITY,
        y: word(2) as f32 / ACCEL_SCALE_2G * STANDARD_GRAVITY,
        z: word(4) as f32 / ACCEL_SCALE_2G * STANDARD_GRAVITY,
    };
    // raw[6..8] is the die temperature
    let temperature = word(6) as f32 / 340.0 + 36.53;
    let gyro = Axes {
        x: (word(8) as f32 / GYRO_SCALE_250).to_radians(),
        y: (word(10) as f32 / GYRO_SCALE_250).to_radians(),
        z: (word(12) as f32 / GYRO_SCALE_250).to_radians(),
    };

    MotionSample {
        accel,
        gyro,
        temperature,
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error<E> {
    #[error("i2c transfer failed: {0:?}")]
    I2c(E),

    #[error("WHO_AM_I returned {0:#04x}, not an MPU6050")]
    UnexpectedDevice(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::I2C_ADDR_MPU6050;
    use crate::sensors::testing::ScriptedBus;

    #[test]
    fn converts_gravity_on_z() {
        // accel z = +16384 LSB = 1 g, everything else zero
        let mut raw = [0u8; 14];
        raw[4..6].copy_from_slice(&16384i16.to_be_bytes());
        let sample = convert(&raw);

        assert!((sample.accel.z - STANDARD_GRAVITY).abs() < 1e-3);
        assert_eq!(sample.accel.x, 0.0);
        assert_eq!(sample.gyro.x, 0.0);
    }

    #[test]
    fn converts_negative_gyro_to_radians() {
        // gyro x = -131 LSB = -1 °/s
        let mut raw = [0u8; 14];
        raw[8..10].copy_from_slice(&(-131i16).to_be_bytes());
        let sample = convert(&raw);
        assert!((sample.gyro.x - (-1.0f32).to_radians()).abs() < 1e-5);
    }

    #[test]
    fn converts_die_temperature() {
        // 0 LSB = 36.53 °C per the datasheet formula
        let sample = convert(&[0u8; 14]);
        assert!((sample.temperature - 36.53).abs() < 1e-3);
    }

    #[test]
    fn init_rejects_wrong_who_am_i() {
        let bus = ScriptedBus::with_reads([&[0x42]]);
        let mut sensor = Mpu6050::new(bus, I2C_ADDR_MPU6050);
        assert!(matches!(
            sensor.init(),
            Err(Error::UnexpectedDevice(0x42))
        ));
    }

    #[test]
    fn init_wakes_and_configures() {
        let bus = ScriptedBus::with_reads([&[WHO_AM_I_EXPECTED]]);
        let mut sensor = Mpu6050::new(bus, I2C_ADDR_MPU6050);
        sensor.init().unwrap();

        let writes: Vec<Vec<u8>> = sensor.i2c.writes.iter().map(|(_, w)| w.clone()).collect();
        assert!(writes.contains(&vec![REG_PWR_MGMT_1, 0x00]));
        assert!(writes.contains(&vec![REG_CONFIG, 0x04]));
    }
}
