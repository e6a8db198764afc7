//! MPU6050 motion publisher: acceleration, angular rate and die
//! temperature every 500 ms.

use anyhow::Context;
use home_edge::config::{self, EdgeConfig};
use home_edge::mq::EdgeBroker;
use home_edge::payload::{round_to, Reading};
use home_edge::sensors::mpu6050::Mpu6050;
use linux_embedded_hal::I2cdev;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "home_edge=debug,motion_sensor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let edge_config = EdgeConfig::from_env()?;
    let broker = EdgeBroker::from_config(&edge_config, "motion")?;
    broker.connect().await?;

    let i2c = I2cdev::new(config::I2C_BUS).context("open I2C bus")?;
    let mut sensor = Mpu6050::new(i2c, config::I2C_ADDR_MPU6050);
    sensor.init()?;
    tracing::info!("MPU6050 found");

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    std::thread::spawn(move || loop {
        match sensor.read() {
            Ok(sample) => {
                if tx.blocking_send(sample).is_err() {
                    return;
                }
            }
            Err(e) => tracing::warn!(error = %e, "MPU6050 read failed"),
        }
        std::thread::sleep(config::MOTION_PUBLISH_INTERVAL);
    });

    let data_topic = edge_config.sensor_data_topic();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(sample) = rx.recv() => {
                let readings = [
                    Reading::TempMpu(round_to(sample.temperature, 2)),
                    Reading::Accel(sample.accel.rounded()),
                    Reading::Gyro(sample.gyro.rounded()),
                ];
                for reading in &readings {
                    if let Err(e) = broker.publish_reading(&data_topic, reading).await {
                        tracing::error!(error = %e, kind = reading.kind(), "publish failed");
                    }
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
