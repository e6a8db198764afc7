//! AHT21 temperature/humidity publisher.

use anyhow::Context;
use home_edge::config::{self, EdgeConfig};
use home_edge::mq::EdgeBroker;
use home_edge::payload::Reading;
use home_edge::sensors::aht21::Aht21;
use linux_embedded_hal::{Delay, I2cdev};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "home_edge=debug,air_sensor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let edge_config = EdgeConfig::from_env()?;
    let broker = EdgeBroker::from_config(&edge_config, "air")?;
    broker.connect().await?;

    let i2c = I2cdev::new(config::I2C_BUS).context("open I2C bus")?;
    let mut sensor = Aht21::new(i2c, config::I2C_ADDR_AHT21);
    sensor.init(&mut Delay)?;
    tracing::info!("AHT21 found");

    // sensor IO is blocking, keep it off the runtime
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    std::thread::spawn(move || {
        let mut delay = Delay;
        loop {
            match sensor.measure(&mut delay) {
                Ok(measurement) => {
                    if tx.blocking_send(measurement).is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "AHT21 read failed"),
            }
            std::thread::sleep(config::AIR_PUBLISH_INTERVAL);
        }
    });

    let data_topic = edge_config.sensor_data_topic();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(measurement) = rx.recv() => {
                tracing::info!(
                    temperature = measurement.temperature,
                    humidity = measurement.humidity,
                    "publishing air reading"
                );
                if let Err(e) = broker
                    .publish_reading(&data_topic, &Reading::Temp(measurement.temperature))
                    .await
                {
                    tracing::error!(error = %e, "publish temp failed");
                }
                if let Err(e) = broker
                    .publish_reading(&data_topic, &Reading::Humid(measurement.humidity))
                    .await
                {
                    tracing::error!(error = %e, "publish humid failed");
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
