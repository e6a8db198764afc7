//! Sound detector publisher: a debounced rising edge publishes
//! `{"type": "sound", "value": true}`, and a quiet heartbeat goes out
//! every few seconds so the dashboard can tell silence from a dead
//! sensor.

use std::time::Instant;

use anyhow::Context;
use home_edge::config::{self, EdgeConfig};
use home_edge::mq::EdgeBroker;
use home_edge::payload::Reading;
use home_edge::sensors::sound::SoundDetector;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::CdevPin;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "home_edge=debug,sound_sensor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let edge_config = EdgeConfig::from_env()?;
    let broker = EdgeBroker::from_config(&edge_config, "sound")?;
    broker.connect().await?;

    let mut chip = Chip::new(config::GPIO_CHIP).context("open GPIO chip")?;
    let handle = chip
        .get_line(config::SOUND_PIN)?
        .request(LineRequestFlags::INPUT, 0, "sound-sensor")?;
    let pin = CdevPin::new(handle)?;
    let mut detector = SoundDetector::new(pin, config::SOUND_DEBOUNCE);
    tracing::info!(pin = config::SOUND_PIN, "sound detector ready");

    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    std::thread::spawn(move || {
        let mut last_heartbeat = Instant::now();
        loop {
            let now = Instant::now();
            match detector.poll(now) {
                Ok(true) => {
                    tracing::info!("sound detected");
                    if tx.blocking_send(Reading::Sound(true)).is_err() {
                        return;
                    }
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "gpio poll failed"),
            }

            if now.duration_since(last_heartbeat) >= config::SOUND_HEARTBEAT {
                last_heartbeat = now;
                if tx.blocking_send(Reading::Sound(false)).is_err() {
                    return;
                }
            }

            std::thread::sleep(config::SOUND_POLL_INTERVAL);
        }
    });

    let data_topic = edge_config.sensor_data_topic();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(reading) = rx.recv() => {
                if let Err(e) = broker.publish_reading(&data_topic, &reading).await {
                    tracing::error!(error = %e, "publish failed");
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
