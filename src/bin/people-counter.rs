//! Camera people counter: captures still frames, sends them to the
//! external detection service, tracks the returned boxes across frames
//! and publishes the running count whenever someone crosses the
//! counting line. Every frame is also forwarded raw on the image topic
//! for the dashboard preview.

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use home_edge::config::{self, EdgeConfig};
use home_edge::mq::EdgeBroker;
use home_edge::payload::Reading;
use home_edge::vision::{CentroidTracker, DetectorClient, LineCounter, StillCamera};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "home_edge=debug,people_counter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let edge_config = EdgeConfig::from_env()?;
    let broker = EdgeBroker::from_config(&edge_config, "people")?;
    broker.connect().await?;

    let camera = StillCamera::new(
        &edge_config.camera_command,
        config::FRAME_WIDTH,
        config::FRAME_HEIGHT,
    );
    let detector =
        DetectorClient::new(&edge_config.detector_url).context("build detector client")?;
    if !detector.health_check().await {
        tracing::warn!(
            url = %edge_config.detector_url,
            "detection service not reachable yet, continuing anyway"
        );
    }

    let mut tracker = CentroidTracker::default();
    let mut counter = LineCounter::new(config::COUNT_LINE_Y);
    let data_topic = edge_config.sensor_data_topic();
    let image_topic = edge_config.sensor_image_topic();

    let mut frames = tokio::time::interval(config::FRAME_INTERVAL);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = frames.tick() => {
                let frame = match camera.capture().await {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, "frame capture failed");
                        continue;
                    }
                };

                if let Err(e) = broker.publish_bytes(&image_topic, frame.clone()).await {
                    tracing::error!(error = %e, "image publish failed");
                }

                let captured_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                let detections = match detector.detect_people(frame, &captured_at).await {
                    Ok(detections) => detections,
                    Err(e) => {
                        tracing::warn!(error = %e, "detection failed, skipping frame");
                        continue;
                    }
                };

                let centers: Vec<(f32, f32)> =
                    detections.iter().map(|d| d.center()).collect();
                let tracks = tracker.update(&centers);
                let crossings = counter.observe(&tracks);
                counter.prune(&tracker);

                if crossings > 0 {
                    tracing::info!(crossings, total = counter.count(), "line crossed");
                    let reading = Reading::PeopleCount(counter.count());
                    if let Err(e) = broker.publish_reading(&data_topic, &reading).await {
                        tracing::error!(error = %e, "count publish failed");
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
