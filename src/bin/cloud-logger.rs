//! MQTT to Firestore bridge: every reading on the sensor data topic is
//! written to the configured collection. Unparseable payloads are
//! logged and skipped, the stream never stops for one bad message.

use anyhow::Context;
use futures_util::StreamExt;
use home_edge::config::EdgeConfig;
use home_edge::logger::{routes_to_store, FirestoreSink};
use home_edge::mq::EdgeBroker;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "home_edge=debug,cloud_logger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let edge_config = EdgeConfig::from_env()?;
    let project = edge_config
        .firestore_project
        .clone()
        .context("EDGE_FIRESTORE_PROJECT must be set for the cloud logger")?;
    let sink = FirestoreSink::new(
        project,
        edge_config.firestore_api_key.clone(),
        edge_config.firestore_collection.clone(),
    )?;
    tracing::info!(sink = ?sink, "firestore sink ready");

    let mut broker = EdgeBroker::from_config(&edge_config, "logger")?;
    let mut messages = broker.message_stream(64);
    broker.connect().await?;
    broker
        .subscribe(&edge_config.sensor_data_topic(), 1)
        .await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            message = messages.next() => {
                match message {
                    Some(Some(message)) => {
                        if !routes_to_store(message.topic()) {
                            continue;
                        }
                        let payload: serde_json::Value =
                            match serde_json::from_slice(message.payload()) {
                                Ok(payload) => payload,
                                Err(e) => {
                                    tracing::warn!(
                                        error = %e,
                                        topic = message.topic(),
                                        "unparseable payload, skipping"
                                    );
                                    continue;
                                }
                            };
                        if let Err(e) = sink.save_reading(&payload).await {
                            tracing::error!(error = %e, "firestore write failed");
                        }
                    }
                    Some(None) => {
                        tracing::warn!("broker connection lost, waiting for reconnect");
                    }
                    None => break,
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
