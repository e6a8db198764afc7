//! Message queue.
//!
//! Thin wrapper around the paho MQTT async client shared by every edge
//! program. Publishers attach a message id, the device id and the emit
//! timestamp as MQTT v5 user properties; consumers get the raw message
//! stream and do their own routing.

use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use opentelemetry::global::get_text_map_propagator;
use paho_mqtt::async_client::AsyncClient as MqttClient;
use paho_mqtt::{
    AsyncReceiver, ConnectOptionsBuilder, Message as MqttMessage,
    MessageBuilder as MqttMessageBuilder, Properties as MqttProps, Property, PropertyCode,
};
use serde::Serialize;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::EdgeConfig;
use crate::payload::Reading;

/// The broker client used by the edge programs.
pub struct EdgeBroker {
    client: MqttClient,
    device_id: String,
}

impl EdgeBroker {
    pub fn new<T: AsRef<str>>(server_uri: &str, device_id: T) -> Result<EdgeBroker, Error> {
        let client = MqttClient::new(
            paho_mqtt::CreateOptionsBuilder::new()
                .server_uri(server_uri)
                .client_id(device_id.as_ref())
                .finalize(),
        )?;

        Ok(EdgeBroker {
            client,
            device_id: device_id.as_ref().to_string(),
        })
    }

    /// Create the broker client from the shared edge configuration.
    ///
    /// `client_suffix` keeps the client ids of the individual programs
    /// distinct on the broker (they all share one device id).
    pub fn from_config(config: &EdgeConfig, client_suffix: &str) -> Result<EdgeBroker, Error> {
        let client_id = format!("{}-{}", config.device_id, client_suffix);
        let mut broker = EdgeBroker::new(&config.mqtt_server_uri, client_id)?;
        broker.device_id = config.device_id.clone();
        Ok(broker)
    }

    /// Connect to the MQTT broker.
    ///
    /// You must call this method before publishing or subscribing.
    #[tracing::instrument(err)]
    pub async fn connect(&self) -> Result<(), Error> {
        tracing::info!("connect to the MQTT broker");

        let options = ConnectOptionsBuilder::new_v5()
            .keep_alive_interval(Duration::from_secs(60))
            .clean_start(true)
            .automatic_reconnect(Duration::from_secs(1), Duration::from_secs(30))
            .finalize();

        let connection_info = self.client.connect(options).await;
        if let Err(e) = connection_info {
            tracing::error!(error = ?e, "failed to connect to the MQTT broker");
            return Err(e.into());
        }

        tracing::info!(info = ?connection_info, "connected to the MQTT broker");
        Ok(())
    }

    /// Publish one sensor reading on the shared data topic.
    #[tracing::instrument(err, skip(reading), fields(kind = reading.kind()))]
    pub async fn publish_reading(&self, topic: &str, reading: &Reading) -> Result<(), Error> {
        let payload = serde_json::to_vec(reading)?;
        self.publish_payload(topic, payload, "application/json", 0)
            .await
    }

    /// Publish an arbitrary JSON payload (motor status, commands).
    #[tracing::instrument(err, skip(payload))]
    pub async fn publish_json<T: Serialize>(
        &self,
        topic: &str,
        payload: &T,
        qos: i32,
    ) -> Result<(), Error> {
        let payload = serde_json::to_vec(payload)?;
        self.publish_payload(topic, payload, "application/json", qos)
            .await
    }

    /// Publish raw bytes, e.g. a JPEG frame on the image topic.
    #[tracing::instrument(err, skip(payload), fields(size = payload.len()))]
    pub async fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error> {
        self.publish_payload(topic, payload, "image/jpeg", 0).await
    }

    async fn publish_payload(
        &self,
        topic: &str,
        payload: Vec<u8>,
        content_type: &str,
        qos: i32,
    ) -> Result<(), Error> {
        let message_id = uuid::Uuid::now_v7().to_string();
        let emitted_at =
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);

        let mut message_properties = MqttProps::new();
        message_properties.push(Property::new_string(
            PropertyCode::ContentType,
            content_type,
        )?)?;
        message_properties.push(Property::new_string_pair(
            PropertyCode::UserProperty,
            "message_id",
            &message_id,
        )?)?;
        message_properties.push(Property::new_string_pair(
            PropertyCode::UserProperty,
            "device_id",
            &self.device_id,
        )?)?;
        message_properties.push(Property::new_string_pair(
            PropertyCode::UserProperty,
            "emitted_at",
            &emitted_at,
        )?)?;

        // tracing information
        let ctx = tracing::Span::current().context();
        get_text_map_propagator(|propagator| {
            propagator.inject_context(&ctx, &mut MqttCarrierInjector(&mut message_properties))
        });

        let message = MqttMessageBuilder::new()
            .topic(topic)
            .payload(payload)
            .qos(qos)
            .properties(message_properties)
            .finalize();

        tracing::debug!(topic, message_id, "publishing to the MQTT broker");
        self.client.publish(message).await?;

        Ok(())
    }

    /// Subscribe to a topic. Messages arrive on the stream returned by
    /// [`EdgeBroker::message_stream`].
    #[tracing::instrument(err)]
    pub async fn subscribe(&self, topic: &str, qos: i32) -> Result<(), Error> {
        tracing::info!(topic, qos, "subscribing");
        self.client.subscribe(topic, qos).await?;
        Ok(())
    }

    /// The incoming message stream. Call before [`EdgeBroker::connect`] so
    /// no message between connect and first poll is dropped. A `None`
    /// element signals a lost connection (the client reconnects on its
    /// own and the stream resumes).
    pub fn message_stream(&mut self, capacity: usize) -> AsyncReceiver<Option<MqttMessage>> {
        self.client.get_stream(capacity)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Debug for EdgeBroker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeBroker")
            .field("device_id", &self.device_id)
            .finish()
    }
}

pub struct MqttCarrierInjector<'a>(pub &'a mut MqttProps);

impl<'a> opentelemetry::propagation::Injector for MqttCarrierInjector<'a> {
    fn set(&mut self, key: &str, value: String) {
        self.0
            .push_string_pair(PropertyCode::UserProperty, key, &value)
            .expect("cannot push string pair")
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("create MQTT client: {0}")]
    CreateMqttClient(#[from] paho_mqtt::Error),

    #[error("encode payload to JSON: {0}")]
    EncodePayload(#[from] serde_json::Error),
}
