//! Client for the external object-detection service.
//!
//! The detection model runs elsewhere; this just posts a JPEG frame and
//! parses the boxes that come back.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub label: String,
    pub conf: f32,
}

impl Detection {
    /// Center of the box, the point the tracker follows.
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

#[derive(Debug)]
pub struct DetectorClient {
    client: reqwest::Client,
    base_url: String,
}

impl DetectorClient {
    pub fn new(base_url: impl Into<String>) -> Result<DetectorClient, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(DetectorClient {
            client,
            base_url: base_url.into(),
        })
    }

    pub async fn health_check(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Detect people in one JPEG frame.
    #[tracing::instrument(err, skip(self, frame), fields(size = frame.len()))]
    pub async fn detect_people(
        &self,
        frame: Vec<u8>,
        captured_at: &str,
    ) -> Result<Vec<Detection>, Error> {
        let url = format!("{}/v1/detect", self.base_url);

        let form = Form::new()
            .part(
                "frame",
                Part::bytes(frame)
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")?,
            )
            .text("captured_at", captured_at.to_string())
            // only people, matching the tracked class of the original model
            .text("classes", "person");

        let resp = self.client.post(&url).multipart(form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Detector { status, body });
        }

        let parsed: DetectResponse = resp.json().await?;
        Ok(parsed
            .detections
            .into_iter()
            .filter(|d| d.label == "person")
            .collect())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("detector returned {status}: {body}")]
    Detector {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_center() {
        let d = Detection {
            x1: 100.0,
            y1: 200.0,
            x2: 140.0,
            y2: 360.0,
            label: "person".to_string(),
            conf: 0.9,
        };
        assert_eq!(d.center(), (120.0, 280.0));
    }

    #[test]
    fn response_tolerates_missing_detections() {
        let parsed: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.detections.is_empty());
    }
}
