//! Still-frame capture from the Pi camera.
//!
//! Shells out to the camera stack's still-capture command (`rpicam-jpeg`
//! by default) and reads the JPEG back from a temp file. Keeping the
//! capture out-of-process sidesteps holding the camera open between
//! frames.

use std::path::PathBuf;
use std::process::ExitStatus;

use tokio::fs;
use tokio::process::Command;

pub struct StillCamera {
    command: String,
    width: u32,
    height: u32,
    temp_dir: PathBuf,
}

impl StillCamera {
    pub fn new(command: impl Into<String>, width: u32, height: u32) -> StillCamera {
        StillCamera {
            command: command.into(),
            width,
            height,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Capture one JPEG frame.
    #[tracing::instrument(err, skip(self), fields(command = %self.command))]
    pub async fn capture(&self) -> Result<Vec<u8>, Error> {
        let path = self
            .temp_dir
            .join(format!("frame-{}.jpg", uuid::Uuid::now_v7()));

        let output = Command::new(&self.command)
            .arg("--output")
            .arg(&path)
            .arg("--width")
            .arg(self.width.to_string())
            .arg("--height")
            .arg(self.height.to_string())
            // capture immediately, no preview window
            .arg("--timeout")
            .arg("1")
            .arg("--nopreview")
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::CaptureFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let frame = fs::read(&path).await?;
        let _ = fs::remove_file(&path).await;

        if frame.is_empty() {
            return Err(Error::EmptyFrame);
        }

        tracing::debug!(size = frame.len(), "frame captured");
        Ok(frame)
    }
}

impl std::fmt::Debug for StillCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StillCamera")
            .field("command", &self.command)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture command exited with {status}: {stderr}")]
    CaptureFailed { status: ExitStatus, stderr: String },

    #[error("capture produced an empty frame")]
    EmptyFrame,
}
