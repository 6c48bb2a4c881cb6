use std::process::ExitStatus;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::{models, paths::Paths};

mod command;
mod feed;
mod file;

pub use command::CommandCameraImpl;
pub use feed::{CameraFeed, FeedReceiver};
pub use file::FileCameraImpl;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture command is empty")]
    EmptyCommand,
    #[error("capture command failed ({status}): {stderr}")]
    Command { status: ExitStatus, stderr: String },
    #[error("capture produced no data")]
    NoData,
    #[error("camera feed closed")]
    Closed,
}

/// Source of encoded still images
#[async_trait]
pub trait Camera: Send {
    /// Capture one frame, as an encoded image
    async fn get_frame(&mut self) -> Result<Bytes, CameraError>;
}

#[async_trait]
impl Camera for Box<dyn Camera> {
    async fn get_frame(&mut self) -> Result<Bytes, CameraError> {
        (**self).get_frame().await
    }
}

/// Build the camera described by the configuration
pub fn from_config(config: &models::Camera, paths: &Paths) -> Box<dyn Camera> {
    let name: &'static str = config.into();
    debug!(kind = name, "creating camera");

    match config {
        models::Camera::Command(command) => Box::new(CommandCameraImpl::new(command)),
        models::Camera::File(file) => Box::new(FileCameraImpl::new(file, paths)),
    }
}
