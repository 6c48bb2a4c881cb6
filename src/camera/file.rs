use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use super::{Camera, CameraError};
use crate::{models::FileCamera, paths::Paths};

/// Camera reading an image file, useful without camera hardware
#[derive(Debug, Clone)]
pub struct FileCameraImpl {
    path: PathBuf,
    interval: Duration,
}

impl FileCameraImpl {
    pub fn new(config: &FileCamera, paths: &Paths) -> Self {
        Self {
            path: paths.resolve_path(&config.path),
            interval: Duration::from_millis(config.interval_ms as _),
        }
    }
}

#[async_trait]
impl Camera for FileCameraImpl {
    async fn get_frame(&mut self) -> Result<Bytes, CameraError> {
        tokio::time::sleep(self.interval).await;

        let data = tokio::fs::read(&self.path).await?;
        if data.is_empty() {
            return Err(CameraError::NoData);
        }

        Ok(data.into())
    }
}
