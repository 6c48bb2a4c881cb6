use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;

use super::{Camera, CameraError};
use crate::models::CommandCamera;

/// Camera running an external capture command that writes a still image to stdout
#[derive(Debug, Clone)]
pub struct CommandCameraImpl {
    command: Vec<String>,
}

impl CommandCameraImpl {
    pub fn new(config: &CommandCamera) -> Self {
        Self {
            command: config.command.clone(),
        }
    }
}

#[async_trait]
impl Camera for CommandCameraImpl {
    async fn get_frame(&mut self) -> Result<Bytes, CameraError> {
        let (program, args) = self.command.split_first().ok_or(CameraError::EmptyCommand)?;

        trace!(command = ?self.command, "capturing frame");

        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(CameraError::Command {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        if output.stdout.is_empty() {
            return Err(CameraError::NoData);
        }

        Ok(output.stdout.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(command: &[&str]) -> CommandCameraImpl {
        CommandCameraImpl::new(&CommandCamera {
            command: command.iter().map(|s| (*s).to_owned()).collect(),
        })
    }

    #[tokio::test]
    async fn captures_stdout() {
        let frame = camera(&["printf", "frame"]).get_frame().await.unwrap();
        assert_eq!(&frame[..], b"frame");
    }

    #[tokio::test]
    async fn failing_command_is_an_error() {
        assert!(matches!(
            camera(&["false"]).get_frame().await,
            Err(CameraError::Command { .. })
        ));
    }

    #[tokio::test]
    async fn empty_output_is_an_error() {
        assert!(matches!(
            camera(&["true"]).get_frame().await,
            Err(CameraError::NoData)
        ));
        assert!(matches!(
            camera(&[]).get_frame().await,
            Err(CameraError::EmptyCommand)
        ));
    }
}
