use async_trait::async_trait;

use super::{DeviceError, DeviceImpl};
use crate::models::{self, DeviceConfig};

#[async_trait]
pub trait WritingDevice: Send + Sized {
    type Config: DeviceConfig;

    fn new(config: &Self::Config, led_count: usize) -> Result<Self, DeviceError>;

    async fn set_led_data(
        &mut self,
        config: &Self::Config,
        led_data: &[models::Color],
    ) -> Result<(), DeviceError>;

    async fn write(&mut self) -> Result<(), DeviceError>;
}

/// Device that writes every update immediately, then waits for the strip to latch
pub struct Committer<D: WritingDevice> {
    inner: D,
    config: D::Config,
}

impl<D: WritingDevice> Committer<D> {
    pub fn create(config: D::Config, led_count: usize) -> Result<Self, DeviceError> {
        Ok(Self {
            inner: D::new(&config, led_count)?,
            config,
        })
    }
}

#[async_trait]
impl<D: WritingDevice> DeviceImpl for Committer<D> {
    async fn set_led_data(&mut self, led_data: &[models::Color]) -> Result<(), DeviceError> {
        self.inner.set_led_data(&self.config, led_data).await?;
        self.inner.write().await?;

        let latch_time = self.config.latch_time();
        if !latch_time.is_zero() {
            tokio::time::sleep(latch_time).await;
        }

        Ok(())
    }
}
