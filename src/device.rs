//! LED strip transport

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{self, DeviceConfig};

mod common;

// Device implementation modules

mod dummy;
mod file;
mod ws2801spi;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("format error: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("device has no LEDs")]
    NoLeds,
}

#[async_trait]
trait DeviceImpl: Send {
    /// Commit the given LED colors to the device
    ///
    /// # Panics
    ///
    /// Implementations are allowed to panic if led_data.len() != hardware_led_count. The [Device]
    /// wrapper is responsible for ensuring the given slice is the right size.
    async fn set_led_data(&mut self, led_data: &[models::Color]) -> Result<(), DeviceError>;
}

/// LED strip, written as a whole on every commit
pub struct Device {
    name: String,
    inner: Box<dyn DeviceImpl>,
    led_data: Vec<models::Color>,
    notified_inconsistent_led_data: bool,
}

impl Device {
    fn build_inner(
        config: models::Device,
        led_count: usize,
    ) -> Result<Box<dyn DeviceImpl>, DeviceError> {
        let inner: Box<dyn DeviceImpl> = match config {
            models::Device::Dummy(dummy) => Box::new(dummy::DummyDevice::create(dummy, led_count)?),
            models::Device::File(file) => Box::new(file::FileDevice::create(file, led_count)?),
            models::Device::Ws2801Spi(spi) => {
                Box::new(ws2801spi::Ws2801SpiDevice::create(spi, led_count)?)
            }
        };

        Ok(inner)
    }

    /// Open the device described by `config`
    ///
    /// `zone_count` is the number of LEDs when the configuration does not give one.
    #[instrument(skip(config))]
    pub async fn new(
        name: &str,
        config: models::Device,
        zone_count: usize,
    ) -> Result<Self, DeviceError> {
        let led_count = match config.hardware_led_count() {
            0 => zone_count,
            count => count,
        };

        if led_count == 0 {
            return Err(DeviceError::NoLeds);
        }

        let kind: &'static str = (&config).into();
        debug!(kind, led_count, "creating device");

        let inner = Self::build_inner(config, led_count)?;

        Ok(Self {
            name: name.to_owned(),
            inner,
            led_data: vec![Default::default(); led_count],
            notified_inconsistent_led_data: false,
        })
    }

    pub fn led_count(&self) -> usize {
        self.led_data.len()
    }

    /// Write the full strip state
    ///
    /// Data longer than the strip is truncated, shorter data is padded with black.
    #[instrument(skip(led_data))]
    pub async fn set_led_data(&mut self, led_data: &[models::Color]) -> Result<(), DeviceError> {
        let led_count = led_data.len();
        let hw_led_count = self.led_data.len();

        if led_count == hw_led_count {
            self.led_data.copy_from_slice(led_data);
            self.notified_inconsistent_led_data = false;
        } else if led_count > hw_led_count {
            self.led_data.copy_from_slice(&led_data[..hw_led_count]);

            if !self.notified_inconsistent_led_data {
                self.notified_inconsistent_led_data = true;
                warn!(
                    "too much LED data for device: {} extra",
                    led_count - hw_led_count
                );
            }
        } else {
            self.led_data[..led_count].copy_from_slice(led_data);
            self.led_data[led_count..].fill(Default::default());

            if !self.notified_inconsistent_led_data {
                self.notified_inconsistent_led_data = true;
                warn!(
                    "not enough LED data for device: {} missing",
                    hw_led_count - led_count
                );
            }
        }

        self.inner.set_led_data(&self.led_data).await
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("led_count", &self.led_data.len())
            .finish()
    }
}
