use async_trait::async_trait;
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};

use super::{common::*, DeviceError};
use crate::models;

pub type Ws2801SpiDevice = Committer<Ws2801SpiImpl>;

/// Clocked strip taking one byte per channel, no framing
pub struct Ws2801SpiImpl {
    dev: ImplState,
    buf: Vec<u8>,
}

const SPI_BYTES_PER_LED: usize = 3;

enum ImplState {
    Pending(models::Ws2801Spi),
    Ready(Spidev),
}

impl ImplState {
    fn try_init(&mut self) -> Result<&Spidev, DeviceError> {
        if let ImplState::Pending(config) = self {
            let mut dev = Spidev::open(&config.output)?;
            let options = SpidevOptions::new()
                .bits_per_word(8)
                .max_speed_hz(config.rate as _)
                .mode(SpiModeFlags::SPI_MODE_0)
                .build();
            dev.configure(&options)?;

            info!(path = %config.output, "initialized SPI device");
            *self = ImplState::Ready(dev);
        }

        match self {
            ImplState::Ready(dev) => Ok(dev),
            ImplState::Pending(_) => Err(DeviceError::Io(std::io::ErrorKind::NotConnected.into())),
        }
    }
}

fn encode_leds(config: &models::Ws2801Spi, led_data: &[models::Color], buf: &mut [u8]) {
    for (led, dst) in led_data.iter().zip(buf.chunks_exact_mut(SPI_BYTES_PER_LED)) {
        let (a, b, c) = config.color_order.reorder_from_rgb(*led).into_components();
        dst.copy_from_slice(&[a, b, c]);
    }
}

#[async_trait]
impl WritingDevice for Ws2801SpiImpl {
    type Config = models::Ws2801Spi;

    fn new(config: &Self::Config, led_count: usize) -> Result<Self, DeviceError> {
        let mut dev = ImplState::Pending(config.clone());

        // Try to open the device early
        if let Err(error) = dev.try_init() {
            warn!(%error, path = %config.output, "failed to initialize SPI device, will try again later");
        }

        Ok(Self {
            dev,
            buf: vec![0; led_count * SPI_BYTES_PER_LED],
        })
    }

    async fn set_led_data(
        &mut self,
        config: &Self::Config,
        led_data: &[models::Color],
    ) -> Result<(), DeviceError> {
        encode_leds(config, led_data, &mut self.buf);
        Ok(())
    }

    async fn write(&mut self) -> Result<(), DeviceError> {
        let dev = self.dev.try_init()?;
        let mut transfer = SpidevTransfer::write(&self.buf);
        dev.transfer(&mut transfer)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Color, ColorOrder};

    fn config(color_order: ColorOrder) -> models::Ws2801Spi {
        models::Ws2801Spi {
            hardware_led_count: 2,
            output: "/dev/null".to_owned(),
            rate: 1_000_000,
            color_order,
            latch_time: 2,
        }
    }

    #[test]
    fn one_triple_per_led() {
        let leds = [Color::new(1, 2, 3), Color::new(4, 5, 6)];
        let mut buf = [0u8; 6];

        encode_leds(&config(ColorOrder::Rgb), &leds, &mut buf);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);

        encode_leds(&config(ColorOrder::Rbg), &leds, &mut buf);
        assert_eq!(buf, [1, 3, 2, 4, 6, 5]);
    }

    #[tokio::test]
    async fn missing_device_fails_writes() {
        let config = models::Ws2801Spi {
            output: "/nonexistent/spidev0.0".to_owned(),
            ..config(ColorOrder::Rgb)
        };

        let mut device = Ws2801SpiImpl::new(&config, 2).unwrap();
        device
            .set_led_data(&config, &[Color::new(1, 2, 3), Color::new(4, 5, 6)])
            .await
            .unwrap();

        assert!(device.write().await.is_err());
    }
}
