use std::fmt::Write;

use async_trait::async_trait;

use super::{common::*, DeviceError};
use crate::models;

pub type DummyDevice = Committer<DummyDeviceImpl>;

pub struct DummyDeviceImpl {
    leds: Vec<models::Color>,
    mode: models::DummyDeviceMode,
    ansi_buf: String,
}

impl DummyDeviceImpl {
    fn format_ansi(&mut self) -> Result<(), DeviceError> {
        self.ansi_buf.clear();

        for led in self.leds.iter() {
            write!(
                &mut self.ansi_buf,
                "\x1B[38;2;{red};{green};{blue}m█",
                red = led.red,
                green = led.green,
                blue = led.blue
            )?;
        }

        // Reset
        write!(&mut self.ansi_buf, "\x1B[0m")?;
        Ok(())
    }
}

#[async_trait]
impl WritingDevice for DummyDeviceImpl {
    type Config = models::Dummy;

    fn new(config: &Self::Config, led_count: usize) -> Result<Self, DeviceError> {
        Ok(Self {
            leds: vec![Default::default(); led_count],
            mode: config.mode,
            ansi_buf: String::new(),
        })
    }

    async fn set_led_data(
        &mut self,
        _config: &Self::Config,
        led_data: &[models::Color],
    ) -> Result<(), DeviceError> {
        self.leds.copy_from_slice(led_data);
        Ok(())
    }

    async fn write(&mut self) -> Result<(), DeviceError> {
        match self.mode {
            models::DummyDeviceMode::Text => {
                for (i, led) in self.leds.iter().enumerate() {
                    info!(
                        led = %format_args!("{:3}", i),
                        red = %format_args!("{:3}", led.red),
                        green = %format_args!("{:3}", led.green),
                        blue = %format_args!("{:3}", led.blue),
                    );
                }
            }

            models::DummyDeviceMode::Ansi => {
                self.format_ansi()?;
                info!("{}", &self.ansi_buf);
            }
        }

        Ok(())
    }
}
