use std::{fmt::Write, time::Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::{fs::File, io::AsyncWriteExt};

use super::{common::*, DeviceError};
use crate::models;

pub type FileDevice = Committer<FileDeviceImpl>;

/// Device logging every commit to a file, one `rrggbb` triple per LED in strip order
pub struct FileDeviceImpl {
    leds: Vec<models::Color>,
    print_timestamp: bool,
    output: File,
    last_commit: Instant,
    line: String,
}

/// Format one commit, prefixed with its time and the delay since the previous commit
fn format_line(
    line: &mut String,
    leds: &[models::Color],
    stamp: Option<(DateTime<Utc>, u128)>,
) -> Result<(), std::fmt::Error> {
    line.clear();

    if let Some((now, since_last_ms)) = stamp {
        write!(
            line,
            "{} +{}ms ",
            now.to_rfc3339_opts(SecondsFormat::Millis, true),
            since_last_ms
        )?;
    }

    for (i, led) in leds.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }

        let (r, g, b) = led.into_components();
        write!(line, "{:02x}{:02x}{:02x}", r, g, b)?;
    }

    line.push('\n');
    Ok(())
}

#[async_trait]
impl WritingDevice for FileDeviceImpl {
    type Config = models::File;

    fn new(config: &Self::Config, led_count: usize) -> Result<Self, DeviceError> {
        let output = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.output)?;

        Ok(Self {
            leds: vec![Default::default(); led_count],
            print_timestamp: config.print_time_stamp,
            output: File::from_std(output),
            last_commit: Instant::now(),
            line: String::new(),
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
        let stamp = if self.print_timestamp {
            let since_last = self.last_commit.elapsed().as_millis();
            self.last_commit = Instant::now();
            Some((Utc::now(), since_last))
        } else {
            None
        };

        format_line(&mut self.line, &self.leds, stamp)?;

        self.output.write_all(self.line.as_bytes()).await?;
        self.output.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::Color;

    #[test]
    fn one_triple_per_led() {
        let mut line = String::new();

        format_line(
            &mut line,
            &[Color::new(255, 0, 16), Color::new(1, 2, 3)],
            None,
        )
        .unwrap();
        assert_eq!(line, "ff0010 010203\n");

        format_line(&mut line, &[], None).unwrap();
        assert_eq!(line, "\n");
    }

    #[test]
    fn timestamp_prefix() {
        let mut line = String::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        format_line(&mut line, &[Color::new(0, 0, 0)], Some((now, 40))).unwrap();
        assert_eq!(line, "2024-03-01T12:30:00.000Z +40ms 000000\n");
    }
}
