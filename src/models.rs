use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use ambassador::{delegatable_trait, Delegate};
use serde_derive::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;
use thiserror::Error;
use validator::Validate;

mod geometry;
pub use geometry::*;

mod layouts;
pub use layouts::*;

mod mapping;
pub use mapping::*;

/// Color committed to a LED
pub type Color = palette::rgb::LinSrgb<u8>;
/// Color sampled from a zone of a camera frame
pub type SampledColor = palette::rgb::LinSrgba<u8>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("invalid calibration mapping: {0}")]
    Mapping(#[from] MappingError),
    #[error("missing or invalid screen settings, run `ambicam init` first")]
    NotConfigured,
}

fn default_true() -> bool {
    true
}

/// Dimensions of the screen and number of LEDs along each axis
///
/// A zero field means the screen has not been configured yet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScreenSpec {
    pub width: u32,
    pub height: u32,
    pub leds_x: u32,
    pub leds_y: u32,
}

impl ScreenSpec {
    pub const fn new(width: u32, height: u32, leds_x: u32, leds_y: u32) -> Self {
        Self {
            width,
            height,
            leds_x,
            leds_y,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.width > 0 && self.height > 0 && self.leds_x > 0 && self.leds_y > 0
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ConfigError::NotConfigured)
        }
    }

    /// Number of LED zones around the screen
    pub fn zone_count(&self) -> usize {
        2 * (self.leds_x as usize + self.leds_y as usize)
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CalibrationSettings {
    /// Thickness of the marker zones, in screen pixels
    #[validate(range(min = 1))]
    pub zone_depth: u32,
    /// Brightness above which a camera pixel belongs to the marker
    pub threshold: u8,
    /// Time to wait between showing a marker and capturing it
    pub settle_delay_ms: u32,
    /// Number of extra attempts for a zone before calibration fails
    #[validate(range(max = 10))]
    pub retries: u32,
    /// Thickness of the zones built from screen corners, in camera pixels
    #[validate(range(min = 1))]
    pub inset: u32,
    #[validate(range(min = 1, max = 100))]
    pub marker_quality: u8,
}

impl CalibrationSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms as _)
    }
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            zone_depth: 300,
            threshold: 150,
            settle_delay_ms: 500,
            retries: 1,
            inset: 50,
            marker_quality: 90,
        }
    }
}

/// Fisheye correction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct LensCorrection {
    pub enable: bool,
    #[validate(range(min = 0.))]
    pub strength: f64,
    #[validate(range(min = 0.01, max = 100.))]
    pub zoom: f64,
}

impl Default for LensCorrection {
    fn default() -> Self {
        Self {
            enable: false,
            strength: 0.,
            zoom: 1.,
        }
    }
}

fn default_camera_command() -> Vec<String> {
    [
        "raspistill",
        "-o",
        "-",
        "-e",
        "jpg",
        "--exif",
        "none",
        "-w",
        "640",
        "-h",
        "480",
        "-th",
        "none",
        "-q",
        "20",
        "-t",
        "1",
        "-n",
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect()
}

/// Camera capturing stills through an external command writing an image to stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CommandCamera {
    #[serde(default = "default_camera_command")]
    #[validate(length(min = 1))]
    pub command: Vec<String>,
}

fn default_file_interval() -> u32 {
    100
}

/// Camera returning the current content of an image file on every capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FileCamera {
    pub path: PathBuf,
    /// Time taken by each capture, in milliseconds
    #[serde(default = "default_file_interval")]
    pub interval_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum Camera {
    Command(CommandCamera),
    File(FileCamera),
}

impl Default for Camera {
    fn default() -> Self {
        Self::Command(CommandCamera {
            command: default_camera_command(),
        })
    }
}

impl Validate for Camera {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Camera::Command(camera) => camera.validate(),
            Camera::File(camera) => camera.validate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorOrder {
    Rgb,
    Bgr,
    Rbg,
    Brg,
    Gbr,
    Grb,
}

impl ColorOrder {
    pub fn reorder_from_rgb(&self, color: Color) -> Color {
        let (r, g, b) = color.into_components();

        Color::from_components(match self {
            ColorOrder::Rgb => (r, g, b),
            ColorOrder::Bgr => (b, g, r),
            ColorOrder::Rbg => (r, b, g),
            ColorOrder::Brg => (b, r, g),
            ColorOrder::Gbr => (g, b, r),
            ColorOrder::Grb => (g, r, b),
        })
    }
}

impl Default for ColorOrder {
    fn default() -> Self {
        Self::Rgb
    }
}

#[delegatable_trait]
pub trait DeviceConfig: Sync + Send {
    /// Number of LEDs on the strip, 0 to use one LED per zone
    fn hardware_led_count(&self) -> usize;

    fn latch_time(&self) -> Duration {
        Default::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DummyDeviceMode {
    Text,
    Ansi,
}

impl Default for DummyDeviceMode {
    fn default() -> Self {
        Self::Ansi
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct Dummy {
    pub hardware_led_count: u32,
    pub mode: DummyDeviceMode,
}

impl DeviceConfig for Dummy {
    fn hardware_led_count(&self) -> usize {
        self.hardware_led_count as _
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct File {
    #[serde(default)]
    pub hardware_led_count: u32,
    #[validate(length(min = 1))]
    pub output: String,
    #[serde(default = "default_true")]
    pub print_time_stamp: bool,
}

impl DeviceConfig for File {
    fn hardware_led_count(&self) -> usize {
        self.hardware_led_count as _
    }
}

fn default_spi_output() -> String {
    "/dev/spidev0.0".to_owned()
}

fn default_spi_rate() -> u32 {
    1_000_000
}

fn default_spi_latch_time() -> u32 {
    2
}

fn default_spi_color_order() -> ColorOrder {
    ColorOrder::Rbg
}

/// SPI strip clocking out one RGB triple per LED
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Ws2801Spi {
    #[serde(default)]
    pub hardware_led_count: u32,
    #[serde(default = "default_spi_output")]
    pub output: String,
    #[serde(default = "default_spi_rate")]
    #[validate(range(min = 1000, max = 50_000_000))]
    pub rate: u32,
    #[serde(default = "default_spi_color_order")]
    pub color_order: ColorOrder,
    /// Milliseconds to wait after a transfer so the strip latches the data
    #[serde(default = "default_spi_latch_time")]
    pub latch_time: u32,
}

impl DeviceConfig for Ws2801Spi {
    fn hardware_led_count(&self) -> usize {
        self.hardware_led_count as _
    }

    fn latch_time(&self) -> Duration {
        Duration::from_millis(self.latch_time as _)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr, Delegate)]
#[serde(rename_all = "lowercase", tag = "type")]
#[delegate(DeviceConfig)]
pub enum Device {
    Dummy(Dummy),
    File(File),
    Ws2801Spi(Ws2801Spi),
}

impl Default for Device {
    fn default() -> Self {
        Self::Dummy(Dummy::default())
    }
}

impl Validate for Device {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Device::Dummy(device) => device.validate(),
            Device::File(device) => device.validate(),
            Device::Ws2801Spi(device) => device.validate(),
        }
    }
}

/// Mapping from zone order to the physical wiring of the strip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StripLayout {
    /// The strip runs clockwise from the top-left corner
    pub clockwise: bool,
    /// Index of the first LED, relative to the start of the strip
    pub position: i32,
    pub reverse: bool,
}

impl Default for StripLayout {
    fn default() -> Self {
        Self {
            clockwise: true,
            position: 0,
            reverse: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct Preview {
    pub enable: bool,
    #[validate(range(min = 1024))]
    pub port: u16,
    #[validate(range(min = 1, max = 100))]
    pub quality: u8,
}

impl Default for Preview {
    fn default() -> Self {
        Self {
            enable: true,
            port: 8081,
            quality: 80,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub screen: ScreenSpec,
    #[validate(nested)]
    pub calibration: CalibrationSettings,
    #[validate(nested)]
    pub lens: LensCorrection,
    #[validate(nested)]
    pub camera: Camera,
    #[validate(nested)]
    pub device: Device,
    pub layout: StripLayout,
    #[validate(nested)]
    pub preview: Preview,
}

impl Config {
    /// Load the configuration file, or the defaults if it does not exist yet
    pub async fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let full = match tokio::fs::read_to_string(path).await {
            Ok(full) => full,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(error) => return Err(error.into()),
        };

        let config: Self = toml::from_str(&full)?;
        config.validate()?;

        debug!(path = %path.display(), screen = ?config.screen, "loaded configuration");
        Ok(config)
    }

    pub async fn save_file(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(path, self.to_string()?).await?;
        Ok(())
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_spec_requires_positive_fields() {
        assert!(ScreenSpec::new(640, 480, 2, 1).is_configured());
        assert!(ScreenSpec::new(640, 480, 2, 1).check().is_ok());

        for spec in &[
            ScreenSpec::default(),
            ScreenSpec::new(0, 480, 2, 1),
            ScreenSpec::new(640, 0, 2, 1),
            ScreenSpec::new(640, 480, 0, 1),
            ScreenSpec::new(640, 480, 2, 0),
        ] {
            assert!(matches!(spec.check(), Err(ConfigError::NotConfigured)));
        }

        assert_eq!(ScreenSpec::new(640, 480, 2, 1).zone_count(), 6);
    }

    #[test]
    fn deserialize_config() {
        let config: Config = toml::from_str(
            r#"
            [screen]
            width = 3840
            height = 2160
            ledsX = 31
            ledsY = 17

            [calibration]
            settleDelayMs = 250

            [lens]
            enable = true
            strength = 1.5

            [camera]
            type = "file"
            path = "/tmp/frame.jpg"

            [device]
            type = "ws2801spi"
            colorOrder = "rbg"
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.screen, ScreenSpec::new(3840, 2160, 31, 17));
        assert_eq!(config.calibration.settle_delay(), Duration::from_millis(250));
        assert_eq!(config.calibration.threshold, 150);
        assert_eq!(config.lens.zoom, 1.);
        assert_eq!(
            config.camera,
            Camera::File(FileCamera {
                path: "/tmp/frame.jpg".into(),
                interval_ms: 100,
            })
        );

        match &config.device {
            Device::Ws2801Spi(spi) => {
                assert_eq!(spi.output, "/dev/spidev0.0");
                assert_eq!(spi.rate, 1_000_000);
                assert_eq!(spi.color_order, ColorOrder::Rbg);
                assert_eq!(config.device.latch_time(), Duration::from_millis(2));
            }
            other => panic!("unexpected device {:?}", other),
        }
    }

    #[test]
    fn default_config_is_valid_but_unconfigured() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.screen.is_configured());
        assert_eq!(config.device.hardware_led_count(), 0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        config.calibration.marker_quality = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.camera = Camera::Command(CommandCamera { command: vec![] });
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config {
            screen: ScreenSpec::new(640, 480, 2, 1),
            ..Default::default()
        };

        let text = config.to_string().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn color_order() {
        let c = Color::new(1, 2, 3);
        assert_eq!(ColorOrder::Rgb.reorder_from_rgb(c), Color::new(1, 2, 3));
        assert_eq!(ColorOrder::Rbg.reorder_from_rgb(c), Color::new(1, 3, 2));
        assert_eq!(ColorOrder::Grb.reorder_from_rgb(c), Color::new(2, 1, 3));
    }

    #[tokio::test]
    async fn missing_config_file_loads_defaults() {
        let path = std::env::temp_dir().join("ambicam-missing-config/config.toml");
        let config = Config::load_file(&path).await.unwrap();
        assert_eq!(config, Config::default());
    }
}
