use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use super::{ConfigError, CornerLayout, Corners, LedZone, Rect, ScreenSpec, ToZones};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("expected {expected} zones, found {found}")]
    ZoneCount { expected: usize, found: usize },
    #[error("zone {0} was never located")]
    MissingZone(usize),
    #[error("zone at position {position} has index {index}")]
    IndexMismatch { position: usize, index: usize },
    #[error("mapping was calibrated for {found:?}, but the screen is {expected:?}")]
    ScreenMismatch {
        expected: ScreenSpec,
        found: ScreenSpec,
    },
}

/// Result of a calibration: the camera-space rectangle of every LED zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationMapping {
    pub screen: ScreenSpec,
    pub zones: Vec<LedZone>,
}

impl CalibrationMapping {
    /// Build a mapping from zones in canonical order
    pub fn new(screen: ScreenSpec, zones: Vec<LedZone>) -> Result<Self, MappingError> {
        let mapping = Self { screen, zones };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Build a mapping from the results of locating every zone
    pub fn from_located(screen: ScreenSpec, located: Vec<Option<Rect>>) -> Result<Self, MappingError> {
        let zones = located
            .into_iter()
            .enumerate()
            .map(|(index, rect)| {
                rect.map(|rect| LedZone { index, rect })
                    .ok_or(MappingError::MissingZone(index))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(screen, zones)
    }

    /// Build a mapping from manually entered screen corners
    pub fn from_corners(
        screen: ScreenSpec,
        corners: Corners,
        inset: u32,
    ) -> Result<Self, MappingError> {
        let layout = CornerLayout {
            corners,
            leds_x: screen.leds_x,
            leds_y: screen.leds_y,
            inset,
        };

        Self::new(screen, layout.to_zones())
    }

    fn validate(&self) -> Result<(), MappingError> {
        let expected = self.screen.zone_count();
        if self.zones.len() != expected {
            return Err(MappingError::ZoneCount {
                expected,
                found: self.zones.len(),
            });
        }

        if let Some((position, zone)) = self
            .zones
            .iter()
            .enumerate()
            .find(|(position, zone)| zone.index != *position)
        {
            return Err(MappingError::IndexMismatch {
                position,
                index: zone.index,
            });
        }

        Ok(())
    }

    /// Check that this mapping was computed for the given screen
    pub fn check_screen(&self, screen: &ScreenSpec) -> Result<(), MappingError> {
        if self.screen == *screen {
            Ok(())
        } else {
            Err(MappingError::ScreenMismatch {
                expected: *screen,
                found: self.screen,
            })
        }
    }

    /// Load a mapping file, `None` if no calibration was saved yet
    pub async fn load_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        let full = match tokio::fs::read_to_string(path).await {
            Ok(full) => full,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let mapping: Self = toml::from_str(&full)?;
        mapping.validate()?;
        Ok(Some(mapping))
    }

    pub async fn save_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(path, toml::to_string_pretty(self)?).await?;
        debug!(path = %path.display(), zones = self.zones.len(), "saved calibration mapping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;

    fn screen() -> ScreenSpec {
        ScreenSpec::new(640, 480, 2, 1)
    }

    #[test]
    fn from_located_requires_every_zone() {
        let mut located: Vec<_> = (0..6).map(|i| Some(Rect::new(i, 0, i + 1, 1))).collect();

        let mapping = CalibrationMapping::from_located(screen(), located.clone()).unwrap();
        assert_eq!(mapping.zones.len(), 6);
        assert_eq!(mapping.zones[3].rect, Rect::new(3, 0, 4, 1));

        located[4] = None;
        assert_eq!(
            CalibrationMapping::from_located(screen(), located),
            Err(MappingError::MissingZone(4))
        );
    }

    #[test]
    fn zone_count_must_match_screen() {
        let zones = vec![LedZone {
            index: 0,
            rect: Rect::default(),
        }];

        assert_eq!(
            CalibrationMapping::new(screen(), zones),
            Err(MappingError::ZoneCount {
                expected: 6,
                found: 1
            })
        );
    }

    #[test]
    fn from_corners_builds_all_zones() {
        let corners = Corners {
            top_left: Point::new(10, 10),
            top_right: Point::new(110, 10),
            bottom_right: Point::new(110, 60),
            bottom_left: Point::new(10, 60),
        };

        let mapping = CalibrationMapping::from_corners(screen(), corners, 5).unwrap();
        assert_eq!(mapping.zones.len(), 6);
        assert_eq!(mapping.zones[0].rect, Rect::new(10, 10, 60, 15));
        assert_eq!(mapping.zones[5].rect, Rect::new(105, 10, 110, 60));
        assert!(mapping.check_screen(&screen()).is_ok());
        assert!(mapping
            .check_screen(&ScreenSpec::new(640, 480, 3, 1))
            .is_err());
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = std::env::temp_dir().join(format!("ambicam-mapping-{}", std::process::id()));
        let path = dir.join("mapping.toml");

        assert_eq!(CalibrationMapping::load_file(&path).await.unwrap(), None);

        let located = (0..6).map(|i| Some(Rect::new(i * 10, 5, i * 10 + 8, 20))).collect();
        let mapping = CalibrationMapping::from_located(screen(), located).unwrap();
        mapping.save_file(&path).await.unwrap();

        let loaded = CalibrationMapping::load_file(&path).await.unwrap();
        assert_eq!(loaded, Some(mapping));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
