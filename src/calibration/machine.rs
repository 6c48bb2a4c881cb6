use strum_macros::IntoStaticStr;

use super::CalibrationError;
use crate::models::{CalibrationMapping, Rect, ScreenSpec};

/// Progress of a calibration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum CalibrationState {
    Idle,
    AwaitingSettings,
    GeneratingMarkers,
    StreamingPreview,
    AwaitingUserReady,
    /// Showing the marker of zone `index`, `attempt` starts at 0
    CapturingZone { index: usize, attempt: u32 },
    Complete,
    Failed { index: usize },
}

/// Calibration protocol, without any I/O
///
/// Zones are located one at a time, in zone order. A zone that cannot be located is retried
/// a bounded number of times, after which the whole calibration fails. A mapping can only
/// be extracted from a complete calibration.
#[derive(Debug, Clone)]
pub struct CalibrationMachine {
    state: CalibrationState,
    screen: ScreenSpec,
    max_attempts: u32,
    located: Vec<Option<Rect>>,
}

impl CalibrationMachine {
    pub fn new(retries: u32) -> Self {
        Self {
            state: CalibrationState::Idle,
            screen: ScreenSpec::default(),
            max_attempts: retries + 1,
            located: Vec::new(),
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Zone currently being captured
    pub fn current_zone(&self) -> Option<usize> {
        match self.state {
            CalibrationState::CapturingZone { index, .. } => Some(index),
            _ => None,
        }
    }

    fn invalid(&self, event: &'static str) -> CalibrationError {
        CalibrationError::InvalidTransition {
            from: self.state.into(),
            event,
        }
    }

    fn transition(
        &mut self,
        event: &'static str,
        from: CalibrationState,
        to: CalibrationState,
    ) -> Result<CalibrationState, CalibrationError> {
        if self.state != from {
            return Err(self.invalid(event));
        }

        trace!(from = ?self.state, to = ?to, event, "calibration transition");
        self.state = to;
        Ok(to)
    }

    pub fn begin(&mut self) -> Result<CalibrationState, CalibrationError> {
        self.transition(
            "begin",
            CalibrationState::Idle,
            CalibrationState::AwaitingSettings,
        )
    }

    /// Provide the screen settings, which must all be positive
    pub fn submit_settings(
        &mut self,
        screen: ScreenSpec,
    ) -> Result<CalibrationState, CalibrationError> {
        if self.state != CalibrationState::AwaitingSettings {
            return Err(self.invalid("submit_settings"));
        }

        screen.check()?;

        self.screen = screen;
        self.located = vec![None; screen.zone_count()];
        self.transition(
            "submit_settings",
            CalibrationState::AwaitingSettings,
            CalibrationState::GeneratingMarkers,
        )
    }

    pub fn markers_ready(&mut self) -> Result<CalibrationState, CalibrationError> {
        self.transition(
            "markers_ready",
            CalibrationState::GeneratingMarkers,
            CalibrationState::StreamingPreview,
        )
    }

    pub fn preview_started(&mut self) -> Result<CalibrationState, CalibrationError> {
        self.transition(
            "preview_started",
            CalibrationState::StreamingPreview,
            CalibrationState::AwaitingUserReady,
        )
    }

    pub fn user_ready(&mut self) -> Result<CalibrationState, CalibrationError> {
        self.transition(
            "user_ready",
            CalibrationState::AwaitingUserReady,
            CalibrationState::CapturingZone {
                index: 0,
                attempt: 0,
            },
        )
    }

    /// Record the camera-space rectangle of the current zone and move to the next one
    pub fn zone_located(&mut self, rect: Rect) -> Result<CalibrationState, CalibrationError> {
        let index = self.current_zone().ok_or_else(|| self.invalid("zone_located"))?;
        self.located[index] = Some(rect);

        let next = if index + 1 < self.located.len() {
            CalibrationState::CapturingZone {
                index: index + 1,
                attempt: 0,
            }
        } else {
            CalibrationState::Complete
        };

        self.transition("zone_located", self.state, next)
    }

    /// Record a failed attempt at locating the current zone
    pub fn zone_failed(&mut self) -> Result<CalibrationState, CalibrationError> {
        let next = match self.state {
            CalibrationState::CapturingZone { index, attempt } => {
                if attempt + 1 < self.max_attempts {
                    CalibrationState::CapturingZone {
                        index,
                        attempt: attempt + 1,
                    }
                } else {
                    CalibrationState::Failed { index }
                }
            }
            _ => return Err(self.invalid("zone_failed")),
        };

        self.transition("zone_failed", self.state, next)
    }

    /// Mapping of a complete calibration
    pub fn into_mapping(self) -> Result<CalibrationMapping, CalibrationError> {
        match self.state {
            CalibrationState::Complete => {
                Ok(CalibrationMapping::from_located(self.screen, self.located)?)
            }
            CalibrationState::Failed { index } => Err(CalibrationError::ZoneNotFound {
                index,
                attempts: self.max_attempts,
            }),
            _ => Err(self.invalid("into_mapping")),
        }
    }
}
