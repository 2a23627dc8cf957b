use std::time::Duration;

use thiserror::Error;

use crate::view::{ViewState, DEFAULT_DPI, DEFAULT_PAGE_GAP_PX};

pub const DEFAULT_SCROLL_STEP_PX: u32 = 100;
pub const DEFAULT_SEQUENCE_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial DPI must be a positive number, got {0}")]
    InvalidDpi(f64),
    #[error("scroll step must be at least one pixel")]
    ZeroScrollStep,
    #[error("key sequence timeout must be longer than zero")]
    ZeroSequenceTimeout,
}

/// Session-wide settings fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub dpi: f64,
    pub page_gap_px: u32,
    pub show_boundaries: bool,
    pub scroll_step_px: u32,
    pub sequence_timeout: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            page_gap_px: DEFAULT_PAGE_GAP_PX,
            show_boundaries: true,
            scroll_step_px: DEFAULT_SCROLL_STEP_PX,
            sequence_timeout: DEFAULT_SEQUENCE_TIMEOUT,
        }
    }
}

impl ViewerConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !self.dpi.is_finite() || self.dpi <= 0.0 {
            return Err(ConfigError::InvalidDpi(self.dpi));
        }
        if self.scroll_step_px == 0 {
            return Err(ConfigError::ZeroScrollStep);
        }
        if self.sequence_timeout.is_zero() {
            return Err(ConfigError::ZeroSequenceTimeout);
        }
        Ok(self)
    }

    pub fn initial_view_state(&self) -> ViewState {
        ViewState {
            dpi: self.dpi,
            page_gap_px: self.page_gap_px,
            show_boundaries: self.show_boundaries,
            ..ViewState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ViewerConfig::default().validate().unwrap();
        let state = config.initial_view_state();
        assert_eq!(state, ViewState::default());
    }

    #[test]
    fn rejects_bad_values() {
        let bad_dpi = ViewerConfig {
            dpi: 0.0,
            ..ViewerConfig::default()
        };
        assert_eq!(bad_dpi.validate(), Err(ConfigError::InvalidDpi(0.0)));

        let no_step = ViewerConfig {
            scroll_step_px: 0,
            ..ViewerConfig::default()
        };
        assert_eq!(no_step.validate(), Err(ConfigError::ZeroScrollStep));

        let no_timeout = ViewerConfig {
            sequence_timeout: Duration::ZERO,
            ..ViewerConfig::default()
        };
        assert_eq!(no_timeout.validate(), Err(ConfigError::ZeroSequenceTimeout));
    }
}
