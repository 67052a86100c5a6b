//! TOML configuration for the control surface.
//!
//! Lives in `~/.config/tiltpad/config.toml`. Every section has defaults, so a
//! partial file is valid and a missing file is created on first start.

use crate::controller::clock::{period_for, DEFAULT_TICK_RATE_HZ};
use crate::controller::joystick::{
    DirectionIds, JoystickMode, DEFAULT_SENSITIVITY, DEFAULT_THRESHOLD,
};
use crate::controller::tilt::{AccelAxis, AxisSelection, Orientation};
use crate::controller::touchpad::Rect;
use crate::controller::Point;
use crate::protocol::InputId;
use crate::transport::Destination;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/tiltpad";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub destination: Destination,
    pub clock: ClockConfig,
    pub joystick: JoystickConfig,
    pub touchpad: TouchpadConfig,
    pub tilt: TiltConfig,
    pub gamepad: GamepadConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ClockConfig {
    pub tick_rate_hz: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct JoystickConfig {
    pub enabled: bool,
    pub mode: JoystickMode,
    pub outer_radius: f32,
    pub stick_radius: f32,
    /// Deflection a digital direction must exceed.
    pub threshold: f32,
    /// Pointer units per tick at full deflection in analog mode.
    pub sensitivity: f32,
    pub center: Point,
    pub directions: DirectionIds,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: JoystickMode::Digital,
            outer_radius: 150.0,
            stick_radius: 60.0,
            threshold: DEFAULT_THRESHOLD,
            sensitivity: DEFAULT_SENSITIVITY,
            center: Point::new(200.0, 200.0),
            directions: DirectionIds::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TouchpadConfig {
    pub enabled: bool,
    pub bounds: Rect,
}

impl Default for TouchpadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bounds: Rect::new(600.0, 250.0, 480.0, 380.0),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TiltOutputConfig {
    #[default]
    Angle,
    Keys {
        threshold_deg: f64,
        left: InputId,
        right: InputId,
    },
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TiltConfig {
    pub enabled: bool,
    pub orientation: Orientation,
    pub landscape: AxisSelection,
    pub portrait: AxisSelection,
    pub output: TiltOutputConfig,
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            orientation: Orientation::Landscape,
            landscape: AxisSelection {
                axis: AccelAxis::Y,
                invert: false,
            },
            portrait: AxisSelection {
                axis: AccelAxis::X,
                invert: false,
            },
            output: TiltOutputConfig::Angle,
        }
    }
}

impl TiltConfig {
    /// Axis used for the configured orientation.
    pub fn axis(&self) -> AxisSelection {
        match self.orientation {
            Orientation::Landscape => self.landscape,
            Orientation::Portrait => self.portrait,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadConfig {
    pub enabled: bool,
    pub deadzone: f32,
    pub poll_interval_us: u64,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            deadzone: 0.05,
            poll_interval_us: 100,
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_default();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        period_for(self.clock.tick_rate_hz).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let joystick = &self.joystick;
        if !(joystick.outer_radius.is_finite() && joystick.outer_radius > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "joystick outer_radius ({}) must be positive",
                joystick.outer_radius
            )));
        }
        if !(joystick.stick_radius >= 0.0 && joystick.stick_radius < joystick.outer_radius) {
            return Err(ConfigError::Invalid(format!(
                "joystick stick_radius ({}) must be in [0, outer_radius ({}))",
                joystick.stick_radius, joystick.outer_radius
            )));
        }
        if !(joystick.threshold > 0.0 && joystick.threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "joystick threshold ({}) must be in (0, 1)",
                joystick.threshold
            )));
        }
        if !(joystick.sensitivity > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "joystick sensitivity ({}) must be positive",
                joystick.sensitivity
            )));
        }
        if let TiltOutputConfig::Keys { threshold_deg, .. } = self.tilt.output {
            if !(threshold_deg > 0.0 && threshold_deg < 90.0) {
                return Err(ConfigError::Invalid(format!(
                    "tilt key threshold ({}) must be in (0, 90)",
                    threshold_deg
                )));
            }
        }
        if !(0.0..1.0).contains(&self.gamepad.deadzone) {
            return Err(ConfigError::Invalid(format!(
                "gamepad deadzone ({}) must be in [0, 1)",
                self.gamepad.deadzone
            )));
        }
        Ok(())
    }

    /// Writes the default configuration if `path` does not exist yet.
    pub async fn ensure_default(path: &Path) -> Result<(), ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if exists {
            debug!("Config file present at {}", path.display());
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let content = Config::default().to_toml_string()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Wrote default config to {}", path.display());
        Ok(())
    }

    /// Reads `path`. A file that does not parse or validate falls back to
    /// defaults with a warning; an unreadable file is an error.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        match Config::from_toml_str(&content) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Falling back to default config: {}", e);
                Ok(Config::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.destination, Destination::new("192.168.1.5", 5000));
        assert_eq!(config.clock.tick_rate_hz, 60.0);
        assert_eq!(config.joystick.threshold, 0.3);
        assert_eq!(config.joystick.sensitivity, 25.0);
    }

    #[test]
    fn default_config_survives_toml() {
        let config = Config::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [destination]
            host = "10.0.0.7"
            port = 6000

            [joystick]
            mode = "analog"
            sensitivity = 40.0

            [tilt]
            orientation = "portrait"

            [tilt.portrait]
            axis = "x"
            invert = true
            "#,
        )
        .unwrap();

        assert_eq!(config.destination, Destination::new("10.0.0.7", 6000));
        assert_eq!(config.joystick.mode, JoystickMode::Analog);
        assert_eq!(config.joystick.sensitivity, 40.0);
        assert_eq!(config.joystick.outer_radius, 150.0);
        assert_eq!(
            config.tilt.axis(),
            AxisSelection {
                axis: AccelAxis::X,
                invert: true
            }
        );
    }

    #[test]
    fn tilt_keys_output() {
        let config = Config::from_toml_str(
            r#"
            [tilt.output]
            kind = "keys"
            threshold_deg = 25.0
            left = "LEFT"
            right = "RIGHT"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.tilt.output,
            TiltOutputConfig::Keys {
                threshold_deg: 25.0,
                left: InputId::Left,
                right: InputId::Right,
            }
        );
    }

    #[test]
    fn rejects_stick_larger_than_base() {
        let err = Config::from_toml_str(
            r#"
            [joystick]
            outer_radius = 50.0
            stick_radius = 60.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_tick_rate() {
        let err = Config::from_toml_str("[clock]\ntick_rate_hz = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_extreme_tick_rates() {
        for rate in ["1e-300", "1e12"] {
            let err = Config::from_toml_str(&format!("[clock]\ntick_rate_hz = {}\n", rate))
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "accepted {}", rate);
        }
    }

    #[test]
    fn rejects_bad_outer_radius() {
        for radius in ["0.0", "-10.0", "inf", "nan"] {
            let err = Config::from_toml_str(&format!(
                "[joystick]\nouter_radius = {}\nstick_radius = 0.0\n",
                radius
            ))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "accepted {}", radius);
        }
    }

    #[tokio::test]
    async fn ensure_default_then_load() {
        let mut path = std::env::temp_dir();
        path.push(format!("tiltpad-config-test-{}", std::process::id()));
        path.push(CONFIG_FILE);
        let _ = tokio::fs::remove_file(&path).await;

        Config::ensure_default(&path).await.unwrap();
        let loaded = Config::load(&path).await.unwrap();
        assert_eq!(loaded, Config::default());

        tokio::fs::write(&path, "[clock]\ntick_rate_hz = -1.0\n")
            .await
            .unwrap();
        Config::ensure_default(&path).await.unwrap();
        assert_eq!(Config::load(&path).await.unwrap(), Config::default());

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
