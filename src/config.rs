use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::analysis::{WindowKind, DEFAULT_SCALE_FACTOR};
use crate::spectrogram::ramp::{ColorRamp, RampError, RampPoint};
use crate::view::viewport::{DEFAULT_PRESET_SCALE, DEFAULT_ZOOM_FACTOR};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub spectrum: SpectrumConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_period_size")]
    pub period_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct SpectrumConfig {
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f32,
    #[serde(default)]
    pub window: WindowKind,
    /// `[threshold, r, g, b]` control points
    #[serde(default)]
    pub ramp: Option<Vec<[f32; 4]>>,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_history")]
    pub history: usize,
    #[serde(default = "default_grid_step")]
    pub grid_step_hz: f64,
    #[serde(default)]
    pub font: Option<PathBuf>,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

#[derive(Debug, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_zoom_factor")]
    pub zoom_factor: f32,
    #[serde(default = "default_preset_scale")]
    pub preset_scale: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            period_size: default_period_size(),
        }
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            scale_factor: default_scale_factor(),
            window: WindowKind::default(),
            ramp: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            history: default_history(),
            grid_step_hz: default_grid_step(),
            font: None,
            font_size: default_font_size(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom_factor: default_zoom_factor(),
            preset_scale: default_preset_scale(),
        }
    }
}

impl SpectrumConfig {
    /// Configured ramp, or the built-in one.
    pub fn color_ramp(&self) -> Result<ColorRamp, RampError> {
        match &self.ramp {
            Some(points) => ColorRamp::new(points.iter().copied().map(RampPoint::from).collect()),
            None => Ok(ColorRamp::default()),
        }
    }
}

pub fn default_sample_rate() -> u32 { 44_100 }
pub fn default_buffer_size() -> usize { 2048 }
pub fn default_period_size() -> u32 { 1024 }
fn default_scale_factor() -> f32 { DEFAULT_SCALE_FACTOR }
pub fn default_width() -> u32 { 1024 }
pub fn default_height() -> u32 { 600 }
pub fn default_history() -> usize { 512 }
fn default_grid_step() -> f64 { 1000.0 }
fn default_font_size() -> f32 { 14.0 }
fn default_zoom_factor() -> f32 { DEFAULT_ZOOM_FACTOR }
fn default_preset_scale() -> f32 { DEFAULT_PRESET_SCALE }

/// Explicit path, `./spectroscope.toml`, then the user config dirs.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("spectroscope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("spectroscope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("spectroscope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.buffer_size, 2048);
        assert_eq!(config.display.history, 512);
        assert_eq!(config.spectrum.window, WindowKind::Rectangular);
        assert!(config.spectrum.ramp.is_none());
        assert!(config.spectrum.color_ramp().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [audio]
            device = "hw:1"
            buffer_size = 4096

            [spectrum]
            window = "hann"
            ramp = [[0.0, 0.0, 0.0, 0.0], [1.0, 0.0, 1.0, 0.0]]

            [view]
            zoom_factor = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.device.as_deref(), Some("hw:1"));
        assert_eq!(config.audio.buffer_size, 4096);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.spectrum.window, WindowKind::Hann);
        assert_eq!(config.spectrum.color_ramp().unwrap().rgb8(1.0), [0, 255, 0]);
        assert_eq!(config.view.zoom_factor, 2.0);
        assert_eq!(config.view.preset_scale, DEFAULT_PRESET_SCALE);
    }

    #[test]
    fn test_invalid_ramp_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            [spectrum]
            ramp = [[0.5, 0.0, 0.0, 0.0], [1.0, 1.0, 1.0, 1.0]]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.spectrum.color_ramp(),
            Err(RampError::DoesNotSpanUnit(..))
        ));
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let path = Path::new("/nonexistent/spectroscope.toml");
        assert_eq!(find_config(Some(path)).as_deref(), Some(path));
        assert!(load_config(path).is_none());
    }
}
