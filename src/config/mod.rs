use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::geometry::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "markview";
const APP_CONFIG_FILE: &str = "config.json";

const DEFAULT_BORDER_COLOR: Color = Color::new(255, 0, 255);
const DEFAULT_BACKGROUND_COLOR: Color = Color::new(255, 255, 255);
const DEFAULT_BACKGROUND_OPACITY: f64 = 0.0;
const DEFAULT_THICKNESS_COEFFICIENT: f64 = 5.0;

/// Optional overrides from `config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    border_color: Option<String>,
    #[serde(default)]
    background_color: Option<String>,
    #[serde(default)]
    background_opacity: Option<f64>,
    #[serde(default)]
    thickness_coefficient: Option<f64>,
}

/// Resolved viewer settings: the seed style for new overlays and the
/// coefficient that keeps stroke width constant in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerConfig {
    pub border_color: Color,
    pub background_color: Color,
    pub background_opacity: f64,
    pub thickness_coefficient: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            border_color: DEFAULT_BORDER_COLOR,
            background_color: DEFAULT_BACKGROUND_COLOR,
            background_opacity: DEFAULT_BACKGROUND_OPACITY,
            thickness_coefficient: DEFAULT_THICKNESS_COEFFICIENT,
        }
    }
}

pub fn load_viewer_config() -> ViewerConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_viewer_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_viewer_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> ViewerConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return ViewerConfig::default(),
    };
    if !path.exists() {
        return ViewerConfig::default();
    }
    let raw = match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            RawConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            RawConfig::default()
        }
    };
    resolve(raw)
}

fn resolve(raw: RawConfig) -> ViewerConfig {
    let defaults = ViewerConfig::default();
    ViewerConfig {
        border_color: resolve_color(raw.border_color, defaults.border_color),
        background_color: resolve_color(raw.background_color, defaults.background_color),
        background_opacity: raw
            .background_opacity
            .map(|opacity| opacity.clamp(0.0, 1.0))
            .unwrap_or(defaults.background_opacity),
        thickness_coefficient: raw
            .thickness_coefficient
            .filter(|coefficient| *coefficient > 0.0)
            .unwrap_or(defaults.thickness_coefficient),
    }
}

fn resolve_color(raw: Option<String>, fallback: Color) -> Color {
    match raw {
        Some(value) => Color::from_hex(&value).unwrap_or_else(|| {
            tracing::warn!(color = %value, "unreadable configured color; using default");
            fallback
        }),
        None => fallback,
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
