use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "altoview";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Transform limits and wheel zoom tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    /// Margin around a fitted image, CSS pixels
    pub fit_padding: f64,
    /// Exponent per wheel pixel; negative so that scrolling down zooms out
    pub zoom_speed: f64,
    /// Fraction of the remaining distance covered per frame
    pub zoom_lerp: f64,
    pub zoom_epsilon: f64,
    /// Pixels per wheel "line" for line-mode wheel deltas
    pub wheel_line_px: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 10.0,
            fit_padding: 8.0,
            zoom_speed: -0.002,
            zoom_lerp: 0.2,
            zoom_epsilon: 0.001,
            wheel_line_px: 16.0,
        }
    }
}

/// Drag and inertia tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Squared pointer travel (px²) beyond which a press becomes a drag
    pub drag_threshold_sq: f64,
    /// Release speed (px/ms) needed to start coasting
    pub min_inertia_speed: f64,
    /// Velocity multiplier applied every frame while coasting
    pub friction: f64,
    /// Nominal frame interval used to integrate inertia, ms
    pub frame_interval_ms: f64,
    /// Speed (px/ms) below which coasting stops
    pub stop_speed: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold_sq: 9.0,
            min_inertia_speed: 0.1,
            friction: 0.92,
            frame_interval_ms: 16.0,
            stop_speed: 0.02,
        }
    }
}

/// Page cache and loader pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached pages; `None` keeps every page for the session
    pub capacity: Option<usize>,
    pub workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: Some(32),
            workers: 4,
        }
    }
}

/// Thumbnail strip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub batch_size: usize,
    pub debounce_ms: u64,
    /// Height of one thumbnail slot, CSS pixels
    pub row_height: f64,
    /// Extra slots kept live above and below the viewport
    pub buffer_rows: usize,
    /// Width thumbnails are resized to by the filesystem fetcher
    pub max_width: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            debounce_ms: 300,
            row_height: 180.0,
            buffer_rows: 2,
            max_width: 150,
        }
    }
}

/// Context reports sent to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_transcription_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_transcription_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub gesture: GestureConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub thumbnails: ThumbnailConfig,

    #[serde(default)]
    pub context: ContextConfig,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            view: ViewConfig::default(),
            gesture: GestureConfig::default(),
            cache: CacheConfig::default(),
            thumbnails: ThumbnailConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

impl Settings {
    /// Load from the user config directory.
    ///
    /// A missing file is created with defaults; an unreadable one is logged
    /// and defaults are used.
    #[must_use]
    pub fn load() -> Self {
        let Some(path) = default_config_path() else {
            warn!("Could not determine config directory, using default settings");
            return Self::default();
        };

        if !path.exists() {
            info!("Settings file not found, creating with defaults at {path:?}");
            let settings = Self::default();
            if let Err(e) = settings.save_to_path(&path) {
                error!("{e}");
            }
            return settings;
        }

        Self::load_from_path(&path).unwrap_or_else(|e| {
            error!("{e}");
            Self::default()
        })
    }

    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Self =
            serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Loaded settings from {path:?}");

        if settings.version < CURRENT_VERSION {
            info!(
                "Migrating settings from v{} to v{}",
                settings.version, CURRENT_VERSION
            );
            settings.version = CURRENT_VERSION;
        }
        settings.sanitize();
        Ok(settings)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Saved settings to {path:?}");
        Ok(())
    }

    /// Repair values that would break the view invariants
    fn sanitize(&mut self) {
        let defaults = ViewConfig::default();
        let view = &mut self.view;
        if !(view.min_scale > 0.0 && view.min_scale <= view.max_scale) {
            warn!(
                "Invalid scale range {}..{}, using defaults",
                view.min_scale, view.max_scale
            );
            view.min_scale = defaults.min_scale;
            view.max_scale = defaults.max_scale;
        }
        if !(view.zoom_lerp > 0.0 && view.zoom_lerp <= 1.0) {
            view.zoom_lerp = defaults.zoom_lerp;
        }
        if !(self.gesture.friction > 0.0 && self.gesture.friction < 1.0) {
            self.gesture.friction = GestureConfig::default().friction;
        }
        if self.thumbnails.batch_size == 0 {
            self.thumbnails.batch_size = ThumbnailConfig::default().batch_size;
        }
        if self.thumbnails.row_height <= 0.0 {
            self.thumbnails.row_height = ThumbnailConfig::default().row_height;
        }
        self.cache.workers = self.cache.workers.max(1);
    }
}
