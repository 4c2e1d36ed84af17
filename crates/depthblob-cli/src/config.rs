//! Detector configuration – reads/writes `~/.depthblob/config.toml`.

use depthblob_hal::sim::{SimBox, SimScene};
use depthblob_perception::transform::SensorPlacement;
use depthblob_runtime::aim::AimPoint;
use depthblob_runtime::pipeline::{PipelineConfig, DEFAULT_CALIBRATION_FRAMES};
use depthblob_types::{CalibrationConfig, DepthSource, DetectionConfig, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Depth sensor section.  Only the simulated sensor is built in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub id: String,
    /// Capture rate.
    pub fps: u32,
    pub scene: SimScene,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            id: "sim-overhead".to_string(),
            fps: 30,
            scene: SimScene {
                empty_frames: DEFAULT_CALIBRATION_FRAMES as u64,
                speckles: vec![[40, 40], [200, 30]],
                boxes: vec![SimBox::new(20, 90, 60, 60, 1500).moving(2, 0)],
                ..SimScene::default()
            },
        }
    }
}

/// Persisted configuration stored in `~/.depthblob/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Frames per background calibration run.
    #[serde(default = "default_calibration_frames")]
    pub calibration_frames: usize,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub sensor: SensorConfig,

    /// Sensor position (cm) and orientation (degrees) in the world.
    #[serde(default = "default_placement")]
    pub placement: SensorPlacement,

    /// World points that face the nearest blob.
    #[serde(default, rename = "aim_point", skip_serializing_if = "Vec::is_empty")]
    pub aim_points: Vec<AimPoint>,
}

fn default_calibration_frames() -> usize {
    DEFAULT_CALIBRATION_FRAMES
}

fn default_placement() -> SensorPlacement {
    SensorPlacement {
        position_cm: Vec3::new(0.0, 0.0, 250.0),
        ..SensorPlacement::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calibration_frames: default_calibration_frames(),
            calibration: CalibrationConfig::default(),
            detection: DetectionConfig::default(),
            sensor: SensorConfig::default(),
            placement: default_placement(),
            aim_points: Vec::new(),
        }
    }
}

impl Config {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            calibration_frames: self.calibration_frames,
            calibration: self.calibration,
            detection: self.detection,
            placement: self.placement,
        }
    }
}

/// Return the path to `~/.depthblob/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".depthblob").join("config.toml")
}

/// Load `path` with `DEPTHBLOB_*` overrides applied; a missing file yields
/// the defaults.
pub fn load(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse the config at `path`.  Returns `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `DEPTHBLOB_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DEPTHBLOB_CALIBRATION_FRAMES` | `calibration_frames` |
/// | `DEPTHBLOB_MIN_BLOB_PIXELS` | `detection.min_blob_pixels` |
/// | `DEPTHBLOB_DEPTH_DELTA_MM` | `detection.depth_delta_mm` |
/// | `DEPTHBLOB_DEPTH_SOURCE` | `detection.depth_source` (`background` / `live_frame`) |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("DEPTHBLOB_CALIBRATION_FRAMES")
        && let Ok(n) = v.trim().parse::<usize>()
    {
        cfg.calibration_frames = n;
    }
    if let Ok(v) = std::env::var("DEPTHBLOB_MIN_BLOB_PIXELS")
        && let Ok(n) = v.trim().parse::<u32>()
    {
        cfg.detection.min_blob_pixels = n;
    }
    if let Ok(v) = std::env::var("DEPTHBLOB_DEPTH_DELTA_MM")
        && let Ok(n) = v.trim().parse::<i32>()
    {
        cfg.detection.depth_delta_mm = n;
    }
    if let Ok(v) = std::env::var("DEPTHBLOB_DEPTH_SOURCE")
        && let Ok(source) = v.parse::<DepthSource>()
    {
        cfg.detection.depth_source = source;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
