use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub stretch: StretchConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Seconds decoded for the quick BPM preview; `<= 0` reads the whole file.
    #[serde(default = "default_preview_seconds")]
    pub preview_seconds: f32,
    #[serde(default = "default_preview_target_rate")]
    pub preview_target_rate: u32,
    #[serde(default = "default_threshold_factor")]
    pub threshold_factor: f32,
    #[serde(default = "default_preview_hop")]
    pub preview_hop: usize,
    /// Hop used to place full-track beats on the timeline.
    #[serde(default = "default_full_track_hop")]
    pub full_track_hop: usize,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct StretchConfig {
    /// Advance phases as if every input were 44.1 kHz.
    #[serde(default)]
    pub legacy_frame_rate: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            preview_seconds: default_preview_seconds(),
            preview_target_rate: default_preview_target_rate(),
            threshold_factor: default_threshold_factor(),
            preview_hop: default_preview_hop(),
            full_track_hop: default_full_track_hop(),
        }
    }
}

fn default_preview_seconds() -> f32 { 30.0 }
fn default_preview_target_rate() -> u32 { 22050 }
fn default_threshold_factor() -> f32 { crate::analysis::DEFAULT_THRESHOLD_FACTOR }
fn default_preview_hop() -> usize { crate::analysis::onset::HOP_SIZE }
fn default_full_track_hop() -> usize { 768 }

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

/// Resolves the config file: `explicit`, then `./beatshift.toml`, then
/// `~/.config/beatshift/config.toml`, then the platform config directory.
pub fn find_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("beatshift.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("beatshift").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("beatshift").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.analysis, AnalysisConfig::default());
        assert!(!config.stretch.legacy_frame_rate);
        assert_eq!(config.analysis.preview_hop, 512);
        assert_eq!(config.analysis.full_track_hop, 768);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            "[analysis]\npreview_seconds = 0.0\n\n[stretch]\nlegacy_frame_rate = true\n",
        )
        .unwrap();
        assert_eq!(config.analysis.preview_seconds, 0.0);
        assert_eq!(config.analysis.preview_target_rate, 22050);
        assert_eq!(config.analysis.threshold_factor, 1.3);
        assert!(config.stretch.legacy_frame_rate);
    }

    #[test]
    fn malformed_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beatshift.toml");
        std::fs::write(&path, "[analysis\npreview_hop = \"x\"").unwrap();
        assert!(load_config(&path).is_none());
        assert!(load_config(&dir.path().join("missing.toml")).is_none());
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/custom.toml");
        assert_eq!(find_config_path(Some(path)), Some(path.to_path_buf()));
    }
}
