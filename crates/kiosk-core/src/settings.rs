use crate::models::MediaKind;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::warn;

fn default_mpv_bin() -> String {
  "mpv".to_string()
}

/// Which entry kinds the manager list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindFilter {
  #[default]
  All,
  Video,
  Image,
}

impl KindFilter {
  pub fn matches(&self, kind: MediaKind) -> bool {
    match self {
      KindFilter::All => true,
      KindFilter::Video => kind == MediaKind::Video,
      KindFilter::Image => kind == MediaKind::Image,
    }
  }

  pub fn next(&self) -> KindFilter {
    match self {
      KindFilter::All => KindFilter::Video,
      KindFilter::Video => KindFilter::Image,
      KindFilter::Image => KindFilter::All,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      KindFilter::All => "All",
      KindFilter::Video => "Video",
      KindFilter::Image => "Image",
    }
  }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct CoreSettings {
  #[serde(default = "default_mpv_bin")]
  pub mpv_bin: String,
  #[serde(default)]
  pub kind_filter: KindFilter,
}

impl Default for CoreSettings {
  fn default() -> Self {
    CoreSettings {
      mpv_bin: default_mpv_bin(),
      kind_filter: KindFilter::All,
    }
  }
}

pub fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("com", "github", "kiosk")
}

pub fn read_settings<T: Default + for<'de> Deserialize<'de>>() -> T {
  let Some(proj_dirs) = project_dirs() else {
    warn!("could not determine config directory, using defaults");
    return T::default();
  };

  let path = proj_dirs.config_dir().join("config.toml");

  match std::fs::read_to_string(&path) {
    Ok(conf) => toml::from_str(&conf).unwrap_or_else(|e| {
      warn!("failed to parse config file: {e}, using defaults");
      T::default()
    }),
    Err(_) => T::default(),
  }
}

pub fn write_settings<T: Serialize>(settings: &T) -> Result<(), String> {
  let proj_dirs = project_dirs().ok_or("Could not determine config directory")?;
  let path = proj_dirs.config_dir();

  std::fs::create_dir_all(path).map_err(|e| format!("Failed to create config directory: {e}"))?;

  let toml = toml::to_string(&settings).map_err(|e| format!("Failed to serialize settings: {e}"))?;

  let mut f = std::fs::OpenOptions::new()
    .create(true)
    .truncate(true)
    .write(true)
    .open(path.join("config.toml"))
    .map_err(|e| format!("Failed to open config file: {e}"))?;

  write!(f, "{}", toml).map_err(|e| format!("Failed to write config file: {e}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_filter_matches() {
    assert!(KindFilter::All.matches(MediaKind::Video));
    assert!(KindFilter::All.matches(MediaKind::Image));
    assert!(KindFilter::Video.matches(MediaKind::Video));
    assert!(!KindFilter::Video.matches(MediaKind::Image));
    assert!(!KindFilter::Image.matches(MediaKind::Video));
  }

  #[test]
  fn kind_filter_cycles() {
    let mut filter = KindFilter::All;
    for _ in 0..3 {
      filter = filter.next();
    }
    assert_eq!(filter, KindFilter::All);
  }

  #[test]
  fn settings_default_when_missing() {
    let settings = CoreSettings::default();
    assert_eq!(settings.mpv_bin, "mpv");
    assert_eq!(settings.kind_filter, KindFilter::All);
  }

  #[test]
  fn settings_round_trip_through_toml() {
    let mut settings = CoreSettings::default();
    settings.kind_filter = KindFilter::Image;
    let text = toml::to_string(&settings).unwrap();
    let back: CoreSettings = toml::from_str(&text).unwrap();
    assert_eq!(back.kind_filter, KindFilter::Image);
    assert_eq!(back.mpv_bin, "mpv");
  }
}
