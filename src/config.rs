use anyhow::{Context, Result};
use directories::ProjectDirs;
use pet_companion::storage::write_atomic;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) fps_cap: u32,
    pub(crate) enable_color: bool,
    pub(crate) log_filter: String,
    /// Where the pet groups live; defaults to `<data dir>/store`.
    pub(crate) store_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 20,
            enable_color: true,
            log_filter: "info".to_string(),
            store_dir: None,
        }
    }
}

pub(crate) struct Paths {
    pub(crate) data_dir: PathBuf,
    pub(crate) settings_path: PathBuf,
    pub(crate) log_path: PathBuf,
}

impl Paths {
    pub(crate) fn store_dir(&self, settings: &Settings) -> PathBuf {
        settings
            .store_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("store"))
    }
}

pub(crate) fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "pet-companion", "PetCompanion")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir)
        .with_context(|| format!("could not create data directory {}", dir.display()))?;
    Ok(Paths {
        settings_path: dir.join("settings.json"),
        log_path: dir.join("pet-companion.log"),
        data_dir: dir,
    })
}

pub(crate) fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        if let Ok(v) = serde_json::from_str::<Settings>(&s) {
            return v;
        }
    }
    Settings::default()
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let data = serde_json::to_vec_pretty(s)?;
    write_atomic(path, &data)
        .with_context(|| format!("could not write settings to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let s: Settings = serde_json::from_str(r#"{"fps_cap": 60}"#).unwrap();
        assert_eq!(s.fps_cap, 60);
        assert!(s.enable_color);
        assert_eq!(s.log_filter, "info");
        assert_eq!(s.store_dir, None);
    }

    #[test]
    fn test_missing_settings_file_gives_defaults() {
        let path = std::env::temp_dir().join("pet-companion-no-such-settings.json");
        assert_eq!(load_settings(&path), Settings::default());
    }

    #[test]
    fn test_store_dir_override() {
        let paths = Paths {
            data_dir: PathBuf::from("/data"),
            settings_path: PathBuf::from("/data/settings.json"),
            log_path: PathBuf::from("/data/pet-companion.log"),
        };
        assert_eq!(
            paths.store_dir(&Settings::default()),
            PathBuf::from("/data/store")
        );
        let custom = Settings {
            store_dir: Some(PathBuf::from("/elsewhere")),
            ..Settings::default()
        };
        assert_eq!(paths.store_dir(&custom), PathBuf::from("/elsewhere"));
    }
}
