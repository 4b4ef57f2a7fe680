// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    fs,
    path::{Path, PathBuf},
};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ConfigError;
use crate::{
    audio::{BackendKind, DeviceId},
    pool::DEFAULT_CAPACITY,
    source::{AudioExtensions, DEFAULT_EXTENSIONS},
};

/// Prefix of environment variables that override the settings file.
pub const ENV_PREFIX: &str = "MICBOARD";

const DEFAULT_PROFILES_DIR: &str = "profiles";
pub const DEFAULT_PROFILE: &str = "default";

/// Soundboard settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// The audio backend to play through.
    #[serde(default)]
    backend: BackendKind,

    /// The device that feeds the virtual microphone. Defaults to the system default
    /// output.
    #[serde(default)]
    virtual_device: Option<DeviceId>,

    /// The device the user listens on. Defaults to the system default output.
    #[serde(default)]
    monitor_device: Option<DeviceId>,

    /// Whether hotkeys also play on the monitor.
    #[serde(default)]
    monitor_enabled: bool,

    /// How many clips can overlap on each output.
    #[serde(default = "default_max_concurrent_sounds")]
    max_concurrent_sounds: usize,

    /// Extensions picked when a hotkey is bound to a directory.
    #[serde(default = "default_audio_extensions")]
    audio_extensions: Vec<String>,

    /// Where profiles are kept. Relative paths are relative to the settings file.
    #[serde(default = "default_profiles_dir")]
    profiles_dir: PathBuf,

    /// The profile loaded on startup.
    #[serde(default = "default_profile")]
    profile: String,
}

fn default_max_concurrent_sounds() -> usize {
    DEFAULT_CAPACITY
}

fn default_audio_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

fn default_profiles_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PROFILES_DIR)
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            backend: BackendKind::default(),
            virtual_device: None,
            monitor_device: None,
            monitor_enabled: false,
            max_concurrent_sounds: default_max_concurrent_sounds(),
            audio_extensions: default_audio_extensions(),
            profiles_dir: default_profiles_dir(),
            profile: default_profile(),
        }
    }
}

impl Settings {
    /// Loads settings from the given file, which may be missing, and then applies
    /// `MICBOARD_*` environment overrides.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("audio_extensions"),
            )
            .build()?
            .try_deserialize::<Settings>()?)
    }

    /// Writes the settings back out as YAML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let serialized = serde_yml::to_string(self)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(ConfigError::io(parent))?;
        }
        fs::write(path, serialized).map_err(ConfigError::io(path))?;
        info!(path = ?path, "Saved settings.");
        Ok(())
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn virtual_device(&self) -> Option<&DeviceId> {
        self.virtual_device.as_ref()
    }

    pub fn set_virtual_device(&mut self, device: DeviceId) {
        self.virtual_device = Some(device);
    }

    pub fn monitor_device(&self) -> Option<&DeviceId> {
        self.monitor_device.as_ref()
    }

    pub fn set_monitor_device(&mut self, device: DeviceId) {
        self.monitor_device = Some(device);
    }

    pub fn monitor_enabled(&self) -> bool {
        self.monitor_enabled
    }

    pub fn set_monitor_enabled(&mut self, enabled: bool) {
        self.monitor_enabled = enabled;
    }

    pub fn max_concurrent_sounds(&self) -> usize {
        self.max_concurrent_sounds
    }

    pub fn set_max_concurrent_sounds(&mut self, limit: usize) {
        self.max_concurrent_sounds = limit;
    }

    pub fn audio_extensions(&self) -> AudioExtensions {
        AudioExtensions::new(&self.audio_extensions)
    }

    /// The profiles directory as configured.
    pub fn profiles_dir(&self) -> &Path {
        &self.profiles_dir
    }

    /// The profiles directory, with relative paths resolved against the directory the
    /// settings file lives in.
    pub fn resolve_profiles_dir(&self, settings_path: Option<&Path>) -> PathBuf {
        match settings_path.and_then(Path::parent) {
            Some(base) if self.profiles_dir.is_relative() => base.join(&self.profiles_dir),
            _ => self.profiles_dir.clone(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: impl Into<String>) {
        self.profile = profile.into();
    }
}
