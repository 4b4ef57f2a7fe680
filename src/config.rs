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
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use crate::audio;
use crate::controller::{keyboard, Controller};
use crate::soundboard::Soundboard;

mod error;
pub mod profile;
mod settings;

pub use error::ConfigError;
pub use profile::ProfileStore;
pub use settings::{Settings, DEFAULT_PROFILE, ENV_PREFIX};

/// Loads a soundboard from the given settings file with the console hotkey listener.
pub fn load_soundboard(settings_path: &Path) -> Result<Soundboard, ConfigError> {
    let settings = Settings::load(settings_path)?;
    let backend = audio::get_backend(settings.backend());
    Soundboard::new(
        settings,
        Some(settings_path.to_path_buf()),
        backend,
        Arc::new(keyboard::Listener::new()),
    )
}

/// Initializes the soundboard and the controller that feeds it hotkeys. The controller
/// can be waited on until the listener closes.
pub fn init_soundboard_and_controller(
    settings_path: &Path,
    profile: Option<&str>,
) -> Result<(Arc<Soundboard>, Controller), Box<dyn Error>> {
    let soundboard = Arc::new(load_soundboard(settings_path)?);
    if let Some(profile) = profile {
        soundboard.load_profile(profile)?;
    }
    let controller = Controller::new(soundboard.table().clone());
    Ok((soundboard, controller))
}
