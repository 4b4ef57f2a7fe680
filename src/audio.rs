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
use std::{fmt, path::Path, str::FromStr, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

pub mod clip;
pub mod cpal;
mod decode;
pub mod error;
pub mod mock;

pub use error::PlaybackError;

/// An output device identifier as reported by the platform audio stack. It is passed
/// through unmodified.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> DeviceId {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        DeviceId::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        DeviceId(id)
    }
}

/// An output device that a player can be bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputDevice {
    display_name: String,
    id: DeviceId,
}

impl OutputDevice {
    pub fn new(display_name: impl Into<String>, id: DeviceId) -> OutputDevice {
        OutputDevice {
            display_name: display_name.into(),
            id,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }
}

impl fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name == self.id.as_str() {
            write!(f, "{}", self.display_name)
        } else {
            write!(f, "{} ({})", self.display_name, self.id)
        }
    }
}

/// The play state of a single player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
}

/// A single native audio player bound to one output device. Implementations must be
/// safe to drive from any thread.
pub trait Player: Send + Sync {
    /// Starts playing the given file on the bound output. Any current playback is
    /// replaced.
    fn start(&self, file: &Path) -> Result<(), PlaybackError>;

    /// Stops playback. Does nothing if idle.
    fn stop(&self);

    /// Returns the current play state. A clip that has run to its end reports idle.
    fn state(&self) -> PlayerState;

    /// The length of the current clip, if known.
    fn duration(&self) -> Option<Duration>;

    /// How far into the current clip playback has progressed.
    fn position(&self) -> Duration;

    /// Binds the player to a new output. Takes effect on the next start.
    fn set_output(&self, device: &DeviceId);

    /// The output this player is bound to.
    fn output(&self) -> DeviceId;

    /// Enumerates the outputs this player could be bound to.
    fn available_outputs(&self) -> Result<Vec<OutputDevice>, PlaybackError>;
}

/// Creates players and reports on the output devices of an audio stack.
pub trait Backend: Send + Sync {
    /// Creates a new idle player bound to the given device.
    fn create_player(&self, device: &DeviceId) -> Box<dyn Player>;

    /// Lists the output devices known to this backend.
    fn output_devices(&self) -> Result<Vec<OutputDevice>, PlaybackError>;

    /// The device players should use when nothing else has been configured.
    fn default_output(&self) -> Result<DeviceId, PlaybackError>;
}

/// Selects which backend drives playback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Cpal,
    Mock,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpal" => Ok(BackendKind::Cpal),
            "mock" => Ok(BackendKind::Mock),
            other => Err(format!("unknown audio backend '{}'", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cpal => f.write_str("cpal"),
            BackendKind::Mock => f.write_str("mock"),
        }
    }
}

/// Gets the backend of the given kind.
pub fn get_backend(kind: BackendKind) -> Arc<dyn Backend> {
    match kind {
        BackendKind::Cpal => Arc::new(cpal::Backend::new()),
        BackendKind::Mock => {
            Arc::new(mock::Backend::new().with_default_duration(mock::DEFAULT_CLIP_DURATION))
        }
    }
}

/// Lists the output devices of the given backend.
pub fn list_devices(kind: BackendKind) -> Result<Vec<OutputDevice>, PlaybackError> {
    get_backend(kind).output_devices()
}
