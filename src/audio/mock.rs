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
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::{DeviceId, OutputDevice, PlaybackError, PlayerState};

/// How long an unregistered clip plays for when the backend has a default.
pub const DEFAULT_CLIP_DURATION: Duration = Duration::from_secs(2);

/// The devices a mock backend reports unless told otherwise.
const DEFAULT_DEVICES: [&str; 2] = ["mock-virtual", "mock-monitor"];

/// The length of a registered clip. `Unknown` clips play until stopped.
#[derive(Clone, Copy, Debug)]
enum ClipLength {
    Known(Duration),
    Unknown,
}

/// A record of one successful start.
pub type StartRecord = (DeviceId, PathBuf);

/// A mock backend. Doesn't actually play anything: clips last for their registered
/// duration of wall-clock time and every start is recorded.
#[derive(Clone)]
pub struct Backend {
    clips: Arc<RwLock<HashMap<PathBuf, ClipLength>>>,
    default_duration: Option<Duration>,
    devices: Arc<RwLock<Vec<OutputDevice>>>,
    starts: Arc<Mutex<Vec<StartRecord>>>,
}

impl Backend {
    /// Creates a mock backend with no clips registered. Every start fails until clips
    /// are registered or a default duration is set.
    pub fn new() -> Backend {
        Backend {
            clips: Arc::new(RwLock::new(HashMap::new())),
            default_duration: None,
            devices: Arc::new(RwLock::new(
                DEFAULT_DEVICES
                    .iter()
                    .map(|name| OutputDevice::new(*name, DeviceId::new(*name)))
                    .collect(),
            )),
            starts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replaces the device list.
    pub fn with_devices(self, names: &[&str]) -> Backend {
        *self.devices.write() = names
            .iter()
            .map(|name| OutputDevice::new(*name, DeviceId::new(*name)))
            .collect();
        self
    }

    /// Lets any path play for the given duration.
    pub fn with_default_duration(mut self, duration: Duration) -> Backend {
        self.default_duration = Some(duration);
        self
    }

    pub fn with_clip(self, path: impl Into<PathBuf>, duration: Duration) -> Backend {
        self.register_clip(path, duration);
        self
    }

    /// Registers a clip whose length the player cannot report.
    pub fn with_unknown_length_clip(self, path: impl Into<PathBuf>) -> Backend {
        self.clips.write().insert(path.into(), ClipLength::Unknown);
        self
    }

    pub fn register_clip(&self, path: impl Into<PathBuf>, duration: Duration) {
        self.clips
            .write()
            .insert(path.into(), ClipLength::Known(duration));
    }

    /// Every successful start so far, in order.
    pub fn starts(&self) -> Vec<StartRecord> {
        self.starts.lock().clone()
    }

    /// The files started on the given device, in order.
    pub fn starts_on(&self, device: &str) -> Vec<PathBuf> {
        self.starts
            .lock()
            .iter()
            .filter(|(id, _)| id.as_str() == device)
            .map(|(_, path)| path.clone())
            .collect()
    }

    fn clip_length(&self, file: &Path) -> Option<ClipLength> {
        self.clips
            .read()
            .get(file)
            .copied()
            .or(self.default_duration.map(ClipLength::Known))
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::new()
    }
}

impl super::Backend for Backend {
    fn create_player(&self, device: &DeviceId) -> Box<dyn super::Player> {
        Box::new(Player {
            backend: self.clone(),
            output: Mutex::new(device.clone()),
            current: Mutex::new(None),
        })
    }

    fn output_devices(&self) -> Result<Vec<OutputDevice>, PlaybackError> {
        Ok(self.devices.read().clone())
    }

    fn default_output(&self) -> Result<DeviceId, PlaybackError> {
        self.devices
            .read()
            .first()
            .map(|device| device.id().clone())
            .ok_or_else(|| PlaybackError::DeviceNotFound("default".to_string()))
    }
}

/// The clip a mock player is playing.
struct MockPlayback {
    started: Instant,
    length: ClipLength,
}

impl MockPlayback {
    fn is_finished(&self) -> bool {
        match self.length {
            ClipLength::Known(duration) => self.started.elapsed() >= duration,
            ClipLength::Unknown => false,
        }
    }
}

/// A mock player created by the mock backend.
pub struct Player {
    backend: Backend,
    output: Mutex<DeviceId>,
    current: Mutex<Option<MockPlayback>>,
}

impl super::Player for Player {
    fn start(&self, file: &Path) -> Result<(), PlaybackError> {
        let length = self
            .backend
            .clip_length(file)
            .ok_or_else(|| PlaybackError::unsupported(file, "no mock clip registered"))?;

        let device = self.output.lock().clone();
        info!(device = %device, file = ?file, length = ?length, "Playing clip (mock).");

        *self.current.lock() = Some(MockPlayback {
            started: Instant::now(),
            length,
        });
        self.backend.starts.lock().push((device, file.to_path_buf()));
        Ok(())
    }

    fn stop(&self) {
        if self.current.lock().take().is_some() {
            debug!(device = %self.output.lock(), "Stopped clip (mock).");
        }
    }

    fn state(&self) -> PlayerState {
        match self.current.lock().as_ref() {
            Some(playback) if !playback.is_finished() => PlayerState::Playing,
            _ => PlayerState::Idle,
        }
    }

    fn duration(&self) -> Option<Duration> {
        match self.current.lock().as_ref()?.length {
            ClipLength::Known(duration) => Some(duration),
            ClipLength::Unknown => None,
        }
    }

    fn position(&self) -> Duration {
        match self.current.lock().as_ref() {
            Some(playback) => match playback.length {
                ClipLength::Known(duration) => playback.started.elapsed().min(duration),
                ClipLength::Unknown => playback.started.elapsed(),
            },
            None => Duration::ZERO,
        }
    }

    fn set_output(&self, device: &DeviceId) {
        *self.output.lock() = device.clone();
    }

    fn output(&self) -> DeviceId {
        self.output.lock().clone()
    }

    fn available_outputs(&self) -> Result<Vec<OutputDevice>, PlaybackError> {
        super::Backend::output_devices(&self.backend)
    }
}
