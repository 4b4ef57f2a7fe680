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
use std::{fmt, path::Path, time::Duration};

use tracing::{debug, warn};

use crate::audio::{DeviceId, OutputDevice, PlaybackError, Player, PlayerState};

/// One reusable player bound to one output device.
pub struct PlayerHandle {
    /// Creation sequence number within the owning pool.
    id: usize,
    player: Box<dyn Player>,
}

impl PlayerHandle {
    pub(crate) fn new(id: usize, player: Box<dyn Player>) -> PlayerHandle {
        PlayerHandle { id, player }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Starts playing the file on the bound device. A clip that is already playing on
    /// this handle is stopped first. On failure the handle is left idle.
    pub fn start(&self, file: &Path) -> Result<(), PlaybackError> {
        if self.is_playing() {
            debug!(handle = self.id, "Stopping current clip before restart");
            self.player.stop();
        }

        self.player.start(file).map_err(|e| {
            warn!(handle = self.id, file = ?file, err = %e, "Unable to start clip");
            self.player.stop();
            e
        })
    }

    /// Halts playback. Idempotent.
    pub fn stop(&self) {
        self.player.stop();
    }

    pub fn state(&self) -> PlayerState {
        self.player.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayerState::Playing
    }

    /// Time left in the current clip: zero when idle or when the clip length is unknown.
    pub fn remaining_time(&self) -> Duration {
        if !self.is_playing() {
            return Duration::ZERO;
        }
        match self.player.duration() {
            Some(duration) => duration.saturating_sub(self.player.position()),
            None => Duration::ZERO,
        }
    }

    /// Rebinds the handle to a new device. Whatever is playing keeps playing; the new
    /// device is used from the next start.
    pub fn retarget(&self, device: &DeviceId) {
        self.player.set_output(device);
    }

    pub fn device(&self) -> DeviceId {
        self.player.output()
    }

    pub fn available_devices(&self) -> Result<Vec<OutputDevice>, PlaybackError> {
        self.player.available_outputs()
    }
}

impl fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("id", &self.id)
            .field("device", &self.device())
            .field("state", &self.state())
            .finish()
    }
}
