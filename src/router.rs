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
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{info, span, warn, Level};

use crate::{
    audio::{Backend, DeviceId},
    pool::{check_capacity, ConfigurationError, DevicePool, PlayerHandle, PoolError},
    source::{AudioExtensions, SoundSource, SourceError},
};

/// What happened on one of the two outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LegOutcome {
    /// Playing on the handle with this id.
    Started(usize),
    /// The output was asked to play but could not.
    Failed(String),
    /// The output was not asked to play.
    Skipped,
}

impl LegOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, LegOutcome::Started(_))
    }
}

impl fmt::Display for LegOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegOutcome::Started(id) => write!(f, "started on handle {}", id),
            LegOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            LegOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// The result of a single play request.
#[derive(Clone, Debug)]
pub struct PlayReport {
    file: PathBuf,
    primary: LegOutcome,
    secondary: LegOutcome,
}

impl PlayReport {
    /// The concrete file that was played on both outputs.
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn primary(&self) -> &LegOutcome {
        &self.primary
    }

    pub fn secondary(&self) -> &LegOutcome {
        &self.secondary
    }
}

fn leg_outcome(pool: &DevicePool, result: Result<Arc<PlayerHandle>, PoolError>) -> LegOutcome {
    match result {
        Ok(handle) => LegOutcome::Started(handle.id()),
        Err(e) => {
            warn!(pool = pool.name(), err = %e, "Unable to play on output");
            LegOutcome::Failed(e.to_string())
        }
    }
}

/// Routes play requests to the virtual microphone and, optionally, the monitor.
pub struct PlaybackRouter {
    primary: DevicePool,
    secondary: DevicePool,
    extensions: AudioExtensions,
}

impl PlaybackRouter {
    /// Creates a router with two pools of the same capacity.
    pub fn new(
        backend: Arc<dyn Backend>,
        primary_device: DeviceId,
        secondary_device: DeviceId,
        capacity: usize,
        extensions: AudioExtensions,
    ) -> Result<PlaybackRouter, ConfigurationError> {
        Ok(PlaybackRouter {
            primary: DevicePool::new("primary", backend.clone(), primary_device, capacity)?,
            secondary: DevicePool::new("secondary", backend, secondary_device, capacity)?,
            extensions,
        })
    }

    /// Plays a source on the primary output and, if asked, the same file on the
    /// secondary output. A directory source is resolved once for both. A failure on
    /// one output does not keep the other from playing; only a source that cannot be
    /// resolved at all is an error.
    pub fn play(
        &self,
        source: &SoundSource,
        also_on_secondary: bool,
    ) -> Result<PlayReport, SourceError> {
        let span = span!(Level::INFO, "play", source = %source);
        let _enter = span.enter();

        let file = source.resolve(&self.extensions)?;

        let primary = leg_outcome(&self.primary, self.primary.play(&file));
        let secondary = if also_on_secondary {
            leg_outcome(&self.secondary, self.secondary.play(&file))
        } else {
            LegOutcome::Skipped
        };

        info!(
            file = ?file,
            primary = %primary,
            secondary = %secondary,
            "Dispatched clip."
        );
        Ok(PlayReport {
            file,
            primary,
            secondary,
        })
    }

    /// Stops everything on both outputs.
    pub fn stop_all_playback(&self) {
        self.primary.stop_all();
        self.secondary.stop_all();
        info!("Stopped all playback.");
    }

    /// Sets the capacity of both pools. Validated up front so the pools never end up
    /// with different limits.
    pub fn set_concurrency_limit(&self, limit: usize) -> Result<(), ConfigurationError> {
        check_capacity(limit)?;
        self.primary.set_capacity(limit)?;
        self.secondary.set_capacity(limit)?;
        Ok(())
    }

    pub fn concurrency_limit(&self) -> usize {
        self.primary.capacity()
    }

    pub fn primary(&self) -> &DevicePool {
        &self.primary
    }

    pub fn secondary(&self) -> &DevicePool {
        &self.secondary
    }

    pub fn extensions(&self) -> &AudioExtensions {
        &self.extensions
    }

    /// The number of clips playing on either output.
    pub fn playing_count(&self) -> usize {
        self.primary.playing_count() + self.secondary.playing_count()
    }
}
