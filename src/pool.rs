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

//! Bounded sets of reusable players.
//!
//! A pool owns a fixed number of player handles that all target the same output
//! device. When every handle is busy, a new request takes over the handle whose clip
//! has the most time left.

use std::{path::Path, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::audio::{Backend, DeviceId, OutputDevice, PlaybackError};

mod handle;

pub use handle::PlayerHandle;

/// The smallest number of handles a pool may hold.
pub const MIN_CAPACITY: usize = 1;
/// The largest number of handles a pool may hold.
pub const MAX_CAPACITY: usize = 10;
/// The number of handles a pool holds unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 3;

/// Invalid pool configuration. Reported to the caller, never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("capacity {0} is outside of {min}..={max}", min = MIN_CAPACITY, max = MAX_CAPACITY)]
    CapacityOutOfRange(usize),

    #[error("unknown output device {0}")]
    UnknownDevice(String),

    #[error("pool has no player handles")]
    NoHandlesAvailable,

    #[error("unable to query output devices: {0}")]
    DeviceQuery(#[from] PlaybackError),
}

/// A play request that could not be served by a pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

pub(crate) fn check_capacity(capacity: usize) -> Result<(), ConfigurationError> {
    if (MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
        Ok(())
    } else {
        Err(ConfigurationError::CapacityOutOfRange(capacity))
    }
}

/// Picks the handle to serve the next request: the first idle handle, or failing that
/// the one with the most time left. Ties go to the earliest created handle.
fn select(handles: &[Arc<PlayerHandle>]) -> Option<&Arc<PlayerHandle>> {
    if let Some(idle) = handles.iter().find(|handle| !handle.is_playing()) {
        return Some(idle);
    }

    let mut selected: Option<(&Arc<PlayerHandle>, Duration)> = None;
    for handle in handles {
        let remaining = handle.remaining_time();
        match selected {
            Some((_, best)) if remaining <= best => {}
            _ => selected = Some((handle, remaining)),
        }
    }
    selected.map(|(handle, _)| handle)
}

struct PoolState {
    /// Creation order, oldest first.
    handles: Vec<Arc<PlayerHandle>>,
    target: DeviceId,
    next_id: usize,
}

/// A fixed-capacity collection of player handles routed to one output device.
pub struct DevicePool {
    name: String,
    backend: Arc<dyn Backend>,
    state: Mutex<PoolState>,
}

impl DevicePool {
    /// Creates a pool of `capacity` idle handles bound to `target`.
    pub fn new(
        name: &str,
        backend: Arc<dyn Backend>,
        target: DeviceId,
        capacity: usize,
    ) -> Result<DevicePool, ConfigurationError> {
        check_capacity(capacity)?;

        let pool = DevicePool {
            name: name.to_string(),
            backend,
            state: Mutex::new(PoolState {
                handles: Vec::with_capacity(capacity),
                target,
                next_id: 0,
            }),
        };
        {
            let mut state = pool.state.lock();
            pool.grow(&mut state, capacity);
        }
        info!(pool = pool.name, capacity, "Created device pool");
        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resizes the pool. Growing adds idle handles bound to the current target.
    /// Shrinking removes the newest handles first, stopping whatever they play. The
    /// resize happens under the pool lock, so nobody observes a partial resize.
    pub fn set_capacity(&self, capacity: usize) -> Result<(), ConfigurationError> {
        check_capacity(capacity)?;

        let mut state = self.state.lock();
        let current = state.handles.len();
        if capacity > current {
            self.grow(&mut state, capacity);
        } else {
            while state.handles.len() > capacity {
                if let Some(handle) = state.handles.pop() {
                    debug!(pool = self.name, handle = handle.id(), "Removing handle");
                    handle.stop();
                }
            }
        }

        info!(pool = self.name, from = current, to = capacity, "Resized device pool");
        Ok(())
    }

    fn grow(&self, state: &mut PoolState, capacity: usize) {
        while state.handles.len() < capacity {
            let player = self.backend.create_player(&state.target);
            state
                .handles
                .push(Arc::new(PlayerHandle::new(state.next_id, player)));
            state.next_id += 1;
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().handles.len()
    }

    /// Selects the handle that should serve the next request. Does not start it.
    pub fn acquire(&self) -> Result<Arc<PlayerHandle>, ConfigurationError> {
        let state = self.state.lock();
        select(&state.handles)
            .cloned()
            .ok_or(ConfigurationError::NoHandlesAvailable)
    }

    /// Acquires a handle and starts the file on it. Selection and start happen under
    /// the pool lock so two concurrent requests never land on the same handle.
    pub fn play(&self, file: &Path) -> Result<Arc<PlayerHandle>, PoolError> {
        let state = self.state.lock();
        let handle = select(&state.handles)
            .cloned()
            .ok_or(ConfigurationError::NoHandlesAvailable)?;

        if handle.is_playing() {
            info!(
                pool = self.name,
                handle = handle.id(),
                remaining_ms = handle.remaining_time().as_millis(),
                "Pool is full, evicting clip"
            );
        }
        handle.start(file)?;
        Ok(handle)
    }

    /// Lists the output devices, as seen by the first handle of the pool.
    pub fn list_available_devices(&self) -> Result<Vec<OutputDevice>, ConfigurationError> {
        let first = self
            .state
            .lock()
            .handles
            .first()
            .cloned()
            .ok_or(ConfigurationError::NoHandlesAvailable)?;
        Ok(first.available_devices()?)
    }

    /// Points every handle at a new device. Clips already playing carry on; new starts
    /// go to the new device.
    pub fn set_target_device(&self, device: &DeviceId) -> Result<(), ConfigurationError> {
        let available = self.list_available_devices()?;
        if !available.iter().any(|known| known.id() == device) {
            return Err(ConfigurationError::UnknownDevice(device.to_string()));
        }

        let mut state = self.state.lock();
        for handle in state.handles.iter() {
            handle.retarget(device);
        }
        state.target = device.clone();
        info!(pool = self.name, device = %device, "Changed output device");
        Ok(())
    }

    pub fn target(&self) -> DeviceId {
        self.state.lock().target.clone()
    }

    /// Stops every handle.
    pub fn stop_all(&self) {
        let state = self.state.lock();
        for handle in state.handles.iter() {
            handle.stop();
        }
        debug!(pool = self.name, "Stopped all handles");
    }

    /// The number of handles currently playing.
    pub fn playing_count(&self) -> usize {
        self.state
            .lock()
            .handles
            .iter()
            .filter(|handle| handle.is_playing())
            .count()
    }

    /// A snapshot of the handles, oldest first.
    pub fn handles(&self) -> Vec<Arc<PlayerHandle>> {
        self.state.lock().handles.clone()
    }
}
