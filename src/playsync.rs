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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::{Condvar, Mutex};

/// The output callback marks a clip as over without taking the lock, so its wake-up
/// can land between a waiter's check and its wait. Waiters look again this often.
const RECHECK_INTERVAL: Duration = Duration::from_millis(50);

struct Shared {
    stopped: Mutex<bool>,
    ran_out: AtomicBool,
    wake: Condvar,
}

/// Tracks how a clip on an output stream ends: either the player stops it or the clip
/// runs out. The thread that owns the stream blocks in [`PlaybackSignal::wait`] and
/// tears the stream down once either happens.
#[derive(Clone)]
pub struct PlaybackSignal {
    shared: Arc<Shared>,
}

impl PlaybackSignal {
    pub fn new() -> PlaybackSignal {
        PlaybackSignal {
            shared: Arc::new(Shared {
                stopped: Mutex::new(false),
                ran_out: AtomicBool::new(false),
                wake: Condvar::new(),
            }),
        }
    }

    /// Stops the clip. Only the first call wakes the waiter.
    pub fn stop(&self) {
        let mut stopped = self.shared.stopped.lock();
        if !*stopped {
            *stopped = true;
            self.shared.wake.notify_all();
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.shared.stopped.lock()
    }

    /// Marks the clip as over. Safe to call from the audio callback.
    pub fn finish(&self) {
        if !self.shared.ran_out.swap(true, Ordering::AcqRel) {
            self.shared.wake.notify_all();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.shared.ran_out.load(Ordering::Acquire)
    }

    /// True once the clip was stopped or has run out.
    pub fn is_over(&self) -> bool {
        self.is_finished() || self.is_stopped()
    }

    /// Blocks until the clip is stopped or runs out.
    pub fn wait(&self) {
        let mut stopped = self.shared.stopped.lock();
        while !*stopped && !self.is_finished() {
            self.shared.wake.wait_for(&mut stopped, RECHECK_INTERVAL);
        }
    }
}

impl Default for PlaybackSignal {
    fn default() -> Self {
        PlaybackSignal::new()
    }
}
