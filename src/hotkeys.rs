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

//! Hotkey bindings and dispatch.
//!
//! The dispatch table maps hotkey patterns to sound sources, keeps the hotkey listener
//! in step with the mapping and forwards triggered hotkeys to the playback router.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    router::{PlayReport, PlaybackRouter},
    source::{SoundSource, SourceError},
};

pub mod listener;

pub use listener::{HotkeyListener, ListenerError};

/// Shown in place of a hotkey while a capture is pending. Never a valid pattern.
pub const CAPTURE_PLACEHOLDER: &str = "press something on your keyboard";

/// Hotkey pattern to sound source path.
pub type Bindings = BTreeMap<String, String>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("no hotkey given")]
    EmptyHotkey,

    #[error("no sound source given")]
    EmptySource,
}

/// A new binding that collides with an existing one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Conflict {
    /// The hotkey is already bound to `existing_source`.
    DuplicateHotkey {
        pattern: String,
        existing_source: String,
    },
    /// The source is already bound to `existing_pattern`.
    DuplicateSource {
        source: String,
        existing_pattern: String,
    },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::DuplicateHotkey {
                pattern,
                existing_source,
            } => write!(
                f,
                "hotkey '{}' is already bound to '{}'",
                pattern, existing_source
            ),
            Conflict::DuplicateSource {
                source,
                existing_pattern,
            } => write!(
                f,
                "'{}' is already bound to hotkey '{}'",
                source, existing_pattern
            ),
        }
    }
}

/// Decides whether a conflicting binding should go ahead.
pub trait Confirm {
    fn confirm(&self, conflict: &Conflict) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&Conflict) -> bool,
{
    fn confirm(&self, conflict: &Conflict) -> bool {
        self(conflict)
    }
}

/// What add_binding did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingOutcome {
    /// A new hotkey was bound.
    Added,
    /// An existing hotkey now plays a different source.
    Replaced,
    /// A conflict was not confirmed. Nothing changed.
    Declined,
}

impl BindingOutcome {
    /// True if the table changed.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, BindingOutcome::Declined)
    }
}

/// Clears the pending-capture flag when the capture ends, however it ends.
struct CaptureGuard(Arc<AtomicBool>);

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Maps hotkeys to sound sources.
pub struct HotkeyDispatchTable {
    router: Arc<PlaybackRouter>,
    listener: Arc<dyn HotkeyListener>,
    bindings: RwLock<Bindings>,
    capture_pending: Arc<AtomicBool>,
    monitor_enabled: AtomicBool,
}

impl HotkeyDispatchTable {
    /// Creates a table with the given initial bindings and registers them.
    pub fn new(
        router: Arc<PlaybackRouter>,
        listener: Arc<dyn HotkeyListener>,
        bindings: Bindings,
    ) -> HotkeyDispatchTable {
        let table = HotkeyDispatchTable {
            router,
            listener,
            bindings: RwLock::new(Bindings::new()),
            capture_pending: Arc::new(AtomicBool::new(false)),
            monitor_enabled: AtomicBool::new(false),
        };
        table.rebuild_from_profile(bindings);
        table
    }

    /// Starts capturing the next key combination on a blocking worker. Returns None if
    /// a capture is already pending.
    pub fn register_capture(&self) -> Option<JoinHandle<Result<String, ListenerError>>> {
        if self
            .capture_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Hotkey capture already pending");
            return None;
        }

        let guard = CaptureGuard(self.capture_pending.clone());
        let listener = self.listener.clone();
        Some(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let pattern = listener.read_hotkey()?;
            info!(pattern = %pattern, "Captured hotkey");
            Ok(pattern)
        }))
    }

    /// True while a capture started by register_capture has not finished.
    pub fn capture_pending(&self) -> bool {
        self.capture_pending.load(Ordering::Acquire)
    }

    /// Binds a hotkey to a sound source. A hotkey that is already bound, or failing
    /// that a source that is already bound, has to be confirmed first. Declining
    /// leaves the table untouched.
    pub fn add_binding(
        &self,
        pattern: &str,
        source: &str,
        confirm: &dyn Confirm,
    ) -> Result<BindingOutcome, BindingError> {
        let pattern = pattern.trim();
        let source = source.trim();
        if pattern.is_empty() || pattern == CAPTURE_PLACEHOLDER {
            return Err(BindingError::EmptyHotkey);
        }
        if source.is_empty() {
            return Err(BindingError::EmptySource);
        }

        // The lock is not held while the user makes up their mind, so the table is
        // checked again before the insert. A conflict that changed in the meantime is
        // put to the user again.
        let mut confirmed: Option<Conflict> = None;
        let previous = loop {
            let mut bindings = self.bindings.write();
            let conflict = match find_conflict(&bindings, pattern, source) {
                Some(conflict) if confirmed.as_ref() != Some(&conflict) => conflict,
                _ => break bindings.insert(pattern.to_string(), source.to_string()),
            };
            drop(bindings);

            if !confirm.confirm(&conflict) {
                info!(conflict = %conflict, "Binding declined");
                return Ok(BindingOutcome::Declined);
            }
            confirmed = Some(conflict);
        };
        self.listener.register(pattern);

        info!(pattern, source, "Bound hotkey");
        Ok(match previous {
            Some(_) => BindingOutcome::Replaced,
            None => BindingOutcome::Added,
        })
    }

    /// Plays whatever the hotkey is bound to. Unbound hotkeys are ignored.
    pub fn trigger(&self, pattern: &str) -> Result<Option<PlayReport>, SourceError> {
        let source = match self.bindings.read().get(pattern) {
            Some(source) => source.clone(),
            None => {
                debug!(pattern, "Ignoring unbound hotkey");
                return Ok(None);
            }
        };

        self.router
            .play(&SoundSource::new(source), self.monitor_enabled())
            .map(Some)
            .inspect_err(|e| warn!(pattern, err = %e, "Unable to resolve sound source"))
    }

    /// Swaps in a whole new set of bindings, re-registering the listener in the same
    /// step.
    pub fn rebuild_from_profile(&self, bindings: Bindings) {
        let mut current = self.bindings.write();
        let patterns: Vec<String> = bindings.keys().cloned().collect();
        self.listener.replace_all(&patterns);
        *current = bindings;
        info!(count = current.len(), "Rebuilt hotkey bindings");
    }

    /// Whether triggered clips also play on the monitor.
    pub fn monitor_enabled(&self) -> bool {
        self.monitor_enabled.load(Ordering::Relaxed)
    }

    pub fn set_monitor_enabled(&self, enabled: bool) {
        self.monitor_enabled.store(enabled, Ordering::Relaxed);
    }

    /// A copy of the current bindings.
    pub fn bindings(&self) -> Bindings {
        self.bindings.read().clone()
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    pub fn router(&self) -> &Arc<PlaybackRouter> {
        &self.router
    }

    pub fn listener(&self) -> &Arc<dyn HotkeyListener> {
        &self.listener
    }
}

/// The first conflict a new binding would cause: the hotkey is taken, or failing that
/// the source is already bound elsewhere.
fn find_conflict(bindings: &Bindings, pattern: &str, source: &str) -> Option<Conflict> {
    if let Some(existing_source) = bindings.get(pattern) {
        return Some(Conflict::DuplicateHotkey {
            pattern: pattern.to_string(),
            existing_source: existing_source.clone(),
        });
    }
    bindings
        .iter()
        .find(|(_, bound)| bound.as_str() == source)
        .map(|(existing_pattern, _)| Conflict::DuplicateSource {
            source: source.to_string(),
            existing_pattern: existing_pattern.clone(),
        })
}
