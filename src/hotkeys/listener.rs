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
use std::{collections::BTreeSet, io};

use parking_lot::RwLock;
use tokio::{sync::mpsc::Sender, task::JoinHandle};

use crate::controller::Event;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("hotkey listener I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("hotkey listener closed before a key was pressed")]
    Closed,
}

/// A source of global hotkey events. Implementations decide what a key press looks
/// like; the rest of the crate only deals in opaque pattern strings.
pub trait HotkeyListener: Send + Sync + 'static {
    /// Starts listening for the given pattern. Registering a pattern twice is the same
    /// as registering it once.
    fn register(&self, pattern: &str);

    /// Replaces every registration in one step.
    fn replace_all(&self, patterns: &[String]);

    /// The patterns currently being listened for.
    fn registered(&self) -> Vec<String>;

    /// Blocks until the user presses something and returns its pattern.
    fn read_hotkey(&self) -> Result<String, ListenerError>;

    /// Delivers hotkey events for registered patterns until the input ends.
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Normalizes a pattern for comparison.
pub fn normalize(pattern: &str) -> String {
    pattern.trim().to_lowercase()
}

/// A shared set of registered patterns. Swaps are done under one write lock, so
/// readers see either the old set or the new one.
#[derive(Default)]
pub struct Registrations {
    patterns: RwLock<BTreeSet<String>>,
}

impl Registrations {
    pub fn new() -> Registrations {
        Registrations::default()
    }

    pub fn register(&self, pattern: &str) {
        self.patterns.write().insert(pattern.to_string());
    }

    pub fn replace_all(&self, patterns: &[String]) {
        let replacement: BTreeSet<String> = patterns.iter().cloned().collect();
        *self.patterns.write() = replacement;
    }

    pub fn registered(&self) -> Vec<String> {
        self.patterns.read().iter().cloned().collect()
    }

    /// Returns the registered pattern matching the input, if any.
    pub fn lookup(&self, input: &str) -> Option<String> {
        let input = normalize(input);
        if input.is_empty() {
            return None;
        }
        self.patterns
            .read()
            .iter()
            .find(|pattern| normalize(pattern) == input)
            .cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_registrations_replace_all() {
        let registrations = Registrations::new();
        registrations.register("ctrl+1");
        registrations.register("ctrl+1");
        assert_eq!(vec!["ctrl+1"], registrations.registered());

        registrations.replace_all(&["ctrl+2".to_string(), "alt+f".to_string()]);
        assert_eq!(vec!["alt+f", "ctrl+2"], registrations.registered());
        assert_eq!(None, registrations.lookup("ctrl+1"));
    }

    #[test]
    fn test_registrations_lookup_normalizes() {
        let registrations = Registrations::new();
        registrations.register("Ctrl+Shift+A");
        assert_eq!(
            Some("Ctrl+Shift+A".to_string()),
            registrations.lookup("  ctrl+shift+a\n")
        );
        assert_eq!(None, registrations.lookup(""));
        assert_eq!(None, registrations.lookup("ctrl+b"));
    }
}
