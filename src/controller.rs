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
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, span, warn, Level};

use crate::hotkeys::HotkeyDispatchTable;

pub mod keyboard;

/// Events delivered by a hotkey listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A registered hotkey was pressed. Carries the pattern as it was registered.
    Hotkey(String),

    /// Stops everything on both outputs.
    StopAll,
}

/// Feeds listener events into a dispatch table.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Starts listening for events on the table's listener.
    pub fn new(table: Arc<HotkeyDispatchTable>) -> Controller {
        Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(table).await }),
        }
    }

    /// Join will block until the listener closes and the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    async fn trigger_events(table: Arc<HotkeyDispatchTable>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = table.listener().monitor_events(events_tx);

        info!(bindings = table.len(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = ?event, "Received event.");

            // Opening output streams can block, so dispatch off the async workers.
            let table = table.clone();
            let result = tokio::task::spawn_blocking(move || match event {
                Event::Hotkey(pattern) => {
                    if let Err(e) = table.trigger(&pattern) {
                        warn!(pattern = %pattern, err = %e, "Hotkey did not play");
                    }
                }
                Event::StopAll => table.router().stop_all_playback(),
            })
            .await;
            if let Err(e) = result {
                error!("Error dispatching event: {}", e);
            }
        }

        info!("Controller closing.");
        match join_handle.await {
            Ok(Err(e)) => error!("Hotkey listener failed: {}", e),
            Err(e) => error!("Error waiting for hotkey listener to stop: {}", e),
            Ok(Ok(())) => {}
        }
    }
}
