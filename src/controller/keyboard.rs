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
use std::{io, sync::Arc};

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::hotkeys::{
    listener::{normalize, Registrations},
    HotkeyListener, ListenerError, CAPTURE_PLACEHOLDER,
};

const STOP: &str = "stop";

/// A hotkey listener that reads key combinations typed on the console, one per line.
/// Typing a registered pattern triggers it and `stop` stops all playback.
#[derive(Default)]
pub struct Listener {
    registrations: Arc<Registrations>,
}

impl Listener {
    pub fn new() -> Listener {
        Listener::default()
    }

    /// Reads one line of input and sends the matching event. Returns false once the
    /// input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        registrations: &Registrations,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Hotkey ({} to stop all): ", STOP)?;
        writer.flush()?;
        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let event = if normalize(&input) == STOP {
            Some(Event::StopAll)
        } else {
            registrations.lookup(&input).map(Event::Hotkey)
        };

        match event {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => warn!(input = input.trim(), "Unrecognized hotkey"),
        }
        Ok(true)
    }

    fn capture<R, W>(mut reader: R, mut writer: W) -> Result<String, ListenerError>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "{}: ", CAPTURE_PLACEHOLDER)?;
        writer.flush()?;
        let mut input = String::default();
        reader.read_line(&mut input)?;

        match input.trim() {
            "" => Err(ListenerError::Closed),
            pattern => Ok(pattern.to_string()),
        }
    }
}

impl HotkeyListener for Listener {
    fn register(&self, pattern: &str) {
        self.registrations.register(pattern);
    }

    fn replace_all(&self, patterns: &[String]) {
        self.registrations.replace_all(patterns);
    }

    fn registered(&self) -> Vec<String> {
        self.registrations.registered()
    }

    fn read_hotkey(&self) -> Result<String, ListenerError> {
        Self::capture(io::stdin().lock(), io::stdout())
    }

    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let registrations = self.registrations.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard listener");
            let _enter = span.enter();

            info!("Keyboard listener started.");

            while Self::monitor_io(
                &events_tx,
                &registrations,
                io::stdin().lock(),
                io::stdout(),
            )? {}

            info!("Keyboard input closed.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::{
        controller::Event,
        hotkeys::{listener::Registrations, ListenerError},
    };

    use super::Listener;

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);
        let registrations = Registrations::new();
        registrations.register("Ctrl+Alt+H");

        let reader = BufReader::new(input.as_bytes());
        let writer = BufWriter::new(Vec::new());
        let more = Listener::monitor_io(&sender, &registrations, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((more, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(
            (true, Some(Event::Hotkey("Ctrl+Alt+H".to_string()))),
            get_event("ctrl+alt+h\n")?
        );
        assert_eq!((true, Some(Event::StopAll)), get_event(" STOP\n")?);
        assert_eq!((true, None), get_event("ctrl+z\n")?);
        assert_eq!((false, None), get_event("")?);
        Ok(())
    }

    #[test]
    fn test_capture() {
        let mut prompt = Vec::new();
        let captured = Listener::capture(BufReader::new(" Shift+F1 \n".as_bytes()), &mut prompt);
        assert_eq!("Shift+F1", captured.unwrap());
        assert!(String::from_utf8_lossy(&prompt).starts_with("press something"));

        assert!(matches!(
            Listener::capture(BufReader::new("".as_bytes()), Vec::new()),
            Err(ListenerError::Closed)
        ));
    }
}
