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
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use micboard::audio::{self, BackendKind, DeviceId};
use micboard::config::{self, ProfileStore, Settings};
use micboard::hotkeys::{BindingOutcome, Conflict};
use micboard::pool::MIN_CAPACITY;
use micboard::router::PlaybackRouter;
use micboard::source::{AudioExtensions, SoundSource};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A hotkey soundboard for virtual microphones."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {
        /// The audio backend to query.
        #[arg(short, long, default_value_t = BackendKind::Cpal)]
        backend: BackendKind,
    },
    /// Plays a single file, or a random file from a directory, and waits for it to end.
    Play {
        /// The file or directory to play.
        source: String,
        /// The device to play through. Defaults to the system default output.
        #[arg(short, long)]
        device: Option<String>,
        /// Also play on this device.
        #[arg(short, long)]
        monitor: Option<String>,
        /// Extensions to pick from when the source is a directory, e.g. wav,mp3.
        #[arg(short, long, value_delimiter = ',')]
        extensions: Vec<String>,
        /// The audio backend to play through.
        #[arg(short, long, default_value_t = BackendKind::Cpal)]
        backend: BackendKind,
    },
    /// Lists the stored hotkey profiles.
    Profiles {
        /// The path to the settings file.
        settings: String,
    },
    /// Binds a hotkey to a sound in the current profile.
    Bind {
        /// The path to the settings file.
        settings: String,
        /// The file or directory the hotkey plays.
        source: String,
        /// The hotkey. If omitted, the next key combination entered is used.
        #[arg(short = 'k', long)]
        hotkey: Option<String>,
        /// Replace conflicting bindings without asking.
        #[arg(short, long)]
        yes: bool,
    },
    /// Start will start the soundboard and listen for hotkeys.
    Start {
        /// The path to the settings file.
        settings: String,
        /// The profile to start with instead of the configured one.
        #[arg(short, long)]
        profile: Option<String>,
    },
}

/// Asks on the console whether a conflicting binding should go ahead.
fn confirm_on_console(conflict: &Conflict) -> bool {
    print!("{}. Replace it? [y/N]: ", conflict);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices { backend } => {
            let devices = audio::list_devices(backend)?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            source,
            device,
            monitor,
            extensions,
            backend,
        } => {
            let backend = audio::get_backend(backend);
            let default_output = backend.default_output()?;
            let extensions = if extensions.is_empty() {
                AudioExtensions::default()
            } else {
                AudioExtensions::new(extensions)
            };
            let primary = device.map(DeviceId::from);
            let secondary = monitor.map(DeviceId::from);

            let router = PlaybackRouter::new(
                backend,
                primary.clone().unwrap_or_else(|| default_output.clone()),
                secondary.clone().unwrap_or(default_output),
                MIN_CAPACITY,
                extensions,
            )?;
            if let Some(primary) = &primary {
                router.primary().set_target_device(primary)?;
            }
            if let Some(secondary) = &secondary {
                router.secondary().set_target_device(secondary)?;
            }

            let report = router.play(&SoundSource::new(source), secondary.is_some())?;
            println!("Playing {}", report.file().display());
            println!("- primary: {}", report.primary());
            println!("- secondary: {}", report.secondary());
            if !report.primary().is_started() && !report.secondary().is_started() {
                return Err("unable to play on any output".into());
            }

            while router.playing_count() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
        Commands::Profiles { settings } => {
            let path = PathBuf::from(settings);
            let settings = Settings::load(&path)?;
            let store = ProfileStore::new(settings.resolve_profiles_dir(Some(&path)));
            let profiles = store.list()?;

            if profiles.is_empty() {
                println!("No profiles found in {}.", store.dir().display());
                return Ok(());
            }

            println!("Profiles:");
            for profile in profiles {
                let marker = if profile == settings.profile() { "*" } else { "-" };
                println!("{} {}", marker, profile);
            }
        }
        Commands::Bind {
            settings,
            source,
            hotkey,
            yes,
        } => {
            let soundboard = config::load_soundboard(&PathBuf::from(settings))?;
            let hotkey = match hotkey {
                Some(hotkey) => hotkey,
                None => soundboard
                    .table()
                    .register_capture()
                    .ok_or("a hotkey capture is already pending")?
                    .await??,
            };

            let outcome = if yes {
                soundboard.add_binding(&hotkey, &source, &|_: &Conflict| true)?
            } else {
                soundboard.add_binding(&hotkey, &source, &confirm_on_console)?
            };
            match outcome {
                BindingOutcome::Added => println!("Bound {} to {}.", hotkey, source),
                BindingOutcome::Replaced => println!("Rebound {} to {}.", hotkey, source),
                BindingOutcome::Declined => println!("Left {} unchanged.", hotkey),
            }
        }
        Commands::Start { settings, profile } => {
            let (_soundboard, mut controller) = config::init_soundboard_and_controller(
                &PathBuf::from(settings),
                profile.as_deref(),
            )?;
            controller.join().await?;
        }
    }

    Ok(())
}
