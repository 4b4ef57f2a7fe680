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

//! The soundboard ties the router, the dispatch table, the settings and the profile
//! store together. Every change made through it is persisted right away.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{info, span, warn, Level};

use crate::{
    audio::{Backend, DeviceId},
    config::{profile::check_name, ConfigError, ProfileStore, Settings, DEFAULT_PROFILE},
    hotkeys::{
        BindingError, BindingOutcome, Bindings, Confirm, HotkeyDispatchTable, HotkeyListener,
    },
    pool::ConfigurationError,
    router::{PlayReport, PlaybackRouter},
    source::{SoundSource, SourceError},
};

#[derive(Debug, thiserror::Error)]
pub enum SoundboardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Binding(#[from] BindingError),
}

pub struct Soundboard {
    settings_path: Option<PathBuf>,
    settings: Mutex<Settings>,
    store: ProfileStore,
    table: Arc<HotkeyDispatchTable>,
    current_profile: Mutex<String>,
}

impl Soundboard {
    /// Builds a soundboard from settings. Unset devices use the backend's default
    /// output, as do configured devices that are no longer present. A configured
    /// profile that no longer exists falls back to the default profile. When a settings
    /// path is given, changes are saved back to it and relative profile directories are
    /// resolved against it.
    pub fn new(
        mut settings: Settings,
        settings_path: Option<PathBuf>,
        backend: Arc<dyn Backend>,
        listener: Arc<dyn HotkeyListener>,
    ) -> Result<Soundboard, ConfigError> {
        let virtual_device = pick_output(backend.as_ref(), "virtual", settings.virtual_device())?;
        let monitor_device = pick_output(backend.as_ref(), "monitor", settings.monitor_device())?;

        let router = Arc::new(PlaybackRouter::new(
            backend.clone(),
            virtual_device.clone(),
            monitor_device.clone(),
            settings.max_concurrent_sounds(),
            settings.audio_extensions(),
        )?);

        let store = ProfileStore::new(settings.resolve_profiles_dir(settings_path.as_deref()));
        let mut profile = settings.profile().to_string();
        let bindings = match store.load(&profile) {
            Ok(bindings) => bindings,
            Err(ConfigError::ProfileNotFound(missing)) => {
                warn!(
                    profile = %missing,
                    "Configured profile not found, using the default profile"
                );
                profile = DEFAULT_PROFILE.to_string();
                settings.set_profile(&profile);
                store.load(&profile)?
            }
            Err(e) => return Err(e),
        };

        let table = Arc::new(HotkeyDispatchTable::new(router, listener, bindings));
        table.set_monitor_enabled(settings.monitor_enabled());

        info!(
            profile = %profile,
            virtual_device = %virtual_device,
            monitor_device = %monitor_device,
            bindings = table.len(),
            "Soundboard ready."
        );
        Ok(Soundboard {
            settings_path,
            settings: Mutex::new(settings),
            store,
            table,
            current_profile: Mutex::new(profile),
        })
    }

    /// Switches to a stored profile. Playback stops before the new bindings take over.
    pub fn load_profile(&self, name: &str) -> Result<(), ConfigError> {
        let span = span!(Level::INFO, "load profile", name);
        let _enter = span.enter();

        let bindings = self.store.load(name)?;
        self.router().stop_all_playback();
        self.table.rebuild_from_profile(bindings);
        self.switch_to(name)
    }

    /// Creates an empty profile and switches to it.
    pub fn create_profile(&self, name: &str) -> Result<(), ConfigError> {
        let name = name.trim();
        check_name(name)?;

        self.router().stop_all_playback();
        self.store.save(name, &Bindings::new())?;
        self.table.rebuild_from_profile(Bindings::new());
        self.switch_to(name)
    }

    fn switch_to(&self, name: &str) -> Result<(), ConfigError> {
        *self.current_profile.lock() = name.to_string();
        self.settings.lock().set_profile(name);
        self.persist_settings()?;
        info!(profile = name, "Switched profile.");
        Ok(())
    }

    /// Adds a binding to the current profile and saves the profile if anything changed.
    pub fn add_binding(
        &self,
        pattern: &str,
        source: &str,
        confirm: &dyn Confirm,
    ) -> Result<BindingOutcome, SoundboardError> {
        let outcome = self.table.add_binding(pattern, source, confirm)?;
        if outcome.is_mutation() {
            self.save_profile()?;
        }
        Ok(outcome)
    }

    /// Saves the current bindings under the current profile name.
    pub fn save_profile(&self) -> Result<(), ConfigError> {
        let name = self.current_profile();
        self.store.save(&name, &self.table.bindings())
    }

    /// Resizes both pools. Everything playing stops first.
    pub fn set_concurrency_limit(&self, limit: usize) -> Result<(), ConfigError> {
        self.router().stop_all_playback();
        self.router().set_concurrency_limit(limit)?;
        self.settings.lock().set_max_concurrent_sounds(limit);
        self.persist_settings()
    }

    pub fn set_virtual_device(&self, device: DeviceId) -> Result<(), ConfigError> {
        self.router().primary().set_target_device(&device)?;
        self.settings.lock().set_virtual_device(device);
        self.persist_settings()
    }

    pub fn set_monitor_device(&self, device: DeviceId) -> Result<(), ConfigError> {
        self.router().secondary().set_target_device(&device)?;
        self.settings.lock().set_monitor_device(device);
        self.persist_settings()
    }

    pub fn set_monitor_enabled(&self, enabled: bool) -> Result<(), ConfigError> {
        self.table.set_monitor_enabled(enabled);
        self.settings.lock().set_monitor_enabled(enabled);
        self.persist_settings()
    }

    /// Plays a source directly, the same way its hotkey would.
    pub fn play_source(&self, source: &SoundSource) -> Result<PlayReport, SourceError> {
        self.router().play(source, self.table.monitor_enabled())
    }

    fn persist_settings(&self) -> Result<(), ConfigError> {
        match &self.settings_path {
            Some(path) => self.settings.lock().save(path),
            None => Ok(()),
        }
    }

    pub fn router(&self) -> &Arc<PlaybackRouter> {
        self.table.router()
    }

    pub fn table(&self) -> &Arc<HotkeyDispatchTable> {
        &self.table
    }

    /// A copy of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.lock().clone()
    }

    pub fn settings_path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }

    pub fn current_profile(&self) -> String {
        self.current_profile.lock().clone()
    }

    pub fn profiles(&self) -> Result<Vec<String>, ConfigError> {
        self.store.list()
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }
}

/// The configured device if the backend still lists it, otherwise the default output.
fn pick_output(
    backend: &dyn Backend,
    output: &str,
    configured: Option<&DeviceId>,
) -> Result<DeviceId, ConfigError> {
    if let Some(device) = configured {
        match backend.output_devices() {
            Ok(devices) if devices.iter().any(|known| known.id() == device) => {
                return Ok(device.clone())
            }
            Ok(_) => warn!(
                output,
                device = %device,
                "Configured device not found, using the default output"
            ),
            Err(e) => warn!(
                output,
                device = %device,
                err = %e,
                "Unable to list output devices, using the default output"
            ),
        }
    }
    backend
        .default_output()
        .map_err(|e| ConfigError::from(ConfigurationError::from(e)))
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, sync::Arc, time::Duration};

    use serial_test::serial;

    use crate::{
        audio::{mock, DeviceId},
        config::{ConfigError, ProfileStore, Settings},
        hotkeys::{test::TestListener, BindingOutcome, Bindings, Conflict, HotkeyListener},
        source::SoundSource,
    };

    use super::Soundboard;

    struct Fixture {
        dir: tempfile::TempDir,
        backend: mock::Backend,
        listener: Arc<TestListener>,
    }

    impl Fixture {
        fn new() -> Result<Fixture, Box<dyn Error>> {
            let dir = tempfile::tempdir()?;
            fs::create_dir(dir.path().join("clips"))?;
            for name in ["a.wav", "b.wav"] {
                fs::write(dir.path().join("clips").join(name), b"")?;
            }
            Ok(Fixture {
                dir,
                backend: mock::Backend::new()
                    .with_default_duration(Duration::from_secs(30))
                    .with_devices(&["mock-virtual", "mock-monitor", "headphones"]),
                listener: Arc::new(TestListener::new()),
            })
        }

        fn settings_path(&self) -> std::path::PathBuf {
            self.dir.path().join("micboard.yaml")
        }

        fn clip(&self, name: &str) -> String {
            self.dir
                .path()
                .join("clips")
                .join(name)
                .to_string_lossy()
                .to_string()
        }

        fn soundboard(&self, settings: Settings) -> Result<Soundboard, ConfigError> {
            Soundboard::new(
                settings,
                Some(self.settings_path()),
                Arc::new(self.backend.clone()),
                self.listener.clone(),
            )
        }

        fn store(&self) -> ProfileStore {
            ProfileStore::new(self.dir.path().join("profiles"))
        }
    }

    fn yes(_: &Conflict) -> bool {
        true
    }

    #[test]
    fn test_new_uses_default_devices_and_empty_default_profile() -> Result<(), Box<dyn Error>> {
        let fixture = Fixture::new()?;
        let soundboard = fixture.soundboard(Settings::default())?;

        assert_eq!(DeviceId::new("mock-virtual"), soundboard.router().primary().target());
        assert_eq!(DeviceId::new("mock-virtual"), soundboard.router().secondary().target());
        assert_eq!(3, soundboard.router().concurrency_limit());
        assert_eq!("default", soundboard.current_profile());
        assert!(soundboard.table().is_empty());
        Ok(())
    }

    #[test]
    fn test_new_falls_back_from_missing_configured_device() -> Result<(), Box<dyn Error>> {
        let fixture = Fixture::new()?;
        let mut settings = Settings::default();
        settings.set_virtual_device(DeviceId::new("headphones"));
        settings.set_monitor_device(DeviceId::new("speakers"));

        let soundboard = fixture.soundboard(settings)?;
        assert_eq!(DeviceId::new("headphones"), soundboard.router().primary().target());
        assert_eq!(DeviceId::new("mock-virtual"), soundboard.router().secondary().target());

        soundboard.set_monitor_enabled(true)?;
        let report = soundboard.play_source(&SoundSource::new(fixture.clip("a.wav")))?;
        assert!(report.secondary().is_started());
        assert_eq!(1, fixture.backend.starts_on("mock-virtual").len());
        assert_eq!(1, fixture.backend.starts_on("headphones").len());
        Ok(())
    }

    #[test]
    fn test_new_falls_back_from_missing_profile() -> Result<(), Box<dyn Error>> {
        let fixture = Fixture::new()?;
        fixture.store().save(
            "default",
            &Bindings::from([("ctrl+1".to_string(), fixture.clip("a.wav"))]),
        )?;
        let mut settings = Settings::default();
        settings.set_profile("gaming");

        let soundboard = fixture.soundboard(settings)?;
        assert_eq!("default", soundboard.current_profile());
        assert_eq!("default", soundboard.settings().profile());
        assert_eq!(vec!["ctrl+1"], fixture.listener.registered());
        Ok(())
    }

    #[test]
    fn test_add_binding_saves_profile() -> Result<(), Box<dyn Error>> {
        let fixture = Fixture::new()?;
        let soundboard = fixture.soundboard(Settings::default())?;

        let outcome = soundboard.add_binding("ctrl+1", &fixture.clip("a.wav"), &yes)?;
        assert_eq!(BindingOutcome::Added, outcome);
        assert_eq!(
            Bindings::from([("ctrl+1".to_string(), fixture.clip("a.wav"))]),
            fixture.store().load("default")?
        );

        // Declining leaves the saved profile alone.
        let outcome =
            soundboard.add_binding("ctrl+1", &fixture.clip("b.wav"), &|_: &Conflict| false)?;
        assert_eq!(BindingOutcome::Declined, outcome);
        assert_eq!(
            Some(&fixture.clip("a.wav")),
            fixture.store().load("default")?.get("ctrl+1")
        );
        Ok(())
    }

    #[test]
    #[serial]
    fn test_profile_switching() -> Result<(), Box<dyn Error>> {
        let fixture = Fixture::new()?;
        fixture.store().save(
            "streaming",
            &Bindings::from([("ctrl+2".to_string(), fixture.clip("b.wav"))]),
        )?;
        let soundboard = fixture.soundboard(Settings::default())?;
        soundboard.add_binding("ctrl+1", &fixture.clip("a.wav"), &yes)?;
        soundboard.play_source(&SoundSource::new(fixture.clip("a.wav")))?;
        assert_eq!(1, soundboard.router().playing_count());

        soundboard.load_profile("streaming")?;
        assert_eq!(0, soundboard.router().playing_count());
        assert_eq!("streaming", soundboard.current_profile());
        assert_eq!(vec!["ctrl+2"], fixture.listener.registered());
        assert_eq!("streaming", Settings::load(&fixture.settings_path())?.profile());

        soundboard.create_profile(" gaming ")?;
        assert_eq!("gaming", soundboard.current_profile());
        assert!(soundboard.table().is_empty());
        assert!(fixture.listener.registered().is_empty());
        assert_eq!(
            vec!["default", "gaming", "streaming"],
            soundboard.profiles()?
        );

        assert!(matches!(
            soundboard.create_profile("  "),
            Err(ConfigError::EmptyProfileName)
        ));
        assert!(matches!(
            soundboard.load_profile("missing"),
            Err(ConfigError::ProfileNotFound(_))
        ));
        assert_eq!("gaming", soundboard.current_profile());
        Ok(())
    }

    #[test]
    #[serial]
    fn test_settings_changes_persist() -> Result<(), Box<dyn Error>> {
        let fixture = Fixture::new()?;
        let soundboard = fixture.soundboard(Settings::default())?;
        soundboard.play_source(&SoundSource::new(fixture.clip("a.wav")))?;

        soundboard.set_concurrency_limit(6)?;
        assert_eq!(0, soundboard.router().playing_count());
        assert_eq!(6, soundboard.router().secondary().capacity());
        assert!(soundboard.set_concurrency_limit(11).is_err());

        soundboard.set_monitor_device(DeviceId::new("headphones"))?;
        soundboard.set_monitor_enabled(true)?;
        assert!(soundboard
            .set_virtual_device(DeviceId::new("speakers"))
            .is_err());

        let saved = Settings::load(&fixture.settings_path())?;
        assert_eq!(6, saved.max_concurrent_sounds());
        assert_eq!(Some(&DeviceId::new("headphones")), saved.monitor_device());
        assert_eq!(None, saved.virtual_device());
        assert!(saved.monitor_enabled());

        let report = soundboard.play_source(&SoundSource::new(fixture.clip("b.wav")))?;
        assert!(report.secondary().is_started());
        assert_eq!(1, fixture.backend.starts_on("headphones").len());
        Ok(())
    }
}
