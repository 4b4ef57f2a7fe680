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
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use super::{error::ConfigError, settings::DEFAULT_PROFILE};
use crate::hotkeys::Bindings;

const PROFILE_EXTENSION: &str = "json";

/// A directory of named binding profiles, one JSON file per profile.
#[derive(Clone, Debug)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> ProfileStore {
        ProfileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a profile lives in.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, PROFILE_EXTENSION))
    }

    /// The names of every stored profile, sorted. A missing directory has none.
    pub fn list(&self) -> Result<Vec<String>, ConfigError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConfigError::io(&self.dir)(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(ConfigError::io(&self.dir))?.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(PROFILE_EXTENSION)
            {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Loads a profile. The default profile loads empty when it has never been saved;
    /// any other missing profile is an error.
    pub fn load(&self, name: &str) -> Result<Bindings, ConfigError> {
        check_name(name)?;
        let path = self.path(name);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if name == DEFAULT_PROFILE {
                    debug!("No default profile yet, starting empty.");
                    return Ok(Bindings::new());
                }
                return Err(ConfigError::ProfileNotFound(name.to_string()));
            }
            Err(e) => return Err(ConfigError::io(path)(e)),
        };

        serde_json::from_str(&contents).map_err(|source| ConfigError::Json { path, source })
    }

    /// Saves a profile, creating the directory if needed.
    pub fn save(&self, name: &str, bindings: &Bindings) -> Result<(), ConfigError> {
        check_name(name)?;
        fs::create_dir_all(&self.dir).map_err(ConfigError::io(&self.dir))?;

        let path = self.path(name);
        let serialized = serde_json::to_string_pretty(bindings).map_err(|source| {
            ConfigError::Json {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&path, serialized).map_err(ConfigError::io(&path))?;
        info!(profile = name, bindings = bindings.len(), "Saved profile.");
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<(), ConfigError> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ConfigError::ProfileNotFound(name.to_string()))
            }
            Err(e) => Err(ConfigError::io(self.path(name))(e)),
        }
    }
}

/// Profile names become file names, so they can't be blank or contain separators.
pub(crate) fn check_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyProfileName);
    }
    if name.contains(['/', '\\']) {
        return Err(ConfigError::InvalidProfileName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use crate::{config::ConfigError, hotkeys::Bindings};

    use super::ProfileStore;

    #[test]
    fn test_save_and_load() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let store = ProfileStore::new(tempdir.path().join("profiles"));

        let bindings = Bindings::from([
            ("ctrl+1".to_string(), "/clips/airhorn.mp3".to_string()),
            ("ctrl+2".to_string(), "/clips/memes".to_string()),
        ]);
        store.save("streaming", &bindings)?;

        assert_eq!(bindings, store.load("streaming")?);
        assert_eq!(vec!["streaming"], store.list()?);
        Ok(())
    }

    #[test]
    fn test_profile_is_flat_json() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let store = ProfileStore::new(tempdir.path());
        store.save(
            "default",
            &Bindings::from([("ctrl+1".to_string(), "a.wav".to_string())]),
        )?;

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path("default"))?)?;
        assert_eq!(serde_json::json!({"ctrl+1": "a.wav"}), value);
        Ok(())
    }

    #[test]
    fn test_missing_profiles() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let store = ProfileStore::new(tempdir.path().join("never-created"));

        assert!(store.list()?.is_empty());
        assert!(store.load("default")?.is_empty());
        assert!(matches!(
            store.load("gaming"),
            Err(ConfigError::ProfileNotFound(name)) if name == "gaming"
        ));
        Ok(())
    }

    #[test]
    fn test_list_ignores_other_files() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let store = ProfileStore::new(tempdir.path());
        store.save("b", &Bindings::new())?;
        store.save("a", &Bindings::new())?;
        fs::write(tempdir.path().join("notes.txt"), "")?;
        fs::create_dir(tempdir.path().join("c.json"))?;

        assert_eq!(vec!["a", "b"], store.list()?);
        Ok(())
    }

    #[test]
    fn test_malformed_and_invalid() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let store = ProfileStore::new(tempdir.path());
        fs::write(store.path("broken"), "[1, 2, 3]")?;

        assert!(matches!(
            store.load("broken"),
            Err(ConfigError::Json { .. })
        ));
        assert!(matches!(
            store.save(" ", &Bindings::new()),
            Err(ConfigError::EmptyProfileName)
        ));
        assert!(matches!(
            store.save("../escape", &Bindings::new()),
            Err(ConfigError::InvalidProfileName(_))
        ));

        store.save("gone", &Bindings::new())?;
        store.delete("gone")?;
        assert!(matches!(
            store.delete("gone"),
            Err(ConfigError::ProfileNotFound(_))
        ));
        Ok(())
    }
}
