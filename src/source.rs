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
    collections::BTreeSet,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use rand::seq::SliceRandom;
use tracing::debug;

/// Extensions picked from directories unless configured otherwise.
pub const DEFAULT_EXTENSIONS: [&str; 18] = [
    "3gp", "aac", "aiff", "ape", "au", "flac", "m4a", "m4b", "m4p", "mpc", "ogg", "oga", "opus",
    "wma", "webm", "avi", "mp3", "wav",
];

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("sound source {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("no audio files found in {}", .0.display())]
    NoAudioFiles(PathBuf),

    #[error("unable to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// The set of file extensions treated as audio when picking from a directory.
/// Matching is case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioExtensions(BTreeSet<String>);

impl AudioExtensions {
    pub fn new<I, S>(extensions: I) -> AudioExtensions
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        AudioExtensions(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        )
    }

    /// Returns true if the path has one of the extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.0.contains(&ext.to_lowercase()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for AudioExtensions {
    fn default() -> Self {
        AudioExtensions::new(DEFAULT_EXTENSIONS)
    }
}

/// What a source path points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
}

/// Something a hotkey plays: a single file, or a directory to pick a file from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoundSource {
    path: PathBuf,
}

impl SoundSource {
    pub fn new(path: impl Into<PathBuf>) -> SoundSource {
        SoundSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inspects the filesystem to see what the source currently is.
    pub fn kind(&self) -> Option<SourceKind> {
        if self.path.is_dir() {
            Some(SourceKind::Directory)
        } else if self.path.exists() {
            Some(SourceKind::File)
        } else {
            None
        }
    }

    /// Resolves the source to a concrete file. Directories yield a uniformly random
    /// audio file from anywhere below them, picked fresh on every call.
    pub fn resolve(&self, extensions: &AudioExtensions) -> Result<PathBuf, SourceError> {
        match self.kind() {
            Some(SourceKind::File) => Ok(self.path.clone()),
            Some(SourceKind::Directory) => {
                let candidates = self.candidates(extensions)?;
                let picked = candidates
                    .choose(&mut rand::thread_rng())
                    .cloned()
                    .ok_or_else(|| SourceError::NoAudioFiles(self.path.clone()))?;
                debug!(
                    directory = ?self.path,
                    picked = ?picked,
                    candidates = candidates.len(),
                    "Picked file from directory"
                );
                Ok(picked)
            }
            None => Err(SourceError::NotFound(self.path.clone())),
        }
    }

    /// Every audio file below a directory source, sorted. A file source is its own
    /// only candidate.
    pub fn candidates(&self, extensions: &AudioExtensions) -> Result<Vec<PathBuf>, SourceError> {
        match self.kind() {
            Some(SourceKind::File) => Ok(vec![self.path.clone()]),
            Some(SourceKind::Directory) => {
                let mut files = Vec::new();
                collect_audio_files(&self.path, extensions, &mut files)?;
                files.sort();
                Ok(files)
            }
            None => Err(SourceError::NotFound(self.path.clone())),
        }
    }
}

impl fmt::Display for SoundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<&str> for SoundSource {
    fn from(path: &str) -> Self {
        SoundSource::new(path)
    }
}

fn collect_audio_files(
    dir: &Path,
    extensions: &AudioExtensions,
    files: &mut Vec<PathBuf>,
) -> Result<(), SourceError> {
    let io_err = |source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        // file_type does not follow symlinks, so linked directories are never entered.
        let file_type = entry.file_type().map_err(io_err)?;
        let path = entry.path();
        if file_type.is_dir() {
            collect_audio_files(&path, extensions, files)?;
        } else if (file_type.is_file() || (file_type.is_symlink() && path.is_file()))
            && extensions.matches(&path)
        {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::{collections::HashSet, error::Error, fs};

    use super::*;

    fn touch(path: &Path) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"")?;
        Ok(())
    }

    #[test]
    fn test_extensions_match_case_insensitive() {
        let extensions = AudioExtensions::new([".MP3", "wav", " "]);
        assert!(extensions.matches(Path::new("a.mp3")));
        assert!(extensions.matches(Path::new("b.WAV")));
        assert!(!extensions.matches(Path::new("c.txt")));
        assert!(!extensions.matches(Path::new("noext")));
        assert_eq!(vec!["mp3", "wav"], extensions.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_default_extensions() {
        let extensions = AudioExtensions::default();
        for ext in ["mp3", "wav", "flac", "ogg", "opus"] {
            assert!(extensions.matches(Path::new(&format!("clip.{}", ext))));
        }
    }

    #[test]
    fn test_resolve_file() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let file = tempdir.path().join("airhorn.mp3");
        touch(&file)?;

        let source = SoundSource::new(&file);
        assert_eq!(Some(SourceKind::File), source.kind());
        assert_eq!(file, source.resolve(&AudioExtensions::default())?);
        Ok(())
    }

    #[test]
    fn test_resolve_missing() {
        let source = SoundSource::new("/no/such/clip.wav");
        assert_eq!(None, source.kind());
        assert!(matches!(
            source.resolve(&AudioExtensions::default()),
            Err(SourceError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_directory_filters_and_recurses() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let root = tempdir.path();
        touch(&root.join("one.wav"))?;
        touch(&root.join("nested/two.MP3"))?;
        touch(&root.join("nested/deeper/three.ogg"))?;
        touch(&root.join("readme.txt"))?;
        touch(&root.join("nested/cover.jpg"))?;

        let source = SoundSource::new(root);
        let extensions = AudioExtensions::default();
        let candidates = source.candidates(&extensions)?;
        assert_eq!(3, candidates.len());

        let expected: HashSet<PathBuf> = candidates.into_iter().collect();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let picked = source.resolve(&extensions)?;
            assert!(expected.contains(&picked));
            seen.insert(picked);
        }
        // Picked fresh every time.
        assert!(seen.len() > 1);
        Ok(())
    }

    #[test]
    fn test_resolve_directory_without_audio() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        touch(&tempdir.path().join("notes.txt"))?;

        let source = SoundSource::new(tempdir.path());
        assert!(matches!(
            source.resolve(&AudioExtensions::default()),
            Err(SourceError::NoAudioFiles(_))
        ));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_symlink_loops_are_not_followed() -> Result<(), Box<dyn Error>> {
        use std::os::unix::fs::symlink;

        let tempdir = tempfile::tempdir()?;
        let root = tempdir.path();
        touch(&root.join("a.wav"))?;
        symlink(root, root.join("l1"))?;
        symlink(root, root.join("l2"))?;

        let source = SoundSource::new(root);
        let extensions = AudioExtensions::default();
        assert_eq!(vec![root.join("a.wav")], source.candidates(&extensions)?);
        assert_eq!(root.join("a.wav"), source.resolve(&extensions)?);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_nested_symlink_loop_does_not_duplicate() -> Result<(), Box<dyn Error>> {
        use std::os::unix::fs::symlink;

        let tempdir = tempfile::tempdir()?;
        let root = tempdir.path();
        touch(&root.join("x.wav"))?;
        touch(&root.join("sub/y.wav"))?;
        symlink(root.join("sub"), root.join("sub/l"))?;
        // Linked files are still picked up.
        symlink(root.join("x.wav"), root.join("linked.wav"))?;

        let source = SoundSource::new(root);
        let candidates = source.candidates(&AudioExtensions::default())?;
        assert_eq!(
            vec![
                root.join("linked.wav"),
                root.join("sub/y.wav"),
                root.join("x.wav"),
            ],
            candidates
        );
        Ok(())
    }

    #[test]
    fn test_resolve_respects_configured_extensions() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        touch(&tempdir.path().join("a.wav"))?;
        touch(&tempdir.path().join("b.mp3"))?;

        let source = SoundSource::new(tempdir.path());
        let only_wav = AudioExtensions::new(["wav"]);
        for _ in 0..20 {
            assert_eq!(tempdir.path().join("a.wav"), source.resolve(&only_wav)?);
        }
        Ok(())
    }
}
