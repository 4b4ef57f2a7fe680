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
use std::path::PathBuf;

/// Errors raised by the playback layer. None of these are fatal: the worst outcome is
/// that a requested clip does not play.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// The source could not be opened or decoded.
    #[error("unable to play {}: {reason}", .path.display())]
    UnsupportedSource { path: PathBuf, reason: String },

    #[error("no output device found with name {0}")]
    DeviceNotFound(String),

    #[error("audio host error: {0}")]
    Host(String),

    #[error("output stream error: {0}")]
    Stream(String),
}

impl PlaybackError {
    pub(crate) fn unsupported(path: impl Into<PathBuf>, reason: impl ToString) -> PlaybackError {
        PlaybackError::UnsupportedSource {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
