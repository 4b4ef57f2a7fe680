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
use std::{io, path::PathBuf};

use crate::pool::ConfigurationError;

/// Typed error for settings and profile failures so callers can tell a missing profile
/// from a malformed one without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("unable to access {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("malformed profile {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unable to serialize settings: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("no profile named {0}")]
    ProfileNotFound(String),

    #[error("profile names cannot be empty")]
    EmptyProfileName,

    #[error("invalid profile name {0}")]
    InvalidProfileName(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> ConfigError {
        let path = path.into();
        move |source| ConfigError::Io { path, source }
    }
}
