// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt::{Display, Formatter};

#[cfg(feature = "aws")]
/// A convenient alias for Anyhow so consuming code doesn't need to add to `Cargo.toml`
pub type AnyhowError = anyhow::Error;

#[derive(Debug)]
/// An enum that encapsulates a variety of error types.
///
/// # Example
///
/// Error::Anyhow(e.into(), format!("get_queue_url({name})"))
pub enum Error {
    #[cfg(feature = "aws")]
    /// AWS SDK (or other remote) error, with the call that produced it.
    Anyhow(AnyhowError, String),
    /// Invalid arguments or configuration, detected before any remote call.
    Config(String),
    /// I/O error, with the path or resource that produced it.
    Io(std::io::Error, String),
    #[cfg(feature = "serde_json")]
    /// JSON (serialization or deserialization) error
    Json(serde_json::Error),
    /// String error.
    String(String),
}

impl Error {
    /// Shorthand for `Error::Config`.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            #[cfg(feature = "aws")]
            Error::Anyhow(e, source) => write!(f, "{source}: {e}"),
            Error::Config(s) => write!(f, "invalid configuration: {s}"),
            Error::Io(e, path) => write!(f, "{path}: {e}"),
            #[cfg(feature = "serde_json")]
            Error::Json(e) => write!(f, "json: {e}"),
            Error::String(s) => Display::fmt(&s, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "aws")]
            Error::Anyhow(e, _) => Some(e.as_ref()),
            Error::Io(e, _) => Some(e),
            #[cfg(feature = "serde_json")]
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "serde_json")]
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}
