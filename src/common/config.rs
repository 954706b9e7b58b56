// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::Error;
use serde::de::DeserializeOwned;
#[allow(deprecated)]
use std::env::home_dir;
use std::fs::read_to_string;
use std::path::PathBuf;

/// Configuration parameters for the AWS wrappers and the transaction executor.
///
/// The configuration is a TOML document whose top-level tables are read by the
/// features that need them, for example:
///
/// ```toml
/// [aws]
/// profile = "dev"
/// region = "eu-west-1"
///
/// [transaction]
/// max_retries = 2
/// retry_delay_secs = 5
/// ```
#[derive(Debug)]
pub struct OobConfig {
    debug_enabled: bool,
    table: toml::Table,
}

impl OobConfig {
    /// Creates a configuration builder.
    pub fn builder() -> OobConfigBuilder {
        OobConfigBuilder {
            debug_enabled: false,
            source: Err(Error::config("config not set")),
        }
    }

    /// Returns `true` if debug is enabled.
    pub fn debug(&self) -> bool {
        self.debug_enabled
    }

    /// Deserializes the whole configuration document.
    pub fn get<T: DeserializeOwned>(&self) -> Result<T, Error> {
        toml::Value::Table(self.table.clone())
            .try_into()
            .map_err(|e: toml::de::Error| Error::config(format!("toml: {e}")))
    }

    /// Deserializes one top-level table, or `None` if the table is absent.
    pub fn section<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, Error> {
        match self.table.get(name) {
            None => Ok(None),
            Some(value) => value
                .clone()
                .try_into()
                .map(Some)
                .map_err(|e: toml::de::Error| Error::config(format!("[{name}]: {e}"))),
        }
    }
}

/// Builds an `OobConfig` from a TOML string or file.
pub struct OobConfigBuilder {
    debug_enabled: bool,
    source: Result<String, Error>,
}

impl OobConfigBuilder {
    /// Parses the TOML source.
    pub fn build(self) -> Result<OobConfig, Error> {
        let toml = self.source?;
        let table = toml::from_str::<toml::Table>(&toml)
            .map_err(|e| Error::config(format!("toml: {e}")))?;
        Ok(OobConfig {
            debug_enabled: self.debug_enabled,
            table,
        })
    }

    /// Echo log lines to stdout.
    pub fn debug(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    /// Reads `file_name` from the home directory, falling back to the
    /// working directory.
    pub fn toml_file(mut self, file_name: &str) -> Self {
        #[allow(deprecated)]
        let home_path = home_dir().map(|home| home.join(file_name));
        let local_path = PathBuf::from(".").join(file_name);
        self.source = home_path
            .and_then(|path| read_to_string(path).ok())
            .map(Ok)
            .unwrap_or_else(|| {
                read_to_string(&local_path)
                    .map_err(|e| Error::Io(e, format!("{}", local_path.display())))
            });
        self
    }

    /// Uses a TOML string slice.
    pub fn toml_str(self, toml: &str) -> Self {
        self.toml_string(toml.to_string())
    }

    /// Uses a TOML string.
    pub fn toml_string(mut self, toml: String) -> Self {
        self.source = Ok(toml);
        self
    }
}
