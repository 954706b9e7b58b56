// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

#[cfg(feature = "toml")]
mod config;
/// An enum that encapsulates a variety of error types.
mod error;
/// Unit tests.
mod tests;
/// Macros for string wrapper tuples.
mod wrapper;

#[cfg(feature = "toml")]
pub use self::config::{OobConfig, OobConfigBuilder};
pub use self::error::Error;
#[cfg(feature = "aws")]
pub use self::error::AnyhowError;
