// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

#![warn(missing_docs)]
//! Cloud data pipeline plumbing: lazy paginated listing of remote
//! collections, retrying SQL transactions, and thin wrappers over the AWS
//! storage and messaging clients they are usually paired with.

#[cfg(feature = "aws")]
/// Wrappers which provide access to AWS S3, SQS and SNS.
pub mod aws;
#[cfg(feature = "aws")]
pub use aws::*;

/// Types common to multiple wrappers.
pub mod common;
pub use common::*;

#[cfg(feature = "log")]
/// Thread-safe logging.
pub mod log;
#[cfg(feature = "log")]
pub use log::*;

/// Lazy, single-pass listing of remote collections in pages.
pub mod paginate;
pub use paginate::*;

#[cfg(feature = "sql")]
/// Retrying SQL transactions and SQL script parsing.
pub mod sql;
#[cfg(feature = "sql")]
pub use sql::*;
