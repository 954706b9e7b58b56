// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

/// Traversal state of one enumeration.
mod cursor;
/// Lazy, single-pass paginator over a `ListPage` capability.
mod paginator;

pub use self::cursor::ListingCursor;
pub use self::paginator::{ListPage, Page, Paginator, REMOTE_MAX_PAGE_SIZE};
