// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use super::Page;

/// In-progress pagination state. It exists for one traversal only.
///
/// `exhausted` becomes `true` once a page arrives without a continuation token,
/// or once `items_so_far` reaches `max_items`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ListingCursor {
    /// Items requested per remote call.
    pub page_size: usize,
    /// Upper bound across all pages, `None` for unbounded.
    pub max_items: Option<usize>,
    /// Items handed to the caller so far.
    pub items_so_far: usize,
    /// Token from the last page, if any.
    pub continuation_token: Option<String>,
    /// No further remote calls will be made.
    pub exhausted: bool,
}

impl ListingCursor {
    pub(crate) fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    /// Items still allowed before `max_items` is reached.
    pub fn remaining(&self) -> Option<usize> {
        self.max_items
            .map(|max| max.saturating_sub(self.items_so_far))
    }

    /// Size argument for the next remote call.
    pub fn request_size(&self) -> usize {
        match self.remaining() {
            Some(remaining) => self.page_size.min(remaining),
            None => self.page_size,
        }
    }

    pub(crate) fn set_max_items(&mut self, max_items: Option<usize>) {
        self.max_items = max_items;
        if self.reached_max() {
            self.exhaust();
        }
    }

    pub(crate) fn exhaust(&mut self) {
        self.exhausted = true;
        self.continuation_token = None;
    }

    fn reached_max(&self) -> bool {
        self.max_items
            .map(|max| self.items_so_far >= max)
            .unwrap_or(false)
    }

    /// Apply a fetched page and return the items the caller may see.
    pub(crate) fn advance<T>(&mut self, page: Page<T>) -> Vec<T> {
        let Page {
            mut items,
            next_token,
        } = page;
        if let Some(remaining) = self.remaining() {
            items.truncate(remaining);
        }
        self.items_so_far += items.len();
        self.exhausted = next_token.is_none() || self.reached_max();
        self.continuation_token = if self.exhausted { None } else { next_token };
        items
    }
}
