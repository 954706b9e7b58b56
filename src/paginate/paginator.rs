// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use super::ListingCursor;
use crate::common::Error;
use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::sync::Arc;

/// Largest page a remote listing call will return (e.g. S3 `ListObjectsV2`).
pub const REMOTE_MAX_PAGE_SIZE: usize = 1000;

/// One page of a remote listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Page<T> {
    /// Items in remote order.
    pub items: Vec<T>,
    /// Where the next page begins, or `None` if this is the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// The last page of a listing.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Remote "list items with a continuation token" call.
///
/// Implementors perform the network call; `Paginator` decides which pages to ask for.
#[async_trait]
pub trait ListPage: Send + Sync {
    /// Listed item, e.g. an object key.
    type Item: Send;
    /// Remote failure, handed to the caller unchanged.
    type Error: Send;

    /// Fetch at most `page_size` items starting at `continuation_token`.
    async fn list_page(
        &self,
        continuation_token: Option<&str>,
        page_size: usize,
        filter: Option<&str>,
    ) -> Result<Page<Self::Item>, Self::Error>;
}

#[async_trait]
impl<L: ListPage + ?Sized> ListPage for Arc<L> {
    type Item = L::Item;
    type Error = L::Error;

    async fn list_page(
        &self,
        continuation_token: Option<&str>,
        page_size: usize,
        filter: Option<&str>,
    ) -> Result<Page<Self::Item>, Self::Error> {
        (**self)
            .list_page(continuation_token, page_size, filter)
            .await
    }
}

/// Lazily enumerates a remote collection one page per draw.
///
/// A paginator is single-pass: once exhausted, every further draw returns
/// `None` without a remote call. Start over by constructing a new one.
pub struct Paginator<L: ListPage> {
    lister: L,
    cursor: ListingCursor,
    filter: Option<String>,
}

impl<L: ListPage> Paginator<L> {
    /// Creates a paginator. `page_size` is clamped to `REMOTE_MAX_PAGE_SIZE`.
    pub fn new(lister: L, page_size: usize) -> Result<Self, Error> {
        if page_size == 0 {
            return Err(Error::config("page_size must be positive"));
        }
        Ok(Self {
            lister,
            cursor: ListingCursor::new(page_size.min(REMOTE_MAX_PAGE_SIZE)),
            filter: None,
        })
    }

    /// Stop after `max_items` items. `None` or `Some(0)` means unbounded.
    ///
    /// Lowering the limit to one already reached exhausts the paginator.
    pub fn max_items(mut self, max_items: Option<usize>) -> Self {
        self.cursor.set_max_items(max_items.filter(|&max| max > 0));
        self
    }

    /// Opaque filter passed to every remote call, e.g. a key prefix.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Current traversal state.
    pub fn cursor(&self) -> &ListingCursor {
        &self.cursor
    }

    /// `true` once no further remote calls will be made.
    pub fn is_exhausted(&self) -> bool {
        self.cursor.exhausted
    }

    /// Fetch the next page.
    ///
    /// A remote error is returned as is and leaves the cursor untouched, so
    /// drawing again re-issues the same request.
    pub async fn next_page(&mut self) -> Option<Result<Vec<L::Item>, L::Error>> {
        if self.cursor.exhausted {
            return None;
        }
        if self.cursor.request_size() == 0 {
            self.cursor.exhaust();
            return None;
        }
        let page = self
            .lister
            .list_page(
                self.cursor.continuation_token.as_deref(),
                self.cursor.request_size(),
                self.filter.as_deref(),
            )
            .await;
        Some(page.map(|page| self.cursor.advance(page)))
    }

    /// Drain every remaining page into one vector.
    pub async fn collect_items(mut self) -> Result<Vec<L::Item>, L::Error> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await {
            items.extend(page?);
        }
        Ok(items)
    }

    /// The remaining pages as a stream. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<L::Item>, L::Error>> {
        stream::unfold((self, false), |(mut paginator, failed)| async move {
            if failed {
                return None;
            }
            let page = paginator.next_page().await?;
            let failed = page.is_err();
            Some((page, (paginator, failed)))
        })
    }
}
