//! Offset-based walking of BaseSpace list endpoints.
//!
//! The server reports `TotalCount` and `DisplayedCount` on every page. The
//! cursor advances by `DisplayedCount` and stops once the offset reaches the
//! total seen on the first page.

use std::collections::VecDeque;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{BaseSpaceClient, Endpoint};
use crate::cancel::CancelToken;
use crate::domain::{ProjectId, SampleId};
use crate::error::BsError;
use crate::schema::{self, ListPage};

/// A list endpoint parameterised by its parent resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    SampleFiles(SampleId),
    ProjectSamples(ProjectId),
}

impl Listing {
    pub fn endpoint(&self, offset: u64) -> Endpoint {
        match self {
            Listing::SampleFiles(sample) => Endpoint::SampleFiles {
                sample: sample.clone(),
                offset,
            },
            Listing::ProjectSamples(project) => Endpoint::ProjectSamples {
                project: project.clone(),
                offset,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub offset: u64,
    /// `None` until the first page has been decoded.
    pub total: Option<u64>,
}

impl PageCursor {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.total, Some(total) if self.offset >= total)
    }

    /// Folds one decoded page into the cursor.
    pub fn advance(&mut self, total_count: u64, displayed_count: u64) -> Result<(), BsError> {
        let total = *self.total.get_or_insert(total_count);
        if displayed_count == 0 && self.offset < total {
            return Err(BsError::PaginationStalled {
                offset: self.offset,
                total,
            });
        }
        self.offset = self.offset.checked_add(displayed_count).ok_or_else(|| {
            BsError::decode(
                "page cursor",
                format!(
                    "DisplayedCount {displayed_count} overflows offset {}",
                    self.offset
                ),
            )
        })?;
        Ok(())
    }
}

pub struct Paginator<'a, C: BaseSpaceClient + ?Sized, T> {
    client: &'a C,
    listing: Listing,
    cursor: PageCursor,
    buffer: VecDeque<T>,
    cancel: CancelToken,
    pages_fetched: usize,
    done: bool,
    _item: PhantomData<fn() -> T>,
}

/// Lazily lists every item under `listing`, starting at offset 0.
pub fn paginate<C, T>(client: &C, listing: Listing) -> Paginator<'_, C, T>
where
    C: BaseSpaceClient + ?Sized,
    T: DeserializeOwned,
{
    Paginator::new(client, listing, CancelToken::default())
}

impl<'a, C, T> Paginator<'a, C, T>
where
    C: BaseSpaceClient + ?Sized,
    T: DeserializeOwned,
{
    pub fn new(client: &'a C, listing: Listing, cancel: CancelToken) -> Self {
        Self {
            client,
            listing,
            cursor: PageCursor::default(),
            buffer: VecDeque::new(),
            cancel,
            pages_fetched: 0,
            done: false,
            _item: PhantomData,
        }
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn fetch_page(&mut self) -> Result<(), BsError> {
        self.cancel.check()?;
        let endpoint = self.listing.endpoint(self.cursor.offset);
        let body = self.client.fetch(&endpoint)?;
        self.pages_fetched += 1;
        let page: ListPage<T> = schema::decode_response(&endpoint.path(), &body)?;
        self.cursor.advance(page.total_count, page.displayed_count)?;
        debug!(
            listing = ?self.listing,
            offset = self.cursor.offset,
            total = ?self.cursor.total,
            items = page.items.len(),
            "page decoded"
        );
        self.buffer.extend(page.items);
        Ok(())
    }
}

impl<C, T> Iterator for Paginator<'_, C, T>
where
    C: BaseSpaceClient + ?Sized,
    T: DeserializeOwned,
{
    type Item = Result<T, BsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.done || self.cursor.is_exhausted() {
                self.done = true;
                return None;
            }
            if let Err(err) = self.fetch_page() {
                self.done = true;
                self.buffer.clear();
                return Some(Err(err));
            }
        }
    }
}

impl<C, T> std::iter::FusedIterator for Paginator<'_, C, T>
where
    C: BaseSpaceClient + ?Sized,
    T: DeserializeOwned,
{
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn cursor_sentinel_until_first_page() {
        let mut cursor = PageCursor::default();
        assert!(!cursor.is_exhausted());
        cursor.advance(3, 2).unwrap();
        assert_eq!(cursor.total, Some(3));
        assert!(!cursor.is_exhausted());
        cursor.advance(99, 1).unwrap();
        assert_eq!(cursor.total, Some(3));
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn empty_listing_terminates() {
        let mut cursor = PageCursor::default();
        cursor.advance(0, 0).unwrap();
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn zero_displayed_count_is_guarded() {
        let mut cursor = PageCursor::default();
        cursor.advance(10, 4).unwrap();
        let err = cursor.advance(10, 0).unwrap_err();
        assert_matches!(err, BsError::PaginationStalled { offset: 4, total: 10 });
    }

    #[test]
    fn oversized_displayed_count_is_decode_error() {
        let mut cursor = PageCursor::default();
        cursor.advance(10, 1).unwrap();
        let err = cursor.advance(10, u64::MAX).unwrap_err();
        assert_matches!(err, BsError::Decode { .. });
        assert_eq!(cursor.offset, 1);
    }
}
