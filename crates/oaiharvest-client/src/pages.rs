//! Lazy `ListRecords` pagination

use std::iter::FusedIterator;

use crate::client::OaiClient;
use crate::error::OaiError;
use crate::request::ListRecordsArgs;
use crate::response::RecordPage;
use crate::transport::Transport;

/// Iterator over the pages of one `ListRecords` sequence.
///
/// Each `next` issues exactly one request. The iterator ends after the page
/// without a resumption token, or after yielding the first error.
pub struct RecordPages<'a, T> {
    client: &'a OaiClient<T>,
    next: Option<ListRecordsArgs>,
}

impl<'a, T: Transport> RecordPages<'a, T> {
    pub(crate) fn new(client: &'a OaiClient<T>, args: ListRecordsArgs) -> Self {
        Self {
            client,
            next: Some(args),
        }
    }

    /// Arguments of the request the next call will issue
    pub fn pending(&self) -> Option<&ListRecordsArgs> {
        self.next.as_ref()
    }
}

impl<T: Transport> Iterator for RecordPages<'_, T> {
    type Item = Result<RecordPage, OaiError>;

    fn next(&mut self) -> Option<Self::Item> {
        let args = self.next.take()?;
        let page = self.client.list_records(&args);
        if let Ok(page) = &page {
            self.next = page.resumption_token.clone().map(ListRecordsArgs::resume);
        }
        Some(page)
    }
}

impl<T: Transport> FusedIterator for RecordPages<'_, T> {}
