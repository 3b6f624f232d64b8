//! Blocking OAI-PMH protocol client

use url::Url;

use crate::error::{NO_RECORDS_MATCH, OaiError, TransportCause};
use crate::pages::RecordPages;
use crate::request::{ListRecordsArgs, request_url};
use crate::response::{
    Envelope, GetRecordBody, ListRecordsBody, Payload, Record, RecordPage, RepositoryInfo,
    VerbBody, parse_envelope,
};
use crate::transport::Transport;

/// Protocol client bound to one repository base URL.
///
/// Every call is a single request: no retries, no hidden pagination.
/// Use [`OaiClient::pages`] to walk a `ListRecords` sequence.
#[derive(Debug, Clone)]
pub struct OaiClient<T> {
    base_url: Url,
    transport: T,
}

impl<T: Transport> OaiClient<T> {
    pub fn new(base_url: &str, transport: T) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            transport,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `Identify`: repository self-description
    pub fn identify(&self) -> Result<RepositoryInfo, OaiError> {
        let url = request_url(&self.base_url, &[("verb", "Identify")]);
        let envelope = self.call::<RepositoryInfo>(&url)?;
        into_body(url, envelope.payload)
    }

    /// One `ListRecords` page.
    ///
    /// `noRecordsMatch` is an empty result, not an error.
    pub fn list_records(&self, args: &ListRecordsArgs) -> Result<RecordPage, OaiError> {
        let url = request_url(&self.base_url, &args.query());
        let Envelope {
            response_date,
            payload,
        } = self.call::<ListRecordsBody>(&url)?;
        match payload {
            Payload::Errors(errors)
                if !errors.is_empty() && errors.iter().all(|e| e.code == NO_RECORDS_MATCH) =>
            {
                log::debug!("{url}: no records match");
                Ok(RecordPage::empty(response_date))
            }
            payload => {
                let body = into_body(url, payload)?;
                Ok(RecordPage::from_body(body, response_date))
            }
        }
    }

    /// `GetRecord` for a single identifier
    pub fn get_record(&self, identifier: &str, metadata_prefix: &str) -> Result<Record, OaiError> {
        let url = request_url(
            &self.base_url,
            &[
                ("verb", "GetRecord"),
                ("identifier", identifier),
                ("metadataPrefix", metadata_prefix),
            ],
        );
        let envelope = self.call::<GetRecordBody>(&url)?;
        into_body(url, envelope.payload).map(|body| body.record)
    }

    /// Lazily walk a `ListRecords` sequence page by page, following
    /// resumption tokens until the last page or the first error.
    pub fn pages(&self, args: ListRecordsArgs) -> RecordPages<'_, T> {
        RecordPages::new(self, args)
    }

    fn call<B: VerbBody>(&self, url: &str) -> Result<Envelope<B>, OaiError> {
        let transport_failure = |cause: TransportCause| OaiError::Transport {
            url: url.to_string(),
            cause,
        };

        let bytes = self.transport.fetch(url).map_err(transport_failure)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| transport_failure(TransportCause::malformed(format!("not UTF-8: {e}"))))?;
        parse_envelope::<B>(text).map_err(transport_failure)
    }
}

/// Body of a successful response; the first error condition otherwise
fn into_body<B>(url: String, payload: Payload<B>) -> Result<B, OaiError> {
    match payload {
        Payload::Body(body) => Ok(body),
        Payload::Errors(errors) => {
            if errors.len() > 1 {
                log::debug!("{url}: {} error conditions, reporting the first", errors.len());
            }
            match errors.into_iter().next() {
                Some(first) => Err(OaiError::Protocol {
                    url,
                    code: first.code,
                    message: first.message,
                }),
                None => Err(OaiError::Transport {
                    url,
                    cause: TransportCause::malformed("empty error list"),
                }),
            }
        }
    }
}
