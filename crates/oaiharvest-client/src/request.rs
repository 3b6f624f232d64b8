//! Request URL construction

use url::Url;

/// Arguments of a `ListRecords` request.
///
/// Once a resumption token is set it is sent alone: repositories reject
/// filter arguments next to a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRecordsArgs {
    pub metadata_prefix: String,
    pub from: Option<String>,
    pub until: Option<String>,
    pub set: Option<String>,
    pub resumption_token: Option<String>,
}

impl ListRecordsArgs {
    /// Initial request for a metadata format
    pub fn new(metadata_prefix: impl Into<String>) -> Self {
        Self {
            metadata_prefix: metadata_prefix.into(),
            ..Default::default()
        }
    }

    /// Continue a pagination sequence
    pub fn resume(token: impl Into<String>) -> Self {
        Self {
            resumption_token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_until(mut self, until: impl Into<String>) -> Self {
        self.until = Some(until.into());
        self
    }

    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    /// Whether this continues a sequence rather than starting one
    pub fn is_resumption(&self) -> bool {
        self.resumption_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Query arguments in protocol order (empty values dropped later)
    pub(crate) fn query(&self) -> Vec<(&'static str, &str)> {
        if let Some(token) = self.resumption_token.as_deref().filter(|t| !t.is_empty()) {
            return vec![("verb", "ListRecords"), ("resumptionToken", token)];
        }
        vec![
            ("verb", "ListRecords"),
            ("from", self.from.as_deref().unwrap_or_default()),
            ("until", self.until.as_deref().unwrap_or_default()),
            ("set", self.set.as_deref().unwrap_or_default()),
            ("metadataPrefix", self.metadata_prefix.as_str()),
        ]
    }
}

/// Base URL + form-encoded non-empty arguments
pub(crate) fn request_url(base: &Url, args: &[(&str, &str)]) -> String {
    let mut url = base.clone();
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in args.iter().filter(|(_, v)| !v.is_empty()) {
            pairs.append_pair(key, value);
        }
    }
    url.into()
}
