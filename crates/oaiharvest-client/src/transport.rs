//! Transport seam between the protocol client and the network

use oaiharvest_core::{HttpClient, HttpConfig};

use crate::error::TransportCause;

/// Fetches the raw body of a fully built request URL.
pub trait Transport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportCause>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportCause> {
        (**self).fetch(url)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportCause> {
        (**self).fetch(url)
    }
}

/// HTTP GET through the shared blocking client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportCause> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportCause> {
        log::debug!("GET {url}");
        Ok(self.client.get_bytes(url)?)
    }
}
