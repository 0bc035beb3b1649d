use reqwest::Method;
use std::fmt;
use url::Url;

/// Canonical key of a resumable request: method plus URL.
///
/// The chat id is part of the path, so no request body takes part in the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    method: Method,
    url: String,
}

impl Fingerprint {
    pub fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
