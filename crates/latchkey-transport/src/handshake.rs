//! The transport-neutral view of an upgrade request.

use std::borrow::Cow;

/// What an authorizer may inspect when a channel is being opened: the
/// raw query string and the request headers.
#[derive(Debug, Clone, Default)]
pub struct HandshakeRequest {
    query: Option<String>,
    headers: Vec<(String, String)>,
}

impl HandshakeRequest {
    /// Builds a request view from a query string (without `?`) and headers.
    pub fn new(query: Option<String>, headers: Vec<(String, String)>) -> Self {
        Self { query, headers }
    }

    /// Builder-style header insert.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Percent-decoded value of the first query parameter named `name`.
    ///
    /// `Some("")` means the parameter was present but empty. A value that
    /// does not decode to UTF-8 is returned as sent.
    pub fn query_param(&self, name: &str) -> Option<Cow<'_, str>> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then(|| urlencoding::decode(value).unwrap_or(Cow::Borrowed(value)))
        })
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
