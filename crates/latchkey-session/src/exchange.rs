//! The request/response surface the session state machine works through.

use std::collections::BTreeMap;

use cookie::Cookie;

/// Read request cookies and headers, write response cookies.
///
/// Implement this over whatever HTTP framework carries the request; the
/// session code never sees anything else of it.
pub trait CookieExchange {
    /// Value of the request cookie named `name`.
    fn request_cookie(&self, name: &str) -> Option<&str>;

    /// Value of the request header named `name` (case-insensitive).
    fn request_header(&self, name: &str) -> Option<&str>;

    /// Queues a `Set-Cookie` on the response.
    fn set_cookie(&mut self, cookie: Cookie<'static>);
}

/// An in-memory [`CookieExchange`].
///
/// Holds one request's cookies and headers and collects the cookies
/// written in response. [`next_request`](Self::next_request) plays the
/// browser: it applies the written cookies to the jar and returns the
/// exchange for the following request.
#[derive(Debug, Clone, Default)]
pub struct MemoryExchange {
    cookies: BTreeMap<String, String>,
    headers: Vec<(String, String)>,
    written: Vec<Cookie<'static>>,
}

impl MemoryExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `Cookie:` request header. Malformed pairs are skipped;
    /// for a repeated name the first occurrence wins.
    pub fn from_cookie_header(header: &str) -> Self {
        let mut exchange = Self::new();
        for cookie in Cookie::split_parse(header).flatten() {
            exchange
                .cookies
                .entry(cookie.name().to_string())
                .or_insert_with(|| cookie.value().to_string());
        }
        exchange.headers.push(("Cookie".to_string(), header.to_string()));
        exchange
    }

    /// Builder-style request cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Builder-style request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Every cookie written so far, in write order.
    pub fn written(&self) -> &[Cookie<'static>] {
        &self.written
    }

    /// The last cookie written under `name`.
    pub fn written_cookie(&self, name: &str) -> Option<&Cookie<'static>> {
        self.written.iter().rev().find(|c| c.name() == name)
    }

    /// The response's `Set-Cookie` header values.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.written.iter().map(|c| c.to_string()).collect()
    }

    /// The exchange a browser would send next: this request's jar with
    /// the written cookies applied. Cookies written empty or with a zero
    /// `Max-Age` are removed from the jar.
    pub fn next_request(&self) -> Self {
        let mut cookies = self.cookies.clone();
        for cookie in &self.written {
            let cleared = cookie.value().is_empty()
                || cookie.max_age().is_some_and(|age| age <= time::Duration::ZERO);
            if cleared {
                cookies.remove(cookie.name());
            } else {
                cookies.insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
        Self {
            cookies,
            ..Self::default()
        }
    }
}

impl CookieExchange for MemoryExchange {
    fn request_cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    fn request_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.written.push(cookie);
    }
}
