//! Fetch Request/Response Model
//!
//! The request and response types seen by the worker. Bodies are fully
//! buffered, so a response stored in a cache is always a complete clone of
//! the one handed back to the page.

use std::collections::BTreeMap;
use std::fmt;

use url::Url;

/// Method of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the page will do with the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestDestination {
    /// `fetch()` / XHR
    #[default]
    Empty,
    /// Top-level or nested document
    Document,
    Font,
    Image,
    Manifest,
    Script,
    Style,
    Worker,
}

/// How the request crosses origins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    SameOrigin,
    NoCors,
    #[default]
    Cors,
    /// Top-level page load
    Navigate,
}

/// A request offered to the worker
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: RequestMethod,
    pub headers: BTreeMap<String, String>,
    /// Only set for POSTs the worker sends itself (background sync)
    pub body: Option<Vec<u8>>,
    pub destination: RequestDestination,
    pub mode: RequestMode,
}

impl Request {
    /// A plain `fetch()` of `url`
    pub fn new(method: RequestMethod, url: Url) -> Self {
        Self {
            url,
            method,
            headers: BTreeMap::default(),
            body: None,
            destination: RequestDestination::default(),
            mode: RequestMode::default(),
        }
    }

    /// Parse `url` and build a plain GET request.
    pub fn get(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(RequestMethod::Get, Url::parse(url)?))
    }

    /// Parse `url` and build a top-level navigation request.
    pub fn navigate(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::get(url)?
            .with_mode(RequestMode::Navigate)
            .with_destination(RequestDestination::Document))
    }

    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: RequestDestination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether this request loads a document (navigation or document destination).
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate || self.destination == RequestDestination::Document
    }

    /// URL path component
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Whether the request targets the same origin as `origin`.
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }

    /// Cache key: method plus URL without its fragment.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        format!("{}:{}", self.method.as_str(), url)
    }
}

/// A fully buffered response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL (empty for synthesized responses)
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    /// Empty response with `status`
    pub fn new(status: u16) -> Self {
        Self {
            url: String::default(),
            status,
            status_text: reason_phrase(status).to_string(),
            headers: BTreeMap::default(),
            body: Vec::default(),
        }
    }

    /// The synthesized `503 Offline` response.
    pub fn offline() -> Self {
        Self::new(503)
            .with_header("Content-Type", "text/plain")
            .with_body("Offline")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// 2xx status. Only these are ever written to a cache.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8 (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Reason phrases for the statuses the site and the worker produce
fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        304 => "Not Modified",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}

/// Result of offering a request to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; the page performs the fetch itself.
    Passthrough,
    /// The worker answered with this response.
    Responded(Response),
}

impl FetchOutcome {
    /// The response, if the worker answered.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Responded(response) => Some(response),
            Self::Passthrough => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Responded(response) => Some(response),
            Self::Passthrough => None,
        }
    }
}
