//! Incoming HTTP request metadata

use super::{missing_capabilities, EnrichmentBlock, Enricher};
use crate::error::LoggerError;
use serde_json::{json, Map, Value as JsonValue};
use std::borrow::Cow;

pub const BLOCK_NAME: &str = "request";

const USER_AGENT: &str = "user-agent";
const NO_USER_AGENT: &str = "none";

/// Result of looking a header up on a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLookup<'a> {
    /// The request type has no header access at all
    Unsupported,
    Missing,
    Found(Cow<'a, str>),
}

/// What the logger needs from an HTTP request.
///
/// `method`, `base_url` and `path` must be present for a request to be
/// usable. A missing query string is reported as empty.
pub trait WebRequest {
    fn method(&self) -> Option<Cow<'_, str>>;

    /// Scheme and authority with a trailing slash, e.g. `https://example.com/`
    fn base_url(&self) -> Option<Cow<'_, str>>;

    fn header(&self, name: &str) -> HeaderLookup<'_>;

    fn path(&self) -> Option<Cow<'_, str>>;

    fn query(&self) -> Option<Cow<'_, str>>;
}

/// A request decoded from JSON: `method`, `base_url`, `path`, `query` and a
/// `headers` object
impl WebRequest for JsonValue {
    fn method(&self) -> Option<Cow<'_, str>> {
        self.get("method").and_then(JsonValue::as_str).map(Cow::Borrowed)
    }

    fn base_url(&self) -> Option<Cow<'_, str>> {
        self.get("base_url").and_then(JsonValue::as_str).map(Cow::Borrowed)
    }

    fn header(&self, name: &str) -> HeaderLookup<'_> {
        let Some(headers) = self.get("headers").and_then(JsonValue::as_object) else {
            return HeaderLookup::Unsupported;
        };
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_str())
            .map_or(HeaderLookup::Missing, |value| HeaderLookup::Found(Cow::Borrowed(value)))
    }

    fn path(&self) -> Option<Cow<'_, str>> {
        self.get("path").and_then(JsonValue::as_str).map(Cow::Borrowed)
    }

    fn query(&self) -> Option<Cow<'_, str>> {
        self.get("query").and_then(JsonValue::as_str).map(Cow::Borrowed)
    }
}

impl<B> WebRequest for http::Request<B> {
    fn method(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.method().as_str()))
    }

    fn base_url(&self) -> Option<Cow<'_, str>> {
        let scheme = self.uri().scheme_str().unwrap_or("http");
        let authority = match self.uri().authority() {
            Some(authority) => authority.as_str(),
            None => self.headers().get(http::header::HOST)?.to_str().ok()?,
        };
        Some(Cow::Owned(format!("{scheme}://{authority}/")))
    }

    fn header(&self, name: &str) -> HeaderLookup<'_> {
        match self.headers().get(name) {
            Some(value) => HeaderLookup::Found(match value.to_str() {
                Ok(value) => Cow::Borrowed(value),
                Err(_) => String::from_utf8_lossy(value.as_bytes()),
            }),
            None => HeaderLookup::Missing,
        }
    }

    fn path(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.uri().path()))
    }

    fn query(&self) -> Option<Cow<'_, str>> {
        self.uri().query().map(Cow::Borrowed)
    }
}

pub struct WebRequestEnricher<'a> {
    request: &'a dyn WebRequest,
}

impl<'a> WebRequestEnricher<'a> {
    pub fn new(request: &'a dyn WebRequest) -> Self {
        Self { request }
    }
}

impl Enricher for WebRequestEnricher<'_> {
    fn source_name(&self) -> &'static str {
        "web request"
    }

    fn extract(&self) -> Result<EnrichmentBlock, LoggerError> {
        let request = self.request;
        let method = request.method();
        let base_url = request.base_url();
        let path = request.path();
        let user_agent = request.header(USER_AGENT);

        let missing = missing_capabilities([
            ("method", method.is_some()),
            ("base_url", base_url.is_some()),
            ("headers", user_agent != HeaderLookup::Unsupported),
            ("path", path.is_some()),
        ]);
        let (Some(method), Some(base_url), Some(path)) = (method, base_url, path) else {
            return Err(shape_error(&missing));
        };
        let user_agent = match user_agent {
            HeaderLookup::Found(value) => value,
            HeaderLookup::Missing => Cow::Borrowed(NO_USER_AGENT),
            HeaderLookup::Unsupported => return Err(shape_error(&missing)),
        };

        let mut fields = Map::new();
        fields.insert("method".to_string(), json!(method));
        fields.insert("base_url".to_string(), json!(base_url));
        fields.insert("user_agent".to_string(), json!(user_agent));
        fields.insert("path".to_string(), json!(path));
        fields.insert(
            "query".to_string(),
            json!(request.query().unwrap_or_default()),
        );

        Ok(EnrichmentBlock::new(BLOCK_NAME, fields))
    }
}

fn shape_error(missing: &[&str]) -> LoggerError {
    LoggerError::EnrichmentShape {
        subject: "Request object".to_string(),
        interface: "WebRequest",
        reason: format!("missing: {}", missing.join(", ")),
    }
}
