pub mod client;

pub use client::HttpClient;

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::{Method, Uri};

use crate::error::{Result, ScanError};
use crate::module::Module;

/// A concrete outbound request produced from a module template.
///
/// `target` is the URL exactly as it was written; `uri` is the same text
/// parsed without any normalization, so dot segments and percent escapes
/// reach the wire untouched.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub target: String,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpRequest {
    pub fn new(method: Method, target: &str, headers: HeaderMap, body: String) -> Result<Self> {
        Ok(Self {
            method,
            target: target.to_string(),
            uri: parse_target(target)?,
            headers,
            body,
        })
    }

    /// Builds the request for one path of `module` against `base_url`.
    ///
    /// The URL is the plain concatenation `base_url + path`; no slashes are
    /// added or removed. An empty method means GET.
    pub fn from_module(module: &Module, base_url: &str, path: &str) -> Result<Self> {
        let method = parse_method(&module.request.method)?;

        let headers = build_header_map(&module.request.headers)?;
        let target = format!("{}{}", base_url, path);

        Self::new(method, &target, headers, module.request.body.clone())
    }
}

fn parse_target(raw: &str) -> Result<Uri> {
    let uri: Uri = raw
        .parse()
        .map_err(|e| ScanError::RequestBuild(format!("invalid url '{}': {}", raw, e)))?;
    match uri.scheme_str() {
        Some("http") | Some("https") if uri.authority().is_some() => Ok(uri),
        _ => Err(ScanError::RequestBuild(format!(
            "invalid url '{}': expected an absolute http or https url",
            raw
        ))),
    }
}

fn parse_method(raw: &str) -> Result<Method> {
    if raw.is_empty() {
        return Ok(Method::GET);
    }
    Method::from_bytes(raw.as_bytes())
        .map_err(|_| ScanError::RequestBuild(format!("invalid method '{}'", raw)))
}

/// Splits `"Key: Value"` lines on the first colon and trims both halves.
/// Lines without a colon are dropped.
pub fn parse_header_lines(raw: &[String]) -> Vec<(String, String)> {
    raw.iter()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Builds a header map where a later duplicate key replaces the earlier one.
pub fn build_header_map(raw: &[String]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in parse_header_lines(raw) {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| ScanError::RequestBuild(format!("invalid header name '{}'", key)))?;
        let value = HeaderValue::from_str(&value).map_err(|_| {
            ScanError::RequestBuild(format!("invalid value for header '{}'", key))
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// A fully-read response: everything the match evaluator looks at.
///
/// The body is kept as raw bytes; binary and non-UTF-8 responses are matched
/// byte for byte.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The request URL as it was written, never normalized.
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// Raw value of the first named header, or empty when absent.
    pub fn header(&self, name: &str) -> &[u8] {
        self.headers.get(name).map(HeaderValue::as_bytes).unwrap_or_default()
    }
}
