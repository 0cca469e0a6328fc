//! Immutable proxy and route definitions.
//!
//! A [`ProxyDefinition`] describes one module's mount point (local endpoint
//! prefix, upstream base URL, header block-list). A [`RouteDefinition`]
//! describes one forwarded endpoint under that mount point. Both are
//! validated eagerly: a definition that constructs successfully can be bound
//! to the router without any request-time surprises, and a misconfigured one
//! never becomes a live route.
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    time::Duration,
};

use http::{HeaderMap, HeaderName, HeaderValue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::auth::AuthCredential;

/// Effective default for per-route forwarding timeouts, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Matches `{name}` path placeholders; the same syntax the host router uses
/// for path captures, so local templates can be registered verbatim.
pub(crate) static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("invalid placeholder regex"));

/// Definition-level validation error types
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid {field} '{value}': must start with '/'")]
    MissingLeadingSlash { field: &'static str, value: String },

    #[error("Invalid target URL '{url}': {message}")]
    InvalidTargetUrl { url: String, message: String },

    #[error("Loopback target URL is not allowed: {url}")]
    LoopbackTarget { url: String },

    #[error("Invalid HTTP method: {method}")]
    InvalidMethod { method: String },

    #[error("Duplicate path parameter: {name}")]
    DuplicatePathParam { name: String },

    #[error("Path placeholder mismatch between '{local}' and '{upstream}': {message}")]
    PlaceholderMismatch {
        local: String,
        upstream: String,
        message: String,
    },

    #[error("Invalid static header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Module '{id}' is already registered")]
    DuplicateModule { id: String },
}

/// HTTP methods a route may forward. Parsed case-insensitively; anything
/// outside this set is rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ValidationError::InvalidMethod {
                method: value.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether a forwarded call of this method carries a body. GET and
    /// DELETE forwards are always body-less.
    pub fn allows_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    pub fn as_http(&self) -> http::Method {
        match self {
            Self::Get => http::Method::GET,
            Self::Post => http::Method::POST,
            Self::Put => http::Method::PUT,
            Self::Patch => http::Method::PATCH,
            Self::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A static query parameter value: configuration may give either a string
/// or an integer, both serialize onto the query string the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// One module's mount point: where it listens locally and where it forwards.
///
/// Constructed once at module initialization and immutable afterwards.
#[derive(Debug, Clone)]
pub struct ProxyDefinition {
    endpoint: String,
    target_base: Url,
    excluded_headers: Option<HashSet<String>>,
}

impl ProxyDefinition {
    /// Validate and construct a mount point definition.
    ///
    /// Fails when the endpoint does not start with `/`, the target is not an
    /// absolute HTTP(S) URL, or the target host is loopback.
    pub fn new(
        endpoint: impl Into<String>,
        target_base: &str,
        excluded_headers: Option<HashSet<String>>,
    ) -> Result<Self, ValidationError> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with('/') {
            return Err(ValidationError::MissingLeadingSlash {
                field: "endpoint",
                value: endpoint,
            });
        }

        let url = Url::parse(target_base).map_err(|e| ValidationError::InvalidTargetUrl {
            url: target_base.to_string(),
            message: e.to_string(),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ValidationError::InvalidTargetUrl {
                url: target_base.to_string(),
                message: format!("URL scheme must be 'http' or 'https', got '{}'", url.scheme()),
            });
        }

        let host = url
            .host_str()
            .ok_or_else(|| ValidationError::InvalidTargetUrl {
                url: target_base.to_string(),
                message: "URL must have a valid host".to_string(),
            })?;

        if host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" {
            return Err(ValidationError::LoopbackTarget {
                url: target_base.to_string(),
            });
        }

        // Lower-case the block-list once so request-time filtering stays a
        // plain set lookup.
        let excluded_headers =
            excluded_headers.map(|set| set.into_iter().map(|h| h.to_ascii_lowercase()).collect());

        Ok(Self {
            endpoint,
            target_base: url,
            excluded_headers,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn target_base(&self) -> &Url {
        &self.target_base
    }

    pub fn excluded_headers(&self) -> Option<&HashSet<String>> {
        self.excluded_headers.as_ref()
    }

    /// Join a resolved upstream path onto the target base.
    pub fn upstream_url(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.target_base.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}"))
    }
}

/// One forwarded endpoint: a local path+method mapped to an upstream path,
/// with optional static query/body/header data, credentials and a timeout.
///
/// Built through [`RouteDefinition::builder`]; `build` runs every
/// construction-time check, so a `RouteDefinition` value is always valid.
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    local_path: String,
    upstream_path: String,
    method: Method,
    path_params: Vec<String>,
    query_params: BTreeMap<String, QueryValue>,
    static_body: Option<serde_json::Value>,
    static_headers: HeaderMap,
    auth: Option<AuthCredential>,
    timeout: Duration,
    name: Option<String>,
    tags: Vec<String>,
}

impl RouteDefinition {
    pub fn builder(
        local_path: impl Into<String>,
        upstream_path: impl Into<String>,
        method: impl Into<String>,
    ) -> RouteDefinitionBuilder {
        RouteDefinitionBuilder {
            local_path: local_path.into(),
            upstream_path: upstream_path.into(),
            method: method.into(),
            path_params: Vec::new(),
            query_params: BTreeMap::new(),
            static_body: None,
            headers: Vec::new(),
            auth: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            name: None,
            tags: Vec::new(),
        }
    }

    pub fn local_path(&self) -> &str {
        &self.local_path
    }

    pub fn upstream_path(&self) -> &str {
        &self.upstream_path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path_params(&self) -> &[String] {
        &self.path_params
    }

    pub fn query_params(&self) -> &BTreeMap<String, QueryValue> {
        &self.query_params
    }

    pub fn static_body(&self) -> Option<&serde_json::Value> {
        self.static_body.as_ref()
    }

    pub fn static_headers(&self) -> &HeaderMap {
        &self.static_headers
    }

    pub fn auth(&self) -> Option<&AuthCredential> {
        self.auth.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Builder for [`RouteDefinition`]; validation happens in [`build`].
///
/// [`build`]: RouteDefinitionBuilder::build
#[derive(Debug, Clone)]
pub struct RouteDefinitionBuilder {
    local_path: String,
    upstream_path: String,
    method: String,
    path_params: Vec<String>,
    query_params: BTreeMap<String, QueryValue>,
    static_body: Option<serde_json::Value>,
    headers: Vec<(String, String)>,
    auth: Option<AuthCredential>,
    timeout_secs: u64,
    name: Option<String>,
    tags: Vec<String>,
}

impl RouteDefinitionBuilder {
    /// Declare the named path parameters extracted from the inbound path and
    /// substituted into the upstream template.
    pub fn path_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Add a static query parameter appended to every forwarded call.
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Set the static body merged into (or replacing) the inbound body.
    pub fn static_body(mut self, body: serde_json::Value) -> Self {
        self.static_body = Some(body);
        self
    }

    /// Add an extra outbound header. The inbound request wins if it already
    /// carries the same header name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a credential to every forwarded call. It is never validated
    /// locally, only forwarded.
    pub fn auth(mut self, auth: AuthCredential) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn build(self) -> Result<RouteDefinition, ValidationError> {
        if !self.local_path.starts_with('/') {
            return Err(ValidationError::MissingLeadingSlash {
                field: "local_path",
                value: self.local_path,
            });
        }
        if !self.upstream_path.starts_with('/') {
            return Err(ValidationError::MissingLeadingSlash {
                field: "upstream_path",
                value: self.upstream_path,
            });
        }

        let method = Method::parse(&self.method)?;

        let mut seen = HashSet::new();
        for name in &self.path_params {
            if !seen.insert(name.as_str()) {
                return Err(ValidationError::DuplicatePathParam { name: name.clone() });
            }
        }

        let local_placeholders = placeholders(&self.local_path);
        let upstream_placeholders = placeholders(&self.upstream_path);
        let declared: HashSet<String> = self.path_params.iter().cloned().collect();

        if local_placeholders != upstream_placeholders {
            return Err(ValidationError::PlaceholderMismatch {
                local: self.local_path,
                upstream: self.upstream_path,
                message: "local and upstream placeholder sets differ".to_string(),
            });
        }
        if local_placeholders != declared {
            return Err(ValidationError::PlaceholderMismatch {
                local: self.local_path,
                upstream: self.upstream_path,
                message: "declared path_params do not match the path placeholders".to_string(),
            });
        }

        let mut static_headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name =
                HeaderName::try_from(name.as_str()).map_err(|e| ValidationError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            let header_value =
                HeaderValue::try_from(value.as_str()).map_err(|e| ValidationError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            static_headers.append(header_name, header_value);
        }

        Ok(RouteDefinition {
            local_path: self.local_path,
            upstream_path: self.upstream_path,
            method,
            path_params: self.path_params,
            query_params: self.query_params,
            static_body: self.static_body,
            static_headers,
            auth: self.auth,
            timeout: Duration::from_secs(self.timeout_secs),
            name: self.name,
            tags: self.tags,
        })
    }
}

/// Extract the `{name}` placeholder set from a path template.
pub(crate) fn placeholders(path: &str) -> HashSet<String> {
    PLACEHOLDER
        .captures_iter(path)
        .map(|caps| caps[1].to_string())
        .collect()
}
