//! URL composition
//!
//! Builds request URLs from a base URL and path segments, with query
//! parameters and per-provider encoding exceptions. Some providers reject
//! percent-encoded brackets or commas in query strings; an exception map
//! such as `{"%5B": "[", "%5D": "]"}` restores them after encoding.
//!
//! Absolute next-page URLs handed back by a provider are replayed verbatim:
//! their query string is kept byte-for-byte and any parameters added on top
//! are appended after it.

use crate::error::{Error, Result};
use url::Url;

/// Builder for request URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    base: Url,
    /// Query string carried over verbatim from a replayed URL
    raw_query: Option<String>,
    /// Ordered query parameters; `with_query_param` replaces in place
    query: Vec<(String, String)>,
    /// Encoded→literal replacements, applied in insertion order
    encoding_exceptions: Vec<(String, String)>,
}

impl UrlBuilder {
    /// Create a builder from a base URL and path segments
    pub fn new(base_url: &str, segments: &[&str]) -> Result<Self> {
        let mut builder = Self::parse(base_url)?;
        for segment in segments {
            builder.add_path(segment);
        }
        Ok(builder)
    }

    /// Parse an absolute URL, keeping its query string verbatim
    pub fn parse(url: &str) -> Result<Self> {
        let mut base = Url::parse(url)?;
        let raw_query = base.query().filter(|q| !q.is_empty()).map(str::to_string);
        base.set_query(None);
        base.set_fragment(None);
        Ok(Self {
            base,
            raw_query,
            query: Vec::new(),
            encoding_exceptions: Vec::new(),
        })
    }

    /// Check whether a string is an absolute http(s) URL
    pub fn is_absolute(url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }

    /// Append a path suffix; leading and trailing slashes are normalized
    ///
    /// The suffix is path text and may span several segments. Values such
    /// as record ids belong in [`UrlBuilder::push_segment`].
    pub fn add_path(&mut self, segment: &str) -> &mut Self {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            return self;
        }
        let path = format!("{}/{}", self.base.path().trim_end_matches('/'), segment);
        self.base.set_path(&path);
        self
    }

    /// Append a single segment, percent-encoding `/`, `?`, `#` and `%`
    ///
    /// Empty, `.` and `..` segments are refused.
    pub fn push_segment(&mut self, segment: &str) -> Result<&mut Self> {
        check_segment(segment)?;
        self.base
            .path_segments_mut()
            .map_err(|()| invalid_segment(segment))?
            .pop_if_empty()
            .push(segment);
        Ok(self)
    }

    /// Encode a value for substitution into a path template such as `items/{id}`
    pub fn encode_segment(segment: &str) -> Result<String> {
        check_segment(segment)?;
        let mut scratch = Url::parse("http://localhost/")?;
        scratch
            .path_segments_mut()
            .map_err(|()| invalid_segment(segment))?
            .clear()
            .push(segment);
        Ok(scratch.path().trim_start_matches('/').to_string())
    }

    /// Set a query parameter; the last write for a key wins
    pub fn with_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.query.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.query.push((key, value));
        }
        self
    }

    /// Append a query parameter without replacing existing values (`fields=a&fields=b`)
    pub fn append_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Remove every value of a query parameter
    pub fn remove_query_param(&mut self, key: &str) -> &mut Self {
        self.query.retain(|(k, _)| k != key);
        self
    }

    /// Get the first value of a query parameter added through this builder
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Add encoded→literal replacements applied to the serialized query
    pub fn add_encoding_exceptions<I, K, V>(&mut self, exceptions: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in exceptions {
            let (k, v) = (k.into(), v.into());
            match self.encoding_exceptions.iter_mut().find(|(from, _)| *from == k) {
                Some(slot) => slot.1 = v,
                None => self.encoding_exceptions.push((k, v)),
            }
        }
        self
    }

    /// Replace scheme, host and port with those of another URL
    ///
    /// Used when replaying provider-issued URLs against a different origin.
    pub fn with_origin(&mut self, origin: &str) -> Result<&mut Self> {
        let origin = Url::parse(origin)?;
        let mut rebuilt = origin.clone();
        rebuilt.set_path(self.base.path());
        self.base = rebuilt;
        Ok(self)
    }

    /// Scheme + host + port of the URL
    pub fn origin(&self) -> String {
        self.base.origin().ascii_serialization()
    }

    /// Path component of the URL
    pub fn path(&self) -> &str {
        self.base.path()
    }

    fn encoded_query(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(raw) = &self.raw_query {
            parts.push(raw.clone());
        }
        if !self.query.is_empty() {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (k, v) in &self.query {
                serializer.append_pair(k, v);
            }
            let mut encoded = serializer.finish().replace('+', "%20");
            for (from, to) in &self.encoding_exceptions {
                encoded = encoded.replace(from.as_str(), to);
            }
            parts.push(encoded);
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("&"))
        }
    }
}

fn check_segment(segment: &str) -> Result<()> {
    if matches!(segment, "" | "." | "..") {
        return Err(invalid_segment(segment));
    }
    Ok(())
}

fn invalid_segment(segment: &str) -> Error {
    Error::InvalidPathSegment {
        segment: segment.to_string(),
    }
}

impl std::fmt::Display for UrlBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.encoded_query() {
            Some(query) => write!(f, "{}?{}", self.base, query),
            None => write!(f, "{}", self.base),
        }
    }
}
