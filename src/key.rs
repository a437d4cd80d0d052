//! Query keys.
//!
//! A [`QueryKey`] is an ordered tuple of string segments naming one logical
//! resource, e.g. `["store"]`, `["item", "42"]` or
//! `["items", "category", "Textbooks"]`. The first segment is the resource
//! kind and selects the per-kind [`QueryConfig`](crate::QueryConfig).

use std::fmt;
use std::sync::Arc;

/// Stable identity of a logical resource request.
///
/// Keys are immutable once built and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    segments: Arc<[String]>,
}

impl QueryKey {
    /// Build a key from its segments.
    ///
    /// # Example
    /// ```ignore
    /// let key = QueryKey::new(["item", "42"]);
    /// assert_eq!(key.kind(), "item");
    /// ```
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryKey {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a key from a resource kind and its parameters.
    pub fn for_resource<I, S>(kind: &str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let params = params.into_iter().map(Into::<String>::into);
        QueryKey::new(std::iter::once(kind.to_string()).chain(params))
    }

    /// The resource kind, i.e. the first segment. Empty for an empty key.
    pub fn kind(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or("")
    }

    /// Segments after the kind.
    pub fn params(&self) -> &[String] {
        self.segments.get(1..).unwrap_or(&[])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `prefix` is an element-wise prefix of this key.
    ///
    /// Every key starts with itself and with the empty key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.segments.join(", "))
    }
}

impl From<&[&str]> for QueryKey {
    fn from(segments: &[&str]) -> Self {
        QueryKey::new(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for QueryKey {
    fn from(segments: [&str; N]) -> Self {
        QueryKey::new(segments)
    }
}

/// Selects the cache entries an invalidation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    /// Only the entry whose key equals this one.
    Exact(QueryKey),
    /// Every entry whose key starts with this one, including the key itself.
    Prefix(QueryKey),
    /// Every entry in the cache.
    All,
}

impl KeyFilter {
    pub fn exact(key: impl Into<QueryKey>) -> Self {
        KeyFilter::Exact(key.into())
    }

    pub fn prefix(key: impl Into<QueryKey>) -> Self {
        KeyFilter::Prefix(key.into())
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            KeyFilter::Exact(k) => k == key,
            KeyFilter::Prefix(prefix) => key.starts_with(prefix),
            KeyFilter::All => true,
        }
    }
}

impl fmt::Display for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFilter::Exact(key) => write!(f, "exact {}", key),
            KeyFilter::Prefix(key) => write!(f, "prefix {}", key),
            KeyFilter::All => f.write_str("all"),
        }
    }
}
