//! URI template compilation.
//!
//! A template such as `/blog/{year:\d{4}}/{slug}` is split on `/`. Literal
//! segments are escaped, `{name}` and `{name:regex}` segments become named
//! capture groups, and the result is anchored and case-insensitive:
//!
//! ```text
//! /blog/{year:\d{4}}/{slug}   =>   (?i)^/blog/(?P<year>\d{4})/(?P<slug>[^/.]+)$
//! ```

use regex::Regex;

use crate::error::{RouteError, RouteResult};
use crate::params::Captures;

/// Constraint applied to a dynamic segment declared without one.
pub const DEFAULT_SEGMENT_REGEX: &str = r"[^/.]+";

/// Normalizes a uri: trims it, forces a leading `/` and drops one trailing `/`.
///
/// The root uri normalizes to `/`.
///
/// ```rust
/// use syme_router::normalize_uri;
///
/// assert_eq!(normalize_uri("users/"), "/users");
/// assert_eq!(normalize_uri("  "), "/");
/// ```
#[must_use]
pub fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim();
    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// One `/`-separated piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A segment matched verbatim (case-insensitively).
    Literal(String),
    /// A named capture with an optional user constraint.
    Param {
        /// Parameter name.
        name: String,
        /// Constraint regex, if one was declared.
        constraint: Option<String>,
    },
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if raw.len() >= 2 && raw.starts_with('{') && raw.ends_with('}') {
            let inner = raw[1..raw.len() - 1].trim();
            let (name, constraint) = match inner.split_once(':') {
                Some((name, regex)) => (name.trim(), Some(regex.trim())),
                None => (inner, None),
            };
            Self::Param {
                name: name.to_string(),
                constraint: constraint
                    .filter(|r| !r.is_empty())
                    .map(ToString::to_string),
            }
        } else {
            Self::Literal(raw.to_string())
        }
    }

    fn to_regex(&self) -> String {
        match self {
            Self::Literal(text) => regex::escape(text),
            Self::Param { name, constraint } => format!(
                "(?P<{name}>{})",
                constraint.as_deref().unwrap_or(DEFAULT_SEGMENT_REGEX)
            ),
        }
    }
}

/// A compiled uri template.
///
/// # Example
///
/// ```rust
/// use syme_router::Pattern;
///
/// let pattern = Pattern::compile("/users/{id:\\d+}/{tab}").unwrap();
/// assert_eq!(pattern.param_names(), ["id", "tab"]);
///
/// let captures = pattern.captures("/USERS/42/profile").unwrap();
/// assert_eq!(captures.get("id"), Some("42"));
/// assert!(pattern.captures("/users/abc/profile").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    uri: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
    matcher: Regex,
}

impl Pattern {
    /// Compiles a template after normalizing it.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidPattern`] when a constraint or parameter
    /// name does not form a valid regular expression (including duplicate
    /// parameter names).
    pub fn compile(template: &str) -> RouteResult<Self> {
        let uri = normalize_uri(template);
        let segments: Vec<Segment> = uri
            .split('/')
            .filter(|s| !s.trim().is_empty())
            .map(Segment::parse)
            .collect();

        let param_names = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param { name, .. } => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect();

        let body: Vec<String> = segments.iter().map(Segment::to_regex).collect();
        let source = format!("(?i)^/{}$", body.join("/"));
        let matcher = Regex::new(&source).map_err(|e| RouteError::InvalidPattern {
            uri: uri.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            uri,
            segments,
            param_names,
            matcher,
        })
    }

    /// The normalized template this pattern was compiled from.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Parameter names in declaration order.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// The parsed template segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The compiled regular expression source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.matcher.as_str()
    }

    /// Returns true if `uri` matches the whole pattern.
    #[must_use]
    pub fn is_match(&self, uri: &str) -> bool {
        self.matcher.is_match(uri)
    }

    /// Matches `uri` and returns the trimmed value of every declared parameter
    /// that took part in the match.
    #[must_use]
    pub fn captures(&self, uri: &str) -> Option<Captures> {
        let caps = self.matcher.captures(uri)?;
        let mut captures = Captures::new();
        for name in &self.param_names {
            if let Some(value) = caps.name(name) {
                captures.push(name.clone(), value.as_str());
            }
        }
        Some(captures)
    }

    /// Rebuilds a concrete uri from the template.
    ///
    /// Only values whose key is a declared parameter are used; a parameter with
    /// no value is rendered as its bare name.
    pub fn render<I, K, V>(&self, values: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let known: Vec<(String, String)> = values
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .filter(|(k, _)| self.param_names.contains(k))
            .collect();

        let parts: Vec<&str> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Param { name, .. } => known
                    .iter()
                    .find(|(k, _)| k == name)
                    .map_or(name.as_str(), |(_, v)| v.as_str()),
            })
            .collect();

        format!("/{}", parts.join("/"))
    }
}
