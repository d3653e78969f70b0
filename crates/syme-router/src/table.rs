//! The routing table.
//!
//! Rules are kept in registration order and matched by linear scan; the first
//! rule whose method set and pattern both accept the request wins. There is
//! no update or removal operation.

use std::fmt;

use http::Method;
use indexmap::IndexMap;

use crate::error::{RouteError, RouteResult};
use crate::method::MethodSet;
use crate::params::Captures;
use crate::pattern::{normalize_uri, Pattern};

/// A callback that may or may not be invocable.
///
/// The table refuses to store a callback that reports itself as not
/// invocable.
pub trait Invocable {
    /// Returns true if the callback can be invoked at dispatch time.
    fn is_invocable(&self) -> bool;
}

/// A named association between a uri template, a method set and a callback.
pub struct RouteRule<C> {
    name: String,
    methods: MethodSet,
    pattern: Pattern,
    callback: C,
}

impl<C> RouteRule<C> {
    /// The normalized (lowercase, trimmed) rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Methods this rule answers to.
    #[must_use]
    pub const fn methods(&self) -> MethodSet {
        self.methods
    }

    /// The normalized uri template.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.pattern.uri()
    }

    /// The compiled pattern.
    #[must_use]
    pub const fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Declared parameter names in order.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        self.pattern.param_names()
    }

    /// The stored callback.
    #[must_use]
    pub const fn callback(&self) -> &C {
        &self.callback
    }
}

impl<C> fmt::Debug for RouteRule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRule")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("uri", &self.pattern.uri())
            .field("matcher", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// A matched rule with the values captured from the request uri.
#[derive(Debug)]
pub struct RouteMatch<'a, C> {
    /// The rule that matched.
    pub rule: &'a RouteRule<C>,
    /// Values captured by the rule's named segments.
    pub captures: Captures,
}

/// Normalizes a route name for storage and lookup.
fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Append-only, ordered set of named route rules.
///
/// # Example
///
/// ```rust
/// use syme_router::{Invocable, MethodSet, RoutingTable};
/// use http::Method;
///
/// struct Target(&'static str);
///
/// impl Invocable for Target {
///     fn is_invocable(&self) -> bool {
///         true
///     }
/// }
///
/// let mut table = RoutingTable::new();
/// table.store("user", MethodSet::filter(["GET"]), "/users/{id}", Target("show")).unwrap();
///
/// let found = table.find(&Method::GET, "/users/42").unwrap();
/// assert_eq!(found.rule.name(), "user");
/// assert_eq!(found.captures.get("id"), Some("42"));
/// assert_eq!(table.uri_for("USER", [("id", "7")]).as_deref(), Some("/users/7"));
/// ```
pub struct RoutingTable<C> {
    rules: IndexMap<String, RouteRule<C>>,
}

impl<C> Default for RoutingTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for RoutingTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rules.values()).finish()
    }
}

impl<C> RoutingTable<C> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: IndexMap::new(),
        }
    }

    /// Returns true if a rule with this name exists (case-insensitive).
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.rules.contains_key(&normalize_name(name))
    }

    /// Looks up a rule by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RouteRule<C>> {
        self.rules.get(&normalize_name(name))
    }

    /// Returns true if a stored rule already claims `uri` for any of `methods`.
    ///
    /// Uris are normalized and compared case-insensitively.
    #[must_use]
    pub fn is_linked(&self, uri: &str, methods: MethodSet) -> bool {
        self.linked_rule(&normalize_uri(uri), methods).is_some()
    }

    fn linked_rule(&self, normalized: &str, methods: MethodSet) -> Option<&RouteRule<C>> {
        self.rules.values().find(|rule| {
            rule.uri().eq_ignore_ascii_case(normalized) && rule.methods.intersects(&methods)
        })
    }

    /// Finds the first rule, in registration order, accepting `method` and
    /// matching `uri`.
    #[must_use]
    pub fn find(&self, method: &Method, uri: &str) -> Option<RouteMatch<'_, C>> {
        self.rules
            .values()
            .filter(|rule| rule.methods.contains(method))
            .find_map(|rule| {
                rule.pattern
                    .captures(uri)
                    .map(|captures| RouteMatch { rule, captures })
            })
    }

    /// Returns true if some rule's pattern matches `uri` under any method.
    ///
    /// Lets callers tell "wrong method" apart from "no route".
    #[must_use]
    pub fn matches_any_method(&self, uri: &str) -> bool {
        self.rules.values().any(|rule| rule.pattern.is_match(uri))
    }

    /// Rebuilds the uri of the named rule. See [`Pattern::render`].
    pub fn uri_for<I, K, V>(&self, name: &str, params: I) -> Option<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.get(name).map(|rule| rule.pattern.render(params))
    }

    /// Iterates over rules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteRule<C>> {
        self.rules.values()
    }

    /// Number of stored rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rule is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<C: Invocable> RoutingTable<C> {
    /// Stores a new rule.
    ///
    /// Refusals are checked in this order: duplicate name, empty method set,
    /// uri collision on a shared method, callback not invocable. A pattern
    /// that fails to compile is refused last. Nothing is committed on error.
    pub fn store(
        &mut self,
        name: &str,
        methods: MethodSet,
        uri: &str,
        callback: C,
    ) -> RouteResult<&RouteRule<C>> {
        let name = normalize_name(name);
        let result = self.check(&name, methods, uri, &callback);
        let pattern = match result {
            Ok(pattern) => pattern,
            Err(err) => {
                tracing::warn!(route = %name, uri = %uri, reason = err.kind(), "route rejected");
                return Err(err);
            }
        };

        tracing::debug!(
            route = %name,
            methods = %methods,
            uri = %pattern.uri(),
            matcher = %pattern.as_str(),
            "route stored"
        );

        let rule = RouteRule {
            name: name.clone(),
            methods,
            pattern,
            callback,
        };
        let entry = self.rules.entry(name).or_insert(rule);
        Ok(entry)
    }

    fn check(&self, name: &str, methods: MethodSet, uri: &str, callback: &C) -> RouteResult<Pattern> {
        if self.rules.contains_key(name) {
            return Err(RouteError::DuplicateName {
                name: name.to_string(),
            });
        }
        if methods.is_empty() {
            return Err(RouteError::NoValidMethods {
                name: name.to_string(),
            });
        }
        let normalized = normalize_uri(uri);
        if let Some(existing) = self.linked_rule(&normalized, methods) {
            return Err(RouteError::UriCollision {
                uri: normalized,
                existing: existing.name.clone(),
            });
        }
        if !callback.is_invocable() {
            return Err(RouteError::NotInvocable {
                name: name.to_string(),
            });
        }
        Pattern::compile(&normalized)
    }
}
