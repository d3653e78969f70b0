//! HTTP method sets for route rules.
//!
//! Only GET, POST, PUT, PATCH and DELETE can be bound to a rule. Anything else
//! handed to [`MethodSet::filter`] is silently dropped.

use std::fmt;

use http::Method;

const GET: u8 = 1;
const POST: u8 = 1 << 1;
const PUT: u8 = 1 << 2;
const PATCH: u8 = 1 << 3;
const DELETE: u8 = 1 << 4;

/// Order used when listing methods.
const ORDER: [u8; 5] = [GET, POST, PUT, PATCH, DELETE];

/// A set of routable HTTP methods.
///
/// # Example
///
/// ```rust
/// use syme_router::MethodSet;
/// use http::Method;
///
/// let set = MethodSet::filter(["get", " post ", "OPTIONS"]);
/// assert!(set.contains(&Method::GET));
/// assert!(set.contains(&Method::POST));
/// assert!(!set.contains(&Method::OPTIONS));
/// assert_eq!(set.len(), 2);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodSet {
    bits: u8,
}

impl MethodSet {
    /// The empty set.
    pub const EMPTY: Self = Self { bits: 0 };

    /// Every routable method.
    pub const ANY: Self = Self {
        bits: GET | POST | PUT | PATCH | DELETE,
    };

    /// Builds a set from method names, uppercasing and trimming each one and
    /// keeping only the routable ones.
    pub fn filter<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bits = methods
            .into_iter()
            .filter_map(|m| bit_for_name(m.as_ref().trim()))
            .fold(0, |acc, bit| acc | bit);
        Self { bits }
    }

    /// A set holding a single method, empty if the method is not routable.
    #[must_use]
    pub fn single(method: &Method) -> Self {
        Self {
            bits: bit_for(method),
        }
    }

    /// Returns true if the method is part of the set.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        let bit = bit_for(method);
        bit != 0 && self.bits & bit == bit
    }

    /// Returns true if both sets share at least one method.
    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        self.bits & other.bits != 0
    }

    /// Returns true if the set holds no method.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Number of methods in the set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Iterates over the methods in GET, POST, PUT, PATCH, DELETE order.
    pub fn iter(&self) -> impl Iterator<Item = Method> + '_ {
        ORDER
            .into_iter()
            .filter(|bit| self.bits & bit != 0)
            .filter_map(method_for)
    }
}

impl fmt::Debug for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<Method> = self.iter().collect();
        let names: Vec<&str> = names.iter().map(Method::as_str).collect();
        f.write_str(&names.join(","))
    }
}

impl From<&Method> for MethodSet {
    fn from(method: &Method) -> Self {
        Self::single(method)
    }
}

fn bit_for(method: &Method) -> u8 {
    match *method {
        Method::GET => GET,
        Method::POST => POST,
        Method::PUT => PUT,
        Method::PATCH => PATCH,
        Method::DELETE => DELETE,
        _ => 0,
    }
}

fn method_for(bit: u8) -> Option<Method> {
    match bit {
        GET => Some(Method::GET),
        POST => Some(Method::POST),
        PUT => Some(Method::PUT),
        PATCH => Some(Method::PATCH),
        DELETE => Some(Method::DELETE),
        _ => None,
    }
}

fn bit_for_name(name: &str) -> Option<u8> {
    let bit = match name.to_ascii_uppercase().as_str() {
        "GET" => GET,
        "POST" => POST,
        "PUT" => PUT,
        "PATCH" => PATCH,
        "DELETE" => DELETE,
        _ => return None,
    };
    Some(bit)
}
