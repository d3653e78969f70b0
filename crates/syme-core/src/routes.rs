//! Reverse routing for handlers.

use std::fmt;
use std::sync::Arc;

use crate::handler::RouteTable;
use crate::reply::{Redirect, DEFAULT_REDIRECT_STATUS};
use crate::request::Request;

/// Builds uris, paths and urls of named routes relative to the current
/// request.
///
/// Every builder returns `None` for an unknown route name.
#[derive(Clone)]
pub struct Routes {
    table: Arc<RouteTable>,
    request: Request,
}

impl Routes {
    /// Binds the table to the request being served.
    pub fn new(table: Arc<RouteTable>, request: Request) -> Self {
        Self { table, request }
    }

    /// Returns true if route `name` exists.
    pub fn exists(&self, name: &str) -> bool {
        self.table.exists(name)
    }

    /// The route table.
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Concrete uri of route `name`, relative to the application root.
    pub fn uri<I, K, V>(&self, name: &str, params: I) -> Option<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.table.uri_for(name, params)
    }

    /// Absolute path of route `name`, application root included.
    pub fn path<I, K, V>(&self, name: &str, params: I) -> Option<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let uri = self.uri(name, params)?;
        let root = self.request.root_path();
        Some(match (root, uri.as_str()) {
            ("/", _) => uri,
            (_, "/") => root.to_string(),
            _ => format!("{root}{uri}"),
        })
    }

    /// Full url of route `name` on the scheme and host of the current request.
    pub fn url<I, K, V>(&self, name: &str, params: I) -> Option<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let path = self.path(name, params)?;
        let origin = match self.request.port() {
            Some(port) => format!("{}://{}:{port}", self.request.scheme(), self.request.host()),
            None => format!("{}://{}", self.request.scheme(), self.request.host()),
        };
        Some(format!("{origin}{path}"))
    }

    /// A GET request for the url of route `name`.
    pub fn to_request<I, K, V>(&self, name: &str, params: I) -> Option<Request>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Request::get(&self.url(name, params)?)
    }

    /// A `302 Found` redirect to route `name`.
    pub fn redirect<I, K, V>(&self, name: &str, params: I) -> Option<Redirect>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.redirect_with_status(name, params, DEFAULT_REDIRECT_STATUS)
    }

    /// A redirect to route `name` with an explicit status.
    pub fn redirect_with_status<I, K, V>(&self, name: &str, params: I, status: u16) -> Option<Redirect>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.path(name, params)
            .map(|location| Redirect::with_status(location, status))
    }
}

impl fmt::Debug for Routes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routes")
            .field("routes", &self.table.len())
            .field("root", &self.request.root_path())
            .finish()
    }
}
