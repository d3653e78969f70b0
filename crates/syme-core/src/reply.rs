//! What a handler hands back to the dispatcher.

use crate::response::Response;

/// Default redirect status.
pub const DEFAULT_REDIRECT_STATUS: u16 = 302;

/// A redirect to another location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    location: String,
    status: u16,
}

impl Redirect {
    /// A `302 Found` redirect.
    pub fn to(location: impl Into<String>) -> Self {
        Self::with_status(location, DEFAULT_REDIRECT_STATUS)
    }

    /// A redirect with an explicit status.
    ///
    /// Statuses outside `300..=308` fall back to 302.
    pub fn with_status(location: impl Into<String>, status: u16) -> Self {
        let status = if (300..=308).contains(&status) {
            status
        } else {
            DEFAULT_REDIRECT_STATUS
        };
        Self {
            location: location.into(),
            status,
        }
    }

    /// Target of the `Location` header.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Redirect status.
    pub const fn status(&self) -> u16 {
        self.status
    }
}

/// Normalized handler result.
#[derive(Debug)]
pub enum Reply {
    /// The handler produced a response to negotiate and send.
    Response(Response),
    /// The handler asked for a redirect.
    Redirect(Redirect),
    /// The handler produced nothing.
    Nothing,
}

/// Conversion of handler return values into a [`Reply`].
///
/// Errors are handler failures and propagate unchanged to the boundary.
pub trait IntoReply {
    /// Performs the conversion.
    fn into_reply(self) -> Result<Reply, anyhow::Error>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, anyhow::Error> {
        Ok(self)
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Reply, anyhow::Error> {
        Ok(Reply::Response(self))
    }
}

impl IntoReply for Redirect {
    fn into_reply(self) -> Result<Reply, anyhow::Error> {
        Ok(Reply::Redirect(self))
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, anyhow::Error> {
        Ok(Reply::Nothing)
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Reply, anyhow::Error> {
        self.map_or(Ok(Reply::Nothing), IntoReply::into_reply)
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<anyhow::Error>,
{
    fn into_reply(self) -> Result<Reply, anyhow::Error> {
        self.map_err(Into::into)?.into_reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_reply() {
        let reply = Response::new().into_reply().unwrap();
        assert!(matches!(reply, Reply::Response(_)));
    }

    #[test]
    fn test_nothing_variants() {
        assert!(matches!(().into_reply().unwrap(), Reply::Nothing));
        assert!(matches!(None::<Response>.into_reply().unwrap(), Reply::Nothing));
    }

    #[test]
    fn test_result_propagates_error() {
        let failed: Result<Response, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        let err = failed.into_reply().unwrap_err();
        assert_eq!(err.to_string(), "disk");

        let ok: anyhow::Result<Option<Redirect>> = Ok(Some(Redirect::to("/login")));
        match ok.into_reply().unwrap() {
            Reply::Redirect(redirect) => assert_eq!(redirect.location(), "/login"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_redirect_status() {
        assert_eq!(Redirect::to("/").status(), 302);
        assert_eq!(Redirect::with_status("/", 301).status(), 301);
        assert_eq!(Redirect::with_status("/", 200).status(), 302);
    }
}
