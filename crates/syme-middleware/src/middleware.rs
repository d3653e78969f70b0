//! The middleware trait and its adapters.
//!
//! Middleware never returns a response. It acts only through the values it
//! asks to have injected, typically the shared [`Response`] and [`Data`].
//!
//! [`Response`]: syme_core::Response
//! [`Data`]: syme_core::Data

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use syme_core::{CallError, FromInjection, Handler, InjectionContext, Invokable};

/// A unit of work run before or after a route handler.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Runs the middleware against the current dispatch.
    fn handle(&self, cx: &InjectionContext<'_>) -> Result<(), CallError>;
}

/// Shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Return values accepted from middleware functions.
pub trait MiddlewareOutput {
    /// Converts into the middleware result.
    fn into_result(self) -> Result<(), anyhow::Error>;
}

impl MiddlewareOutput for () {
    fn into_result(self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

impl<E: Into<anyhow::Error>> MiddlewareOutput for Result<(), E> {
    fn into_result(self) -> Result<(), anyhow::Error> {
        self.map_err(Into::into)
    }
}

/// Middleware built from a function with injected arguments.
///
/// # Example
///
/// ```
/// use syme_core::fixtures::Fixture;
/// use syme_core::{Data, Response};
/// use syme_middleware::{FnMiddleware, Middleware};
///
/// let stamp = FnMiddleware::new("stamp", |response: Response, data: Data| {
///     response.with_header("X-Stamp", "1");
///     data.set("stamped", true);
/// });
///
/// let fixture = Fixture::new("/");
/// stamp.handle(&fixture.context()).unwrap();
/// assert!(fixture.response.has_header("x-stamp"));
/// ```
pub struct FnMiddleware<H, Args> {
    name: String,
    handler: H,
    _marker: PhantomData<fn() -> Args>,
}

impl<H, Args> FnMiddleware<H, Args> {
    /// Wraps `handler` under `name`.
    pub fn new(name: impl Into<String>, handler: H) -> Self {
        Self {
            name: name.into(),
            handler,
            _marker: PhantomData,
        }
    }
}

impl<H, Args> Middleware for FnMiddleware<H, Args>
where
    H: Handler<Args>,
    H::Output: MiddlewareOutput,
    Args: 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, cx: &InjectionContext<'_>) -> Result<(), CallError> {
        self.handler
            .call(cx)?
            .into_result()
            .map_err(CallError::Handler)
    }
}

impl<H, Args> fmt::Debug for FnMiddleware<H, Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").field("name", &self.name).finish()
    }
}

/// Middleware backed by a named [`Invokable`] type.
///
/// A new `T` is created for every invocation and dropped afterwards; it is
/// never stored in the component registry.
pub struct Named<T>(PhantomData<fn() -> T>);

impl<T> Named<T> {
    /// Refers to `T`.
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Named<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Named<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Named").field(&short_type_name::<T>()).finish()
    }
}

impl<T> Middleware for Named<T>
where
    T: Invokable,
    T::Output: MiddlewareOutput,
{
    fn name(&self) -> &str {
        short_type_name::<T>()
    }

    fn handle(&self, cx: &InjectionContext<'_>) -> Result<(), CallError> {
        let args = T::Args::from_injection(cx)?;
        T::default()
            .invoke(args)
            .into_result()
            .map_err(CallError::Handler)
    }
}

/// Conversion into [`BoxedMiddleware`].
///
/// Implemented for every [`Middleware`] (including [`Named`]) and for every
/// function whose arguments are injectable and whose output is `()` or
/// `Result<(), E>`. `Marker` only keeps the two families apart.
pub trait IntoMiddleware<Marker> {
    /// Performs the conversion.
    fn into_middleware(self) -> BoxedMiddleware;
}

#[doc(hidden)]
pub struct Direct;

#[doc(hidden)]
pub struct Function<Args>(PhantomData<fn() -> Args>);

impl<M: Middleware> IntoMiddleware<Direct> for M {
    fn into_middleware(self) -> BoxedMiddleware {
        Arc::new(self)
    }
}

impl<H, Args> IntoMiddleware<Function<Args>> for H
where
    H: Handler<Args>,
    H::Output: MiddlewareOutput,
    Args: 'static,
{
    fn into_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware::new(std::any::type_name::<H>(), self))
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    // Strip the module path but keep generic arguments intact.
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::")
        .next()
        .map_or(full, |last| &full[head.len() - last.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use syme_core::fixtures::Fixture;
    use syme_core::{Data, InjectionError, Response};

    #[derive(Default)]
    struct Csrf;

    impl Invokable for Csrf {
        type Args = (Data,);
        type Output = ();

        fn invoke(&self, (data,): Self::Args) {
            data.set("csrf", String::from("token"));
        }
    }

    #[derive(Default)]
    struct Deny;

    impl Invokable for Deny {
        type Args = ();
        type Output = anyhow::Result<()>;

        fn invoke(&self, (): ()) -> anyhow::Result<()> {
            anyhow::bail!("forbidden")
        }
    }

    #[test]
    fn test_fn_middleware_runs_with_injection() {
        let mw = FnMiddleware::new("powered", |response: Response| {
            response.with_header("X-Mw", "yes");
        });
        let fixture = Fixture::new("/");
        mw.handle(&fixture.context()).unwrap();
        assert_eq!(mw.name(), "powered");
        assert_eq!(fixture.response.header("x-mw").as_deref(), Some("yes"));
    }

    #[test]
    fn test_fn_middleware_error() {
        let mw = FnMiddleware::new("fail", || -> Result<(), std::io::Error> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "nope"))
        });
        let fixture = Fixture::new("/");
        let err = mw.handle(&fixture.context()).unwrap_err();
        assert!(matches!(err, CallError::Handler(ref e) if e.to_string() == "nope"));
    }

    #[test]
    fn test_named_middleware() {
        let mw = Named::<Csrf>::new();
        let fixture = Fixture::new("/");
        mw.handle(&fixture.context()).unwrap();
        assert_eq!(mw.name(), "Csrf");
        assert_eq!(fixture.data.get::<String>("csrf").as_deref(), Some("token"));

        let err = Named::<Deny>::new().handle(&fixture.context()).unwrap_err();
        assert!(matches!(err, CallError::Handler(_)));
    }

    #[test]
    fn test_into_middleware_both_families() {
        let from_fn = (|data: Data| data.set("a", 1)).into_middleware();
        let from_type = Named::<Csrf>::new().into_middleware();

        let fixture = Fixture::new("/");
        from_fn.handle(&fixture.context()).unwrap();
        from_type.handle(&fixture.context()).unwrap();
        assert!(fixture.data.exists("a"));
        assert!(fixture.data.exists("csrf"));
    }

    #[test]
    fn test_unresolvable_argument() {
        struct Unknown;
        let mw = (|_u: syme_core::Component<Unknown>| ()).into_middleware();
        let fixture = Fixture::new("/");
        let err = mw.handle(&fixture.context()).unwrap_err();
        assert!(matches!(err, CallError::Injection(InjectionError::UnregisteredComponent { .. })));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Csrf>(), "Csrf");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec<alloc::string::String>");
    }
}
