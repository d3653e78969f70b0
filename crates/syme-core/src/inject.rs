//! Parameter injection.
//!
//! Every argument of a handler, middleware or component constructor is a type
//! implementing [`FromInjection`]. Resolution looks at the per-dispatch
//! built-ins first ([`Request`], [`Response`], [`Data`], [`Routes`]), then at
//! registered components ([`Component<T>`]), then at route captures
//! ([`Path<T>`], or the whole [`Attributes`] map).
//!
//! A parameter that none of these can satisfy is a typed
//! [`InjectionError`]; nothing is silently skipped.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use syme_router::Captures;

use crate::data::Data;
use crate::error::InjectionError;
use crate::registry::ComponentRegistry;
use crate::request::Request;
use crate::response::Response;
use crate::routes::Routes;
use crate::value::Attributes;

/// Everything available to injection during one dispatch.
#[derive(Clone, Copy)]
pub struct InjectionContext<'a> {
    /// Inbound request.
    pub request: &'a Request,
    /// Response under construction.
    pub response: &'a Response,
    /// Per-dispatch data bag.
    pub data: &'a Data,
    /// Coerced route captures.
    pub attributes: &'a Attributes,
    /// Raw route captures.
    pub captures: &'a Captures,
    /// Reverse-routing facade.
    pub routes: &'a Routes,
    /// Process-wide component cache.
    pub registry: &'a ComponentRegistry,
}

impl fmt::Debug for InjectionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionContext")
            .field("uri", &self.request.uri())
            .field("attributes", self.attributes)
            .finish_non_exhaustive()
    }
}

/// A value that can be produced for a callback parameter.
pub trait FromInjection: Sized {
    /// Builds the value from the dispatch state.
    fn from_injection(cx: &InjectionContext<'_>) -> Result<Self, InjectionError>;
}

impl FromInjection for Request {
    fn from_injection(cx: &InjectionContext<'_>) -> Result<Self, InjectionError> {
        Ok(cx.request.clone())
    }
}

impl FromInjection for Response {
    fn from_injection(cx: &InjectionContext<'_>) -> Result<Self, InjectionError> {
        Ok(cx.response.clone())
    }
}

impl FromInjection for Data {
    fn from_injection(cx: &InjectionContext<'_>) -> Result<Self, InjectionError> {
        Ok(cx.data.clone())
    }
}

impl FromInjection for Routes {
    fn from_injection(cx: &InjectionContext<'_>) -> Result<Self, InjectionError> {
        Ok(cx.routes.clone())
    }
}

impl FromInjection for Attributes {
    fn from_injection(cx: &InjectionContext<'_>) -> Result<Self, InjectionError> {
        Ok(cx.attributes.clone())
    }
}

// Optional injection: None instead of an error.
impl<T: FromInjection> FromInjection for Option<T> {
    fn from_injection(cx: &InjectionContext<'_>) -> Result<Self, InjectionError> {
        Ok(T::from_injection(cx).ok())
    }
}

impl FromInjection for () {
    fn from_injection(_cx: &InjectionContext<'_>) -> Result<Self, InjectionError> {
        Ok(())
    }
}

macro_rules! impl_from_injection_for_tuple {
    ($($T:ident),*) => {
        impl<$($T: FromInjection),*> FromInjection for ($($T,)*) {
            fn from_injection(cx: &InjectionContext<'_>) -> Result<Self, InjectionError> {
                Ok(($($T::from_injection(cx)?,)*))
            }
        }
    };
}

impl_from_injection_for_tuple!(T1);
impl_from_injection_for_tuple!(T1, T2);
impl_from_injection_for_tuple!(T1, T2, T3);
impl_from_injection_for_tuple!(T1, T2, T3, T4);
impl_from_injection_for_tuple!(T1, T2, T3, T4, T5);
impl_from_injection_for_tuple!(T1, T2, T3, T4, T5, T6);

/// A process-wide component, constructed on first use and shared afterwards.
///
/// # Example
///
/// ```
/// use syme_core::{Component, Extension};
///
/// struct Mailer {
///     host: String,
/// }
///
/// impl Extension for Mailer {
///     type Deps = ();
///
///     fn construct((): ()) -> anyhow::Result<Self> {
///         Ok(Self { host: "smtp.local".into() })
///     }
/// }
///
/// fn notify(mailer: Component<Mailer>) -> String {
///     format!("sending through {}", mailer.host)
/// }
/// # let _ = notify;
/// ```
pub struct Component<T>(Arc<T>);

impl<T> Component<T> {
    /// The shared instance.
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }

    /// Returns true if both point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for Component<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Component<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.0).finish()
    }
}

impl<T: Send + Sync + 'static> FromInjection for Component<T> {
    fn from_injection(cx: &InjectionContext<'_>) -> Result<Self, InjectionError> {
        cx.registry.resolve::<T>(cx).map(Self)
    }
}

/// A type constructible by the [`ComponentRegistry`].
///
/// Its constructor arguments are injected like any handler's, so components
/// may depend on other components.
pub trait Extension: Send + Sync + Sized + 'static {
    /// Constructor arguments.
    type Deps: FromInjection;

    /// Builds the instance.
    fn construct(deps: Self::Deps) -> anyhow::Result<Self>;
}

/// Route captures deserialized by name into `T`.
///
/// Field names of `T` are matched against the capture names of the route;
/// the raw captured text is parsed into each field's type.
///
/// ```
/// use serde::Deserialize;
/// use syme_core::Path;
///
/// #[derive(Deserialize)]
/// struct Article {
///     year: u16,
///     slug: String,
/// }
///
/// fn show(Path(article): Path<Article>) -> String {
///     format!("{}/{}", article.year, article.slug)
/// }
/// # let _ = show;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path<T>(pub T);

impl<T> Path<T> {
    /// Consumes the wrapper.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Path<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: DeserializeOwned> FromInjection for Path<T> {
    fn from_injection(cx: &InjectionContext<'_>) -> Result<Self, InjectionError> {
        let pairs: Vec<(&str, &str)> = cx.captures.iter().collect();
        let encoded = serde_urlencoded::to_string(&pairs)
            .map_err(|e| InjectionError::unresolved::<T>(e.to_string()))?;
        serde_urlencoded::from_str(&encoded)
            .map(Path)
            .map_err(|e| InjectionError::unresolved::<T>(e.to_string()))
    }
}
