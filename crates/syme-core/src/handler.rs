//! Handlers and their type erasure.
//!
//! Any `Fn` whose parameters all implement [`FromInjection`] is a
//! [`Handler`]. Named types implementing [`Invokable`] are the other kind of
//! callback: a fresh instance is built for every call.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use syme_router::{Invocable, RoutingTable};

use crate::error::{CallError, InjectionError};
use crate::inject::{FromInjection, InjectionContext};
use crate::reply::{IntoReply, Reply};

/// Routing table whose callbacks are [`Callback`]s.
pub type RouteTable = RoutingTable<Callback>;

/// A function callable with injected arguments.
///
/// `Args` is the tuple of parameter types; it only exists to keep the
/// implementations for different arities apart.
pub trait Handler<Args>: Send + Sync + 'static {
    /// Return type of the function.
    type Output;

    /// Resolves every argument, then calls the function.
    ///
    /// The function is not called if any argument fails to resolve.
    fn call(&self, cx: &InjectionContext<'_>) -> Result<Self::Output, InjectionError>;
}

macro_rules! impl_handler {
    ($($T:ident),*) => {
        impl<F, R, $($T,)*> Handler<($($T,)*)> for F
        where
            F: Fn($($T),*) -> R + Send + Sync + 'static,
            $($T: FromInjection,)*
        {
            type Output = R;

            #[allow(non_snake_case, unused_variables)]
            fn call(&self, cx: &InjectionContext<'_>) -> Result<R, InjectionError> {
                $(let $T = $T::from_injection(cx)?;)*
                Ok((self)($($T),*))
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

/// A named type with a single invocation method.
///
/// A new instance is created with `Default` for every call; instances are
/// never cached.
pub trait Invokable: Default + Send + Sync + 'static {
    /// Injected arguments of [`Invokable::invoke`].
    type Args: FromInjection;
    /// Return type of [`Invokable::invoke`].
    type Output;

    /// Runs the callback.
    fn invoke(&self, args: Self::Args) -> Self::Output;
}

/// A type-erased route handler.
pub trait ErasedHandler: Send + Sync {
    /// Resolves arguments, runs the handler and normalizes its result.
    fn call(&self, cx: &InjectionContext<'_>) -> Result<Reply, CallError>;
}

/// Shared, type-erased route handler.
pub type BoxedHandler = Arc<dyn ErasedHandler>;

struct HandlerFn<H, Args> {
    handler: H,
    _marker: PhantomData<fn() -> Args>,
}

impl<H, Args> ErasedHandler for HandlerFn<H, Args>
where
    H: Handler<Args>,
    H::Output: IntoReply,
    Args: 'static,
{
    fn call(&self, cx: &InjectionContext<'_>) -> Result<Reply, CallError> {
        self.handler
            .call(cx)?
            .into_reply()
            .map_err(CallError::Handler)
    }
}

struct Fresh<T>(PhantomData<fn() -> T>);

impl<T> ErasedHandler for Fresh<T>
where
    T: Invokable,
    T::Output: IntoReply,
{
    fn call(&self, cx: &InjectionContext<'_>) -> Result<Reply, CallError> {
        let args = T::Args::from_injection(cx)?;
        T::default()
            .invoke(args)
            .into_reply()
            .map_err(CallError::Handler)
    }
}

/// Erases a handler function.
pub fn boxed<H, Args>(handler: H) -> BoxedHandler
where
    H: Handler<Args>,
    H::Output: IntoReply,
    Args: 'static,
{
    Arc::new(HandlerFn {
        handler,
        _marker: PhantomData,
    })
}

/// Erases an [`Invokable`] type.
pub fn invokable<T>() -> BoxedHandler
where
    T: Invokable,
    T::Output: IntoReply,
{
    Arc::new(Fresh::<T>(PhantomData))
}

/// The callback stored in a route rule.
#[derive(Clone)]
pub enum Callback {
    /// A handler ready to run.
    Handler(BoxedHandler),
    /// An invokable registered under this name, looked up at dispatch.
    Named(String),
}

impl Callback {
    /// Wraps a handler function.
    pub fn handler<H, Args>(handler: H) -> Self
    where
        H: Handler<Args>,
        H::Output: IntoReply,
        Args: 'static,
    {
        Self::Handler(boxed(handler))
    }

    /// Refers to an invokable by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl Invocable for Callback {
    fn is_invocable(&self) -> bool {
        match self {
            Self::Handler(_) => true,
            Self::Named(name) => !name.trim().is_empty(),
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Callback::Handler(..)"),
            Self::Named(name) => f.debug_tuple("Callback::Named").field(name).finish(),
        }
    }
}
