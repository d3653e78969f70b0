//! Lazily constructed, process-wide components.
//!
//! Types are registered once at bootstrap with
//! [`ComponentRegistry::extend_with`]. Nothing is built until a handler,
//! middleware or other component first asks for the type; the instance is
//! then cached and every later request for it receives the same `Arc`.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::error::InjectionError;
use crate::inject::{Extension, FromInjection, InjectionContext};

type Instance = Arc<dyn Any + Send + Sync>;

type Factory =
    Arc<dyn Fn(&InjectionContext<'_>) -> Result<Instance, InjectionError> + Send + Sync>;

struct Slot {
    type_name: &'static str,
    factory: Option<Factory>,
    instance: Option<Instance>,
}

#[derive(Default)]
struct State {
    slots: HashMap<TypeId, Slot>,
    // Types whose constructor is currently running on the owning thread.
    constructing: Vec<TypeId>,
}

/// Singleton cache keyed by type.
///
/// Construction is serialized: a thread building a component holds the
/// registry until it is done, and may re-enter it to resolve the component's
/// own dependencies.
#[derive(Default)]
pub struct ComponentRegistry {
    state: ReentrantMutex<RefCell<State>>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` for lazy construction.
    ///
    /// Returns false, changing nothing, if `T` is already registered.
    pub fn extend_with<T: Extension>(&mut self) -> bool {
        let factory: Factory = Arc::new(|cx| {
            let deps = T::Deps::from_injection(cx)?;
            let instance = T::construct(deps)
                .map_err(|e| InjectionError::construction_failed::<T>(format!("{e:#}")))?;
            Ok(Arc::new(instance) as Instance)
        });
        self.register::<T>(Some(factory), None)
    }

    /// Registers an already built instance of `T`.
    ///
    /// Returns false, changing nothing, if `T` is already registered.
    pub fn provide<T: Send + Sync + 'static>(&mut self, instance: T) -> bool {
        self.register::<T>(None, Some(Arc::new(instance)))
    }

    fn register<T: 'static>(&mut self, factory: Option<Factory>, instance: Option<Instance>) -> bool {
        let state = self.state.get_mut().get_mut();
        let id = TypeId::of::<T>();
        if state.slots.contains_key(&id) {
            tracing::debug!(component = std::any::type_name::<T>(), "component already registered");
            return false;
        }
        state.slots.insert(
            id,
            Slot {
                type_name: std::any::type_name::<T>(),
                factory,
                instance,
            },
        );
        true
    }

    /// Returns true if `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        let guard = self.state.lock();
        let contains = guard.borrow().slots.contains_key(&TypeId::of::<T>());
        contains
    }

    /// Returns true if `T` has been built.
    pub fn is_instantiated<T: 'static>(&self) -> bool {
        let guard = self.state.lock();
        let built = guard
            .borrow()
            .slots
            .get(&TypeId::of::<T>())
            .is_some_and(|slot| slot.instance.is_some());
        built
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        let guard = self.state.lock();
        let len = guard.borrow().slots.len();
        len
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the instance of `T`, building it on first use.
    ///
    /// The constructor's own dependencies are resolved against `cx`.
    pub fn resolve<T: Send + Sync + 'static>(
        &self,
        cx: &InjectionContext<'_>,
    ) -> Result<Arc<T>, InjectionError> {
        let id = TypeId::of::<T>();
        let guard = self.state.lock();

        let factory = {
            let mut state = guard.borrow_mut();
            let slot = state
                .slots
                .get(&id)
                .ok_or_else(InjectionError::not_registered::<T>)?;
            if let Some(instance) = &slot.instance {
                return downcast::<T>(Arc::clone(instance));
            }
            let factory = slot
                .factory
                .clone()
                .ok_or_else(|| InjectionError::unresolved::<T>("no constructor"))?;
            if state.constructing.contains(&id) {
                return Err(InjectionError::cycle::<T>());
            }
            state.constructing.push(id);
            factory
        };

        let built = factory(cx);

        let mut state = guard.borrow_mut();
        state.constructing.retain(|t| *t != id);
        let instance = built?;
        if let Some(slot) = state.slots.get_mut(&id) {
            tracing::debug!(component = slot.type_name, "component constructed");
            slot.instance = Some(Arc::clone(&instance));
        }
        drop(state);
        downcast::<T>(instance)
    }
}

fn downcast<T: Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>, InjectionError> {
    instance
        .downcast::<T>()
        .map_err(|_| InjectionError::unresolved::<T>("registered instance has another type"))
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.state.lock();
        let state = guard.borrow();
        let mut names: Vec<&str> = state.slots.values().map(|slot| slot.type_name).collect();
        names.sort_unstable();
        f.debug_struct("ComponentRegistry")
            .field("components", &names)
            .finish()
    }
}
