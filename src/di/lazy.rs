use crate::di::container::WeakContainer;
use crate::di::factory::Resolver;
use crate::di::instance::Instance;
use crate::di::token::Token;
use crate::error::{BeanweaveError, Result};
use crate::plugin::Plugin;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

/// When a lazy handle goes back to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyMode {
    /// Resolve on first access and keep the instance.
    Cached,
    /// Resolve again on every access.
    PerAccess,
}

/// Untyped thunk over the container: a token, a weak container reference, the
/// plugins to resolve with and a cached-value slot.
///
/// Each access starts a fresh resolution path, so a lazy dependency can point
/// back at a component still under construction. The container is held weakly;
/// once it is dropped every access fails with `NotFound`.
pub struct LazyHandle {
    container: WeakContainer,
    plugins: Arc<[Arc<dyn Plugin>]>,
    token: Token,
    mode: LazyMode,
    cached: OnceCell<Instance>,
}

impl LazyHandle {
    pub fn new(resolver: &Resolver, token: Token, mode: LazyMode) -> Self {
        Self {
            container: resolver.container().downgrade(),
            plugins: resolver.shared_plugins(),
            token,
            mode,
            cached: OnceCell::new(),
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn mode(&self) -> LazyMode {
        self.mode
    }

    fn resolver(&self) -> Result<Resolver> {
        let container = self.container.upgrade().ok_or_else(|| {
            BeanweaveError::not_found(format!(
                "container for the lazy {} handle has been dropped",
                self.token
            ))
        })?;
        Ok(Resolver::from_shared(container, Arc::clone(&self.plugins)))
    }

    pub async fn get(&self) -> Result<Instance> {
        match self.mode {
            LazyMode::PerAccess => self.resolver()?.resolve_token(&self.token).await,
            LazyMode::Cached => self
                .cached
                .get_or_try_init(|| async { self.resolver()?.resolve_token(&self.token).await })
                .await
                .cloned(),
        }
    }
}

/// What the property injector hands to an injection site.
#[derive(Clone)]
pub enum Injection {
    Eager(Instance),
    Lazy(Arc<LazyHandle>),
}

/// A typed lazy dependency.
///
/// `Lazy<T>` resolves `T` from the container only when [`Lazy::get`] is called,
/// which breaks dependency cycles that would otherwise fail at construction.
pub struct Lazy<T: 'static + Send + Sync> {
    handle: Arc<LazyHandle>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static + Send + Sync> Lazy<T> {
    pub fn new(handle: Arc<LazyHandle>) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    pub fn mode(&self) -> LazyMode {
        self.handle.mode()
    }

    pub async fn get(&self) -> Result<Arc<T>> {
        self.handle.get().await?.downcast::<T>()
    }
}

impl<T: 'static + Send + Sync> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.handle))
    }
}

impl<T: 'static + Send + Sync> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("token", self.handle.token())
            .field("mode", &self.handle.mode())
            .finish()
    }
}

enum Wired<T: 'static + Send + Sync> {
    Eager(Arc<T>),
    Lazy(Lazy<T>),
}

/// A property filled in by the property injector after construction.
///
/// Singleton and prototype dependencies arrive eagerly; transient ones arrive as
/// a per-access handle, so every [`Autowired::get`] yields a fresh instance.
pub struct Autowired<T: 'static + Send + Sync> {
    slot: OnceLock<Wired<T>>,
}

impl<T: 'static + Send + Sync> Autowired<T> {
    pub fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    pub async fn get(&self) -> Result<Arc<T>> {
        match self.slot.get() {
            Some(Wired::Eager(value)) => Ok(Arc::clone(value)),
            Some(Wired::Lazy(lazy)) => lazy.get().await,
            None => Err(BeanweaveError::not_found(format!(
                "{} has not been injected yet",
                std::any::type_name::<T>()
            ))),
        }
    }

    /// The injected value when it was resolved eagerly.
    pub fn now(&self) -> Option<Arc<T>> {
        match self.slot.get() {
            Some(Wired::Eager(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn is_injected(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.slot.get(), Some(Wired::Lazy(_)))
    }

    /// Fill the cell. Returns `Ok(false)` when it was already filled.
    pub fn inject(&self, injection: Injection) -> Result<bool> {
        let wired = match injection {
            Injection::Eager(instance) => Wired::Eager(instance.downcast::<T>()?),
            Injection::Lazy(handle) => Wired::Lazy(Lazy::new(handle)),
        };
        Ok(self.slot.set(wired).is_ok())
    }
}

impl<T: 'static + Send + Sync> Default for Autowired<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static + Send + Sync> fmt::Debug for Autowired<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.slot.get() {
            Some(Wired::Eager(_)) => "eager",
            Some(Wired::Lazy(_)) => "lazy",
            None => "empty",
        };
        f.debug_struct("Autowired")
            .field("type", &std::any::type_name::<T>())
            .field("state", &state)
            .finish()
    }
}
