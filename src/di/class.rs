use crate::decorator::Declaration;
use crate::di::instance::{Args, Instance};
use crate::di::token::{short_type_name, Token};
use crate::error::Result;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

type Constructor = Arc<dyn Fn(&Args) -> Result<Instance> + Send + Sync>;

/// A type the container can construct.
///
/// This is usually implemented with `#[derive(Component)]`.
///
/// # Example
/// ```
/// use beanweave::prelude::*;
///
/// pub struct Clock;
///
/// pub struct Greeter {
///     clock: Arc<Clock>,
/// }
///
/// impl Component for Clock {
///     fn declare(decl: &mut Declaration<Self>) {
///         decl.component(ComponentOptions::new());
///     }
///
///     fn construct(_args: &Args) -> beanweave::Result<Self> {
///         Ok(Clock)
///     }
/// }
///
/// impl Component for Greeter {
///     fn declare(decl: &mut Declaration<Self>) {
///         decl.component(ComponentOptions::transient())
///             .constructor([Param::of::<Clock>()]);
///     }
///
///     fn construct(args: &Args) -> beanweave::Result<Self> {
///         Ok(Greeter { clock: args.component(0)? })
///     }
/// }
/// ```
pub trait Component: Sized + Send + Sync + 'static {
    /// Describe the component: scope, dependencies, injection sites, methods.
    fn declare(decl: &mut Declaration<Self>);

    /// Build the value from resolved constructor arguments.
    fn construct(args: &Args) -> Result<Self>;
}

/// Runtime descriptor of a constructible type.
#[derive(Clone)]
pub struct Class {
    id: TypeId,
    name: &'static str,
    constructor: Constructor,
}

impl Class {
    pub fn of<T: Component>() -> Self {
        Self::from_fn::<T, _>(T::construct)
    }

    /// A class built by an arbitrary constructor, e.g. a replacement target
    /// installed by a plugin.
    pub fn from_fn<T, F>(constructor: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            constructor: Arc::new(move |args: &Args| constructor(args).map(Instance::new)),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        short_type_name(self.name)
    }

    pub fn full_name(&self) -> &'static str {
        self.name
    }

    /// The type token this class answers to by default.
    pub fn token(&self) -> Token {
        Token::Type {
            id: self.id,
            name: self.name,
        }
    }

    pub fn construct(&self, args: &Args) -> Result<Instance> {
        (self.constructor)(args)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Class").field(&self.name()).finish()
    }
}
