//! Dependency injection core: tokens, metadata, the token registry and the
//! recursive class factory.

mod class;
mod container;
mod factory;
mod instance;
mod lazy;
pub mod metadata;
pub mod registry;
mod token;

pub use class::{Class, Component};
pub use container::{Container, WeakContainer};
pub use factory::{ClassFactory, Resolver};
pub use instance::{method_fn, Args, BoxFuture, Instance, Method, MethodResult};
pub use lazy::{Autowired, Injection, Lazy, LazyHandle, LazyMode};
pub use metadata::{ComponentOptions, InjectMode, Param, Scope};
pub use registry::{RedefinitionPolicy, TokenRegistry};
pub use token::Token;
