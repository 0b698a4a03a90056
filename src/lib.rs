//! # Beanweave
//!
//! A dependency injection container with an aspect-oriented extension layer.
//!
//! Types are declared as *components*; the container instantiates them, wires
//! their dependencies and caches them according to their scope. Cross-cutting
//! behaviour is woven in by plugins and method interceptors without touching
//! the component's own code.
//!
//! ## Features
//!
//! - **Scopes**: singleton, transient and prototype components
//! - **Constructor and property injection**: eager, lazy and per-access handles
//! - **Plugin pipeline**: hooks before and after every instantiation
//! - **Method interception**: before / after / catch / finally around component methods
//! - **Configuration binding**: YAML or JSON documents addressed by path expressions
//! - **Lifecycle hooks**: `OnReady` after wiring, `OnDestroy` on shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beanweave::prelude::*;
//!
//! #[derive(Component)]
//! pub struct UserRepository;
//!
//! #[derive(Component)]
//! #[component(depends(UserRepository))]
//! pub struct UserService {
//!     repository: Arc<UserRepository>,
//!     #[value("users.page_size ?? 20")]
//!     page_size: ConfigValue<usize>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = Bootstrap::new(Container::new())
//!         .load_config(&ConfigLoader::new())?
//!         .root::<UserService>()
//!         .run()
//!         .await?;
//!
//!     let service = app.root_as::<UserService>()?;
//!     println!("page size: {}", service.page_size.get_or(20));
//!
//!     app.shutdown().await;
//!     Ok(())
//! }
//! ```

extern crate self as beanweave;

pub mod aspect;
pub mod config;
pub mod decorator;
pub mod di;
pub mod error;
pub mod lifecycle;
pub mod plugin;

// Re-export core types
pub use config::{Config, ConfigError, ConfigLoader};
pub use decorator::Declaration;
pub use di::{
    Args, Autowired, Class, Component, ComponentOptions, Container, InjectMode, Instance, Lazy,
    Param, Scope, Token,
};
pub use error::{BeanweaveError, Result};
pub use lifecycle::{Application, Bootstrap};
pub use plugin::{ConfigValue, Plugin};

// Re-export macros
pub use beanweave_macro::Component;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use beanweave::prelude::*;
/// ```
pub mod prelude {
    pub use crate::aspect::{Interceptor, Invocation, LoggingInterceptor};
    pub use crate::config::{Config, ConfigLoader};
    pub use crate::decorator::Declaration;
    pub use crate::di::{
        Args, Autowired, Class, Component, ComponentOptions, Container, InjectMode, Instance,
        Lazy, MethodResult, Param, Scope, Token,
    };
    pub use crate::error::{BeanweaveError, Result};
    pub use crate::lifecycle::{Application, Bootstrap, OnDestroy, OnReady};
    pub use crate::plugin::{AfterCreate, BeforeCreate, ConfigValue, Plugin};
    pub use async_trait::async_trait;
    pub use beanweave_macro::Component;
    pub use std::sync::Arc;
}
