//! Plugin Pipeline
//!
//! Plugins are hook objects invoked around instantiation. Every plugin sees the
//! state left by the plugins before it; the pipeline enforces ordering only.
//!
//! # Example
//!
//! ```rust,ignore
//! use beanweave::plugin::{AfterCreate, Plugin};
//! use async_trait::async_trait;
//!
//! struct AuditPlugin;
//!
//! #[async_trait]
//! impl Plugin for AuditPlugin {
//!     fn name(&self) -> &str {
//!         "audit"
//!     }
//!
//!     async fn after_create_instance(&self, ctx: &mut AfterCreate<'_>) -> beanweave::Result<()> {
//!         tracing::info!("created {}", ctx.target().name());
//!         Ok(())
//!     }
//! }
//! ```

pub mod interceptor;
pub mod property;
pub mod value;

use crate::di::{Args, Class, Instance, Resolver};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use interceptor::MethodInterceptor;
pub use property::PropertyInjector;
pub use value::{ConfigValue, ValueBinder};

#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Used in logs and contract-violation errors.
    fn name(&self) -> &str;

    /// May rewrite the target class or the constructor arguments.
    async fn before_create_instance(&self, _ctx: &mut BeforeCreate<'_>) -> Result<()> {
        Ok(())
    }

    /// May decorate or replace the constructed instance.
    async fn after_create_instance(&self, _ctx: &mut AfterCreate<'_>) -> Result<()> {
        Ok(())
    }
}

/// Working state of the before-create hooks.
pub struct BeforeCreate<'a> {
    target: Class,
    args: Args,
    resolver: &'a Resolver,
}

impl<'a> BeforeCreate<'a> {
    pub(crate) fn new(target: Class, args: Args, resolver: &'a Resolver) -> Self {
        Self {
            target,
            args,
            resolver,
        }
    }

    pub fn target(&self) -> &Class {
        &self.target
    }

    pub fn set_target(&mut self, target: Class) {
        self.target = target;
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Args {
        &mut self.args
    }

    pub fn set_args(&mut self, args: Args) {
        self.args = args;
    }

    pub fn resolver(&self) -> &Resolver {
        self.resolver
    }

    pub(crate) fn into_parts(self) -> (Class, Args) {
        (self.target, self.args)
    }
}

/// Working state of the after-create hooks.
pub struct AfterCreate<'a> {
    target: Class,
    instance: Option<Instance>,
    resolver: &'a Resolver,
}

impl<'a> AfterCreate<'a> {
    pub(crate) fn new(target: Class, instance: Instance, resolver: &'a Resolver) -> Self {
        Self {
            target,
            instance: Some(instance),
            resolver,
        }
    }

    pub fn target(&self) -> &Class {
        &self.target
    }

    pub fn set_target(&mut self, target: Class) {
        self.target = target;
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    pub fn instance_mut(&mut self) -> Option<&mut Instance> {
        self.instance.as_mut()
    }

    pub fn set_instance(&mut self, instance: Instance) {
        self.instance = Some(instance);
    }

    /// Leaves the slot empty; the plugin must put an instance back.
    pub fn take_instance(&mut self) -> Option<Instance> {
        self.instance.take()
    }

    pub fn resolver(&self) -> &Resolver {
        self.resolver
    }

    pub(crate) fn into_instance(self) -> Option<Instance> {
        self.instance
    }
}

/// Property injection, value binding and method interception, in that order.
pub fn builtin_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(PropertyInjector),
        Arc::new(ValueBinder::new()),
        Arc::new(MethodInterceptor),
    ]
}
