//! Method interception.
//!
//! An [`Interceptor`] is woven around a component method with the
//! try/catch/finally contract:
//!
//! ```text
//! try {
//!     before(call)
//!     value = method(args)
//!     return after(call, value)
//! } catch (error) {
//!     return catch(call, error)   // default re-raises
//! } finally {
//!     finally(call)
//! }
//! ```

pub mod logging;

use crate::di::{method_fn, Instance, Method, MethodResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

pub use logging::LoggingInterceptor;

/// # Interceptor
///
/// Cross-cutting behaviour around a component method. Every hook is optional.
///
/// ### Example
///
/// ```rust
/// use beanweave::prelude::*;
/// use serde_json::Value;
///
/// pub struct Fallback;
///
/// #[async_trait]
/// impl Interceptor for Fallback {
///     async fn catch(&self, call: &Invocation, error: anyhow::Error) -> MethodResult {
///         tracing::warn!("{} failed: {}", call.method(), error);
///         Ok(Value::Null)
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    /// Runs before the method. May rewrite the arguments; an error skips the call.
    async fn before(&self, _call: &mut Invocation) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs when the method returned normally. May replace the return value.
    async fn after(&self, _call: &Invocation, value: Value) -> MethodResult {
        Ok(value)
    }

    /// Runs when the method (or `before`/`after`) failed. Returning `Ok`
    /// swallows the error.
    async fn catch(&self, _call: &Invocation, error: anyhow::Error) -> MethodResult {
        Err(error)
    }

    /// Runs last, whatever the outcome.
    async fn finally(&self, _call: &Invocation) {}
}

/// One intercepted method call.
pub struct Invocation {
    instance: Instance,
    method: String,
    args: Vec<Value>,
    started: Instant,
}

impl Invocation {
    pub fn new(instance: Instance, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            instance,
            method: method.into(),
            args,
            started: Instant::now(),
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn class(&self) -> &'static str {
        self.instance.type_name()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Vec<Value> {
        &mut self.args
    }

    pub fn started(&self) -> Instant {
        self.started
    }
}

/// Wrap `method` so that `interceptor` runs around it.
pub fn intercept(method: Method, interceptor: Arc<dyn Interceptor>, name: &str) -> Method {
    let name = name.to_string();
    method_fn(move |this, args| {
        let method = Arc::clone(&method);
        let interceptor = Arc::clone(&interceptor);
        let mut call = Invocation::new(this, name.clone(), args);
        async move {
            let outcome = async {
                interceptor.before(&mut call).await?;
                let value = method(call.instance.clone(), call.args.clone()).await?;
                interceptor.after(&call, value).await
            }
            .await;

            let outcome = match outcome {
                Ok(value) => Ok(value),
                Err(error) => interceptor.catch(&call, error).await,
            };
            interceptor.finally(&call).await;
            outcome
        }
    })
}

/// Wrap `method` in a chain of interceptors; the first one is outermost.
pub fn intercept_all(method: Method, chain: &[Arc<dyn Interceptor>], name: &str) -> Method {
    chain
        .iter()
        .rev()
        .fold(method, |inner, interceptor| {
            intercept(inner, Arc::clone(interceptor), name)
        })
}
