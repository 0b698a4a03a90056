//! Lifecycle hook traits
//!
//! Components opt in through their declaration (`decl.on_ready()`,
//! `decl.on_destroy()`) or the derive attributes `#[component(on_ready)]` and
//! `#[component(on_destroy)]`.

use async_trait::async_trait;

/// Called once a component is fully wired
///
/// Runs after every plugin has processed the new instance, so injected
/// properties and configuration values are available. Resolution waits for it.
///
/// # Example
///
/// ```rust,ignore
/// use beanweave::prelude::*;
///
/// #[async_trait]
/// impl OnReady for CacheWarmer {
///     async fn on_ready(&self) -> anyhow::Result<()> {
///         let repo = self.repo.get().await?;
///         self.warm(&repo).await
///     }
/// }
/// ```
#[async_trait]
pub trait OnReady: Send + Sync + 'static {
    async fn on_ready(&self) -> anyhow::Result<()>;
}

/// Called when the application shuts down
///
/// Only cached singletons are destroyed, in **reverse order** of creation, so
/// a component goes away before the dependencies it was built from.
#[async_trait]
pub trait OnDestroy: Send + Sync + 'static {
    async fn on_destroy(&self) -> anyhow::Result<()>;
}
