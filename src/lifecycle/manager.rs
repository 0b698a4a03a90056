//! Lifecycle Manager
//!
//! Tracks the destroy hooks of materialized singletons.

use crate::di::metadata::LifecycleHook;
use crate::di::Instance;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct DestroyHook {
    instance: Instance,
    hook: LifecycleHook,
}

/// Destroy hooks in creation order.
///
/// # Example
///
/// ```rust,ignore
/// let app = Bootstrap::new(container).root::<Server>().run().await?;
/// // ... application runs ...
/// app.container().lifecycle().call_destroy().await;
/// ```
#[derive(Default)]
pub struct LifecycleManager {
    destroy_hooks: Mutex<Vec<DestroyHook>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn hooks(&self) -> MutexGuard<'_, Vec<DestroyHook>> {
        self.destroy_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the destroy hook of a freshly cached singleton.
    pub fn register_destroy(&self, instance: Instance, hook: LifecycleHook) {
        tracing::trace!("Registered on_destroy for {}", instance.type_name());
        self.hooks().push(DestroyHook { instance, hook });
    }

    /// Run every registered destroy hook, newest first.
    ///
    /// Failures are logged and do not stop the remaining hooks. Returns the
    /// number of hooks that failed. Hooks run at most once.
    pub async fn call_destroy(&self) -> usize {
        let hooks = std::mem::take(&mut *self.hooks());
        tracing::info!("Calling on_destroy hooks...");

        let mut failed = 0;
        for entry in hooks.iter().rev() {
            let name = entry.instance.type_name();
            tracing::debug!("Destroying: {}", name);
            if let Err(e) = (entry.hook)(entry.instance.clone()).await {
                tracing::error!("on_destroy failed for {}: {}", name, e);
                failed += 1;
            }
        }

        tracing::info!("on_destroy complete ({} hooks executed)", hooks.len());
        failed
    }

    pub fn destroy_hook_count(&self) -> usize {
        self.hooks().len()
    }

    /// Forget registered hooks without running them.
    pub fn clear(&self) {
        self.hooks().clear();
    }
}
