//! Application Bootstrap
//!
//! Resolves a root component with the full plugin pipeline and hands back a
//! running [`Application`].

use crate::config::{Config, ConfigLoader};
use crate::di::{Class, Component, Container, Instance, Resolver};
use crate::error::Result;
use crate::plugin::Plugin;
use std::sync::Arc;

type Declare = fn(&Container) -> Result<()>;

/// Builder for [`Application`]
///
/// # Example
///
/// ```rust,ignore
/// use beanweave::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let app = Bootstrap::new(Container::new())
///         .load_config(&ConfigLoader::new())?
///         .root::<Server>()
///         .plugin(AuditPlugin)
///         .run()
///         .await?;
///
///     app.root_as::<Server>()?.serve().await?;
///     app.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Bootstrap {
    container: Container,
    root: Option<(Class, Declare)>,
    config: Option<Config>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Bootstrap {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            root: None,
            config: None,
            plugins: Vec::new(),
        }
    }

    /// The component to resolve. It is declared on `run` if it is not yet.
    pub fn root<T: Component>(mut self) -> Self {
        let declare: Declare = |container| {
            if container.is_declared::<T>() {
                Ok(())
            } else {
                container.declare::<T>()
            }
        };
        self.root = Some((Class::of::<T>(), declare));
        self
    }

    /// Configuration used by value bindings.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn load_config(self, loader: &ConfigLoader) -> Result<Self> {
        let config = loader.load()?;
        Ok(self.config(config))
    }

    /// A plugin used for this bootstrap only, after the container's plugins.
    pub fn plugin(mut self, plugin: impl Plugin) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// A plugin kept by the container for every later resolution.
    pub fn register_global_plugin(self, plugin: impl Plugin) -> Self {
        self.container.register_global_plugin(plugin);
        self
    }

    /// Resolve the root component.
    ///
    /// Without a root, only configuration and plugins are installed and the
    /// application's root is the container itself.
    pub async fn run(self) -> Result<Application> {
        tracing::info!("Starting application initialization...");

        if let Some(config) = self.config {
            self.container.set_config(config);
        }

        let root = match &self.root {
            Some((class, declare)) => {
                declare(&self.container)?;
                let mut plugins = self.container.default_plugins();
                plugins.extend(self.plugins.iter().cloned());
                tracing::debug!(
                    "Resolving {} with {} plugins",
                    class.name(),
                    plugins.len()
                );
                Resolver::new(&self.container, plugins)
                    .resolve_class(class.clone())
                    .await?
            }
            None => Instance::new(self.container.clone()),
        };

        tracing::info!("Application initialization complete");
        Ok(Application {
            container: self.container,
            root,
        })
    }
}

/// A bootstrapped application.
pub struct Application {
    container: Container,
    root: Instance,
}

impl Application {
    pub fn root(&self) -> &Instance {
        &self.root
    }

    pub fn root_as<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.root.downcast::<T>()
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Run `on_destroy` hooks of cached singletons, newest first.
    ///
    /// Failing hooks are logged and skipped; the number of failures is returned.
    pub async fn shutdown(&self) -> usize {
        tracing::info!("Shutting down application...");
        let failed = self.container.lifecycle().call_destroy().await;
        tracing::info!("Application shutdown complete");
        failed
    }

    /// Wait for Ctrl+C or SIGTERM, then shut down.
    pub async fn wait_for_shutdown(&self) -> usize {
        super::shutdown_signal().await;
        self.shutdown().await
    }
}
