use crate::config::Config;
use crate::di::metadata::{keys, ValueSite};
use crate::error::{BeanweaveError, Result};
use crate::plugin::{AfterCreate, Plugin};
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Binds configuration values onto component properties.
///
/// Uses the container's configuration unless one is given explicitly.
#[derive(Default)]
pub struct ValueBinder {
    config: Option<Arc<Config>>,
}

impl ValueBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config: Some(Arc::new(config)),
        }
    }
}

#[async_trait]
impl Plugin for ValueBinder {
    fn name(&self) -> &str {
        "value-binder"
    }

    async fn after_create_instance(&self, ctx: &mut AfterCreate<'_>) -> Result<()> {
        let container = ctx.resolver().container();
        let sites = container
            .metadata()
            .member_values::<ValueSite>(ctx.target().id(), keys::VALUE);
        if sites.is_empty() {
            return Ok(());
        }
        let Some(instance) = ctx.instance() else {
            return Ok(());
        };
        let config = self.config.clone().unwrap_or_else(|| container.config());

        for (_, site) in sites {
            match config.evaluate(&site.expression)? {
                Some(value) => (site.assign)(instance, value)?,
                None => tracing::debug!(
                    "No value for `{}`, leaving {}.{} unset",
                    site.expression,
                    ctx.target().name(),
                    site.property
                ),
            }
        }
        Ok(())
    }
}

/// A property filled from configuration by the value binder.
pub struct ConfigValue<T> {
    slot: OnceLock<T>,
}

impl<T> ConfigValue<T> {
    pub fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// The bound value, or `None` when the expression matched nothing.
    pub fn get(&self) -> Option<&T> {
        self.slot.get()
    }

    pub fn require(&self) -> Result<&T> {
        self.slot.get().ok_or_else(|| {
            BeanweaveError::not_found(format!(
                "no configuration value bound for {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Returns `false` when a value was already bound.
    pub fn set(&self, value: T) -> bool {
        self.slot.set(value).is_ok()
    }
}

impl<T: Clone> ConfigValue<T> {
    pub fn get_or(&self, default: T) -> T {
        self.slot.get().cloned().unwrap_or(default)
    }
}

impl<T> Default for ConfigValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ConfigValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfigValue").field(&self.slot.get()).finish()
    }
}
