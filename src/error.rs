use crate::config::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BeanweaveError>;

#[derive(Debug, Error)]
pub enum BeanweaveError {
    #[error("{class} is not declared as a component")]
    MissingMetadata { class: String },

    #[error("Cannot rebind `{member}` on {class}: its component metadata is sealed")]
    RebindNotAllowed { class: String, member: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Plugin `{plugin}` left no instance while constructing {class}")]
    PluginContractViolation { plugin: String, class: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Token {token} is already bound to {existing}, refusing to rebind it to {incoming}")]
    TokenConflict {
        token: String,
        existing: String,
        incoming: String,
    },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Constructor argument #{index} of {class} was not resolved")]
    MissingArgument { class: String, index: usize },

    #[error("Property `{property}` of {class} has already been injected")]
    AlreadyInjected { class: String, property: String },

    #[error("Lifecycle hook failed for {class}: {message}")]
    Lifecycle { class: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BeanweaveError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn lifecycle(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lifecycle {
            class: class.into(),
            message: message.into(),
        }
    }
}
