//! Lifecycle
//!
//! ```text
//! 1. Configuration loading           (Bootstrap::config / load_config)
//!    ↓
//! 2. Declarations                    (Container::declare)
//!    ↓
//! 3. Root resolution                 (Bootstrap::run)
//!    ↓   for every constructed component:
//!    ↓   before hooks → construct → after hooks → cache → OnReady
//!    ↓
//! [Running...]
//!    ↓
//! 4. Shutdown                        (Application::shutdown)
//!        OnDestroy for cached singletons, newest first
//! ```

mod application;
mod manager;
mod shutdown;
mod traits;

pub use application::{Application, Bootstrap};
pub use manager::LifecycleManager;
pub use shutdown::shutdown_signal;
pub use traits::{OnDestroy, OnReady};
