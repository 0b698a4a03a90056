//! Token Registry
//!
//! Maps a resolution token to the class registered under it and, once a
//! singleton has been materialized, to its cached instance.

use crate::di::class::Class;
use crate::di::instance::Instance;
use crate::di::token::Token;
use crate::error::{BeanweaveError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct RegistryEntry {
    pub target: Class,
    pub instance: Option<Instance>,
}

impl RegistryEntry {
    /// An entry for a declared class that has not been materialized.
    pub fn predefined(target: Class) -> Self {
        Self {
            target,
            instance: None,
        }
    }

    pub fn materialized(target: Class, instance: Instance) -> Self {
        Self {
            target,
            instance: Some(instance),
        }
    }
}

/// What `register` does when a token is already bound to another class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedefinitionPolicy {
    /// Last write wins; the collision is logged.
    #[default]
    Overwrite,
    /// Fail with `TokenConflict`.
    Reject,
}

#[derive(Default)]
pub struct TokenRegistry {
    entries: DashMap<Token, RegistryEntry>,
    creation_locks: DashMap<Token, Arc<Mutex<()>>>,
    policy: RedefinitionPolicy,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: RedefinitionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> RedefinitionPolicy {
        self.policy
    }

    pub fn register(&self, token: Token, entry: RegistryEntry) -> Result<()> {
        if let Some(existing) = self.entries.get(&token) {
            if existing.target != entry.target {
                match self.policy {
                    RedefinitionPolicy::Overwrite => tracing::warn!(
                        "Token {} rebound from {} to {}",
                        token,
                        existing.target.name(),
                        entry.target.name()
                    ),
                    RedefinitionPolicy::Reject => {
                        return Err(BeanweaveError::TokenConflict {
                            token: token.to_string(),
                            existing: existing.target.name().to_string(),
                            incoming: entry.target.name().to_string(),
                        });
                    }
                }
            }
        }
        self.entries.insert(token, entry);
        Ok(())
    }

    pub fn resolve(&self, token: &Token) -> Option<RegistryEntry> {
        self.entries.get(token).map(|entry| entry.value().clone())
    }

    pub fn resolve_or_throw(&self, token: &Token, message: impl Into<String>) -> Result<RegistryEntry> {
        self.resolve(token)
            .ok_or_else(|| BeanweaveError::not_found(message))
    }

    pub fn has(&self, token: &Token) -> bool {
        self.entries.contains_key(token)
    }

    /// The cached instance for `token`, if one has been materialized.
    pub fn instance(&self, token: &Token) -> Option<Instance> {
        self.entries
            .get(token)
            .and_then(|entry| entry.instance.clone())
    }

    pub fn store_instance(&self, token: Token, target: Class, instance: Instance) {
        self.entries
            .insert(token, RegistryEntry::materialized(target, instance));
    }

    pub fn remove(&self, token: &Token) -> Option<RegistryEntry> {
        self.entries.remove(token).map(|(_, entry)| entry)
    }

    /// Serializes creation of the singleton bound to `token`.
    pub(crate) fn creation_lock(&self, token: &Token) -> Arc<Mutex<()>> {
        self.creation_locks
            .entry(token.clone())
            .or_default()
            .value()
            .clone()
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.creation_locks.clear();
    }
}
