//! Metadata Store
//!
//! A key-value association from a component type (or one of its members) to
//! structured metadata. The store holds no policy: merging and validation live
//! in the annotations that write here.

use crate::di::instance::{BoxFuture, Instance, Method};
use crate::di::lazy::Injection;
use crate::di::token::Token;
use crate::error::Result;
use crate::aspect::Interceptor;
use dashmap::DashMap;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use strum_macros::{Display, EnumString};

pub type MetadataValue = Arc<dyn Any + Send + Sync>;

/// Well-known metadata keys written by the built-in annotations.
pub mod keys {
    pub const CLASS: &str = "beanweave:class";
    pub const COMPONENT: &str = "beanweave:component";
    pub const INJECT: &str = "beanweave:inject";
    pub const VALUE: &str = "beanweave:value";
    pub const PARAM: &str = "beanweave:param";
    pub const METHOD: &str = "beanweave:method";
    pub const INTERCEPT: &str = "beanweave:intercept";
    pub const READY: &str = "beanweave:ready";
    pub const DESTROY: &str = "beanweave:destroy";
}

/// A member-level metadata site.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Member {
    Property(String),
    Parameter(usize),
    Method(String),
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Property(name) | Member::Method(name) => f.write_str(name),
            Member::Parameter(index) => write!(f, "#{}", index),
        }
    }
}

/// Thread-safe metadata store.
#[derive(Default)]
pub struct MetadataStore {
    class: DashMap<(TypeId, &'static str), MetadataValue>,
    member: DashMap<(TypeId, &'static str, Member), MetadataValue>,
    member_order: DashMap<(TypeId, &'static str), Vec<Member>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach or replace class-level metadata.
    pub fn set<V: Any + Send + Sync>(&self, target: TypeId, key: &'static str, value: V) {
        self.set_raw(target, key, Arc::new(value));
    }

    pub fn set_raw(&self, target: TypeId, key: &'static str, value: MetadataValue) {
        self.class.insert((target, key), value);
    }

    pub fn get<V: Any + Send + Sync>(&self, target: TypeId, key: &'static str) -> Option<Arc<V>> {
        self.get_raw(target, key)?.downcast::<V>().ok()
    }

    pub fn get_raw(&self, target: TypeId, key: &'static str) -> Option<MetadataValue> {
        self.class.get(&(target, key)).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, target: TypeId, key: &'static str) -> bool {
        self.class.contains_key(&(target, key))
    }

    /// Attach or replace metadata on one member of `target`.
    pub fn set_member<V: Any + Send + Sync>(
        &self,
        target: TypeId,
        key: &'static str,
        member: Member,
        value: V,
    ) {
        self.set_member_raw(target, key, member, Arc::new(value));
    }

    pub fn set_member_raw(
        &self,
        target: TypeId,
        key: &'static str,
        member: Member,
        value: MetadataValue,
    ) {
        let previous = self.member.insert((target, key, member.clone()), value);
        if previous.is_none() {
            self.member_order
                .entry((target, key))
                .or_default()
                .push(member);
        }
    }

    pub fn get_member<V: Any + Send + Sync>(
        &self,
        target: TypeId,
        key: &'static str,
        member: &Member,
    ) -> Option<Arc<V>> {
        self.get_member_raw(target, key, member)?
            .downcast::<V>()
            .ok()
    }

    pub fn get_member_raw(
        &self,
        target: TypeId,
        key: &'static str,
        member: &Member,
    ) -> Option<MetadataValue> {
        self.member
            .get(&(target, key, member.clone()))
            .map(|entry| entry.value().clone())
    }

    /// Members carrying metadata under `key`, in first-declaration order.
    pub fn members(&self, target: TypeId, key: &'static str) -> Vec<Member> {
        self.member_order
            .get(&(target, key))
            .map(|members| members.value().clone())
            .unwrap_or_default()
    }

    /// Typed values of every member under `key`, in first-declaration order.
    pub fn member_values<V: Any + Send + Sync>(
        &self,
        target: TypeId,
        key: &'static str,
    ) -> Vec<(Member, Arc<V>)> {
        self.members(target, key)
            .into_iter()
            .filter_map(|member| {
                let value = self.get_member::<V>(target, key, &member)?;
                Some((member, value))
            })
            .collect()
    }

    /// Drop `key` from `target`, at class level and on every member.
    pub fn remove(&self, target: TypeId, key: &'static str) {
        self.class.remove(&(target, key));
        if let Some((_, members)) = self.member_order.remove(&(target, key)) {
            for member in members {
                self.member.remove(&(target, key, member));
            }
        }
    }

    pub fn component(&self, target: TypeId) -> Option<Arc<ComponentMetadata>> {
        self.get(target, keys::COMPONENT)
    }

    pub fn clear(&self) {
        self.class.clear();
        self.member.clear();
        self.member_order.clear();
    }
}

/// Lifecycle policy controlling instance caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Scope {
    /// One instance per container, cached in the token registry.
    #[default]
    Singleton,
    /// A new instance per resolution; injected properties resolve on every access.
    Transient,
    /// A new instance per resolution, always created eagerly.
    Prototype,
}

/// One constructor parameter.
#[derive(Clone, Debug)]
pub enum Param {
    /// Resolved through the container when it names a component, `None` otherwise.
    Token(Token),
    /// Passed through unchanged.
    Value(Instance),
    Undefined,
}

impl Param {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Param::Token(Token::of::<T>())
    }

    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Param::Value(Instance::new(value))
    }
}

impl From<Token> for Param {
    fn from(token: Token) -> Self {
        Param::Token(token)
    }
}

/// Construction and lifecycle rules of one component.
#[derive(Clone, Debug)]
pub struct ComponentMetadata {
    pub token: Token,
    pub scope: Scope,
    pub rebind_allowed: bool,
    pub params: Vec<Param>,
}

impl ComponentMetadata {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            scope: Scope::default(),
            rebind_allowed: true,
            params: Vec::new(),
        }
    }

    /// Apply every option that is set, leaving the others untouched.
    pub fn merge(&self, options: &ComponentOptions) -> Self {
        let mut merged = self.clone();
        if let Some(token) = &options.token {
            merged.token = token.clone();
        }
        if let Some(scope) = options.scope {
            merged.scope = scope;
        }
        if let Some(rebind) = options.rebind_allowed {
            merged.rebind_allowed = rebind;
        }
        if let Some(params) = &options.params {
            merged.params = params.clone();
        }
        merged
    }
}

/// Options accepted by the `component` annotation. Unset fields keep their
/// current (or default) value.
#[derive(Clone, Debug, Default)]
pub struct ComponentOptions {
    pub token: Option<Token>,
    pub scope: Option<Scope>,
    pub rebind_allowed: Option<bool>,
    pub params: Option<Vec<Param>>,
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton() -> Self {
        Self::new().scope(Scope::Singleton)
    }

    pub fn transient() -> Self {
        Self::new().scope(Scope::Transient)
    }

    pub fn prototype() -> Self {
        Self::new().scope(Scope::Prototype)
    }

    pub fn token(mut self, token: impl Into<Token>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn rebind(mut self, allowed: bool) -> Self {
        self.rebind_allowed = Some(allowed);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params = Some(params.into_iter().collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.first_set().is_none()
    }

    /// Name of the first option that is set.
    pub fn first_set(&self) -> Option<&'static str> {
        if self.token.is_some() {
            Some("token")
        } else if self.scope.is_some() {
            Some("scope")
        } else if self.rebind_allowed.is_some() {
            Some("rebind")
        } else if self.params.is_some() {
            Some("params")
        } else {
            None
        }
    }
}

/// How an injected property is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InjectMode {
    /// Follow the dependency's scope: transient dependencies become per-access handles.
    #[default]
    Auto,
    /// Resolve on first access and keep the result.
    Lazy,
}

pub type PropertyAssigner = Arc<dyn Fn(&Instance, Injection) -> Result<()> + Send + Sync>;
pub type ValueAssigner = Arc<dyn Fn(&Instance, Value) -> Result<()> + Send + Sync>;
pub type LifecycleHook =
    Arc<dyn Fn(Instance) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A property dependency-injection point.
#[derive(Clone)]
pub struct InjectionSite {
    pub property: String,
    pub token: Token,
    pub design_type: &'static str,
    pub mode: InjectMode,
    pub assign: PropertyAssigner,
}

/// A property bound to a configuration expression.
#[derive(Clone)]
pub struct ValueSite {
    pub property: String,
    pub expression: String,
    pub design_type: &'static str,
    pub assign: ValueAssigner,
}

/// A constructor parameter override.
#[derive(Clone, Debug)]
pub struct ParamSite {
    pub index: usize,
    pub token: Token,
}

#[derive(Clone)]
pub struct MethodSite {
    pub name: String,
    pub method: Method,
}

/// Interceptors attached to one method, or to every method of a class.
#[derive(Clone, Default)]
pub struct InterceptorChain(pub Vec<Arc<dyn Interceptor>>);
