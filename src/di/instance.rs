use crate::di::token::short_type_name;
use crate::error::{BeanweaveError, Result};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of invoking a component method.
pub type MethodResult = anyhow::Result<Value>;

/// A type-erased, invocable component method.
///
/// Methods receive the instance they were called on, so a wrapper can forward
/// to the method it wraps without knowing the concrete component type.
pub type Method = Arc<dyn Fn(Instance, Vec<Value>) -> BoxFuture<'static, MethodResult> + Send + Sync>;

/// Box an async closure into a [`Method`].
pub fn method_fn<F, Fut>(f: F) -> Method
where
    F: Fn(Instance, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MethodResult> + Send + 'static,
{
    Arc::new(
        move |this: Instance, args: Vec<Value>| -> BoxFuture<'static, MethodResult> {
            Box::pin(f(this, args))
        },
    )
}

/// A materialized component.
///
/// Cloning an `Instance` is cheap and preserves identity: clones share the
/// underlying object. Plugins decorate an instance by swapping entries of its
/// method table or by replacing the instance outright.
#[derive(Clone)]
pub struct Instance {
    object: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
    methods: Arc<HashMap<String, Method>>,
}

impl Instance {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Send + Sync + 'static>(object: Arc<T>) -> Self {
        Self {
            object,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            methods: Arc::new(HashMap::new()),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.object
            .clone()
            .downcast::<T>()
            .map_err(|_| BeanweaveError::DowncastFailed {
                type_name: format!(
                    "{} (instance is {})",
                    std::any::type_name::<T>(),
                    self.type_name
                ),
            })
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    /// Whether both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.object) as *const (),
            Arc::as_ptr(&other.object) as *const (),
        )
    }

    pub fn method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).cloned()
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Install or replace a method. Other clones of this instance keep their table.
    pub fn set_method(&mut self, name: impl Into<String>, method: Method) {
        Arc::make_mut(&mut self.methods).insert(name.into(), method);
    }

    pub fn with_method(mut self, name: impl Into<String>, method: Method) -> Self {
        self.set_method(name, method);
        self
    }

    /// Call a method through the (possibly intercepted) method table.
    pub async fn invoke(&self, name: &str, args: Vec<Value>) -> MethodResult {
        let method = self.method(name).ok_or_else(|| {
            anyhow::Error::new(BeanweaveError::not_found(format!(
                "method `{}` on {}",
                name,
                self.type_name()
            )))
        })?;
        method(self.clone(), args).await
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name())
            .field("methods", &self.method_names())
            .finish()
    }
}

/// Resolved constructor arguments, in declaration order.
///
/// A slot is `None` when its parameter named something that is not a
/// component, mirroring an undefined argument.
#[derive(Clone, Debug, Default)]
pub struct Args {
    class: &'static str,
    values: Vec<Option<Instance>>,
}

impl Args {
    pub fn new(class: &'static str) -> Self {
        Self {
            class,
            values: Vec::new(),
        }
    }

    pub fn from_values(class: &'static str, values: Vec<Option<Instance>>) -> Self {
        Self { class, values }
    }

    pub fn push(&mut self, value: Option<Instance>) {
        self.values.push(value);
    }

    pub fn set(&mut self, index: usize, value: Option<Instance>) {
        if index >= self.values.len() {
            self.values.resize(index + 1, None);
        }
        self.values[index] = value;
    }

    pub fn get(&self, index: usize) -> Option<&Instance> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Instance>> {
        self.values.iter().map(Option::as_ref)
    }

    /// A required dependency at `index`.
    pub fn component<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>> {
        self.get(index)
            .ok_or_else(|| BeanweaveError::MissingArgument {
                class: short_type_name(self.class).to_string(),
                index,
            })?
            .downcast::<T>()
    }

    /// An optional dependency; `None` when the slot is empty or holds another type.
    pub fn optional<T: Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.get(index).and_then(|instance| instance.downcast::<T>().ok())
    }
}
