use crate::aspect::Interceptor;
use crate::config::ConfigError;
use crate::decorator::annotations;
use crate::decorator::{ClassDecorator, MethodDecorator, ParameterDecorator, PropertyDecorator};
use crate::di::metadata::{
    keys, ComponentOptions, InjectMode, InjectionSite, LifecycleHook, Param, PropertyAssigner,
    ValueAssigner, ValueSite,
};
use crate::di::{
    method_fn, Autowired, BoxFuture, Class, Component, Container, Injection, Instance,
    MethodResult, Token,
};
use crate::error::{BeanweaveError, Result};
use crate::lifecycle::{OnDestroy, OnReady};
use crate::plugin::ConfigValue;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

enum Step {
    Class(ClassDecorator),
    Property(String, PropertyDecorator),
    Parameter(usize, ParameterDecorator),
    Method(String, MethodDecorator),
    Dependency(fn(&Container) -> Result<()>),
}

/// Typed declaration of a component, filled in by [`Component::declare`].
///
/// Calls are recorded and applied in order by [`Container::declare`], after the
/// accumulated component options.
pub struct Declaration<T> {
    class: Class,
    options: ComponentOptions,
    steps: Vec<Step>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> Declaration<T> {
    pub fn new() -> Self {
        Self {
            class: Class::of::<T>(),
            options: ComponentOptions::new(),
            steps: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn class(&self) -> &Class {
        &self.class
    }

    /// Set component options. Repeated calls override field by field.
    pub fn component(&mut self, options: ComponentOptions) -> &mut Self {
        let ComponentOptions {
            token,
            scope,
            rebind_allowed,
            params,
        } = options;
        if token.is_some() {
            self.options.token = token;
        }
        if scope.is_some() {
            self.options.scope = scope;
        }
        if rebind_allowed.is_some() {
            self.options.rebind_allowed = rebind_allowed;
        }
        if params.is_some() {
            self.options.params = params;
        }
        self
    }

    /// Constructor parameters, in argument order.
    pub fn constructor(&mut self, params: impl IntoIterator<Item = Param>) -> &mut Self {
        self.options.params = Some(params.into_iter().collect());
        self
    }

    /// Resolve parameter `index` through `token` instead of its declared param.
    pub fn param(&mut self, index: usize, token: impl Into<Token>) -> &mut Self {
        self.steps
            .push(Step::Parameter(index, annotations::param(token.into())));
        self
    }

    /// Declare `D` too when it is not declared yet.
    pub fn depends_on<D: Component>(&mut self) -> &mut Self {
        self.steps.push(Step::Dependency(|container| {
            if container.is_declared::<D>() {
                Ok(())
            } else {
                container.declare::<D>()
            }
        }));
        self
    }

    /// Inject the component of type `D` into the property read by `field`.
    pub fn inject<D>(&mut self, property: &str, field: fn(&T) -> &Autowired<D>) -> &mut Self
    where
        D: Send + Sync + 'static,
    {
        self.inject_site(property, Token::of::<D>(), InjectMode::Auto, field)
    }

    /// Inject whatever `token` is bound to.
    pub fn inject_token<D>(
        &mut self,
        property: &str,
        token: impl Into<Token>,
        field: fn(&T) -> &Autowired<D>,
    ) -> &mut Self
    where
        D: Send + Sync + 'static,
    {
        self.inject_site(property, token.into(), InjectMode::Auto, field)
    }

    /// Inject a handle that resolves `D` on first access.
    pub fn inject_lazy<D>(&mut self, property: &str, field: fn(&T) -> &Autowired<D>) -> &mut Self
    where
        D: Send + Sync + 'static,
    {
        self.inject_site(property, Token::of::<D>(), InjectMode::Lazy, field)
    }

    pub fn inject_site<D>(
        &mut self,
        property: &str,
        token: Token,
        mode: InjectMode,
        field: fn(&T) -> &Autowired<D>,
    ) -> &mut Self
    where
        D: Send + Sync + 'static,
    {
        let class = self.class.name();
        let name = property.to_string();
        let assign: PropertyAssigner = Arc::new(move |instance: &Instance, injection: Injection| -> Result<()> {
            let target = downcast_target::<T>(instance)?;
            if field(target).inject(injection)? {
                Ok(())
            } else {
                Err(BeanweaveError::AlreadyInjected {
                    class: class.to_string(),
                    property: name.clone(),
                })
            }
        });
        let site = InjectionSite {
            property: property.to_string(),
            token,
            design_type: std::any::type_name::<D>(),
            mode,
            assign,
        };
        self.steps.push(Step::Property(
            property.to_string(),
            annotations::inject(site),
        ));
        self
    }

    /// Bind the property read by `field` to a configuration expression.
    pub fn value<V>(
        &mut self,
        property: &str,
        expression: &str,
        field: fn(&T) -> &ConfigValue<V>,
    ) -> &mut Self
    where
        V: DeserializeOwned + Send + Sync + 'static,
    {
        let class = self.class.name();
        let name = property.to_string();
        let expr = expression.to_string();
        let assign: ValueAssigner = Arc::new(move |instance: &Instance, value: Value| -> Result<()> {
            let target = downcast_target::<T>(instance)?;
            let typed: V = serde_json::from_value(value).map_err(|e| ConfigError::Bind {
                class: class.to_string(),
                property: name.clone(),
                expression: expr.clone(),
                message: e.to_string(),
            })?;
            if field(target).set(typed) {
                Ok(())
            } else {
                Err(BeanweaveError::AlreadyInjected {
                    class: class.to_string(),
                    property: name.clone(),
                })
            }
        });
        let site = ValueSite {
            property: property.to_string(),
            expression: expression.to_string(),
            design_type: std::any::type_name::<V>(),
            assign,
        };
        self.steps.push(Step::Property(
            property.to_string(),
            annotations::value(site),
        ));
        self
    }

    /// Register an invocable method.
    ///
    /// ```rust,ignore
    /// decl.method("greet", |this: Arc<Greeter>, args| async move {
    ///     Ok(json!(this.greet(args[0].as_str().unwrap_or("world"))))
    /// });
    /// ```
    pub fn method<F, Fut>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(Arc<T>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        let method = method_fn(move |this: Instance, args: Vec<Value>| {
            let call = this.downcast::<T>().map(|target| f(target, args));
            async move { call?.await }
        });
        self.steps
            .push(Step::Method(name.to_string(), annotations::method(method)));
        self
    }

    pub fn intercept<I: Interceptor>(&mut self, method: &str, interceptor: I) -> &mut Self {
        self.intercept_with(method, vec![Arc::new(interceptor)])
    }

    /// Attach several interceptors to `method`; the first is outermost.
    pub fn intercept_with(
        &mut self,
        method: &str,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> &mut Self {
        self.steps.push(Step::Method(
            method.to_string(),
            annotations::intercept(interceptors),
        ));
        self
    }

    /// Attach an interceptor to every method.
    pub fn intercept_all<I: Interceptor>(&mut self, interceptor: I) -> &mut Self {
        self.steps
            .push(Step::Class(annotations::intercept_all(vec![Arc::new(
                interceptor,
            )])));
        self
    }

    pub fn on_ready(&mut self) -> &mut Self
    where
        T: OnReady,
    {
        let hook: LifecycleHook = Arc::new(|instance: Instance| -> BoxFuture<'static, anyhow::Result<()>> {
            Box::pin(async move {
                let target = instance.downcast::<T>()?;
                target.on_ready().await
            })
        });
        self.steps.push(Step::Class(annotations::on_ready(hook)));
        self
    }

    pub fn on_destroy(&mut self) -> &mut Self
    where
        T: OnDestroy,
    {
        let hook: LifecycleHook = Arc::new(|instance: Instance| -> BoxFuture<'static, anyhow::Result<()>> {
            Box::pin(async move {
                let target = instance.downcast::<T>()?;
                target.on_destroy().await
            })
        });
        self.steps.push(Step::Class(annotations::on_destroy(hook)));
        self
    }

    /// Apply a custom class decorator.
    pub fn decorate(&mut self, decorator: ClassDecorator) -> &mut Self {
        self.steps.push(Step::Class(decorator));
        self
    }

    pub fn decorate_property(&mut self, property: &str, decorator: PropertyDecorator) -> &mut Self {
        self.steps
            .push(Step::Property(property.to_string(), decorator));
        self
    }

    pub fn decorate_method(&mut self, method: &str, decorator: MethodDecorator) -> &mut Self {
        self.steps.push(Step::Method(method.to_string(), decorator));
        self
    }

    /// Write everything declared so far into `container`.
    pub fn apply(&self, container: &Container) -> Result<()> {
        annotations::component(self.options.clone()).apply(container, &self.class)?;
        // interceptor annotations accumulate, so a replayed declaration starts clean
        container
            .metadata()
            .remove(self.class.id(), keys::INTERCEPT);
        for step in &self.steps {
            match step {
                Step::Class(decorator) => decorator.apply(container, &self.class)?,
                Step::Property(property, decorator) => {
                    decorator.apply(container, &self.class, property)?
                }
                Step::Parameter(index, decorator) => {
                    decorator.apply(container, &self.class, *index)?
                }
                Step::Method(method, decorator) => {
                    decorator.apply(container, &self.class, method)?
                }
                Step::Dependency(declare) => declare(container)?,
            }
        }
        Ok(())
    }
}

impl<T: Component> Default for Declaration<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast_target<T: 'static>(instance: &Instance) -> Result<&T> {
    instance
        .downcast_ref::<T>()
        .ok_or_else(|| BeanweaveError::DowncastFailed {
            type_name: std::any::type_name::<T>().to_string(),
        })
}
