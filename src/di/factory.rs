//! Class Factory
//!
//! Turns a class into an instance: reads its metadata, resolves constructor
//! arguments depth-first, runs the plugin pipeline around construction, caches
//! singletons and fires the `on_ready` hook.

use crate::di::class::Class;
use crate::di::container::Container;
use crate::di::instance::{Args, BoxFuture, Instance};
use crate::di::lazy::{LazyHandle, LazyMode};
use crate::di::metadata::{
    keys, ComponentMetadata, LifecycleHook, MetadataStore, MethodSite, Param, ParamSite, Scope,
};
use crate::di::token::Token;
use crate::error::{BeanweaveError, Result};
use crate::plugin::{AfterCreate, BeforeCreate, Plugin};
use std::sync::Arc;

/// The shared state of one resolution call chain: the container, the active
/// plugin list and the tokens currently under construction.
#[derive(Clone)]
pub struct Resolver {
    container: Container,
    plugins: Arc<[Arc<dyn Plugin>]>,
    path: Vec<Token>,
}

impl Resolver {
    pub fn new(container: &Container, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self {
            container: container.clone(),
            plugins: plugins.into(),
            path: Vec::new(),
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Tokens under construction, outermost first.
    pub fn path(&self) -> &[Token] {
        &self.path
    }

    /// A fresh call chain over an already shared plugin list.
    pub(crate) fn from_shared(container: Container, plugins: Arc<[Arc<dyn Plugin>]>) -> Self {
        Self {
            container,
            plugins,
            path: Vec::new(),
        }
    }

    pub(crate) fn shared_plugins(&self) -> Arc<[Arc<dyn Plugin>]> {
        Arc::clone(&self.plugins)
    }

    fn descend(&self, token: Token) -> Self {
        let mut path = self.path.clone();
        path.push(token);
        Self {
            container: self.container.clone(),
            plugins: Arc::clone(&self.plugins),
            path,
        }
    }

    /// The declared component class a token refers to.
    ///
    /// Type tokens are looked up in the metadata store first; any token can also
    /// be bound through the token registry.
    pub fn class_for(&self, token: &Token) -> Option<Class> {
        let metadata = self.container.metadata();
        if let Some(id) = token.type_id() {
            if metadata.component(id).is_some() {
                if let Some(class) = metadata.get::<Class>(id, keys::CLASS) {
                    return Some(class.as_ref().clone());
                }
            }
        }
        self.container
            .registry()
            .resolve(token)
            .map(|entry| entry.target)
    }

    pub fn metadata_for(&self, token: &Token) -> Option<Arc<ComponentMetadata>> {
        let class = self.class_for(token)?;
        self.container.metadata().component(class.id())
    }

    pub fn scope_of(&self, token: &Token) -> Option<Scope> {
        self.metadata_for(token).map(|metadata| metadata.scope)
    }

    pub async fn resolve_class(&self, class: Class) -> Result<Instance> {
        let factory = ClassFactory::with_resolver(self.clone(), class);
        factory.create_instance().await
    }

    pub async fn resolve_token(&self, token: &Token) -> Result<Instance> {
        if let Some(instance) = self.container.registry().instance(token) {
            return Ok(instance);
        }
        let class = self
            .class_for(token)
            .ok_or_else(|| BeanweaveError::not_found(format!("no component bound to {}", token)))?;
        self.resolve_class(class).await
    }

    /// A constructor argument. Tokens that name no component resolve to `None`.
    pub async fn resolve_param(&self, param: &Param) -> Result<Option<Instance>> {
        let token = match param {
            Param::Value(value) => return Ok(Some(value.clone())),
            Param::Undefined => return Ok(None),
            Param::Token(token) => token,
        };
        if let Some(instance) = self.container.registry().instance(token) {
            return Ok(Some(instance));
        }
        match self.class_for(token) {
            Some(class) => self.resolve_class(class).await.map(Some),
            None => {
                tracing::trace!("{} is not a component, passing nothing", token);
                Ok(None)
            }
        }
    }

    pub fn lazy(&self, token: Token, mode: LazyMode) -> Arc<LazyHandle> {
        Arc::new(LazyHandle::new(self, token, mode))
    }
}

/// Short-lived orchestrator that constructs one class.
pub struct ClassFactory {
    resolver: Resolver,
    target: Class,
}

impl ClassFactory {
    pub fn new(container: &Container, target: Class, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self::with_resolver(Resolver::new(container, plugins), target)
    }

    pub fn with_resolver(resolver: Resolver, target: Class) -> Self {
        Self { resolver, target }
    }

    pub fn target(&self) -> &Class {
        &self.target
    }

    pub fn create_instance(&self) -> BoxFuture<'_, Result<Instance>> {
        Box::pin(async move {
            let container = self.resolver.container();
            let metadata = container
                .metadata()
                .component(self.target.id())
                .ok_or_else(|| BeanweaveError::MissingMetadata {
                    class: self.target.name().to_string(),
                })?;
            let token = metadata.token.clone();
            let singleton = metadata.scope == Scope::Singleton;

            if singleton {
                if let Some(instance) = container.registry().instance(&token) {
                    tracing::trace!("Reusing singleton {}", token);
                    return Ok(instance);
                }
            }

            if self.resolver.path().contains(&token) {
                let mut cycle: Vec<String> =
                    self.resolver.path().iter().map(ToString::to_string).collect();
                cycle.push(token.to_string());
                return Err(BeanweaveError::CircularDependency {
                    cycle: cycle.join(" -> "),
                });
            }

            let _creation = if singleton {
                let guard = container
                    .registry()
                    .creation_lock(&token)
                    .lock_owned()
                    .await;
                // another task may have finished it while we waited
                if let Some(instance) = container.registry().instance(&token) {
                    return Ok(instance);
                }
                Some(guard)
            } else {
                None
            };

            let resolver = self.resolver.descend(token.clone());
            tracing::debug!("Creating {} ({})", self.target.name(), metadata.scope);

            let mut args = Args::new(self.target.full_name());
            for param in effective_params(container.metadata(), &self.target, &metadata) {
                args.push(resolver.resolve_param(&param).await?);
            }

            let mut before = BeforeCreate::new(self.target.clone(), args, &resolver);
            for plugin in resolver.plugins() {
                plugin.before_create_instance(&mut before).await?;
            }
            let (target, args) = before.into_parts();

            let mut instance = target.construct(&args)?;
            attach_methods(container.metadata(), &target, &mut instance);

            let mut after = AfterCreate::new(target.clone(), instance, &resolver);
            for plugin in resolver.plugins() {
                plugin.after_create_instance(&mut after).await?;
                if after.instance().is_none() {
                    return Err(BeanweaveError::PluginContractViolation {
                        plugin: plugin.name().to_string(),
                        class: target.name().to_string(),
                    });
                }
            }
            let instance = after.into_instance().ok_or_else(|| {
                BeanweaveError::Internal(format!("{} lost its instance", target.name()))
            })?;

            if singleton {
                container
                    .registry()
                    .store_instance(token, self.target.clone(), instance.clone());
            }

            run_lifecycle(container, &instance, singleton).await?;
            Ok(instance)
        })
    }
}

/// Declared parameters with per-index parameter sites applied.
fn effective_params(store: &MetadataStore, target: &Class, metadata: &ComponentMetadata) -> Vec<Param> {
    let mut params = metadata.params.clone();
    for (_, site) in store.member_values::<ParamSite>(target.id(), keys::PARAM) {
        if site.index >= params.len() {
            params.resize(site.index + 1, Param::Undefined);
        }
        params[site.index] = Param::Token(site.token.clone());
    }
    params
}

fn attach_methods(store: &MetadataStore, target: &Class, instance: &mut Instance) {
    for (_, site) in store.member_values::<MethodSite>(target.id(), keys::METHOD) {
        instance.set_method(site.name.clone(), Arc::clone(&site.method));
    }
}

async fn run_lifecycle(container: &Container, instance: &Instance, singleton: bool) -> Result<()> {
    let store = container.metadata();
    if let Some(hook) = store.get::<LifecycleHook>(instance.type_id(), keys::READY) {
        tracing::trace!("Calling on_ready for {}", instance.type_name());
        (**hook)(instance.clone())
            .await
            .map_err(|e| BeanweaveError::lifecycle(instance.type_name(), e.to_string()))?;
    }
    if singleton {
        if let Some(hook) = store.get::<LifecycleHook>(instance.type_id(), keys::DESTROY) {
            container
                .lifecycle()
                .register_destroy(instance.clone(), hook.as_ref().clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::Declaration;
    use crate::di::{Autowired, Component, ComponentOptions};
    use crate::lifecycle::OnReady;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Journal(Mutex<Vec<&'static str>>);

    impl Journal {
        fn record(&self, entry: &'static str) {
            self.0.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    fn container_with_journal() -> (Container, Arc<Journal>) {
        let container = Container::new();
        container
            .register_instance(Token::of::<Journal>(), Journal::default())
            .unwrap();
        let journal = container
            .registry()
            .instance(&Token::of::<Journal>())
            .unwrap()
            .downcast::<Journal>()
            .unwrap();
        (container, journal)
    }

    struct Engine;
    struct Wheels;
    struct Car {
        engine: Arc<Engine>,
        wheels: Arc<Wheels>,
    }

    impl Component for Engine {
        fn declare(decl: &mut Declaration<Self>) {
            decl.constructor([Param::of::<Journal>()]);
        }

        fn construct(args: &Args) -> Result<Self> {
            args.component::<Journal>(0)?.record("Engine");
            Ok(Engine)
        }
    }

    impl Component for Wheels {
        fn declare(decl: &mut Declaration<Self>) {
            decl.constructor([Param::of::<Journal>()]);
        }

        fn construct(args: &Args) -> Result<Self> {
            args.component::<Journal>(0)?.record("Wheels");
            Ok(Wheels)
        }
    }

    impl Component for Car {
        fn declare(decl: &mut Declaration<Self>) {
            decl.component(ComponentOptions::transient()).constructor([
                Param::of::<Journal>(),
                Param::of::<Engine>(),
                Param::of::<Wheels>(),
            ]);
        }

        fn construct(args: &Args) -> Result<Self> {
            args.component::<Journal>(0)?.record("Car");
            Ok(Car {
                engine: args.component(1)?,
                wheels: args.component(2)?,
            })
        }
    }

    #[tokio::test]
    async fn dependencies_are_built_depth_first_left_to_right() {
        let (container, journal) = container_with_journal();
        container.declare::<Engine>().unwrap();
        container.declare::<Wheels>().unwrap();
        container.declare::<Car>().unwrap();

        let first = container.resolve::<Car>().await.unwrap();
        let second = container.resolve::<Car>().await.unwrap();

        assert_eq!(journal.entries(), vec!["Engine", "Wheels", "Car", "Car"]);
        assert!(Arc::ptr_eq(&first.engine, &second.engine));
        assert!(Arc::ptr_eq(&first.wheels, &second.wheels));
    }

    struct Label(&'static str);

    struct Greeter {
        label: Option<Arc<Label>>,
    }

    impl Component for Greeter {
        fn declare(decl: &mut Declaration<Self>) {
            decl.component(ComponentOptions::transient())
                .constructor([Param::of::<Label>()]);
        }

        fn construct(args: &Args) -> Result<Self> {
            Ok(Greeter {
                label: args.optional(0),
            })
        }
    }

    #[tokio::test]
    async fn unknown_params_resolve_to_none() {
        let container = Container::new();
        container.declare::<Greeter>().unwrap();

        let greeter = container.resolve::<Greeter>().await.unwrap();
        assert!(greeter.label.is_none());
    }

    struct Signature {
        label: Arc<Label>,
    }

    impl Component for Signature {
        fn declare(decl: &mut Declaration<Self>) {
            decl.constructor([Param::Undefined]).param(0, "primary");
        }

        fn construct(args: &Args) -> Result<Self> {
            Ok(Signature {
                label: args.component(0)?,
            })
        }
    }

    #[tokio::test]
    async fn param_sites_override_declared_params() {
        let container = Container::new();
        container
            .register_instance("primary", Label("primary"))
            .unwrap();
        container.declare::<Signature>().unwrap();

        let signature = container.resolve::<Signature>().await.unwrap();
        assert_eq!(signature.label.0, "primary");
    }

    #[derive(Debug)]
    struct Chicken;
    struct Egg;

    impl Component for Chicken {
        fn declare(decl: &mut Declaration<Self>) {
            decl.constructor([Param::of::<Egg>()]);
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Chicken)
        }
    }

    impl Component for Egg {
        fn declare(decl: &mut Declaration<Self>) {
            decl.constructor([Param::of::<Chicken>()]);
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Egg)
        }
    }

    #[tokio::test]
    async fn constructor_cycles_are_reported() {
        let container = Container::new();
        container.declare::<Chicken>().unwrap();
        container.declare::<Egg>().unwrap();

        let err = container.resolve::<Chicken>().await.unwrap_err();
        match err {
            BeanweaveError::CircularDependency { cycle } => {
                assert_eq!(cycle, "Chicken -> Egg -> Chicken")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[derive(Debug)]
    struct Parent {
        child: Autowired<Child>,
    }

    #[derive(Debug)]
    struct Child {
        parent: Arc<Parent>,
    }

    impl Component for Parent {
        fn declare(decl: &mut Declaration<Self>) {
            decl.inject_lazy("child", |parent| &parent.child);
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Parent {
                child: Autowired::new(),
            })
        }
    }

    impl Component for Child {
        fn declare(decl: &mut Declaration<Self>) {
            decl.constructor([Param::of::<Parent>()]);
        }

        fn construct(args: &Args) -> Result<Self> {
            Ok(Child {
                parent: args.component(0)?,
            })
        }
    }

    #[tokio::test]
    async fn lazy_properties_break_cycles() {
        let container = Container::new();
        container.declare::<Parent>().unwrap();
        container.declare::<Child>().unwrap();

        let parent = container.resolve::<Parent>().await.unwrap();
        assert!(parent.child.is_lazy());

        let child = parent.child.get().await.unwrap();
        assert!(Arc::ptr_eq(&child.parent, &parent));
        assert!(Arc::ptr_eq(&child, &parent.child.get().await.unwrap()));
    }

    #[tokio::test]
    async fn lazy_handles_do_not_keep_the_container_alive() {
        let container = Container::new();
        container.declare::<Parent>().unwrap();
        container.declare::<Child>().unwrap();

        let parent = container.resolve::<Parent>().await.unwrap();
        let weak = container.downgrade();
        drop(container);

        assert!(weak.upgrade().is_none());
        let err = parent.child.get().await.unwrap_err();
        assert!(matches!(err, BeanweaveError::NotFound { .. }));
    }

    struct Ticket;

    impl Component for Ticket {
        fn declare(decl: &mut Declaration<Self>) {
            decl.component(ComponentOptions::transient());
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Ticket)
        }
    }

    struct Stamp;

    impl Component for Stamp {
        fn declare(decl: &mut Declaration<Self>) {
            decl.component(ComponentOptions::prototype());
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Stamp)
        }
    }

    #[derive(Default)]
    struct Booth {
        ticket: Autowired<Ticket>,
        stamp: Autowired<Stamp>,
    }

    impl Component for Booth {
        fn declare(decl: &mut Declaration<Self>) {
            decl.inject("ticket", |booth| &booth.ticket)
                .inject("stamp", |booth| &booth.stamp);
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Booth::default())
        }
    }

    #[tokio::test]
    async fn transient_properties_resolve_on_every_access() {
        let container = Container::new();
        container.declare::<Ticket>().unwrap();
        container.declare::<Stamp>().unwrap();
        container.declare::<Booth>().unwrap();

        let booth = container.resolve::<Booth>().await.unwrap();
        assert!(booth.ticket.is_lazy());
        let a = booth.ticket.get().await.unwrap();
        let b = booth.ticket.get().await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        assert!(!booth.stamp.is_lazy());
        let stamp = booth.stamp.now().unwrap();
        assert!(Arc::ptr_eq(&stamp, &booth.stamp.get().await.unwrap()));
    }

    struct Thief;

    #[async_trait]
    impl Plugin for Thief {
        fn name(&self) -> &str {
            "thief"
        }

        async fn after_create_instance(&self, ctx: &mut AfterCreate<'_>) -> Result<()> {
            ctx.take_instance();
            Ok(())
        }
    }

    #[tokio::test]
    async fn plugins_must_leave_an_instance() {
        let container = Container::new();
        container.declare::<Ticket>().unwrap();

        let factory = ClassFactory::new(&container, Class::of::<Ticket>(), vec![Arc::new(Thief)]);
        let err = factory.create_instance().await.unwrap_err();
        match err {
            BeanweaveError::PluginContractViolation { plugin, class } => {
                assert_eq!(plugin, "thief");
                assert_eq!(class, "Ticket");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct Relabel;

    #[async_trait]
    impl Plugin for Relabel {
        fn name(&self) -> &str {
            "relabel"
        }

        async fn before_create_instance(&self, ctx: &mut BeforeCreate<'_>) -> Result<()> {
            ctx.args_mut()
                .set(0, Some(Instance::new(Label("from plugin"))));
            Ok(())
        }
    }

    #[tokio::test]
    async fn before_hooks_can_rewrite_arguments() {
        let container = Container::new();
        container.declare::<Greeter>().unwrap();

        let factory =
            ClassFactory::new(&container, Class::of::<Greeter>(), vec![Arc::new(Relabel)]);
        let greeter = factory
            .create_instance()
            .await
            .unwrap()
            .downcast::<Greeter>()
            .unwrap();
        assert_eq!(greeter.label.as_ref().unwrap().0, "from plugin");
    }

    static WARMED: AtomicUsize = AtomicUsize::new(0);

    struct Cache;

    #[async_trait]
    impl OnReady for Cache {
        async fn on_ready(&self) -> anyhow::Result<()> {
            WARMED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Component for Cache {
        fn declare(decl: &mut Declaration<Self>) {
            decl.on_ready();
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Cache)
        }
    }

    #[derive(Debug)]
    struct Broken;

    #[async_trait]
    impl OnReady for Broken {
        async fn on_ready(&self) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    impl Component for Broken {
        fn declare(decl: &mut Declaration<Self>) {
            decl.on_ready();
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Broken)
        }
    }

    #[tokio::test]
    async fn on_ready_runs_once_per_construction() {
        let container = Container::new();
        container.declare::<Cache>().unwrap();
        container.declare::<Broken>().unwrap();

        container.resolve::<Cache>().await.unwrap();
        container.resolve::<Cache>().await.unwrap();
        assert_eq!(WARMED.load(Ordering::SeqCst), 1);

        let err = container.resolve::<Broken>().await.unwrap_err();
        match err {
            BeanweaveError::Lifecycle { class, message } => {
                assert_eq!(class, "Broken");
                assert_eq!(message, "connection refused");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
