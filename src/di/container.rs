use crate::config::Config;
use crate::decorator::Declaration;
use crate::di::class::{Class, Component};
use crate::di::factory::{ClassFactory, Resolver};
use crate::di::instance::Instance;
use crate::di::lazy::{Lazy, LazyMode};
use crate::di::metadata::MetadataStore;
use crate::di::registry::{RedefinitionPolicy, RegistryEntry, TokenRegistry};
use crate::di::token::Token;
use crate::error::{BeanweaveError, Result};
use crate::lifecycle::LifecycleManager;
use crate::plugin::{builtin_plugins, Plugin};
use std::any::TypeId;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

/// Thread-safe dependency injection container.
///
/// Holds the metadata store, the token registry, the global plugin list, the
/// active configuration and the lifecycle manager. Cloning is cheap and every
/// clone shares the same state.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

struct Inner {
    metadata: MetadataStore,
    registry: TokenRegistry,
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
    config: RwLock<Arc<Config>>,
    lifecycle: LifecycleManager,
}

/// A non-owning reference to a [`Container`], held by lazy handles.
#[derive(Clone)]
pub struct WeakContainer {
    inner: Weak<Inner>,
}

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

static GLOBAL: OnceLock<Container> = OnceLock::new();

impl Container {
    pub fn new() -> Self {
        Self::with_policy(RedefinitionPolicy::default())
    }

    /// A container whose registry applies `policy` to token collisions.
    pub fn with_policy(policy: RedefinitionPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                metadata: MetadataStore::new(),
                registry: TokenRegistry::with_policy(policy),
                plugins: RwLock::new(Vec::new()),
                config: RwLock::new(Arc::new(Config::empty())),
                lifecycle: LifecycleManager::new(),
            }),
        }
    }

    /// The process-wide default container.
    pub fn global() -> Container {
        GLOBAL.get_or_init(Container::new).clone()
    }

    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.inner.metadata
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.inner.registry
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.inner.lifecycle
    }

    /// Run the declaration of `T` against this container.
    pub fn declare<T: Component>(&self) -> Result<()> {
        let mut declaration = Declaration::<T>::new();
        T::declare(&mut declaration);
        declaration.apply(self)
    }

    pub fn is_declared<T: 'static>(&self) -> bool {
        self.metadata().component(TypeId::of::<T>()).is_some()
    }

    /// Bind a pre-built value to `token`. It resolves like a materialized singleton.
    pub fn register_instance<T: Send + Sync + 'static>(
        &self,
        token: impl Into<Token>,
        value: T,
    ) -> Result<()> {
        let token = token.into();
        let class = Class::from_fn::<T, _>(|_: &crate::di::Args| {
            Err(BeanweaveError::Internal(format!(
                "{} is a registered instance and cannot be constructed",
                std::any::type_name::<T>()
            )))
        });
        self.registry()
            .register(token, RegistryEntry::materialized(class, Instance::new(value)))
    }

    /// Add a plugin that runs on every resolution after the built-ins.
    pub fn register_global_plugin(&self, plugin: impl Plugin) {
        tracing::debug!("Registered global plugin `{}`", plugin.name());
        self.inner
            .plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(plugin));
    }

    pub fn global_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.inner
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Built-in plugins followed by the global ones.
    pub fn default_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        let mut plugins = builtin_plugins();
        plugins.extend(self.global_plugins());
        plugins
    }

    pub fn set_config(&self, config: Config) {
        *self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    pub fn config(&self) -> Arc<Config> {
        Arc::clone(
            &self
                .inner
                .config
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// A factory for `T` using the default plugins.
    pub fn factory<T: Component>(&self) -> ClassFactory {
        ClassFactory::new(self, Class::of::<T>(), self.default_plugins())
    }

    /// A resolver using the default plugins.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self, self.default_plugins())
    }

    /// Resolve the component registered for the type `T`.
    pub async fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get(&Token::of::<T>()).await?.downcast::<T>()
    }

    /// Resolve whatever `token` is bound to.
    pub async fn get(&self, token: &Token) -> Result<Instance> {
        self.resolver().resolve_token(token).await
    }

    /// A handle that resolves `T` on first access. It holds the container
    /// weakly and fails once the container is dropped.
    pub fn lazy<T: Send + Sync + 'static>(&self) -> Lazy<T> {
        Lazy::new(self.resolver().lazy(Token::of::<T>(), LazyMode::Cached))
    }

    /// Forget every declaration, registration and pending destroy hook.
    pub fn clear(&self) {
        self.metadata().clear();
        self.registry().clear();
        self.lifecycle().clear();
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::metadata::{ComponentOptions, Param};
    use crate::di::Args;
    use crate::aspect::{Interceptor, Invocation};
    use crate::lifecycle::OnDestroy;
    use crate::plugin::{AfterCreate, BeforeCreate};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Database;

    impl Component for Database {
        fn declare(_decl: &mut Declaration<Self>) {}

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Database)
        }
    }

    struct Session {
        db: Arc<Database>,
    }

    impl Component for Session {
        fn declare(decl: &mut Declaration<Self>) {
            decl.component(ComponentOptions::transient())
                .constructor([Param::of::<Database>()]);
        }

        fn construct(args: &Args) -> Result<Self> {
            Ok(Session {
                db: args.component(0)?,
            })
        }
    }

    trait Greeting: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeting for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[tokio::test]
    async fn test_singleton_identity() {
        let container = Container::new();
        container.declare::<Database>().unwrap();

        let a = container.get(&Token::of::<Database>()).await.unwrap();
        let b = container.get(&Token::of::<Database>()).await.unwrap();
        assert!(a.ptr_eq(&b));
    }

    #[tokio::test]
    async fn test_transient_freshness() {
        let container = Container::new();
        container.declare::<Database>().unwrap();
        container.declare::<Session>().unwrap();

        let a = container.resolve::<Session>().await.unwrap();
        let b = container.resolve::<Session>().await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a.db, &b.db));
    }

    #[tokio::test]
    async fn test_undeclared_component() {
        let container = Container::new();
        let err = container.factory::<Database>().create_instance().await.unwrap_err();
        assert!(matches!(err, BeanweaveError::MissingMetadata { .. }));

        let err = container.resolve::<Database>().await.unwrap_err();
        assert!(matches!(err, BeanweaveError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_registered_instance() {
        let container = Container::new();
        let greeting: Arc<dyn Greeting> = Arc::new(English);
        container
            .register_instance(Token::named("greeting"), greeting)
            .unwrap();

        let resolved = container.get(&Token::named("greeting")).await.unwrap();
        let greeting = resolved.downcast::<Arc<dyn Greeting>>().unwrap();
        assert_eq!(greeting.greet(), "hello");
    }

    #[tokio::test]
    async fn test_clear_isolation() {
        let container = Container::new();
        container.declare::<Database>().unwrap();
        container.get(&Token::of::<Database>()).await.unwrap();
        assert!(!container.registry().is_empty());

        container.clear();
        assert!(container.registry().is_empty());
        assert!(!container.is_declared::<Database>());
        assert!(container.get(&Token::of::<Database>()).await.is_err());
    }

    #[tokio::test]
    async fn test_registry_clear_rebuilds_singletons() {
        let container = Container::new();
        container.declare::<Database>().unwrap();

        let a = container.resolve::<Database>().await.unwrap();
        container.registry().clear();
        let b = container.resolve::<Database>().await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &container.resolve::<Database>().await.unwrap()));
    }

    struct Pool;

    #[async_trait]
    impl OnDestroy for Pool {
        async fn on_destroy(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    impl Component for Pool {
        fn declare(decl: &mut Declaration<Self>) {
            decl.on_destroy();
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Pool)
        }
    }

    #[tokio::test]
    async fn test_redeclaring_keeps_the_singleton() {
        let container = Container::new();
        container.declare::<Pool>().unwrap();
        let a = container.resolve::<Pool>().await.unwrap();

        container.declare::<Pool>().unwrap();
        let b = container.resolve::<Pool>().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(container.lifecycle().destroy_hook_count(), 1);
    }

    static BEFORE_RUN: AtomicUsize = AtomicUsize::new(0);

    struct CountRuns;

    #[async_trait]
    impl Interceptor for CountRuns {
        async fn before(&self, _call: &mut Invocation) -> anyhow::Result<()> {
            BEFORE_RUN.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Job;

    impl Component for Job {
        fn declare(decl: &mut Declaration<Self>) {
            decl.component(ComponentOptions::transient())
                .method("run", |_this: Arc<Job>, _args| async move { Ok(Value::Null) })
                .intercept_all(CountRuns)
                .intercept("run", CountRuns);
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Job)
        }
    }

    #[tokio::test]
    async fn test_redeclaring_does_not_stack_interceptors() {
        let container = Container::new();
        container.declare::<Job>().unwrap();
        container.declare::<Job>().unwrap();

        let job = container.get(&Token::of::<Job>()).await.unwrap();
        job.invoke("run", Vec::new()).await.unwrap();
        assert_eq!(BEFORE_RUN.load(Ordering::SeqCst), 2);
    }

    struct Recorder {
        name: &'static str,
        events: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Plugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn before_create_instance(&self, _ctx: &mut BeforeCreate<'_>) -> Result<()> {
            self.events.lock().unwrap().push(format!("before:{}", self.name));
            Ok(())
        }

        async fn after_create_instance(&self, _ctx: &mut AfterCreate<'_>) -> Result<()> {
            self.events.lock().unwrap().push(format!("after:{}", self.name));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_global_plugins_run_in_registration_order() {
        let container = Container::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        container.register_global_plugin(Recorder {
            name: "p1",
            events: Arc::clone(&events),
        });
        container.register_global_plugin(Recorder {
            name: "p2",
            events: Arc::clone(&events),
        });
        container.declare::<Database>().unwrap();

        container.get(&Token::of::<Database>()).await.unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec!["before:p1", "before:p2", "after:p1", "after:p2"]
        );
    }

    #[test]
    fn test_global_container_is_shared() {
        let a = Container::global();
        let b = Container::global();
        a.set_config(Config::new(serde_json::json!({ "shared": true })));
        assert_eq!(
            b.config().evaluate("shared").unwrap(),
            Some(serde_json::json!(true))
        );
    }
}
