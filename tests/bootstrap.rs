use beanweave::prelude::*;
use beanweave::ConfigError;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Database {
    url: String,
    pool: u32,
}

#[derive(Component)]
pub struct ServiceA;

#[derive(Component)]
#[component(depends(ServiceA))]
pub struct ServiceB {
    a: Arc<ServiceA>,
}

#[derive(Component)]
#[component(depends(ServiceA, ServiceB))]
pub struct App {
    a: Arc<ServiceA>,
    b: Arc<ServiceB>,
    #[value("app.name")]
    name: ConfigValue<String>,
    #[value("app.database")]
    database: ConfigValue<Database>,
    #[value("app.replicas[1]")]
    replica: ConfigValue<String>,
    #[value("${app.workers:4}")]
    workers: ConfigValue<u32>,
}

const CONFIG: &str = r#"
app:
  name: orders
  database:
    url: postgres://localhost/orders
    pool: 5
  replicas:
    - eu-west
    - us-east
"#;

#[tokio::test]
async fn bootstraps_the_root_with_config() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("application.yaml"), "app:\n  name: fallback\n").unwrap();
    fs::write(dir.path().join("application.test.yaml"), CONFIG).unwrap();
    let loader = ConfigLoader::new().dir(dir.path()).environment("test");

    let app = Bootstrap::new(Container::new())
        .load_config(&loader)
        .unwrap()
        .root::<App>()
        .run()
        .await
        .unwrap();

    let root = app.root_as::<App>().unwrap();
    assert!(Arc::ptr_eq(&root.a, &root.b.a));
    assert_eq!(root.name.get().map(String::as_str), Some("orders"));
    assert_eq!(
        root.database.get(),
        Some(&Database {
            url: "postgres://localhost/orders".to_string(),
            pool: 5,
        })
    );
    assert_eq!(root.replica.get().map(String::as_str), Some("us-east"));
    assert_eq!(root.workers.get(), Some(&4));

    let again = app.container().resolve::<App>().await.unwrap();
    assert!(Arc::ptr_eq(&root, &again));
    assert_eq!(app.shutdown().await, 0);
}

#[tokio::test]
async fn missing_config_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ConfigLoader::new().dir(dir.path());

    let err = Bootstrap::new(Container::new())
        .load_config(&loader)
        .err()
        .unwrap();
    assert!(matches!(err, BeanweaveError::Config(ConfigError::NotFound { .. })));
}

#[tokio::test]
async fn without_a_root_the_container_is_the_root() {
    let app = Bootstrap::new(Container::new())
        .config(Config::new(serde_json::json!({ "feature": true })))
        .run()
        .await
        .unwrap();

    let container = app.root_as::<Container>().unwrap();
    assert_eq!(
        container.config().evaluate("feature").unwrap(),
        Some(serde_json::json!(true))
    );
}

struct Tally(std::sync::atomic::AtomicUsize);

#[async_trait]
impl Plugin for Tally {
    fn name(&self) -> &str {
        "tally"
    }

    async fn after_create_instance(&self, _ctx: &mut AfterCreate<'_>) -> Result<()> {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn bootstrap_plugins_see_the_whole_graph() {
    let tally = Arc::new(Tally(Default::default()));
    let shared = Arc::clone(&tally);

    struct Forward(Arc<Tally>);

    #[async_trait]
    impl Plugin for Forward {
        fn name(&self) -> &str {
            "forward"
        }

        async fn after_create_instance(&self, ctx: &mut AfterCreate<'_>) -> Result<()> {
            self.0.after_create_instance(ctx).await
        }
    }

    Bootstrap::new(Container::new())
        .config(Config::empty())
        .root::<App>()
        .plugin(Forward(shared))
        .run()
        .await
        .unwrap();

    assert_eq!(tally.0.load(std::sync::atomic::Ordering::SeqCst), 3);
}
