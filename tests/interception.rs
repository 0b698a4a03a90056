use beanweave::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct Calculator {
    calls: AtomicUsize,
}

impl Calculator {
    fn divide(&self, a: i64, b: i64) -> anyhow::Result<i64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if b == 0 {
            anyhow::bail!("division by zero");
        }
        Ok(a / b)
    }
}

/// Turns failures into `null`.
pub struct Fallback;

#[async_trait]
impl Interceptor for Fallback {
    async fn catch(&self, call: &Invocation, error: anyhow::Error) -> MethodResult {
        tracing::warn!("{}.{} failed: {}", call.class(), call.method(), error);
        Ok(Value::Null)
    }
}

/// Doubles the first argument.
pub struct Double;

#[async_trait]
impl Interceptor for Double {
    async fn before(&self, call: &mut Invocation) -> anyhow::Result<()> {
        if let Some(first) = call.args_mut().first_mut() {
            *first = json!(first.as_i64().unwrap_or_default() * 2);
        }
        Ok(())
    }
}

impl Component for Calculator {
    fn declare(decl: &mut Declaration<Self>) {
        decl.method("divide", |this: Arc<Calculator>, args: Vec<Value>| async move {
            let a = args.first().and_then(Value::as_i64).unwrap_or_default();
            let b = args.get(1).and_then(Value::as_i64).unwrap_or_default();
            this.divide(a, b).map(|quotient| json!(quotient))
        })
        .intercept_all(LoggingInterceptor)
        .intercept_with("divide", vec![Arc::new(Fallback), Arc::new(Double)]);
    }

    fn construct(_args: &Args) -> Result<Self> {
        Ok(Calculator {
            calls: AtomicUsize::new(0),
        })
    }
}

#[tokio::test]
async fn interceptors_wrap_component_methods() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let container = Container::new();
    container.declare::<Calculator>().unwrap();
    let calculator = container.get(&Token::of::<Calculator>()).await.unwrap();

    let quotient = calculator
        .invoke("divide", vec![json!(10), json!(5)])
        .await
        .unwrap();
    assert_eq!(quotient, json!(4));

    let swallowed = calculator
        .invoke("divide", vec![json!(1), json!(0)])
        .await
        .unwrap();
    assert_eq!(swallowed, Value::Null);

    let inner = calculator.downcast::<Calculator>().unwrap();
    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn errors_propagate_without_a_catch() {
    struct Plain;

    impl Component for Plain {
        fn declare(decl: &mut Declaration<Self>) {
            decl.method("fail", |_this: Arc<Plain>, _args| async move {
                Err::<Value, _>(anyhow::anyhow!("boom"))
            })
            .intercept("fail", LoggingInterceptor);
        }

        fn construct(_args: &Args) -> Result<Self> {
            Ok(Plain)
        }
    }

    let container = Container::new();
    container.declare::<Plain>().unwrap();
    let plain = container.get(&Token::of::<Plain>()).await.unwrap();

    let err = plain.invoke("fail", Vec::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "boom");
}
