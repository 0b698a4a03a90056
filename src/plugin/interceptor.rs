use crate::aspect::intercept_all;
use crate::di::metadata::{keys, InterceptorChain, Member};
use crate::error::Result;
use crate::plugin::{AfterCreate, Plugin};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Weaves declared interceptors around the methods of new instances.
///
/// Class-wide interceptors wrap outside the method's own ones; within each
/// list the first declared is outermost.
pub struct MethodInterceptor;

#[async_trait]
impl Plugin for MethodInterceptor {
    fn name(&self) -> &str {
        "method-interceptor"
    }

    async fn after_create_instance(&self, ctx: &mut AfterCreate<'_>) -> Result<()> {
        let store = ctx.resolver().container().metadata();
        let id = ctx.target().id();
        let class = ctx.target().name();
        let class_wide = store.get::<InterceptorChain>(id, keys::INTERCEPT);
        let mut per_method: HashMap<String, Arc<InterceptorChain>> = store
            .member_values::<InterceptorChain>(id, keys::INTERCEPT)
            .into_iter()
            .filter_map(|(member, chain)| match member {
                Member::Method(name) => Some((name, chain)),
                _ => None,
            })
            .collect();
        if class_wide.is_none() && per_method.is_empty() {
            return Ok(());
        }
        let Some(instance) = ctx.instance_mut() else {
            return Ok(());
        };

        for name in instance.method_names() {
            let mut chain = class_wide
                .as_ref()
                .map(|chain| chain.0.clone())
                .unwrap_or_default();
            if let Some(own) = per_method.remove(&name) {
                chain.extend(own.0.iter().cloned());
            }
            if chain.is_empty() {
                continue;
            }
            if let Some(method) = instance.method(&name) {
                tracing::trace!("Weaving {} interceptor(s) around {}.{}", chain.len(), class, name);
                instance.set_method(name.clone(), intercept_all(method, &chain, &name));
            }
        }

        for name in per_method.keys() {
            tracing::warn!("{}.{} is intercepted but has no such method", class, name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::aspect::{Interceptor, Invocation};
    use crate::decorator::Declaration;
    use crate::di::{Args, Component, Container, Token};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    static WOVEN: Mutex<Vec<String>> = Mutex::new(Vec::new());

    struct Tag(&'static str);

    #[async_trait]
    impl Interceptor for Tag {
        async fn before(&self, call: &mut Invocation) -> anyhow::Result<()> {
            WOVEN
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.0, call.method()));
            Ok(())
        }
    }

    struct Upper;

    #[async_trait]
    impl Interceptor for Upper {
        async fn after(&self, _call: &Invocation, value: Value) -> crate::di::MethodResult {
            Ok(json!(value.as_str().unwrap_or_default().to_uppercase()))
        }
    }

    struct Greeter;

    impl Component for Greeter {
        fn declare(decl: &mut Declaration<Self>) {
            decl.method("greet", |_this: Arc<Greeter>, args| async move {
                let name = args.first().and_then(Value::as_str).unwrap_or("world");
                Ok(json!(format!("hello {name}")))
            })
            .method("wave", |_this: Arc<Greeter>, _args| async move { Ok(json!("*waves*")) })
            .intercept_all(Tag("class"))
            .intercept("greet", Tag("method"))
            .intercept("greet", Upper)
            .intercept("missing", Tag("nobody"));
        }

        fn construct(_args: &Args) -> crate::Result<Self> {
            Ok(Greeter)
        }
    }

    #[tokio::test]
    async fn class_wide_interceptors_wrap_method_ones() {
        let container = Container::new();
        container.declare::<Greeter>().unwrap();
        let greeter = container.get(&Token::of::<Greeter>()).await.unwrap();

        let greeting = greeter.invoke("greet", vec![json!("ada")]).await.unwrap();
        assert_eq!(greeting, json!("HELLO ADA"));
        let wave = greeter.invoke("wave", vec![]).await.unwrap();
        assert_eq!(wave, json!("*waves*"));

        assert_eq!(
            *WOVEN.lock().unwrap(),
            vec!["class:greet", "method:greet", "class:wave"]
        );
    }
}
