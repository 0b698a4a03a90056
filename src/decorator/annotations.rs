//! Built-in annotations.
//!
//! Each annotation is a decorator produced by one of the builders in
//! [`crate::decorator`]. They own the component rules: metadata merging,
//! rebind sealing and token registration.

use crate::aspect::Interceptor;
use crate::decorator::{
    create_class_decorator, create_method_decorator, create_parameter_decorator,
    create_property_decorator, ClassDecorator, DecoratorContext, MethodDecorator,
    ParameterDecorator, PropertyDecorator, Site,
};
use crate::di::metadata::{
    keys, ComponentMetadata, ComponentOptions, InjectionSite, InterceptorChain, LifecycleHook,
    MethodSite, ParamSite, ValueSite,
};
use crate::di::registry::RegistryEntry;
use crate::di::{Method, Token};
use crate::error::{BeanweaveError, Result};
use std::sync::Arc;

/// Declare the target as a component, or refine an earlier declaration.
///
/// Set options override the stored ones. Once a component is declared with
/// `rebind(false)`, any later non-empty options fail with
/// [`BeanweaveError::RebindNotAllowed`].
pub fn component(options: ComponentOptions) -> ClassDecorator {
    create_class_decorator(move |ctx| {
        let class = ctx.target().clone();
        let current = ctx.class_metadata::<ComponentMetadata>(keys::COMPONENT);

        let metadata = match &current {
            Some(current) => {
                if !current.rebind_allowed {
                    if let Some(member) = options.first_set() {
                        return Err(BeanweaveError::RebindNotAllowed {
                            class: class.name().to_string(),
                            member: member.to_string(),
                        });
                    }
                }
                current.merge(&options)
            }
            None => ComponentMetadata::new(class.token()).merge(&options),
        };

        if let Some(previous) = &current {
            if previous.token != metadata.token {
                let registry = ctx.container().registry();
                let owned = registry
                    .resolve(&previous.token)
                    .is_some_and(|entry| entry.target == class);
                if owned {
                    registry.remove(&previous.token);
                }
            }
        }

        // a materialized singleton of the same class survives re-declaration
        let registry = ctx.container().registry();
        let entry = registry
            .resolve(&metadata.token)
            .filter(|entry| entry.target == class)
            .unwrap_or_else(|| RegistryEntry::predefined(class.clone()));
        registry.register(metadata.token.clone(), entry)?;
        tracing::debug!(
            "Declared {} as {} ({})",
            class.name(),
            metadata.token,
            metadata.scope
        );
        ctx.set_class_metadata(keys::CLASS, class);
        ctx.set_class_metadata(keys::COMPONENT, metadata);
        Ok(())
    })
}

/// Fails when the component is sealed and `key` already has a value at the
/// decorated site.
fn check_member_rebind(ctx: &DecoratorContext<'_>, key: &'static str) -> Result<()> {
    let sealed = ctx
        .class_metadata::<ComponentMetadata>(keys::COMPONENT)
        .is_some_and(|metadata| !metadata.rebind_allowed);
    let Some(member) = ctx.site().member() else {
        return Ok(());
    };
    let taken = ctx
        .container()
        .metadata()
        .get_member_raw(ctx.target().id(), key, &member)
        .is_some();
    if sealed && taken {
        return Err(BeanweaveError::RebindNotAllowed {
            class: ctx.target().name().to_string(),
            member: member.to_string(),
        });
    }
    Ok(())
}

/// Property dependency.
pub fn inject(site: InjectionSite) -> PropertyDecorator {
    create_property_decorator(move |ctx| {
        check_member_rebind(ctx, keys::INJECT)?;
        ctx.set_metadata(keys::INJECT, site.clone());
        Ok(())
    })
}

/// Property bound to a configuration expression.
pub fn value(site: ValueSite) -> PropertyDecorator {
    create_property_decorator(move |ctx| {
        check_member_rebind(ctx, keys::VALUE)?;
        ctx.set_metadata(keys::VALUE, site.clone());
        Ok(())
    })
}

/// Override the token of one constructor parameter.
pub fn param(token: Token) -> ParameterDecorator {
    create_parameter_decorator(move |ctx| {
        let Site::Parameter(index) = *ctx.site() else {
            return Err(BeanweaveError::Internal(format!(
                "param annotation applied to {}",
                ctx.site()
            )));
        };
        check_member_rebind(ctx, keys::PARAM)?;
        ctx.set_metadata(
            keys::PARAM,
            ParamSite {
                index,
                token: token.clone(),
            },
        );
        Ok(())
    })
}

/// Register an invocable method.
pub fn method(method: Method) -> MethodDecorator {
    create_method_decorator(move |ctx| {
        let Site::Method(name) = ctx.site().clone() else {
            return Err(BeanweaveError::Internal(format!(
                "method annotation applied to {}",
                ctx.site()
            )));
        };
        check_member_rebind(ctx, keys::METHOD)?;
        ctx.set_metadata(
            keys::METHOD,
            MethodSite {
                name,
                method: Arc::clone(&method),
            },
        );
        Ok(())
    })
}

/// Append interceptors to one method. Repeated applications accumulate.
pub fn intercept(interceptors: Vec<Arc<dyn Interceptor>>) -> MethodDecorator {
    create_method_decorator(move |ctx| {
        let mut chain = ctx
            .get_metadata::<InterceptorChain>(keys::INTERCEPT)
            .map(|chain| chain.as_ref().clone())
            .unwrap_or_default();
        chain.0.extend(interceptors.iter().cloned());
        ctx.set_metadata(keys::INTERCEPT, chain);
        Ok(())
    })
}

/// Append interceptors to every method of the class.
pub fn intercept_all(interceptors: Vec<Arc<dyn Interceptor>>) -> ClassDecorator {
    create_class_decorator(move |ctx| {
        let mut chain = ctx
            .class_metadata::<InterceptorChain>(keys::INTERCEPT)
            .map(|chain| chain.as_ref().clone())
            .unwrap_or_default();
        chain.0.extend(interceptors.iter().cloned());
        ctx.set_class_metadata(keys::INTERCEPT, chain);
        Ok(())
    })
}

/// Hook awaited after every construction, once plugins have run.
pub fn on_ready(hook: LifecycleHook) -> ClassDecorator {
    create_class_decorator(move |ctx| {
        ctx.set_class_metadata(keys::READY, Arc::clone(&hook));
        Ok(())
    })
}

/// Hook run for cached singletons when the application shuts down.
pub fn on_destroy(hook: LifecycleHook) -> ClassDecorator {
    create_class_decorator(move |ctx| {
        ctx.set_class_metadata(keys::DESTROY, Arc::clone(&hook));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::metadata::{Param, Scope};
    use crate::di::{Args, Class, Container};

    struct Mailer;
    struct Clock;

    fn mailer() -> Class {
        Class::from_fn::<Mailer, _>(|_: &Args| Ok(Mailer))
    }

    #[test]
    fn first_declaration_uses_defaults() {
        let container = Container::new();
        component(ComponentOptions::new())
            .apply(&container, &mailer())
            .unwrap();

        let metadata = container.metadata().component(mailer().id()).unwrap();
        assert_eq!(metadata.token, Token::of::<Mailer>());
        assert_eq!(metadata.scope, Scope::Singleton);
        assert!(metadata.rebind_allowed);
        assert!(metadata.params.is_empty());
        assert!(container.registry().has(&Token::of::<Mailer>()));
    }

    #[test]
    fn later_declarations_merge() {
        let container = Container::new();
        component(ComponentOptions::new().params([Param::of::<Clock>()]))
            .apply(&container, &mailer())
            .unwrap();
        component(ComponentOptions::transient())
            .apply(&container, &mailer())
            .unwrap();

        let metadata = container.metadata().component(mailer().id()).unwrap();
        assert_eq!(metadata.scope, Scope::Transient);
        assert_eq!(metadata.params.len(), 1);
    }

    #[test]
    fn sealed_components_reject_options() {
        let container = Container::new();
        component(ComponentOptions::new().rebind(false))
            .apply(&container, &mailer())
            .unwrap();

        component(ComponentOptions::new())
            .apply(&container, &mailer())
            .unwrap();

        let err = component(ComponentOptions::transient())
            .apply(&container, &mailer())
            .unwrap_err();
        match err {
            BeanweaveError::RebindNotAllowed { member, .. } => assert_eq!(member, "scope"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn changing_the_token_moves_the_registration() {
        let container = Container::new();
        component(ComponentOptions::new())
            .apply(&container, &mailer())
            .unwrap();
        component(ComponentOptions::new().token("mailer"))
            .apply(&container, &mailer())
            .unwrap();

        assert!(!container.registry().has(&Token::of::<Mailer>()));
        assert!(container.registry().has(&Token::named("mailer")));
    }

    #[test]
    fn sealed_members_cannot_be_redefined() {
        let container = Container::new();
        component(ComponentOptions::new().rebind(false))
            .apply(&container, &mailer())
            .unwrap();

        param(Token::of::<Clock>())
            .apply(&container, &mailer(), 0)
            .unwrap();
        let err = param(Token::named("clock"))
            .apply(&container, &mailer(), 0)
            .unwrap_err();
        assert!(matches!(err, BeanweaveError::RebindNotAllowed { .. }));
    }
}
