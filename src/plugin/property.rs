use crate::di::metadata::{keys, InjectMode, InjectionSite, Scope};
use crate::di::{Injection, LazyMode, Resolver};
use crate::error::{BeanweaveError, Result};
use crate::plugin::{AfterCreate, Plugin};
use async_trait::async_trait;

/// Assigns declared property dependencies onto freshly constructed instances.
///
/// Singleton and prototype dependencies are resolved eagerly. Transient ones,
/// and sites declared lazy, are assigned as handles that go back to the
/// container when read.
pub struct PropertyInjector;

#[async_trait]
impl Plugin for PropertyInjector {
    fn name(&self) -> &str {
        "property-injector"
    }

    async fn after_create_instance(&self, ctx: &mut AfterCreate<'_>) -> Result<()> {
        let sites = ctx
            .resolver()
            .container()
            .metadata()
            .member_values::<InjectionSite>(ctx.target().id(), keys::INJECT);
        let Some(instance) = ctx.instance().cloned() else {
            return Ok(());
        };

        for (_, site) in sites {
            let injection = resolve_site(ctx.resolver(), ctx.target().name(), &site).await?;
            tracing::trace!(
                "Injecting {} into {}.{}",
                site.token,
                ctx.target().name(),
                site.property
            );
            (site.assign)(&instance, injection)?;
        }
        Ok(())
    }
}

async fn resolve_site(resolver: &Resolver, class: &str, site: &InjectionSite) -> Result<Injection> {
    if let Some(instance) = resolver.container().registry().instance(&site.token) {
        return Ok(Injection::Eager(instance));
    }
    let scope = resolver.scope_of(&site.token).ok_or_else(|| {
        BeanweaveError::not_found(format!(
            "{}.{} depends on {} ({}), which is not a component",
            class, site.property, site.token, site.design_type
        ))
    })?;

    let injection = match (site.mode, scope) {
        (InjectMode::Lazy, _) => Injection::Lazy(resolver.lazy(site.token.clone(), LazyMode::Cached)),
        (InjectMode::Auto, Scope::Transient) => {
            Injection::Lazy(resolver.lazy(site.token.clone(), LazyMode::PerAccess))
        }
        (InjectMode::Auto, Scope::Singleton | Scope::Prototype) => {
            Injection::Eager(resolver.resolve_token(&site.token).await?)
        }
    };
    Ok(injection)
}
