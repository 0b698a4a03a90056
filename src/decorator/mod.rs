//! Decorator builders
//!
//! A decorator is a piece of declaration logic applied to one site of a class:
//! the class itself, a property, a constructor parameter or a method. The
//! builders here only route metadata to the right place in the store; any
//! merging or validation belongs to the function passed in.
//!
//! # Example
//!
//! ```rust,ignore
//! use beanweave::decorator::{create_method_decorator, DecoratorContext};
//!
//! // Marks a method as audited; a plugin reads the flag later.
//! let audited = create_method_decorator(|ctx: &mut DecoratorContext<'_>| {
//!     ctx.set_metadata("app:audited", true);
//!     Ok(())
//! });
//! audited.apply(&container, &Class::of::<OrderService>(), "place")?;
//! ```

pub mod annotations;
mod declaration;

pub use declaration::Declaration;

use crate::di::metadata::Member;
use crate::di::{Class, Container};
use crate::error::Result;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Where a decorator is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Site {
    Class,
    Property(String),
    Parameter(usize),
    Method(String),
}

impl Site {
    /// The member-level key of this site, `None` for the class itself.
    pub fn member(&self) -> Option<Member> {
        match self {
            Site::Class => None,
            Site::Property(name) => Some(Member::Property(name.clone())),
            Site::Parameter(index) => Some(Member::Parameter(*index)),
            Site::Method(name) => Some(Member::Method(name.clone())),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.member() {
            Some(member) => write!(f, "{}", member),
            None => f.write_str("<class>"),
        }
    }
}

/// What a decorator function sees while it runs.
pub struct DecoratorContext<'a> {
    container: &'a Container,
    target: &'a Class,
    site: Site,
}

impl<'a> DecoratorContext<'a> {
    pub fn new(container: &'a Container, target: &'a Class, site: Site) -> Self {
        Self {
            container,
            target,
            site,
        }
    }

    pub fn target(&self) -> &Class {
        self.target
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn container(&self) -> &Container {
        self.container
    }

    /// Write metadata at the decorated site.
    pub fn set_metadata<V: Any + Send + Sync>(&self, key: &'static str, value: V) {
        let store = self.container.metadata();
        match self.site.member() {
            Some(member) => store.set_member(self.target.id(), key, member, value),
            None => store.set(self.target.id(), key, value),
        }
    }

    /// Read metadata at the decorated site.
    pub fn get_metadata<V: Any + Send + Sync>(&self, key: &'static str) -> Option<Arc<V>> {
        let store = self.container.metadata();
        match self.site.member() {
            Some(member) => store.get_member(self.target.id(), key, &member),
            None => store.get(self.target.id(), key),
        }
    }

    pub fn class_metadata<V: Any + Send + Sync>(&self, key: &'static str) -> Option<Arc<V>> {
        self.container.metadata().get(self.target.id(), key)
    }

    pub fn set_class_metadata<V: Any + Send + Sync>(&self, key: &'static str, value: V) {
        self.container.metadata().set(self.target.id(), key, value);
    }

    /// Members of the target already carrying `key`, in declaration order.
    pub fn sibling_members(&self, key: &'static str) -> Vec<Member> {
        self.container.metadata().members(self.target.id(), key)
    }
}

type DecoratorFn = Arc<dyn Fn(&mut DecoratorContext<'_>) -> Result<()> + Send + Sync>;

fn run(
    decorator: &DecoratorFn,
    container: &Container,
    target: &Class,
    site: Site,
) -> Result<()> {
    let mut ctx = DecoratorContext::new(container, target, site);
    tracing::trace!("Decorating {} at {}", target.name(), ctx.site());
    decorator(&mut ctx)
}

/// A decorator applied to a whole class.
#[derive(Clone)]
pub struct ClassDecorator(DecoratorFn);

impl ClassDecorator {
    pub fn apply(&self, container: &Container, target: &Class) -> Result<()> {
        run(&self.0, container, target, Site::Class)
    }
}

/// A decorator applied to one property.
#[derive(Clone)]
pub struct PropertyDecorator(DecoratorFn);

impl PropertyDecorator {
    pub fn apply(&self, container: &Container, target: &Class, property: &str) -> Result<()> {
        run(&self.0, container, target, Site::Property(property.to_string()))
    }
}

/// A decorator applied to one constructor parameter.
#[derive(Clone)]
pub struct ParameterDecorator(DecoratorFn);

impl ParameterDecorator {
    pub fn apply(&self, container: &Container, target: &Class, index: usize) -> Result<()> {
        run(&self.0, container, target, Site::Parameter(index))
    }
}

/// A decorator applied to one method.
#[derive(Clone)]
pub struct MethodDecorator(DecoratorFn);

impl MethodDecorator {
    pub fn apply(&self, container: &Container, target: &Class, method: &str) -> Result<()> {
        run(&self.0, container, target, Site::Method(method.to_string()))
    }
}

pub fn create_class_decorator<F>(f: F) -> ClassDecorator
where
    F: Fn(&mut DecoratorContext<'_>) -> Result<()> + Send + Sync + 'static,
{
    ClassDecorator(Arc::new(f))
}

pub fn create_property_decorator<F>(f: F) -> PropertyDecorator
where
    F: Fn(&mut DecoratorContext<'_>) -> Result<()> + Send + Sync + 'static,
{
    PropertyDecorator(Arc::new(f))
}

pub fn create_parameter_decorator<F>(f: F) -> ParameterDecorator
where
    F: Fn(&mut DecoratorContext<'_>) -> Result<()> + Send + Sync + 'static,
{
    ParameterDecorator(Arc::new(f))
}

pub fn create_method_decorator<F>(f: F) -> MethodDecorator
where
    F: Fn(&mut DecoratorContext<'_>) -> Result<()> + Send + Sync + 'static,
{
    MethodDecorator(Arc::new(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::Args;

    struct Report;

    fn report_class() -> Class {
        Class::from_fn::<Report, _>(|_: &Args| Ok(Report))
    }

    #[test]
    fn metadata_is_scoped_to_the_site() {
        let container = Container::new();
        let class = report_class();

        let tag = create_property_decorator(|ctx| {
            ctx.set_metadata("test:tag", ctx.site().to_string());
            Ok(())
        });
        tag.apply(&container, &class, "title").unwrap();
        tag.apply(&container, &class, "body").unwrap();

        let store = container.metadata();
        assert_eq!(
            store
                .get_member::<String>(class.id(), "test:tag", &Member::Property("title".into()))
                .as_deref(),
            Some(&"title".to_string())
        );
        assert!(store.get::<String>(class.id(), "test:tag").is_none());
        assert_eq!(
            store.members(class.id(), "test:tag"),
            vec![
                Member::Property("title".into()),
                Member::Property("body".into())
            ]
        );
    }

    #[test]
    fn decorators_see_their_siblings() {
        let container = Container::new();
        let class = report_class();

        let counted = create_method_decorator(|ctx| {
            let position = ctx.sibling_members("test:order").len();
            ctx.set_metadata("test:order", position);
            Ok(())
        });
        counted.apply(&container, &class, "first").unwrap();
        counted.apply(&container, &class, "second").unwrap();

        let second = container.metadata().get_member::<usize>(
            class.id(),
            "test:order",
            &Member::Method("second".into()),
        );
        assert_eq!(second.as_deref(), Some(&1));
    }

    #[test]
    fn class_decorators_write_class_metadata() {
        let container = Container::new();
        let class = report_class();

        create_class_decorator(|ctx| {
            assert_eq!(ctx.site(), &Site::Class);
            ctx.set_metadata("test:kind", "report");
            Ok(())
        })
        .apply(&container, &class)
        .unwrap();

        create_parameter_decorator(|ctx| {
            let kind = ctx.class_metadata::<&str>("test:kind");
            assert_eq!(kind.as_deref(), Some(&"report"));
            ctx.set_class_metadata("test:checked", true);
            Ok(())
        })
        .apply(&container, &class, 0)
        .unwrap();

        assert!(container.metadata().contains(class.id(), "test:checked"));
    }
}
