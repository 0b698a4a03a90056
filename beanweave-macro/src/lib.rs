use proc_macro::TokenStream;

mod component;

/// Derive macro declaring a struct as a container-managed component
///
/// Fields are wired by their shape:
///
/// - `Arc<T>`: constructor parameter resolved from the container
/// - `Option<Arc<T>>`: constructor parameter, `None` when `T` is not a component
///
/// `T` must be sized. A trait object registered as an `Arc<dyn Trait>` value is
/// read through an `Arc<Arc<dyn Trait>>` field.
/// - `#[inject] Autowired<T>`: property injected after construction
///   (`#[inject(lazy)]` resolves on first access, `#[inject(token = "name")]`
///   looks up a named token)
/// - `#[value("app.port ?? 8080")] ConfigValue<T>`: bound from configuration
/// - anything else: `Default::default()`
///
/// `#[param(token = "name")]` on a constructor field resolves it through a
/// named token instead of its type.
///
/// Struct options go in `#[component(...)]`: `scope = "transient"`,
/// `token = "name"`, `rebind = false`, `on_ready`, `on_destroy`,
/// `depends(A, B)` and `extend = path::to::fn` for anything the attributes
/// cannot express (methods, interceptors).
///
/// # Example
/// ```ignore
/// use beanweave::prelude::*;
///
/// #[derive(Component)]
/// #[component(scope = "transient", extend = OrderService::methods)]
/// pub struct OrderService {
///     repository: Arc<OrderRepository>,
///     #[inject(lazy)]
///     audit: Autowired<AuditLog>,
///     #[value("orders.page_size ?? 50")]
///     page_size: ConfigValue<usize>,
/// }
/// ```
#[proc_macro_derive(Component, attributes(component, inject, value, param))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    component::derive_component(input)
}
