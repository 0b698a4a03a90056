use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, quote_spanned};
use syn::{
    parse::Parse, parse::ParseStream, parse_macro_input, punctuated::Punctuated, spanned::Spanned,
    Attribute, Data, DeriveInput, Field, Fields, GenericArgument, Ident, LitBool, LitStr, Path,
    PathArguments, Token, Type,
};

/// Struct-level options: `#[component(scope = "transient", token = "mailer", ...)]`
#[derive(Default)]
struct ComponentArgs {
    scope: Option<Ident>,
    token: Option<LitStr>,
    rebind: Option<LitBool>,
    on_ready: bool,
    on_destroy: bool,
    depends: Vec<Path>,
    extend: Option<Path>,
}

impl Parse for ComponentArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = ComponentArgs::default();

        while !input.is_empty() {
            let name: Ident = input.parse()?;

            if name == "scope" {
                input.parse::<Token![=]>()?;
                let lit: LitStr = input.parse()?;
                let variant = match lit.value().to_lowercase().as_str() {
                    "singleton" => "Singleton",
                    "transient" => "Transient",
                    "prototype" => "Prototype",
                    other => {
                        return Err(syn::Error::new(
                            lit.span(),
                            format!(
                                "unknown scope `{}`, expected singleton, transient or prototype",
                                other
                            ),
                        ))
                    }
                };
                args.scope = Some(Ident::new(variant, lit.span()));
            } else if name == "token" {
                input.parse::<Token![=]>()?;
                args.token = Some(input.parse()?);
            } else if name == "rebind" {
                input.parse::<Token![=]>()?;
                args.rebind = Some(input.parse()?);
            } else if name == "on_ready" {
                args.on_ready = true;
            } else if name == "on_destroy" {
                args.on_destroy = true;
            } else if name == "depends" {
                // depends(ServiceA, ServiceB)
                let content;
                syn::parenthesized!(content in input);
                let paths = content.parse_terminated(Path::parse, Token![,])?;
                args.depends.extend(paths);
            } else if name == "extend" {
                input.parse::<Token![=]>()?;
                args.extend = Some(input.parse()?);
            } else {
                return Err(syn::Error::new(
                    name.span(),
                    format!("unknown component option `{}`", name),
                ));
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(args)
    }
}

/// `#[inject]`, `#[inject(lazy)]`, `#[inject(token = "name")]`
#[derive(Default)]
struct InjectArgs {
    lazy: bool,
    token: Option<LitStr>,
}

impl Parse for InjectArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = InjectArgs::default();
        while !input.is_empty() {
            let name: Ident = input.parse()?;
            if name == "lazy" {
                args.lazy = true;
            } else if name == "token" {
                input.parse::<Token![=]>()?;
                args.token = Some(input.parse()?);
            } else {
                return Err(syn::Error::new(
                    name.span(),
                    format!("unknown inject option `{}`", name),
                ));
            }
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(args)
    }
}

/// `#[param(token = "name")]`
struct ParamArgs {
    token: LitStr,
}

impl Parse for ParamArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name: Ident = input.parse()?;
        if name != "token" {
            return Err(syn::Error::new(name.span(), "expected `token = \"...\"`"));
        }
        input.parse::<Token![=]>()?;
        let token = input.parse()?;
        if input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
        }
        Ok(ParamArgs { token })
    }
}

enum FieldKind {
    /// `Arc<T>`: constructor parameter
    Required(Type),
    /// `Option<Arc<T>>`: constructor parameter that may be absent
    Optional(Type),
    /// `#[inject] Autowired<T>`
    Inject(Type, InjectArgs),
    /// `#[value("expr")] ConfigValue<T>`
    Value(LitStr),
    Default,
}

pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    generate_component_impl(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn generate_component_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "#[derive(Component)] does not support generic structs",
        ));
    }

    let args = component_args(&input.attrs)?;

    let fields: Vec<&Field> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new(
                    input.span(),
                    "#[derive(Component)] only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "#[derive(Component)] can only be applied to structs",
            ))
        }
    };

    let mut params = Vec::new();
    let mut param_overrides = Vec::new();
    let mut sites = Vec::new();
    let mut initializers = Vec::new();

    for field in &fields {
        let Some(ident) = &field.ident else {
            continue;
        };
        let name = ident.to_string();
        let index = params.len();

        match field_kind(field)? {
            FieldKind::Required(inner) => {
                params.push(quote! { ::beanweave::Param::of::<#inner>() });
                initializers.push(quote! { #ident: args.component::<#inner>(#index)? });
            }
            FieldKind::Optional(inner) => {
                params.push(quote! { ::beanweave::Param::of::<#inner>() });
                initializers.push(quote! { #ident: args.optional::<#inner>(#index) });
            }
            FieldKind::Inject(inner, inject) => {
                let token = match &inject.token {
                    Some(name) => quote! { ::beanweave::Token::named(#name) },
                    None => quote! { ::beanweave::Token::of::<#inner>() },
                };
                let mode = if inject.lazy {
                    quote! { ::beanweave::InjectMode::Lazy }
                } else {
                    quote! { ::beanweave::InjectMode::Auto }
                };
                sites.push(quote! {
                    decl.inject_site::<#inner>(#name, #token, #mode, |this: &Self| &this.#ident);
                });
                initializers.push(quote! { #ident: ::core::default::Default::default() });
            }
            FieldKind::Value(expression) => {
                sites.push(quote! {
                    decl.value(#name, #expression, |this: &Self| &this.#ident);
                });
                initializers.push(quote! { #ident: ::core::default::Default::default() });
            }
            FieldKind::Default => {
                initializers.push(quote! { #ident: ::core::default::Default::default() });
            }
        }

        if let Some(attr) = find_attr(&field.attrs, "param") {
            if params.len() == index {
                return Err(syn::Error::new(
                    attr.span(),
                    "#[param] needs an `Arc<T>` or `Option<Arc<T>>` field",
                ));
            }
            let ParamArgs { token } = attr.parse_args()?;
            param_overrides.push(quote! {
                decl.param(#index, ::beanweave::Token::named(#token));
            });
        }
    }

    let options = component_options(&args);
    let constructor = if params.is_empty() {
        quote! {}
    } else {
        quote! { decl.constructor([#(#params),*]); }
    };
    let on_ready = args.on_ready.then(|| quote! { decl.on_ready(); });
    let on_destroy = args.on_destroy.then(|| quote! { decl.on_destroy(); });
    let depends = args.depends.iter().map(|path| {
        quote_spanned! { path.span() => decl.depends_on::<#path>(); }
    });
    let extend = args.extend.as_ref().map(|path| quote! { #path(decl); });
    let body = if matches!(&input.data, Data::Struct(data) if matches!(data.fields, Fields::Unit))
    {
        quote! { Self }
    } else {
        quote! { Self { #(#initializers),* } }
    };

    Ok(quote! {
        impl ::beanweave::Component for #struct_name {
            fn declare(decl: &mut ::beanweave::Declaration<Self>) {
                decl.component(#options);
                #constructor
                #(#param_overrides)*
                #(#sites)*
                #on_ready
                #on_destroy
                #(#depends)*
                #extend
            }

            #[allow(unused_variables)]
            fn construct(args: &::beanweave::Args) -> ::beanweave::Result<Self> {
                Ok(#body)
            }
        }
    })
}

fn component_args(attrs: &[Attribute]) -> syn::Result<ComponentArgs> {
    match find_attr(attrs, "component") {
        Some(attr) => match &attr.meta {
            syn::Meta::Path(_) => Ok(ComponentArgs::default()),
            _ => attr.parse_args(),
        },
        None => Ok(ComponentArgs::default()),
    }
}

fn component_options(args: &ComponentArgs) -> TokenStream2 {
    let mut options = quote! { ::beanweave::ComponentOptions::new() };
    if let Some(scope) = &args.scope {
        options = quote! { #options.scope(::beanweave::Scope::#scope) };
    }
    if let Some(token) = &args.token {
        options = quote! { #options.token(::beanweave::Token::named(#token)) };
    }
    if let Some(rebind) = &args.rebind {
        options = quote! { #options.rebind(#rebind) };
    }
    options
}

fn find_attr<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attrs.iter().find(|attr| attr.path().is_ident(name))
}

fn field_kind(field: &Field) -> syn::Result<FieldKind> {
    if let Some(attr) = find_attr(&field.attrs, "inject") {
        let inner = generic_argument(&field.ty, "Autowired").ok_or_else(|| {
            syn::Error::new(field.ty.span(), "#[inject] fields must be `Autowired<T>`")
        })?;
        let args = match &attr.meta {
            syn::Meta::Path(_) => InjectArgs::default(),
            _ => attr.parse_args()?,
        };
        return Ok(FieldKind::Inject(inner, args));
    }

    if let Some(attr) = find_attr(&field.attrs, "value") {
        if generic_argument(&field.ty, "ConfigValue").is_none() {
            return Err(syn::Error::new(
                field.ty.span(),
                "#[value] fields must be `ConfigValue<T>`",
            ));
        }
        let expressions =
            attr.parse_args_with(Punctuated::<LitStr, Token![,]>::parse_terminated)?;
        let expression = expressions.into_iter().next().ok_or_else(|| {
            syn::Error::new(attr.span(), "#[value] needs an expression, e.g. #[value(\"app.port\")]")
        })?;
        return Ok(FieldKind::Value(expression));
    }

    if let Some(inner) = generic_argument(&field.ty, "Arc") {
        return sized(inner).map(FieldKind::Required);
    }
    if let Some(inner) =
        generic_argument(&field.ty, "Option").and_then(|ty| generic_argument(&ty, "Arc"))
    {
        return sized(inner).map(FieldKind::Optional);
    }

    Ok(FieldKind::Default)
}

/// Constructor parameters are resolved by concrete type. Trait objects are
/// bound with `Container::register_instance` as `Arc<dyn Trait>` values and
/// read back through an `Arc<Arc<dyn Trait>>` field.
fn sized(inner: Type) -> syn::Result<Type> {
    let unsized_type = match &inner {
        Type::TraitObject(_) | Type::Slice(_) => true,
        Type::Path(path) => path.qself.is_none() && path.path.is_ident("str"),
        _ => false,
    };
    if unsized_type {
        return Err(syn::Error::new(
            inner.span(),
            "#[derive(Component)] needs a sized dependency type; \
             wrap trait objects as `Arc<Arc<dyn Trait>>`",
        ));
    }
    Ok(inner)
}

/// Extract `T` from `Wrapper<T>` (matching on the last path segment)
fn generic_argument(ty: &Type, wrapper: &str) -> Option<Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner.clone()),
        _ => None,
    }
}
