use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Lookup key for a component registration.
///
/// A type is its own token by default ([`Token::of`]). Named tokens let several
/// registrations share a type, and symbols are unique even when their
/// descriptions collide.
#[derive(Clone, Debug)]
pub enum Token {
    Type { id: TypeId, name: &'static str },
    Name(Cow<'static, str>),
    Symbol { id: Uuid, description: Cow<'static, str> },
}

impl Token {
    /// The token of a type used as its own key.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Token::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Token::Name(name.into())
    }

    /// A fresh symbol. Never equal to any other symbol.
    pub fn symbol(description: impl Into<Cow<'static, str>>) -> Self {
        Token::Symbol {
            id: Uuid::new_v4(),
            description: description.into(),
        }
    }

    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Token::Type { id, .. } => Some(*id),
            _ => None,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Token::Type { id: a, .. }, Token::Type { id: b, .. }) => a == b,
            (Token::Name(a), Token::Name(b)) => a == b,
            (Token::Symbol { id: a, .. }, Token::Symbol { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Token::Type { id, .. } => id.hash(state),
            Token::Name(name) => name.hash(state),
            Token::Symbol { id, .. } => id.hash(state),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type { name, .. } => f.write_str(short_type_name(name)),
            Token::Name(name) => write!(f, "\"{}\"", name),
            Token::Symbol { description, .. } => write!(f, "Symbol({})", description),
        }
    }
}

impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Token::named(name)
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::named(name)
    }
}

/// `my_crate::services::UserService` -> `UserService`, keeping generic arguments intact.
pub(crate) fn short_type_name(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    match base.rfind("::") {
        Some(pos) => &name[pos + 2..],
        None => name,
    }
}
