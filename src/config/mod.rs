//! Configuration documents and the expressions evaluated against them.
//!
//! A [`Config`] wraps one structured document (usually loaded by
//! [`ConfigLoader`]). Value bindings address it with small expressions:
//!
//! ```text
//! app.port                 dotted path
//! servers[0].host          array index
//! app.port ?? 3000         default when the path is absent
//! ${app.name:beanweave}    placeholder form, default after the first ':'
//! ```
//!
//! Defaults are parsed as JSON when possible and taken as strings otherwise.

mod loader;

pub use loader::{ConfigLoader, FileFormat};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration file found in {dir}: tried {tried}")]
    NotFound { dir: PathBuf, tried: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid expression `{expression}`: {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Cannot bind `{expression}` to {class}.{property}: {message}")]
    Bind {
        class: String,
        property: String,
        expression: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// A loaded configuration document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    root: Value,
}

impl Config {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn empty() -> Self {
        Self::new(Value::Object(Default::default()))
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        match &self.root {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Look up a path such as `db.replicas[1].host`.
    pub fn get(&self, path: &str) -> Result<Option<&Value>> {
        let segments = parse_path(path)?;
        let mut current = &self.root;
        for segment in &segments {
            let next = match segment {
                Segment::Key(key) => current.get(key.as_str()),
                Segment::Index(index) => current.get(*index),
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path)? {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ConfigError::InvalidExpression {
                    expression: path.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Evaluate a binding expression. `Ok(None)` means the path is absent and
    /// no default was given.
    pub fn evaluate(&self, expression: &str) -> Result<Option<Value>> {
        let Expression { path, default } = Expression::parse(expression)?;
        match self.get(path)? {
            Some(Value::Null) | None => Ok(default),
            Some(value) => Ok(Some(value.clone())),
        }
    }
}

impl From<Value> for Config {
    fn from(root: Value) -> Self {
        Self::new(root)
    }
}

struct Expression<'a> {
    path: &'a str,
    default: Option<Value>,
}

impl<'a> Expression<'a> {
    fn parse(expression: &'a str) -> Result<Self> {
        let trimmed = expression.trim();
        let (path, default) = match trimmed
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            Some(inner) => match inner.split_once(':') {
                Some((path, default)) => (path, Some(default)),
                None => (inner, None),
            },
            None => match trimmed.split_once("??") {
                Some((path, default)) => (path, Some(default)),
                None => (trimmed, None),
            },
        };

        Ok(Self {
            path: path.trim(),
            default: default.map(parse_literal),
        })
    }
}

fn parse_literal(raw: &str) -> Value {
    let raw = raw.trim();
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[derive(Debug, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let invalid = |reason: &str| ConfigError::InvalidExpression {
        expression: path.to_string(),
        reason: reason.to_string(),
    };
    if path.trim().is_empty() {
        return Err(invalid("empty path"));
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if key.is_empty() && rest.is_empty() {
            return Err(invalid("empty segment"));
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(|| invalid("unclosed `[`"))?;
            let index = rest[1..close]
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid("array index must be a number"))?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(invalid("unexpected characters after `]`"));
            }
        }
    }
    Ok(segments)
}
