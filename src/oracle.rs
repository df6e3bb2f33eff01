//! Boundary with the type oracle: whatever knows the declared types.
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::validator::{self, Literal, Validator};

/// Stable, comparable key of one named declaration for a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueId(Arc<str>);

impl UniqueId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Declaration name part of a `<module>:<name>` id (the whole id otherwise).
    pub fn declaration_name(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UniqueId {
    fn from(s: &str) -> Self {
        UniqueId(Arc::from(s))
    }
}

impl From<String> for UniqueId {
    fn from(s: String) -> Self {
        UniqueId(Arc::from(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Undefined,
    Null,
    String,
    Number,
    Boolean,
}

impl PrimitiveKind {
    /// The shared singleton validator for this kind.
    pub fn validator(self) -> Validator {
        match self {
            PrimitiveKind::Undefined => validator::UNDEFINED,
            PrimitiveKind::Null => validator::NULL,
            PrimitiveKind::String => validator::STRING,
            PrimitiveKind::Number => validator::NUMBER,
            PrimitiveKind::Boolean => validator::BOOLEAN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Property<T> {
    pub name: String,
    pub ty: T,
    pub optional: bool,
}

/// What the oracle reports about one type reference.
#[derive(Debug, Clone)]
pub enum Shape<T> {
    Primitive(PrimitiveKind),
    Object(Vec<Property<T>>),
    Union(Vec<T>),
    /// Boolean, number or string literal type.
    Literal(Literal),
    /// Reference to a named declaration.
    Alias { unique_id: UniqueId, underlying: T },
    Unsupported(String),
}

pub trait TypeOracle {
    type Type: Clone;

    /// Top-level type reference for a declaration name.
    fn lookup(&self, name: &str) -> Result<Self::Type>;

    fn classify(&self, ty: &Self::Type) -> Result<Shape<Self::Type>>;

    /// Human-readable rendering for error messages.
    fn display(&self, ty: &Self::Type) -> String;

    fn properties(&self, ty: &Self::Type) -> Result<Vec<Property<Self::Type>>> {
        match self.classify(ty)? {
            Shape::Object(properties) => Ok(properties),
            _ => Err(Error::unresolvable(self.display(ty), "not an object type")),
        }
    }

    fn unique_id_of_alias(&self, ty: &Self::Type) -> Result<UniqueId> {
        match self.classify(ty)? {
            Shape::Alias { unique_id, .. } => Ok(unique_id),
            _ => Err(Error::unresolvable(self.display(ty), "not a named declaration")),
        }
    }
}
