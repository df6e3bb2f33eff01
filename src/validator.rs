//! Runtime validator model.
//!
//! A `Validator` is a closed sum type. Composite variants hold their children
//! behind `Arc`, so cloning a validator is cheap and preserves identity: the
//! optimizer and serializer rely on "same node" checks (see [`Identity`]).
//!
//! Inputs are `Option<&Value>`: `None` stands for `undefined` (an absent
//! property), `Some(Value::Null)` for `null`.
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::stub::Stub;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Runtime kind checked by `Validator::TypeOf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    String,
    Number,
    Boolean,
}

/// A value that `ExactValue` compares against by strict equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(OrderedFloat<f64>),
    String(String),
}

#[derive(Debug, Clone)]
pub enum ExactValue {
    /// Shared `undefined` singleton.
    Undefined,
    /// Shared `null` singleton.
    Null,
    /// A built value set. Duplicates collapse; an empty set accepts nothing.
    Set(Arc<BTreeSet<Literal>>),
}

#[derive(Debug, Clone)]
pub enum Validator {
    TypeOf(TypeTag),
    ExactValue(ExactValue),
    /// Declared properties in declaration order. Unlisted properties are ignored.
    Object(Arc<IndexMap<String, Validator>>),
    /// First member that accepts wins. Zero members accept nothing.
    Or(Arc<[Validator]>),
    /// Introduced by the optimizer: `undefined` or the inner validator.
    Optional(Arc<Validator>),
    /// Forward reference to a named type, bound once during construction.
    Stub(Stub),
}

pub const STRING: Validator = Validator::TypeOf(TypeTag::String);
pub const NUMBER: Validator = Validator::TypeOf(TypeTag::Number);
pub const BOOLEAN: Validator = Validator::TypeOf(TypeTag::Boolean);
pub const UNDEFINED: Validator = Validator::ExactValue(ExactValue::Undefined);
pub const NULL: Validator = Validator::ExactValue(ExactValue::Null);

/// Node identity. Singletons compare by variant, everything else by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    TypeOf(TypeTag),
    Undefined,
    Null,
    Node(usize),
}

/// One step of a failure location: `.name` for a property, `|n` for a union branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Property(String),
    Branch(usize),
}

/// Runtime validation failure.
///
/// `path` is relative to the validator that produced the failure; `cause`
/// carries the failure of the branch that got furthest when an `Or` rejects.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub message: String,
    pub path: Vec<Segment>,
    pub cause: Option<Box<ValidationFailure>>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeTag {
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
        }
    }

    fn matches(self, input: Option<&Value>) -> bool {
        matches!(
            (self, input),
            (TypeTag::String, Some(Value::String(_)))
                | (TypeTag::Number, Some(Value::Number(_)))
                | (TypeTag::Boolean, Some(Value::Bool(_)))
        )
    }
}

impl Literal {
    /// Literal view of an input; arrays and objects have none.
    pub fn of(input: Option<&Value>) -> Option<Literal> {
        match input {
            None => Some(Literal::Undefined),
            Some(Value::Null) => Some(Literal::Null),
            Some(Value::Bool(b)) => Some(Literal::Bool(*b)),
            Some(Value::Number(n)) => n.as_f64().map(|f| Literal::Number(OrderedFloat(f))),
            Some(Value::String(s)) => Some(Literal::String(s.clone())),
            Some(Value::Array(_)) | Some(Value::Object(_)) => None,
        }
    }

    pub fn number(n: f64) -> Literal {
        Literal::Number(OrderedFloat(n))
    }

    pub fn string(s: impl Into<String>) -> Literal {
        Literal::String(s.into())
    }
}

/// Renders as source text (`undefined`, `null`, `true`, `1.5`, `"x"`).
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Undefined => f.write_str("undefined"),
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Number(n) => write!(f, "{}", n.0),
            Literal::String(s) => write!(f, "{}", Value::String(s.clone())),
        }
    }
}

impl ExactValue {
    pub fn contains(&self, literal: &Literal) -> bool {
        match self {
            ExactValue::Undefined => *literal == Literal::Undefined,
            ExactValue::Null => *literal == Literal::Null,
            ExactValue::Set(values) => values.contains(literal),
        }
    }

    pub fn literals(&self) -> Vec<Literal> {
        match self {
            ExactValue::Undefined => vec![Literal::Undefined],
            ExactValue::Null => vec![Literal::Null],
            ExactValue::Set(values) => values.iter().cloned().collect(),
        }
    }
}

impl Validator {
    pub fn exact(values: impl IntoIterator<Item = Literal>) -> Validator {
        Validator::ExactValue(ExactValue::Set(Arc::new(values.into_iter().collect())))
    }

    pub fn object<K: Into<String>>(properties: impl IntoIterator<Item = (K, Validator)>) -> Validator {
        let properties = properties.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Validator::Object(Arc::new(properties))
    }

    pub fn or(members: impl IntoIterator<Item = Validator>) -> Validator {
        Validator::Or(members.into_iter().collect())
    }

    pub fn optional(inner: Validator) -> Validator {
        Validator::Optional(Arc::new(inner))
    }

    pub fn identity(&self) -> Identity {
        match self {
            Validator::TypeOf(tag) => Identity::TypeOf(*tag),
            Validator::ExactValue(ExactValue::Undefined) => Identity::Undefined,
            Validator::ExactValue(ExactValue::Null) => Identity::Null,
            Validator::ExactValue(ExactValue::Set(values)) => Identity::Node(Arc::as_ptr(values) as usize),
            Validator::Object(properties) => Identity::Node(Arc::as_ptr(properties) as usize),
            Validator::Or(members) => Identity::Node(Arc::as_ptr(members).cast::<()>() as usize),
            Validator::Optional(inner) => Identity::Node(Arc::as_ptr(inner) as usize),
            Validator::Stub(stub) => Identity::Node(stub.address()),
        }
    }

    /// Same node (not structural equality).
    pub fn same(&self, other: &Validator) -> bool {
        self.identity() == other.identity()
    }

    /// Shared constants (`string`, `number`, `boolean`, `undefined`, `null`).
    pub fn is_singleton(&self) -> bool {
        !matches!(self.identity(), Identity::Node(_))
    }

    /// Validate `input`, where `None` means `undefined`.
    ///
    /// Returns `Error::Validation` for ordinary rejections. Any other error
    /// (an unbound stub) is a construction bug and is never swallowed by `Or`.
    ///
    /// Each level of nesting costs one dispatch frame plus the frame of the
    /// composite it enters; keep the per-variant work in the helpers below.
    pub fn validate(&self, input: Option<&Value>) -> Result<()> {
        match self {
            Validator::TypeOf(tag) if tag.matches(input) => Ok(()),
            Validator::TypeOf(tag) => Err(mismatch(tag.name(), input)),
            Validator::ExactValue(exact) => validate_exact(exact, input),
            Validator::Object(properties) => validate_object(properties, input),
            Validator::Or(members) => validate_or(members, input),
            Validator::Optional(_) if input.is_none() => Ok(()),
            Validator::Optional(inner) => inner.validate(input),
            Validator::Stub(stub) => stub.delegate()?.validate(input),
        }
    }

    /// Validate a present value.
    pub fn check(&self, value: &Value) -> Result<()> {
        self.validate(Some(value))
    }

    /// `true` iff `validate` succeeds.
    pub fn accepts(&self, input: Option<&Value>) -> bool {
        self.validate(input).is_ok()
    }

    /// Short description of the expected shape, used in failure messages.
    /// Stubs are described by their key, never expanded.
    pub fn describe(&self) -> String {
        match self {
            Validator::TypeOf(tag) => tag.name().to_string(),
            Validator::ExactValue(exact) => {
                let literals = exact.literals();
                match literals.as_slice() {
                    [single] => single.to_string(),
                    many => {
                        let rendered = many.iter().map(ToString::to_string).collect::<Vec<_>>();
                        format!("one of [{}]", rendered.join(", "))
                    }
                }
            }
            Validator::Object(_) => "object".to_string(),
            Validator::Or(members) if members.is_empty() => "never".to_string(),
            Validator::Or(members) => members
                .iter()
                .map(Validator::describe)
                .collect::<Vec<_>>()
                .join(" | "),
            Validator::Optional(inner) => format!("{} | undefined", inner.describe()),
            Validator::Stub(stub) => stub.key().to_string(),
        }
    }
}

impl ValidationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), path: Vec::new(), cause: None }
    }

    /// Segments from the root to the leaf, counting each hop into a cause.
    fn depth(&self) -> usize {
        let mut depth = self.path.len();
        let mut current = self.cause.as_deref();
        while let Some(failure) = current {
            depth += 1 + failure.path.len();
            current = failure.cause.as_deref();
        }
        depth
    }

    /// The innermost failure along the cause chain.
    pub fn leaf(&self) -> &ValidationFailure {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }

    /// Full path from the root to the leaf, e.g. `$.children|1.value`.
    pub fn location(&self) -> String {
        let mut out = String::from("$");
        let mut current = Some(self);
        while let Some(failure) = current {
            for segment in &failure.path {
                out.push_str(&segment.to_string());
            }
            current = failure.cause.as_deref();
        }
        out
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Property(name) => write!(f, ".{name}"),
            Segment::Branch(index) => write!(f, "|{index}"),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}: {}", self.location(), self.leaf().message)?;
        if self.cause.is_some() {
            write!(f, " ({})", self.message)?;
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn validate_exact(exact: &ExactValue, input: Option<&Value>) -> Result<()> {
    match Literal::of(input) {
        Some(literal) if exact.contains(&literal) => Ok(()),
        _ => Err(mismatch(&Validator::ExactValue(exact.clone()).describe(), input)),
    }
}

fn validate_object(properties: &IndexMap<String, Validator>, input: Option<&Value>) -> Result<()> {
    let Some(Value::Object(map)) = input else {
        return Err(mismatch("object", input));
    };
    for (name, validator) in properties {
        if let Err(error) = validator.validate(map.get(name)) {
            return Err(within(error, Segment::Property(name.clone())));
        }
    }
    Ok(())
}

/// First member that accepts wins; otherwise report the branch that got furthest.
fn validate_or(members: &[Validator], input: Option<&Value>) -> Result<()> {
    if members.is_empty() {
        return Err(ValidationFailure::new("empty union accepts nothing").into());
    }
    let mut furthest: Option<Box<ValidationFailure>> = None;
    for (index, member) in members.iter().enumerate() {
        match member.validate(input) {
            Ok(()) => return Ok(()),
            Err(Error::Validation(mut failure)) => {
                failure.path.insert(0, Segment::Branch(index));
                if furthest.as_ref().is_none_or(|best| failure.depth() > best.depth()) {
                    furthest = Some(failure);
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(no_alternative(members.len(), furthest))
}

#[cold]
fn no_alternative(count: usize, furthest: Option<Box<ValidationFailure>>) -> Error {
    let mut failure = ValidationFailure::new(format!("no alternative of {count} matched"));
    failure.cause = furthest;
    failure.into()
}

fn within(error: Error, segment: Segment) -> Error {
    match error {
        Error::Validation(mut failure) => {
            failure.path.insert(0, segment);
            Error::Validation(failure)
        }
        other => other,
    }
}

#[cold]
fn mismatch(expected: &str, input: Option<&Value>) -> Error {
    ValidationFailure::new(format!("expected {expected}, got {}", kind_of(input))).into()
}

fn kind_of(input: Option<&Value>) -> &'static str {
    match input {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

// ------------------------------- Tests ------------------------------------ //
