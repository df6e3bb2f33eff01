//! Error taxonomy shared by construction, serialization and validation.
use thiserror::Error;

use crate::oracle::UniqueId;
use crate::validator::ValidationFailure;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The oracle reported a shape we cannot build, or an alias whose
    /// declaration is missing or ambiguous.
    #[error("unresolvable type `{ty}`: {reason}")]
    UnresolvableType { ty: String, reason: String },

    /// Internal invariant break in the stub/bind protocol.
    #[error("stub protocol violation for `{key}`: {reason}")]
    StubProtocolViolation { key: UniqueId, reason: String },

    #[error("variable name `{name}` generated for both `{first}` and `{second}`")]
    DuplicateVariableName { name: String, first: UniqueId, second: UniqueId },

    #[error("stub references `{id}`, which has no top-level variable")]
    MissingReferenceAtSerialize { id: UniqueId },

    #[error("type `{name}` was never registered")]
    NotFound { name: String },

    /// Runtime failure raised by `Validator::validate`. Boxed so the
    /// recursive validation frames carry a small `Result`.
    #[error("validation failed: {0}")]
    Validation(Box<ValidationFailure>),

    #[error("malformed declarations in {source_name} at {path}: {message}")]
    Declarations { source_name: String, path: String, message: String },
}

impl Error {
    pub fn unresolvable(ty: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnresolvableType { ty: ty.into(), reason: reason.into() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<ValidationFailure> for Error {
    fn from(failure: ValidationFailure) -> Self {
        Error::Validation(Box::new(failure))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
