//! Runtime validators from type declarations.
//!
//! Pipeline: a [`TypeOracle`] describes types → [`GraphBuilder`] builds a
//! validator graph (named types become [`Stub`]s, which is how cycles are
//! represented) → [`optimize()`] canonicalizes it → [`serialize()`] emits program
//! text that rebuilds it. [`ValidationGenerator`] runs the whole thing for one
//! batch of top-level types.
pub mod builder;
pub mod cli;
pub mod decl;
pub mod documents;
pub mod error;
pub mod generator;
pub mod optimize;
pub mod oracle;
pub mod serialize;
pub mod stub;
pub mod validator;

pub use builder::GraphBuilder;
pub use decl::{DeclarationSet, Discovery};
pub use error::{Error, Result};
pub use generator::ValidationGenerator;
pub use optimize::optimize;
pub use oracle::{PrimitiveKind, Property, Shape, TypeOracle, UniqueId};
pub use serialize::{SerializeOptions, TopLevel, serialize};
pub use stub::{Stub, StubRegistry};
pub use validator::{ExactValue, Literal, Segment, TypeTag, ValidationFailure, Validator};
