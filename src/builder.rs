//! Oracle types → validator graph.
use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Error, Result};
use crate::oracle::{Shape, TypeOracle, UniqueId};
use crate::stub::StubRegistry;
use crate::validator::{self, Validator};

/// Memo cell of one named type: the type to build, or the built validator.
#[derive(Debug, Clone)]
pub enum Supplier<T> {
    Pending(T),
    Ready(Validator),
}

pub type Suppliers<T> = HashMap<UniqueId, Supplier<T>>;

/// One translation pass. Named types below the root become stubs and are
/// recorded in `suppliers` so the generator can resolve them afterwards.
pub struct GraphBuilder<'g, O: TypeOracle> {
    oracle: &'g O,
    stubs: &'g mut StubRegistry,
    suppliers: &'g mut Suppliers<O::Type>,
}

impl<'g, O: TypeOracle> GraphBuilder<'g, O> {
    pub fn new(
        oracle: &'g O,
        stubs: &'g mut StubRegistry,
        suppliers: &'g mut Suppliers<O::Type>,
    ) -> Self {
        Self { oracle, stubs, suppliers }
    }

    /// Build the validator for `ty`. Only the root expands a named type;
    /// everywhere else a named type is a stub, which is what breaks cycles.
    pub fn build(&mut self, ty: &O::Type, is_root: bool) -> Result<Validator> {
        match self.oracle.classify(ty)? {
            Shape::Alias { unique_id, underlying } => {
                if is_root {
                    return self.build(&underlying, false);
                }
                trace!(id = %unique_id, "reference to named type");
                self.suppliers
                    .entry(unique_id.clone())
                    .or_insert_with(|| Supplier::Pending(ty.clone()));
                Ok(Validator::Stub(self.stubs.create(&unique_id)))
            }
            Shape::Primitive(kind) => Ok(kind.validator()),
            Shape::Literal(literal) => Ok(Validator::exact([literal])),
            Shape::Object(properties) => {
                let mut fields = IndexMap::with_capacity(properties.len());
                for property in properties {
                    let mut field = self.build(&property.ty, false)?;
                    if property.optional {
                        // plain union; only the optimizer introduces `Optional`
                        field = Validator::or([validator::UNDEFINED, field]);
                    }
                    fields.insert(property.name, field);
                }
                Ok(Validator::object(fields))
            }
            Shape::Union(members) => {
                let members = members
                    .iter()
                    .map(|member| self.build(member, false))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Validator::or(members))
            }
            Shape::Unsupported(what) => Err(Error::unresolvable(self.oracle.display(ty), what)),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{PrimitiveKind, Property};
    use crate::validator::{Literal, NUMBER};

    /// Tiny in-memory oracle: types are indices into a table of shapes.
    struct Table(Vec<Shape<usize>>);

    impl TypeOracle for Table {
        type Type = usize;
        fn lookup(&self, name: &str) -> Result<usize> {
            name.parse().map_err(|_| Error::NotFound { name: name.to_string() })
        }
        fn classify(&self, ty: &usize) -> Result<Shape<usize>> {
            Ok(self.0[*ty].clone())
        }
        fn display(&self, ty: &usize) -> String {
            format!("#{ty}")
        }
    }

    fn build(table: &Table, root: usize) -> (Result<Validator>, StubRegistry, Suppliers<usize>) {
        let mut stubs = StubRegistry::new();
        let mut suppliers = Suppliers::new();
        let built = GraphBuilder::new(table, &mut stubs, &mut suppliers).build(&root, true);
        (built, stubs, suppliers)
    }

    #[test]
    fn primitives_are_shared_singletons() {
        let table = Table(vec![Shape::Primitive(PrimitiveKind::Number)]);
        let (built, _, _) = build(&table, 0);
        assert!(built.unwrap().same(&NUMBER));
    }

    #[test]
    fn nested_aliases_become_stubs_and_are_recorded() {
        let id = UniqueId::from("m:Node");
        let table = Table(vec![
            Shape::Alias { unique_id: id.clone(), underlying: 1 },
            Shape::Object(vec![
                Property { name: "value".into(), ty: 2, optional: false },
                Property { name: "next".into(), ty: 0, optional: true },
            ]),
            Shape::Primitive(PrimitiveKind::Number),
        ]);
        let (built, stubs, suppliers) = build(&table, 0);
        let Validator::Object(fields) = built.unwrap() else {
            panic!("root alias must expand to its object");
        };
        let Validator::Or(next) = &fields["next"] else {
            panic!("optional property becomes a plain union");
        };
        assert!(next[0].same(&validator::UNDEFINED));
        let Validator::Stub(stub) = &next[1] else {
            panic!("self reference must be a stub");
        };
        assert!(stub.ptr_eq(stubs.get(&id).unwrap()));
        assert!(!stub.is_bound());
        assert!(matches!(suppliers.get(&id), Some(Supplier::Pending(0))));
    }

    #[test]
    fn unions_keep_declaration_order_and_literals_become_value_sets() {
        let table = Table(vec![
            Shape::Union(vec![1, 2]),
            Shape::Literal(Literal::Bool(true)),
            Shape::Primitive(PrimitiveKind::String),
        ]);
        let (built, _, _) = build(&table, 0);
        let Validator::Or(members) = built.unwrap() else {
            panic!("expected union");
        };
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].describe(), "true");
        assert_eq!(members[1].describe(), "string");
    }

    #[test]
    fn unsupported_shapes_abort_with_the_type_name() {
        let table = Table(vec![Shape::Union(vec![1]), Shape::Unsupported("array type".into())]);
        let (built, _, _) = build(&table, 0);
        let err = built.unwrap_err();
        assert_eq!(err.to_string(), "unresolvable type `#1`: array type");
    }
}
