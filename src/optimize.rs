//! Canonicalizing rewrite of validator trees.
//!
//! Unions built from optional/nullable declarations are highly redundant
//! (`undefined | T | undefined | (A | undefined | B)`). `optimize` flattens
//! them, merges value sets, folds `true | false` into `boolean` and pulls
//! `undefined` out into a single `Optional` wrapper. It is idempotent and never
//! changes which inputs are accepted. Stubs are returned as is, so aliasing
//! survives for the serializer.
use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use crate::validator::{self, ExactValue, Identity, Literal, Validator};

pub fn optimize(validator: &Validator) -> Validator {
    match validator {
        Validator::Stub(_) | Validator::TypeOf(_) | Validator::ExactValue(_) => validator.clone(),
        Validator::Object(properties) => {
            Validator::object(properties.iter().map(|(name, v)| (name.clone(), optimize(v))))
        }
        Validator::Or(members) => optimize_union(members),
        Validator::Optional(inner) => optimize_union(&[validator::UNDEFINED, (**inner).clone()]),
    }
}

#[derive(Default)]
struct Buckets {
    is_optional: bool,
    exact_values: BTreeSet<Literal>,
    others: IndexMap<Identity, Validator>,
}

fn optimize_union(members: &[Validator]) -> Validator {
    let mut buckets = Buckets::default();

    // one rewrite per distinct node, so repeated members still dedup by identity
    let mut rewritten: HashMap<Identity, Validator> = HashMap::with_capacity(members.len());
    // work stack in reverse so members pop in declaration order
    let mut work: Vec<Validator> = members
        .iter()
        .rev()
        .map(|m| rewritten.entry(m.identity()).or_insert_with(|| optimize(m)).clone())
        .collect();
    while let Some(member) = work.pop() {
        match member {
            Validator::Or(nested) => work.extend(nested.iter().rev().cloned()),
            Validator::Optional(inner) => {
                buckets.is_optional = true;
                work.push((*inner).clone());
            }
            Validator::ExactValue(ExactValue::Undefined) => buckets.is_optional = true,
            Validator::ExactValue(ExactValue::Set(values)) => {
                for literal in values.iter() {
                    match literal {
                        Literal::Undefined => buckets.is_optional = true,
                        other => {
                            buckets.exact_values.insert(other.clone());
                        }
                    }
                }
            }
            other => {
                buckets.others.entry(other.identity()).or_insert(other);
            }
        }
    }

    let Buckets { is_optional, mut exact_values, mut others } = buckets;

    if exact_values.contains(&Literal::Bool(true)) && exact_values.contains(&Literal::Bool(false)) {
        exact_values.remove(&Literal::Bool(true));
        exact_values.remove(&Literal::Bool(false));
        others.entry(validator::BOOLEAN.identity()).or_insert(validator::BOOLEAN);
    }
    if !exact_values.is_empty() {
        let merged = Validator::exact(exact_values);
        others.insert(merged.identity(), merged);
    }

    if others.is_empty() && is_optional {
        return validator::UNDEFINED;
    }
    let core = if others.len() == 1 {
        others.into_values().next().unwrap_or(validator::UNDEFINED)
    } else {
        Validator::or(others.into_values())
    };
    if is_optional { Validator::optional(core) } else { core }
}

// ------------------------------- Tests ------------------------------------ //
