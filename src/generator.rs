//! Per-run orchestration: registration, lazy per-alias construction, stub
//! resolution and serialization of the requested top-level types.
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::builder::{GraphBuilder, Supplier, Suppliers};
use crate::error::{Error, Result};
use crate::oracle::{TypeOracle, UniqueId};
use crate::serialize::{self, SerializeOptions, TopLevel};
use crate::stub::StubRegistry;
use crate::validator::Validator;

/// Owns every piece of run-scoped state. Not meant to be shared between runs.
///
/// Validators of recursive types reach themselves through stubs that hold
/// their delegate by `Arc`, so such a graph is never freed, even after the
/// generator and every returned validator are dropped. A process that builds
/// many generators over recursive types grows by one graph per generator.
pub struct ValidationGenerator<O: TypeOracle> {
    oracle: O,
    stubs: StubRegistry,
    suppliers: Suppliers<O::Type>,
    targets: IndexMap<String, UniqueId>,
}

impl<O: TypeOracle> ValidationGenerator<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            stubs: StubRegistry::new(),
            suppliers: Suppliers::new(),
            targets: IndexMap::new(),
        }
    }

    /// Register `name` as a top-level target without building it yet.
    pub fn register(&mut self, name: &str) -> Result<UniqueId> {
        if let Some(id) = self.targets.get(name) {
            return Ok(id.clone());
        }
        let ty = self.oracle.lookup(name)?;
        let id = self.oracle.unique_id_of_alias(&ty)?;
        debug!(name, %id, "registered top-level type");
        self.suppliers.entry(id.clone()).or_insert(Supplier::Pending(ty));
        self.targets.insert(name.to_string(), id.clone());
        Ok(id)
    }

    /// Register every name first (so cross references see them as top-level),
    /// then build each one.
    pub fn generate<I, S>(&mut self, names: I) -> Result<IndexMap<String, Validator>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        for name in &names {
            self.register(name.as_ref())?;
        }
        let mut out = IndexMap::with_capacity(names.len());
        for name in &names {
            let name = name.as_ref();
            out.insert(name.to_string(), self.get_validator(name)?);
        }
        Ok(out)
    }

    /// The memoized validator of a registered name, built on first access.
    pub fn get_validator(&mut self, name: &str) -> Result<Validator> {
        let id = self
            .targets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound { name: name.to_string() })?;
        supply(&self.oracle, &mut self.suppliers, &mut self.stubs, &id)
    }

    /// Every registered target, built, in registration order.
    pub fn top_level(&mut self) -> Result<Vec<TopLevel>> {
        let ids: Vec<UniqueId> = self.targets.values().cloned().collect();
        ids.into_iter()
            .map(|id| {
                let validator = supply(&self.oracle, &mut self.suppliers, &mut self.stubs, &id)?;
                Ok(TopLevel { id, validator })
            })
            .collect()
    }

    pub fn serialize(&mut self, options: &SerializeOptions) -> Result<String> {
        let entries = self.top_level()?;
        info!(entries = entries.len(), optimize = options.optimize, "serializing validators");
        serialize::serialize(&entries, options)
    }
}

/// Invoke the supplier of `id`: build on first call, memoize, then bind every
/// stub created along the way (which may recursively supply other ids).
fn supply<O: TypeOracle>(
    oracle: &O,
    suppliers: &mut Suppliers<O::Type>,
    stubs: &mut StubRegistry,
    id: &UniqueId,
) -> Result<Validator> {
    let ty = match suppliers.get(id) {
        Some(Supplier::Ready(validator)) => return Ok(validator.clone()),
        Some(Supplier::Pending(ty)) => ty.clone(),
        None => {
            return Err(Error::StubProtocolViolation {
                key: id.clone(),
                reason: "no supplier registered".to_string(),
            });
        }
    };
    debug!(%id, "building validator");
    let validator = GraphBuilder::new(oracle, stubs, suppliers).build(&ty, true)?;
    suppliers.insert(id.clone(), Supplier::Ready(validator.clone()));
    stubs.resolve_all(|stubs, key| supply(oracle, suppliers, stubs, key))?;
    Ok(validator)
}

// ------------------------------- Tests ------------------------------------ //
