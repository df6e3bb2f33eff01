//! Forward references between named types.
//!
//! A `Stub` is handed out before the validator of its alias exists and is bound
//! exactly once afterwards. Every holder observes the binding through the
//! shared cell, so cycles need no graph rewiring.
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::trace;

use crate::error::{Error, Result};
use crate::oracle::UniqueId;
use crate::validator::Validator;

#[derive(Clone)]
pub struct Stub(Arc<StubCell>);

struct StubCell {
    key: UniqueId,
    delegate: OnceLock<Validator>,
}

/// The two states of a stub. `bind` is the only transition.
#[derive(Debug, Clone, Copy)]
pub enum StubState<'a> {
    Unbound,
    Bound(&'a Validator),
}

impl Stub {
    pub fn new(key: UniqueId) -> Self {
        Stub(Arc::new(StubCell { key, delegate: OnceLock::new() }))
    }

    pub fn key(&self) -> &UniqueId {
        &self.0.key
    }

    pub fn state(&self) -> StubState<'_> {
        match self.0.delegate.get() {
            None => StubState::Unbound,
            Some(validator) => StubState::Bound(validator),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.0.delegate.get().is_some()
    }

    pub fn delegate(&self) -> Result<&Validator> {
        self.0.delegate.get().ok_or_else(|| Error::StubProtocolViolation {
            key: self.key().clone(),
            reason: "delegate read before it was bound".to_string(),
        })
    }

    /// Install the delegate. Binding again to the same node is a no-op;
    /// binding to a different node is a protocol violation.
    pub fn bind(&self, validator: Validator) -> Result<()> {
        if let Some(existing) = self.0.delegate.get() {
            if existing.same(&validator) {
                return Ok(());
            }
            return Err(Error::StubProtocolViolation {
                key: self.key().clone(),
                reason: "already bound to a different validator".to_string(),
            });
        }
        trace!(key = %self.key(), "binding stub");
        self.0.delegate.set(validator).map_err(|_| Error::StubProtocolViolation {
            key: self.key().clone(),
            reason: "bound concurrently".to_string(),
        })
    }

    pub fn ptr_eq(&self, other: &Stub) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// `true` if `validator` is this stub, or a chain of bound stubs ending here.
    pub fn is_reached_by(&self, validator: &Validator) -> bool {
        let mut current = validator;
        while let Validator::Stub(stub) = current {
            if stub.ptr_eq(self) {
                return true;
            }
            match stub.state() {
                StubState::Bound(next) => current = next,
                StubState::Unbound => return false,
            }
        }
        false
    }
}

// Never descends into the delegate: graphs through stubs are cyclic.
impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("key", self.key())
            .field("bound", &self.is_bound())
            .finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

/// Run-scoped table of stubs, memoized by key, plus the queue of unbound ones.
#[derive(Debug, Default)]
pub struct StubRegistry {
    by_key: HashMap<UniqueId, Stub>,
    pending: Vec<Stub>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stub for `key`, created on first request.
    pub fn create(&mut self, key: &UniqueId) -> Stub {
        if let Some(stub) = self.by_key.get(key) {
            return stub.clone();
        }
        trace!(%key, "creating stub");
        let stub = Stub::new(key.clone());
        self.by_key.insert(key.clone(), stub.clone());
        self.pending.push(stub.clone());
        stub
    }

    pub fn get(&self, key: &UniqueId) -> Option<&Stub> {
        self.by_key.get(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.iter().filter(|stub| !stub.is_bound()).count()
    }

    fn next_pending(&mut self) -> Option<Stub> {
        while let Some(stub) = self.pending.pop() {
            if !stub.is_bound() {
                return Some(stub);
            }
        }
        None
    }

    /// Bind every unbound stub to the validator its key's supplier returns.
    ///
    /// The supplier receives the registry back, so it may create more stubs
    /// (or resolve recursively); the loop drains until nothing is pending.
    pub fn resolve_all<F>(&mut self, mut supplier: F) -> Result<()>
    where
        F: FnMut(&mut StubRegistry, &UniqueId) -> Result<Validator>,
    {
        while let Some(stub) = self.next_pending() {
            let validator = supplier(self, stub.key())?;
            if stub.is_reached_by(&validator) {
                return Err(Error::unresolvable(
                    stub.key().to_string(),
                    "alias only refers back to itself",
                ));
            }
            stub.bind(validator)?;
        }
        Ok(())
    }
}

// ------------------------------- Tests ------------------------------------ //
