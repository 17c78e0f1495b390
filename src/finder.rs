use std::sync::Arc;

use crate::predicate::{Predicate, Value};
use crate::registry::Registry;
use crate::space::Space;
use crate::store::{Store, StoreError};

/// Token-aware lookups for one entity type.
///
/// A thin composition of a [`Space`], the [`Registry`] (for foreign-key
/// resolution), and the external [`Store`]: every operation translates the
/// incoming token(s) and delegates. This is the only piece that talks to the
/// storage engine.
pub struct Finder<'a, S: Store> {
    registry: &'a Registry,
    store: &'a S,
    space: Arc<Space>,
}

impl<'a, S: Store> Finder<'a, S> {
    /// Returns `None` when `entity` has not been registered.
    pub fn new(registry: &'a Registry, store: &'a S, entity: &str) -> Option<Finder<'a, S>> {
        let space = registry.space(entity)?;
        Some(Finder {
            registry,
            store,
            space,
        })
    }

    /// Renders the public token for a real identifier.
    pub fn token(&self, id: u32) -> String {
        self.space.obfuscate(id)
    }

    /// Primary-key lookup by public token.
    ///
    /// The token is decoded without the rescue guard: whatever comes in is
    /// assumed to be a token, and noise simply decodes to an id storage will
    /// not find. A miss propagates the store's `NotFound`.
    pub fn find(&self, token: &str) -> Result<S::Record, StoreError> {
        self.store.find(self.space.entity(), self.space.decode(token))
    }

    /// Existence check by public token.
    ///
    /// Decoded with the rescue guard, so a direct real id passed through
    /// ("42") checks that id. Inputs that neither decode nor rescue to an
    /// in-domain id exist nowhere and short-circuit to `false`.
    pub fn exists(&self, token: &str) -> Result<bool, StoreError> {
        let decoded = self
            .space
            .deobfuscate(&Value::Str(token.to_string()), true);
        match decoded.as_id() {
            Some(id) => self.store.exists(self.space.entity(), id),
            None => Ok(false),
        }
    }

    /// First record matching a criteria map.
    ///
    /// The single-field short-circuit: each identifier-bearing field's value
    /// is deobfuscated (with rescue) before the criteria are handed to the
    /// store as an `All` of equality comparisons. Other fields pass through
    /// untouched.
    pub fn find_by(
        &self,
        criteria: Vec<(String, Value)>,
    ) -> Result<Option<S::Record>, StoreError> {
        let entity = self.space.entity();
        let rewritten = criteria
            .into_iter()
            .map(|(field, value)| {
                let value = match self.registry.deobfuscator_for(entity, &field) {
                    Some(space) if !value.holds_param_marker() => space.deobfuscate(&value, true),
                    _ => value,
                };
                Predicate::eq(&field, value)
            })
            .collect();
        self.store.find_first(entity, &Predicate::All(rewritten))
    }

    /// First record matching a prebuilt predicate tree, after the full
    /// rewrite pass.
    pub fn find_first(&self, mut filter: Predicate) -> Result<Option<S::Record>, StoreError> {
        self.registry.rewrite(self.space.entity(), &mut filter);
        self.store.find_first(self.space.entity(), &filter)
    }
}
