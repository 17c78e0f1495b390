use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::Lazy;

use crate::config::{spin_for, ConfigError, Options, Template};
use crate::predicate::{rewrite_values, Predicate};
use crate::space::Space;
use crate::store::{MaxIdSource, StoreError};

static GLOBAL_REGISTRY: Lazy<Mutex<Option<Arc<Registry>>>> = Lazy::new(|| Mutex::new(None));

// The field every entity exposes its own identifier under.
pub(crate) const ID_FIELD: &str = "id";

/// Owns one [`Space`] per entity type.
///
/// Built once at startup, wired to the storage collaborator's max-id surface,
/// and handed by reference to everything that needs it. Registration is the
/// only write; lookups afterwards are cheap reads.
///
/// # Examples
///
/// ```
/// use maskid_rs::{Options, Registry, Value};
///
/// let registry = Registry::detached();
/// let space = registry
///     .register("widget", Options::new().format("###-####-###"))
///     .unwrap();
///
/// let token = space.obfuscate(12345);
/// assert_eq!(space.deobfuscate(&Value::Str(token), false), Value::Int(12345));
/// ```
pub struct Registry {
    source: Arc<dyn MaxIdSource>,
    spaces: RwLock<HashMap<String, Arc<Space>>>,
}

impl Registry {
    /// Creates a registry backed by the given max-id source.
    pub fn new(source: Arc<dyn MaxIdSource>) -> Registry {
        Registry {
            source,
            spaces: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry with no storage collaborator attached.
    ///
    /// Every max-id query fails, so the deobfuscation guard falls open to
    /// the domain ceiling. Useful for serialization-only setups and tests.
    pub fn detached() -> Registry {
        Registry::new(Arc::new(Detached))
    }

    /// Registers `entity`, validating the options and computing derived
    /// defaults.
    ///
    /// Fails when the format template is malformed or when the entity is
    /// already registered; a space's format is fixed for the lifetime of the
    /// process because changing it would invalidate every token already
    /// issued.
    pub fn register(&self, entity: &str, options: Options) -> Result<Arc<Space>, ConfigError> {
        let format = options
            .format
            .as_deref()
            .map(Template::parse)
            .transpose()?;
        let mut spaces = self.spaces.write().unwrap();
        if spaces.contains_key(entity) {
            return Err(ConfigError::AlreadyRegistered {
                entity: entity.to_string(),
            });
        }
        let spin = options.spin.unwrap_or_else(|| spin_for(entity));
        let space = Arc::new(Space::new(
            entity,
            spin,
            format,
            options.keys,
            self.source.clone(),
        ));
        spaces.insert(entity.to_string(), space.clone());
        Ok(space)
    }

    pub fn space(&self, entity: &str) -> Option<Arc<Space>> {
        self.spaces.read().unwrap().get(entity).cloned()
    }

    /// The space whose deobfuscator applies to `field` on `entity`: the
    /// entity's own space for its identifier field, the associated entity's
    /// space for a declared foreign key, none otherwise.
    pub fn deobfuscator_for(&self, entity: &str, field: &str) -> Option<Arc<Space>> {
        let space = self.space(entity)?;
        if field == ID_FIELD {
            return Some(space);
        }
        space
            .key_entity(field)
            .and_then(|associated| self.space(associated))
    }

    /// Rewrites every identifier-bearing comparison in `node` for queries
    /// against `entity`. Unregistered entities leave the tree untouched.
    pub fn rewrite(&self, entity: &str, node: &mut Predicate) {
        if self.space(entity).is_none() {
            return;
        }
        rewrite_values(node, &|field: &str| self.deobfuscator_for(entity, field));
    }

    /// See [`Space::max_known_id`]. Returns `None` for unregistered entities.
    pub fn max_known_id(&self, entity: &str) -> Option<u32> {
        self.space(entity).map(|space| space.max_known_id())
    }

    /// The creation hook: drops the cached max id for `entity` so the next
    /// lookup recomputes it from storage.
    pub fn invalidate_max_id(&self, entity: &str) {
        if let Some(space) = self.space(entity) {
            space.invalidate_max_id();
        }
    }

    /// Installs the process-wide registry consumed by the
    /// [`PublicId`](crate::PublicId) serde impls. Call once at startup,
    /// after registering every entity.
    pub fn set_global(registry: Arc<Registry>) {
        let mut global = GLOBAL_REGISTRY.lock().unwrap();
        *global = Some(registry);
    }

    /// Accesses the process-wide registry, if set.
    pub fn global() -> Option<Arc<Registry>> {
        GLOBAL_REGISTRY.lock().unwrap().clone()
    }
}

struct Detached;

impl MaxIdSource for Detached {
    fn max_id(&self, _entity: &str) -> Result<u32, StoreError> {
        Err(StoreError::Unavailable(
            "no storage collaborator attached".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_derives_spin_from_name() {
        let registry = Registry::detached();
        let space = registry.register("widget", Options::new()).unwrap();
        assert_eq!(space.spin(), spin_for("widget"));
        assert_eq!(space.entity(), "widget");
        assert_eq!(space.format(), None);
    }

    #[test]
    fn test_register_honors_explicit_spin() {
        let registry = Registry::detached();
        let space = registry
            .register("widget", Options::new().spin(987_654))
            .unwrap();
        assert_eq!(space.spin(), 987_654);
    }

    #[test]
    fn test_register_rejects_bad_formats() {
        let registry = Registry::detached();
        assert_eq!(
            registry
                .register("widget", Options::new().format("##-###"))
                .unwrap_err(),
            ConfigError::PlaceholderCount { found: 5 }
        );
        assert_eq!(
            registry
                .register("widget", Options::new().format("###-####-###!"))
                .unwrap_err(),
            ConfigError::UnsafeCharacter { character: '!' }
        );
        // A rejected registration leaves no space behind.
        assert!(registry.space("widget").is_none());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = Registry::detached();
        registry.register("widget", Options::new()).unwrap();
        assert_eq!(
            registry.register("widget", Options::new()).unwrap_err(),
            ConfigError::AlreadyRegistered {
                entity: "widget".to_string()
            }
        );
    }

    #[test]
    fn test_deobfuscator_mapping() {
        let registry = Registry::detached();
        let owners = registry.register("owner", Options::new()).unwrap();
        let records = registry
            .register("record", Options::new().belongs_to("owner_id", "owner"))
            .unwrap();

        let own = registry.deobfuscator_for("record", "id").unwrap();
        assert!(Arc::ptr_eq(&own, &records));

        let fk = registry.deobfuscator_for("record", "owner_id").unwrap();
        assert!(Arc::ptr_eq(&fk, &owners));

        assert!(registry.deobfuscator_for("record", "name").is_none());
        assert!(registry.deobfuscator_for("missing", "id").is_none());
    }

    #[test]
    fn test_foreign_key_to_unregistered_entity_resolves_to_none() {
        let registry = Registry::detached();
        registry
            .register("record", Options::new().belongs_to("owner_id", "owner"))
            .unwrap();
        assert!(registry.deobfuscator_for("record", "owner_id").is_none());
    }
}
