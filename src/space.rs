use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::config::Template;
use crate::predicate::Value;
use crate::scatter::{Scatter, DOMAIN_CEILING};
use crate::store::MaxIdSource;

/// Per-entity identifier space: the spin-keyed transform, the optional token
/// format, and the cached upper bound of real identifiers.
///
/// A `Space` is created by [`Registry::register`](crate::Registry::register)
/// and lives for the lifetime of the registry. The only mutable state is the
/// max-id cache; everything else is fixed at registration.
pub struct Space {
    entity: String,
    spin: u128,
    scatter: Scatter,
    format: Option<Template>,
    keys: Vec<(String, String)>,
    max_id: Mutex<Option<u32>>,
    source: Arc<dyn MaxIdSource>,
}

impl Space {
    pub(crate) fn new(
        entity: &str,
        spin: u128,
        format: Option<Template>,
        keys: Vec<(String, String)>,
        source: Arc<dyn MaxIdSource>,
    ) -> Space {
        Space {
            entity: entity.to_string(),
            spin,
            scatter: Scatter::new(spin),
            format,
            keys,
            max_id: Mutex::new(None),
            source,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn spin(&self) -> u128 {
        self.spin
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_ref().map(Template::as_str)
    }

    /// The entity whose identifiers `field` holds, per the `belongs_to`
    /// declarations made at registration.
    pub fn key_entity(&self, field: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(key, _)| key == field)
            .map(|(_, entity)| entity.as_str())
    }

    /// Renders the public token for a real identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use maskid_rs::{Options, Registry};
    ///
    /// let registry = Registry::detached();
    /// let space = registry
    ///     .register("widget", Options::new().format("###-####-###"))
    ///     .unwrap();
    ///
    /// let token = space.obfuscate(12345);
    /// assert_eq!(token.len(), 12);
    /// assert_eq!(token.as_bytes()[3], b'-');
    /// ```
    pub fn obfuscate(&self, id: u32) -> String {
        let digits = self.scatter.hide(id);
        match &self.format {
            Some(template) => template.render(&digits),
            None => digits,
        }
    }

    /// Translates a public token back to the real identifier it hides.
    ///
    /// Strings and integers go through the transform: formatting is stripped
    /// down to the first 10 digits, the digits are revealed, and the result
    /// is clamped to the domain ceiling. Lists are translated element-wise
    /// (with rescue forced on per element) into a new list; any other value
    /// passes through unchanged.
    ///
    /// With `rescue_with_original` set, a revealed value at or above the
    /// domain ceiling, or above the highest id known to storage, is treated
    /// as decode noise and the original value is returned unchanged. That is
    /// what lets one entry point serve both token lookups and direct real-id
    /// lookups. With rescue off the revealed value is returned regardless,
    /// which is the right behavior for primary lookups where every input is
    /// assumed to be a token.
    pub fn deobfuscate(&self, value: &Value, rescue_with_original: bool) -> Value {
        match value {
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.deobfuscate(item, true))
                    .collect(),
            ),
            Value::Int(n) => self.decode_scalar(&n.to_string(), value, rescue_with_original),
            Value::Str(s) => self.decode_scalar(s, value, rescue_with_original),
            other => other.clone(),
        }
    }

    /// Reveals a token straight to an in-domain id, without the rescue guard.
    pub fn decode(&self, token: &str) -> u32 {
        self.scatter.reveal(token).min(u64::from(DOMAIN_CEILING)) as u32
    }

    fn decode_scalar(&self, text: &str, original: &Value, rescue_with_original: bool) -> Value {
        let revealed = self.scatter.reveal(text);
        if rescue_with_original
            && (revealed >= u64::from(DOMAIN_CEILING)
                || revealed > u64::from(self.max_known_id()))
        {
            return original.clone();
        }
        Value::Int(revealed.min(u64::from(DOMAIN_CEILING)) as i64)
    }

    /// The highest real identifier known to exist for this entity.
    ///
    /// Cached after the first computation; [`Space::invalidate_max_id`] must
    /// be called after every successful creation so the next call recomputes
    /// from storage. When the storage query fails the bound falls open to
    /// the domain ceiling, which turns the guard into a no-op instead of
    /// blocking every lookup.
    pub fn max_known_id(&self) -> u32 {
        let mut cached = self.max_id.lock().unwrap();
        if let Some(max) = *cached {
            return max;
        }
        let max = match self.source.max_id(&self.entity) {
            Ok(max) => max,
            Err(err) => {
                warn!(
                    entity = %self.entity,
                    error = %err,
                    "max id query failed, falling back to the domain ceiling"
                );
                DOMAIN_CEILING
            }
        };
        *cached = Some(max);
        max
    }

    /// Drops the cached bound. Storage integrations call this right after
    /// every successful creation of a record of this entity type.
    pub fn invalidate_max_id(&self) {
        *self.max_id.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spin_for;
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedMax(u32);

    impl MaxIdSource for FixedMax {
        fn max_id(&self, _entity: &str) -> Result<u32, StoreError> {
            Ok(self.0)
        }
    }

    struct FailingMax;

    impl MaxIdSource for FailingMax {
        fn max_id(&self, _entity: &str) -> Result<u32, StoreError> {
            Err(StoreError::Unavailable("down for maintenance".to_string()))
        }
    }

    struct CountingMax {
        max: Mutex<u32>,
        calls: AtomicUsize,
    }

    impl MaxIdSource for CountingMax {
        fn max_id(&self, _entity: &str) -> Result<u32, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(*self.max.lock().unwrap())
        }
    }

    fn space_with_max(max: u32) -> Space {
        Space::new(
            "widget",
            spin_for("widget"),
            None,
            vec![],
            Arc::new(FixedMax(max)),
        )
    }

    #[test]
    fn test_guard_accepts_plausible_ids() {
        let space = space_with_max(100);
        let token = space.obfuscate(50);
        assert_eq!(space.deobfuscate(&Value::Str(token), true), Value::Int(50));
    }

    #[test]
    fn test_guard_rescues_implausible_ids() {
        let space = space_with_max(100);
        let token = space.obfuscate(500);
        let original = Value::Str(token);

        assert_eq!(space.deobfuscate(&original, true), original.clone());
        assert_eq!(space.deobfuscate(&original, false), Value::Int(500));
    }

    #[test]
    fn test_direct_ids_rescue_to_themselves() {
        let space = space_with_max(100);
        // "42" is not a token; revealing it yields noise above the bound, so
        // the original value comes back and can be used as a direct id.
        assert_eq!(
            space.deobfuscate(&Value::Str("42".to_string()), true),
            Value::Str("42".to_string())
        );
        assert_eq!(space.deobfuscate(&Value::Int(42), true), Value::Int(42));
    }

    #[test]
    fn test_non_decodable_values_pass_through() {
        let space = space_with_max(100);
        assert_eq!(space.deobfuscate(&Value::Bool(true), true), Value::Bool(true));
        assert_eq!(space.deobfuscate(&Value::Null, false), Value::Null);
    }

    #[test]
    fn test_lists_map_element_wise() {
        let space = space_with_max(1_000);
        let tokens = Value::List(vec![
            Value::Str(space.obfuscate(7)),
            Value::Str(space.obfuscate(8)),
        ]);

        let decoded = space.deobfuscate(&tokens, false);

        assert_eq!(decoded, Value::List(vec![Value::Int(7), Value::Int(8)]));
        // The input is rebuilt, never mutated in place.
        assert_ne!(decoded, tokens);
    }

    #[test]
    fn test_format_round_trip() {
        let space = Space::new(
            "widget",
            12_345,
            Some(Template::parse("###-####-###").unwrap()),
            vec![],
            Arc::new(FixedMax(50_000)),
        );

        let token = space.obfuscate(12_345);
        assert_eq!(token.len(), 12);
        assert_eq!(token.as_bytes()[3], b'-');
        assert_eq!(token.as_bytes()[8], b'-');
        assert_eq!(space.deobfuscate(&Value::Str(token), true), Value::Int(12_345));
    }

    #[test]
    fn test_decode_clamps_to_ceiling() {
        let space = space_with_max(100);
        let token = space.obfuscate(77);
        assert_eq!(space.decode(&token), 77);
        // Every input decodes to something at or below the ceiling.
        for junk in ["", "banana", "9999999999", "0"] {
            assert!(space.decode(junk) <= DOMAIN_CEILING);
        }
    }

    #[test]
    fn test_max_id_is_cached_until_invalidated() {
        let source = Arc::new(CountingMax {
            max: Mutex::new(9),
            calls: AtomicUsize::new(0),
        });
        let space = Space::new("widget", 1, None, vec![], source.clone());

        assert_eq!(space.max_known_id(), 9);
        assert_eq!(space.max_known_id(), 9);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        *source.max.lock().unwrap() = 10;
        space.invalidate_max_id();

        assert_eq!(space.max_known_id(), 10);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_max_id_falls_open_on_storage_failure() {
        let space = Space::new("widget", 1, None, vec![], Arc::new(FailingMax));
        assert_eq!(space.max_known_id(), DOMAIN_CEILING);

        // With the bound wide open the guard only rejects out-of-domain
        // decodes, so tokens still translate.
        let token = space.obfuscate(123);
        assert_eq!(space.deobfuscate(&Value::Str(token), true), Value::Int(123));
    }
}
