use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::registry::Registry;
use crate::space::Space;

/// Marker tying a [`PublicId`] to a registered entity type.
pub trait Entity: fmt::Debug {
    /// The name the entity was registered under.
    fn name() -> &'static str;
}

fn global_space<T: Entity>() -> Result<Arc<Space>, String> {
    let registry =
        Registry::global().ok_or_else(|| "Global registry is not set".to_string())?;
    registry
        .space(T::name())
        .ok_or_else(|| format!("Entity {:?} is not registered", T::name()))
}

/// A type-safe public identifier field (a wrapped `u32`).
///
/// When serialized with Serde, the real id is automatically obfuscated into
/// its public token; deserialization decodes the token back to the real id.
/// The entity marker keeps ids of different object types from mixing, and
/// selects which registered space does the transform. The process-wide
/// registry must be installed with [`Registry::set_global`] before any serde
/// conversion runs.
///
/// # Examples
///
/// ```
/// use maskid_rs::{Entity, Options, PublicId, Registry};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// pub struct WidgetMarker;
/// impl Entity for WidgetMarker {
///     fn name() -> &'static str { "widget" }
/// }
///
/// type WidgetId = PublicId<WidgetMarker>;
///
/// #[derive(serde::Serialize)]
/// struct Widget {
///     pub id: WidgetId,
/// }
///
/// let registry = Arc::new(Registry::detached());
/// registry.register("widget", Options::new()).unwrap();
/// Registry::set_global(registry);
///
/// let obj = Widget { id: WidgetId::new(12345) };
/// let json = serde_json::to_string(&obj).unwrap();
/// // The serialized form is the 10-digit token, not the raw id.
/// assert_eq!(json.len(), r#"{"id":"0123456789"}"#.len());
/// assert!(!json.contains("12345"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicId<T: Entity> {
    id: u32,
    _marker: PhantomData<T>,
}

impl<T: Entity> PublicId<T> {
    pub fn new(id: u32) -> Self {
        PublicId {
            id,
            _marker: PhantomData,
        }
    }

    /// Returns the raw real identifier.
    pub fn get(self) -> u32 {
        self.id
    }

    /// Renders the public token, if the entity is registered globally.
    pub fn token(self) -> Option<String> {
        global_space::<T>().ok().map(|space| space.obfuscate(self.id))
    }
}

impl<T: Entity> From<u32> for PublicId<T> {
    fn from(id: u32) -> Self {
        PublicId::new(id)
    }
}

impl<T: Entity> From<PublicId<T>> for u32 {
    fn from(field: PublicId<T>) -> u32 {
        field.id
    }
}

impl<T: Entity> fmt::Display for PublicId<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublicId {{ id: {}, entity: {} }}", self.id, T::name())
    }
}

impl<T: Entity> Serialize for PublicId<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let space = global_space::<T>().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&space.obfuscate(self.id))
    }
}

impl<'de, T: Entity> Deserialize<'de> for PublicId<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let space = global_space::<T>().map_err(serde::de::Error::custom)?;
        Ok(PublicId::new(space.decode(&encoded)))
    }
}
