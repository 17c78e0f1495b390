use std::fmt;

use crate::predicate::Predicate;

/// Error surfaced by the storage collaborator.
#[derive(Debug, PartialEq)]
pub enum StoreError {
    NotFound { entity: String, id: u32 },
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::NotFound { entity, id } => {
                write!(f, "No {} record with id {}", entity, id)
            }
            StoreError::Unavailable(reason) => {
                write!(f, "Storage unavailable: {}", reason)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// The slice of the storage collaborator the registry depends on.
///
/// Kept separate from [`Store`] so the registry can hold it as a trait
/// object without caring about the record type. The call may block on I/O;
/// the per-space max-id lock is held across it, which serializes concurrent
/// recomputation for one entity type.
pub trait MaxIdSource: Send + Sync {
    /// Returns the current maximum real identifier stored for `entity`.
    fn max_id(&self, entity: &str) -> Result<u32, StoreError>;
}

/// The external storage engine, as seen by the lookup façade.
///
/// The core never generates SQL or touches persistence itself; everything
/// below this trait is someone else's problem. Implementations decide what a
/// record is and how a predicate tree is executed.
///
/// # Invariants
///
/// - `find` returns `StoreError::NotFound` on a miss, never `Ok` with a
///   placeholder record
/// - `find_first` evaluates the predicate tree as given; the façade has
///   already rewritten token values into real ids by the time it is called
pub trait Store: MaxIdSource {
    type Record;

    /// Primary-key lookup.
    fn find(&self, entity: &str, id: u32) -> Result<Self::Record, StoreError>;

    /// Primary-key existence check.
    fn exists(&self, entity: &str, id: u32) -> Result<bool, StoreError>;

    /// Returns the first record matching `filter`, if any.
    fn find_first(&self, entity: &str, filter: &Predicate)
        -> Result<Option<Self::Record>, StoreError>;
}
