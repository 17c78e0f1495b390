//! `maskid` masks monotonically increasing database IDs as non-sequential,
//! fixed-width digit tokens, and translates incoming tokens back to real IDs
//! wherever lookups and queries happen.
//!
//! This library is designed for exposing raw database IDs in URLs and APIs
//! without letting anyone walk your records by counting. The token is always
//! 10 decimal digits (optionally dressed up with a format template like
//! `"###-####-###"`), so it drops into any place a numeric-looking identifier
//! is expected, with no schema change and no stored UUID column. You keep the
//! performance benefits of plain integer primary keys.
//!
//! Each entity type gets its own identifier space, keyed by a "spin" derived
//! from the type's name. Tokens from one space decode to garbage in another,
//! which keeps object types from being mixed up accidentally.
//!
//! Please note this is obfuscation, not encryption of secrets: the spin is
//! not a secret key, and anyone who has it (or enough samples) can reverse
//! the transform. The goal is to stop casual enumeration, nothing more.
//!
//! # Usage
//!
//! ## Registering a space and transforming ids
//!
//! ```
//! use maskid_rs::{Options, Registry, Value};
//!
//! let registry = Registry::detached();
//! let space = registry
//!     .register("widget", Options::new().format("###-####-###"))
//!     .unwrap();
//!
//! let token = space.obfuscate(12345);
//! assert_eq!(token.len(), 12);
//! assert_eq!(space.deobfuscate(&Value::Str(token), false), Value::Int(12345));
//! ```
//!
//! ## Rewriting query predicates
//!
//! Comparisons on identifier-bearing fields (the entity's own `id`, and any
//! `belongs_to` foreign keys) get their token values replaced with the real
//! ids before the query reaches storage:
//!
//! ```
//! use maskid_rs::{Options, Predicate, Registry};
//!
//! let registry = Registry::detached();
//! registry.register("owner", Options::new()).unwrap();
//! let space = registry
//!     .register("record", Options::new().belongs_to("owner_id", "owner"))
//!     .unwrap();
//!
//! let mut filter = Predicate::eq("id", space.obfuscate(42).as_str());
//! registry.rewrite("record", &mut filter);
//! assert_eq!(filter, Predicate::eq("id", 42i64));
//! ```
//!
//! ## Typed public IDs with Serde
//!
//! The generic `PublicId` type serializes a record's real id as its public
//! token automatically; see [`PublicId`] for an example.
//!
//! ## Low level API
//!
//! `Scatter` is the bare keyed transform, for callers that manage their own
//! formatting and guards:
//!
//! ```
//! use maskid_rs::Scatter;
//!
//! let scatter = Scatter::new(141_819);
//! let token = scatter.hide(12345);
//! assert_eq!(token.len(), 10);
//! assert_eq!(scatter.reveal(&token), 12345);
//! ```

mod config;
mod field;
mod finder;
mod predicate;
mod registry;
mod scatter;
mod space;
mod store;

pub use config::{spin_for, ConfigError, Options, Template};
pub use field::{Entity, PublicId};
pub use finder::Finder;
pub use predicate::{rewrite_values, Comparison, Operator, Predicate, Value};
pub use registry::Registry;
pub use scatter::{hide, reveal, Scatter, DOMAIN_CEILING, TOKEN_DIGITS};
pub use space::Space;
pub use store::{MaxIdSource, Store, StoreError};
