//! # Classwork
//!
//! Classwork is a library of **self-describing parameter records**. A record
//! is a named bag of typed attributes whose declared defaults live on its
//! type, and which serializes to a JSON envelope that names its own concrete
//! type so it can be rebuilt polymorphically from a base type.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Collections (collection.rs, matcher.rs)                    │
//! │  - Ordered, immutable groups of records with index keys     │
//! │  - Criteria matching and selection via keymatch             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Codec (codec.rs, config.rs)                                │
//! │  - {"_cls": tag, "_params": {...}} envelopes                │
//! │  - Typed wire forms for dates, enumerants, ranges           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Records (record.rs, combinator.rs)                         │
//! │  - Three-tier lookup: instance, hidden, declared default    │
//! │  - Elementwise combination of same-typed records            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Types (schema.rs, registry.rs, value.rs)                   │
//! │  - Record types with defaults, parents, default operator    │
//! │  - Registry resolving tags against a base type              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Type Resolution
//!
//! Decoding always happens *against a base type*. The envelope's tag must
//! name the base itself or one of its direct subtypes; grandchildren are
//! invisible from the grandparent. Types become visible by registering them,
//! either in a [`TypeRegistry`] owned by the caller or in the process-wide
//! one behind [`registry::register`].
//!
//! ## Logging
//!
//! The library emits [`tracing`] events and never installs a subscriber.
//! Targets follow module paths; `classwork::matcher` reports key pairs that
//! could not be compared.
//!
//! ## Module Overview
//!
//! - [`value`]: attribute values and their scalar semantics
//! - [`schema`]: record types and their builder
//! - [`record`]: record instances
//! - [`registry`]: type registry and polymorphic construction
//! - [`codec`]: envelope encoding and decoding
//! - [`config`]: layered encoding configuration
//! - [`matcher`]: the `keymatch` comparison
//! - [`collection`]: indexed record collections
//! - [`combinator`]: operators and record combination
//! - [`error`]: the crate error type

pub mod codec;
pub mod collection;
pub mod combinator;
pub mod config;
pub mod error;
pub mod matcher;
pub mod record;
pub mod registry;
pub mod schema;
pub mod value;

pub use codec::{EncodeOptions, Envelope};
pub use collection::{param_set_type, select, Collection, Members};
pub use combinator::Operator;
pub use config::CodecConfig;
pub use error::{ClassworkError, Result};
pub use matcher::keymatch;
pub use record::Record;
pub use registry::TypeRegistry;
pub use schema::{RecordType, RecordTypeBuilder, PAYLOAD_KEY, TYPE_TAG_KEY};
pub use value::{Enumerant, Enumerated, ParamMap, Range, Value};
