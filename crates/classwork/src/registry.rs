//! Type tag resolution.
//!
//! [`TypeRegistry`] maps type tags (identities or short names) to
//! [`RecordType`]s and turns envelope maps back into records of the right
//! concrete type.
//!
//! ## Direct Subtypes Only
//!
//! Resolution against a base type only considers the base itself and its
//! *direct* subtypes registered at call time. A grandchild is found only by
//! decoding against its own parent. Hierarchies deeper than one level have to
//! decode level by level.
//!
//! ## Process-Wide Registry
//!
//! Hosts normally register their types once at startup with [`register`] and
//! decode through [`Record::from_json`](crate::Record::from_json), which reads
//! the global registry via [`with_global`]. [`reset`] clears it. The global
//! table sits behind a `RwLock`, so registration and lookups may interleave
//! across threads; owned `TypeRegistry` values need external synchronization.

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{ClassworkError, Result};
use crate::record::{check_params, Record};
use crate::schema::{RecordType, TYPE_TAG_KEY};
use crate::value::{ParamMap, Value};

static GLOBAL: Lazy<RwLock<TypeRegistry>> = Lazy::new(|| RwLock::new(TypeRegistry::new()));

/// Register a type in the process-wide registry.
pub fn register(ty: Arc<RecordType>) {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(ty);
}

/// Drop every type from the process-wide registry.
pub fn reset() {
    *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = TypeRegistry::new();
}

/// Run `f` with shared access to the process-wide registry.
pub fn with_global<R>(f: impl FnOnce(&TypeRegistry) -> R) -> R {
    let guard = GLOBAL.read().unwrap_or_else(PoisonError::into_inner);
    f(&guard)
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, Arc<RecordType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type. A type with the same identity is replaced.
    pub fn register(&mut self, ty: Arc<RecordType>) {
        debug!(
            identity = ty.identity(),
            parent = ty.parent().map(|p| p.identity()),
            "registering record type"
        );
        self.types.insert(ty.identity().to_string(), ty);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Look a tag up across every registered type, identity first.
    pub fn get(&self, tag: &str) -> Option<&Arc<RecordType>> {
        self.types
            .get(tag)
            .or_else(|| self.types.values().find(|ty| ty.name() == tag))
    }

    /// Registered types whose parent is `base`.
    pub fn direct_subtypes<'a>(
        &'a self,
        base: &'a RecordType,
    ) -> impl Iterator<Item = &'a Arc<RecordType>> + 'a {
        self.types
            .values()
            .filter(move |ty| ty.parent().is_some_and(|p| p.identity() == base.identity()))
    }

    /// Resolve a tag against `base` and its direct subtypes.
    pub fn resolve(&self, base: &Arc<RecordType>, tag: &str) -> Result<Arc<RecordType>> {
        if base.answers_to(tag) {
            return Ok(Arc::clone(base));
        }
        self.direct_subtypes(base)
            .find(|ty| ty.answers_to(tag))
            .cloned()
            .ok_or_else(|| ClassworkError::UnknownClass {
                tag: tag.to_string(),
                base: base.identity().to_string(),
            })
    }

    /// Build a record of the concrete type named by the envelope's tag.
    ///
    /// Without a tag the map is instantiated as `base`. Otherwise the tag is
    /// resolved against `base` and its direct subtypes, the nested payload is
    /// merged into the outer map, and the resolved type is instantiated
    /// without re-checking the tag.
    pub fn construct(&self, base: &Arc<RecordType>, mut envelope: ParamMap) -> Result<Record> {
        let Some(tag) = envelope.shift_remove(TYPE_TAG_KEY) else {
            let params = check_params(self, base, envelope, true)?;
            return Ok(Record::from_params(base, params));
        };

        let tag = match tag {
            Value::Text(tag) => tag,
            other => {
                return Err(ClassworkError::InvalidEnvelope(format!(
                    "{TYPE_TAG_KEY} must be text, found {}",
                    other.kind()
                )))
            }
        };

        let ty = self.resolve(base, &tag)?;
        let params = check_params(self, &ty, envelope, false)?;
        Ok(Record::from_params(&ty, params))
    }

    /// Build a record of exactly `ty` from params and overrides (overrides
    /// win), checking any type tag they carry.
    pub fn instantiate(
        &self,
        ty: &Arc<RecordType>,
        mut params: ParamMap,
        overrides: ParamMap,
    ) -> Result<Record> {
        params.extend(overrides);
        let params = check_params(self, ty, params, true)?;
        Ok(Record::from_params(ty, params))
    }
}
