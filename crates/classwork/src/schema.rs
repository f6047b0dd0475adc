//! Record type descriptors.
//!
//! A [`RecordType`] is the declared surface of a family of records: its
//! identity (the type tag written into envelopes), its ordered declared
//! defaults, its parent type and the operator used when two of its records
//! are combined without an explicit one.
//!
//! Types are built once and shared behind an `Arc`; a record keeps the
//! descriptor it was built from, so its declared surface never changes.

use std::sync::Arc;

use crate::combinator::Operator;
use crate::error::{ClassworkError, Result};
use crate::value::{ParamMap, Value};

/// Envelope key carrying the type tag.
pub const TYPE_TAG_KEY: &str = "_cls";

/// Envelope key carrying the attribute payload.
pub const PAYLOAD_KEY: &str = "_params";

#[derive(Debug)]
pub struct RecordType {
    identity: String,
    name: String,
    parent: Option<Arc<RecordType>>,
    defaults: ParamMap,
    default_operator: Operator,
}

impl RecordType {
    /// Start declaring a type with a fully qualified identity such as
    /// `app.params.Scenario`.
    pub fn builder(identity: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            identity: identity.into(),
            parent: None,
            fields: Vec::new(),
            operator: None,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The last segment of the identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<RecordType>> {
        self.parent.as_ref()
    }

    /// Declared defaults in declaration order.
    pub fn defaults(&self) -> &ParamMap {
        &self.defaults
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.defaults.keys().map(String::as_str)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.defaults.contains_key(name)
    }

    pub fn default_value(&self, name: &str) -> Option<&Value> {
        self.defaults.get(name)
    }

    pub fn default_operator(&self) -> Operator {
        self.default_operator
    }

    /// Whether `tag` names this type, by identity or by short name.
    pub fn answers_to(&self, tag: &str) -> bool {
        self.identity == tag || self.name == tag
    }

    /// Whether this type is `other` or descends from it.
    pub fn is_a(&self, other: &RecordType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty.identity == other.identity {
                return true;
            }
            current = ty.parent.as_deref();
        }
        false
    }
}

pub struct RecordTypeBuilder {
    identity: String,
    parent: Option<Arc<RecordType>>,
    fields: Vec<(String, Value)>,
    operator: Option<Operator>,
}

impl RecordTypeBuilder {
    /// Inherit the parent's declared fields (and default operator).
    pub fn extends(mut self, parent: &Arc<RecordType>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Declare a field with its class-level default.
    pub fn field(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.fields.push((name.into(), default.into()));
        self
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn build(self) -> Result<Arc<RecordType>> {
        let invalid = |reason: String| ClassworkError::InvalidSchema {
            identity: self.identity.clone(),
            reason,
        };

        if self.identity.is_empty() {
            return Err(invalid("identity must not be empty".to_string()));
        }

        let mut defaults = self
            .parent
            .as_ref()
            .map(|p| p.defaults.clone())
            .unwrap_or_default();

        for (name, default) in &self.fields {
            // Leading underscores are private, which also covers `_cls`/`_params`.
            if name.is_empty() || name.starts_with('_') {
                return Err(invalid(format!("field name {name:?} is not public")));
            }
            // Redeclared parent fields keep their position.
            defaults.insert(name.clone(), default.clone());
        }

        let name = self
            .identity
            .rsplit('.')
            .next()
            .unwrap_or(&self.identity)
            .to_string();

        let default_operator = self
            .operator
            .or_else(|| self.parent.as_ref().map(|p| p.default_operator))
            .unwrap_or(Operator::Assign);

        Ok(Arc::new(RecordType {
            identity: self.identity,
            name,
            parent: self.parent,
            defaults,
            default_operator,
        }))
    }
}
