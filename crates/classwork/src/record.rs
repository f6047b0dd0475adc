//! # Records: Declared, Instance and Hidden Attributes
//!
//! A [`Record`] is a parameter holder built from a [`RecordType`]. Every
//! attribute name lives in exactly one of three places:
//!
//! | Tier | Holds | Visible in the default projection |
//! |------|-------|-----------------------------------|
//! | declared default | the type's class-level values | only with `include_defaults` |
//! | instance | values assigned to declared names | yes |
//! | hidden | values assigned to undeclared names | only with `include_hidden` |
//!
//! The hidden tier is what lets a record decoded from a newer schema carry
//! unknown fields without failing and without leaking them into the public
//! surface.
//!
//! ## Construction
//!
//! [`Record::construct`] merges `params` and `overrides` (overrides win), then
//! validates and strips the envelope control keys (`_cls`, `_params`) before
//! applying each remaining entry with [`Record::set`]. See [`check_params`].

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ClassworkError, Result};
use crate::registry::{self, TypeRegistry};
use crate::schema::{RecordType, PAYLOAD_KEY, TYPE_TAG_KEY};
use crate::value::{ParamMap, Value};

#[derive(Debug, Clone)]
pub struct Record {
    ty: Arc<RecordType>,
    instance: ParamMap,
    hidden: ParamMap,
}

impl Record {
    /// A record carrying only its type's declared defaults.
    pub fn new(ty: &Arc<RecordType>) -> Self {
        Self {
            ty: Arc::clone(ty),
            instance: ParamMap::new(),
            hidden: ParamMap::new(),
        }
    }

    /// Build a record from params plus overrides, validating any type tag
    /// against the process-wide registry.
    pub fn construct(ty: &Arc<RecordType>, params: ParamMap, overrides: ParamMap) -> Result<Self> {
        registry::with_global(|reg| reg.instantiate(ty, params, overrides))
    }

    /// Apply already-checked params.
    pub(crate) fn from_params(ty: &Arc<RecordType>, params: ParamMap) -> Self {
        let mut record = Self::new(ty);
        record.update(params);
        record
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    /// The identity written into envelopes.
    pub fn type_tag(&self) -> &str {
        self.ty.identity()
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.instance
            .get(name)
            .or_else(|| self.hidden.get(name))
            .or_else(|| self.ty.default_value(name))
            .ok_or_else(|| ClassworkError::AttributeNotFound {
                type_tag: self.type_tag().to_string(),
                name: name.to_string(),
            })
    }

    /// Assign a value. Undeclared names go to the hidden tier.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if name == TYPE_TAG_KEY || name == PAYLOAD_KEY {
            warn!(type_tag = self.type_tag(), key = %name, "refusing to store reserved control key");
            return;
        }

        if self.ty.declares(&name) {
            self.instance.insert(name, value.into());
        } else {
            debug!(type_tag = self.type_tag(), attr = %name, "attr will be hidden");
            self.hidden.insert(name, value.into());
        }
    }

    pub fn update(&mut self, params: ParamMap) {
        for (name, value) in params {
            self.set(name, value);
        }
    }

    /// Declared names, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ty.field_names()
    }

    /// Merged view of the record.
    ///
    /// The default view (`false, false`) is the instance-assigned declared
    /// values. `include_defaults` layers the declared defaults underneath;
    /// `include_hidden` appends the hidden tier.
    pub fn project(&self, include_defaults: bool, include_hidden: bool) -> ParamMap {
        let mut out = ParamMap::new();

        for (name, default) in self.ty.defaults() {
            match self.instance.get(name) {
                Some(value) => {
                    out.insert(name.clone(), value.clone());
                }
                None if include_defaults => {
                    out.insert(name.clone(), default.clone());
                }
                None => {}
            }
        }

        if include_hidden {
            out.extend(self.hidden.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        out
    }

    pub fn keys(&self, include_defaults: bool, include_hidden: bool) -> Vec<String> {
        self.project(include_defaults, include_hidden)
            .into_keys()
            .collect()
    }

    pub fn values(&self, include_defaults: bool, include_hidden: bool) -> Vec<Value> {
        self.project(include_defaults, include_hidden)
            .into_values()
            .collect()
    }

    pub fn items(&self, include_defaults: bool, include_hidden: bool) -> Vec<(String, Value)> {
        self.project(include_defaults, include_hidden)
            .into_iter()
            .collect()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ty.identity() == other.ty.identity()
            && self.instance == other.instance
            && self.hidden == other.hidden
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().collect();
        let shown: Vec<&str> = if names.len() > 5 {
            let mut head = names[..4].to_vec();
            head.push("...");
            head.push(names[names.len() - 1]);
            head
        } else {
            names
        };
        write!(f, "<{}> [{}]", self.type_tag(), shown.join(", "))
    }
}

/// Validate and strip the envelope control keys from construction params.
///
/// With `check_tag` set, a `_cls` entry must name `ty` or one of its
/// registered direct subtypes. A `_params` entry is flattened into the
/// top-level map, its keys winning over siblings of the same name.
pub(crate) fn check_params(
    registry: &TypeRegistry,
    ty: &RecordType,
    mut params: ParamMap,
    check_tag: bool,
) -> Result<ParamMap> {
    if let Some(tag) = params.shift_remove(TYPE_TAG_KEY) {
        if check_tag {
            let tag = match tag {
                Value::Text(tag) => tag,
                other => {
                    return Err(ClassworkError::InvalidEnvelope(format!(
                        "{TYPE_TAG_KEY} must be text, found {}",
                        other.kind()
                    )))
                }
            };
            let known = ty.answers_to(&tag)
                || registry.direct_subtypes(ty).any(|sub| sub.answers_to(&tag));
            if !known {
                return Err(ClassworkError::UnknownType {
                    tag,
                    expected: ty.identity().to_string(),
                });
            }
        }
    }

    if let Some(payload) = params.shift_remove(PAYLOAD_KEY) {
        match payload {
            Value::Map(payload) => params.extend(payload),
            other => {
                return Err(ClassworkError::InvalidEnvelope(format!(
                    "{PAYLOAD_KEY} must be a map, found {}",
                    other.kind()
                )))
            }
        }
    }

    Ok(params)
}
