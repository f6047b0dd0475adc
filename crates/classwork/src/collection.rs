//! # Indexed Collections
//!
//! A [`Collection`] is an immutable, ordered tuple of records of one child
//! type, described by a *set record* whose attributes are the collection's
//! index keys. The set record's `indexes` attribute names which of its fields
//! take part in matching.
//!
//! ```ignore
//! let set = Collection::param_set(&scenario_type, members, vec!["high"], Value::Unset, day)?;
//!
//! let mut criteria = ParamMap::new();
//! criteria.insert("scen_keys".into(), "high".into());
//! assert!(set.matches(&criteria, true)?);
//! ```
//!
//! Membership is checked once, at construction. Adding or dropping members
//! produces a new collection; members are shared, never mutated.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::codec::{self, EncodeOptions, Envelope};
use crate::error::{ClassworkError, Result};
use crate::matcher::keymatch;
use crate::record::Record;
use crate::registry::{self, TypeRegistry};
use crate::schema::{RecordType, PAYLOAD_KEY};
use crate::value::{ParamMap, Value};

/// Set-record field naming the index fields.
pub const INDEXES_FIELD: &str = "indexes";

/// Payload key carrying member envelopes.
pub const MEMBERS_KEY: &str = "collection";

pub const PARAM_SET_IDENTITY: &str = "classwork.ParamSet";

/// Index fields of the stock [`param_set_type`].
pub const PARAM_SET_INDEXES: [&str; 3] = ["scen_keys", "geo_keys", "date_key"];

/// The stock set type: scenario keys, geography keys and a date key, all
/// unset by default.
pub fn param_set_type() -> Result<Arc<RecordType>> {
    PARAM_SET_INDEXES
        .iter()
        .fold(RecordType::builder(PARAM_SET_IDENTITY), |b, name| {
            b.field(*name, Value::Unset)
        })
        .field(INDEXES_FIELD, PARAM_SET_INDEXES.to_vec())
        .build()
}

/// Members handed to a collection constructor.
pub enum Members {
    Seq(Vec<Arc<Record>>),
    /// Values are taken in order; keys are discarded.
    Keyed(IndexMap<String, Arc<Record>>),
    Single(Arc<Record>),
}

impl Members {
    fn into_vec(self) -> Vec<Arc<Record>> {
        match self {
            Members::Seq(items) => items,
            Members::Keyed(items) => items.into_values().collect(),
            Members::Single(item) => vec![item],
        }
    }
}

impl From<Vec<Record>> for Members {
    fn from(items: Vec<Record>) -> Self {
        Members::Seq(items.into_iter().map(Arc::new).collect())
    }
}

impl From<Vec<Arc<Record>>> for Members {
    fn from(items: Vec<Arc<Record>>) -> Self {
        Members::Seq(items)
    }
}

impl From<IndexMap<String, Record>> for Members {
    fn from(items: IndexMap<String, Record>) -> Self {
        Members::Keyed(items.into_iter().map(|(k, v)| (k, Arc::new(v))).collect())
    }
}

impl From<IndexMap<String, Arc<Record>>> for Members {
    fn from(items: IndexMap<String, Arc<Record>>) -> Self {
        Members::Keyed(items)
    }
}

impl From<Record> for Members {
    fn from(item: Record) -> Self {
        Members::Single(Arc::new(item))
    }
}

impl From<Arc<Record>> for Members {
    fn from(item: Arc<Record>) -> Self {
        Members::Single(item)
    }
}

#[derive(Debug, Clone)]
pub struct Collection {
    set: Record,
    indexes: Arc<[String]>,
    child_type: Arc<RecordType>,
    members: Arc<[Arc<Record>]>,
}

impl Collection {
    /// Build a collection whose index keys live on `set`.
    ///
    /// Every member must be a `child_type` (or descend from it).
    pub fn new(
        set: Record,
        child_type: &Arc<RecordType>,
        members: impl Into<Members>,
    ) -> Result<Self> {
        let indexes = read_indexes(&set)?;
        let members = check_members(child_type, members.into().into_vec())?;

        Ok(Self {
            set,
            indexes: indexes.into(),
            child_type: Arc::clone(child_type),
            members: members.into(),
        })
    }

    /// A [`param_set_type`] collection with the given index values.
    pub fn param_set(
        child_type: &Arc<RecordType>,
        members: impl Into<Members>,
        scen_keys: impl Into<Value>,
        geo_keys: impl Into<Value>,
        date_key: impl Into<Value>,
    ) -> Result<Self> {
        let mut set = Record::new(&param_set_type()?);
        set.set("scen_keys", scen_keys);
        set.set("geo_keys", geo_keys);
        set.set("date_key", date_key);
        Self::new(set, child_type, members)
    }

    /// The record carrying the index values.
    pub fn set_record(&self) -> &Record {
        &self.set
    }

    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    pub fn child_type(&self) -> &Arc<RecordType> {
        &self.child_type
    }

    pub fn members(&self) -> &[Arc<Record>] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Arc<Record>> {
        self.members.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.members.iter()
    }

    /// Current value of each index field.
    pub fn index_values(&self) -> Result<ParamMap> {
        self.indexes
            .iter()
            .map(|name| Ok((name.clone(), self.set.get(name)?.clone())))
            .collect()
    }

    /// Whether every criterion naming an index field matches this
    /// collection's value for it.
    ///
    /// Criteria naming other keys are skipped when `ignore_missing` is set and
    /// rejected with [`ClassworkError::UnknownIndex`] otherwise.
    pub fn matches(&self, criteria: &ParamMap, ignore_missing: bool) -> Result<bool> {
        if !ignore_missing {
            let missing: Vec<String> = criteria
                .keys()
                .filter(|key| !self.is_index(key))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(ClassworkError::UnknownIndex {
                    type_tag: self.set.type_tag().to_string(),
                    names: missing,
                });
            }
        }

        for (key, wanted) in criteria {
            if self.is_index(key) && !keymatch(wanted, self.set.get(key)?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// A new collection with `member` appended.
    pub fn with_member(&self, member: impl Into<Arc<Record>>) -> Result<Self> {
        let member = check_members(&self.child_type, vec![member.into()])?;
        let members: Vec<Arc<Record>> = self.members.iter().cloned().chain(member).collect();
        Ok(Self {
            members: members.into(),
            ..self.clone()
        })
    }

    /// A new collection keeping only the members `keep` accepts.
    pub fn filter(&self, keep: impl Fn(&Record) -> bool) -> Self {
        let members: Vec<Arc<Record>> = self
            .members
            .iter()
            .filter(|m| keep(m))
            .cloned()
            .collect();
        Self {
            members: members.into(),
            ..self.clone()
        }
    }

    fn is_index(&self, key: &str) -> bool {
        self.indexes.iter().any(|index| index == key)
    }

    /// The set record's envelope with member envelopes under `collection`.
    pub fn to_envelope(&self, include_defaults: bool, include_hidden: bool) -> Result<Envelope> {
        let mut envelope = self.set.to_envelope(include_defaults, include_hidden)?;
        let members = self
            .members
            .iter()
            .map(|m| Ok(serde_json::to_value(m.to_envelope(include_defaults, include_hidden)?)?))
            .collect::<Result<Vec<_>>>()?;
        envelope
            .payload
            .insert(MEMBERS_KEY.to_string(), serde_json::Value::Array(members));
        Ok(envelope)
    }

    pub fn to_json_str(
        &self,
        include_defaults: bool,
        include_hidden: bool,
        options: &EncodeOptions,
    ) -> Result<String> {
        let json = serde_json::to_value(self.to_envelope(include_defaults, include_hidden)?)?;
        let mut buf = Vec::new();
        codec::write_json(&mut buf, &json, options)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Decode a collection: the set record against `set_base`, each member
    /// against `child_type`.
    pub fn decode(
        registry: &TypeRegistry,
        set_base: &Arc<RecordType>,
        child_type: &Arc<RecordType>,
        path: Option<&Path>,
        json: Option<&str>,
    ) -> Result<Self> {
        let text = codec::read_input(set_base.name(), path, json)?;
        let mut json: serde_json::Value = serde_json::from_str(&text)?;

        let raw_members = json
            .get_mut(PAYLOAD_KEY)
            .and_then(serde_json::Value::as_object_mut)
            .and_then(|payload| payload.shift_remove(MEMBERS_KEY))
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
        let serde_json::Value::Array(raw_members) = raw_members else {
            return Err(ClassworkError::InvalidEnvelope(format!(
                "{MEMBERS_KEY} must be a list"
            )));
        };

        let set = registry.construct(set_base, codec::envelope_params(registry, json)?)?;
        let members = raw_members
            .into_iter()
            .map(|raw| {
                let envelope = codec::envelope_params(registry, raw)?;
                Ok(Arc::new(registry.construct(child_type, envelope)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(set, child_type, members)
    }

    /// [`Collection::decode`] against the process-wide registry.
    pub fn from_json(
        set_base: &Arc<RecordType>,
        child_type: &Arc<RecordType>,
        path: Option<&Path>,
        json: Option<&str>,
    ) -> Result<Self> {
        registry::with_global(|reg| Self::decode(reg, set_base, child_type, path, json))
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index: Vec<String> = self
            .indexes
            .iter()
            .map(|name| match self.set.get(name) {
                Ok(value) => format!("{name}: {value:?}"),
                Err(_) => format!("{name}: ?"),
            })
            .collect();

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for member in self.members.iter() {
            *counts.entry(member.type_tag()).or_default() += 1;
        }
        let counts: Vec<String> = counts.iter().map(|(k, n)| format!("{k}: {n}")).collect();

        write!(
            f,
            "<{}> {{{}}} - {{{}}}",
            self.set.type_tag(),
            index.join(", "),
            counts.join(", ")
        )
    }
}

/// Return the subset of `collections` matching `criteria`, in order.
pub fn select<'a>(
    collections: &'a [Collection],
    criteria: &ParamMap,
    ignore_missing: bool,
) -> Result<Vec<&'a Collection>> {
    let mut selected = Vec::new();
    for collection in collections {
        if collection.matches(criteria, ignore_missing)? {
            selected.push(collection);
        }
    }
    Ok(selected)
}

fn read_indexes(set: &Record) -> Result<Vec<String>> {
    let invalid = |reason: String| ClassworkError::InvalidSchema {
        identity: set.type_tag().to_string(),
        reason,
    };

    let Ok(Value::List(items)) = set.get(INDEXES_FIELD) else {
        return Err(invalid(format!("{INDEXES_FIELD} must be a list of field names")));
    };

    items
        .iter()
        .map(|item| match item {
            Value::Text(name) if set.record_type().declares(name) => Ok(name.clone()),
            Value::Text(name) => Err(invalid(format!("index {name} is not a declared field"))),
            other => Err(invalid(format!("index names must be text, found {}", other.kind()))),
        })
        .collect()
}

fn check_members(child_type: &RecordType, members: Vec<Arc<Record>>) -> Result<Vec<Arc<Record>>> {
    let mut offending: Vec<String> = members
        .iter()
        .filter(|m| !m.record_type().is_a(child_type))
        .map(|m| m.type_tag().to_string())
        .collect();

    if !offending.is_empty() {
        offending.sort();
        offending.dedup();
        return Err(ClassworkError::TypeMismatch {
            expected: child_type.identity().to_string(),
            found: offending,
        });
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Range;
    use chrono::NaiveDate;

    struct Types {
        base: Arc<RecordType>,
        child: Arc<RecordType>,
        other: Arc<RecordType>,
    }

    fn types() -> Types {
        let base = RecordType::builder("tests.collection.Param")
            .field("v", 0)
            .build()
            .unwrap();
        let child = RecordType::builder("tests.collection.Special")
            .extends(&base)
            .build()
            .unwrap();
        let other = RecordType::builder("tests.collection.Other")
            .field("v", 0)
            .build()
            .unwrap();
        Types { base, child, other }
    }

    fn day(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn criteria(entries: &[(&str, Value)]) -> ParamMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn sample() -> Collection {
        let t = types();
        Collection::param_set(
            &t.base,
            vec![Record::new(&t.base), Record::new(&t.child)],
            vec!["low", "high"],
            "uk",
            day(2021, 1, 1),
        )
        .unwrap()
    }

    #[test]
    fn accepts_subtypes_of_child_type() {
        let set = sample();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1).unwrap().type_tag(), "tests.collection.Special");
    }

    #[test]
    fn rejects_foreign_members() {
        let t = types();
        let err = Collection::param_set(
            &t.base,
            vec![
                Record::new(&t.base),
                Record::new(&t.other),
                Record::new(&t.other),
            ],
            Value::Unset,
            Value::Unset,
            Value::Unset,
        )
        .unwrap_err();

        match err {
            ClassworkError::TypeMismatch { expected, found } => {
                assert_eq!(expected, "tests.collection.Param");
                assert_eq!(found, vec!["tests.collection.Other"]);
            }
            other => panic!("Expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn keyed_members_keep_value_order() {
        let t = types();
        let mut a = Record::new(&t.base);
        a.set("v", 1);
        let mut b = Record::new(&t.base);
        b.set("v", 2);
        let mut keyed = IndexMap::new();
        keyed.insert("second".to_string(), b);
        keyed.insert("first".to_string(), a);

        let set = Collection::param_set(&t.base, keyed, Value::Unset, Value::Unset, Value::Unset)
            .unwrap();
        let values: Vec<_> = set.iter().map(|m| m.get("v").unwrap().clone()).collect();
        assert_eq!(values, vec![Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn single_record_is_a_singleton() {
        let t = types();
        let set = Collection::param_set(
            &t.base,
            Record::new(&t.child),
            Value::Unset,
            Value::Unset,
            Value::Unset,
        )
        .unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn matches_conjunction_of_index_criteria() {
        let set = sample();
        assert!(set
            .matches(&criteria(&[("scen_keys", "high".into()), ("geo_keys", "uk".into())]), true)
            .unwrap());
        assert!(!set
            .matches(&criteria(&[("scen_keys", "high".into()), ("geo_keys", "fr".into())]), true)
            .unwrap());
    }

    #[test]
    fn matches_date_in_range() {
        let set = sample();
        let q = criteria(&[("date_key", Range::new(day(2020, 1, 1), day(2022, 1, 1)).into())]);
        assert!(set.matches(&q, true).unwrap());
        let q = criteria(&[("date_key", Range::new(day(2022, 1, 1), Value::Unset).into())]);
        assert!(!set.matches(&q, true).unwrap());
    }

    #[test]
    fn unset_index_matches_anything() {
        let t = types();
        let set = Collection::param_set(&t.base, Vec::<Record>::new(), Value::Unset, "uk", Value::Unset)
            .unwrap();
        assert!(set
            .matches(&criteria(&[("scen_keys", "whatever".into())]), true)
            .unwrap());
    }

    #[test]
    fn undeclared_criteria_ignored_or_rejected() {
        let set = sample();
        let q = criteria(&[("geo_keys", "uk".into()), ("colour", "red".into())]);

        assert!(set.matches(&q, true).unwrap());

        let err = set.matches(&q, false).unwrap_err();
        match err {
            ClassworkError::UnknownIndex { names, .. } => assert_eq!(names, vec!["colour"]),
            other => panic!("Expected UnknownIndex, got {other:?}"),
        }
    }

    #[test]
    fn indexes_field_itself_is_not_an_index() {
        let set = sample();
        let q = criteria(&[(INDEXES_FIELD, "x".into())]);
        assert!(set.matches(&q, false).is_err());
    }

    #[test]
    fn with_member_returns_new_collection() {
        let t = types();
        let set = sample();
        let bigger = set.with_member(Arc::new(Record::new(&t.child))).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(bigger.len(), 3);
        assert!(set.with_member(Arc::new(Record::new(&t.other))).is_err());
    }

    #[test]
    fn filter_returns_new_collection() {
        let set = sample();
        let specials = set.filter(|m| m.type_tag() == "tests.collection.Special");
        assert_eq!(specials.len(), 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn set_type_must_declare_indexes() {
        let t = types();
        let bare = RecordType::builder("tests.collection.Bare")
            .field("k", 1)
            .build()
            .unwrap();
        let err = Collection::new(Record::new(&bare), &t.base, Vec::<Record>::new()).unwrap_err();
        assert!(matches!(err, ClassworkError::InvalidSchema { .. }));

        let dangling = RecordType::builder("tests.collection.Dangling")
            .field(INDEXES_FIELD, vec!["missing"])
            .build()
            .unwrap();
        let err = Collection::new(Record::new(&dangling), &t.base, Vec::<Record>::new()).unwrap_err();
        assert!(matches!(err, ClassworkError::InvalidSchema { .. }));
    }

    #[test]
    fn select_keeps_matching_collections_in_order() {
        let t = types();
        let build = |scen: &str, geo: &str| {
            Collection::param_set(&t.base, Vec::<Record>::new(), vec![scen], geo, Value::Unset).unwrap()
        };
        let sets = vec![build("a", "uk"), build("b", "uk"), build("a", "fr")];

        let picked = select(&sets, &criteria(&[("scen_keys", "a".into())]), true).unwrap();
        let geos: Vec<_> = picked
            .iter()
            .map(|s| s.set_record().get("geo_keys").unwrap().clone())
            .collect();
        assert_eq!(geos, vec![Value::from("uk"), Value::from("fr")]);
    }

    #[test]
    fn display_summarises_indexes_and_member_types() {
        let set = sample();
        let shown = set.to_string();
        assert!(shown.starts_with("<classwork.ParamSet> {scen_keys: "));
        assert!(shown.ends_with("- {tests.collection.Param: 1, tests.collection.Special: 1}"));
    }

    #[test]
    fn index_values_follow_declaration() {
        let set = sample();
        let values = set.index_values().unwrap();
        let keys: Vec<_> = values.keys().cloned().collect();
        assert_eq!(keys, PARAM_SET_INDEXES.to_vec());
        assert_eq!(values["geo_keys"], Value::from("uk"));
    }

    #[test]
    fn collection_round_trips_through_registry() {
        let t = types();
        let set_type = param_set_type().unwrap();
        let mut registry = TypeRegistry::new();
        registry.register(Arc::clone(&set_type));
        registry.register(Arc::clone(&t.base));
        registry.register(Arc::clone(&t.child));

        let set = sample();
        let text = set
            .to_json_str(false, false, &EncodeOptions::default())
            .unwrap();
        let decoded = Collection::decode(&registry, &set_type, &t.base, None, Some(text.as_str())).unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.get(1).unwrap().type_tag(), "tests.collection.Special");
        assert_eq!(decoded.index_values().unwrap(), set.index_values().unwrap());
    }
}
