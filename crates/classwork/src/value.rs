//! Attribute value types.
//!
//! This module defines the runtime representation of everything a record can
//! hold: scalars, half-open ranges, collections and nested records.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::record::Record;

/// Insertion-ordered parameter map used for params, projections and payloads.
pub type ParamMap = IndexMap<String, Value>;

/// A closed, per-domain enumeration that can be stored in a record.
///
/// ```ignore
/// enum Geography { Nation, Region }
///
/// impl Enumerated for Geography {
///     const DOMAIN: &'static str = "Geography";
///     fn member(&self) -> &'static str {
///         match self {
///             Geography::Nation => "Nation",
///             Geography::Region => "Region",
///         }
///     }
/// }
/// ```
pub trait Enumerated {
    const DOMAIN: &'static str;

    fn member(&self) -> &'static str;
}

/// A member of a closed enumeration, detached from its Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Enumerant {
    pub domain: String,
    pub member: String,
}

impl Enumerant {
    pub fn new(domain: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            member: member.into(),
        }
    }

    pub fn of<E: Enumerated>(value: &E) -> Self {
        Self::new(E::DOMAIN, value.member())
    }
}

impl fmt::Display for Enumerant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.member)
    }
}

/// Half-open interval `[start, stop)`.
///
/// An `Unset` bound leaves that side of the interval open.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub start: Box<Value>,
    pub stop: Box<Value>,
}

impl Range {
    pub fn new(start: impl Into<Value>, stop: impl Into<Value>) -> Self {
        Self {
            start: Box::new(start.into()),
            stop: Box::new(stop.into()),
        }
    }

    /// Check whether a scalar lies inside the interval.
    ///
    /// Non-scalars and scalars that cannot be ordered against the bounds
    /// (e.g. text against a numeric range) are never contained.
    pub fn contains(&self, value: &Value) -> bool {
        if !value.is_scalar() {
            return false;
        }

        let above_start = match self.start.as_ref() {
            Value::Unset => true,
            start => matches!(
                start.scalar_cmp(value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        };
        let below_stop = match self.stop.as_ref() {
            Value::Unset => true,
            stop => matches!(value.scalar_cmp(stop), Some(Ordering::Less)),
        };

        above_start && below_stop
    }
}

/// Runtime representation of an attribute value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The explicit unset marker. Matches anything during key matching.
    #[default]
    Unset,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Enumerant(Enumerant),
    Range(Range),
    List(Vec<Value>),
    Map(ParamMap),
    Record(Box<Record>),
}

impl Value {
    pub fn enumerant<E: Enumerated>(value: &E) -> Self {
        Value::Enumerant(Enumerant::of(value))
    }

    /// Short name of the value's shape, used in diagnostics and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unset => "unset",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Enumerant(_) => "enumerant",
            Value::Range(_) => "range",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_)
                | Value::Int(_)
                | Value::Float(_)
                | Value::Text(_)
                | Value::Date(_)
                | Value::Enumerant(_)
        )
    }

    /// Lists and maps; the values a scalar can be looked up in.
    pub fn is_collection(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    /// Equality that treats `Int` and `Float` as one numeric domain.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self == other,
        }
    }

    /// Ordering between scalars of a comparable kind.
    pub fn scalar_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of `Int` and `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ParamMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Enumerant> for Value {
    fn from(v: Enumerant) -> Self {
        Value::Enumerant(v)
    }
}

impl From<Range> for Value {
    fn from(v: Range) -> Self {
        Value::Range(v)
    }
}

impl From<ParamMap> for Value {
    fn from(v: ParamMap) -> Self {
        Value::Map(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(Box::new(v))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Unset, Into::into)
    }
}
