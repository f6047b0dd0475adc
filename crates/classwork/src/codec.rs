//! # Envelope Codec
//!
//! Records travel as JSON envelopes that carry their concrete type:
//!
//! ```text
//! {"_cls": "app.params.Scenario", "_params": {"rate": 0.5, "label": "high"}}
//! ```
//!
//! Decoding parses the envelope and hands it to
//! [`TypeRegistry::construct`] against a base type, which picks the concrete
//! type from `_cls`.
//!
//! ## Value Wire Forms
//!
//! | Value | JSON |
//! |-------|------|
//! | `Unset` | `null` |
//! | `Bool`, `Int`, `Float`, `Text` | native |
//! | `Date` | `{"$date": "2021-03-01"}` |
//! | `Enumerant` | `{"$enum": ["Geography", "Region"]}` |
//! | `Range` | `{"$range": [start, stop]}` |
//! | `List` | array |
//! | `Map` | object, or `{"$map": {...}}` when a key is a marker |
//! | `Record` | nested envelope |
//!
//! The markers are `_cls`, `$date`, `$enum`, `$range` and `$map`. A map using
//! any of them as a key is wrapped so it never reads back as something else.
//! The `_params` payload itself is always a plain object.
//!
//! Nested envelopes are resolved by exact identity or short name against
//! every registered type.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Number, Serializer};

use crate::error::{ClassworkError, Result};
use crate::record::Record;
use crate::registry::{self, TypeRegistry};
use crate::schema::{RecordType, PAYLOAD_KEY, TYPE_TAG_KEY};
use crate::value::{Enumerant, ParamMap, Range, Value};

const DATE_KEY: &str = "$date";
const ENUM_KEY: &str = "$enum";
const RANGE_KEY: &str = "$range";
const MAP_KEY: &str = "$map";
const MARKER_KEYS: [&str; 5] = [TYPE_TAG_KEY, DATE_KEY, ENUM_KEY, RANGE_KEY, MAP_KEY];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Formatting options for encoded text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Pretty-print with this many spaces per level; `None` is compact.
    pub indent: Option<usize>,
    /// Emit object keys in lexical order instead of declaration order.
    pub sort_keys: bool,
}

impl EncodeOptions {
    pub fn pretty(indent: usize) -> Self {
        Self {
            indent: Some(indent),
            ..Self::default()
        }
    }
}

/// The wire representation of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "_cls")]
    pub type_tag: String,
    #[serde(rename = "_params")]
    pub payload: Map<String, serde_json::Value>,
}

impl Record {
    pub fn to_envelope(&self, include_defaults: bool, include_hidden: bool) -> Result<Envelope> {
        let payload = self
            .project(include_defaults, include_hidden)
            .iter()
            .map(|(k, v)| Ok((k.clone(), to_json(v, include_defaults, include_hidden)?)))
            .collect::<Result<Map<_, _>>>()?;

        Ok(Envelope {
            type_tag: self.type_tag().to_string(),
            payload,
        })
    }

    pub fn to_json_str(
        &self,
        include_defaults: bool,
        include_hidden: bool,
        options: &EncodeOptions,
    ) -> Result<String> {
        let json = serde_json::to_value(self.to_envelope(include_defaults, include_hidden)?)?;
        let mut buf = Vec::new();
        write_json(&mut buf, &json, options)?;
        // serde_json only emits UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the envelope to `path`, creating or truncating it.
    pub fn to_json_file(
        &self,
        path: impl AsRef<Path>,
        include_defaults: bool,
        include_hidden: bool,
        options: &EncodeOptions,
    ) -> Result<PathBuf> {
        let path = path.as_ref();
        let json = serde_json::to_value(self.to_envelope(include_defaults, include_hidden)?)?;
        let mut writer = BufWriter::new(File::create(path)?);
        write_json(&mut writer, &json, options)?;
        writer.flush()?;
        Ok(path.to_path_buf())
    }

    /// Decode a record from a file or an inline string against `base`, using
    /// the process-wide registry. The path wins when both are given.
    pub fn from_json(
        base: &Arc<RecordType>,
        path: Option<&Path>,
        json: Option<&str>,
    ) -> Result<Record> {
        registry::with_global(|reg| decode(reg, base, path, json))
    }
}

/// Decode a record from a file or an inline string against `base`.
pub fn decode(
    registry: &TypeRegistry,
    base: &Arc<RecordType>,
    path: Option<&Path>,
    json: Option<&str>,
) -> Result<Record> {
    let text = read_input(base.name(), path, json)?;
    let envelope = parse_envelope(registry, &text)?;
    registry.construct(base, envelope)
}

pub(crate) fn read_input(caller: &str, path: Option<&Path>, json: Option<&str>) -> Result<String> {
    match (path, json) {
        (Some(path), _) => Ok(std::fs::read_to_string(path)?),
        (None, Some(json)) if !json.is_empty() => Ok(json.to_string()),
        (None, _) => Err(ClassworkError::MissingInput(format!("{caller}::from_json"))),
    }
}

/// Parse envelope text into a param map, keeping `_cls`/`_params` as entries.
pub(crate) fn parse_envelope(registry: &TypeRegistry, text: &str) -> Result<ParamMap> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    envelope_params(registry, json)
}

pub(crate) fn envelope_params(registry: &TypeRegistry, json: serde_json::Value) -> Result<ParamMap> {
    let serde_json::Value::Object(object) = json else {
        return Err(ClassworkError::InvalidEnvelope(
            "top level must be an object".to_string(),
        ));
    };

    object
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::Object(payload) if k == PAYLOAD_KEY => {
                    Value::Map(from_json_entries(registry, payload)?)
                }
                other => from_json(registry, other)?,
            };
            Ok((k, value))
        })
        .collect()
}

pub(crate) fn write_json<W: Write>(
    writer: W,
    json: &serde_json::Value,
    options: &EncodeOptions,
) -> Result<()> {
    let sorted;
    let json = if options.sort_keys {
        sorted = sort_keys(json.clone());
        &sorted
    } else {
        json
    };

    match options.indent {
        None => serde_json::to_writer(writer, json)?,
        Some(width) => {
            let indent = vec![b' '; width];
            let mut ser = Serializer::with_formatter(writer, PrettyFormatter::with_indent(&indent));
            json.serialize(&mut ser)?;
        }
    }
    Ok(())
}

fn sort_keys(json: serde_json::Value) -> serde_json::Value {
    match json {
        serde_json::Value::Object(object) => {
            let mut entries: Vec<_> = object.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

/// Encode a value; nested records use the same include flags.
pub(crate) fn to_json(
    value: &Value,
    include_defaults: bool,
    include_hidden: bool,
) -> Result<serde_json::Value> {
    let json = match value {
        Value::Unset => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| ClassworkError::InvalidValue(format!("non-finite float {f}")))?,
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => tagged(DATE_KEY, serde_json::Value::String(d.format(DATE_FORMAT).to_string())),
        Value::Enumerant(e) => tagged(
            ENUM_KEY,
            serde_json::Value::Array(vec![
                serde_json::Value::String(e.domain.clone()),
                serde_json::Value::String(e.member.clone()),
            ]),
        ),
        Value::Range(r) => tagged(
            RANGE_KEY,
            serde_json::Value::Array(vec![
                to_json(&r.start, include_defaults, include_hidden)?,
                to_json(&r.stop, include_defaults, include_hidden)?,
            ]),
        ),
        Value::List(items) => serde_json::Value::Array(
            items
                .iter()
                .map(|v| to_json(v, include_defaults, include_hidden))
                .collect::<Result<_>>()?,
        ),
        Value::Map(map) => {
            let object = serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), to_json(v, include_defaults, include_hidden)?)))
                    .collect::<Result<_>>()?,
            );
            if map.keys().any(|k| MARKER_KEYS.contains(&k.as_str())) {
                tagged(MAP_KEY, object)
            } else {
                object
            }
        }
        Value::Record(record) => {
            serde_json::to_value(record.to_envelope(include_defaults, include_hidden)?)?
        }
    };
    Ok(json)
}

fn tagged(key: &str, inner: serde_json::Value) -> serde_json::Value {
    let mut object = Map::new();
    object.insert(key.to_string(), inner);
    serde_json::Value::Object(object)
}

/// Decode a JSON value, rebuilding typed scalars and nested records.
pub(crate) fn from_json(registry: &TypeRegistry, json: serde_json::Value) -> Result<Value> {
    let value = match json {
        serde_json::Value::Null => Value::Unset,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => Value::List(
            items
                .into_iter()
                .map(|v| from_json(registry, v))
                .collect::<Result<_>>()?,
        ),
        serde_json::Value::Object(object) => return from_json_object(registry, object),
    };
    Ok(value)
}

fn from_json_object(
    registry: &TypeRegistry,
    mut object: Map<String, serde_json::Value>,
) -> Result<Value> {
    if object.len() == 1 && object.contains_key(MAP_KEY) {
        return match object.shift_remove(MAP_KEY) {
            Some(serde_json::Value::Object(entries)) => {
                Ok(Value::Map(from_json_entries(registry, entries)?))
            }
            _ => Err(ClassworkError::InvalidEnvelope(format!(
                "malformed {MAP_KEY} value"
            ))),
        };
    }

    if let Some(tag) = object.get(TYPE_TAG_KEY) {
        let Some(tag) = tag.as_str() else {
            return Err(ClassworkError::InvalidEnvelope(format!(
                "nested {TYPE_TAG_KEY} must be a string"
            )));
        };
        let ty = registry
            .get(tag)
            .cloned()
            .ok_or_else(|| ClassworkError::UnknownNestedClass {
                tag: tag.to_string(),
            })?;
        let envelope = envelope_params(registry, serde_json::Value::Object(object))?;
        return Ok(Value::Record(Box::new(registry.construct(&ty, envelope)?)));
    }

    if object.len() == 1 {
        if let Some(typed) = from_typed_scalar(registry, &object)? {
            return Ok(typed);
        }
    }

    Ok(Value::Map(from_json_entries(registry, object)?))
}

/// Decode object entries as plain map entries, without marker handling at
/// this level.
fn from_json_entries(
    registry: &TypeRegistry,
    object: Map<String, serde_json::Value>,
) -> Result<ParamMap> {
    object
        .into_iter()
        .map(|(k, v)| Ok((k, from_json(registry, v)?)))
        .collect()
}

fn from_typed_scalar(
    registry: &TypeRegistry,
    object: &Map<String, serde_json::Value>,
) -> Result<Option<Value>> {
    let invalid = |what: &str| ClassworkError::InvalidEnvelope(format!("malformed {what} value"));

    if let Some(date) = object.get(DATE_KEY) {
        let date = date
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
            .ok_or_else(|| invalid(DATE_KEY))?;
        return Ok(Some(Value::Date(date)));
    }

    if let Some(enumerant) = object.get(ENUM_KEY) {
        let Some([serde_json::Value::String(domain), serde_json::Value::String(member)]) =
            enumerant.as_array().map(Vec::as_slice)
        else {
            return Err(invalid(ENUM_KEY));
        };
        return Ok(Some(Value::Enumerant(Enumerant::new(
            domain.as_str(),
            member.as_str(),
        ))));
    }

    if let Some(bounds) = object.get(RANGE_KEY) {
        let [start, stop] = bounds
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| invalid(RANGE_KEY))?
        else {
            return Err(invalid(RANGE_KEY));
        };
        return Ok(Some(Value::Range(Range::new(
            from_json(registry, start.clone())?,
            from_json(registry, stop.clone())?,
        ))));
    }

    Ok(None)
}
