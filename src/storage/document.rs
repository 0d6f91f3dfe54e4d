//! Document representation
//!
//! A Document is an ordered mapping of field names to dynamically typed
//! [`Value`]s. The identifier lives in the `_id` field, as in the literal
//! syntax callers write.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Name of the identifier field
pub const ID_FIELD: &str = "_id";

/// Field values that can be stored in a document
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Object(Fields),
}

/// A map of field names to values, in insertion order
pub type Fields = IndexMap<String, Value>;

impl Value {
    /// Parse a shell-style literal, e.g. `{precio: {$gt: 10000}}`
    pub fn parse(text: &str) -> Result<Self> {
        Ok(dql::parse(text)?.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of an integer or floating value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Fields> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Runtime type name, using the descriptor vocabulary
    ///
    /// Integers that fit in 32 bits report `int`, wider ones `long`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(i) if i32::try_from(*i).is_ok() => "int",
            Value::Int(_) => "long",
            Value::Float(_) => "double",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Order two values of the same comparable kind
    ///
    /// Numbers compare across int/double, strings lexically, dates
    /// chronologically and booleans false-first. Every other pairing is
    /// not order-comparable and yields `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Render as plain JSON, dates as `{"$date": "<rfc3339>"}`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::json!({ "$date": format_date(d) }),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Deep, type-sensitive equality
///
/// `7500` never equals `"7500"`; an int and a double holding the same number
/// are equal. Object equality ignores key order.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64() == b.as_f64(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Strict structural equality: type tags and object field order must
    /// match, so `20` and `20.0` differ
    pub fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.identical(y))
            }
            (Value::Object(a), Value::Object(b)) => fields_identical(a, b),
            (Value::Int(_) | Value::Float(_), _) | (_, Value::Int(_) | Value::Float(_)) => false,
            (a, b) => a == b,
        }
    }
}

fn fields_identical(a: &Fields, b: &Fields) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|((ka, va), (kb, vb))| ka == kb && va.identical(vb))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$date", &format_date(d))?;
                map.end()
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Value::Object(fields)
    }
}

impl From<dql::Literal> for Value {
    fn from(lit: dql::Literal) -> Self {
        match lit {
            dql::Literal::Null => Value::Null,
            dql::Literal::Bool(b) => Value::Bool(b),
            dql::Literal::Int(i) => Value::Int(i),
            dql::Literal::Float(f) => Value::Float(f),
            dql::Literal::String(s) => Value::String(s),
            dql::Literal::Date(d) => Value::Date(d),
            // Regex literals travel as operator objects so filters see one shape
            dql::Literal::Regex { pattern, flags } => {
                let mut fields = Fields::new();
                fields.insert("$regex".to_string(), Value::String(pattern));
                if !flags.is_empty() {
                    fields.insert("$options".to_string(), Value::String(flags));
                }
                Value::Object(fields)
            }
            dql::Literal::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            dql::Literal::Object(entries) => {
                Value::Object(entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(date) = map
                        .get("$date")
                        .and_then(|d| d.as_str())
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    {
                        return Value::Date(date.with_timezone(&Utc));
                    }
                }
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// =============================================================================
// Field paths
// =============================================================================

/// A dotted path addressing a (possibly nested) field, e.g. `proveedor.nombre`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(Error::InvalidQuery {
                message: format!("invalid field path '{}'", path),
            });
        }
        Ok(Self {
            segments: path.split('.').map(String::from).collect(),
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment (the top-level field name)
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    pub fn is_id(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == ID_FIELD
    }

    /// True if `self` equals `other` or one is a prefix of the other
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a == b)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a document within a collection
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentId(Value);

impl DocumentId {
    /// A fresh random identifier
    pub fn generate() -> Self {
        Self(Value::String(Uuid::new_v4().to_string()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other),
        }
    }
}

impl From<Value> for DocumentId {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(Value::from(s))
    }
}

impl From<i64> for DocumentId {
    fn from(i: i64) -> Self {
        Self(Value::Int(i))
    }
}

// =============================================================================
// Documents
// =============================================================================

/// A document in a collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub fields: Fields,
}

impl Document {
    /// Create an empty document (`_id` is assigned on insert)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document with a caller-chosen identifier
    pub fn with_id(id: impl Into<DocumentId>) -> Self {
        let mut doc = Self::new();
        doc.fields.insert(ID_FIELD.to_string(), id.into().into_value());
        doc
    }

    /// Parse a shell-style object literal
    pub fn parse(text: &str) -> Result<Self> {
        let entries = dql::parse_object(text)?;
        Ok(Self {
            fields: entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        })
    }

    /// Parse a JSON object, reading `{"$date": ...}` wrappers back as dates
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Self::try_from(Value::from(json))
    }

    /// The document identifier, if assigned
    pub fn id(&self) -> Option<DocumentId> {
        self.fields.get(ID_FIELD).cloned().map(DocumentId::from)
    }

    /// The document identifier, generating one as the first field if absent
    pub fn ensure_id(&mut self) -> DocumentId {
        if let Some(id) = self.id() {
            return id;
        }
        let id = DocumentId::generate();
        self.fields.shift_insert(0, ID_FIELD.to_string(), id.as_value().clone());
        id
    }

    /// Set a top-level field value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Get a top-level field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Resolve a dotted path; a missing segment yields `None`
    ///
    /// Numeric segments index into arrays.
    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.fields.get(first)?;
        for segment in rest {
            current = match current {
                Value::Object(fields) => fields.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable access to the slot at `path`, creating intermediate objects
    fn slot_mut(&mut self, path: &FieldPath) -> Result<&mut Value> {
        let (first, rest) = path
            .segments()
            .split_first()
            .ok_or_else(|| Error::InvalidQuery { message: "empty field path".into() })?;
        let mut current = self.fields.entry(first.clone()).or_insert(Value::Null);
        for segment in rest {
            if current.is_null() {
                *current = Value::Object(Fields::new());
            }
            current = match current {
                Value::Object(fields) => fields.entry(segment.clone()).or_insert(Value::Null),
                Value::Array(items) => {
                    let index = segment.parse::<usize>().ok().filter(|i| *i < items.len());
                    match index {
                        Some(i) => &mut items[i],
                        None => {
                            return Err(Error::TypeMismatch {
                                field: path.to_string(),
                                expected: "array index in bounds".into(),
                                actual: segment.clone(),
                            })
                        }
                    }
                }
                other => {
                    return Err(Error::TypeMismatch {
                        field: path.to_string(),
                        expected: "object".into(),
                        actual: other.type_name().into(),
                    })
                }
            };
        }
        Ok(current)
    }

    /// Write `value` at a dotted path
    pub fn set_path(&mut self, path: &FieldPath, value: Value) -> Result<()> {
        *self.slot_mut(path)? = value;
        Ok(())
    }

    /// Remove the value at a dotted path, returning it if present
    pub fn remove_path(&mut self, path: &FieldPath) -> Option<Value> {
        let (last, parents) = path.segments().split_last()?;
        if parents.is_empty() {
            return self.fields.shift_remove(last);
        }
        let mut current = self.fields.get_mut(&parents[0])?;
        for segment in &parents[1..] {
            current = match current {
                Value::Object(fields) => fields.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        match current {
            Value::Object(fields) => fields.shift_remove(last),
            _ => None,
        }
    }

    /// Current numeric value at `path` plus `amount`, for `$inc`
    ///
    /// An absent field starts from `amount`; a stored `null` is not a number.
    pub(crate) fn increment_path(&mut self, path: &FieldPath, amount: &Value) -> Result<()> {
        if self.get_path(path).is_none() {
            return self.set_path(path, amount.clone());
        }
        let slot = self.slot_mut(path)?;
        let next = match (&*slot, amount) {
            (Value::Int(a), Value::Int(b)) => match a.checked_add(*b) {
                Some(sum) => Value::Int(sum),
                None => Value::Float(*a as f64 + *b as f64),
            },
            (a, b) if a.is_numeric() && b.is_numeric() => {
                Value::Float(a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default())
            }
            (other, _) => {
                return Err(Error::TypeMismatch {
                    field: path.to_string(),
                    expected: "number".into(),
                    actual: other.type_name().into(),
                })
            }
        };
        *slot = next;
        Ok(())
    }

    /// Field-for-field identical, in the same order and with the same types
    pub fn identical(&self, other: &Document) -> bool {
        fields_identical(&self.fields, &other.fields)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl TryFrom<Value> for Document {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::InvalidQuery {
                message: format!("expected a document, found {}", other.type_name()),
            }),
        }
    }
}

impl From<Fields> for Document {
    fn from(fields: Fields) -> Self {
        Self { fields }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
