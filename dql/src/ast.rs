//! Literal tree produced by the DQL parser

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A parsed literal value
///
/// Objects keep their keys in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// `ISODate("...")`, `new Date("...")` or `new Date()`
    Date(DateTime<Utc>),
    /// `/pattern/flags`
    Regex { pattern: String, flags: String },
    Array(Vec<Literal>),
    Object(Vec<(String, Literal)>),
}

impl Literal {
    /// Look up a key of an object literal
    pub fn get(&self, key: &str) -> Option<&Literal> {
        match self {
            Literal::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Literal)]> {
        match self {
            Literal::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Literal]> {
        match self {
            Literal::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Short type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "double",
            Literal::String(_) => "string",
            Literal::Date(_) => "date",
            Literal::Regex { .. } => "regex",
            Literal::Array(_) => "array",
            Literal::Object(_) => "object",
        }
    }
}
