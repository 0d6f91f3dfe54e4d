//! Schema descriptors for docbase
//!
//! A schema is a constraint tree:
//! - Each node carries an allowed type set and an ordered list of constraints
//! - Leaf constraints: pattern, length and numeric bounds, enum
//! - Composite constraints: array item schema, object properties
//!
//! Descriptors are usually compiled from `$jsonSchema`-shaped data:
//!
//! ```text
//! {
//!   bsonType: "object",
//!   required: ["sku", "precio"],
//!   properties: {
//!     sku: { bsonType: "string", pattern: "^P\\d{3,5}$" },
//!     precio: { bsonType: ["int", "long", "double"], minimum: 0 }
//!   },
//!   additionalProperties: true
//! }
//! ```

mod validator;

pub use validator::{validate, ValidationError};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::storage::document::{Document, Value};

/// A field type in the schema
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    /// Integer that fits in 32 bits
    Int,
    /// Any integer
    Long,
    Double,
    Decimal,
    /// Any numeric value
    Number,
    Bool,
    Date,
    Array,
    Object,
    Null,
}

impl FieldType {
    /// Resolve a descriptor type name (`bsonType` or JSON Schema `type` vocabulary)
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => Self::String,
            "int" => Self::Int,
            "long" | "integer" => Self::Long,
            "double" => Self::Double,
            "decimal" => Self::Decimal,
            "number" => Self::Number,
            "bool" | "boolean" => Self::Bool,
            "date" => Self::Date,
            "array" => Self::Array,
            "object" => Self::Object,
            "null" => Self::Null,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }

    /// Check the runtime type of a value; no coercion is applied
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::Int, Value::Int(i)) => i32::try_from(*i).is_ok(),
            (Self::Long, Value::Int(_)) => true,
            (Self::Double | Self::Decimal, Value::Float(_)) => true,
            (Self::Number, v) => v.is_numeric(),
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::Object, Value::Object(_)) => true,
            (Self::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A compiled regular expression constraint
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: regex::Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self> {
        let regex = regex::Regex::new(source).map_err(|e| Error::InvalidSchema {
            message: format!("invalid pattern '{}': {}", source, e),
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// A numeric bound
#[derive(Debug, Clone)]
pub struct Bound {
    pub value: Value,
    pub exclusive: bool,
}

/// A single constraint on a value
#[derive(Debug, Clone)]
pub enum Constraint {
    Pattern(Pattern),
    MinLength(usize),
    MaxLength(usize),
    Minimum(Bound),
    Maximum(Bound),
    MinItems(usize),
    MaxItems(usize),
    Enum(Vec<Value>),
    Items(Box<Schema>),
    UniqueItems,
    Properties(ObjectSchema),
}

impl Constraint {
    /// Evaluation stage; constraints are checked in ascending stage order
    fn stage(&self) -> u8 {
        match self {
            Constraint::Pattern(_) => 0,
            Constraint::MinLength(_)
            | Constraint::MaxLength(_)
            | Constraint::Minimum(_)
            | Constraint::Maximum(_)
            | Constraint::MinItems(_)
            | Constraint::MaxItems(_) => 1,
            Constraint::Enum(_) => 2,
            Constraint::Items(_) | Constraint::UniqueItems => 3,
            Constraint::Properties(_) => 4,
        }
    }
}

/// Property declarations of an object node
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    pub required: Vec<String>,
    pub properties: IndexMap<String, Schema>,
    /// `false` closes the object: undeclared fields are rejected
    pub additional_properties: bool,
}

impl ObjectSchema {
    /// An open object with no declared properties
    pub fn new() -> Self {
        Self {
            required: Vec::new(),
            properties: IndexMap::new(),
            additional_properties: true,
        }
    }

    pub fn required<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Reject fields not declared under `properties`
    pub fn closed(mut self) -> Self {
        self.additional_properties = false;
        self
    }
}

/// A schema node
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Allowed runtime types; `None` accepts any type
    pub types: Option<Vec<FieldType>>,
    /// Constraints, kept in evaluation order
    constraints: Vec<Constraint>,
    pub description: Option<String>,
}

impl Schema {
    /// A node accepting any value
    pub fn any() -> Self {
        Self::default()
    }

    /// A node accepting the given types
    pub fn typed(types: impl IntoIterator<Item = FieldType>) -> Self {
        Self {
            types: Some(types.into_iter().collect()),
            ..Self::default()
        }
    }

    /// An object node with the given properties
    pub fn object(object: ObjectSchema) -> Self {
        Self::typed([FieldType::Object]).with(Constraint::Properties(object))
    }

    /// Add a constraint, keeping evaluation order
    pub fn with(mut self, constraint: Constraint) -> Self {
        let stage = constraint.stage();
        let pos = self
            .constraints
            .iter()
            .position(|c| c.stage() > stage)
            .unwrap_or(self.constraints.len());
        self.constraints.insert(pos, constraint);
        self
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// The object declarations of this node, if any
    pub fn object_schema(&self) -> Option<&ObjectSchema> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Properties(object) => Some(object),
            _ => None,
        })
    }

    /// Validate a document against this schema
    pub fn validate(&self, doc: &Document) -> std::result::Result<(), ValidationError> {
        validate(doc, self)
    }

    /// Parse a shell-style descriptor literal
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_value(&Value::parse(text)?)
    }

    /// Compile a `$jsonSchema`-shaped descriptor
    pub fn from_value(descriptor: &Value) -> Result<Self> {
        let fields = descriptor.as_object().ok_or_else(|| invalid(format!(
            "schema descriptor must be an object, found {}",
            descriptor.type_name()
        )))?;

        let mut schema = Schema::any();
        let mut object: Option<ObjectSchema> = None;
        let mut exclusive_min = false;
        let mut exclusive_max = false;

        for (keyword, arg) in fields {
            match keyword.as_str() {
                "bsonType" | "type" => schema.types = Some(parse_types(arg)?),
                "description" | "title" => schema.description = arg.as_str().map(String::from),
                "pattern" => {
                    let source = arg.as_str().ok_or_else(|| invalid("pattern must be a string"))?;
                    schema = schema.with(Constraint::Pattern(Pattern::new(source)?));
                }
                "minLength" => schema = schema.with(Constraint::MinLength(parse_count(keyword, arg)?)),
                "maxLength" => schema = schema.with(Constraint::MaxLength(parse_count(keyword, arg)?)),
                "minItems" => schema = schema.with(Constraint::MinItems(parse_count(keyword, arg)?)),
                "maxItems" => schema = schema.with(Constraint::MaxItems(parse_count(keyword, arg)?)),
                "minimum" => schema = schema.with(Constraint::Minimum(parse_bound(keyword, arg)?)),
                "maximum" => schema = schema.with(Constraint::Maximum(parse_bound(keyword, arg)?)),
                "exclusiveMinimum" => exclusive_min = parse_flag(keyword, arg)?,
                "exclusiveMaximum" => exclusive_max = parse_flag(keyword, arg)?,
                "enum" => {
                    let values = arg.as_array().ok_or_else(|| invalid("enum must be an array"))?;
                    schema = schema.with(Constraint::Enum(values.clone()));
                }
                "items" => schema = schema.with(Constraint::Items(Box::new(Schema::from_value(arg)?))),
                "uniqueItems" => {
                    if parse_flag(keyword, arg)? {
                        schema = schema.with(Constraint::UniqueItems);
                    }
                }
                "required" => {
                    let names = arg
                        .as_array()
                        .and_then(|items| {
                            items
                                .iter()
                                .map(|v| v.as_str().map(String::from))
                                .collect::<Option<Vec<_>>>()
                        })
                        .ok_or_else(|| invalid("required must be an array of field names"))?;
                    object.get_or_insert_with(ObjectSchema::new).required = names;
                }
                "properties" => {
                    let props = arg.as_object().ok_or_else(|| invalid("properties must be an object"))?;
                    let object = object.get_or_insert_with(ObjectSchema::new);
                    for (name, sub) in props {
                        object.properties.insert(name.clone(), Schema::from_value(sub)?);
                    }
                }
                "additionalProperties" => {
                    let allowed = parse_flag(keyword, arg)?;
                    object.get_or_insert_with(ObjectSchema::new).additional_properties = allowed;
                }
                other => return Err(invalid(format!("unsupported keyword '{}'", other))),
            }
        }

        for constraint in &mut schema.constraints {
            match constraint {
                Constraint::Minimum(bound) => bound.exclusive = exclusive_min,
                Constraint::Maximum(bound) => bound.exclusive = exclusive_max,
                _ => {}
            }
        }

        if let Some(object) = object {
            schema = schema.with(Constraint::Properties(object));
        }

        Ok(schema)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidSchema {
        message: message.into(),
    }
}

fn parse_types(arg: &Value) -> Result<Vec<FieldType>> {
    let names: Vec<&str> = match arg {
        Value::String(name) => vec![name.as_str()],
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().ok_or_else(|| invalid("type names must be strings")))
            .collect::<Result<_>>()?,
        _ => return Err(invalid("bsonType must be a string or an array of strings")),
    };
    names
        .into_iter()
        .map(|name| FieldType::from_name(name).ok_or_else(|| invalid(format!("unknown type '{}'", name))))
        .collect()
}

fn parse_count(keyword: &str, arg: &Value) -> Result<usize> {
    arg.as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(format!("{} must be a non-negative integer", keyword)))
}

fn parse_bound(keyword: &str, arg: &Value) -> Result<Bound> {
    if !arg.is_numeric() {
        return Err(invalid(format!("{} must be a number", keyword)));
    }
    Ok(Bound {
        value: arg.clone(),
        exclusive: false,
    })
}

fn parse_flag(keyword: &str, arg: &Value) -> Result<bool> {
    arg.as_bool()
        .ok_or_else(|| invalid(format!("{} must be a boolean", keyword)))
}
