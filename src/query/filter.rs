//! Filter expressions
//!
//! A filter is compiled once from its literal form into a flat list of
//! predicates, each a (field path, condition) pair. Predicates are ANDed.
//!
//! ```text
//! { precio: { $gt: 10000 }, categoria: "Herramientas", nombre: /^m/i }
//!   ──► [ precio   Gt(10000)
//!         categoria Eq("Herramientas")
//!         nombre   Regex(^m, i) ]
//! ```

use std::cmp::Ordering;
use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};
use crate::storage::document::{Document, FieldPath, Fields, Value};

/// A conjunction of field predicates; the empty filter matches everything
#[derive(Debug, Clone, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

/// A condition on one field path
#[derive(Debug, Clone)]
pub struct Predicate {
    pub path: FieldPath,
    pub condition: Condition,
}

#[derive(Debug, Clone)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Regex(RegexMatcher),
    Exists(bool),
}

/// A compiled `$regex` with its `$options` flags
#[derive(Clone)]
pub struct RegexMatcher {
    source: String,
    flags: String,
    regex: Regex,
}

impl RegexMatcher {
    /// Compile a pattern with Mongo-style flags (`i`, `m`, `s`, `x`)
    pub fn new(source: &str, flags: &str) -> Result<Self> {
        let mut builder = RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    return Err(Error::InvalidQuery {
                        message: format!("unsupported regex option '{}'", other),
                    })
                }
            };
        }
        let regex = builder.build().map_err(|e| Error::InvalidQuery {
            message: format!("invalid regex /{}/: {}", source, e),
        })?;
        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl fmt::Debug for RegexMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl Filter {
    /// The empty filter
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a shell-style filter literal, e.g. `{precio: {$gt: 10000}}`
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_value(&Value::parse(text)?)
    }

    /// Compile a filter document
    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = value.as_object().ok_or_else(|| Error::InvalidQuery {
            message: format!("filter must be an object, found {}", value.type_name()),
        })?;

        let mut predicates = Vec::new();
        for (key, operand) in fields {
            if key.starts_with('$') {
                return Err(Error::InvalidQuery {
                    message: format!("unsupported top-level operator '{}'", key),
                });
            }
            let path = FieldPath::parse(key)?;
            match operand {
                Value::Object(ops) if is_operator_set(ops)? => {
                    compile_operators(&path, ops, &mut predicates)?
                }
                other => predicates.push(Predicate {
                    path,
                    condition: Condition::Eq(other.clone()),
                }),
            }
        }
        Ok(Self { predicates })
    }

    /// Add an equality predicate
    pub fn eq(mut self, path: &str, value: impl Into<Value>) -> Result<Self> {
        self.predicates.push(Predicate {
            path: FieldPath::parse(path)?,
            condition: Condition::Eq(value.into()),
        });
        Ok(self)
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Whether `doc` satisfies every predicate
    pub fn matches(&self, doc: &Document) -> bool {
        self.predicates.iter().all(|p| p.matches(doc))
    }

    /// Field values pinned by plain equality, used to seed upserted documents
    pub fn equality_terms(&self) -> impl Iterator<Item = (&FieldPath, &Value)> + '_ {
        self.predicates.iter().filter_map(|p| match &p.condition {
            Condition::Eq(value) => Some((&p.path, value)),
            _ => None,
        })
    }
}

/// An object operand is an operator set when its keys start with `$`;
/// mixing operators with plain keys is rejected
fn is_operator_set(ops: &Fields) -> Result<bool> {
    let operators = ops.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        return Ok(false);
    }
    if operators != ops.len() {
        return Err(Error::InvalidQuery {
            message: "cannot mix operators and plain fields in one condition".into(),
        });
    }
    Ok(true)
}

fn compile_operators(path: &FieldPath, ops: &Fields, out: &mut Vec<Predicate>) -> Result<()> {
    let mut push = |condition| {
        out.push(Predicate {
            path: path.clone(),
            condition,
        })
    };

    for (op, operand) in ops {
        let condition = match op.as_str() {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$gt" => Condition::Gt(operand.clone()),
            "$gte" => Condition::Gte(operand.clone()),
            "$lt" => Condition::Lt(operand.clone()),
            "$lte" => Condition::Lte(operand.clone()),
            "$in" => Condition::In(operand_list(op, operand)?),
            "$nin" => Condition::Nin(operand_list(op, operand)?),
            "$exists" => Condition::Exists(truthy(op, operand)?),
            "$regex" => Condition::Regex(compile_regex(operand, ops.get("$options"))?),
            "$options" => {
                if !ops.contains_key("$regex") {
                    return Err(Error::InvalidQuery {
                        message: "$options requires $regex".into(),
                    });
                }
                continue;
            }
            other => {
                return Err(Error::InvalidQuery {
                    message: format!("unknown operator '{}' on field '{}'", other, path),
                })
            }
        };
        push(condition);
    }
    Ok(())
}

fn operand_list(op: &str, operand: &Value) -> Result<Vec<Value>> {
    operand.as_array().cloned().ok_or_else(|| Error::InvalidQuery {
        message: format!("{} needs an array, found {}", op, operand.type_name()),
    })
}

fn truthy(op: &str, operand: &Value) -> Result<bool> {
    match operand {
        Value::Bool(b) => Ok(*b),
        v if v.is_numeric() => Ok(v.as_f64() != Some(0.0)),
        other => Err(Error::InvalidQuery {
            message: format!("{} needs a boolean, found {}", op, other.type_name()),
        }),
    }
}

/// `$regex` accepts a pattern string or a regex literal (`{$regex, $options}`);
/// flags from both places are combined
fn compile_regex(operand: &Value, options: Option<&Value>) -> Result<RegexMatcher> {
    let mut flags = String::new();
    if let Some(options) = options {
        flags.push_str(options.as_str().ok_or_else(|| Error::InvalidQuery {
            message: "$options must be a string".into(),
        })?);
    }

    let pattern = match operand {
        Value::String(s) => s.as_str(),
        Value::Object(literal) => {
            if let Some(inner) = literal.get("$options").and_then(Value::as_str) {
                flags.push_str(inner);
            }
            literal
                .get("$regex")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::InvalidQuery {
                    message: "$regex needs a pattern".into(),
                })?
        }
        other => {
            return Err(Error::InvalidQuery {
                message: format!("$regex needs a string, found {}", other.type_name()),
            })
        }
    };

    RegexMatcher::new(pattern, &flags)
}

impl Predicate {
    pub fn matches(&self, doc: &Document) -> bool {
        let value = doc.get_path(&self.path);
        match &self.condition {
            Condition::Exists(expected) => value.is_some() == *expected,
            Condition::Ne(expected) => !value.is_some_and(|v| equals(v, expected)),
            Condition::Nin(excluded) => {
                !value.is_some_and(|v| excluded.iter().any(|e| equals(v, e)))
            }
            // Missing paths never satisfy a positive condition
            condition => value.is_some_and(|v| condition.test(v)),
        }
    }
}

impl Condition {
    /// Test a present value; arrays match as a whole or through any element
    fn test(&self, value: &Value) -> bool {
        if self.test_one(value) {
            return true;
        }
        match value {
            Value::Array(items) => items.iter().any(|item| self.test_one(item)),
            _ => false,
        }
    }

    fn test_one(&self, value: &Value) -> bool {
        match self {
            Condition::Eq(expected) => value == expected,
            Condition::Gt(bound) => value.compare(bound) == Some(Ordering::Greater),
            Condition::Gte(bound) => {
                matches!(value.compare(bound), Some(Ordering::Greater | Ordering::Equal))
            }
            Condition::Lt(bound) => value.compare(bound) == Some(Ordering::Less),
            Condition::Lte(bound) => {
                matches!(value.compare(bound), Some(Ordering::Less | Ordering::Equal))
            }
            Condition::In(set) => set.contains(value),
            Condition::Regex(matcher) => value.as_str().is_some_and(|s| matcher.is_match(s)),
            // Negative conditions are resolved in Predicate::matches
            Condition::Ne(_) | Condition::Nin(_) | Condition::Exists(_) => false,
        }
    }
}

fn equals(value: &Value, expected: &Value) -> bool {
    Condition::Eq(expected.clone()).test(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::parse(text).unwrap()
    }

    fn matches(filter: &str, d: &str) -> bool {
        Filter::parse(filter).unwrap().matches(&doc(d))
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(matches("{}", "{}"));
        assert!(matches("{}", "{sku: 'P001'}"));
        assert!(Filter::all().is_empty());
    }

    #[test]
    fn test_equality_is_type_sensitive() {
        assert!(matches("{precio: 7500}", "{precio: 7500}"));
        assert!(matches("{precio: 7500}", "{precio: 7500.0}"));
        assert!(!matches("{precio: 7500}", "{precio: '7500'}"));
        assert!(!matches("{precio: 7500}", "{}"));
    }

    #[test]
    fn test_comparisons() {
        assert!(matches("{precio: {$gt: 10000}}", "{precio: 45000}"));
        assert!(!matches("{precio: {$gt: 10000}}", "{precio: 10000}"));
        assert!(matches("{precio: {$gte: 10000, $lte: 20000}}", "{precio: 10000}"));
        assert!(!matches("{precio: {$gte: 10000, $lte: 20000}}", "{precio: 20001}"));
        assert!(matches("{stock: {$lt: 10}}", "{stock: 9.5}"));
    }

    #[test]
    fn test_comparison_fails_closed_on_mixed_types() {
        assert!(!matches("{precio: {$gt: 10}}", "{precio: '50'}"));
        assert!(!matches("{precio: {$lt: 10}}", "{precio: null}"));
        assert!(!matches("{precio: {$gt: 10}}", "{}"));
    }

    #[test]
    fn test_dates() {
        let f = "{creadoEn: {$gte: ISODate('2025-01-01T00:00:00Z')}}";
        assert!(matches(f, "{creadoEn: ISODate('2025-03-10T12:00:00Z')}"));
        assert!(!matches(f, "{creadoEn: ISODate('2024-12-31T23:59:59Z')}"));
    }

    #[test]
    fn test_in_and_nin() {
        let f = "{categoria: {$in: ['Herramientas', 'Pinturas']}}";
        assert!(matches(f, "{categoria: 'Pinturas'}"));
        assert!(!matches(f, "{categoria: 'Jardin'}"));

        let f = "{categoria: {$nin: ['Herramientas']}}";
        assert!(matches(f, "{categoria: 'Pinturas'}"));
        assert!(matches(f, "{}"));
        assert!(!matches(f, "{categoria: 'Herramientas'}"));
    }

    #[test]
    fn test_regex() {
        assert!(matches("{nombre: {$regex: '^tal'}}", "{nombre: 'taladro'}"));
        assert!(!matches("{nombre: {$regex: '^tal'}}", "{nombre: 'Taladro'}"));
        assert!(matches("{nombre: {$regex: '^tal', $options: 'i'}}", "{nombre: 'Taladro'}"));
        assert!(matches("{nombre: /^tal/i}", "{nombre: 'Taladro'}"));
        assert!(matches("{nombre: {$regex: /^tal/i}}", "{nombre: 'Taladro'}"));
        // non-strings never match
        assert!(!matches("{sku: {$regex: '1'}}", "{sku: 1}"));
    }

    #[test]
    fn test_nested_paths() {
        let d = "{proveedor: {nombre: 'ProveTools', pais: 'CL'}}";
        assert!(matches("{'proveedor.pais': 'CL'}", d));
        assert!(!matches("{'proveedor.ciudad': 'Santiago'}", d));
        assert!(!matches("{'precio.valor': 1}", "{precio: 1}"));
    }

    #[test]
    fn test_array_fields() {
        let d = "{tags: ['oferta', 'nuevo']}";
        assert!(matches("{tags: 'oferta'}", d));
        assert!(matches("{tags: ['oferta', 'nuevo']}", d));
        assert!(matches("{tags: {$in: ['nuevo']}}", d));
        assert!(!matches("{tags: {$ne: 'oferta'}}", d));
        assert!(matches("{'tags.1': 'nuevo'}", d));
    }

    #[test]
    fn test_ne_and_exists() {
        assert!(matches("{categoria: {$ne: 'Pinturas'}}", "{}"));
        assert!(matches("{tags: {$exists: false}}", "{}"));
        assert!(matches("{tags: {$exists: true}}", "{tags: null}"));
        assert!(!matches("{tags: {$exists: 1}}", "{}"));
    }

    #[test]
    fn test_conjunction() {
        let f = "{categoria: 'Herramientas', precio: {$gt: 10000}}";
        assert!(matches(f, "{categoria: 'Herramientas', precio: 45000}"));
        assert!(!matches(f, "{categoria: 'Pinturas', precio: 45000}"));
    }

    #[test]
    fn test_invalid_filters() {
        assert!(matches!(Filter::parse("{$or: []}"), Err(Error::InvalidQuery { .. })));
        assert!(matches!(Filter::parse("{precio: {$near: 1}}"), Err(Error::InvalidQuery { .. })));
        assert!(matches!(Filter::parse("{precio: {$in: 1}}"), Err(Error::InvalidQuery { .. })));
        assert!(matches!(Filter::parse("{a: {$gt: 1, b: 2}}"), Err(Error::InvalidQuery { .. })));
        assert!(matches!(
            Filter::parse("{a: {$regex: 'x', $options: 'q'}}"),
            Err(Error::InvalidQuery { .. })
        ));
        assert!(matches!(Filter::parse("[1]"), Err(Error::InvalidQuery { .. })));
    }

    #[test]
    fn test_equality_terms() {
        let filter =
            Filter::parse("{sku: 'P013', precio: {$gt: 1}, 'proveedor.pais': 'CL'}").unwrap();
        let terms: Vec<_> = filter
            .equality_terms()
            .map(|(p, v)| (p.to_string(), v.clone()))
            .collect();
        assert_eq!(
            terms,
            vec![
                ("sku".to_string(), Value::from("P013")),
                ("proveedor.pais".to_string(), Value::from("CL")),
            ]
        );
    }
}
