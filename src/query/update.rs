//! Update documents
//!
//! Supported operators: `$set`, `$inc`, `$unset` and `$setOnInsert`
//! (applied only when an upsert inserts). Paths touched by one update
//! must not overlap, and `_id` can only be written by `$setOnInsert`.

use crate::error::{Error, Result};
use crate::storage::document::{Document, FieldPath, Value};

/// A compiled update document
#[derive(Debug, Clone, Default)]
pub struct Update {
    set: Vec<(FieldPath, Value)>,
    inc: Vec<(FieldPath, Value)>,
    unset: Vec<FieldPath>,
    set_on_insert: Vec<(FieldPath, Value)>,
}

impl Update {
    /// Parse a shell-style update literal, e.g. `{$set: {precio: 8000}}`
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_value(&Value::parse(text)?)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = value.as_object().ok_or_else(|| Error::InvalidUpdate {
            message: format!("update must be an object, found {}", value.type_name()),
        })?;
        if fields.is_empty() {
            return Err(Error::InvalidUpdate {
                message: "update document is empty".into(),
            });
        }

        let mut update = Self::default();
        for (op, operand) in fields {
            let assignments = operand.as_object().ok_or_else(|| Error::InvalidUpdate {
                message: format!("{} needs an object, found {}", op, operand.type_name()),
            })?;

            for (key, value) in assignments {
                let path = FieldPath::parse(key)?;
                if path.segments().iter().any(|s| s.starts_with('$')) {
                    return Err(Error::InvalidUpdate {
                        message: format!("field path '{}' cannot contain operators", path),
                    });
                }
                if path.is_id() && op != "$setOnInsert" {
                    return Err(Error::InvalidUpdate {
                        message: format!("_id is immutable and cannot be changed with {}", op),
                    });
                }

                match op.as_str() {
                    "$set" => update.set.push((path, value.clone())),
                    "$setOnInsert" => update.set_on_insert.push((path, value.clone())),
                    "$unset" => update.unset.push(path),
                    "$inc" => {
                        if !value.is_numeric() {
                            return Err(Error::InvalidUpdate {
                                message: format!(
                                    "cannot increment '{}' by non-numeric {}",
                                    path,
                                    value.type_name()
                                ),
                            });
                        }
                        update.inc.push((path, value.clone()));
                    }
                    other if other.starts_with('$') => {
                        return Err(Error::InvalidUpdate {
                            message: format!("unknown update operator '{}'", other),
                        })
                    }
                    _ => {
                        return Err(Error::InvalidUpdate {
                            message: "replacement documents are not supported; use update operators"
                                .into(),
                        })
                    }
                }
            }
        }

        update.check_conflicts()?;
        Ok(update)
    }

    fn paths(&self) -> impl Iterator<Item = &FieldPath> + '_ {
        self.set
            .iter()
            .map(|(p, _)| p)
            .chain(self.inc.iter().map(|(p, _)| p))
            .chain(self.unset.iter())
            .chain(self.set_on_insert.iter().map(|(p, _)| p))
    }

    fn check_conflicts(&self) -> Result<()> {
        let paths: Vec<&FieldPath> = self.paths().collect();
        for (i, a) in paths.iter().enumerate() {
            if let Some(b) = paths[i + 1..].iter().find(|b| a.overlaps(b)) {
                return Err(Error::InvalidUpdate {
                    message: format!("updating '{}' and '{}' would conflict", a, b),
                });
            }
        }
        Ok(())
    }

    /// Apply `$set`, `$inc` and `$unset` to a document in place
    pub fn apply(&self, doc: &mut Document) -> Result<()> {
        for (path, value) in &self.set {
            doc.set_path(path, value.clone())?;
        }
        for (path, amount) in &self.inc {
            doc.increment_path(path, amount)?;
        }
        for path in &self.unset {
            doc.remove_path(path);
        }
        Ok(())
    }

    /// Apply the update to a freshly synthesised upsert document, including
    /// `$setOnInsert`
    pub fn apply_on_insert(&self, doc: &mut Document) -> Result<()> {
        self.apply(doc)?;
        for (path, value) in &self.set_on_insert {
            doc.set_path(path, value.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::parse(text).unwrap()
    }

    #[test]
    fn test_set_and_inc() {
        let mut d = doc("{sku: 'P001', precio: 7500, stock: 20}");
        Update::parse("{$set: {precio: 8000}, $inc: {stock: -5}}")
            .unwrap()
            .apply(&mut d)
            .unwrap();
        assert_eq!(d, doc("{sku: 'P001', precio: 8000, stock: 15}"));
    }

    #[test]
    fn test_set_creates_nested_fields() {
        let mut d = doc("{sku: 'P001'}");
        Update::parse("{$set: {'proveedor.nombre': 'ProveTools'}}")
            .unwrap()
            .apply(&mut d)
            .unwrap();
        assert_eq!(d, doc("{sku: 'P001', proveedor: {nombre: 'ProveTools'}}"));
    }

    #[test]
    fn test_inc_on_missing_and_non_numeric() {
        let mut d = doc("{nombre: 'Martillo'}");
        let update = Update::parse("{$inc: {stock: 3}}").unwrap();
        update.apply(&mut d).unwrap();
        assert_eq!(d.get("stock"), Some(&Value::Int(3)));

        let mut d = doc("{stock: 'muchos'}");
        assert!(matches!(update.apply(&mut d), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_unset() {
        let mut d = doc("{sku: 'P001', tags: ['a']}");
        Update::parse("{$unset: {tags: '', nada: 1}}").unwrap().apply(&mut d).unwrap();
        assert_eq!(d, doc("{sku: 'P001'}"));
    }

    #[test]
    fn test_set_on_insert_only_on_insert() {
        let update = Update::parse("{$set: {precio: 5}, $setOnInsert: {tags: ['nuevo']}}").unwrap();

        let mut existing = doc("{precio: 1}");
        update.apply(&mut existing).unwrap();
        assert_eq!(existing, doc("{precio: 5}"));

        let mut fresh = doc("{sku: 'P013'}");
        update.apply_on_insert(&mut fresh).unwrap();
        assert_eq!(fresh, doc("{sku: 'P013', precio: 5, tags: ['nuevo']}"));
    }

    #[test]
    fn test_rejected_updates() {
        let invalid = [
            "{}",
            "{precio: 5}",
            "{$rename: {a: 'b'}}",
            "{$set: {_id: 5}}",
            "{$inc: {stock: 'x'}}",
            "{$set: {precio: 1}, $setOnInsert: {precio: 2}}",
            "{$set: {proveedor: {}}, $unset: {'proveedor.email': 1}}",
            "{$set: 5}",
        ];
        for text in invalid {
            assert!(
                matches!(Update::parse(text), Err(Error::InvalidUpdate { .. })),
                "expected InvalidUpdate for {}",
                text
            );
        }
    }
}
