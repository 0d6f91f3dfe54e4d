//! Projections: which fields a query returns
//!
//! A projection is inclusion-only (`{nombre: 1, precio: 1}`) or
//! exclusion-only (`{stock: 0}`). `_id` is included unless excluded
//! explicitly, and may be excluded from either kind.

use crate::error::{Error, Result};
use crate::storage::document::{Document, FieldPath, Value, ID_FIELD};

#[derive(Debug, Clone, Default)]
pub enum Projection {
    /// Return documents whole
    #[default]
    All,
    /// Return only these paths (and `_id` unless `include_id` is false)
    Include {
        paths: Vec<FieldPath>,
        include_id: bool,
    },
    /// Return everything except these paths
    Exclude(Vec<FieldPath>),
}

impl Projection {
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_value(&Value::parse(text)?)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = value.as_object().ok_or_else(|| Error::Projection {
            message: format!("projection must be an object, found {}", value.type_name()),
        })?;

        let mut id_flag = None;
        let mut included = Vec::new();
        let mut excluded = Vec::new();

        for (key, flag) in fields {
            let include = match flag {
                Value::Bool(b) => *b,
                v if v.is_numeric() => v.as_f64() != Some(0.0),
                other => {
                    return Err(Error::Projection {
                        message: format!(
                            "value for '{}' must be 0, 1, true or false, found {}",
                            key,
                            other.type_name()
                        ),
                    })
                }
            };

            if key == ID_FIELD {
                id_flag = Some(include);
                continue;
            }

            let path = FieldPath::parse(key).map_err(|_| Error::Projection {
                message: format!("invalid field path '{}'", key),
            })?;
            if include {
                let position = path.segments()[1..]
                    .iter()
                    .find(|segment| segment.parse::<usize>().is_ok());
                if let Some(index) = position {
                    return Err(Error::Projection {
                        message: format!(
                            "cannot include array position '{}' in '{}'; include the whole array",
                            index, key
                        ),
                    });
                }
                included.push(path);
            } else {
                excluded.push(path);
            }
        }

        if !included.is_empty() && !excluded.is_empty() {
            return Err(Error::Projection {
                message: format!(
                    "cannot mix inclusion of '{}' with exclusion of '{}'",
                    included[0], excluded[0]
                ),
            });
        }

        if !included.is_empty() {
            return Ok(Projection::Include {
                paths: included,
                include_id: id_flag.unwrap_or(true),
            });
        }

        Ok(match id_flag {
            Some(false) => {
                excluded.insert(0, FieldPath::parse(ID_FIELD)?);
                Projection::Exclude(excluded)
            }
            Some(true) if excluded.is_empty() => Projection::Include {
                paths: Vec::new(),
                include_id: true,
            },
            _ if excluded.is_empty() => Projection::All,
            _ => Projection::Exclude(excluded),
        })
    }

    /// Shape one document
    pub fn apply(&self, doc: &Document) -> Result<Document> {
        Ok(match self {
            Projection::All => doc.clone(),
            Projection::Exclude(paths) => {
                let mut out = doc.clone();
                for path in paths {
                    out.remove_path(path);
                }
                out
            }
            Projection::Include { paths, include_id } => {
                let mut out = Document::new();
                if *include_id {
                    if let Some(id) = doc.get(ID_FIELD) {
                        out.set(ID_FIELD, id.clone());
                    }
                }
                // Keep the source document's field order
                for name in doc.fields.keys() {
                    for path in paths.iter().filter(|p| p.root() == name) {
                        if let Some(value) = doc.get_path(path) {
                            out.set_path(path, value.clone())?;
                        }
                    }
                }
                out
            }
        })
    }
}
