//! Find options: projection, sort, skip and limit

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::storage::document::{Document, FieldPath, Value};

use super::projection::Projection;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub path: FieldPath,
    pub direction: SortDirection,
}

/// A multi-key sort order, e.g. `{categoria: 1, precio: -1}`
#[derive(Debug, Clone, Default)]
pub struct Sort {
    keys: Vec<SortKey>,
}

/// Kinds of values that order among themselves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortClass {
    Number,
    String,
    Date,
    Bool,
}

impl SortClass {
    fn of(value: &Value) -> Option<Self> {
        match value {
            v if v.is_numeric() => Some(Self::Number),
            Value::String(_) => Some(Self::String),
            Value::Date(_) => Some(Self::Date),
            Value::Bool(_) => Some(Self::Bool),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Date => "date",
            Self::Bool => "bool",
        }
    }
}

impl Sort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(self, path: &str) -> Result<Self> {
        self.then(path, SortDirection::Asc)
    }

    pub fn desc(self, path: &str) -> Result<Self> {
        self.then(path, SortDirection::Desc)
    }

    /// Append a tie-breaking key
    pub fn then(mut self, path: &str, direction: SortDirection) -> Result<Self> {
        self.keys.push(SortKey {
            path: FieldPath::parse(path)?,
            direction,
        });
        Ok(self)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::from_value(&Value::parse(text)?)
    }

    /// Build from `{field: 1 | -1, ...}`
    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = value.as_object().ok_or_else(|| Error::InvalidQuery {
            message: format!("sort must be an object, found {}", value.type_name()),
        })?;

        let mut sort = Self::new();
        for (key, direction) in fields {
            let direction = match direction.as_f64() {
                Some(d) if d == 1.0 => SortDirection::Asc,
                Some(d) if d == -1.0 => SortDirection::Desc,
                _ => {
                    return Err(Error::InvalidQuery {
                        message: format!(
                            "sort direction for '{}' must be 1 or -1, found {}",
                            key, direction
                        ),
                    })
                }
            };
            sort = sort.then(key, direction)?;
        }
        Ok(sort)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Stable in-place sort
    ///
    /// Missing and null keys order before every other value. All present
    /// keys of one sort field must be of one comparable kind, otherwise the
    /// sort fails with `TypeMismatch`.
    pub fn apply(&self, docs: &mut [Document]) -> Result<()> {
        for key in &self.keys {
            check_comparable(docs, &key.path)?;
        }

        docs.sort_by(|a, b| {
            for key in &self.keys {
                let ordering = compare_keys(a.get_path(&key.path), b.get_path(&key.path));
                let ordering = match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn check_comparable(docs: &[Document], path: &FieldPath) -> Result<()> {
    let mut seen: Option<SortClass> = None;
    for value in docs.iter().filter_map(|d| present(d.get_path(path))) {
        let class = SortClass::of(value).ok_or_else(|| Error::TypeMismatch {
            field: path.to_string(),
            expected: "sortable value (number, string, date or bool)".into(),
            actual: value.type_name().into(),
        })?;
        match seen {
            Some(first) if first != class => {
                return Err(Error::TypeMismatch {
                    field: path.to_string(),
                    expected: first.name().into(),
                    actual: class.name().into(),
                })
            }
            _ => seen = Some(class),
        }
    }
    Ok(())
}

fn compare_keys(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (present(a), present(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

/// Options for `find`
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub projection: Projection,
    pub sort: Option<Sort>,
    pub skip: usize,
    /// `None` (or `Some(0)`) returns every remaining document
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Effective limit, treating 0 as unlimited
    pub(crate) fn take(&self) -> usize {
        match self.limit {
            Some(0) | None => usize::MAX,
            Some(n) => n,
        }
    }
}
