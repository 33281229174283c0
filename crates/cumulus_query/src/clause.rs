//! Typed predicate nodes and combinators.

use crate::error::{ClauseError, ClauseResult};
use cumulus_record::GeoPoint;
use serde_json::{json, Map, Value};

/// A primitive value carried by equality, range and membership leaves.
///
/// Integer and long wire values collapse to [`ClauseValue::Int`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseValue {
    /// Integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
}

impl ClauseValue {
    fn to_json(&self) -> Value {
        match self {
            ClauseValue::Int(v) => Value::from(*v),
            ClauseValue::Float(v) => Value::from(*v),
            ClauseValue::Bool(v) => Value::from(*v),
            ClauseValue::Str(v) => Value::from(v.clone()),
        }
    }
}

impl From<i32> for ClauseValue {
    fn from(v: i32) -> Self {
        ClauseValue::Int(i64::from(v))
    }
}

impl From<i64> for ClauseValue {
    fn from(v: i64) -> Self {
        ClauseValue::Int(v)
    }
}

impl From<f64> for ClauseValue {
    fn from(v: f64) -> Self {
        ClauseValue::Float(v)
    }
}

impl From<bool> for ClauseValue {
    fn from(v: bool) -> Self {
        ClauseValue::Bool(v)
    }
}

impl From<&str> for ClauseValue {
    fn from(v: &str) -> Self {
        ClauseValue::Str(v.to_string())
    }
}

impl From<String> for ClauseValue {
    fn from(v: String) -> Self {
        ClauseValue::Str(v)
    }
}

/// Field types accepted by [`Clause::has_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// String field.
    String,
    /// Integer field.
    Integer,
    /// Decimal field.
    Decimal,
    /// Boolean field.
    Boolean,
}

impl FieldType {
    fn wire_name(self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Integer => "INTEGER",
            FieldType::Decimal => "DECIMAL",
            FieldType::Boolean => "BOOLEAN",
        }
    }
}

/// A node in a query predicate tree.
///
/// Trees are immutable once constructed and composed functionally.
/// Validation happens in the constructors; [`Clause::to_json`] cannot
/// fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Matches every record.
    All,
    /// Field equals a primitive value.
    Equals {
        /// Field name.
        field: String,
        /// Value to compare.
        value: ClauseValue,
    },
    /// Negation of the child clause.
    Not(Box<Clause>),
    /// Field within a half-open or closed range. At least one bound is
    /// present; the flag is whether the bound is inclusive.
    Range {
        /// Field name.
        field: String,
        /// Lower bound and its inclusive flag.
        lower: Option<(ClauseValue, bool)>,
        /// Upper bound and its inclusive flag.
        upper: Option<(ClauseValue, bool)>,
    },
    /// String field starts with a prefix.
    Prefix {
        /// Field name.
        field: String,
        /// Prefix to match.
        prefix: String,
    },
    /// Field equals one of the listed values.
    In {
        /// Field name.
        field: String,
        /// Candidate values (1..=200).
        values: Vec<ClauseValue>,
    },
    /// Geo point field within a bounding box.
    GeoBox {
        /// Field name.
        field: String,
        /// North-east corner.
        north_east: GeoPoint,
        /// South-west corner.
        south_west: GeoPoint,
    },
    /// Geo point field within a radius of a center point.
    GeoDistance {
        /// Field name.
        field: String,
        /// Center of the circle.
        center: GeoPoint,
        /// Radius in meters, in (0, 20_000_000].
        radius: f64,
        /// Response field to write the calculated distance into.
        put_distance_into: Option<String>,
    },
    /// Field exists with the given type.
    HasField {
        /// Field name.
        field: String,
        /// Expected field type.
        field_type: FieldType,
    },
    /// All children match (2 or more children).
    And(Vec<Clause>),
    /// Any child matches (2 or more children).
    Or(Vec<Clause>),
}

impl Clause {
    /// Matches every record.
    pub fn all() -> Clause {
        Clause::All
    }

    /// Field equals `value`.
    pub fn equals(field: &str, value: impl Into<ClauseValue>) -> ClauseResult<Clause> {
        assert_field(field)?;
        Ok(Clause::Equals {
            field: field.to_string(),
            value: value.into(),
        })
    }

    /// Field does not equal `value`.
    ///
    /// The wire has no dedicated not-equals type; this compiles to a
    /// `not`-wrapped `eq`, byte-identical to wrapping [`Clause::equals`]
    /// in [`Clause::not`].
    pub fn not_equals(field: &str, value: impl Into<ClauseValue>) -> ClauseResult<Clause> {
        Ok(Clause::not(Clause::equals(field, value)?))
    }

    /// Negates `clause`.
    pub fn not(clause: Clause) -> Clause {
        Clause::Not(Box::new(clause))
    }

    /// Field is strictly greater than `value`.
    pub fn greater_than(field: &str, value: impl Into<ClauseValue>) -> ClauseResult<Clause> {
        Self::lower_bound(field, value, false)
    }

    /// Field is greater than or equal to `value`.
    pub fn greater_than_or_equal(
        field: &str,
        value: impl Into<ClauseValue>,
    ) -> ClauseResult<Clause> {
        Self::lower_bound(field, value, true)
    }

    /// Field is strictly less than `value`.
    pub fn less_than(field: &str, value: impl Into<ClauseValue>) -> ClauseResult<Clause> {
        Self::upper_bound(field, value, false)
    }

    /// Field is less than or equal to `value`.
    pub fn less_than_or_equal(field: &str, value: impl Into<ClauseValue>) -> ClauseResult<Clause> {
        Self::upper_bound(field, value, true)
    }

    /// String field starts with `prefix`.
    pub fn starts_with(field: &str, prefix: &str) -> ClauseResult<Clause> {
        assert_field(field)?;
        Ok(Clause::Prefix {
            field: field.to_string(),
            prefix: prefix.to_string(),
        })
    }

    /// Field equals one of `values`.
    ///
    /// The list must be non-empty and hold at most 200 elements.
    pub fn in_values<V: Into<ClauseValue>>(
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> ClauseResult<Clause> {
        assert_field(field)?;
        let values: Vec<ClauseValue> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(ClauseError::EmptyValues);
        }
        if values.len() > 200 {
            return Err(ClauseError::TooManyValues(values.len()));
        }
        Ok(Clause::In {
            field: field.to_string(),
            values,
        })
    }

    /// Geo point field within the box spanned by `south_west` and
    /// `north_east`.
    pub fn geo_box(field: &str, north_east: GeoPoint, south_west: GeoPoint) -> ClauseResult<Clause> {
        assert_field(field)?;
        Ok(Clause::GeoBox {
            field: field.to_string(),
            north_east,
            south_west,
        })
    }

    /// Geo point field within `radius` meters of `center`.
    ///
    /// The radius must be in (0, 20_000_000]. When `put_distance_into`
    /// is given, the server writes the calculated distance into that
    /// field of the `_calculated` section of each result.
    pub fn geo_distance(
        field: &str,
        center: GeoPoint,
        radius: f64,
        put_distance_into: Option<&str>,
    ) -> ClauseResult<Clause> {
        assert_field(field)?;
        if !(radius > 0.0 && radius <= 20_000_000.0) {
            return Err(ClauseError::InvalidRadius(radius));
        }
        Ok(Clause::GeoDistance {
            field: field.to_string(),
            center,
            radius,
            put_distance_into: put_distance_into.map(str::to_string),
        })
    }

    /// Field exists with the given type.
    pub fn has_field(field: &str, field_type: FieldType) -> ClauseResult<Clause> {
        assert_field(field)?;
        Ok(Clause::HasField {
            field: field.to_string(),
            field_type,
        })
    }

    /// All of `clauses` match.
    ///
    /// Fails on an empty list; a single clause is returned unwrapped (no
    /// combinator node is emitted).
    pub fn and(clauses: Vec<Clause>) -> ClauseResult<Clause> {
        Self::combine(clauses, Clause::And)
    }

    /// Any of `clauses` matches.
    ///
    /// Fails on an empty list; a single clause is returned unwrapped.
    pub fn or(clauses: Vec<Clause>) -> ClauseResult<Clause> {
        Self::combine(clauses, Clause::Or)
    }

    fn combine(
        mut clauses: Vec<Clause>,
        wrap: fn(Vec<Clause>) -> Clause,
    ) -> ClauseResult<Clause> {
        match clauses.len() {
            0 => Err(ClauseError::EmptyClauses),
            1 => Ok(clauses.remove(0)),
            _ => Ok(wrap(clauses)),
        }
    }

    fn lower_bound(
        field: &str,
        value: impl Into<ClauseValue>,
        included: bool,
    ) -> ClauseResult<Clause> {
        assert_field(field)?;
        Ok(Clause::Range {
            field: field.to_string(),
            lower: Some((value.into(), included)),
            upper: None,
        })
    }

    fn upper_bound(
        field: &str,
        value: impl Into<ClauseValue>,
        included: bool,
    ) -> ClauseResult<Clause> {
        assert_field(field)?;
        Ok(Clause::Range {
            field: field.to_string(),
            lower: None,
            upper: Some((value.into(), included)),
        })
    }

    /// Compiles this node to its canonical wire JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Clause::All => json!({"type": "all"}),
            Clause::Equals { field, value } => json!({
                "type": "eq",
                "field": field,
                "value": value.to_json(),
            }),
            Clause::Not(clause) => json!({
                "type": "not",
                "clause": clause.to_json(),
            }),
            Clause::Range {
                field,
                lower,
                upper,
            } => {
                let mut obj = Map::new();
                obj.insert("type".into(), Value::from("range"));
                obj.insert("field".into(), Value::from(field.clone()));
                if let Some((value, included)) = lower {
                    obj.insert("lowerLimit".into(), value.to_json());
                    obj.insert("lowerIncluded".into(), Value::from(*included));
                }
                if let Some((value, included)) = upper {
                    obj.insert("upperLimit".into(), value.to_json());
                    obj.insert("upperIncluded".into(), Value::from(*included));
                }
                Value::Object(obj)
            }
            Clause::Prefix { field, prefix } => json!({
                "type": "prefix",
                "field": field,
                "prefix": prefix,
            }),
            Clause::In { field, values } => json!({
                "type": "in",
                "field": field,
                "values": values.iter().map(ClauseValue::to_json).collect::<Vec<_>>(),
            }),
            Clause::GeoBox {
                field,
                north_east,
                south_west,
            } => json!({
                "type": "geobox",
                "field": field,
                "box": {
                    "ne": north_east.to_json(),
                    "sw": south_west.to_json(),
                },
            }),
            Clause::GeoDistance {
                field,
                center,
                radius,
                put_distance_into,
            } => {
                let mut obj = Map::new();
                obj.insert("type".into(), Value::from("geodistance"));
                obj.insert("field".into(), Value::from(field.clone()));
                obj.insert("center".into(), center.to_json());
                obj.insert("radius".into(), Value::from(*radius));
                if let Some(into) = put_distance_into {
                    obj.insert("putDistanceInto".into(), Value::from(into.clone()));
                }
                Value::Object(obj)
            }
            Clause::HasField { field, field_type } => json!({
                "type": "hasField",
                "field": field,
                "fieldType": field_type.wire_name(),
            }),
            Clause::And(clauses) => json!({
                "type": "and",
                "clauses": clauses.iter().map(Clause::to_json).collect::<Vec<_>>(),
            }),
            Clause::Or(clauses) => json!({
                "type": "or",
                "clauses": clauses.iter().map(Clause::to_json).collect::<Vec<_>>(),
            }),
        }
    }
}

fn assert_field(field: &str) -> ClauseResult<()> {
    if field.is_empty() {
        Err(ClauseError::EmptyField)
    } else {
        Ok(())
    }
}
