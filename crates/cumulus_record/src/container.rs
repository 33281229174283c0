//! Typed key/value field container.

use crate::error::{FieldError, FieldResult};
use crate::geo::GeoPoint;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};

/// A URI stored in a record field.
///
/// URIs travel on the wire as plain strings; this wrapper only exists so
/// the typed accessors can distinguish them from arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri(String);

impl Uri {
    /// Creates a URI. The value must be non-empty and contain a scheme.
    pub fn new(value: impl Into<String>) -> FieldResult<Self> {
        let value = value.into();
        if value.is_empty() || !value.contains(':') {
            return Err(FieldError::Validation(format!("not a URI: {value:?}")));
        }
        Ok(Self(value))
    }

    /// Returns the URI string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A value accepted by [`FieldContainer::set`].
///
/// Byte arrays are stored base64-encoded, URIs as strings and geo points
/// as their wire object shape.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Integer (covers both int and long wire values).
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
    /// Nested JSON object.
    Object(Map<String, Value>),
    /// Nested JSON array.
    Array(Vec<Value>),
    /// Byte array, base64-encoded on the wire.
    Bytes(Vec<u8>),
    /// URI, stored as its string form.
    Uri(Uri),
    /// Geo point, stored as its wire object shape.
    Geo(GeoPoint),
}

impl FieldValue {
    /// Converts to the JSON value actually stored.
    pub fn into_json(self) -> Value {
        match self {
            FieldValue::Int(v) => Value::from(v),
            FieldValue::Float(v) => Value::from(v),
            FieldValue::Bool(v) => Value::from(v),
            FieldValue::Str(v) => Value::from(v),
            FieldValue::Object(v) => Value::Object(v),
            FieldValue::Array(v) => Value::Array(v),
            FieldValue::Bytes(v) => Value::from(BASE64.encode(v)),
            FieldValue::Uri(v) => Value::from(v.0),
            FieldValue::Geo(v) => v.to_json(),
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Bytes(v)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(v: &[u8]) -> Self {
        FieldValue::Bytes(v.to_vec())
    }
}

impl From<Map<String, Value>> for FieldValue {
    fn from(v: Map<String, Value>) -> Self {
        FieldValue::Object(v)
    }
}

impl From<Vec<Value>> for FieldValue {
    fn from(v: Vec<Value>) -> Self {
        FieldValue::Array(v)
    }
}

impl From<Uri> for FieldValue {
    fn from(v: Uri) -> Self {
        FieldValue::Uri(v)
    }
}

impl From<GeoPoint> for FieldValue {
    fn from(v: GeoPoint) -> Self {
        FieldValue::Geo(v)
    }
}

/// Decodes a stored JSON value into a typed Rust value.
///
/// Implemented for the primitive field types plus byte arrays, URIs, geo
/// points and nested objects/arrays.
pub trait FromField: Sized {
    /// Name of the expected type, used in error messages.
    const KIND: &'static str;

    /// Decodes `value`, returning `None` on a type mismatch.
    fn from_field(value: &Value) -> Option<Self>;
}

impl FromField for i64 {
    const KIND: &'static str = "i64";

    fn from_field(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromField for i32 {
    const KIND: &'static str = "i32";

    fn from_field(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|v| i32::try_from(v).ok())
    }
}

impl FromField for f64 {
    const KIND: &'static str = "f64";

    fn from_field(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromField for bool {
    const KIND: &'static str = "bool";

    fn from_field(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromField for String {
    const KIND: &'static str = "string";

    fn from_field(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromField for Vec<u8> {
    const KIND: &'static str = "byte array";

    fn from_field(value: &Value) -> Option<Self> {
        value.as_str().and_then(|s| BASE64.decode(s).ok())
    }
}

impl FromField for Uri {
    const KIND: &'static str = "URI";

    fn from_field(value: &Value) -> Option<Self> {
        value.as_str().and_then(|s| Uri::new(s).ok())
    }
}

impl FromField for GeoPoint {
    const KIND: &'static str = "geo point";

    fn from_field(value: &Value) -> Option<Self> {
        GeoPoint::from_json(value).ok()
    }
}

impl FromField for Map<String, Value> {
    const KIND: &'static str = "object";

    fn from_field(value: &Value) -> Option<Self> {
        value.as_object().cloned()
    }
}

impl FromField for Vec<Value> {
    const KIND: &'static str = "array";

    fn from_field(value: &Value) -> Option<Self> {
        value.as_array().cloned()
    }
}

/// A key/value map with reserved-key filtering and typed accessors.
///
/// Keys in the reserved table can only be written through the
/// crate-internal [`FieldContainer::set_reserved`] path used by protocol
/// code; the public mutators reject them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldContainer {
    fields: Map<String, Value>,
    reserved: &'static [&'static str],
}

impl FieldContainer {
    /// Creates an empty container with the given reserved-key table.
    pub fn new(reserved: &'static [&'static str]) -> Self {
        Self {
            fields: Map::new(),
            reserved,
        }
    }

    /// Creates a container from a parsed JSON payload.
    pub fn from_json(fields: Map<String, Value>, reserved: &'static [&'static str]) -> Self {
        Self { fields, reserved }
    }

    /// Returns the typed value for `key`.
    ///
    /// Fails with [`FieldError::Format`] when the key is absent or the
    /// stored value's runtime type does not match `T`.
    pub fn get<T: FromField>(&self, key: &str) -> FieldResult<T> {
        let value = self
            .fields
            .get(key)
            .ok_or_else(|| FieldError::missing(key))?;
        T::from_field(value).ok_or_else(|| FieldError::type_mismatch(key, T::KIND))
    }

    /// Returns the typed value for `key`, or `fallback` on any mismatch
    /// or absence. Never errors.
    pub fn get_or<T: FromField>(&self, key: &str, fallback: T) -> T {
        self.fields
            .get(key)
            .and_then(T::from_field)
            .unwrap_or(fallback)
    }

    /// Returns true if `key` has a value (reserved keys included).
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Sets `key` to `value`.
    ///
    /// Fails with [`FieldError::InvalidKey`] when `key` is empty or
    /// reserved.
    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) -> FieldResult<()> {
        self.assert_key(key)?;
        self.fields.insert(key.to_string(), value.into().into_json());
        Ok(())
    }

    /// Removes `key`. A no-op when the key is absent; fails with
    /// [`FieldError::InvalidKey`] for reserved keys.
    pub fn remove(&mut self, key: &str) -> FieldResult<()> {
        self.assert_key(key)?;
        self.fields.remove(key);
        Ok(())
    }

    /// Iterates over all non-reserved, non-underscore-prefixed keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields
            .keys()
            .map(String::as_str)
            .filter(|key| self.is_valid_key(key) && !key.starts_with('_'))
    }

    /// Returns the raw JSON map (reserved keys included).
    pub fn to_json(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    /// Sets a reserved key, bypassing the reserved-key check.
    pub(crate) fn set_reserved(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// Replaces the entire map, keeping the reserved table.
    pub(crate) fn replace(&mut self, fields: Map<String, Value>) {
        self.fields = fields;
    }

    /// Clears the map.
    pub(crate) fn clear(&mut self) {
        self.fields.clear();
    }

    pub(crate) fn raw(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    fn assert_key(&self, key: &str) -> FieldResult<()> {
        if self.is_valid_key(key) {
            Ok(())
        } else {
            Err(FieldError::InvalidKey(key.to_string()))
        }
    }

    fn is_valid_key(&self, key: &str) -> bool {
        !key.is_empty() && !self.reserved.contains(&key)
    }
}
