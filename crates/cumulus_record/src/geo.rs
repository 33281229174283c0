//! Geo point values.

use crate::error::{FieldError, FieldResult};
use serde_json::{json, Value};

/// A geographic point stored in a record field.
///
/// The wire representation is `{"_type":"point","lat":..,"lon":..}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Creates a geo point.
    ///
    /// Latitude must be strictly between -90 and 90 degrees, longitude
    /// strictly between -180 and 180. NaN is rejected.
    pub fn new(latitude: f64, longitude: f64) -> FieldResult<Self> {
        if !in_open_range(latitude, -90.0, 90.0) {
            return Err(FieldError::Validation(format!(
                "latitude {latitude} is out of range"
            )));
        }
        if !in_open_range(longitude, -180.0, 180.0) {
            return Err(FieldError::Validation(format!(
                "longitude {longitude} is out of range"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Returns the latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Returns the longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Serializes to the wire object shape.
    pub fn to_json(&self) -> Value {
        json!({
            "_type": "point",
            "lat": self.latitude,
            "lon": self.longitude,
        })
    }

    /// Parses a geo point from its wire object shape.
    pub fn from_json(value: &Value) -> FieldResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| FieldError::Format("geo point is not an object".into()))?;
        match obj.get("_type").and_then(Value::as_str) {
            Some("point") => {}
            _ => return Err(FieldError::Format("invalid geo point object".into())),
        }
        let lat = obj
            .get("lat")
            .and_then(Value::as_f64)
            .ok_or_else(|| FieldError::Format("geo point is missing lat".into()))?;
        let lon = obj
            .get("lon")
            .and_then(Value::as_f64)
            .ok_or_else(|| FieldError::Format("geo point is missing lon".into()))?;
        Self::new(lat, lon)
    }
}

fn in_open_range(value: f64, min: f64, max: f64) -> bool {
    !value.is_nan() && value > min && value < max
}
