//! Property, scaled-property and operating-point storage.
//!
//! `Properties` holds the externally configured nominal parameters of a
//! device and is treated as read-only during analysis. `ScaledProperties`
//! caches values derived once per temperature/model initialization so
//! they stay consistent within a sweep. `OperatingPoints` holds named DC
//! solve results reused by the AC/SP/noise/transient stages.

use std::collections::HashMap;

/// A scalar property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Real(f64),
    Integer(i64),
    Text(String),
}

impl Value {
    /// Interpret the value as a real number, if possible.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            Value::Text(_) => None,
        }
    }

    /// Interpret the value as an integer, if possible.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Real(v) => Some(*v as i64),
            Value::Text(_) => None,
        }
    }

    /// Interpret the value as text, if possible.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Named nominal parameters of a device.
///
/// Devices populate their full default set at construction, so lookups
/// during analysis always find a value; an absent name reads as zero.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    map: HashMap<String, Value>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_real(&mut self, name: impl Into<String>, value: f64) {
        self.map.insert(name.into(), Value::Real(value));
    }

    pub fn set_integer(&mut self, name: impl Into<String>, value: i64) {
        self.map.insert(name.into(), Value::Integer(value));
    }

    pub fn set_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.insert(name.into(), Value::Text(value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get(name)
    }

    /// Real-valued property; absent or non-numeric names read as zero.
    pub fn real(&self, name: &str) -> f64 {
        self.map.get(name).and_then(Value::as_real).unwrap_or(0.0)
    }

    /// Integer-valued property; absent or non-numeric names read as zero.
    pub fn integer(&self, name: &str) -> i64 {
        self.map.get(name).and_then(Value::as_integer).unwrap_or(0)
    }

    /// Text-valued property, if present.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.map.get(name).and_then(Value::as_text)
    }

    pub fn has(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
}

/// Temperature-scaled parameter cache, written once per model
/// initialization and reused across Newton iterations.
#[derive(Debug, Clone, Default)]
pub struct ScaledProperties {
    map: HashMap<String, f64>,
}

impl ScaledProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.map.insert(name.into(), value);
    }

    /// Scaled value; absent names read as zero.
    pub fn get(&self, name: &str) -> f64 {
        self.map.get(name).copied().unwrap_or(0.0)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// Named results of the most recent DC solve.
#[derive(Debug, Clone, Default)]
pub struct OperatingPoints {
    map: HashMap<String, f64>,
}

impl OperatingPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.map.insert(name.into(), value);
    }

    /// Operating point; absent names read as zero.
    pub fn get(&self, name: &str) -> f64 {
        self.map.get(name).copied().unwrap_or(0.0)
    }

    pub fn has(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_kinds() {
        let mut p = Properties::new();
        p.set_real("C", 1e-12);
        p.set_integer("capModel", 2);
        p.set_text("Type", "nfet");

        assert_eq!(p.real("C"), 1e-12);
        assert_eq!(p.integer("capModel"), 2);
        assert_eq!(p.text("Type"), Some("nfet"));
        assert!(p.has("C"));
        assert!(!p.has("L"));
    }

    #[test]
    fn test_absent_reads_as_zero() {
        let p = Properties::new();
        assert_eq!(p.real("missing"), 0.0);
        assert_eq!(p.integer("missing"), 0);
        assert_eq!(p.text("missing"), None);
    }

    #[test]
    fn test_integer_real_coercion() {
        let mut p = Properties::new();
        p.set_integer("n", 3);
        assert_eq!(p.real("n"), 3.0);
    }

    #[test]
    fn test_scaled_and_operating() {
        let mut s = ScaledProperties::new();
        s.set("Kp", 2.2e-5);
        assert_eq!(s.get("Kp"), 2.2e-5);
        assert_eq!(s.get("Uo"), 0.0);

        let mut op = OperatingPoints::new();
        op.set("gm", 1e-3);
        assert_eq!(op.get("gm"), 1e-3);
        assert!(!op.has("gds"));
    }
}
