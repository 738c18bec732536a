//! Application controls and per-frame metadata

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ControlId {
    Brightness,
    Contrast,
    Saturation,
    Hue,
    Gamma,
    ColourTemperature,
    /// Red and blue gains, in that order.
    ColourGains,
    /// Microseconds.
    ExposureTime,
    AnalogueGain,
    AeLocked,
    /// Microseconds.
    FrameDuration,
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    FloatPair(f32, f32),
}

impl From<bool> for ControlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for ControlValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for ControlValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f32> for ControlValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<(f32, f32)> for ControlValue {
    fn from((a, b): (f32, f32)) -> Self {
        Self::FloatPair(a, b)
    }
}

/// Ordered map of control values, used both for request controls and for
/// the metadata returned with a completed frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlList {
    values: BTreeMap<ControlId, ControlValue>,
}

impl ControlList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: ControlId, value: impl Into<ControlValue>) {
        self.values.insert(id, value.into());
    }

    /// Builder flavour of [`set`](Self::set).
    pub fn with(mut self, id: ControlId, value: impl Into<ControlValue>) -> Self {
        self.set(id, value);
        self
    }

    pub fn get(&self, id: ControlId) -> Option<ControlValue> {
        self.values.get(&id).copied()
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.values.contains_key(&id)
    }

    /// Float value of `id`, with integer values widened.
    pub fn get_f32(&self, id: ControlId) -> Option<f32> {
        match self.get(id)? {
            ControlValue::Float(v) => Some(v),
            ControlValue::Int32(v) => Some(v as f32),
            ControlValue::Int64(v) => Some(v as f32),
            _ => None,
        }
    }

    pub fn get_i64(&self, id: ControlId) -> Option<i64> {
        match self.get(id)? {
            ControlValue::Int32(v) => Some(i64::from(v)),
            ControlValue::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_bool(&self, id: ControlId) -> Option<bool> {
        match self.get(id)? {
            ControlValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_pair(&self, id: ControlId) -> Option<(f32, f32)> {
        match self.get(id)? {
            ControlValue::FloatPair(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn merge(&mut self, other: &ControlList) {
        self.values.extend(other.iter());
    }

    pub fn iter(&self) -> impl Iterator<Item = (ControlId, ControlValue)> + '_ {
        self.values.iter().map(|(id, value)| (*id, *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
