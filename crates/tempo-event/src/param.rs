//! Per-event parameters.

use hashbrown::HashMap;
use tempo_curve::Time;

use crate::TargetId;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Time(Time),
    Target(TargetId),
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    i64 => Int,
    i32 => Int,
    f64 => Float,
    bool => Bool,
    String => Text,
    &str => Text,
    Time => Time,
    TargetId => Target,
}

/// String-keyed parameters handed to every class callback of an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    values: HashMap<String, ParamValue>,
}

impl ParamMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    #[must_use]
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn time(&self, key: &str) -> Option<Time> {
        match self.get(key)? {
            ParamValue::Time(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn target(&self, key: &str) -> Option<TargetId> {
        match self.get(key)? {
            ParamValue::Target(v) => Some(*v),
            _ => None,
        }
    }

    /// Overlay `other` onto `self`; keys present in both take `other`'s value.
    pub fn merge(&mut self, other: ParamMap) {
        self.values.extend(other.values);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
