//! Parameter values bound to the fragment currently executing.

use std::fmt;
use std::sync::RwLock;

use sitectx_result::{Error, Result};

/// A single statement parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => f.write_str("NULL"),
            ParamValue::Integer(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::String(v) => write!(f, "'{v}'"),
        }
    }
}

/// Ordered parameter array owned by the engine.
///
/// The engine rewrites the values before each fragment; the execution context
/// and the operators it runs only read them. Subquery caching takes
/// [`ParameterSet::snapshot`]s to detect when a cached result went stale.
#[derive(Debug, Default)]
pub struct ParameterSet {
    values: RwLock<Vec<ParamValue>>,
}

impl ParameterSet {
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Value at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<ParamValue> {
        self.read().get(index).cloned()
    }

    /// Copy of every value, in order.
    pub fn snapshot(&self) -> Vec<ParamValue> {
        self.read().clone()
    }

    /// Replace the whole array for the next fragment.
    pub fn replace(&self, values: Vec<ParamValue>) {
        *self.write() = values;
    }

    /// Overwrite a single slot.
    pub fn set(&self, index: usize, value: ParamValue) -> Result<()> {
        let mut values = self.write();
        let len = values.len();
        let slot = values.get_mut(index).ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "parameter index {index} out of range for {len} parameters"
            ))
        })?;
        *slot = value;
        Ok(())
    }

    // A panicking writer leaves a fully written Vec behind, so poison is ignored.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ParamValue>> {
        self.values.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<ParamValue>> {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
