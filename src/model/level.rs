//! Task levels: the address of a message within its task.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Position of a message in its task's hierarchy, e.g. `[2, 3, 1]`.
///
/// Ordering is lexicographic over the components, so a level sorts
/// before any level it is a strict prefix of.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskLevel(Vec<u32>);

impl TaskLevel {
    /// Build a level from its components. Every component must be positive.
    pub fn new(components: Vec<u32>) -> Result<Self, String> {
        if components.contains(&0) {
            return Err(format!("task level components must be positive: {components:?}"));
        }
        Ok(Self(components))
    }

    /// Parse a level from its JSON form: an array of positive integers.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let Value::Array(items) = value else {
            return Err(format!("expected an array of positive integers, found {value}"));
        };
        let components = items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| format!("not a task level component: {item}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(components)
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.0.clone())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for TaskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.0 {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}
