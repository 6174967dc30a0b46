use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `[trigger, value, [names]]` as used by `required_if` and `forbidden_if`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(String, Value, Vec<String>)")]
pub struct ConditionalConstraint {
    pub trigger: String,
    pub value: Value,
    pub names: Vec<String>,
}

impl From<(String, Value, Vec<String>)> for ConditionalConstraint {
    fn from((trigger, value, names): (String, Value, Vec<String>)) -> Self {
        Self {
            trigger,
            value,
            names,
        }
    }
}

/// The five relational rule collections of one task.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConstraintSet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub required_together: Vec<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required_one_of: Vec<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required_if: Vec<ConditionalConstraint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub forbidden_if: Vec<ConditionalConstraint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mutually_exclusive: Vec<Vec<String>>,
}

impl ConstraintSet {
    pub fn is_empty(&self) -> bool {
        self.required_together.is_empty()
            && self.required_one_of.is_empty()
            && self.required_if.is_empty()
            && self.forbidden_if.is_empty()
            && self.mutually_exclusive.is_empty()
    }
}

/// `[trigger, [dependents]]`: a changed trigger invalidates stale dependents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(String, Vec<String>)")]
pub struct ResetRule {
    pub trigger: String,
    pub dependents: Vec<String>,
}

impl From<(String, Vec<String>)> for ResetRule {
    fn from((trigger, dependents): (String, Vec<String>)) -> Self {
        Self {
            trigger,
            dependents,
        }
    }
}
