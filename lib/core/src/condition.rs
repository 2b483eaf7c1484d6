// Field conditions and bias encoding
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bias of a hard include filter
pub const INCLUDE_BIAS: f64 = -1.0;

/// Bias of a hard exclude filter
pub const EXCLUDE_BIAS: f64 = 0.0;

/// A named, weighted match against an item or user profile field.
///
/// Values inside one condition are ORed; separate conditions are ANDed,
/// including conditions that repeat a field name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub name: String,
    pub values: Vec<String>,
    pub bias: f64,
}

/// What a bias value means to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// `-1.0`: only items matching the field are returned
    Include,
    /// `0.0`: items matching the field are dropped
    Exclude,
    /// `(0, 1)`: matching items have their score multiplied down
    Deboost,
    /// `(1, inf)`: matching items have their score multiplied up
    Boost,
}

impl Condition {
    pub fn new(name: impl Into<String>, values: impl Into<FieldValues>, bias: f64) -> Self {
        Self {
            name: name.into(),
            values: values.into().into_vec(),
            bias,
        }
    }

    /// Classify the bias. Returns `None` for values the engine does not
    /// define (negative values other than -1.0, exactly 1.0, NaN).
    pub fn kind(&self) -> Option<ConditionKind> {
        let bias = self.bias;
        if bias == INCLUDE_BIAS {
            Some(ConditionKind::Include)
        } else if bias == EXCLUDE_BIAS {
            Some(ConditionKind::Exclude)
        } else if bias > 0.0 && bias < 1.0 {
            Some(ConditionKind::Deboost)
        } else if bias > 1.0 {
            Some(ConditionKind::Boost)
        } else {
            None
        }
    }
}

/// Profile values for one condition, already stringified.
///
/// A bare scalar becomes a one-element list; lists keep their order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues(Vec<String>);

impl FieldValues {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

macro_rules! scalar_field_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FieldValues {
                fn from(value: $ty) -> Self {
                    FieldValues(vec![value.to_string()])
                }
            }
        )*
    };
}

scalar_field_values!(
    &str, String, &String, char, bool,
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize,
    f32, f64,
);

impl<T: ToString> From<Vec<T>> for FieldValues {
    fn from(values: Vec<T>) -> Self {
        FieldValues(values.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString> From<&[T]> for FieldValues {
    fn from(values: &[T]) -> Self {
        FieldValues(values.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString, const N: usize> From<[T; N]> for FieldValues {
    fn from(values: [T; N]) -> Self {
        FieldValues(values.iter().map(ToString::to_string).collect())
    }
}

impl From<Value> for FieldValues {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => FieldValues(items.iter().map(json_scalar_to_string).collect()),
            other => FieldValues(vec![json_scalar_to_string(&other)]),
        }
    }
}

impl From<&Value> for FieldValues {
    fn from(value: &Value) -> Self {
        FieldValues::from(value.clone())
    }
}

// JSON strings lose their quotes; everything else uses its JSON rendering
fn json_scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
