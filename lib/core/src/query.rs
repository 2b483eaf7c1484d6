//! Query builder
//!
//! A [`Query`] accumulates personalization scalars and an ordered list of
//! [`Condition`]s, then projects them into the [`QueryPayload`] the engine
//! server accepts.
//!
//! Conditions compose as follows:
//! - values for one field inside a single call are ORed
//! - every appended condition is ANDed with all others
//! - nothing is merged or deduplicated; calling [`Query::filter`] twice with
//!   the same field yields two independent conditions
//!
//! ```rust
//! use cco_core::Query;
//!
//! let query = Query::new()
//!     .for_user("u-1")
//!     .filter([("channel", [1, 2])])
//!     .exclude([("price_range", "Comp")])
//!     .boost(1.5, [("category", "shoes")])
//!     .unwrap()
//!     .limit(5);
//!
//! let payload = query.payload();
//! assert_eq!(payload.num, Some(5));
//! assert_eq!(payload.fields.len(), 3);
//! ```

use crate::condition::{Condition, FieldValues, EXCLUDE_BIAS, INCLUDE_BIAS};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Builder for a recommendation query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    user: Option<String>,
    item: Option<String>,
    limit: Option<usize>,
    conditions: Vec<Condition>,
}

/// Wire form of a [`Query`]. Unset keys are omitted, never sent as null.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Condition>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Personalize results for `user`
    #[must_use]
    pub fn for_user(mut self, user: impl ToString) -> Self {
        self.user = Some(user.to_string());
        self
    }

    /// Maximum number of results. Not range-checked.
    #[must_use]
    pub fn limit(mut self, num: usize) -> Self {
        self.limit = Some(num);
        self
    }

    /// Ask for items similar to `item`
    #[must_use]
    pub fn similar_to(mut self, item: impl ToString) -> Self {
        self.item = Some(item.to_string());
        self
    }

    /// Hard include filter: only items matching every entry are returned.
    ///
    /// Each entry becomes one condition with bias `-1.0`.
    #[must_use]
    pub fn filter<I, K, V>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValues>,
    {
        self.push_conditions(conditions, INCLUDE_BIAS)
    }

    /// Hard exclude filter: items matching any entry are dropped.
    ///
    /// Each entry becomes one condition with bias `0.0`.
    #[must_use]
    pub fn exclude<I, K, V>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValues>,
    {
        self.push_conditions(conditions, EXCLUDE_BIAS)
    }

    /// Multiply the score of matching items by `amount`, which must be > 1.0
    pub fn boost<I, K, V>(self, amount: f64, conditions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValues>,
    {
        // NaN and infinity have no JSON number form
        if !amount.is_finite() || amount <= 1.0 {
            return Err(Error::InvalidBoost { amount });
        }
        Ok(self.push_conditions(conditions, amount))
    }

    /// Multiply the score of matching items by `amount`, which must lie in (0.0, 1.0)
    pub fn deboost<I, K, V>(self, amount: f64, conditions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValues>,
    {
        if amount.is_nan() || amount <= 0.0 || amount >= 1.0 {
            return Err(Error::InvalidDeboost { amount });
        }
        Ok(self.push_conditions(conditions, amount))
    }

    fn push_conditions<I, K, V>(mut self, conditions: I, bias: f64) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValues>,
    {
        self.conditions.extend(
            conditions
                .into_iter()
                .map(|(name, values)| Condition::new(name, values, bias)),
        );
        self
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn item(&self) -> Option<&str> {
        self.item.as_deref()
    }

    pub fn num(&self) -> Option<usize> {
        self.limit
    }

    /// Accumulated conditions in insertion order
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Project the current state into the wire payload. Pure; the query is
    /// left untouched and may be projected again after further changes.
    pub fn payload(&self) -> QueryPayload {
        QueryPayload {
            user: self.user.clone(),
            item: self.item.clone(),
            num: self.limit,
            fields: self.conditions.clone(),
        }
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.payload())?)
    }
}

impl From<&Query> for QueryPayload {
    fn from(query: &Query) -> Self {
        query.payload()
    }
}
