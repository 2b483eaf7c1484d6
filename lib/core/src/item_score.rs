use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One recommendation: an item id and its score.
///
/// Any other keys the engine returns (rankings, properties) are kept in
/// `extra` so a reifier can use them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemScore {
    pub item: String,
    pub score: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemScore {
    pub fn new(item: impl Into<String>, score: f64) -> Self {
        Self {
            item: item.into(),
            score,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extra_keys_are_kept() {
        let score: ItemScore = serde_json::from_value(json!({
            "item": "i-1",
            "score": 0.75,
            "ranks": [1.0]
        }))
        .unwrap();

        assert_eq!(score.item, "i-1");
        assert_eq!(score.score, 0.75);
        assert_eq!(score.extra.get("ranks"), Some(&json!([1.0])));
    }
}
