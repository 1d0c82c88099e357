use crate::error::RecommendationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inclusive price range extracted from a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub min: f64,
    pub max: f64,
}

impl Budget {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

/// Structured shopping intent. Every field is advisory and may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub category: Option<String>,
    pub budget: Option<Budget>,
    /// Extracted but not used for filtering or scoring yet.
    pub features: Option<Vec<String>>,
}

impl Intent {
    /// Build an intent from the language model's JSON object.
    ///
    /// Fields with an unexpected shape are dropped, except a two-element
    /// budget that is not a pair of finite numbers, which makes the whole
    /// reply malformed.
    pub fn from_json(value: &Value) -> Result<Self, RecommendationError> {
        Ok(Self {
            category: value
                .get("category")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            budget: match value.get("budget") {
                Some(budget) => parse_budget(budget)?,
                None => None,
            },
            features: value.get("features").and_then(parse_features),
        })
    }
}

/// Only a two-element array is read as a budget; other shapes are ignored.
fn parse_budget(value: &Value) -> Result<Option<Budget>, RecommendationError> {
    let Some([min, max]) = value.as_array().map(Vec::as_slice) else {
        return Ok(None);
    };

    match (min.as_f64(), max.as_f64()) {
        (Some(min), Some(max)) if min.is_finite() && max.is_finite() => {
            Ok(Some(Budget { min, max }))
        }
        _ => Err(RecommendationError::MalformedIntent(format!(
            "Budget must be two numbers, got {}",
            value
        ))),
    }
}

fn parse_features(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|f| f.as_str().map(str::to_string))
        .collect()
}
