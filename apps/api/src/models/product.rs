use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

fn deserialize_f64_from_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    match StringOrFloat::deserialize(deserializer)? {
        StringOrFloat::String(s) => f64::from_str(s.trim()).map_err(serde::de::Error::custom),
        StringOrFloat::Float(f) => Ok(f),
    }
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(i64),
        Float(f64),
        Null,
    }

    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::String(s) => {
            // "1,234" shows up in scraped catalogs
            let cleaned = s.trim().replace(',', "");
            if cleaned.is_empty() {
                Ok(0)
            } else {
                i64::from_str(&cleaned).map_err(serde::de::Error::custom)
            }
        }
        StringOrInt::Int(i) => Ok(i),
        StringOrInt::Float(f) if f.fract() == 0.0 => Ok(f as i64),
        StringOrInt::Float(f) => Err(serde::de::Error::custom(format!(
            "review count must be a whole number, got {}",
            f
        ))),
        StringOrInt::Null => Ok(0),
    }
}

/// Descriptions are free text; anything that is not a string counts as missing.
fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// A row of the catalog input file, before validation and embedding.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub description: Option<String>,
    pub category: String,
    #[serde(deserialize_with = "deserialize_f64_from_string")]
    pub price: f64,
    #[serde(alias = "rating", deserialize_with = "deserialize_f64_from_string")]
    pub rate: f64,
    #[serde(
        alias = "reviewCount",
        default,
        deserialize_with = "deserialize_count"
    )]
    pub review_count: i64,
}

impl ProductRecord {
    /// Check the value ranges a catalog product must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is empty".to_string());
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("price {} is not a non-negative number", self.price));
        }
        if !self.rate.is_finite() || !(0.0..=5.0).contains(&self.rate) {
            return Err(format!("rating {} is outside [0, 5]", self.rate));
        }
        if self.review_count < 0 {
            return Err(format!("review count {} is negative", self.review_count));
        }
        Ok(())
    }
}

/// A catalog product with its precomputed description embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub price: f64,
    pub rating: f64,
    pub review_count: u64,
    pub embedding: Vec<f32>,
}

impl Product {
    /// Build a product from a validated record.
    pub fn from_record(record: ProductRecord, embedding: Vec<f32>) -> Self {
        Self {
            title: record.title,
            description: record.description,
            category: record.category,
            price: record.price,
            rating: record.rate,
            review_count: record.review_count.max(0) as u64,
            embedding,
        }
    }

    pub fn to_recommendation(&self) -> Recommendation {
        Recommendation {
            title: self.title.clone(),
            price: self.price,
            description: self.description.clone(),
            rating: self.rating,
            review_count: self.review_count,
        }
    }
}

/// The public projection of a product returned to API clients and stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub price: f64,
    pub description: Option<String>,
    #[serde(alias = "rate")]
    pub rating: f64,
    pub review_count: u64,
}
