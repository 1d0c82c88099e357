use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Recommendation;

/// One saved search: the query and the recommendations returned for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub query: String,
    pub recommendations: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    pub fn new(query: impl Into<String>, recommendations: Vec<Recommendation>) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            query: query.into(),
            recommendations,
            created_at: Some(Utc::now()),
        }
    }
}
