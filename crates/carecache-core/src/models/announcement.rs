use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub body: String,
    pub author_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Empty means the whole school.
    #[serde(default)]
    pub class_names: Vec<String>,
}
