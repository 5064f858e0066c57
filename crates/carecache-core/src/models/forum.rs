use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answer_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(default)]
    pub id: String,
    pub question_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
}
