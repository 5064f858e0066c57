use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    PickedUp,
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceStatus::Present => write!(f, "Present"),
            AttendanceStatus::Absent => write!(f, "Absent"),
            AttendanceStatus::Late => write!(f, "Late"),
            AttendanceStatus::PickedUp => write!(f, "Picked Up"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(rename = "checkedInAt")]
    pub checked_in_at: Option<DateTime<Utc>>,
    #[serde(rename = "pickedUpAt")]
    pub picked_up_at: Option<DateTime<Utc>>,
    /// Id of the user or authorised person who collected the student.
    #[serde(rename = "pickedUpBy")]
    pub picked_up_by: Option<String>,
}
