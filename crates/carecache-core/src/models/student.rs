use serde::{Deserialize, Serialize};

use crate::utils::normalize_phone;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "className")]
    pub class_name: Option<String>,
    #[serde(rename = "parentIds", default)]
    pub parent_ids: Vec<String>,
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,
}

/// Someone other than a parent who may collect a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorisedPerson {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub name: String,
    pub phone: String,
    pub relationship: Option<String>,
}

impl AuthorisedPerson {
    pub fn normalized_phone(&self) -> String {
        normalize_phone(&self.phone)
    }
}
