use serde::{Deserialize, Serialize};

use crate::domain::{AvailabilityId, ScheduleId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub parent: Option<ScheduleId>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub id: ScheduleId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent: Option<ScheduleId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportFormat {
    #[default]
    #[serde(rename = "w2m")]
    When2Meet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub format: ImportFormat,
    pub source: String,
}

impl ImportRequest {
    pub fn when2meet(source: impl Into<String>) -> Self {
        Self {
            format: ImportFormat::When2Meet,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResponse {
    pub id: AvailabilityId,
    #[serde(default)]
    pub entries: i64,
    #[serde(default)]
    pub subjects_imported: i64,
    #[serde(default)]
    pub slots_imported: i64,
}
