use serde::Serialize;
use shared::{
    domain::ScheduleId,
    error::PageError,
    protocol::{GenerateRequest, ImportRequest},
};
use tracing::{info, warn};

use crate::BffContext;

pub const GENERATE_FAILED: &str = "Failed to generate schedule";
pub const IMPORT_FAILED: &str = "Failed to import availability";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub location: String,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

/// Single attempt; a blank parent means no lineage.
pub async fn generate_schedule(
    ctx: &BffContext,
    parent: Option<&str>,
    name: Option<&str>,
) -> Result<Redirect, PageError> {
    let request = GenerateRequest {
        parent: non_empty(parent).map(ScheduleId::from),
        name: non_empty(name).map(str::to_string),
    };

    match ctx.upstream.generate_schedule(&request).await.into_result() {
        Ok(created) => {
            info!(
                schedule_id = %created.id,
                parent = ?request.parent,
                "generated schedule"
            );
            Ok(Redirect::to(format!("/schedule/{}", created.id)))
        }
        Err(error) => {
            warn!(%error, parent = ?request.parent, "schedule generation failed");
            Err(PageError::new(GENERATE_FAILED, error))
        }
    }
}

/// Format validation is left to the upstream.
pub async fn import_availability(ctx: &BffContext, source: &str) -> Result<Redirect, PageError> {
    let request = ImportRequest::when2meet(source);

    match ctx.upstream.import_availability(&request).await.into_result() {
        Ok(imported) => {
            if let Some(imported) = imported {
                info!(
                    availability_id = %imported.id,
                    entries = imported.entries,
                    subjects = imported.subjects_imported,
                    slots = imported.slots_imported,
                    "imported availability"
                );
            }
            Ok(Redirect::to("/"))
        }
        Err(error) => {
            warn!(%error, source, "availability import failed");
            Err(PageError::new(IMPORT_FAILED, error))
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "tests/actions_tests.rs"]
mod tests;
