use std::cmp::Reverse;

use serde::Serialize;
use shared::{
    domain::{Availability, AvailabilityId, Schedule, ScheduleId},
    error::PageError,
    protocol::ImportFormat,
};
use tracing::warn;
use upstream_client::ResultEnvelope;

use crate::{projection::project, BffContext, SlotRow};

pub const SLOTS_NOT_FOUND: &str = "Slots not found";
pub const SCHEDULE_NOT_FOUND: &str = "Schedule not found";
pub const AVAILABILITY_NOT_FOUND: &str = "Availability not found";

#[derive(Debug, Clone, Serialize)]
pub struct HomePage {
    pub schedules: Vec<Schedule>,
    pub availabilities: Vec<Availability>,
    pub current_schedule: Option<ScheduleId>,
    pub current_availability: Option<AvailabilityId>,
    /// Set only when the schedule list itself could not be loaded.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulePage {
    pub schedule: Schedule,
    pub schedule_id: String,
    pub assignments: Vec<SlotRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityPage {
    pub availability: Availability,
    pub availability_id: String,
    pub entries: Vec<SlotRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratePage {
    pub prefill: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportPage {
    pub format: ImportFormat,
}

/// Schedules are primary; availabilities and parameters degrade to empty.
pub async fn home_page(ctx: &BffContext) -> HomePage {
    let (schedules, availabilities, parameters) = futures::join!(
        ctx.upstream.schedules(),
        ctx.upstream.availabilities(),
        ctx.upstream.parameters()
    );

    let (current_schedule, current_availability) = match parameters.into_result() {
        Ok(parameters) => (parameters.schedule, parameters.availability),
        Err(error) => {
            warn!(%error, "parameters unavailable; no current selection");
            (None, None)
        }
    };

    let mut availabilities = optional_list(availabilities, "availabilities");
    sort_by_recency(&mut availabilities);

    let (schedules, error) = match schedules.into_result() {
        Ok(schedules) => (schedules, None),
        Err(error) => (Vec::new(), Some(error)),
    };

    HomePage {
        schedules,
        availabilities,
        current_schedule,
        current_availability,
        error,
    }
}

pub async fn schedule_page(ctx: &BffContext, id: &str) -> Result<SchedulePage, PageError> {
    let (slots, schedule) = futures::join!(ctx.upstream.slots(), ctx.upstream.schedule(id));
    let slots = required(slots, SLOTS_NOT_FOUND)?;
    let schedule = required(schedule, SCHEDULE_NOT_FOUND)?;

    let assignments = project(&slots, &schedule.assignments);
    Ok(SchedulePage {
        schedule,
        schedule_id: id.to_string(),
        assignments,
    })
}

pub async fn availability_page(ctx: &BffContext, id: &str) -> Result<AvailabilityPage, PageError> {
    let (slots, availability) =
        futures::join!(ctx.upstream.slots(), ctx.upstream.availability(id));
    let slots = required(slots, SLOTS_NOT_FOUND)?;
    let availability = required(availability, AVAILABILITY_NOT_FOUND)?;

    let entries = project(&slots, &availability.entries);
    Ok(AvailabilityPage {
        availability,
        availability_id: id.to_string(),
        entries,
    })
}

/// An explicit `parent` (even an empty one) wins over the current schedule.
pub async fn generate_page(ctx: &BffContext, requested_parent: Option<String>) -> GeneratePage {
    if let Some(parent) = requested_parent {
        return GeneratePage {
            prefill: Some(parent),
        };
    }

    let prefill = match ctx.upstream.parameters().await.into_result() {
        Ok(parameters) => parameters.schedule.map(|schedule| schedule.0),
        Err(error) => {
            warn!(%error, "parameters unavailable; generate form not prefilled");
            None
        }
    };
    GeneratePage { prefill }
}

pub fn import_page() -> ImportPage {
    ImportPage {
        format: ImportFormat::When2Meet,
    }
}

/// Most recent first. Stable; unparseable timestamps go last.
pub fn sort_by_recency(availabilities: &mut [Availability]) {
    availabilities.sort_by_key(|availability| Reverse(availability.created_at_utc()));
}

fn optional_list<T>(envelope: ResultEnvelope<Vec<T>>, what: &str) -> Vec<T> {
    match envelope.into_result() {
        Ok(list) => list,
        Err(error) => {
            warn!(%error, what, "optional upstream list unavailable; using empty");
            Vec::new()
        }
    }
}

fn required<T>(envelope: ResultEnvelope<T>, message: &str) -> Result<T, PageError> {
    envelope
        .into_result()
        .map_err(|error| PageError::new(message, error))
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
