use std::sync::Arc;

use upstream_client::UpstreamApi;

pub mod actions;
pub mod projection;
pub mod views;

pub use actions::{generate_schedule, import_availability, Redirect};
pub use projection::{project, SlotOrderingProjector, SlotRow};
pub use views::{
    availability_page, generate_page, home_page, import_page, schedule_page, AvailabilityPage,
    GeneratePage, HomePage, ImportPage, SchedulePage,
};

/// Per-process handles every page and action needs. Holds no request state.
#[derive(Clone)]
pub struct BffContext {
    pub upstream: Arc<dyn UpstreamApi>,
}

impl BffContext {
    pub fn new(upstream: impl UpstreamApi + 'static) -> Self {
        Self {
            upstream: Arc::new(upstream),
        }
    }
}

#[cfg(test)]
#[path = "tests/fake_upstream.rs"]
mod fake_upstream;
