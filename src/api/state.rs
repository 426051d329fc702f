use crate::events::EventService;

#[derive(Clone)]
pub struct AppState {
    pub events: EventService,
}

impl AppState {
    pub fn new(events: EventService) -> Self {
        Self { events }
    }
}
