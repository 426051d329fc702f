//! Query service: builds the list, detail and stats read-models.

use super::views::round2;
use super::{Event, EventDetail, EventStats, EventStore, EventSummary, ANOMALY_LABEL};
use crate::storage::StorageError;
use std::sync::Arc;
use tracing::debug;

/// Optional narrowing of the event list. Both filters must hold when set.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct EventFilter {
    /// Exact, case-sensitive label match.
    pub label: Option<String>,
    /// Case-sensitive substring of the user.
    pub user: Option<String>,
}

/// Read-only view over an [`EventStore`].
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Every stored event, projected to the list view in store order.
    pub fn list_events(&self) -> Result<Vec<EventSummary>, StorageError> {
        Ok(summarize(&self.store.find_all()?))
    }

    pub fn search_events(&self, filter: &EventFilter) -> Result<Vec<EventSummary>, StorageError> {
        let events = match (&filter.label, &filter.user) {
            (None, None) => return self.list_events(),
            (Some(label), None) => self.store.find_by_label(label)?,
            (None, Some(user)) => self.store.find_by_user_containing(user)?,
            (Some(label), Some(user)) => self
                .store
                .find_by_label(label)?
                .into_iter()
                .filter(|e| e.user.contains(user.as_str()))
                .collect(),
        };
        debug!(?filter, matched = events.len(), "searched events");
        Ok(summarize(&events))
    }

    /// `Ok(None)` when no event has this id.
    pub fn get_event_detail(&self, id: i64) -> Result<Option<EventDetail>, StorageError> {
        Ok(self.store.find_by_id(id)?.as_ref().map(EventDetail::from))
    }

    pub fn get_stats(&self) -> Result<EventStats, StorageError> {
        let totals = self.store.totals(ANOMALY_LABEL)?;

        Ok(EventStats {
            total_events: totals.total,
            anomalies: totals.labelled,
            avg_anomaly: round2(totals.average_score.unwrap_or(0.0)),
            highest_score: round2(totals.max_score.unwrap_or(0.0)),
        })
    }
}

fn summarize(events: &[Event]) -> Vec<EventSummary> {
    events.iter().map(EventSummary::from).collect()
}
