//! Security events: the stored record, the store capability, and the
//! read-models served over the API.

pub mod seed;
pub mod service;
pub mod views;

pub use self::service::{EventFilter, EventService};
pub use self::views::{EventDetail, EventStats, EventSummary};

use crate::storage::StorageError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Label conventionally attached to events the detector flagged.
pub const ANOMALY_LABEL: &str = "Anomaly";

/// Maximum stored length of `description`, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// A single detected occurrence with its anomaly score and classification.
///
/// `id` is `None` until the store assigns one. `resolved_at` and
/// `resolved_by` only carry meaning once `resolved` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<i64>,
    pub timestamp: NaiveDateTime,
    pub user: String,
    pub anomaly_score: f64,
    pub label: String,
    pub event_name: String,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub process_id: Option<String>,
    pub description: Option<String>,
    pub resolved: bool,
    pub resolved_at: Option<NaiveDateTime>,
    pub resolved_by: Option<String>,
}

impl Event {
    /// A fresh, unresolved event with only the mandatory fields set.
    pub fn new(
        timestamp: NaiveDateTime,
        user: impl Into<String>,
        anomaly_score: f64,
        label: impl Into<String>,
        event_name: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            user: user.into(),
            anomaly_score,
            label: label.into(),
            event_name: event_name.into(),
            ip_address: None,
            location: None,
            process_id: None,
            description: None,
            resolved: false,
            resolved_at: None,
            resolved_by: None,
        }
    }
}

/// Whole-store figures read in one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreTotals {
    pub total: u64,
    /// Events carrying the label the totals were asked for.
    pub labelled: u64,
    pub average_score: Option<f64>,
    pub max_score: Option<f64>,
}

/// Durable keyed storage of events.
///
/// Implementations provide their own consistency; callers issue single reads
/// or single writes and never hold a transaction across calls.
pub trait EventStore: Send + Sync {
    /// Insert a new event (assigning its id) or overwrite an existing one.
    fn save(&self, event: Event) -> Result<Event, StorageError>;

    /// Save a batch atomically: either every event is stored or none is.
    fn save_all(&self, events: Vec<Event>) -> Result<Vec<Event>, StorageError>;

    /// Every stored event, ascending by id.
    fn find_all(&self) -> Result<Vec<Event>, StorageError>;

    fn find_by_id(&self, id: i64) -> Result<Option<Event>, StorageError>;

    /// Events whose label equals `label` exactly (case-sensitive).
    fn find_by_label(&self, label: &str) -> Result<Vec<Event>, StorageError>;

    /// Events whose user contains `fragment` (case-sensitive).
    fn find_by_user_containing(&self, fragment: &str) -> Result<Vec<Event>, StorageError>;

    fn count(&self) -> Result<u64, StorageError>;

    fn count_by_label(&self, label: &str) -> Result<u64, StorageError>;

    /// Mean anomaly score, `None` on an empty store.
    fn average_anomaly_score(&self) -> Result<Option<f64>, StorageError>;

    /// Highest anomaly score, `None` on an empty store.
    fn max_anomaly_score(&self) -> Result<Option<f64>, StorageError>;

    /// Count, `label` count, mean and max score from a single snapshot.
    fn totals(&self, label: &str) -> Result<StoreTotals, StorageError>;

    /// Flag an event as resolved. Returns `None` when the id is unknown.
    fn mark_resolved(
        &self,
        id: i64,
        resolved_by: &str,
        resolved_at: NaiveDateTime,
    ) -> Result<Option<Event>, StorageError>;
}
