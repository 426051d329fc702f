//! Sample events loaded into an empty store at startup.

use super::{Event, EventStore};
use crate::storage::StorageError;
use chrono::{NaiveDateTime, Utc};
use tracing::info;

struct Sample {
    timestamp: &'static str,
    user: &'static str,
    score: f64,
    label: &'static str,
    name: &'static str,
    ip: &'static str,
    location: &'static str,
    pid: &'static str,
    description: &'static str,
}

const SAMPLES: &[Sample] = &[
    Sample {
        timestamp: "2025-05-22 20:55",
        user: "Joe Fam",
        score: 0.72,
        label: "Anomaly",
        name: "Event1",
        ip: "192.168.1.100",
        location: "/usr/bin/bash",
        pid: "1001",
        description: "Suspicious process execution",
    },
    Sample {
        timestamp: "2025-05-21 19:35",
        user: "JuserB",
        score: 0.35,
        label: "Normal",
        name: "Event2",
        ip: "192.168.1.101",
        location: "/usr/bin/python",
        pid: "1002",
        description: "Regular script execution",
    },
    Sample {
        timestamp: "2025-05-19 21:32",
        user: "John Aoe",
        score: 0.42,
        label: "Normal",
        name: "Event3",
        ip: "172.158.32.33",
        location: "bin/bash",
        pid: "1012303",
        description: "User login from an unusual location",
    },
    Sample {
        timestamp: "2025-05-19 21:32",
        user: "Joe Yun",
        score: 0.91,
        label: "Anomaly",
        name: "Event4",
        ip: "192.168.1.103",
        location: "/usr/bin/curl",
        pid: "1004",
        description: "Unauthorized data exfiltration attempt",
    },
    Sample {
        timestamp: "2025-05-19 21:32",
        user: "Tim Wan",
        score: 0.83,
        label: "Anomaly",
        name: "Event5",
        ip: "192.168.1.104",
        location: "/tmp/malicious",
        pid: "1005",
        description: "Execution of suspicious binary in temporary directory",
    },
    Sample {
        timestamp: "2025-05-19 21:32",
        user: "Tim Wan",
        score: 0.83,
        label: "Anomaly",
        name: "Event6",
        ip: "192.168.1.104",
        location: "/etc/passwd",
        pid: "1006",
        description: "Unauthorized access to system files",
    },
    Sample {
        timestamp: "2025-05-19 21:32",
        user: "Tim Wan",
        score: 0.83,
        label: "Anomaly",
        name: "Event7",
        ip: "192.168.1.104",
        location: "/var/log",
        pid: "1007",
        description: "Log file tampering detected",
    },
];

/// User recorded as having resolved the pre-resolved sample.
const SAMPLE_RESOLVER: &str = "Admin";

/// The bundled sample events, unsaved.
pub fn sample_events() -> Vec<Event> {
    let now = Utc::now().naive_utc();

    SAMPLES
        .iter()
        .map(|s| {
            // Literals above are fixed and well-formed.
            let ts = NaiveDateTime::parse_from_str(s.timestamp, "%Y-%m-%d %H:%M")
                .unwrap_or_default();
            let mut event = Event::new(ts, s.user, s.score, s.label, s.name);
            event.ip_address = Some(s.ip.to_string());
            event.location = Some(s.location.to_string());
            event.process_id = Some(s.pid.to_string());
            event.description = Some(s.description.to_string());
            if s.name == "Event2" {
                event.resolved = true;
                event.resolved_at = Some(now);
                event.resolved_by = Some(SAMPLE_RESOLVER.to_string());
            }
            event
        })
        .collect()
}

/// Insert the sample events when the store holds none.
///
/// The batch is written in one transaction, so a failure leaves the store
/// empty and a later run can retry.
///
/// Returns the number of events inserted; zero when the store was populated.
pub fn seed_if_empty(store: &dyn EventStore) -> Result<usize, StorageError> {
    let existing = store.count()?;
    if existing > 0 {
        info!(existing, "event store already populated, skipping seed");
        return Ok(0);
    }

    let inserted = store.save_all(sample_events())?.len();
    info!(inserted, "seeded sample events");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventService;
    use crate::storage::{open_memory_pool, SqliteEventStore};
    use std::sync::Arc;

    #[test]
    fn test_sample_events_are_well_formed() {
        let events = sample_events();
        assert_eq!(events.len(), 7);
        assert!(events.iter().all(|e| e.id.is_none()));
        assert!(events.iter().all(|e| e.timestamp.and_utc().timestamp() > 0));

        let resolved: Vec<_> = events.iter().filter(|e| e.resolved).collect();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].resolved_by.as_deref(), Some("Admin"));
        assert!(resolved[0].resolved_at.is_some());
    }

    #[test]
    fn test_seed_only_into_empty_store() {
        let store = SqliteEventStore::new(open_memory_pool().unwrap());

        assert_eq!(seed_if_empty(&store).unwrap(), 7);
        assert_eq!(seed_if_empty(&store).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 7);
    }

    #[test]
    fn test_seeded_events_round_trip() {
        let store = SqliteEventStore::new(open_memory_pool().unwrap());
        let saved = store.save_all(sample_events()).unwrap();

        for event in &saved {
            let fetched = store.find_by_id(event.id.unwrap()).unwrap().unwrap();
            assert_eq!(&fetched, event);
        }
    }

    #[test]
    fn test_seeded_stats() {
        let store = Arc::new(SqliteEventStore::new(open_memory_pool().unwrap()));
        seed_if_empty(store.as_ref()).unwrap();

        let stats = EventService::new(store).get_stats().unwrap();
        assert_eq!(stats.total_events, 7);
        assert_eq!(stats.anomalies, 5);
        assert_eq!(stats.avg_anomaly, 0.68);
        assert_eq!(stats.highest_score, 0.91);
    }
}
