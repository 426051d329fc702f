//! Response-shaped read-models built from stored events.

use super::Event;
use serde::Serialize;
use std::collections::BTreeMap;

/// `timestamp` format in the list view.
pub const LIST_TS_FORMAT: &str = "%Y-%m-%d %H:%M";

/// `date` format in the detail view.
pub const DETAIL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Fallback `incident` text for events without a description.
pub const UNKNOWN_INCIDENT: &str = "Unknown incident";

/// One row of the event list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub id: i64,
    pub timestamp: String,
    pub user: String,
    #[serde(rename = "anomaly")]
    pub anomaly_score: f64,
    pub label: String,
    #[serde(rename = "event")]
    pub event_name: String,
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.unwrap_or_default(),
            timestamp: event.timestamp.format(LIST_TS_FORMAT).to_string(),
            user: event.user.clone(),
            anomaly_score: event.anomaly_score,
            label: event.label.clone(),
            event_name: event.event_name.clone(),
        }
    }
}

/// Full view of a single event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub id: i64,
    pub date: String,
    pub anomaly_score: f64,
    pub incident: String,
    /// Always exactly `ip_address`, `user`, `number` and `location`.
    #[serde(rename = "rowData")]
    pub context_fields: BTreeMap<String, String>,
}

impl From<&Event> for EventDetail {
    fn from(event: &Event) -> Self {
        let or_empty = |v: &Option<String>| v.clone().unwrap_or_default();

        let mut context_fields = BTreeMap::new();
        context_fields.insert("ip_address".to_string(), or_empty(&event.ip_address));
        context_fields.insert("user".to_string(), event.user.clone());
        context_fields.insert("number".to_string(), or_empty(&event.process_id));
        context_fields.insert("location".to_string(), or_empty(&event.location));

        let incident = match event.description.as_deref() {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => UNKNOWN_INCIDENT.to_string(),
        };

        Self {
            id: event.id.unwrap_or_default(),
            date: event.timestamp.format(DETAIL_DATE_FORMAT).to_string(),
            anomaly_score: event.anomaly_score,
            incident,
            context_fields,
        }
    }
}

/// Whole-store summary statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub total_events: u64,
    pub anomalies: u64,
    pub avg_anomaly: f64,
    pub highest_score: f64,
}

impl EventStats {
    pub fn empty() -> Self {
        Self {
            total_events: 0,
            anomalies: 0,
            avg_anomaly: 0.0,
            highest_score: 0.0,
        }
    }
}

/// Round half-up to two decimals: multiply, round, divide.
pub fn round2(x: f64) -> f64 {
    (x * 100.0 + 0.5).floor() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn event() -> Event {
        let ts = NaiveDateTime::parse_from_str("2025-05-19 21:32", "%Y-%m-%d %H:%M").unwrap();
        let mut e = Event::new(ts, "John Aoe", 0.42, "Normal", "Event3");
        e.id = Some(3);
        e
    }

    #[test]
    fn test_summary_json_shape() {
        let json = serde_json::to_value(EventSummary::from(&event())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 3,
                "timestamp": "2025-05-19 21:32",
                "user": "John Aoe",
                "anomaly": 0.42,
                "label": "Normal",
                "event": "Event3",
            })
        );
    }

    #[test]
    fn test_detail_defaults_for_missing_fields() {
        let detail = EventDetail::from(&event());
        assert_eq!(detail.date, "2025-05-19");
        assert_eq!(detail.incident, UNKNOWN_INCIDENT);

        let keys: Vec<_> = detail.context_fields.keys().cloned().collect();
        assert_eq!(keys, vec!["ip_address", "location", "number", "user"]);
        assert_eq!(detail.context_fields["user"], "John Aoe");
        assert_eq!(detail.context_fields["ip_address"], "");
        assert_eq!(detail.context_fields["number"], "");
        assert_eq!(detail.context_fields["location"], "");
    }

    #[test]
    fn test_detail_empty_description_falls_back() {
        let mut e = event();
        e.description = Some(String::new());
        assert_eq!(EventDetail::from(&e).incident, UNKNOWN_INCIDENT);
    }

    #[test]
    fn test_detail_json_shape() {
        let mut e = event();
        e.ip_address = Some("172.158.32.33".to_string());
        e.location = Some("bin/bash".to_string());
        e.process_id = Some("1012303".to_string());
        e.description = Some("User login from an unusual location".to_string());

        let json = serde_json::to_value(EventDetail::from(&e)).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["date"], "2025-05-19");
        assert_eq!(json["anomalyScore"], 0.42);
        assert_eq!(json["incident"], "User login from an unusual location");
        assert_eq!(json["rowData"]["ip_address"], "172.158.32.33");
        assert_eq!(json["rowData"]["number"], "1012303");
        assert_eq!(json["rowData"]["location"], "bin/bash");
        assert_eq!(json["rowData"]["user"], "John Aoe");
    }

    #[test]
    fn test_stats_json_shape() {
        let json = serde_json::to_value(EventStats::empty()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "totalEvents": 0,
                "anomalies": 0,
                "avgAnomaly": 0.0,
                "highestScore": 0.0,
            })
        );
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.6842857142857143), 0.68);
        assert_eq!(round2(0.91), 0.91);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(0.125), 0.13);
    }
}
