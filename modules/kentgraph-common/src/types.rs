use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};

// --- Records ---
//
// Field names are namespaced by node type (`event.title`, `location.id`).
// The stored schema and every query depend on these exact names.

/// One run of the timetable scraper, keyed by its numeric scrape id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scrape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = "scrape.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(
        rename = "scrape.last_scraped",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_scraped: Option<DateTime<Utc>>,
    #[serde(
        rename = "scrape.found_event",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "edge_list"
    )]
    pub found_events: Vec<Event>,
}

impl Scrape {
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Default::default()
        }
    }

    pub fn with_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

/// A timetabled event (lecture, seminar, ...) as scraped from the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = "event.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "event.title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        rename = "event.description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        rename = "event.start_date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(
        rename = "event.end_date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(
        rename = "event.organiser",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "edge_one"
    )]
    pub organiser: Option<Person>,
    #[serde(
        rename = "event.part_of_module",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "edge_one"
    )]
    pub module: Option<Module>,
    #[serde(
        rename = "event.location",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "edge_one"
    )]
    pub location: Option<Location>,
}

impl Event {
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Default::default()
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }
}

/// A room or venue, keyed by the slug the upstream timetable uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = "location.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "location.name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "location.disabled_access",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub disabled_access: Option<bool>,
}

impl Location {
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Default::default()
        }
    }

    pub fn with_slug(slug: impl Into<String>) -> Self {
        Self {
            id: Some(slug.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = "person.name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = "module.code", default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

// --- Edge decoding ---

/// Single-valued `uid` predicates come back as an object, list predicates
/// as an array. Accept either so a schema change doesn't break decoding.
fn edge_one<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(_) => serde_json::from_value(value)
            .map(Some)
            .map_err(de::Error::custom),
        serde_json::Value::Array(items) => match items.into_iter().next() {
            Some(first) => serde_json::from_value(first)
                .map(Some)
                .map_err(de::Error::custom),
            None => Ok(None),
        },
        _ => Err(de::Error::custom("edge must be an object or an array")),
    }
}

fn edge_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(_) => serde_json::from_value(value).map_err(de::Error::custom),
        serde_json::Value::Object(_) => serde_json::from_value(value)
            .map(|one| vec![one])
            .map_err(de::Error::custom),
        _ => Err(de::Error::custom("edge must be an object or an array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn event_serializes_namespaced_fields() {
        let event = Event {
            id: Some("CO324-lec-1".into()),
            title: Some("Computer Systems".into()),
            start_date: Some(Utc.with_ymd_and_hms(2019, 10, 7, 9, 0, 0).unwrap()),
            location: Some(Location::with_uid("0x2a")),
            ..Default::default()
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({
                "event.id": "CO324-lec-1",
                "event.title": "Computer Systems",
                "event.start_date": "2019-10-07T09:00:00Z",
                "event.location": { "uid": "0x2a" },
            })
        );
    }

    #[test]
    fn unset_fields_are_omitted() {
        let json = serde_json::to_value(Scrape::with_uid("0x1")).unwrap();
        assert_eq!(json, json!({ "uid": "0x1" }));
    }

    #[test]
    fn location_field_names() {
        let loc = Location {
            uid: None,
            id: Some("KS15".into()),
            name: Some("Keynes Seminar Room 15".into()),
            disabled_access: Some(true),
        };
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["location.id"], "KS15");
        assert_eq!(json["location.name"], "Keynes Seminar Room 15");
        assert_eq!(json["location.disabled_access"], true);
    }

    #[test]
    fn single_edge_accepts_object_or_array() {
        let as_object: Event = serde_json::from_value(json!({
            "uid": "0x5",
            "event.organiser": { "uid": "0x9", "person.name": "Dr Smith" },
        }))
        .unwrap();
        let as_array: Event = serde_json::from_value(json!({
            "uid": "0x5",
            "event.organiser": [{ "uid": "0x9", "person.name": "Dr Smith" }],
        }))
        .unwrap();

        assert_eq!(as_object, as_array);
        assert_eq!(
            as_object.organiser.unwrap().name.as_deref(),
            Some("Dr Smith")
        );
    }

    #[test]
    fn list_edge_accepts_single_object() {
        let scrape: Scrape = serde_json::from_value(json!({
            "uid": "0x1",
            "scrape.id": 12,
            "scrape.found_event": { "uid": "0x3", "event.id": "e1" },
        }))
        .unwrap();
        assert_eq!(scrape.found_events.len(), 1);
        assert_eq!(scrape.found_events[0].id.as_deref(), Some("e1"));
    }

    #[test]
    fn missing_edges_decode_empty() {
        let event: Event = serde_json::from_value(json!({ "uid": "0x5" })).unwrap();
        assert!(event.organiser.is_none());
        assert!(event.module.is_none());

        let scrape: Scrape = serde_json::from_value(json!({ "uid": "0x1" })).unwrap();
        assert!(scrape.found_events.is_empty());
    }

    #[test]
    fn scalar_edge_is_rejected() {
        let result: Result<Event, _> =
            serde_json::from_value(json!({ "event.location": "KS15" }));
        assert!(result.is_err());
    }
}
