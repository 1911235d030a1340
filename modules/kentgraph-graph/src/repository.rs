use std::sync::Arc;

use dgraph_client::Assigned;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use kentgraph_common::{Event, Location, Scrape};

use crate::error::{GraphError, Result};
use crate::query::{is_valid_predicate, parse_uid, DqlQuery, Filter, Selection, Var};
use crate::record::Record;
use crate::store::GraphStore;

/// Lookup and upsert of records by identity.
///
/// Stateless apart from the store handle: every call is one round trip,
/// so a repository can be cloned freely and shared across tasks.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn GraphStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Resolve a caller-built record to the stored one.
    ///
    /// The uid wins when both identities are set. A missing uid is an error
    /// (the caller already held it), a missing external id is `Ok(None)`.
    pub async fn resolve<R: Record>(&self, record: &R) -> Result<Option<R>> {
        if let Some(uid) = record.uid() {
            return self.get_by_uid::<R>(uid).await.map(Some);
        }
        match record.key() {
            Some(key) => self.find_by_key::<R>(key).await,
            None => Err(GraphError::Unidentified { kind: R::KIND }),
        }
    }

    /// Fetch a record by its store uid.
    pub async fn get_by_uid<R: Record>(&self, uid: &str) -> Result<R> {
        if parse_uid(uid).is_none() {
            return Err(GraphError::InvalidUid(uid.to_string()));
        }

        let query = DqlQuery {
            template: R::BY_UID,
            filter: Filter::Uid {
                uid: uid.to_string(),
                kind_fields: R::PROJECTION.fields,
            },
            selection: Selection::Fields(R::PROJECTION),
        };

        self.fetch_first::<R>(&query)
            .await?
            .ok_or_else(|| GraphError::NotFound {
                kind: R::KIND,
                uid: uid.to_string(),
            })
    }

    /// Look up a record by its external business id. Absence is not an error.
    pub async fn find_by_key<R: Record>(&self, key: Var) -> Result<Option<R>> {
        let query = DqlQuery {
            template: R::BY_KEY,
            filter: Filter::Eq {
                predicate: R::KEY_PREDICATE,
                value: key,
            },
            selection: Selection::Fields(R::PROJECTION),
        };
        self.fetch_first::<R>(&query).await
    }

    /// Insert or update a record with a single auto-committed set-mutation.
    ///
    /// Only the fields present on `record` are written; the store merges
    /// them into the existing node. A record without a uid is labelled
    /// `_:<kind>` so its new uid can be read back with `Assigned::uid_for`.
    /// A uid that is not a store uid (including blank-node labels) is
    /// rejected before the round trip. Aborts are returned as-is, never retried.
    pub async fn upsert<R: Record>(&self, record: &R) -> Result<Assigned> {
        let existing = record.uid().map(str::to_string);
        if let Some(uid) = existing.as_deref() {
            if parse_uid(uid).is_none() {
                return Err(GraphError::InvalidUid(uid.to_string()));
            }
        }
        let mut payload =
            serde_json::to_value(record).map_err(|e| GraphError::Encode(e.to_string()))?;

        if existing.is_none() {
            let obj = payload.as_object_mut().ok_or_else(|| {
                GraphError::Encode(format!("{} did not serialize to an object", R::KIND))
            })?;
            obj.insert(
                "uid".to_string(),
                serde_json::Value::String(format!("_:{}", R::KIND)),
            );
        }

        let assigned = self.store.mutate(&payload).await?;

        let uid = existing.as_deref().or_else(|| assigned.uid_for(R::KIND));
        info!(
            kind = R::KIND,
            uid = uid.unwrap_or("unknown"),
            minted = assigned.uids.len(),
            "Upserted record"
        );
        Ok(assigned)
    }

    /// Number of nodes carrying `field`. A rough population count per node type.
    pub async fn count_by_field(&self, field: &str) -> Result<u64> {
        if !is_valid_predicate(field) {
            return Err(GraphError::InvalidPredicate(field.to_string()));
        }

        #[derive(Deserialize)]
        struct CountRow {
            #[serde(rename = "nodeCount")]
            node_count: u64,
        }

        let query = DqlQuery::count(field);
        let data = self.store.query(&query).await?;
        let rows: Vec<CountRow> = decode_block(data, query.block())?;
        rows.first()
            .map(|row| row.node_count)
            .ok_or_else(|| GraphError::Decode(format!("`{}` has no aggregate row", query.block())))
    }

    // --- Per-kind conveniences ---

    pub async fn scrape(&self, scrape: &Scrape) -> Result<Option<Scrape>> {
        self.resolve(scrape).await
    }

    pub async fn upsert_scrape(&self, scrape: &Scrape) -> Result<Assigned> {
        self.upsert(scrape).await
    }

    pub async fn event(&self, event: &Event) -> Result<Option<Event>> {
        self.resolve(event).await
    }

    pub async fn upsert_event(&self, event: &Event) -> Result<Assigned> {
        self.upsert(event).await
    }

    pub async fn location(&self, location: &Location) -> Result<Option<Location>> {
        self.resolve(location).await
    }

    /// Find a location by the slug the upstream timetable uses for it.
    pub async fn location_by_slug(&self, slug: &str) -> Result<Option<Location>> {
        self.find_by_key::<Location>(Var::String(slug.to_string()))
            .await
    }

    pub async fn upsert_location(&self, location: &Location) -> Result<Assigned> {
        self.upsert(location).await
    }

    async fn fetch_first<R: Record>(&self, query: &DqlQuery) -> Result<Option<R>> {
        let data = self.store.query(query).await?;
        let rows: Vec<R> = decode_block(data, query.block())?;
        debug!(kind = R::KIND, matches = rows.len(), "Lookup finished");
        Ok(rows.into_iter().next())
    }
}

/// Pull the result list for `block` out of a query's `data` object.
fn decode_block<T: DeserializeOwned>(mut data: serde_json::Value, block: &str) -> Result<Vec<T>> {
    let rows = data
        .as_object_mut()
        .and_then(|obj| obj.remove(block))
        .ok_or_else(|| GraphError::Decode(format!("response is missing `{block}`")))?;
    serde_json::from_value(rows).map_err(|e| GraphError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use dgraph_client::DgraphError;
    use serde_json::json;
    use std::sync::Mutex;

    use super::*;
    use crate::memory::MemoryStore;
    use kentgraph_common::{Module, Person};

    fn repo() -> (Arc<MemoryStore>, Repository) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Repository::new(store))
    }

    /// Store that answers every query with a fixed payload and records what it was sent.
    struct CannedStore {
        response: serde_json::Value,
        seen: Mutex<Vec<String>>,
    }

    impl CannedStore {
        fn new(response: serde_json::Value) -> Self {
            Self {
                response,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GraphStore for CannedStore {
        async fn query(&self, query: &DqlQuery) -> std::result::Result<serde_json::Value, DgraphError> {
            self.seen.lock().unwrap().push(query.template.operation.to_string());
            Ok(self.response.clone())
        }

        async fn mutate(&self, _set: &serde_json::Value) -> std::result::Result<Assigned, DgraphError> {
            Err(DgraphError::Aborted(
                "Transaction has been aborted. Please retry".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn insert_then_resolve_by_uid() {
        let (_, repo) = repo();
        let scraped_at = Utc.with_ymd_and_hms(2019, 10, 1, 12, 0, 0).unwrap();

        let assigned = repo
            .upsert(&Scrape {
                id: Some(501),
                last_scraped: Some(scraped_at),
                ..Default::default()
            })
            .await
            .unwrap();
        let uid = assigned.uid_for("scrape").expect("minted uid").to_string();

        let found: Scrape = repo.get_by_uid(&uid).await.unwrap();
        assert_eq!(found.uid.as_deref(), Some(uid.as_str()));
        assert_eq!(found.id, Some(501));
        assert_eq!(found.last_scraped, Some(scraped_at));
    }

    #[tokio::test]
    async fn resolve_by_key_finds_inserted_record() {
        let (_, repo) = repo();
        repo.upsert(&Location {
            id: Some("KS15".into()),
            name: Some("Keynes Seminar Room 15".into()),
            disabled_access: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();

        let found = repo
            .resolve(&Location::with_slug("KS15"))
            .await
            .unwrap()
            .expect("location");
        assert!(found.uid.is_some());
        assert_eq!(found.name.as_deref(), Some("Keynes Seminar Room 15"));
        assert_eq!(found.disabled_access, Some(true));
    }

    #[tokio::test]
    async fn missing_key_is_none_not_error() {
        let (_, repo) = repo();
        let found = repo.resolve(&Event::with_id("no-such-event")).await.unwrap();
        assert!(found.is_none());
        assert!(repo.location_by_slug("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_uid_is_not_found_error() {
        let (_, repo) = repo();
        let err = repo.resolve(&Scrape::with_uid("0x999")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("0x999"));
    }

    #[tokio::test]
    async fn uid_of_other_kind_is_not_found() {
        let (_, repo) = repo();
        let assigned = repo
            .upsert(&Location::with_slug("KS15"))
            .await
            .unwrap();
        let uid = assigned.uid_for("location").unwrap();

        let err = repo.get_by_uid::<Event>(uid).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn record_without_external_id_resolves_by_uid() {
        let (_, repo) = repo();
        let assigned = repo
            .upsert(&Location {
                name: Some("Unnamed room".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let uid = assigned.uid_for("location").unwrap().to_string();

        let found: Location = repo.get_by_uid(&uid).await.unwrap();
        assert_eq!(found.uid.as_deref(), Some(uid.as_str()));
        assert_eq!(found.name.as_deref(), Some("Unnamed room"));
        assert_eq!(found.id, None);

        let event = repo
            .upsert(&Event {
                title: Some("Drop-in session".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let event_uid = event.uid_for("event").unwrap();
        let found: Event = repo.get_by_uid(event_uid).await.unwrap();
        assert_eq!(found.title.as_deref(), Some("Drop-in session"));
    }

    #[tokio::test]
    async fn bare_referenced_node_is_not_found() {
        let (_, repo) = repo();
        // Referencing a location by uid creates an empty node on the store side.
        repo.upsert(&Event {
            id: Some("e1".into()),
            location: Some(Location::with_uid("0x50")),
            ..Default::default()
        })
        .await
        .unwrap();

        let err = repo.get_by_uid::<Location>("0x50").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn uid_takes_priority_over_key() {
        let (_, repo) = repo();
        let a = repo.upsert(&Event::with_id("a")).await.unwrap();
        repo.upsert(&Event::with_id("b")).await.unwrap();
        let uid_a = a.uid_for("event").unwrap().to_string();

        let probe = Event {
            uid: Some(uid_a.clone()),
            id: Some("b".into()),
            ..Default::default()
        };
        let found = repo.resolve(&probe).await.unwrap().unwrap();
        assert_eq!(found.uid.as_deref(), Some(uid_a.as_str()));
        assert_eq!(found.id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn unidentified_record_is_rejected() {
        let (_, repo) = repo();
        let err = repo.resolve(&Location::default()).await.unwrap_err();
        assert!(matches!(err, GraphError::Unidentified { kind: "location" }));

        let err = repo.resolve(&Event::with_id("")).await.unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn malformed_uid_is_rejected() {
        let (_, repo) = repo();
        let err = repo.get_by_uid::<Scrape>("not-a-uid").await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidUid(_)));
    }

    #[tokio::test]
    async fn upsert_rejects_malformed_uid() {
        let (store, repo) = repo();
        for uid in ["not-a-uid", "_:x", "0x0"] {
            let err = repo
                .upsert(&Location {
                    uid: Some(uid.into()),
                    name: Some("Keynes 15".into()),
                    ..Default::default()
                })
                .await
                .unwrap_err();
            assert!(matches!(err, GraphError::InvalidUid(ref u) if u == uid));
            assert!(err.is_invalid_input());
        }
        assert_eq!(store.node_count().await, 0);
    }

    #[tokio::test]
    async fn event_resolves_with_one_level_of_edges() {
        let (_, repo) = repo();
        let loc = repo
            .upsert(&Location {
                id: Some("RLT1".into()),
                name: Some("Rutherford Lecture Theatre 1".into()),
                disabled_access: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        let loc_uid = loc.uid_for("location").unwrap().to_string();

        repo.upsert(&Event {
            id: Some("CO324-lec-1".into()),
            title: Some("Computer Systems".into()),
            description: Some("Weekly lecture".into()),
            start_date: Some(Utc.with_ymd_and_hms(2019, 10, 7, 9, 0, 0).unwrap()),
            end_date: Some(Utc.with_ymd_and_hms(2019, 10, 7, 10, 0, 0).unwrap()),
            organiser: Some(Person {
                uid: None,
                name: Some("Dr Smith".into()),
            }),
            module: Some(Module {
                uid: None,
                code: Some("CO324".into()),
            }),
            location: Some(Location::with_uid(loc_uid.clone())),
            ..Default::default()
        })
        .await
        .unwrap();

        let event = repo.event(&Event::with_id("CO324-lec-1")).await.unwrap().unwrap();
        assert_eq!(event.title.as_deref(), Some("Computer Systems"));
        assert_eq!(event.organiser.unwrap().name.as_deref(), Some("Dr Smith"));
        assert_eq!(event.module.unwrap().code.as_deref(), Some("CO324"));

        let location = event.location.unwrap();
        assert_eq!(location.uid.as_deref(), Some(loc_uid.as_str()));
        assert_eq!(location.id.as_deref(), Some("RLT1"));
        // Projection stops at id and name for the nested location.
        assert_eq!(location.disabled_access, None);
    }

    #[tokio::test]
    async fn scrape_lists_found_events() {
        let (_, repo) = repo();
        let e1 = repo.upsert(&Event::with_id("e1")).await.unwrap();
        let e2 = repo.upsert(&Event::with_id("e2")).await.unwrap();

        repo.upsert(&Scrape {
            id: Some(7),
            found_events: vec![
                Event::with_uid(e1.uid_for("event").unwrap()),
                Event::with_uid(e2.uid_for("event").unwrap()),
            ],
            ..Default::default()
        })
        .await
        .unwrap();

        let scrape = repo.scrape(&Scrape::with_id(7)).await.unwrap().unwrap();
        let ids: Vec<_> = scrape
            .found_events
            .iter()
            .filter_map(|e| e.id.as_deref())
            .collect();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[tokio::test]
    async fn partial_upsert_merges_fields() {
        let (_, repo) = repo();
        let assigned = repo
            .upsert(&Location {
                id: Some("KS15".into()),
                name: Some("Keynes 15".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let uid = assigned.uid_for("location").unwrap().to_string();

        repo.upsert(&Location {
            uid: Some(uid.clone()),
            disabled_access: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();

        let loc: Location = repo.get_by_uid(&uid).await.unwrap();
        assert_eq!(loc.name.as_deref(), Some("Keynes 15"));
        assert_eq!(loc.disabled_access, Some(true));
    }

    #[tokio::test]
    async fn upsert_with_uid_does_not_duplicate() {
        let (_, repo) = repo();
        let location = Location {
            id: Some("KS15".into()),
            name: Some("Keynes 15".into()),
            ..Default::default()
        };
        let assigned = repo.upsert(&location).await.unwrap();
        let stored = Location {
            uid: assigned.uid_for("location").map(str::to_string),
            ..location
        };

        let before = repo.count_by_field("location.id").await.unwrap();
        for _ in 0..3 {
            let again = repo.upsert(&stored).await.unwrap();
            assert!(again.uids.is_empty());
        }
        assert_eq!(repo.count_by_field("location.id").await.unwrap(), before);
    }

    #[tokio::test]
    async fn count_tracks_inserts() {
        let (_, repo) = repo();
        assert_eq!(repo.count_by_field("location.id").await.unwrap(), 0);

        repo.upsert(&Location::with_slug("KS15")).await.unwrap();
        assert_eq!(repo.count_by_field("location.id").await.unwrap(), 1);

        repo.upsert(&Location::with_slug("KS16")).await.unwrap();
        assert_eq!(repo.count_by_field("location.id").await.unwrap(), 2);
        assert_eq!(repo.count_by_field("event.id").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn count_rejects_unsafe_field_names() {
        let (_, repo) = repo();
        let err = repo
            .count_by_field("location.id) { uid } x(func: has(y)")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidPredicate(_)));
    }

    #[tokio::test]
    async fn missing_envelope_key_is_decode_error() {
        let store = Arc::new(CannedStore::new(json!({ "somethingElse": [] })));
        let repo = Repository::new(store.clone());

        let err = repo.resolve(&Scrape::with_id(1)).await.unwrap_err();
        assert!(matches!(err, GraphError::Decode(_)));
        assert_eq!(store.seen.lock().unwrap().as_slice(), ["FindScrapeNoID"]);
    }

    #[tokio::test]
    async fn wrong_field_type_is_decode_error() {
        let store = Arc::new(CannedStore::new(json!({
            "findScrape": [{ "uid": "0x1", "scrape.id": "not a number" }]
        })));
        let repo = Repository::new(store);

        let err = repo.get_by_uid::<Scrape>("0x1").await.unwrap_err();
        assert!(matches!(err, GraphError::Decode(_)));
    }

    #[tokio::test]
    async fn empty_count_aggregate_is_decode_error() {
        let repo = Repository::new(Arc::new(CannedStore::new(json!({ "nodeCount": [] }))));
        let err = repo.count_by_field("location.id").await.unwrap_err();
        assert!(matches!(err, GraphError::Decode(_)));
    }

    #[tokio::test]
    async fn abort_is_passed_through() {
        let repo = Repository::new(Arc::new(CannedStore::new(json!({}))));
        let err = repo.upsert(&Scrape::with_id(1)).await.unwrap_err();
        assert!(err.is_aborted());
    }
}
