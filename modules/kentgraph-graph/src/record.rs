use serde::de::DeserializeOwned;
use serde::Serialize;

use kentgraph_common::{Event, Location, Scrape};

use crate::query::{Edge, Projection, Template, Var};

/// A node type the repository can resolve and upsert.
///
/// Each kind supplies its identity accessors and the fixed query shapes
/// used to fetch it; the repository does the rest generically.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Lowercase node kind. Also the blank-node label used on insert.
    const KIND: &'static str;

    /// Predicate holding the external business id.
    const KEY_PREDICATE: &'static str;

    const BY_UID: Template;
    const BY_KEY: Template;
    const PROJECTION: Projection;

    /// Store-assigned uid, once persisted. Empty strings count as unset.
    fn uid(&self) -> Option<&str>;

    /// External business id as a query variable.
    fn key(&self) -> Option<Var>;
}

impl Record for Scrape {
    const KIND: &'static str = "scrape";
    const KEY_PREDICATE: &'static str = "scrape.id";

    const BY_UID: Template = Template {
        operation: "FindScrape",
        block: "findScrape",
    };
    const BY_KEY: Template = Template {
        operation: "FindScrapeNoID",
        block: "findScrapeNoID",
    };
    const PROJECTION: Projection = Projection {
        fields: &["uid", "scrape.id", "scrape.last_scraped"],
        edges: &[Edge {
            predicate: "scrape.found_event",
            fields: &["uid", "event.id", "event.title"],
        }],
    };

    fn uid(&self) -> Option<&str> {
        self.uid.as_deref().filter(|u| !u.is_empty())
    }

    fn key(&self) -> Option<Var> {
        self.id.map(Var::Int)
    }
}

impl Record for Event {
    const KIND: &'static str = "event";
    const KEY_PREDICATE: &'static str = "event.id";

    const BY_UID: Template = Template {
        operation: "FindEvent",
        block: "findEvent",
    };
    const BY_KEY: Template = Template {
        operation: "FindEventNoUID",
        block: "findEvent",
    };
    const PROJECTION: Projection = Projection {
        fields: &[
            "uid",
            "event.id",
            "event.title",
            "event.description",
            "event.start_date",
            "event.end_date",
        ],
        edges: &[
            Edge {
                predicate: "event.organiser",
                fields: &["uid", "person.name"],
            },
            Edge {
                predicate: "event.part_of_module",
                fields: &["uid", "module.code"],
            },
            Edge {
                predicate: "event.location",
                fields: &["uid", "location.id", "location.name"],
            },
        ],
    };

    fn uid(&self) -> Option<&str> {
        self.uid.as_deref().filter(|u| !u.is_empty())
    }

    fn key(&self) -> Option<Var> {
        self.id.clone().filter(|id| !id.is_empty()).map(Var::String)
    }
}

impl Record for Location {
    const KIND: &'static str = "location";
    const KEY_PREDICATE: &'static str = "location.id";

    const BY_UID: Template = Template {
        operation: "FindLocation",
        block: "findLocation",
    };
    const BY_KEY: Template = Template {
        operation: "FindLocationFromSlug",
        block: "findLocation",
    };
    const PROJECTION: Projection = Projection {
        fields: &[
            "uid",
            "location.id",
            "location.name",
            "location.disabled_access",
        ],
        edges: &[],
    };

    fn uid(&self) -> Option<&str> {
        self.uid.as_deref().filter(|u| !u.is_empty())
    }

    fn key(&self) -> Option<Var> {
        self.id.clone().filter(|id| !id.is_empty()).map(Var::String)
    }
}
