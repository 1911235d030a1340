//! In-process `GraphStore` for tests.
//!
//! Evaluates the structured query templates against a map of nodes and
//! applies set-mutations with Dgraph's JSON semantics: blank-node labels,
//! nested objects as new or referenced nodes, field-level merge.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dgraph_client::{Assigned, DgraphError};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::query::{parse_uid, DqlQuery, Filter, Projection, Selection, Var};
use crate::store::GraphStore;

#[derive(Debug, Clone)]
enum Stored {
    Scalar(Value),
    /// Single-valued edge, set from a nested object.
    One(u64),
    /// List edge, set from an array of objects. Appends, like `[uid]`.
    Many(Vec<u64>),
}

type Node = BTreeMap<String, Stored>;

#[derive(Debug, Clone)]
struct State {
    nodes: BTreeMap<u64, Node>,
    next_uid: u64,
    next_auto_label: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_uid: 1,
            next_auto_label: 0,
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes, including bare nodes created by uid references.
    pub async fn node_count(&self) -> usize {
        self.state.read().await.nodes.len()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn query(&self, query: &DqlQuery) -> Result<Value, DgraphError> {
        let state = self.state.read().await;
        let matches = state.matching(&query.filter)?;

        let rows: Vec<Value> = match query.selection {
            Selection::Count => {
                let mut row = Map::new();
                row.insert(query.block().to_string(), Value::from(matches.len()));
                vec![Value::Object(row)]
            }
            Selection::Fields(projection) => matches
                .iter()
                .map(|uid| state.project(*uid, &projection))
                .collect(),
        };

        let mut data = Map::new();
        data.insert(query.block().to_string(), Value::Array(rows));
        Ok(Value::Object(data))
    }

    async fn mutate(&self, set: &Value) -> Result<Assigned, DgraphError> {
        let mut guard = self.state.write().await;

        // Work on a copy so a rejected payload leaves nothing behind.
        let mut next = guard.clone();
        let mut uids = BTreeMap::new();
        match set {
            Value::Array(items) => {
                for item in items {
                    next.apply(item, &mut uids)?;
                }
            }
            Value::Object(_) => {
                next.apply(set, &mut uids)?;
            }
            _ => return Err(invalid("set payload must be an object or an array")),
        }
        *guard = next;

        Ok(Assigned {
            code: "Success".to_string(),
            message: "Done".to_string(),
            uids,
        })
    }
}

impl State {
    fn matching(&self, filter: &Filter) -> Result<Vec<u64>, DgraphError> {
        let uids = match filter {
            Filter::Uid { uid, kind_fields } => {
                let uid = parse_uid(uid).ok_or_else(|| invalid(format!("invalid uid {uid:?}")))?;
                self.nodes
                    .get(&uid)
                    .filter(|node| {
                        kind_fields
                            .iter()
                            .any(|f| *f != "uid" && node.contains_key(*f))
                    })
                    .map(|_| vec![uid])
                    .unwrap_or_default()
            }
            Filter::Eq { predicate, value } => self
                .nodes
                .iter()
                .filter(|(_, node)| match node.get(*predicate) {
                    Some(Stored::Scalar(stored)) => scalar_matches(stored, value),
                    _ => false,
                })
                .map(|(uid, _)| *uid)
                .collect(),
            Filter::Has(predicate) => self
                .nodes
                .iter()
                .filter(|(_, node)| node.contains_key(predicate.as_str()))
                .map(|(uid, _)| *uid)
                .collect(),
        };
        Ok(uids)
    }

    fn project(&self, uid: u64, projection: &Projection) -> Value {
        let mut obj = self.fields(uid, projection.fields);
        let Some(node) = self.nodes.get(&uid) else {
            return Value::Object(obj);
        };

        for edge in projection.edges {
            let targets = match node.get(edge.predicate) {
                Some(Stored::One(target)) => {
                    let target = Value::Object(self.fields(*target, edge.fields));
                    obj.insert(edge.predicate.to_string(), target);
                    continue;
                }
                Some(Stored::Many(targets)) if !targets.is_empty() => targets,
                _ => continue,
            };
            let items = targets
                .iter()
                .map(|t| Value::Object(self.fields(*t, edge.fields)))
                .collect();
            obj.insert(edge.predicate.to_string(), Value::Array(items));
        }
        Value::Object(obj)
    }

    fn fields(&self, uid: u64, fields: &[&str]) -> Map<String, Value> {
        let mut obj = Map::new();
        let node = self.nodes.get(&uid);
        for field in fields {
            if *field == "uid" {
                obj.insert("uid".to_string(), Value::String(format!("{uid:#x}")));
                continue;
            }
            if let Some(Stored::Scalar(value)) = node.and_then(|n| n.get(*field)) {
                obj.insert(field.to_string(), value.clone());
            }
        }
        obj
    }

    /// Apply one set object, returning the uid it landed on.
    fn apply(&mut self, item: &Value, uids: &mut BTreeMap<String, String>) -> Result<u64, DgraphError> {
        let obj = item
            .as_object()
            .ok_or_else(|| invalid("set entries must be objects"))?;

        let uid = match obj.get("uid") {
            None => {
                let uid = self.mint();
                let label = format!("dg.{}", self.next_auto_label);
                self.next_auto_label += 1;
                uids.insert(label, format!("{uid:#x}"));
                uid
            }
            Some(Value::String(s)) if s.starts_with("_:") => {
                let label = &s[2..];
                match uids.get(label).and_then(|u| parse_uid(u)) {
                    Some(existing) => existing,
                    None => {
                        let uid = self.mint();
                        uids.insert(label.to_string(), format!("{uid:#x}"));
                        uid
                    }
                }
            }
            Some(Value::String(s)) => {
                let uid = parse_uid(s).ok_or_else(|| invalid(format!("invalid uid {s:?}")))?;
                self.nodes.entry(uid).or_default();
                self.next_uid = self.next_uid.max(uid + 1);
                uid
            }
            Some(other) => return Err(invalid(format!("uid must be a string, got {other}"))),
        };

        let mut writes = Vec::new();
        for (key, value) in obj {
            if key == "uid" {
                continue;
            }
            let stored = match value {
                Value::Null => continue,
                Value::Object(_) => Stored::One(self.apply(value, uids)?),
                Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
                    let mut targets = Vec::with_capacity(items.len());
                    for child in items {
                        targets.push(self.apply(child, uids)?);
                    }
                    Stored::Many(targets)
                }
                scalar => Stored::Scalar(scalar.clone()),
            };
            writes.push((key.clone(), stored));
        }

        let node = self.nodes.entry(uid).or_default();
        for (key, stored) in writes {
            match stored {
                Stored::Many(added) => match node.get_mut(&key) {
                    Some(Stored::Many(existing)) => {
                        for target in added {
                            if !existing.contains(&target) {
                                existing.push(target);
                            }
                        }
                    }
                    _ => {
                        node.insert(key, Stored::Many(added));
                    }
                },
                other => {
                    node.insert(key, other);
                }
            }
        }
        Ok(uid)
    }

    fn mint(&mut self) -> u64 {
        let uid = self.next_uid;
        self.next_uid += 1;
        self.nodes.insert(uid, Node::new());
        uid
    }
}

fn scalar_matches(stored: &Value, wanted: &Var) -> bool {
    match wanted {
        Var::Int(n) => stored.as_i64() == Some(*n),
        Var::String(s) => stored.as_str() == Some(s.as_str()),
    }
}

fn invalid(message: impl Into<String>) -> DgraphError {
    DgraphError::Query {
        code: "ErrorInvalidRequest".to_string(),
        message: message.into(),
    }
}
