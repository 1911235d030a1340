//! DQL query templates.
//!
//! Queries are built as values rather than strings so every store
//! implementation sees the same structure: the HTTP store renders them to
//! DQL text, the in-memory store evaluates them directly.

use std::collections::BTreeMap;

/// Operation name and result block used by count aggregations.
pub const COUNT_TEMPLATE: Template = Template {
    operation: "Count",
    block: "nodeCount",
};

const UID_VAR: &str = "$uid";
const KEY_VAR: &str = "$id";

/// A typed query variable. DQL passes every variable as a string and
/// parses it against the declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Var {
    Int(i64),
    String(String),
}

impl Var {
    pub fn dql_type(&self) -> &'static str {
        match self {
            Var::Int(_) => "int",
            Var::String(_) => "string",
        }
    }

    pub fn as_param(&self) -> String {
        match self {
            Var::Int(n) => n.to_string(),
            Var::String(s) => s.clone(),
        }
    }
}

/// Named query operation and the key its results come back under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub operation: &'static str,
    pub block: &'static str,
}

/// One level of relationship expansion.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub predicate: &'static str,
    pub fields: &'static [&'static str],
}

/// Fields requested for a record: its own scalars plus one level of edges.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    pub fields: &'static [&'static str],
    pub edges: &'static [Edge],
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `uid($uid)`, restricted to nodes that carry at least one of
    /// `kind_fields`. Dgraph answers `uid()` for any well-formed uid, so
    /// without the restriction a missing node would come back as a bare
    /// `{"uid": ...}`. `uid` itself is ignored if listed.
    Uid {
        uid: String,
        kind_fields: &'static [&'static str],
    },
    /// `eq(<predicate>, $id)`.
    Eq { predicate: &'static str, value: Var },
    /// `has(<predicate>)`. The predicate is interpolated, not bound.
    Has(String),
}

#[derive(Debug, Clone, Copy)]
pub enum Selection {
    Fields(Projection),
    /// `<block>: count(uid)`
    Count,
}

#[derive(Debug, Clone)]
pub struct DqlQuery {
    pub template: Template,
    pub filter: Filter,
    pub selection: Selection,
}

impl DqlQuery {
    /// Count nodes carrying `predicate`. Callers validate the name first.
    pub fn count(predicate: &str) -> Self {
        Self {
            template: COUNT_TEMPLATE,
            filter: Filter::Has(predicate.to_string()),
            selection: Selection::Count,
        }
    }

    pub fn block(&self) -> &'static str {
        self.template.block
    }

    /// Render to DQL text.
    pub fn to_dql(&self) -> String {
        let operation = self.template.operation;
        let block = self.template.block;

        let header = match &self.filter {
            Filter::Uid { .. } => format!("query {operation}({UID_VAR}: string) {{"),
            Filter::Eq { value, .. } => {
                format!("query {operation}({KEY_VAR}: {}) {{", value.dql_type())
            }
            Filter::Has(_) => format!("query {operation} {{"),
        };

        let (root, directive) = match &self.filter {
            Filter::Uid { kind_fields, .. } => {
                let any_field = kind_fields
                    .iter()
                    .filter(|f| **f != "uid")
                    .map(|f| format!("has({f})"))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                (format!("uid({UID_VAR})"), format!(" @filter({any_field})"))
            }
            Filter::Eq { predicate, .. } => (format!("eq({predicate}, {KEY_VAR})"), String::new()),
            Filter::Has(predicate) => (format!("has({predicate})"), String::new()),
        };

        let mut lines = vec![header, format!("  {block}(func: {root}){directive} {{")];
        match self.selection {
            Selection::Fields(projection) => {
                lines.extend(projection.fields.iter().map(|f| format!("    {f}")));
                for edge in projection.edges {
                    lines.push(format!("    {} {{", edge.predicate));
                    lines.extend(edge.fields.iter().map(|f| format!("      {f}")));
                    lines.push("    }".to_string());
                }
            }
            Selection::Count => lines.push(format!("    {block}: count(uid)")),
        }
        lines.push("  }".to_string());
        lines.push("}".to_string());

        let mut dql = lines.join("\n");
        dql.push('\n');
        dql
    }

    /// Variables bound by this query, keyed with their `$` prefix.
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        match &self.filter {
            Filter::Uid { uid, .. } => {
                vars.insert(UID_VAR.to_string(), uid.clone());
            }
            Filter::Eq { value, .. } => {
                vars.insert(KEY_VAR.to_string(), value.as_param());
            }
            Filter::Has(_) => {}
        }
        vars
    }
}

/// Predicate names that are safe to interpolate into query text.
pub fn is_valid_predicate(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Parse a Dgraph uid (`0x2a` or `42`). Zero is never a valid uid.
pub fn parse_uid(uid: &str) -> Option<u64> {
    let n = match uid.strip_prefix("0x").or_else(|| uid.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16).ok()?,
        Some(_) => return None,
        None if !uid.is_empty() && uid.bytes().all(|b| b.is_ascii_digit()) => uid.parse().ok()?,
        None => return None,
    };
    (n != 0).then_some(n)
}
