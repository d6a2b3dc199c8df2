//! Structured object identifiers
//!
//! Every node in the explorer tree is addressed by a dotted, prefix-tagged
//! string such as `db:app.schema:sales.table:orders`. This module turns those
//! strings back into their parts. Older clients still send bare `orders` or
//! `public.orders` names, so the resolver accepts both forms.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema assumed when an identifier does not name one
pub const DEFAULT_SCHEMA: &str = "public";

const DATABASE_PREFIX: &str = "db:";
const SCHEMA_PREFIX: &str = "schema:";
const TABLE_PREFIX: &str = "table:";
const VIEW_PREFIX: &str = "view:";
const FUNCTION_PREFIX: &str = "func:";
const FOLDER_MARKER: &str = ".folder:";

const STRUCTURED_PREFIXES: [&str; 5] = [
    DATABASE_PREFIX,
    SCHEMA_PREFIX,
    TABLE_PREFIX,
    VIEW_PREFIX,
    FUNCTION_PREFIX,
];

/// Kind of object an identifier points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Database,
    Schema,
    Table,
    View,
    Function,
    /// Organizational tree node, never queryable
    Folder,
    Unknown,
}

impl ObjectKind {
    /// Prefix used for this kind in the structured form, for leaf objects only
    fn leaf_prefix(self) -> Option<&'static str> {
        match self {
            ObjectKind::Table => Some(TABLE_PREFIX),
            ObjectKind::View => Some(VIEW_PREFIX),
            ObjectKind::Function => Some(FUNCTION_PREFIX),
            _ => None,
        }
    }

    /// Whether rows can be selected from objects of this kind
    pub fn is_queryable(self) -> bool {
        matches!(self, ObjectKind::Table | ObjectKind::View | ObjectKind::Function)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Database => "database",
            ObjectKind::Schema => "schema",
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::Function => "function",
            ObjectKind::Folder => "folder",
            ObjectKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// An identifier broken into its database, schema and table parts
///
/// Invariants: `Table`, `View` and `Function` identifiers always carry a
/// table name, `Schema` identifiers never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedIdentifier {
    pub database: Option<String>,
    pub schema: String,
    pub table: Option<String>,
    pub kind: ObjectKind,
}

/// A resolved, queryable table-like object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableTarget {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_schema")]
    pub schema: String,
    pub table: String,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl TableTarget {
    pub fn new(database: Option<String>, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database,
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Structured identifier addressing this target as a table
    pub fn identifier(&self) -> String {
        let database = self.database.as_deref();
        ParsedIdentifier::table(database, &self.schema, &self.table)
            .format()
            .unwrap_or_else(|| format!("{SCHEMA_PREFIX}{}.{TABLE_PREFIX}{}", self.schema, self.table))
    }
}

impl ParsedIdentifier {
    /// Identifier of a table in the structured form
    pub fn table(database: Option<&str>, schema: &str, table: &str) -> Self {
        Self {
            database: database.map(str::to_string),
            schema: schema.to_string(),
            table: Some(table.to_string()),
            kind: ObjectKind::Table,
        }
    }

    /// Identifier of a view in the structured form
    pub fn view(database: Option<&str>, schema: &str, view: &str) -> Self {
        Self {
            kind: ObjectKind::View,
            ..Self::table(database, schema, view)
        }
    }

    /// Identifier of a schema node
    pub fn schema(database: Option<&str>, schema: &str) -> Self {
        Self {
            database: database.map(str::to_string),
            schema: schema.to_string(),
            table: None,
            kind: ObjectKind::Schema,
        }
    }

    /// Project onto a queryable target
    ///
    /// Returns `None` for databases, schemas, folders and anything without a
    /// table name.
    pub fn table_target(&self) -> Option<TableTarget> {
        if !self.kind.is_queryable() {
            return None;
        }
        let table = self.table.as_deref().filter(|name| !name.is_empty())?;
        Some(TableTarget::new(self.database.clone(), self.schema.clone(), table))
    }

    /// Render back into the structured string form
    ///
    /// Folder and unknown identifiers have no canonical rendering.
    pub fn format(&self) -> Option<String> {
        let mut segments = Vec::with_capacity(3);
        if let Some(database) = &self.database {
            segments.push(format!("{DATABASE_PREFIX}{database}"));
        }

        match self.kind {
            ObjectKind::Database => {
                if segments.is_empty() {
                    return None;
                }
            }
            ObjectKind::Schema => segments.push(format!("{SCHEMA_PREFIX}{}", self.schema)),
            ObjectKind::Table | ObjectKind::View | ObjectKind::Function => {
                let prefix = self.kind.leaf_prefix()?;
                let table = self.table.as_deref()?;
                segments.push(format!("{SCHEMA_PREFIX}{}", self.schema));
                segments.push(format!("{prefix}{table}"));
            }
            ObjectKind::Folder | ObjectKind::Unknown => return None,
        }

        Some(segments.join("."))
    }
}

/// Resolve an identifier string into its parts
///
/// Never fails. Structured prefixes take precedence over the legacy
/// `schema.table` form, which in turn takes precedence over a bare table
/// name. An empty string resolves to an `Unknown` node.
pub fn resolve(id: &str) -> ParsedIdentifier {
    if STRUCTURED_PREFIXES.iter().any(|prefix| id.contains(prefix)) {
        return resolve_structured(id);
    }

    if let Some((schema, rest)) = id.split_once('.') {
        let table = rest.split('.').next().unwrap_or_default();
        return ParsedIdentifier {
            database: None,
            schema: schema.to_string(),
            table: Some(table.to_string()),
            kind: ObjectKind::Table,
        };
    }

    if id.is_empty() {
        return ParsedIdentifier {
            database: None,
            schema: DEFAULT_SCHEMA.to_string(),
            table: None,
            kind: ObjectKind::Unknown,
        };
    }

    ParsedIdentifier {
        database: None,
        schema: DEFAULT_SCHEMA.to_string(),
        table: Some(id.to_string()),
        kind: ObjectKind::Table,
    }
}

fn resolve_structured(id: &str) -> ParsedIdentifier {
    let mut database = None;
    let mut schema = None;
    let mut leaf: Option<(String, ObjectKind)> = None;

    for segment in id.split('.') {
        if database.is_none() {
            if let Some(name) = segment.strip_prefix(DATABASE_PREFIX) {
                database = Some(name.to_string());
                continue;
            }
        }
        if schema.is_none() {
            if let Some(name) = segment.strip_prefix(SCHEMA_PREFIX) {
                schema = Some(name.to_string());
                continue;
            }
        }
        if leaf.is_none() {
            leaf = [
                (TABLE_PREFIX, ObjectKind::Table),
                (VIEW_PREFIX, ObjectKind::View),
                (FUNCTION_PREFIX, ObjectKind::Function),
            ]
            .into_iter()
            .find_map(|(prefix, kind)| segment.strip_prefix(prefix).map(|name| (name.to_string(), kind)));
        }
    }

    let has_schema = schema.is_some();
    let (table, mut kind) = match leaf {
        Some((name, kind)) => (Some(name), kind),
        None if has_schema => (None, ObjectKind::Schema),
        None if database.is_some() => (None, ObjectKind::Database),
        None => (None, ObjectKind::Unknown),
    };

    if id.contains(FOLDER_MARKER) {
        kind = ObjectKind::Folder;
    }

    ParsedIdentifier {
        database,
        schema: schema.unwrap_or_else(default_schema),
        table,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_two_part_name() {
        let parsed = resolve("public.users");
        assert_eq!(parsed.schema, "public");
        assert_eq!(parsed.table.as_deref(), Some("users"));
        assert_eq!(parsed.kind, ObjectKind::Table);
        assert_eq!(parsed.database, None);
    }

    #[test]
    fn test_bare_table_name() {
        let parsed = resolve("orders");
        assert_eq!(parsed, ParsedIdentifier::table(None, "public", "orders"));
    }

    #[test]
    fn test_structured_identifier() {
        let parsed = resolve("db:app.schema:sales.table:orders");
        assert_eq!(parsed.database.as_deref(), Some("app"));
        assert_eq!(parsed.schema, "sales");
        assert_eq!(parsed.table.as_deref(), Some("orders"));
        assert_eq!(parsed.kind, ObjectKind::Table);
    }

    #[test]
    fn test_folder_forces_kind() {
        let parsed = resolve("db:app.schema:sales.folder:reports");
        assert_eq!(parsed.kind, ObjectKind::Folder);
        assert!(parsed.table_target().is_none());

        let nested = resolve("db:app.schema:sales.table:orders.folder:columns");
        assert_eq!(nested.kind, ObjectKind::Folder);
    }

    #[test]
    fn test_structured_wins_over_dotted_pair() {
        let parsed = resolve("schema:sales.view:monthly");
        assert_eq!(parsed.schema, "sales");
        assert_eq!(parsed.kind, ObjectKind::View);
        assert_eq!(parsed.table.as_deref(), Some("monthly"));
    }

    #[test]
    fn test_missing_schema_defaults_to_public() {
        let parsed = resolve("db:app.func:refresh_totals");
        assert_eq!(parsed.schema, DEFAULT_SCHEMA);
        assert_eq!(parsed.kind, ObjectKind::Function);
    }

    #[test]
    fn test_first_segment_per_prefix_wins() {
        let parsed = resolve("db:one.db:two.schema:a.schema:b.table:x.view:y");
        assert_eq!(parsed.database.as_deref(), Some("one"));
        assert_eq!(parsed.schema, "a");
        assert_eq!(parsed.table.as_deref(), Some("x"));
        assert_eq!(parsed.kind, ObjectKind::Table);
    }

    #[test]
    fn test_container_nodes() {
        let schema = resolve("db:app.schema:sales");
        assert_eq!(schema.kind, ObjectKind::Schema);
        assert_eq!(schema.table, None);

        let database = resolve("db:app");
        assert_eq!(database.kind, ObjectKind::Database);
        assert_eq!(database.format().as_deref(), Some("db:app"));
    }

    #[test]
    fn test_empty_identifier_is_unknown() {
        let parsed = resolve("");
        assert_eq!(parsed.kind, ObjectKind::Unknown);
        assert!(parsed.table_target().is_none());
    }

    #[test]
    fn test_table_round_trip() {
        let identifiers = [
            ParsedIdentifier::table(Some("app"), "sales", "orders"),
            ParsedIdentifier::table(None, "public", "users"),
            ParsedIdentifier::table(Some("warehouse"), "dbo", "Order Items"),
        ];

        for identifier in identifiers {
            let rendered = identifier.format().expect("table identifiers render");
            assert_eq!(resolve(&rendered), identifier, "round trip of {rendered}");
        }
    }

    #[test]
    fn test_table_target_projection() {
        let target = resolve("db:app.schema:sales.table:orders")
            .table_target()
            .expect("table is queryable");
        assert_eq!(target, TableTarget::new(Some("app".into()), "sales", "orders"));
    }

    #[test]
    fn test_target_identifier() {
        let target = TableTarget::new(Some("app".into()), "sales", "orders");
        assert_eq!(target.identifier(), "db:app.schema:sales.table:orders");
        assert_eq!(resolve(&target.identifier()).table_target(), Some(target));
    }
}
