//! Entity and relation configuration
//!
//! Static, immutable descriptions of the three relations each entity owns
//! (staging, manifest, target) plus the SQL rendered from them. Definitions
//! are created once at startup and shared read-only across all processing.

use dropsink_common::{DropsinkError, Result};

/// Column carrying the monotonic-write timestamp in staging and target rows.
pub const PROCESSED_AT_COLUMN: &str = "processed_at";

/// NULL token expected in incoming delimited files.
pub const CSV_NULL_TOKEN: &str = "NULL";

/// One column of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    /// Server-side default expression. Columns with a default are filled by
    /// the store and excluded from the bulk-load column list.
    pub server_default: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            server_default: None,
        }
    }

    pub const fn with_default(
        name: &'static str,
        sql_type: &'static str,
        default: &'static str,
    ) -> Self {
        Self {
            name,
            sql_type,
            server_default: Some(default),
        }
    }
}

/// A schema-qualified relation definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub schema: &'static str,
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: Option<&'static str>,
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident)
}

impl TableDef {
    /// Quoted, schema-qualified name, safe for reserved words ("order").
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_ident(self.schema), quote_ident(self.name))
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Columns loaded by the bulk copy: exactly those without a server default.
    pub fn copy_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.server_default.is_none())
            .map(|c| c.name)
            .collect()
    }

    fn quoted_list(names: &[&str]) -> String {
        names
            .iter()
            .map(|n| quote_ident(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_ddl(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| match c.server_default {
                Some(default) => {
                    format!("{} {} DEFAULT {}", quote_ident(c.name), c.sql_type, default)
                },
                None => format!("{} {}", quote_ident(c.name), c.sql_type),
            })
            .collect();

        if let Some(pk) = self.primary_key {
            parts.push(format!("PRIMARY KEY ({})", quote_ident(pk)));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.qualified_name(),
            parts.join(", ")
        )
    }

    pub fn drop_ddl(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualified_name())
    }

    /// COPY statement for the store's streaming bulk-load facility.
    pub fn copy_statement(&self) -> String {
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv, HEADER true, NULL '{}')",
            self.qualified_name(),
            Self::quoted_list(&self.copy_columns()),
            CSV_NULL_TOKEN,
        )
    }
}

/// Fixed manifest layout: one append-only row per ingested file, keyed by
/// content digest.
const MANIFEST_COLUMNS: [ColumnDef; 4] = [
    ColumnDef::new("file_name", "TEXT"),
    ColumnDef::new("digest", "TEXT"),
    ColumnDef::new("file_size", "BIGINT"),
    ColumnDef::new("processed_at", "TIMESTAMPTZ"),
];

/// Build the manifest relation definition for an entity.
pub const fn manifest_table(schema: &'static str, name: &'static str) -> TableDef {
    TableDef {
        schema,
        name,
        columns: &MANIFEST_COLUMNS,
        primary_key: Some("digest"),
    }
}

/// Immutable binding of an entity name to its staging, manifest, and target
/// relations. The target's primary key drives the merge conflict path.
#[derive(Debug, Clone, Copy)]
pub struct EntityConfig {
    pub entity_name: &'static str,
    pub staging: TableDef,
    pub manifest: TableDef,
    pub target: TableDef,
}

impl EntityConfig {
    pub fn primary_key(&self) -> Option<&'static str> {
        self.target.primary_key
    }

    pub fn validate(&self) -> Result<()> {
        let pk = self.primary_key().ok_or_else(|| {
            DropsinkError::Config(format!(
                "entity '{}': target relation has no primary key",
                self.entity_name
            ))
        })?;

        if self.staging.column_names() != self.target.column_names() {
            return Err(DropsinkError::Config(format!(
                "entity '{}': staging and target column layouts differ",
                self.entity_name
            )));
        }

        for table in [&self.staging, &self.target] {
            if !table.column_names().contains(&PROCESSED_AT_COLUMN) {
                return Err(DropsinkError::Config(format!(
                    "entity '{}': relation {} is missing the '{}' column",
                    self.entity_name,
                    table.qualified_name(),
                    PROCESSED_AT_COLUMN
                )));
            }
        }

        if !self.target.column_names().contains(&pk) {
            return Err(DropsinkError::Config(format!(
                "entity '{}': primary key '{}' is not a target column",
                self.entity_name, pk
            )));
        }

        Ok(())
    }

    /// Dedup guard: scalar existence probe on the manifest.
    pub fn dedup_check_sql(&self) -> String {
        format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)",
            self.manifest.qualified_name(),
            quote_ident("digest"),
        )
    }

    pub fn manifest_insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (\"file_name\", \"digest\", \"file_size\", \"processed_at\") \
             VALUES ($1, $2, $3, $4)",
            self.manifest.qualified_name(),
        )
    }

    /// Single server-side upsert: insert unseen keys, overwrite existing rows
    /// only when the staged row's timestamp is strictly newer. Evaluated per
    /// row, so one batch may insert some keys and no-op others.
    ///
    /// Requires a validated config; see [`EntityConfig::validate`].
    pub fn merge_sql(&self) -> String {
        let pk = self
            .primary_key()
            .expect("validated entity config has a primary key");
        let all_columns = TableDef::quoted_list(&self.target.column_names());
        let set_clause = self
            .target
            .column_names()
            .iter()
            .filter(|name| **name != pk)
            .map(|name| format!("{q} = EXCLUDED.{q}", q = quote_ident(name)))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {target} AS t ({all_columns}) \
             SELECT {all_columns} FROM {staging} \
             ON CONFLICT ({pk}) DO UPDATE SET {set_clause} \
             WHERE EXCLUDED.{ts} > t.{ts}",
            target = self.target.qualified_name(),
            staging = self.staging.qualified_name(),
            pk = quote_ident(pk),
            ts = quote_ident(PROCESSED_AT_COLUMN),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAGING_COLUMNS: [ColumnDef; 3] = [
        ColumnDef::new("order_id", "UUID"),
        ColumnDef::new("status", "TEXT"),
        ColumnDef::with_default("processed_at", "TIMESTAMPTZ", "now()"),
    ];

    const TARGET_COLUMNS: [ColumnDef; 3] = [
        ColumnDef::new("order_id", "UUID"),
        ColumnDef::new("status", "TEXT"),
        ColumnDef::new("processed_at", "TIMESTAMPTZ"),
    ];

    fn order_entity() -> EntityConfig {
        EntityConfig {
            entity_name: "order",
            staging: TableDef {
                schema: "raw",
                name: "tmp_order",
                columns: &STAGING_COLUMNS,
                primary_key: Some("order_id"),
            },
            manifest: manifest_table("raw", "order_manifest"),
            target: TableDef {
                schema: "raw",
                name: "order",
                columns: &TARGET_COLUMNS,
                primary_key: Some("order_id"),
            },
        }
    }

    #[test]
    fn test_qualified_name_quotes_reserved_words() {
        assert_eq!(order_entity().target.qualified_name(), "\"raw\".\"order\"");
    }

    #[test]
    fn test_copy_columns_exclude_server_defaults() {
        let staging = order_entity().staging;
        assert_eq!(staging.copy_columns(), vec!["order_id", "status"]);
        assert_eq!(staging.column_names().len(), 3);
    }

    #[test]
    fn test_copy_statement() {
        let stmt = order_entity().staging.copy_statement();
        assert_eq!(
            stmt,
            "COPY \"raw\".\"tmp_order\" (\"order_id\", \"status\") \
             FROM STDIN WITH (FORMAT csv, HEADER true, NULL 'NULL')"
        );
    }

    #[test]
    fn test_create_ddl_renders_defaults_and_primary_key() {
        let ddl = order_entity().staging.create_ddl();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"raw\".\"tmp_order\""));
        assert!(ddl.contains("\"processed_at\" TIMESTAMPTZ DEFAULT now()"));
        assert!(ddl.contains("PRIMARY KEY (\"order_id\")"));
    }

    #[test]
    fn test_merge_sql_gates_on_timestamp() {
        let sql = order_entity().merge_sql();
        assert!(sql.contains("INSERT INTO \"raw\".\"order\" AS t"));
        assert!(sql.contains("ON CONFLICT (\"order_id\") DO UPDATE SET"));
        assert!(sql.contains("\"status\" = EXCLUDED.\"status\""));
        assert!(sql.contains("WHERE EXCLUDED.\"processed_at\" > t.\"processed_at\""));
        // The conflict key itself is never overwritten.
        assert!(!sql.contains("\"order_id\" = EXCLUDED.\"order_id\""));
    }

    #[test]
    fn test_manifest_table_layout() {
        let manifest = manifest_table("raw", "order_manifest");
        assert_eq!(manifest.primary_key, Some("digest"));
        assert_eq!(
            manifest.column_names(),
            vec!["file_name", "digest", "file_size", "processed_at"]
        );
    }

    #[test]
    fn test_validate_accepts_wellformed_entity() {
        assert!(order_entity().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_layout_mismatch() {
        const SHORT_TARGET: [ColumnDef; 2] = [
            ColumnDef::new("order_id", "UUID"),
            ColumnDef::new("processed_at", "TIMESTAMPTZ"),
        ];
        let mut entity = order_entity();
        entity.target = TableDef {
            schema: "raw",
            name: "order",
            columns: &SHORT_TARGET,
            primary_key: Some("order_id"),
        };
        assert!(entity.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_primary_key() {
        let mut entity = order_entity();
        entity.target.primary_key = None;
        assert!(entity.validate().is_err());
    }
}
