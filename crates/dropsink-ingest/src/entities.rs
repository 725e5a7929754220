//! Built-in entity definitions
//!
//! Static relation layouts for the entities the daemon knows how to ingest.
//! The staging `processed_at` column carries a server default, so it is
//! filled at load time and excluded from the bulk-copy column list; the
//! incoming files supply every other column in this order.

use crate::entity::{manifest_table, ColumnDef, EntityConfig, TableDef};

const RAW_SCHEMA: &str = "raw";

const ORDER_STAGING_COLUMNS: [ColumnDef; 8] = [
    ColumnDef::new("order_id", "UUID"),
    ColumnDef::new("order_ts", "TIMESTAMPTZ"),
    ColumnDef::new("customer_id", "TEXT"),
    ColumnDef::new("product_id", "TEXT"),
    ColumnDef::new("quantity", "INTEGER"),
    ColumnDef::new("price_per_unit", "NUMERIC(10,2)"),
    ColumnDef::new("status", "TEXT"),
    ColumnDef::with_default("processed_at", "TIMESTAMPTZ", "now()"),
];

const ORDER_TARGET_COLUMNS: [ColumnDef; 8] = [
    ColumnDef::new("order_id", "UUID"),
    ColumnDef::new("order_ts", "TIMESTAMPTZ"),
    ColumnDef::new("customer_id", "TEXT"),
    ColumnDef::new("product_id", "TEXT"),
    ColumnDef::new("quantity", "INTEGER"),
    ColumnDef::new("price_per_unit", "NUMERIC(10,2)"),
    ColumnDef::new("status", "TEXT"),
    ColumnDef::new("processed_at", "TIMESTAMPTZ"),
];

pub fn order() -> EntityConfig {
    EntityConfig {
        entity_name: "order",
        staging: TableDef {
            schema: RAW_SCHEMA,
            name: "tmp_order",
            columns: &ORDER_STAGING_COLUMNS,
            primary_key: Some("order_id"),
        },
        manifest: manifest_table(RAW_SCHEMA, "order_manifest"),
        target: TableDef {
            schema: RAW_SCHEMA,
            name: "order",
            columns: &ORDER_TARGET_COLUMNS,
            primary_key: Some("order_id"),
        },
    }
}

const CUSTOMER_STAGING_COLUMNS: [ColumnDef; 5] = [
    ColumnDef::new("customer_id", "UUID"),
    ColumnDef::new("first_name", "TEXT"),
    ColumnDef::new("last_name", "TEXT"),
    ColumnDef::new("email", "TEXT"),
    ColumnDef::with_default("processed_at", "TIMESTAMPTZ", "now()"),
];

const CUSTOMER_TARGET_COLUMNS: [ColumnDef; 5] = [
    ColumnDef::new("customer_id", "UUID"),
    ColumnDef::new("first_name", "TEXT"),
    ColumnDef::new("last_name", "TEXT"),
    ColumnDef::new("email", "TEXT"),
    ColumnDef::new("processed_at", "TIMESTAMPTZ"),
];

pub fn customer() -> EntityConfig {
    EntityConfig {
        entity_name: "customer",
        staging: TableDef {
            schema: RAW_SCHEMA,
            name: "tmp_customer",
            columns: &CUSTOMER_STAGING_COLUMNS,
            primary_key: Some("customer_id"),
        },
        manifest: manifest_table(RAW_SCHEMA, "customer_manifest"),
        target: TableDef {
            schema: RAW_SCHEMA,
            name: "customer",
            columns: &CUSTOMER_TARGET_COLUMNS,
            primary_key: Some("customer_id"),
        },
    }
}

/// Resolve an entity name from configuration to its definition.
pub fn by_name(name: &str) -> Option<EntityConfig> {
    match name.to_lowercase().as_str() {
        "order" => Some(order()),
        "customer" => Some(customer()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_resolves_known_entities() {
        assert_eq!(by_name("order").unwrap().entity_name, "order");
        assert_eq!(by_name("Customer").unwrap().entity_name, "customer");
        assert!(by_name("product").is_none());
    }

    #[test]
    fn test_builtin_entities_validate() {
        order().validate().unwrap();
        customer().validate().unwrap();
    }

    #[test]
    fn test_order_copy_columns_exclude_processed_at() {
        let staging = order().staging;
        assert_eq!(
            staging.copy_columns(),
            vec![
                "order_id",
                "order_ts",
                "customer_id",
                "product_id",
                "quantity",
                "price_per_unit",
                "status"
            ]
        );
    }

    #[test]
    fn test_order_target_is_reserved_word_safe() {
        assert_eq!(order().target.qualified_name(), "\"raw\".\"order\"");
    }
}
