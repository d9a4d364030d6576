use crate::models::{
    AttributeRow, ImageRow, InventoryRow, OrderRow, ProductRow, QualityRow, RevenueRow,
    StockFindingRow, VariationRow,
};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::query_builder::Separated;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Fixed batch size bounding per-statement payload, inherited from the
/// source system's ingestion batches.
const BATCH_SIZE: usize = 500;

const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Table identity for the generic merge-upsert: natural-key columns are the
/// conflict target and stay immutable; every data column is overwritten from
/// the incoming row.
pub struct TableSpec {
    pub table: &'static str,
    pub key_columns: &'static [&'static str],
    pub data_columns: &'static [&'static str],
}

impl TableSpec {
    fn insert_prefix(&self) -> String {
        let columns: Vec<&str> = self
            .key_columns
            .iter()
            .chain(self.data_columns.iter())
            .copied()
            .collect();
        format!("INSERT INTO {} ({}) ", self.table, columns.join(", "))
    }

    fn conflict_clause(&self) -> String {
        let updates: Vec<String> = self
            .data_columns
            .iter()
            .map(|col| format!("{col} = EXCLUDED.{col}"))
            .collect();
        format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            self.key_columns.join(", "),
            updates.join(", ")
        )
    }
}

/// A row that knows its table, its natural key, and how to bind itself in
/// the column order the table declares (key columns first).
pub trait Upsertable {
    fn spec() -> &'static TableSpec;
    fn dedup_key(&self) -> String;
    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>);
}

/// What one entity's persistence actually did: written rows and skipped
/// batches are counted, not just printed, so callers can surface them.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PersistOutcome {
    pub rows_written: u64,
    pub batches_failed: u32,
}

impl PersistOutcome {
    pub fn message(&self, entity: &str) -> String {
        if self.batches_failed == 0 {
            format!("{} registros de {entity} salvos com sucesso.", self.rows_written)
        } else {
            format!(
                "{} registros de {entity} salvos ({} lote(s) com falha).",
                self.rows_written, self.batches_failed
            )
        }
    }
}

#[derive(Clone)]
pub struct SyncStore {
    pool: PgPool,
}

impl SyncStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(5);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        info!(target = "mercurio.store", "connected to database");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply `migrations/` when AUTO_MIGRATE is enabled. Off by default so
    /// the service can run against externally managed schemas.
    pub async fn migrate_if_enabled(&self) -> Result<(), StoreError> {
        let enabled = std::env::var("AUTO_MIGRATE")
            .map(|raw| {
                matches!(
                    raw.trim().to_lowercase().as_str(),
                    "1" | "true" | "on" | "yes"
                )
            })
            .unwrap_or(false);
        if enabled {
            info!(target = "mercurio.store", "running migrations");
            sqlx::migrate!().run(&self.pool).await?;
        }
        Ok(())
    }

    /// Merge-upsert a batch of rows. Rows are deduplicated by natural key
    /// first (last occurrence wins), then written in fixed-size batches; a
    /// failed batch is counted and skipped while the rest still commit.
    pub async fn upsert<T: Upsertable>(&self, rows: &[T]) -> PersistOutcome {
        let spec = T::spec();
        let deduped = dedup_last(rows);
        let mut outcome = PersistOutcome::default();
        for chunk in deduped.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(spec.insert_prefix());
            qb.push_values(chunk.iter(), |mut b, row| row.bind(&mut b));
            qb.push(spec.conflict_clause());
            match qb.build().persistent(false).execute(&self.pool).await {
                Ok(done) => outcome.rows_written += done.rows_affected(),
                Err(err) => {
                    outcome.batches_failed += 1;
                    warn!(
                        target = "mercurio.store",
                        table = spec.table,
                        rows = chunk.len(),
                        error = %err,
                        "batch upsert failed, skipping batch"
                    );
                }
            }
        }
        outcome
    }

    /// Remove every row the seller owns across the platform's tables, in one
    /// transaction. Runs before inserting the fresh sync so the store never
    /// mixes stale and fresh rows for a seller.
    pub async fn purge_seller(
        &self,
        platform: &str,
        seller: &str,
        tables: &[&str],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for table in tables {
            let sql = format!("DELETE FROM {table} WHERE platform = $1 AND seller = $2");
            sqlx::query(&sql)
                .bind(platform)
                .bind(seller)
                .persistent(false)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!(
            target = "mercurio.store",
            platform, seller, "purged previous sync rows"
        );
        Ok(())
    }
}

/// Last occurrence per natural key wins, preserving first-seen order;
/// duplicate upstream pages must not resurrect older field values.
fn dedup_last<T: Upsertable>(rows: &[T]) -> Vec<&T> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<&T> = Vec::new();
    for row in rows {
        let key = row.dedup_key();
        match index.get(&key) {
            Some(&pos) => kept[pos] = row,
            None => {
                index.insert(key, kept.len());
                kept.push(row);
            }
        }
    }
    kept
}

fn join_key(parts: &[&str]) -> String {
    let mut key = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(part);
    }
    key
}

static PRODUCTS: TableSpec = TableSpec {
    table: "products",
    key_columns: &["sku", "seller", "platform"],
    data_columns: &[
        "seller_sku",
        "title",
        "description",
        "brand",
        "status",
        "category",
        "price",
        "stock_quantity",
        "created_at",
        "updated_at",
        "image_count",
        "permalink",
        "gtin",
        "warranty",
        "health",
        "condition_label",
        "product_type",
        "main_image_url",
        "main_image_width",
        "main_image_height",
        "variation_count",
        "initial_quantity",
        "sold_quantity",
        "accepts_gateway_payment",
        "synced_at",
    ],
};

impl Upsertable for ProductRow {
    fn spec() -> &'static TableSpec {
        &PRODUCTS
    }

    fn dedup_key(&self) -> String {
        join_key(&[&self.sku, &self.seller, &self.platform])
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.sku.clone())
            .push_bind(self.seller.clone())
            .push_bind(self.platform.clone())
            .push_bind(self.seller_sku.clone())
            .push_bind(self.title.clone())
            .push_bind(self.description.clone())
            .push_bind(self.brand.clone())
            .push_bind(self.status.clone())
            .push_bind(self.category.clone())
            .push_bind(self.price)
            .push_bind(self.stock_quantity)
            .push_bind(self.created_at)
            .push_bind(self.updated_at)
            .push_bind(self.image_count)
            .push_bind(self.permalink.clone())
            .push_bind(self.gtin.clone())
            .push_bind(self.warranty.clone())
            .push_bind(self.health.clone())
            .push_bind(self.condition_label.clone())
            .push_bind(self.product_type.clone())
            .push_bind(self.main_image_url.clone())
            .push_bind(self.main_image_width)
            .push_bind(self.main_image_height)
            .push_bind(self.variation_count)
            .push_bind(self.initial_quantity)
            .push_bind(self.sold_quantity)
            .push_bind(self.accepts_gateway_payment)
            .push_bind(self.synced_at);
    }
}

static PRODUCT_IMAGES: TableSpec = TableSpec {
    table: "product_images",
    key_columns: &["image_id", "sku", "seller", "platform"],
    data_columns: &["url", "resolution", "synced_at"],
};

impl Upsertable for ImageRow {
    fn spec() -> &'static TableSpec {
        &PRODUCT_IMAGES
    }

    fn dedup_key(&self) -> String {
        join_key(&[&self.image_id, &self.sku, &self.seller, &self.platform])
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.image_id.clone())
            .push_bind(self.sku.clone())
            .push_bind(self.seller.clone())
            .push_bind(self.platform.clone())
            .push_bind(self.url.clone())
            .push_bind(self.resolution.clone())
            .push_bind(self.synced_at);
    }
}

static PRODUCT_ATTRIBUTES: TableSpec = TableSpec {
    table: "product_attributes",
    key_columns: &["sku", "name", "seller", "platform"],
    data_columns: &["value", "synced_at"],
};

impl Upsertable for AttributeRow {
    fn spec() -> &'static TableSpec {
        &PRODUCT_ATTRIBUTES
    }

    fn dedup_key(&self) -> String {
        join_key(&[&self.sku, &self.name, &self.seller, &self.platform])
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.sku.clone())
            .push_bind(self.name.clone())
            .push_bind(self.seller.clone())
            .push_bind(self.platform.clone())
            .push_bind(self.value.clone())
            .push_bind(self.synced_at);
    }
}

static PRODUCT_VARIATIONS: TableSpec = TableSpec {
    table: "product_variations",
    key_columns: &["variation_id", "sku", "attribute", "seller", "platform"],
    data_columns: &["price", "value", "synced_at"],
};

impl Upsertable for VariationRow {
    fn spec() -> &'static TableSpec {
        &PRODUCT_VARIATIONS
    }

    fn dedup_key(&self) -> String {
        join_key(&[
            &self.variation_id,
            &self.sku,
            &self.attribute,
            &self.seller,
            &self.platform,
        ])
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.variation_id.clone())
            .push_bind(self.sku.clone())
            .push_bind(self.attribute.clone())
            .push_bind(self.seller.clone())
            .push_bind(self.platform.clone())
            .push_bind(self.price)
            .push_bind(self.value.clone())
            .push_bind(self.synced_at);
    }
}

static ORDERS: TableSpec = TableSpec {
    table: "orders",
    key_columns: &["order_id", "seller", "platform"],
    data_columns: &[
        "status",
        "purchase_date",
        "updated_at",
        "sales_channel",
        "fulfillment_channel",
        "payment_status",
        "payment_method",
        "total_amount",
        "currency",
        "buyer_city",
        "ship_state",
        "ship_city",
        "items_shipped",
        "items_unshipped",
        "is_prime",
        "is_business",
        "synced_at",
    ],
};

impl Upsertable for OrderRow {
    fn spec() -> &'static TableSpec {
        &ORDERS
    }

    fn dedup_key(&self) -> String {
        join_key(&[&self.order_id, &self.seller, &self.platform])
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.order_id.clone())
            .push_bind(self.seller.clone())
            .push_bind(self.platform.clone())
            .push_bind(self.status.clone())
            .push_bind(self.purchase_date)
            .push_bind(self.updated_at)
            .push_bind(self.sales_channel.clone())
            .push_bind(self.fulfillment_channel.clone())
            .push_bind(self.payment_status.clone())
            .push_bind(self.payment_method.clone())
            .push_bind(self.total_amount.clone())
            .push_bind(self.currency.clone())
            .push_bind(self.buyer_city.clone())
            .push_bind(self.ship_state.clone())
            .push_bind(self.ship_city.clone())
            .push_bind(self.items_shipped)
            .push_bind(self.items_unshipped)
            .push_bind(self.is_prime)
            .push_bind(self.is_business)
            .push_bind(self.synced_at);
    }
}

static INVENTORY_SNAPSHOTS: TableSpec = TableSpec {
    table: "inventory_snapshots",
    key_columns: &["asin", "seller", "platform"],
    data_columns: &[
        "fnsku",
        "condition_label",
        "product_name",
        "fulfillable_quantity",
        "inbound_receiving",
        "reserved_total",
        "reserved_customer",
        "reserved_transit",
        "reserved_processing",
        "researching_total",
        "unfulfillable_total",
        "unf_customer_damaged",
        "unf_warehouse_damaged",
        "unf_distributor_damaged",
        "unf_carrier_damaged",
        "unf_defective",
        "unf_expired",
        "future_reserved",
        "future_buyable",
        "total_quantity",
        "last_updated",
        "synced_at",
    ],
};

impl Upsertable for InventoryRow {
    fn spec() -> &'static TableSpec {
        &INVENTORY_SNAPSHOTS
    }

    fn dedup_key(&self) -> String {
        join_key(&[&self.asin, &self.seller, &self.platform])
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.asin.clone())
            .push_bind(self.seller.clone())
            .push_bind(self.platform.clone())
            .push_bind(self.fnsku.clone())
            .push_bind(self.condition_label.clone())
            .push_bind(self.product_name.clone())
            .push_bind(self.fulfillable_quantity)
            .push_bind(self.inbound_receiving)
            .push_bind(self.reserved_total)
            .push_bind(self.reserved_customer)
            .push_bind(self.reserved_transit)
            .push_bind(self.reserved_processing)
            .push_bind(self.researching_total)
            .push_bind(self.unfulfillable_total)
            .push_bind(self.unf_customer_damaged)
            .push_bind(self.unf_warehouse_damaged)
            .push_bind(self.unf_distributor_damaged)
            .push_bind(self.unf_carrier_damaged)
            .push_bind(self.unf_defective)
            .push_bind(self.unf_expired)
            .push_bind(self.future_reserved)
            .push_bind(self.future_buyable)
            .push_bind(self.total_quantity)
            .push_bind(self.last_updated)
            .push_bind(self.synced_at);
    }
}

static REVENUE_PERIODS: TableSpec = TableSpec {
    table: "revenue_periods",
    key_columns: &["period_start", "period_end", "seller", "platform"],
    data_columns: &[
        "units_sold",
        "order_items",
        "orders_count",
        "avg_unit_price",
        "unit_currency",
        "total_sales",
        "sales_currency",
        "synced_at",
    ],
};

impl Upsertable for RevenueRow {
    fn spec() -> &'static TableSpec {
        &REVENUE_PERIODS
    }

    fn dedup_key(&self) -> String {
        join_key(&[
            &self.period_start,
            &self.period_end,
            &self.seller,
            &self.platform,
        ])
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.period_start.clone())
            .push_bind(self.period_end.clone())
            .push_bind(self.seller.clone())
            .push_bind(self.platform.clone())
            .push_bind(self.units_sold)
            .push_bind(self.order_items)
            .push_bind(self.orders_count)
            .push_bind(self.avg_unit_price)
            .push_bind(self.unit_currency.clone())
            .push_bind(self.total_sales)
            .push_bind(self.sales_currency.clone())
            .push_bind(self.synced_at);
    }
}

static QUALITY_FINDINGS: TableSpec = TableSpec {
    table: "quality_findings",
    key_columns: &["sku", "seller", "platform"],
    data_columns: &[
        "product",
        "status",
        "title_check",
        "image_count_check",
        "image_resolution_check",
        "description_check",
        "brand_check",
        "attributes_check",
        "synced_at",
    ],
};

impl Upsertable for QualityRow {
    fn spec() -> &'static TableSpec {
        &QUALITY_FINDINGS
    }

    fn dedup_key(&self) -> String {
        join_key(&[&self.sku, &self.seller, &self.platform])
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.sku.clone())
            .push_bind(self.seller.clone())
            .push_bind(self.platform.clone())
            .push_bind(self.product.clone())
            .push_bind(self.status.clone())
            .push_bind(self.title_check.clone())
            .push_bind(self.image_count_check.clone())
            .push_bind(self.image_resolution_check.clone())
            .push_bind(self.description_check.clone())
            .push_bind(self.brand_check.clone())
            .push_bind(self.attributes_check.clone())
            .push_bind(self.synced_at);
    }
}

static STOCK_FINDINGS: TableSpec = TableSpec {
    table: "stock_findings",
    key_columns: &["asin", "seller", "platform"],
    data_columns: &["fulfillable_check", "unfulfillable_check", "synced_at"],
};

impl Upsertable for StockFindingRow {
    fn spec() -> &'static TableSpec {
        &STOCK_FINDINGS
    }

    fn dedup_key(&self) -> String {
        join_key(&[&self.asin, &self.seller, &self.platform])
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.asin.clone())
            .push_bind(self.seller.clone())
            .push_bind(self.platform.clone())
            .push_bind(self.fulfillable_check.clone())
            .push_bind(self.unfulfillable_check.clone())
            .push_bind(self.synced_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Platform, RowScope};

    fn scoped_attribute(sku: &str, name: &str, value: &str) -> AttributeRow {
        let scope = RowScope::new("loja_abc", Platform::Magalu);
        AttributeRow {
            sku: sku.to_string(),
            name: name.to_string(),
            value: value.to_string(),
            seller: scope.seller.clone(),
            platform: scope.platform_str(),
            synced_at: scope.synced_at,
        }
    }

    #[test]
    fn upsert_statement_targets_natural_key() {
        let prefix = PRODUCT_ATTRIBUTES.insert_prefix();
        assert_eq!(
            prefix,
            "INSERT INTO product_attributes (sku, name, seller, platform, value, synced_at) "
        );
        let clause = PRODUCT_ATTRIBUTES.conflict_clause();
        assert_eq!(
            clause,
            " ON CONFLICT (sku, name, seller, platform) DO UPDATE SET value = EXCLUDED.value, synced_at = EXCLUDED.synced_at"
        );
    }

    #[test]
    fn conflict_clause_never_touches_key_columns() {
        for spec in [
            &PRODUCTS,
            &PRODUCT_IMAGES,
            &PRODUCT_VARIATIONS,
            &ORDERS,
            &INVENTORY_SNAPSHOTS,
            &REVENUE_PERIODS,
            &QUALITY_FINDINGS,
            &STOCK_FINDINGS,
        ] {
            let clause = spec.conflict_clause();
            let updates = clause.split_once("DO UPDATE SET").unwrap().1;
            for key in spec.key_columns {
                // leading space avoids matching e.g. `seller_sku` for `sku`
                assert!(
                    !updates.contains(&format!(" {key} = EXCLUDED.")),
                    "{} overwrites key column {key}",
                    spec.table
                );
            }
            assert!(updates.contains("synced_at = EXCLUDED.synced_at"));
        }
    }

    #[test]
    fn dedup_keeps_last_occurrence_in_first_position() {
        let rows = vec![
            scoped_attribute("sku-1", "Cor", "Azul"),
            scoped_attribute("sku-2", "Cor", "Verde"),
            scoped_attribute("sku-1", "Cor", "Preto"),
        ];
        let deduped = dedup_last(&rows);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].value, "Preto");
        assert_eq!(deduped[1].value, "Verde");
    }

    #[test]
    fn dedup_distinguishes_full_natural_key() {
        let mut other_seller = scoped_attribute("sku-1", "Cor", "Azul");
        other_seller.seller = "loja_xyz".to_string();
        let rows = vec![scoped_attribute("sku-1", "Cor", "Azul"), other_seller];
        assert_eq!(dedup_last(&rows).len(), 2);
    }
}
