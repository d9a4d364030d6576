use crate::models::{
    AttributeRow, ImageRow, InventoryRow, OrderRow, Platform, ProductRow, QualityRow, RevenueRow,
    StockFindingRow, VariationRow,
};
use crate::store::SyncStore;
use serde::Serialize;
use sqlx::postgres::PgRow;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bundle the seller's same-day rows into one ZIP of CSV files, one file
/// per entity the platform persists. Empty entities are left out.
pub async fn build_archive(
    store: &SyncStore,
    platform: Platform,
    seller: &str,
) -> Result<Vec<u8>, ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    match platform {
        Platform::Mercadolivre => {
            add_entity::<ProductRow>(&mut zip, options, store, "products", "produtos", platform, seller).await?;
            add_entity::<ImageRow>(&mut zip, options, store, "product_images", "imagens", platform, seller).await?;
            add_entity::<AttributeRow>(&mut zip, options, store, "product_attributes", "atributos", platform, seller).await?;
            add_entity::<VariationRow>(&mut zip, options, store, "product_variations", "variacoes", platform, seller).await?;
            add_entity::<QualityRow>(&mut zip, options, store, "quality_findings", "erros_qualidade", platform, seller).await?;
        }
        Platform::Amazon => {
            add_entity::<ProductRow>(&mut zip, options, store, "products", "produtos", platform, seller).await?;
            add_entity::<OrderRow>(&mut zip, options, store, "orders", "pedidos", platform, seller).await?;
            add_entity::<InventoryRow>(&mut zip, options, store, "inventory_snapshots", "estoque_fba", platform, seller).await?;
            add_entity::<RevenueRow>(&mut zip, options, store, "revenue_periods", "faturamento", platform, seller).await?;
            add_entity::<QualityRow>(&mut zip, options, store, "quality_findings", "erros_qualidade", platform, seller).await?;
            add_entity::<StockFindingRow>(&mut zip, options, store, "stock_findings", "erros_estoque", platform, seller).await?;
        }
        Platform::Magalu => {
            add_entity::<ProductRow>(&mut zip, options, store, "products", "produtos", platform, seller).await?;
            add_entity::<ImageRow>(&mut zip, options, store, "product_images", "imagens", platform, seller).await?;
            add_entity::<AttributeRow>(&mut zip, options, store, "product_attributes", "atributos", platform, seller).await?;
            add_entity::<OrderRow>(&mut zip, options, store, "orders", "pedidos", platform, seller).await?;
            add_entity::<QualityRow>(&mut zip, options, store, "quality_findings", "erros_qualidade", platform, seller).await?;
        }
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

pub fn archive_name(platform: Platform, seller: &str) -> String {
    format!("{}_{}_Relatorios.zip", platform.label(), seller)
}

async fn add_entity<T>(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    store: &SyncStore,
    table: &str,
    file_stem: &str,
    platform: Platform,
    seller: &str,
) -> Result<(), ExportError>
where
    T: for<'r> sqlx::FromRow<'r, PgRow> + Serialize + Send + Unpin,
{
    let sql = format!(
        "SELECT * FROM {table} WHERE platform = $1 AND seller = $2 AND synced_at::date = CURRENT_DATE"
    );
    let rows: Vec<T> = sqlx::query_as::<_, T>(&sql)
        .bind(platform.as_str())
        .bind(seller)
        .persistent(false)
        .fetch_all(store.pool())
        .await?;
    if rows.is_empty() {
        return Ok(());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in &rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;

    zip.start_file(format!("{file_stem}_{seller}.csv"), options)?;
    zip.write_all(&bytes)?;
    Ok(())
}
