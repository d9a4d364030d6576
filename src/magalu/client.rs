use super::MagaluConfig;
use crate::http::{FetchError, Gateway};
use crate::paginate::{PageWalk, collect_offset_pages};
use serde_json::Value;
use urlencoding::encode;

pub async fn list_skus(gateway: &mut Gateway, config: &MagaluConfig) -> PageWalk {
    let url = format!("{}/seller/v1/portfolios/skus", config.api_url);
    let limit = config.page_limit;
    collect_offset_pages(limit, config.page_delay, async |offset| {
        let query = vec![
            ("_limit", limit.to_string()),
            ("_offset", offset.to_string()),
        ];
        let payload = gateway.get_json(&url, &query).await?;
        Ok(payload["results"].as_array().cloned().unwrap_or_default())
    })
    .await
}

pub async fn list_orders(gateway: &mut Gateway, config: &MagaluConfig) -> PageWalk {
    let url = format!("{}/seller/v1/orders", config.api_url);
    let limit = config.page_limit;
    collect_offset_pages(limit, config.page_delay, async |offset| {
        let query = vec![
            ("_limit", limit.to_string()),
            ("_offset", offset.to_string()),
        ];
        let payload = gateway.get_json(&url, &query).await?;
        Ok(payload["results"].as_array().cloned().unwrap_or_default())
    })
    .await
}

pub async fn sku_detail(
    gateway: &mut Gateway,
    config: &MagaluConfig,
    sku_id: &str,
) -> Result<Value, FetchError> {
    let url = format!(
        "{}/seller/v1/portfolios/skus/{}",
        config.api_url,
        encode(sku_id)
    );
    gateway.get_json(&url, &[]).await
}

pub async fn sku_price(
    gateway: &mut Gateway,
    config: &MagaluConfig,
    sku_id: &str,
) -> Result<Value, FetchError> {
    let url = format!(
        "{}/seller/v1/portfolios/prices/{}",
        config.api_url,
        encode(sku_id)
    );
    let query = vec![("_limit", "100".to_string())];
    gateway.get_json(&url, &query).await
}

pub async fn sku_stock(
    gateway: &mut Gateway,
    config: &MagaluConfig,
    sku_id: &str,
) -> Result<Value, FetchError> {
    let url = format!(
        "{}/seller/v1/portfolios/stocks/{}",
        config.api_url,
        encode(sku_id)
    );
    let query = vec![("_limit", "100".to_string())];
    gateway.get_json(&url, &query).await
}
