use super::AmazonConfig;
use crate::http::{FetchError, Gateway};
use crate::paginate::{CursorPage, PageWalk, collect_cursor_pages};
use chrono::Utc;
use serde_json::Value;
use urlencoding::encode;

fn iso_millis(days_back: i64) -> String {
    (Utc::now() - chrono::Duration::days(days_back))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// A listing is only admissible when it carries an identity we can key on.
fn admissible(item: &Value) -> bool {
    let has_sku = item["sku"].as_str().is_some_and(|s| !s.is_empty());
    let has_asin = item["summaries"][0]["asin"]
        .as_str()
        .is_some_and(|s| !s.is_empty());
    has_sku || has_asin
}

/// Listings items walk (`pageToken` cursor). A page without a single
/// admissible record ends the walk even if the API still offers a token.
pub async fn listing_items(
    gateway: &mut Gateway,
    config: &AmazonConfig,
    seller_id: &str,
) -> PageWalk {
    let url = format!(
        "{}/listings/2021-08-01/items/{}",
        config.api_url,
        encode(seller_id)
    );
    let created_after = iso_millis(730);
    collect_cursor_pages(config.page_delay, async |cursor| {
        let mut query = vec![
            ("marketplaceIds", config.marketplace_id.clone()),
            ("sortBy", "lastUpdatedDate".to_string()),
            ("createdAfter", created_after.clone()),
        ];
        if let Some(token) = cursor {
            query.push(("pageToken", token));
        }
        let payload = gateway.get_json(&url, &query).await?;
        let records: Vec<Value> = payload["items"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(admissible)
            .collect();
        let next = payload["pagination"]["nextToken"].as_str().map(String::from);
        Ok(CursorPage { records, next })
    })
    .await
}

/// Orders walk: the continuation token replaces the date filter entirely on
/// follow-up requests, mirroring the API's NextToken contract.
pub async fn orders(gateway: &mut Gateway, config: &AmazonConfig) -> PageWalk {
    let url = format!("{}/orders/v0/orders", config.api_url);
    let created_after = iso_millis(7);
    collect_cursor_pages(config.page_delay, async |cursor| {
        let query = match cursor {
            Some(token) => vec![
                ("MarketplaceIds", config.marketplace_id.clone()),
                ("NextToken", token),
            ],
            None => vec![
                ("MarketplaceIds", config.marketplace_id.clone()),
                ("CreatedAfter", created_after.clone()),
            ],
        };
        let payload = gateway.get_json(&url, &query).await?;
        let records = payload["payload"]["Orders"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let next = payload["payload"]["NextToken"].as_str().map(String::from);
        Ok(CursorPage { records, next })
    })
    .await
}

pub async fn inventory_summaries(gateway: &mut Gateway, config: &AmazonConfig) -> PageWalk {
    let url = format!("{}/fba/inventory/v1/summaries", config.api_url);
    let start_date = iso_millis(90);
    collect_cursor_pages(config.page_delay, async |cursor| {
        let mut query = vec![
            ("marketplaceIds", config.marketplace_id.clone()),
            ("details", "true".to_string()),
            ("granularityType", "Marketplace".to_string()),
            ("granularityId", config.marketplace_id.clone()),
            ("startDateTime", start_date.clone()),
        ];
        if let Some(token) = cursor {
            query.push(("nextToken", token));
        }
        let payload = gateway.get_json(&url, &query).await?;
        let records = payload["payload"]["inventorySummaries"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let next = payload["pagination"]["nextToken"].as_str().map(String::from);
        Ok(CursorPage { records, next })
    })
    .await
}

/// Monthly sales aggregates for the trailing year. Single request.
pub async fn order_metrics(
    gateway: &mut Gateway,
    config: &AmazonConfig,
) -> Result<Vec<Value>, FetchError> {
    let url = format!("{}/sales/v1/orderMetrics", config.api_url);
    let now = Utc::now();
    let start = now - chrono::Duration::days(365);
    let interval = format!(
        "{}--{}",
        start.format("%Y-%m-%dT00:00:00Z"),
        now.format("%Y-%m-%dT23:59:59Z")
    );
    let query = vec![
        ("marketplaceIds", config.marketplace_id.clone()),
        ("interval", interval),
        ("granularityTimeZone", "America/Sao_Paulo".to_string()),
        ("granularity", "Month".to_string()),
    ];
    let payload = gateway.get_json(&url, &query).await?;
    Ok(payload["payload"].as_array().cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn admissibility_requires_sku_or_asin() {
        assert!(admissible(&json!({"sku": "SKU-1"})));
        assert!(admissible(
            &json!({"summaries": [{"asin": "B000TEST01"}]})
        ));
        assert!(!admissible(&json!({"sku": "", "summaries": [{}]})));
        assert!(!admissible(&json!({"summaries": []})));
    }
}
