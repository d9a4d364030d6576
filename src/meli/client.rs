use super::MeliConfig;
use crate::http::{FetchError, Gateway};
use crate::paginate::{CursorPage, PageWalk, collect_cursor_pages};
use serde_json::Value;
use urlencoding::encode;

/// Walk the seller's full item-id list with the search scan API. Each page
/// carries an opaque `scroll_id`; the walk ends when it disappears or a page
/// comes back empty.
pub async fn search_item_ids(
    gateway: &mut Gateway,
    config: &MeliConfig,
    seller_id: &str,
) -> PageWalk {
    let url = format!(
        "{}/users/{}/items/search",
        config.base_url,
        encode(seller_id)
    );
    collect_cursor_pages(config.page_delay, async |cursor| {
        let mut query = vec![("search_type", "scan".to_string())];
        if let Some(scroll_id) = cursor {
            query.push(("scroll_id", scroll_id));
        }
        let payload = gateway.get_json(&url, &query).await?;
        let records = payload["results"].as_array().cloned().unwrap_or_default();
        let next = payload["scroll_id"].as_str().map(String::from);
        Ok(CursorPage { records, next })
    })
    .await
}

pub async fn item_detail(
    gateway: &mut Gateway,
    config: &MeliConfig,
    item_id: &str,
) -> Result<Value, FetchError> {
    let url = format!("{}/items/{}", config.base_url, encode(item_id));
    gateway.get_json(&url, &[]).await
}

pub async fn item_description(
    gateway: &mut Gateway,
    config: &MeliConfig,
    item_id: &str,
) -> Result<String, FetchError> {
    let url = format!("{}/items/{}/description", config.base_url, encode(item_id));
    let payload = gateway.get_json(&url, &[]).await?;
    Ok(payload["plain_text"].as_str().unwrap_or_default().to_string())
}

pub async fn category_name(
    gateway: &mut Gateway,
    config: &MeliConfig,
    category_id: &str,
) -> Result<String, FetchError> {
    let url = format!("{}/categories/{}", config.base_url, encode(category_id));
    let payload = gateway.get_json(&url, &[]).await?;
    Ok(payload["name"]
        .as_str()
        .unwrap_or("Categoria não encontrada")
        .to_string())
}
