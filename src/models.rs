use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Mercadolivre,
    Amazon,
    Magalu,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Mercadolivre => "mercadolivre",
            Platform::Amazon => "amazon",
            Platform::Magalu => "magalu",
        }
    }

    /// Display name used in archive file names.
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Mercadolivre => "MercadoLivre",
            Platform::Amazon => "Amazon",
            Platform::Magalu => "Magalu",
        }
    }

    pub fn from_str(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "mercadolivre" | "meli" => Some(Platform::Mercadolivre),
            "amazon" => Some(Platform::Amazon),
            "magalu" => Some(Platform::Magalu),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectRequest {
    pub platform: Platform,
    pub seller: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectResponse {
    pub platform: Platform,
    pub seller: String,
    pub messages: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Seller/platform scope stamped onto every row produced by one sync run.
#[derive(Debug, Clone)]
pub struct RowScope {
    pub seller: String,
    pub platform: Platform,
    pub synced_at: NaiveDateTime,
}

impl RowScope {
    pub fn new(seller: &str, platform: Platform) -> Self {
        Self {
            seller: seller.to_string(),
            platform,
            synced_at: chrono::Local::now().naive_local(),
        }
    }

    pub fn platform_str(&self) -> String {
        self.platform.as_str().to_string()
    }
}

/// Normalized catalog listing. `sku` holds the marketplace item id (an SKU
/// for Mercado Livre/Magalu, an ASIN for Amazon). Platform-specific columns
/// default to empty/zero for the platforms that do not supply them.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub sku: String,
    pub seller_sku: String,
    pub title: String,
    pub description: String,
    pub brand: String,
    pub status: String,
    pub category: String,
    pub price: f64,
    pub stock_quantity: i64,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub image_count: i64,
    pub permalink: String,
    pub gtin: String,
    pub warranty: String,
    pub health: String,
    pub condition_label: String,
    pub product_type: String,
    pub main_image_url: String,
    pub main_image_width: i64,
    pub main_image_height: i64,
    pub variation_count: i64,
    pub initial_quantity: i64,
    pub sold_quantity: i64,
    pub accepts_gateway_payment: bool,
    pub seller: String,
    pub platform: String,
    pub synced_at: NaiveDateTime,
}

impl ProductRow {
    /// Empty listing scaffold: normalizers start here and fill in whatever
    /// their platform supplies, so absent upstream fields stay at defaults.
    pub fn blank(sku: &str, scope: &RowScope) -> Self {
        Self {
            sku: sku.to_string(),
            seller_sku: String::new(),
            title: String::new(),
            description: String::new(),
            brand: String::new(),
            status: String::new(),
            category: String::new(),
            price: 0.0,
            stock_quantity: 0,
            created_at: None,
            updated_at: None,
            image_count: 0,
            permalink: String::new(),
            gtin: String::new(),
            warranty: String::new(),
            health: String::new(),
            condition_label: String::new(),
            product_type: String::new(),
            main_image_url: String::new(),
            main_image_width: 0,
            main_image_height: 0,
            variation_count: 0,
            initial_quantity: 0,
            sold_quantity: 0,
            accepts_gateway_payment: false,
            seller: scope.seller.clone(),
            platform: scope.platform_str(),
            synced_at: scope.synced_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ImageRow {
    pub image_id: String,
    pub sku: String,
    pub url: String,
    pub resolution: String,
    pub seller: String,
    pub platform: String,
    pub synced_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttributeRow {
    pub sku: String,
    pub name: String,
    pub value: String,
    pub seller: String,
    pub platform: String,
    pub synced_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VariationRow {
    pub variation_id: String,
    pub sku: String,
    pub price: f64,
    pub attribute: String,
    pub value: String,
    pub seller: String,
    pub platform: String,
    pub synced_at: NaiveDateTime,
}

/// Monetary and location fields are TEXT on purpose: cancelled and pending
/// orders carry sentinel labels instead of amounts (inherited policy).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    pub order_id: String,
    pub status: String,
    pub purchase_date: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub sales_channel: String,
    pub fulfillment_channel: String,
    pub payment_status: String,
    pub payment_method: String,
    pub total_amount: String,
    pub currency: String,
    pub buyer_city: String,
    pub ship_state: String,
    pub ship_city: String,
    pub items_shipped: i64,
    pub items_unshipped: i64,
    pub is_prime: bool,
    pub is_business: bool,
    pub seller: String,
    pub platform: String,
    pub synced_at: NaiveDateTime,
}

/// Point-in-time FBA stock per ASIN. Quantities stay optional: the upstream
/// omits whole sub-objects and NULL is meaningful to the stock findings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InventoryRow {
    pub asin: String,
    pub fnsku: String,
    pub condition_label: String,
    pub product_name: String,
    pub fulfillable_quantity: Option<i64>,
    pub inbound_receiving: Option<i64>,
    pub reserved_total: Option<i64>,
    pub reserved_customer: Option<i64>,
    pub reserved_transit: Option<i64>,
    pub reserved_processing: Option<i64>,
    pub researching_total: Option<i64>,
    pub unfulfillable_total: Option<i64>,
    pub unf_customer_damaged: Option<i64>,
    pub unf_warehouse_damaged: Option<i64>,
    pub unf_distributor_damaged: Option<i64>,
    pub unf_carrier_damaged: Option<i64>,
    pub unf_defective: Option<i64>,
    pub unf_expired: Option<i64>,
    pub future_reserved: Option<i64>,
    pub future_buyable: Option<i64>,
    pub total_quantity: Option<i64>,
    pub last_updated: Option<NaiveDateTime>,
    pub seller: String,
    pub platform: String,
    pub synced_at: NaiveDateTime,
}

/// One monthly sales aggregate. Period bounds are kept as the provider's
/// interval strings; they are identity, not arithmetic inputs.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RevenueRow {
    pub period_start: String,
    pub period_end: String,
    pub units_sold: i64,
    pub order_items: i64,
    pub orders_count: i64,
    pub avg_unit_price: f64,
    pub unit_currency: String,
    pub total_sales: f64,
    pub sales_currency: String,
    pub seller: String,
    pub platform: String,
    pub synced_at: NaiveDateTime,
}

/// Catalog completeness diagnostics per product. Each check column holds
/// "OK" or a human-readable deficiency.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QualityRow {
    pub sku: String,
    pub product: String,
    pub status: String,
    pub title_check: String,
    pub image_count_check: String,
    pub image_resolution_check: String,
    pub description_check: String,
    pub brand_check: String,
    pub attributes_check: String,
    pub seller: String,
    pub platform: String,
    pub synced_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StockFindingRow {
    pub asin: String,
    pub fulfillable_check: String,
    pub unfulfillable_check: String,
    pub seller: String,
    pub platform: String,
    pub synced_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_names() {
        assert_eq!(Platform::from_str("MercadoLivre"), Some(Platform::Mercadolivre));
        assert_eq!(Platform::from_str("meli"), Some(Platform::Mercadolivre));
        assert_eq!(Platform::from_str(" amazon "), Some(Platform::Amazon));
        assert_eq!(Platform::from_str("shopee"), None);
        assert_eq!(Platform::Magalu.as_str(), "magalu");
    }

    #[test]
    fn collect_request_deserializes_snake_case_platform() {
        let req: CollectRequest =
            serde_json::from_str(r#"{"platform": "mercadolivre", "seller": "loja_abc"}"#).unwrap();
        assert_eq!(req.platform, Platform::Mercadolivre);
        assert_eq!(req.seller, "loja_abc");
    }
}
