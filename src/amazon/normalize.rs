use crate::fields::{f64_at, i64_at, string_at, text, timestamp_at};
use crate::models::{InventoryRow, OrderRow, ProductRow, RevenueRow, RowScope};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

const NOT_INFORMED: &str = "Não informado";

static PRODUCT_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("SHORTS", "Bermuda"),
        ("PANTS", "Calça"),
        ("UNDERPANTS", "Roupa de baixo"),
        ("BRA", "Sutiã"),
        ("APPAREL", "Vestuário"),
        ("SKIRT", "Saia"),
        ("COORDINATED_OUTFIT", "Conjunto"),
        ("SHIRT", "Camisa"),
        ("BASE_LAYER_APPAREL_SET", "Roupa térmica"),
        ("ELECTRONIC_CABLE", "Cabo eletrônico"),
        ("CHARGING_ADAPTER", "Carregador"),
        ("CAMERA_CONTINUOUS_LIGHT", "Luz para câmera"),
        ("SWIMWEAR", "Roupa de banho"),
        ("SHOES", "Calçado"),
        ("CELLULAR_PHONE_CASE", "Capa de celular"),
        ("ELECTRONIC_ADAPTER", "Adaptador eletrônico"),
        (
            "PORTABLE_ELECTRONIC_DEVICE_COVER",
            "Capa para dispositivo portátil",
        ),
        ("HEADPHONES", "Fone de ouvido"),
        ("SOCKS", "Meia"),
        ("MULTIPORT_HUB", "Hub USB"),
        ("COMPUTER_DRIVE_OR_STORAGE", "Armazenamento/Drive de computador"),
    ])
});

fn translate_product_type(raw: &str) -> String {
    if raw.is_empty() {
        return NOT_INFORMED.to_string();
    }
    PRODUCT_TYPES.get(raw).map_or_else(|| raw.to_string(), |t| t.to_string())
}

fn translate_condition(raw: &str) -> String {
    match raw {
        "new_new" => "Novo".to_string(),
        "" => NOT_INFORMED.to_string(),
        other => other.to_string(),
    }
}

fn translate_listing_status(raw: &Value) -> String {
    let translate_one = |status: &str| match status {
        "BUYABLE" => "Disponível para venda".to_string(),
        "DISCOVERABLE" => "Visível no catálogo".to_string(),
        other => other.to_string(),
    };
    match raw {
        Value::Array(entries) => {
            let joined: Vec<String> = entries
                .iter()
                .map(|entry| translate_one(&text(entry)))
                .collect();
            if joined.is_empty() {
                NOT_INFORMED.to_string()
            } else {
                joined.join(", ")
            }
        }
        Value::String(status) if !status.is_empty() => translate_one(status),
        _ => NOT_INFORMED.to_string(),
    }
}

fn translate_order_status(raw: &str) -> String {
    match raw {
        "Canceled" => "Cancelado".to_string(),
        "Shipped" => "Enviado".to_string(),
        "Pending" => "Pendente".to_string(),
        "" => NOT_INFORMED.to_string(),
        other => other.to_string(),
    }
}

fn translate_payment_details(raw: &Value) -> String {
    let translate_one = |method: &str| match method {
        "Debit" => "Débito".to_string(),
        "Installments" => "Parcelado".to_string(),
        "CreditCard" => "Cartão de crédito".to_string(),
        "Rewards" => "Recompensas".to_string(),
        "GiftCertificate" => "Vale-presente".to_string(),
        "Other" => "Outro".to_string(),
        other => other.to_string(),
    };
    match raw {
        Value::Array(entries) => {
            let joined: Vec<String> = entries
                .iter()
                .map(|entry| translate_one(&text(entry)))
                .collect();
            if joined.is_empty() {
                NOT_INFORMED.to_string()
            } else {
                joined.join(", ")
            }
        }
        Value::String(method) if !method.is_empty() => translate_one(method),
        _ => NOT_INFORMED.to_string(),
    }
}

pub fn products(records: &[Value], scope: &RowScope) -> Vec<ProductRow> {
    records
        .iter()
        .filter_map(|item| {
            let summary = item["summaries"][0].clone();
            let asin = string_at(&summary, &["asin"]);
            let seller_sku = string_at(item, &["sku"]);
            let key = if asin.is_empty() {
                seller_sku.clone()
            } else {
                asin
            };
            if key.is_empty() {
                return None;
            }
            let mut product = ProductRow::blank(&key, scope);
            product.seller_sku = seller_sku;
            product.title = string_at(&summary, &["itemName"]);
            product.product_type = translate_product_type(&string_at(&summary, &["productType"]));
            product.condition_label =
                translate_condition(&string_at(&summary, &["conditionType"]));
            product.status = translate_listing_status(&summary["status"]);
            product.created_at = timestamp_at(&summary, &["createdDate"]);
            product.updated_at = timestamp_at(&summary, &["lastUpdatedDate"]);
            let link = string_at(&summary, &["mainImage", "link"]);
            product.main_image_url = if link.is_empty() {
                "Sem imagem".to_string()
            } else {
                link
            };
            product.main_image_width =
                i64_at(&summary, &["mainImage", "width"]).unwrap_or(0);
            product.main_image_height =
                i64_at(&summary, &["mainImage", "height"]).unwrap_or(0);
            product.image_count = i64::from(product.main_image_url != "Sem imagem");
            Some(product)
        })
        .collect()
}

pub fn orders(records: &[Value], scope: &RowScope) -> Vec<OrderRow> {
    records
        .iter()
        .filter_map(|raw| {
            let order_id = string_at(raw, &["AmazonOrderId"]);
            if order_id.is_empty() {
                return None;
            }
            let status = translate_order_status(&string_at(raw, &["OrderStatus"]));
            let cancelled = status == "Cancelado";
            let pending = status == "Pendente";
            // Cancelled/pending orders replace money and destination with
            // sentinel labels instead of omitting the columns.
            let sentinel = |actual: String| -> String {
                if cancelled {
                    "Pedido cancelado".to_string()
                } else if pending {
                    "Pendente".to_string()
                } else {
                    actual
                }
            };
            let county = string_at(raw, &["BuyerInfo", "BuyerCounty"]);
            Some(OrderRow {
                order_id,
                status,
                purchase_date: timestamp_at(raw, &["PurchaseDate"]),
                updated_at: timestamp_at(raw, &["LastUpdateDate"]),
                sales_channel: string_at(raw, &["SalesChannel"]),
                fulfillment_channel: string_at(raw, &["FulfillmentChannel"]),
                payment_status: String::new(),
                payment_method: translate_payment_details(&raw["PaymentMethodDetails"]),
                total_amount: sentinel(string_at(raw, &["OrderTotal", "Amount"])),
                currency: sentinel(string_at(raw, &["OrderTotal", "CurrencyCode"])),
                buyer_city: if county.is_empty() || county == "----------" {
                    NOT_INFORMED.to_string()
                } else {
                    county
                },
                ship_state: sentinel(string_at(raw, &["ShippingAddress", "StateOrRegion"])),
                ship_city: sentinel(string_at(raw, &["ShippingAddress", "City"])),
                items_shipped: i64_at(raw, &["NumberOfItemsShipped"]).unwrap_or(0),
                items_unshipped: i64_at(raw, &["NumberOfItemsUnshipped"]).unwrap_or(0),
                is_prime: raw["IsPrime"].as_bool().unwrap_or(false),
                is_business: raw["IsBusinessOrder"].as_bool().unwrap_or(false),
                seller: scope.seller.clone(),
                platform: scope.platform_str(),
                synced_at: scope.synced_at,
            })
        })
        .collect()
}

pub fn inventory(records: &[Value], scope: &RowScope) -> Vec<InventoryRow> {
    records
        .iter()
        .filter_map(|raw| {
            let asin = string_at(raw, &["asin"]);
            if asin.is_empty() {
                return None;
            }
            let details = &raw["inventoryDetails"];
            Some(InventoryRow {
                asin,
                fnsku: string_at(raw, &["fnSku"]),
                condition_label: string_at(raw, &["condition"]),
                product_name: string_at(raw, &["productName"]),
                fulfillable_quantity: i64_at(details, &["fulfillableQuantity"]),
                inbound_receiving: i64_at(details, &["inboundReceivingQuantity"]),
                reserved_total: i64_at(details, &["reservedQuantity", "totalReservedQuantity"]),
                reserved_customer: i64_at(
                    details,
                    &["reservedQuantity", "pendingCustomerOrderQuantity"],
                ),
                reserved_transit: i64_at(
                    details,
                    &["reservedQuantity", "pendingTransshipmentQuantity"],
                ),
                reserved_processing: i64_at(details, &["reservedQuantity", "fcProcessingQuantity"]),
                researching_total: i64_at(
                    details,
                    &["researchingQuantity", "totalResearchingQuantity"],
                ),
                unfulfillable_total: i64_at(
                    details,
                    &["unfulfillableQuantity", "totalUnfulfillableQuantity"],
                ),
                unf_customer_damaged: i64_at(
                    details,
                    &["unfulfillableQuantity", "customerDamagedQuantity"],
                ),
                unf_warehouse_damaged: i64_at(
                    details,
                    &["unfulfillableQuantity", "warehouseDamagedQuantity"],
                ),
                unf_distributor_damaged: i64_at(
                    details,
                    &["unfulfillableQuantity", "distributorDamagedQuantity"],
                ),
                unf_carrier_damaged: i64_at(
                    details,
                    &["unfulfillableQuantity", "carrierDamagedQuantity"],
                ),
                unf_defective: i64_at(details, &["unfulfillableQuantity", "defectiveQuantity"]),
                unf_expired: i64_at(details, &["unfulfillableQuantity", "expiredQuantity"]),
                future_reserved: i64_at(
                    details,
                    &["futureSupplyQuantity", "reservedFutureSupplyQuantity"],
                ),
                future_buyable: i64_at(
                    details,
                    &["futureSupplyQuantity", "futureSupplyBuyableQuantity"],
                ),
                total_quantity: i64_at(raw, &["totalQuantity"]),
                last_updated: timestamp_at(raw, &["lastUpdatedTime"]),
                seller: scope.seller.clone(),
                platform: scope.platform_str(),
                synced_at: scope.synced_at,
            })
        })
        .collect()
}

pub fn revenue(records: &[Value], scope: &RowScope) -> Vec<RevenueRow> {
    records
        .iter()
        .filter_map(|raw| {
            let interval = string_at(raw, &["interval"]);
            let (start, end) = interval.split_once("--")?;
            Some(RevenueRow {
                period_start: start.to_string(),
                period_end: end.to_string(),
                units_sold: i64_at(raw, &["unitCount"]).unwrap_or(0),
                order_items: i64_at(raw, &["orderItemCount"]).unwrap_or(0),
                orders_count: i64_at(raw, &["orderCount"]).unwrap_or(0),
                avg_unit_price: f64_at(raw, &["averageUnitPrice", "amount"]).unwrap_or(0.0),
                unit_currency: string_at(raw, &["averageUnitPrice", "currencyCode"]),
                total_sales: f64_at(raw, &["totalSales", "amount"]).unwrap_or(0.0),
                sales_currency: string_at(raw, &["totalSales", "currencyCode"]),
                seller: scope.seller.clone(),
                platform: scope.platform_str(),
                synced_at: scope.synced_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use serde_json::json;

    fn scope() -> RowScope {
        RowScope::new("loja_abc", Platform::Amazon)
    }

    #[test]
    fn listing_becomes_product_keyed_by_asin() {
        let records = vec![json!({
            "sku": "CAMISA-P-AZUL",
            "summaries": [{
                "asin": "B000TEST01",
                "itemName": "Camisa azul tamanho P",
                "productType": "SHIRT",
                "conditionType": "new_new",
                "status": ["BUYABLE", "DISCOVERABLE"],
                "createdDate": "2024-05-01T12:00:00Z",
                "lastUpdatedDate": "2025-01-10T09:30:00Z",
                "mainImage": {"link": "https://m.media.example/1.jpg", "width": 1000, "height": 1000}
            }]
        })];
        let products = products(&records, &scope());
        assert_eq!(products.len(), 1);
        let product = &products[0];
        assert_eq!(product.sku, "B000TEST01");
        assert_eq!(product.seller_sku, "CAMISA-P-AZUL");
        assert_eq!(product.product_type, "Camisa");
        assert_eq!(product.condition_label, "Novo");
        assert_eq!(product.status, "Disponível para venda, Visível no catálogo");
        assert_eq!(product.main_image_width, 1000);
        assert!(product.created_at.is_some());
    }

    #[test]
    fn listing_without_asin_falls_back_to_sku() {
        let records = vec![json!({"sku": "SOMENTE-SKU", "summaries": []})];
        let products = products(&records, &scope());
        assert_eq!(products[0].sku, "SOMENTE-SKU");
        assert_eq!(products[0].main_image_url, "Sem imagem");
        assert_eq!(products[0].product_type, "Não informado");
    }

    #[test]
    fn cancelled_order_gets_sentinel_fields() {
        let records = vec![json!({
            "AmazonOrderId": "111-222",
            "OrderStatus": "Canceled",
            "PurchaseDate": "2025-02-01T10:00:00Z",
            "OrderTotal": {"Amount": "150.00", "CurrencyCode": "BRL"},
            "ShippingAddress": {"StateOrRegion": "SP", "City": "Campinas"},
            "PaymentMethodDetails": ["CreditCard"]
        })];
        let orders = orders(&records, &scope());
        let order = &orders[0];
        assert_eq!(order.status, "Cancelado");
        assert_eq!(order.total_amount, "Pedido cancelado");
        assert_eq!(order.currency, "Pedido cancelado");
        assert_eq!(order.ship_state, "Pedido cancelado");
        assert_eq!(order.payment_method, "Cartão de crédito");
    }

    #[test]
    fn shipped_order_keeps_real_values() {
        let records = vec![json!({
            "AmazonOrderId": "333-444",
            "OrderStatus": "Shipped",
            "OrderTotal": {"Amount": "89.90", "CurrencyCode": "BRL"},
            "ShippingAddress": {"StateOrRegion": "MG", "City": "Uberlândia"},
            "BuyerInfo": {"BuyerCounty": "----------"},
            "NumberOfItemsShipped": 2,
            "IsPrime": true
        })];
        let orders = orders(&records, &scope());
        let order = &orders[0];
        assert_eq!(order.status, "Enviado");
        assert_eq!(order.total_amount, "89.90");
        assert_eq!(order.buyer_city, "Não informado");
        assert_eq!(order.items_shipped, 2);
        assert!(order.is_prime);
    }

    #[test]
    fn inventory_keeps_missing_quantities_as_null() {
        let records = vec![json!({
            "asin": "B000TEST01",
            "fnSku": "X0001",
            "condition": "NewItem",
            "inventoryDetails": {
                "fulfillableQuantity": 7,
                "reservedQuantity": {"totalReservedQuantity": 1},
                "unfulfillableQuantity": {"totalUnfulfillableQuantity": 2}
            },
            "totalQuantity": 10
        })];
        let snapshots = inventory(&records, &scope());
        let snapshot = &snapshots[0];
        assert_eq!(snapshot.fulfillable_quantity, Some(7));
        assert_eq!(snapshot.reserved_total, Some(1));
        assert_eq!(snapshot.unfulfillable_total, Some(2));
        assert_eq!(snapshot.inbound_receiving, None);
        assert_eq!(snapshot.researching_total, None);
    }

    #[test]
    fn revenue_splits_interval_bounds() {
        let records = vec![json!({
            "interval": "2025-01-01T00:00-03:00--2025-02-01T00:00-03:00",
            "unitCount": 42,
            "orderItemCount": 40,
            "orderCount": 38,
            "averageUnitPrice": {"amount": "57.32", "currencyCode": "BRL"},
            "totalSales": {"amount": 2407.44, "currencyCode": "BRL"}
        })];
        let rows = revenue(&records, &scope());
        let row = &rows[0];
        assert_eq!(row.period_start, "2025-01-01T00:00-03:00");
        assert_eq!(row.period_end, "2025-02-01T00:00-03:00");
        assert_eq!(row.units_sold, 42);
        assert_eq!(row.avg_unit_price, 57.32);
        assert_eq!(row.total_sales, 2407.44);
    }

    #[test]
    fn revenue_without_interval_is_dropped() {
        let rows = revenue(&[json!({"unitCount": 5})], &scope());
        assert!(rows.is_empty());
    }
}
