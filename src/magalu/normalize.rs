use crate::fields::{array_at, f64_at, i64_at, minor_to_major, string_at, text, timestamp_at};
use crate::models::{AttributeRow, ImageRow, OrderRow, ProductRow, RowScope};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct CatalogBundle {
    pub products: Vec<ProductRow>,
    pub images: Vec<ImageRow>,
    pub attributes: Vec<AttributeRow>,
}

fn translate_status(raw: &str) -> String {
    match raw.to_uppercase().as_str() {
        "INACTIVE" => "Inativo".to_string(),
        "UNPUBLISHED" => "Não publicado".to_string(),
        "PUBLISHED" => "Publicado".to_string(),
        "BLOCKED" => "Bloqueado".to_string(),
        _ => raw.to_string(),
    }
}

fn translate_attribute_name(raw: &str) -> String {
    match raw {
        "update_only_front" => "Apenas atualização no frontend".to_string(),
        "color" => "Cor".to_string(),
        other => other.to_string(),
    }
}

fn translate_order_status(raw: &str) -> String {
    match raw {
        "created" => "Criado".to_string(),
        "finished" => "Finalizado".to_string(),
        "cancelled" => "Cancelado".to_string(),
        other => other.to_string(),
    }
}

fn translate_payment_status(raw: &str) -> String {
    match raw {
        "created" => "Criado".to_string(),
        "finished" => "Pago".to_string(),
        "cancelled" => "Cancelado".to_string(),
        other => other.to_string(),
    }
}

fn translate_payment_method(raw: &str) -> String {
    match raw {
        "credit_card" => "Cartão de crédito".to_string(),
        "bank_slip" => "Boleto bancário".to_string(),
        other => other.to_string(),
    }
}

fn push_attribute(bundle: &mut CatalogBundle, sku: &str, name: &str, value: String, scope: &RowScope) {
    if name.is_empty() || value.is_empty() || name == "IdProduct" || name == "fulfillment" {
        return;
    }
    bundle.attributes.push(AttributeRow {
        sku: sku.to_string(),
        name: translate_attribute_name(name),
        value,
        seller: scope.seller.clone(),
        platform: scope.platform_str(),
        synced_at: scope.synced_at,
    });
}

fn push_attribute_list(bundle: &mut CatalogBundle, sku: &str, entries: &[Value], scope: &RowScope) {
    for entry in entries {
        let name = string_at(entry, &["name"]);
        let value = string_at(entry, &["value"]);
        push_attribute(bundle, sku, &name, value, scope);
    }
}

/// Fold one portfolio sku into the bundle. `detail`, `price` and `stock` are
/// the per-sku lookups; any of them may have failed and be absent.
pub fn extend_from_sku(
    bundle: &mut CatalogBundle,
    sku_id: &str,
    item: &Value,
    detail: Option<&Value>,
    price: Option<&Value>,
    stock: Option<&Value>,
    scope: &RowScope,
) {
    let empty = Value::Null;
    let info = detail.unwrap_or(&empty);
    let price_info = price
        .map(|payload| payload["results"][0].clone())
        .unwrap_or(Value::Null);
    let stock_info = stock
        .map(|payload| payload["results"][0].clone())
        .unwrap_or(Value::Null);

    let mut product = ProductRow::blank(sku_id, scope);
    product.title = string_at(info, &["title"]);
    product.description = string_at(info, &["description"]);
    product.brand = string_at(info, &["brand"]);
    product.status = translate_status(&string_at(info, &["status"]));
    product.created_at = timestamp_at(info, &["created_at"]);
    product.updated_at = timestamp_at(info, &["updated_at"]);
    product.price = minor_to_major(f64_at(&price_info, &["price"]).unwrap_or(0.0), 100.0);
    product.stock_quantity = i64_at(&stock_info, &["quantity"]).unwrap_or(0);

    push_attribute_list(bundle, sku_id, array_at(item, &["attributes"]), scope);
    push_attribute_list(bundle, sku_id, array_at(info, &["datasheet"]), scope);
    push_attribute_list(bundle, sku_id, array_at(info, &["extra_data"]), scope);

    let dimensions = &info["dimensions"];
    for (key, label) in [
        ("height", "Altura (cm)"),
        ("width", "Largura (cm)"),
        ("length", "Comprimento (cm)"),
        ("weight", "Peso (g)"),
    ] {
        let value = dimensions
            .get(key)
            .and_then(|entry| entry.get("value"))
            .map(text)
            .unwrap_or_default();
        push_attribute(bundle, sku_id, label, value, scope);
    }

    let images = array_at(info, &["images"]);
    for (index, image) in images.iter().enumerate() {
        bundle.images.push(ImageRow {
            image_id: format!("{sku_id}_{index}"),
            sku: sku_id.to_string(),
            url: string_at(image, &["reference"]),
            resolution: string_at(image, &["type"]),
            seller: scope.seller.clone(),
            platform: scope.platform_str(),
            synced_at: scope.synced_at,
        });
    }
    product.image_count = images.len() as i64;
    product.main_image_url = images
        .first()
        .map(|image| string_at(image, &["reference"]))
        .unwrap_or_default();
    bundle.products.push(product);
}

pub fn orders(records: &[Value], scope: &RowScope) -> Vec<OrderRow> {
    records
        .iter()
        .filter_map(|raw| {
            let order_id = text(&raw["id"]);
            if order_id.is_empty() {
                return None;
            }
            let raw_status = string_at(raw, &["status"]);
            let total = f64_at(raw, &["amounts", "total"]).unwrap_or(0.0);
            let normalizer = f64_at(raw, &["amounts", "normalizer"])
                .filter(|n| *n > 0.0)
                .unwrap_or(100.0);
            let payment = &raw["payments"][0];
            Some(OrderRow {
                order_id,
                status: translate_order_status(&raw_status),
                purchase_date: timestamp_at(raw, &["created_at"]),
                updated_at: None,
                sales_channel: String::new(),
                fulfillment_channel: String::new(),
                payment_status: translate_payment_status(&raw_status),
                payment_method: translate_payment_method(&string_at(payment, &["method"])),
                total_amount: format!("{:.2}", minor_to_major(total, normalizer)),
                currency: string_at(payment, &["currency"]),
                buyer_city: String::new(),
                ship_state: String::new(),
                ship_city: String::new(),
                items_shipped: 0,
                items_unshipped: 0,
                is_prime: false,
                is_business: false,
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
        RowScope::new("loja_abc", Platform::Magalu)
    }

    #[test]
    fn sku_lookups_combine_into_one_product() {
        let item = json!({
            "sku": "SKU-10",
            "attributes": [
                {"name": "color", "value": "Azul"},
                {"name": "fulfillment", "value": "magalu"}
            ]
        });
        let detail = json!({
            "title": "Tênis de corrida leve",
            "description": "Descrição detalhada",
            "brand": "Correr+",
            "status": "PUBLISHED",
            "created_at": "2024-08-01T10:00:00-03:00",
            "updated_at": "2025-01-05T08:00:00-03:00",
            "datasheet": [{"name": "Material", "value": "Mesh"}],
            "extra_data": [{"name": "update_only_front", "value": "sim"}],
            "dimensions": {
                "height": {"value": 12, "unit": "cm"},
                "weight": {"value": 300, "unit": "g"}
            },
            "images": [
                {"reference": "https://img.example/a.jpg", "type": "1000x1000"},
                {"reference": "https://img.example/b.jpg", "type": "600x600"}
            ]
        });
        let price = json!({"results": [{"price": 19990}]});
        let stock = json!({"results": [{"quantity": 8}]});

        let mut bundle = CatalogBundle::default();
        extend_from_sku(
            &mut bundle,
            "SKU-10",
            &item,
            Some(&detail),
            Some(&price),
            Some(&stock),
            &scope(),
        );

        let product = &bundle.products[0];
        assert_eq!(product.title, "Tênis de corrida leve");
        assert_eq!(product.status, "Publicado");
        assert_eq!(product.price, 199.90);
        assert_eq!(product.stock_quantity, 8);
        assert_eq!(product.image_count, 2);
        assert_eq!(product.main_image_url, "https://img.example/a.jpg");

        let names: Vec<&str> = bundle
            .attributes
            .iter()
            .map(|attr| attr.name.as_str())
            .collect();
        assert!(names.contains(&"Cor"));
        assert!(names.contains(&"Material"));
        assert!(names.contains(&"Apenas atualização no frontend"));
        assert!(names.contains(&"Altura (cm)"));
        assert!(names.contains(&"Peso (g)"));
        // fulfillment marker is internal and never becomes an attribute
        assert!(!names.contains(&"fulfillment"));

        assert_eq!(bundle.images[1].image_id, "SKU-10_1");
    }

    #[test]
    fn failed_lookups_degrade_to_defaults() {
        let mut bundle = CatalogBundle::default();
        extend_from_sku(
            &mut bundle,
            "SKU-11",
            &json!({"sku": "SKU-11"}),
            None,
            None,
            None,
            &scope(),
        );
        let product = &bundle.products[0];
        assert_eq!(product.title, "");
        assert_eq!(product.price, 0.0);
        assert_eq!(product.stock_quantity, 0);
        assert!(bundle.images.is_empty());
    }

    #[test]
    fn order_total_uses_provider_normalizer() {
        let records = vec![json!({
            "id": 99001,
            "status": "finished",
            "created_at": "2025-03-01T12:00:00-03:00",
            "amounts": {"total": 15075, "normalizer": 100},
            "payments": [{"method": "credit_card", "currency": "BRL"}]
        })];
        let orders = orders(&records, &scope());
        let order = &orders[0];
        assert_eq!(order.order_id, "99001");
        assert_eq!(order.status, "Finalizado");
        assert_eq!(order.payment_status, "Pago");
        assert_eq!(order.payment_method, "Cartão de crédito");
        assert_eq!(order.total_amount, "150.75");
        assert_eq!(order.currency, "BRL");
    }

    #[test]
    fn order_with_missing_normalizer_defaults_to_cents() {
        let records = vec![json!({
            "id": "A-1",
            "status": "cancelled",
            "amounts": {"total": 1050},
            "payments": []
        })];
        let orders = orders(&records, &scope());
        assert_eq!(orders[0].total_amount, "10.50");
        assert_eq!(orders[0].status, "Cancelado");
        assert_eq!(orders[0].payment_method, "");
    }
}
