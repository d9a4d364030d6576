use crate::fields::{array_at, bool_at, f64_at, i64_at, string_at, text};
use crate::models::{AttributeRow, ImageRow, ProductRow, RowScope, VariationRow};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct CatalogBundle {
    pub products: Vec<ProductRow>,
    pub images: Vec<ImageRow>,
    pub attributes: Vec<AttributeRow>,
    pub variations: Vec<VariationRow>,
}

fn translate_status(status: &str) -> String {
    match status {
        "active" => "Ativo".to_string(),
        "paused" => "Pausado".to_string(),
        "closed" => "Fechado".to_string(),
        other => other.to_string(),
    }
}

fn clean_description(description: &str) -> String {
    if description.trim().is_empty() {
        "Sem descrição".to_string()
    } else {
        description.to_string()
    }
}

fn attribute_value_by_id(attributes: &[Value], id: &str) -> String {
    attributes
        .iter()
        .find(|attr| attr["id"].as_str() == Some(id))
        .map(|attr| string_at(attr, &["value_name"]))
        .unwrap_or_default()
}

/// Fold one item detail into the bundle: the product row plus its images,
/// attributes and variations, all in a single pass over the payload.
pub fn extend_from_item(
    bundle: &mut CatalogBundle,
    detail: &Value,
    description: &str,
    category_name: &str,
    scope: &RowScope,
) {
    let sku = string_at(detail, &["id"]);
    if sku.is_empty() {
        return;
    }

    let pictures = array_at(detail, &["pictures"]);
    let attributes = array_at(detail, &["attributes"]);
    let variations = array_at(detail, &["variations"]);

    let mut product = ProductRow::blank(&sku, scope);
    product.title = string_at(detail, &["title"]);
    product.description = clean_description(description);
    product.category = category_name.to_string();
    product.price = f64_at(detail, &["price"]).unwrap_or(0.0);
    product.status = translate_status(&string_at(detail, &["status"]));
    product.health = string_at(detail, &["health"]);
    product.initial_quantity = i64_at(detail, &["initial_quantity"]).unwrap_or(0);
    product.sold_quantity = i64_at(detail, &["sold_quantity"]).unwrap_or(0);
    product.stock_quantity = i64_at(detail, &["available_quantity"]).unwrap_or(0);
    product.gtin = attribute_value_by_id(attributes, "GTIN");
    product.brand = attribute_value_by_id(attributes, "BRAND");
    product.permalink = string_at(detail, &["permalink"]);
    product.accepts_gateway_payment = bool_at(detail, &["accepts_mercadopago"]);
    product.variation_count = variations.len() as i64;
    product.image_count = pictures.len() as i64;
    product.main_image_url = pictures
        .iter()
        .find_map(|picture| picture["secure_url"].as_str())
        .unwrap_or_default()
        .to_string();
    let warranty = string_at(detail, &["warranty"]);
    product.warranty = if warranty.is_empty() || warranty.eq_ignore_ascii_case("null") {
        "Sem garantia informada".to_string()
    } else {
        warranty
    };
    bundle.products.push(product);

    for attribute in attributes {
        let name = string_at(attribute, &["name"]);
        let value = string_at(attribute, &["value_name"]);
        if name.is_empty() || value.is_empty() || name == "IdProduct" {
            continue;
        }
        bundle.attributes.push(AttributeRow {
            sku: sku.clone(),
            name,
            value,
            seller: scope.seller.clone(),
            platform: scope.platform_str(),
            synced_at: scope.synced_at,
        });
    }

    for picture in pictures {
        bundle.images.push(ImageRow {
            image_id: string_at(picture, &["id"]),
            sku: sku.clone(),
            url: string_at(picture, &["secure_url"]),
            resolution: string_at(picture, &["size"]),
            seller: scope.seller.clone(),
            platform: scope.platform_str(),
            synced_at: scope.synced_at,
        });
    }

    for variation in variations {
        let variation_id = text(&variation["id"]);
        let price = f64_at(variation, &["price"]).unwrap_or(0.0);
        for combination in array_at(variation, &["attribute_combinations"]) {
            bundle.variations.push(VariationRow {
                variation_id: variation_id.clone(),
                sku: sku.clone(),
                price,
                attribute: string_at(combination, &["name"]),
                value: string_at(combination, &["value_name"]),
                seller: scope.seller.clone(),
                platform: scope.platform_str(),
                synced_at: scope.synced_at,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use serde_json::json;

    fn sample_detail() -> Value {
        json!({
            "id": "MLB123456",
            "title": "Fone de ouvido sem fio com cancelamento de ruído",
            "category_id": "MLB1051",
            "price": 299.9,
            "status": "active",
            "health": 0.85,
            "initial_quantity": 50,
            "sold_quantity": 12,
            "available_quantity": 38,
            "permalink": "https://produto.mercadolivre.com.br/MLB123456",
            "accepts_mercadopago": true,
            "warranty": null,
            "pictures": [
                {"id": "IMG-1", "secure_url": "https://http2.mlstatic.com/1.jpg", "size": "500x500"},
                {"id": "IMG-2", "secure_url": "https://http2.mlstatic.com/2.jpg", "size": "1200x1200"}
            ],
            "attributes": [
                {"id": "BRAND", "name": "Marca", "value_name": "Soundcore"},
                {"id": "GTIN", "name": "Código universal", "value_name": "789123"},
                {"id": "ITEM_CONDITION", "name": "Condição", "value_name": ""},
                {"id": "X", "name": "IdProduct", "value_name": "interno"}
            ],
            "variations": [
                {
                    "id": 181234,
                    "price": 279.9,
                    "attribute_combinations": [
                        {"name": "Cor", "value_name": "Preto"},
                        {"name": "Voltagem", "value_name": "Bivolt"}
                    ]
                }
            ]
        })
    }

    #[test]
    fn item_detail_becomes_product_and_side_tables() {
        let scope = RowScope::new("loja_abc", Platform::Mercadolivre);
        let mut bundle = CatalogBundle::default();
        extend_from_item(
            &mut bundle,
            &sample_detail(),
            "Descrição longa do produto",
            "Fones de Ouvido",
            &scope,
        );

        assert_eq!(bundle.products.len(), 1);
        let product = &bundle.products[0];
        assert_eq!(product.sku, "MLB123456");
        assert_eq!(product.status, "Ativo");
        assert_eq!(product.brand, "Soundcore");
        assert_eq!(product.gtin, "789123");
        assert_eq!(product.category, "Fones de Ouvido");
        assert_eq!(product.price, 299.9);
        assert_eq!(product.stock_quantity, 38);
        assert_eq!(product.image_count, 2);
        assert_eq!(product.variation_count, 1);
        assert_eq!(product.warranty, "Sem garantia informada");
        assert_eq!(product.main_image_url, "https://http2.mlstatic.com/1.jpg");
        assert!(product.accepts_gateway_payment);

        // empty values and the internal id marker are filtered out
        assert_eq!(bundle.attributes.len(), 2);
        assert_eq!(bundle.images.len(), 2);
        assert_eq!(bundle.images[0].resolution, "500x500");

        assert_eq!(bundle.variations.len(), 2);
        assert_eq!(bundle.variations[0].variation_id, "181234");
        assert_eq!(bundle.variations[0].price, 279.9);
        assert_eq!(bundle.variations[1].attribute, "Voltagem");
    }

    #[test]
    fn unmapped_status_passes_through() {
        assert_eq!(translate_status("under_review"), "under_review");
        assert_eq!(translate_status("paused"), "Pausado");
    }

    #[test]
    fn missing_id_drops_the_record() {
        let scope = RowScope::new("loja_abc", Platform::Mercadolivre);
        let mut bundle = CatalogBundle::default();
        extend_from_item(&mut bundle, &json!({"title": "sem id"}), "", "", &scope);
        assert!(bundle.products.is_empty());
    }

    #[test]
    fn empty_description_gets_placeholder() {
        assert_eq!(clean_description("  "), "Sem descrição");
        assert_eq!(clean_description("texto"), "texto");
    }
}
