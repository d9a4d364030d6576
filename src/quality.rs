use crate::models::{
    AttributeRow, ImageRow, InventoryRow, ProductRow, QualityRow, StockFindingRow,
};
use std::collections::HashMap;

pub const OK: &str = "OK";
const FILL_IN: &str = "Necessário preencher";
const NOT_CHECKED: &str = "Não verificado";

/// Per-platform catalog completeness thresholds.
pub struct CatalogRules {
    pub title_min: usize,
    pub title_max: usize,
    pub required_images: usize,
    pub min_resolution: u32,
    pub min_description: usize,
}

pub const MELI_RULES: CatalogRules = CatalogRules {
    title_min: 50,
    title_max: 60,
    required_images: 6,
    min_resolution: 1000,
    min_description: 500,
};

pub const MAGALU_RULES: CatalogRules = CatalogRules {
    title_min: 10,
    title_max: 60,
    required_images: 4,
    min_resolution: 1000,
    min_description: 500,
};

/// Derive one finding per product from already-normalized data. Pure: no
/// I/O, no clock. Findings only exist for products in the given set, so a
/// sku that dropped out of the catalog cannot leave an orphaned finding.
pub fn derive_catalog_findings(
    products: &[ProductRow],
    images: &[ImageRow],
    attributes: &[AttributeRow],
    rules: &CatalogRules,
) -> Vec<QualityRow> {
    let mut image_counts: HashMap<&str, usize> = HashMap::new();
    let mut resolutions: HashMap<&str, Vec<&str>> = HashMap::new();
    for image in images {
        *image_counts.entry(image.sku.as_str()).or_default() += 1;
        resolutions
            .entry(image.sku.as_str())
            .or_default()
            .push(image.resolution.as_str());
    }
    let mut empty_attributes: HashMap<&str, usize> = HashMap::new();
    for attribute in attributes {
        if attribute.value.trim().is_empty() {
            *empty_attributes.entry(attribute.sku.as_str()).or_default() += 1;
        }
    }

    products
        .iter()
        .map(|product| {
            let sku = product.sku.as_str();
            let image_count = image_counts.get(sku).copied().unwrap_or(0);
            let low = low_resolution_count(
                resolutions.get(sku).map(|v| v.as_slice()).unwrap_or(&[]),
                rules.min_resolution,
            );
            let empties = empty_attributes.get(sku).copied().unwrap_or(0);

            QualityRow {
                sku: product.sku.clone(),
                product: product.title.clone(),
                status: product.status.clone(),
                title_check: title_check(&product.title, rules),
                image_count_check: image_count_check(image_count, rules.required_images),
                image_resolution_check: resolution_check(low),
                description_check: description_check(&product.description, rules.min_description),
                brand_check: presence_check(&product.brand),
                attributes_check: format!("{empties} campos vazios"),
                seller: product.seller.clone(),
                platform: product.platform.clone(),
                synced_at: product.synced_at,
            }
        })
        .collect()
}

/// Amazon listings only expose the main image dimensions, so the other
/// checks are marked unverified rather than faked.
pub fn derive_listing_findings(products: &[ProductRow], min_edge: i64) -> Vec<QualityRow> {
    products
        .iter()
        .map(|product| {
            let has_image =
                !product.main_image_url.is_empty() && product.main_image_url != "Sem imagem";
            let resolution_ok = has_image
                && product.main_image_width >= min_edge
                && product.main_image_height >= min_edge;
            QualityRow {
                sku: product.sku.clone(),
                product: product.title.clone(),
                status: product.status.clone(),
                title_check: NOT_CHECKED.to_string(),
                image_count_check: if has_image {
                    OK.to_string()
                } else {
                    "Sem imagem".to_string()
                },
                image_resolution_check: if resolution_ok {
                    OK.to_string()
                } else {
                    "Resolução baixa".to_string()
                },
                description_check: NOT_CHECKED.to_string(),
                brand_check: NOT_CHECKED.to_string(),
                attributes_check: NOT_CHECKED.to_string(),
                seller: product.seller.clone(),
                platform: product.platform.clone(),
                synced_at: product.synced_at,
            }
        })
        .collect()
}

pub fn derive_stock_findings(snapshots: &[InventoryRow]) -> Vec<StockFindingRow> {
    snapshots
        .iter()
        .map(|snapshot| StockFindingRow {
            asin: snapshot.asin.clone(),
            fulfillable_check: match snapshot.fulfillable_quantity {
                None => "Sem estoque".to_string(),
                Some(_) => OK.to_string(),
            },
            unfulfillable_check: match snapshot.unfulfillable_total {
                None | Some(0) => OK.to_string(),
                Some(count) => format!("{count} itens inutilizáveis"),
            },
            seller: snapshot.seller.clone(),
            platform: snapshot.platform.clone(),
            synced_at: snapshot.synced_at,
        })
        .collect()
}

fn title_check(title: &str, rules: &CatalogRules) -> String {
    let length = title.trim().chars().count();
    if length >= rules.title_min && length <= rules.title_max {
        OK.to_string()
    } else {
        FILL_IN.to_string()
    }
}

fn image_count_check(count: usize, required: usize) -> String {
    if count >= required {
        OK.to_string()
    } else {
        format!("Necessário adicionar mais {} imagens", required - count)
    }
}

fn resolution_check(low: usize) -> String {
    if low == 0 {
        OK.to_string()
    } else {
        format!("{low} imagens com qualidade baixa")
    }
}

fn description_check(description: &str, min_length: usize) -> String {
    let trimmed = description.trim();
    if !trimmed.is_empty() && trimmed.chars().count() > min_length {
        OK.to_string()
    } else {
        FILL_IN.to_string()
    }
}

fn presence_check(value: &str) -> String {
    if value.trim().is_empty() {
        FILL_IN.to_string()
    } else {
        OK.to_string()
    }
}

/// Count images whose "WxH" label falls below the threshold on either edge.
/// Labels that do not parse (provider size classes) are not penalized.
fn low_resolution_count(resolutions: &[&str], min_edge: u32) -> usize {
    resolutions
        .iter()
        .filter(|raw| match parse_resolution(raw) {
            Some((width, height)) => width < min_edge || height < min_edge,
            None => false,
        })
        .count()
}

fn parse_resolution(raw: &str) -> Option<(u32, u32)> {
    let lower = raw.trim().to_lowercase();
    let (width, height) = lower.split_once('x')?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Platform, ProductRow, RowScope};

    fn scope() -> RowScope {
        RowScope::new("loja_abc", Platform::Mercadolivre)
    }

    fn image(sku: &str, resolution: &str, scope: &RowScope) -> ImageRow {
        ImageRow {
            image_id: format!("{sku}-{resolution}"),
            sku: sku.to_string(),
            url: "https://cdn.example/img.jpg".to_string(),
            resolution: resolution.to_string(),
            seller: scope.seller.clone(),
            platform: scope.platform_str(),
            synced_at: scope.synced_at,
        }
    }

    #[test]
    fn resolution_labels_parse_loosely() {
        assert_eq!(parse_resolution("1200x900"), Some((1200, 900)));
        assert_eq!(parse_resolution("1200X900"), Some((1200, 900)));
        assert_eq!(parse_resolution("big"), None);
        assert_eq!(low_resolution_count(&["500x500", "1200x1200", "big"], 1000), 1);
    }

    #[test]
    fn complete_product_passes_every_check() {
        let scope = scope();
        let mut product = ProductRow::blank("MLB123", &scope);
        product.title = "a".repeat(55);
        product.description = "d".repeat(600);
        product.brand = "Acme".to_string();
        product.status = "Ativo".to_string();
        let images: Vec<ImageRow> = (0..6)
            .map(|n| {
                let mut img = image("MLB123", "1200x1200", &scope);
                img.image_id = format!("img-{n}");
                img
            })
            .collect();
        let findings = derive_catalog_findings(&[product], &images, &[], &MELI_RULES);
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.title_check, OK);
        assert_eq!(finding.image_count_check, OK);
        assert_eq!(finding.image_resolution_check, OK);
        assert_eq!(finding.description_check, OK);
        assert_eq!(finding.brand_check, OK);
        assert_eq!(finding.attributes_check, "0 campos vazios");
    }

    #[test]
    fn deficient_product_reports_counted_messages() {
        let scope = scope();
        let mut product = ProductRow::blank("MLB456", &scope);
        product.title = "curto".to_string();
        let images = vec![
            image("MLB456", "500x500", &scope),
            image("MLB456", "1600x1600", &scope),
        ];
        let attributes = vec![
            AttributeRow {
                sku: "MLB456".to_string(),
                name: "Cor".to_string(),
                value: String::new(),
                seller: scope.seller.clone(),
                platform: scope.platform_str(),
                synced_at: scope.synced_at,
            },
        ];
        let findings = derive_catalog_findings(&[product], &images, &attributes, &MELI_RULES);
        let finding = &findings[0];
        assert_eq!(finding.title_check, "Necessário preencher");
        assert_eq!(finding.image_count_check, "Necessário adicionar mais 4 imagens");
        assert_eq!(finding.image_resolution_check, "1 imagens com qualidade baixa");
        assert_eq!(finding.description_check, "Necessário preencher");
        assert_eq!(finding.brand_check, "Necessário preencher");
        assert_eq!(finding.attributes_check, "1 campos vazios");
    }

    #[test]
    fn findings_never_cover_unknown_skus() {
        let scope = scope();
        let product = ProductRow::blank("MLB1", &scope);
        let stray_image = image("MLB999", "100x100", &scope);
        let findings = derive_catalog_findings(&[product], &[stray_image], &[], &MELI_RULES);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].sku, "MLB1");
        assert_eq!(findings[0].image_resolution_check, OK);
    }

    #[test]
    fn amazon_listing_findings_flag_small_main_image() {
        let scope = RowScope::new("loja_abc", Platform::Amazon);
        let mut good = ProductRow::blank("B000TEST01", &scope);
        good.main_image_url = "https://m.media.example/1.jpg".to_string();
        good.main_image_width = 800;
        good.main_image_height = 600;
        let mut missing = ProductRow::blank("B000TEST02", &scope);
        missing.main_image_url = "Sem imagem".to_string();
        let findings = derive_listing_findings(&[good, missing], 500);
        assert_eq!(findings[0].image_resolution_check, OK);
        assert_eq!(findings[1].image_count_check, "Sem imagem");
        assert_eq!(findings[1].image_resolution_check, "Resolução baixa");
    }

    #[test]
    fn stock_findings_count_unfulfillable_units() {
        let scope = RowScope::new("loja_abc", Platform::Amazon);
        let snapshot = InventoryRow {
            asin: "B000TEST01".to_string(),
            fnsku: String::new(),
            condition_label: "Novo".to_string(),
            product_name: String::new(),
            fulfillable_quantity: None,
            inbound_receiving: None,
            reserved_total: None,
            reserved_customer: None,
            reserved_transit: None,
            reserved_processing: None,
            researching_total: None,
            unfulfillable_total: Some(3),
            unf_customer_damaged: None,
            unf_warehouse_damaged: None,
            unf_distributor_damaged: None,
            unf_carrier_damaged: None,
            unf_defective: None,
            unf_expired: None,
            future_reserved: None,
            future_buyable: None,
            total_quantity: Some(10),
            last_updated: None,
            seller: scope.seller.clone(),
            platform: scope.platform_str(),
            synced_at: scope.synced_at,
        };
        let findings = derive_stock_findings(&[snapshot]);
        assert_eq!(findings[0].fulfillable_check, "Sem estoque");
        assert_eq!(findings[0].unfulfillable_check, "3 itens inutilizáveis");
    }
}
