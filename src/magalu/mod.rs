mod client;
mod normalize;

use crate::http::{AuthStyle, Gateway, build_client};
use crate::models::{Platform, RowScope};
use crate::pipeline::{self, SyncError};
use crate::quality;
use crate::store::SyncStore;
use crate::tokens::{TokenEndpoint, TokenSession, TokenStore};
use reqwest::Client;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

const PLATFORM: Platform = Platform::Magalu;

const TABLES: &[&str] = &[
    "quality_findings",
    "product_attributes",
    "product_images",
    "orders",
    "products",
];

#[derive(Debug, Clone)]
pub struct MagaluConfig {
    pub auth_url: String,
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub page_limit: u64,
    pub page_delay: Duration,
}

impl MagaluConfig {
    pub fn from_env() -> Self {
        Self {
            auth_url: env::var("MAGALU_URL_BASE_AUTH")
                .unwrap_or_else(|_| "https://id.magalu.com".to_string()),
            api_url: env::var("MAGALU_URL_BASE_API")
                .unwrap_or_else(|_| "https://api.magalu.com".to_string()),
            client_id: env::var("MAGALU_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("MAGALU_CLIENT_SECRET").unwrap_or_default(),
            page_limit: 100,
            page_delay: Duration::from_millis(500),
        }
    }

    fn token_endpoint(&self) -> TokenEndpoint {
        TokenEndpoint {
            url: format!("{}/oauth/token", self.auth_url),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

pub struct MagaluPipeline {
    config: MagaluConfig,
    tokens: TokenStore,
    store: SyncStore,
    client: Client,
}

impl MagaluPipeline {
    pub fn from_env(store: SyncStore) -> Self {
        Self {
            config: MagaluConfig::from_env(),
            tokens: TokenStore::from_env("MAGALU_TOKENS"),
            store,
            client: build_client(),
        }
    }

    pub fn sellers(&self) -> Vec<String> {
        self.tokens.seller_names()
    }

    pub async fn collect(&self, seller: &str) -> Result<Vec<String>, SyncError> {
        let credential = self
            .tokens
            .get(seller)
            .ok_or_else(|| SyncError::SellerNotFound(seller.to_string()))?
            .clone();
        let scope = RowScope::new(seller, PLATFORM);
        let mut gateway = Gateway::new(
            self.client.clone(),
            TokenSession::new(self.config.token_endpoint(), &credential),
            AuthStyle::Bearer,
        );

        self.store
            .purge_seller(PLATFORM.as_str(), seller, TABLES)
            .await
            .map_err(|err| SyncError::Purge(err.to_string()))?;

        let mut messages = Vec::new();

        let sku_walk = client::list_skus(&mut gateway, &self.config).await;
        pipeline::absorb_walk_error(&sku_walk, "catálogo", &mut messages)?;
        info!(
            target = "mercurio.magalu",
            seller,
            skus = sku_walk.records.len(),
            "collected skus"
        );

        let mut bundle = normalize::CatalogBundle::default();
        for item in &sku_walk.records {
            let sku_id = item["sku"].as_str().unwrap_or_default().to_string();
            if sku_id.is_empty() {
                warn!(target = "mercurio.magalu", "sku without id, skipping");
                continue;
            }
            // Detail lookups are per sku; a failed one degrades that sku's
            // fields to defaults instead of dropping the whole catalog.
            let price = match client::sku_price(&mut gateway, &self.config, &sku_id).await {
                Ok(payload) => Some(payload),
                Err(err) => {
                    let err = pipeline::recoverable(err)?;
                    warn!(target = "mercurio.magalu", sku = %sku_id, error = %err, "price lookup failed");
                    None
                }
            };
            let stock = match client::sku_stock(&mut gateway, &self.config, &sku_id).await {
                Ok(payload) => Some(payload),
                Err(err) => {
                    let err = pipeline::recoverable(err)?;
                    warn!(target = "mercurio.magalu", sku = %sku_id, error = %err, "stock lookup failed");
                    None
                }
            };
            let detail = match client::sku_detail(&mut gateway, &self.config, &sku_id).await {
                Ok(payload) => Some(payload),
                Err(err) => {
                    let err = pipeline::recoverable(err)?;
                    warn!(target = "mercurio.magalu", sku = %sku_id, error = %err, "detail lookup failed");
                    None
                }
            };
            normalize::extend_from_sku(
                &mut bundle,
                &sku_id,
                item,
                detail.as_ref(),
                price.as_ref(),
                stock.as_ref(),
                &scope,
            );
        }

        messages.push(self.store.upsert(&bundle.products).await.message("produtos"));
        messages.push(self.store.upsert(&bundle.images).await.message("imagens"));
        messages.push(
            self.store
                .upsert(&bundle.attributes)
                .await
                .message("atributos"),
        );

        let order_walk = client::list_orders(&mut gateway, &self.config).await;
        pipeline::absorb_walk_error(&order_walk, "pedidos", &mut messages)?;
        let orders = normalize::orders(&order_walk.records, &scope);
        messages.push(self.store.upsert(&orders).await.message("pedidos"));

        let findings = quality::derive_catalog_findings(
            &bundle.products,
            &bundle.images,
            &bundle.attributes,
            &quality::MAGALU_RULES,
        );
        messages.push(
            self.store
                .upsert(&findings)
                .await
                .message("erros de qualidade"),
        );

        Ok(messages)
    }
}
