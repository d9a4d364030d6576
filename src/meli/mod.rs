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

const PLATFORM: Platform = Platform::Mercadolivre;

// Findings and side tables are purged before products.
const TABLES: &[&str] = &[
    "quality_findings",
    "product_variations",
    "product_attributes",
    "product_images",
    "products",
];

#[derive(Debug, Clone)]
pub struct MeliConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub page_delay: Duration,
}

impl MeliConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("MERCADOLIVRE_URL_BASE")
                .unwrap_or_else(|_| "https://api.mercadolibre.com".to_string()),
            client_id: env::var("MERCADOLIVRE_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("MERCADOLIVRE_CLIENT_SECRET").unwrap_or_default(),
            page_delay: Duration::from_millis(500),
        }
    }

    fn token_endpoint(&self) -> TokenEndpoint {
        TokenEndpoint {
            url: format!("{}/oauth/token", self.base_url),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

pub struct MeliPipeline {
    config: MeliConfig,
    tokens: TokenStore,
    store: SyncStore,
    client: Client,
}

impl MeliPipeline {
    pub fn from_env(store: SyncStore) -> Self {
        Self {
            config: MeliConfig::from_env(),
            tokens: TokenStore::from_env("MERCADOLIVRE_TOKENS"),
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
        let seller_id = credential.seller_id.clone().unwrap_or_default();
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

        let walk = client::search_item_ids(&mut gateway, &self.config, &seller_id).await;
        pipeline::absorb_walk_error(&walk, "catálogo", &mut messages)?;
        info!(
            target = "mercurio.meli",
            seller,
            items = walk.records.len(),
            "collected item ids"
        );

        let mut bundle = normalize::CatalogBundle::default();
        for id_value in &walk.records {
            let Some(item_id) = id_value.as_str() else {
                continue;
            };
            let detail = match client::item_detail(&mut gateway, &self.config, item_id).await {
                Ok(detail) => detail,
                Err(err) => {
                    let err = pipeline::recoverable(err)?;
                    warn!(target = "mercurio.meli", item_id, error = %err, "item detail failed");
                    continue;
                }
            };
            let description =
                match client::item_description(&mut gateway, &self.config, item_id).await {
                    Ok(text) => text,
                    Err(err) => {
                        pipeline::recoverable(err)?;
                        "Erro de conexão".to_string()
                    }
                };
            let category_name = match detail["category_id"].as_str() {
                Some(category_id) => {
                    match client::category_name(&mut gateway, &self.config, category_id).await {
                        Ok(name) => name,
                        Err(err) => {
                            pipeline::recoverable(err)?;
                            "Erro ao buscar categoria".to_string()
                        }
                    }
                }
                None => "Categoria não encontrada".to_string(),
            };
            normalize::extend_from_item(&mut bundle, &detail, &description, &category_name, &scope);
        }

        messages.push(self.store.upsert(&bundle.products).await.message("produtos"));
        messages.push(self.store.upsert(&bundle.images).await.message("imagens"));
        messages.push(
            self.store
                .upsert(&bundle.attributes)
                .await
                .message("atributos"),
        );
        messages.push(
            self.store
                .upsert(&bundle.variations)
                .await
                .message("variações"),
        );

        let findings = quality::derive_catalog_findings(
            &bundle.products,
            &bundle.images,
            &bundle.attributes,
            &quality::MELI_RULES,
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
