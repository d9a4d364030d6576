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

const PLATFORM: Platform = Platform::Amazon;

const TABLES: &[&str] = &[
    "stock_findings",
    "quality_findings",
    "inventory_snapshots",
    "orders",
    "revenue_periods",
    "products",
];

/// Main listing image must be at least this many pixels on both edges.
const MIN_MAIN_IMAGE_EDGE: i64 = 500;

#[derive(Debug, Clone)]
pub struct AmazonConfig {
    pub auth_url: String,
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub marketplace_id: String,
    pub page_delay: Duration,
}

impl AmazonConfig {
    pub fn from_env() -> Self {
        Self {
            auth_url: env::var("AMAZON_URL_BASE_AUTH")
                .unwrap_or_else(|_| "https://api.amazon.com/auth/o2/token".to_string()),
            api_url: env::var("AMAZON_URL_BASE_API")
                .unwrap_or_else(|_| "https://sellingpartnerapi-na.amazon.com".to_string()),
            client_id: env::var("AMAZON_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("AMAZON_CLIENT_SECRET").unwrap_or_default(),
            marketplace_id: env::var("AMAZON_MARKETPLACE_ID")
                .unwrap_or_else(|_| "A2Q3Y263D00KWC".to_string()),
            page_delay: Duration::from_secs(2),
        }
    }

    fn token_endpoint(&self) -> TokenEndpoint {
        TokenEndpoint {
            url: self.auth_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

pub struct AmazonPipeline {
    config: AmazonConfig,
    tokens: TokenStore,
    store: SyncStore,
    client: Client,
}

impl AmazonPipeline {
    pub fn from_env(store: SyncStore) -> Self {
        Self {
            config: AmazonConfig::from_env(),
            tokens: TokenStore::from_env("AMAZON_TOKENS"),
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

        // LWA credentials only carry a refresh token; mint the access token
        // up front so the first listing call is already authenticated.
        let mut session = TokenSession::new(self.config.token_endpoint(), &credential);
        session
            .ensure_access(&self.client)
            .await
            .map_err(|err| SyncError::Auth(err.to_string()))?;
        let mut gateway = Gateway::new(self.client.clone(), session, AuthStyle::AmzAccessToken);

        self.store
            .purge_seller(PLATFORM.as_str(), seller, TABLES)
            .await
            .map_err(|err| SyncError::Purge(err.to_string()))?;

        let mut messages = Vec::new();

        let listing_walk = client::listing_items(&mut gateway, &self.config, &seller_id).await;
        pipeline::absorb_walk_error(&listing_walk, "produtos", &mut messages)?;
        info!(
            target = "mercurio.amazon",
            seller,
            listings = listing_walk.records.len(),
            "collected listings"
        );
        let products = normalize::products(&listing_walk.records, &scope);
        messages.push(self.store.upsert(&products).await.message("produtos"));
        let listing_findings = quality::derive_listing_findings(&products, MIN_MAIN_IMAGE_EDGE);
        messages.push(
            self.store
                .upsert(&listing_findings)
                .await
                .message("erros de qualidade"),
        );

        let order_walk = client::orders(&mut gateway, &self.config).await;
        pipeline::absorb_walk_error(&order_walk, "pedidos", &mut messages)?;
        let orders = normalize::orders(&order_walk.records, &scope);
        messages.push(self.store.upsert(&orders).await.message("pedidos"));

        let inventory_walk = client::inventory_summaries(&mut gateway, &self.config).await;
        pipeline::absorb_walk_error(&inventory_walk, "estoque", &mut messages)?;
        let snapshots = normalize::inventory(&inventory_walk.records, &scope);
        messages.push(self.store.upsert(&snapshots).await.message("estoque"));
        let stock_findings = quality::derive_stock_findings(&snapshots);
        messages.push(
            self.store
                .upsert(&stock_findings)
                .await
                .message("erros de estoque"),
        );

        let metrics = match client::order_metrics(&mut gateway, &self.config).await {
            Ok(metrics) => metrics,
            Err(err) => {
                let err = pipeline::recoverable(err)?;
                warn!(target = "mercurio.amazon", error = %err, "order metrics fetch failed");
                messages.push(format!("Coleta parcial de faturamento: {err}."));
                Vec::new()
            }
        };
        let revenue = normalize::revenue(&metrics, &scope);
        messages.push(self.store.upsert(&revenue).await.message("faturamento"));

        Ok(messages)
    }
}
