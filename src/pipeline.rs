use crate::http::FetchError;
use crate::models::{CollectRequest, CollectResponse, Platform};
use crate::paginate::PageWalk;
use crate::store::SyncStore;
use chrono::Utc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Fatal sync outcomes. Everything else a pipeline hits is absorbed into the
/// aggregated message list and the sync keeps going entity by entity.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("vendedor `{0}` não encontrado")]
    SellerNotFound(String),
    #[error("falha de autenticação: {0}")]
    Auth(String),
    #[error("falha ao limpar dados antigos: {0}")]
    Purge(String),
}

/// One orchestrator per platform, all sharing the same shape: auth → purge →
/// fetch/normalize/persist per entity → derive quality → aggregate messages.
pub struct Pipelines {
    meli: crate::meli::MeliPipeline,
    amazon: crate::amazon::AmazonPipeline,
    magalu: crate::magalu::MagaluPipeline,
}

impl Pipelines {
    pub fn from_env(store: SyncStore) -> Self {
        Self {
            meli: crate::meli::MeliPipeline::from_env(store.clone()),
            amazon: crate::amazon::AmazonPipeline::from_env(store.clone()),
            magalu: crate::magalu::MagaluPipeline::from_env(store),
        }
    }

    pub async fn collect(&self, request: &CollectRequest) -> Result<CollectResponse, SyncError> {
        info!(
            target = "mercurio.pipeline",
            platform = request.platform.as_str(),
            seller = %request.seller,
            "sync started"
        );
        let started = Instant::now();
        let messages = match request.platform {
            Platform::Mercadolivre => self.meli.collect(&request.seller).await?,
            Platform::Amazon => self.amazon.collect(&request.seller).await?,
            Platform::Magalu => self.magalu.collect(&request.seller).await?,
        };
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::sync_elapsed(request.platform.as_str(), elapsed_ms);
        info!(
            target = "mercurio.pipeline",
            platform = request.platform.as_str(),
            seller = %request.seller,
            elapsed_ms = elapsed_ms as u64,
            "sync finished"
        );
        Ok(CollectResponse {
            platform: request.platform,
            seller: request.seller.clone(),
            messages,
            finished_at: Utc::now(),
        })
    }

    pub fn sellers(&self, platform: Platform) -> Vec<String> {
        match platform {
            Platform::Mercadolivre => self.meli.sellers(),
            Platform::Amazon => self.amazon.sellers(),
            Platform::Magalu => self.magalu.sellers(),
        }
    }
}

/// Sort a walk's terminating error: refresh failures abort the seller, any
/// other failure becomes a partial-coverage note in the message list.
pub fn absorb_walk_error(
    walk: &PageWalk,
    resource: &str,
    messages: &mut Vec<String>,
) -> Result<(), SyncError> {
    if let Some(err) = &walk.error {
        if err.is_auth() {
            return Err(SyncError::Auth(err.to_string()));
        }
        if let Some(note) = walk.partial_note(resource) {
            messages.push(note);
        }
    }
    Ok(())
}

/// Same sorting for single-request fetches: hand the error back to the
/// caller to skip locally unless it is an auth failure, which is fatal.
pub fn recoverable(err: FetchError) -> Result<FetchError, SyncError> {
    if err.is_auth() {
        Err(SyncError::Auth(err.to_string()))
    } else {
        Ok(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_failures_are_fatal() {
        let walk = PageWalk {
            records: vec![],
            pages: 1,
            error: Some(FetchError::Refresh("HTTP 400".into())),
        };
        let mut messages = Vec::new();
        let result = absorb_walk_error(&walk, "produtos", &mut messages);
        assert!(matches!(result, Err(SyncError::Auth(_))));
        assert!(messages.is_empty());
    }

    #[test]
    fn plain_failures_become_partial_notes() {
        let walk = PageWalk {
            records: vec![serde_json::json!({"id": 1})],
            pages: 2,
            error: Some(FetchError::Status(503)),
        };
        let mut messages = Vec::new();
        absorb_walk_error(&walk, "pedidos", &mut messages).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("pedidos"));
    }

    #[test]
    fn recoverable_passes_non_auth_errors_through() {
        assert!(recoverable(FetchError::Status(500)).is_ok());
        assert!(recoverable(FetchError::Refresh("denied".into())).is_err());
    }
}
