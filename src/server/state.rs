use std::sync::Arc;

use crate::auth::JwtValidator;
use crate::campaign::CampaignEngine;
use crate::config::Settings;
use crate::error::Result;
use crate::provider::create_push_provider;
use crate::store::{create_document_store, DocumentStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub store: Arc<dyn DocumentStore>,
    pub engine: Arc<CampaignEngine>,
}

impl AppState {
    pub async fn new(settings: Settings) -> Result<Self> {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let store = create_document_store(&settings.store).await?;
        let provider = create_push_provider(&settings.provider);
        let engine = Arc::new(CampaignEngine::new(
            store.clone(),
            provider,
            settings.campaign.clone(),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            jwt_validator,
            store,
            engine,
        })
    }
}
