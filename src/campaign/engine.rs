use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::json;

use crate::config::CampaignConfig;
use crate::error::{AppError, Result};
use crate::iterator::{Batch, BatchHandler, CollectionIterator, IterationRequest};
use crate::metrics::{
    BATCHES_TOTAL, CAMPAIGNS_FAILED_TOTAL, CAMPAIGNS_TOTAL, MESSAGES_FAILED_TOTAL,
    MESSAGES_SENT_TOTAL, TOKENS_DELETED_TOTAL,
};
use crate::provider::{is_bad_token_reason, PushMessage, ProviderError, PushProvider, SendOutcome};
use crate::store::{DocumentStore, Filter};

use super::{Caller, CampaignAggregate, FilterSpec, NotificationDraft, NotificationSpec};

/// Tokens per bulk-send call. The provider caps one fan-out call at 500
/// messages; batches are sized to never split a page across calls.
pub const FAN_OUT_BATCH_SIZE: usize = 500;

/// Cross-campaign totals for the engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Campaigns accepted for processing
    pub campaigns_total: AtomicU64,
    /// Batches processed across all campaigns
    pub batches_total: AtomicU64,
    /// Messages accepted by the provider
    pub sent_total: AtomicU64,
    /// Dead registrations deleted
    pub deleted_total: AtomicU64,
}

impl EngineStats {
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            campaigns_total: self.campaigns_total.load(Ordering::Relaxed),
            batches_total: self.batches_total.load(Ordering::Relaxed),
            sent_total: self.sent_total.load(Ordering::Relaxed),
            deleted_total: self.deleted_total.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatsSnapshot {
    pub campaigns_total: u64,
    pub batches_total: u64,
    pub sent_total: u64,
    pub deleted_total: u64,
}

/// Result of one batch-send round trip.
struct BatchOutcome {
    sent: u64,
    deleted: u64,
}

/// Batched push-notification fan-out engine.
///
/// Each campaign call owns its own [`CampaignAggregate`]; no state is
/// shared between concurrent campaigns and overlapping audiences are
/// not deduplicated.
pub struct CampaignEngine {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn PushProvider>,
    iterator: CollectionIterator,
    config: CampaignConfig,
    stats: EngineStats,
}

impl CampaignEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn PushProvider>,
        config: CampaignConfig,
    ) -> Self {
        Self {
            iterator: CollectionIterator::new(store.clone()),
            store,
            provider,
            config,
            stats: EngineStats::default(),
        }
    }

    /// Get engine statistics
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one campaign to completion.
    ///
    /// Fails with `Auth` (caller not authenticated), `Forbidden`
    /// (authenticated but not admin) or `Validation` (bad notification
    /// fields) before anything is queried or sent. A source query
    /// failure aborts the campaign; already-sent batches are not
    /// undone. A failed bulk-send call only zeroes that batch's sends.
    pub async fn send_campaign(
        &self,
        draft: NotificationDraft,
        filters: FilterSpec,
        caller: &Caller,
    ) -> Result<CampaignAggregate> {
        match self.run_campaign(draft, filters, caller).await {
            Ok(aggregate) => Ok(aggregate),
            Err(e) => {
                CAMPAIGNS_FAILED_TOTAL.inc();
                Err(e)
            }
        }
    }

    #[tracing::instrument(
        name = "campaign.send",
        skip(self, draft, filters, caller),
        fields(
            campaign_id = %uuid::Uuid::new_v4(),
            caller = caller.user_id().unwrap_or("anonymous"),
        )
    )]
    async fn run_campaign(
        &self,
        draft: NotificationDraft,
        filters: FilterSpec,
        caller: &Caller,
    ) -> Result<CampaignAggregate> {
        if !caller.is_authenticated() {
            return Err(AppError::Auth("authentication required".into()));
        }
        if !caller.is_admin(&self.config.admin_role) {
            return Err(AppError::Forbidden(format!(
                "role '{}' required to launch campaigns",
                self.config.admin_role
            )));
        }
        if filters.limit == Some(0) {
            return Err(AppError::Validation("filters.limit must be at least 1".into()));
        }

        let spec = NotificationSpec::validate(draft, &self.config)?;

        CAMPAIGNS_TOTAL.inc();
        self.stats.campaigns_total.fetch_add(1, Ordering::Relaxed);

        let aggregate = match &filters.token {
            Some(token) => self.send_single(token, &spec).await,
            None => self.fan_out(&filters, &spec).await?,
        };

        self.stats
            .batches_total
            .fetch_add(aggregate.batches, Ordering::Relaxed);
        self.stats
            .sent_total
            .fetch_add(aggregate.sent, Ordering::Relaxed);
        self.stats
            .deleted_total
            .fetch_add(aggregate.deleted, Ordering::Relaxed);

        tracing::info!(
            subscribers = aggregate.subscribers,
            batches = aggregate.batches,
            sent = aggregate.sent,
            deleted = aggregate.deleted,
            "Campaign completed"
        );

        Ok(aggregate)
    }

    /// Single-token fast path: one bulk-send call with a one-element
    /// batch, no iterator query.
    async fn send_single(&self, token: &str, spec: &NotificationSpec) -> CampaignAggregate {
        let mut aggregate = CampaignAggregate {
            subscribers: 1,
            batches: 1,
            ..Default::default()
        };
        BATCHES_TOTAL.inc();

        match self.dispatch_batch(vec![token.to_string()], spec).await {
            Ok(outcome) => {
                aggregate.sent = outcome.sent;
                aggregate.deleted = outcome.deleted;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Bulk send failed for single-token campaign");
            }
        }

        aggregate
    }

    /// Stream matching registrations through the iterator and fan each
    /// batch out to the provider.
    async fn fan_out(
        &self,
        filters: &FilterSpec,
        spec: &NotificationSpec,
    ) -> Result<CampaignAggregate> {
        let mut request = IterationRequest::new(&self.config.token_collection)
            .batch_size(FAN_OUT_BATCH_SIZE);

        if let Some(tags) = filters.tags.as_ref().filter(|t| !t.is_empty()) {
            request = request.filter(Filter::array_contains_any("tags", tags.clone()));
        }
        if let Some(owner) = &filters.owner {
            request = request.filter(Filter::eq("owner", json!(owner)));
        }
        if let Some(limit) = filters.limit {
            request = request.max_batches(limit.div_ceil(FAN_OUT_BATCH_SIZE as u64));
        }

        let mut handler = FanOutHandler {
            engine: self,
            spec,
            limit: filters.limit,
            aggregate: CampaignAggregate::default(),
        };
        self.iterator.iterate(request, &mut handler).await?;

        Ok(handler.aggregate)
    }

    /// One bulk-send round trip: build a message per token, submit the
    /// batch, interpret per-message outcomes, and clean up dead tokens.
    async fn dispatch_batch(
        &self,
        tokens: Vec<String>,
        spec: &NotificationSpec,
    ) -> Result<BatchOutcome> {
        let messages: Vec<PushMessage> = tokens.iter().map(|t| spec.message_for(t)).collect();

        let outcomes = self.provider.send_batch(&messages).await?;
        if outcomes.len() != messages.len() {
            return Err(AppError::Provider(ProviderError::Rejected(format!(
                "provider returned {} results for {} messages",
                outcomes.len(),
                messages.len()
            ))));
        }

        let failures: Vec<(&String, &SendOutcome)> = tokens
            .iter()
            .zip(outcomes.iter())
            .filter(|(_, outcome)| !outcome.success)
            .collect();

        let sent = (tokens.len() - failures.len()) as u64;
        MESSAGES_SENT_TOTAL.inc_by(sent);
        MESSAGES_FAILED_TOTAL.inc_by(failures.len() as u64);

        let deleted = if failures.is_empty() {
            0
        } else {
            self.cleanup_bad_tokens(&failures).await
        };

        tracing::debug!(
            tokens = tokens.len(),
            sent = sent,
            failed = failures.len(),
            deleted = deleted,
            "Dispatched batch"
        );

        Ok(BatchOutcome { sent, deleted })
    }

    /// Delete every registration whose failure code marks it as
    /// permanently dead. Deletions are issued concurrently and all
    /// awaited so the returned count is deterministic; a failed delete
    /// is logged and not counted.
    async fn cleanup_bad_tokens(&self, failures: &[(&String, &SendOutcome)]) -> u64 {
        let mut deletions = FuturesUnordered::new();

        for (token, outcome) in failures {
            let Some(code) = outcome.error_code.as_deref() else {
                continue;
            };
            if !is_bad_token_reason(code) {
                continue;
            }

            let store = self.store.clone();
            let collection = self.config.token_collection.clone();
            let token = (*token).clone();
            let code = code.to_string();
            deletions.push(async move {
                match store.delete(&collection, &token).await {
                    Ok(()) => {
                        tracing::debug!(
                            token = %token,
                            reason = %code,
                            "Deleted dead registration token"
                        );
                        true
                    }
                    Err(e) => {
                        tracing::warn!(
                            token = %token,
                            error = %e,
                            "Failed to delete dead registration token"
                        );
                        false
                    }
                }
            });
        }

        let mut deleted = 0;
        while let Some(confirmed) = deletions.next().await {
            if confirmed {
                deleted += 1;
            }
        }

        TOKENS_DELETED_TOTAL.inc_by(deleted);
        deleted
    }
}

/// Per-batch handler threading the campaign aggregate through the
/// iteration.
struct FanOutHandler<'a> {
    engine: &'a CampaignEngine,
    spec: &'a NotificationSpec,
    limit: Option<u64>,
    aggregate: CampaignAggregate,
}

#[async_trait]
impl BatchHandler for FanOutHandler<'_> {
    type Output = ();

    async fn handle(&mut self, batch: Batch) -> Result<()> {
        let mut tokens = Vec::with_capacity(batch.documents.len());
        for document in &batch.documents {
            if let Some(limit) = self.limit {
                if self.aggregate.subscribers >= limit {
                    break;
                }
            }
            tokens.push(document.id.clone());
            self.aggregate.subscribers += 1;
        }

        self.aggregate.batches += 1;
        BATCHES_TOTAL.inc();

        // Trailing partial page trimmed to nothing by the limit
        if tokens.is_empty() {
            return Ok(());
        }

        match self.engine.dispatch_batch(tokens, self.spec).await {
            Ok(outcome) => {
                self.aggregate.sent += outcome.sent;
                self.aggregate.deleted += outcome.deleted;
            }
            Err(e) => {
                // One bad batch must not cancel the whole campaign
                tracing::warn!(
                    batch_index = batch.index,
                    error = %e,
                    "Bulk send failed, batch contributes zero sends"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;
    use crate::store::MemoryDocumentStore;
    use std::sync::Mutex;

    /// Provider that serves scripted outcomes and records call sizes.
    #[derive(Default)]
    struct ScriptedProvider {
        /// Error codes to fail, by token value
        failures: Mutex<std::collections::HashMap<String, String>>,
        calls: AtomicU64,
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl ScriptedProvider {
        fn fail_token(&self, token: &str, code: &str) {
            self.failures
                .lock()
                .unwrap()
                .insert(token.to_string(), code.to_string());
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl PushProvider for ScriptedProvider {
        async fn send_batch(
            &self,
            messages: &[PushMessage],
        ) -> std::result::Result<Vec<SendOutcome>, ProviderError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.batch_sizes.lock().unwrap().push(messages.len());
            let failures = self.failures.lock().unwrap();
            Ok(messages
                .iter()
                .map(|m| match failures.get(&m.token) {
                    Some(code) => SendOutcome::failed(code.clone()),
                    None => SendOutcome::ok(),
                })
                .collect())
        }
    }

    fn admin_caller() -> Caller {
        Caller::authenticated(Claims {
            sub: "admin-1".to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: chrono::Utc::now().timestamp(),
            roles: vec!["admin".to_string()],
            extra: Default::default(),
        })
    }

    fn member_caller() -> Caller {
        Caller::authenticated(Claims {
            sub: "user-1".to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: chrono::Utc::now().timestamp(),
            roles: vec!["member".to_string()],
            extra: Default::default(),
        })
    }

    fn draft() -> NotificationDraft {
        NotificationDraft {
            title: Some("New post".to_string()),
            body: Some("A post was published".to_string()),
            icon: None,
            click_action: None,
        }
    }

    fn engine_with(
        store: Arc<MemoryDocumentStore>,
        provider: Arc<ScriptedProvider>,
    ) -> CampaignEngine {
        CampaignEngine::new(store, provider, CampaignConfig::default())
    }

    #[tokio::test]
    async fn test_unauthenticated_rejected_before_any_call() {
        let store = Arc::new(MemoryDocumentStore::new());
        let provider = Arc::new(ScriptedProvider::default());
        let engine = engine_with(store.clone(), provider.clone());

        let result = engine
            .send_campaign(draft(), FilterSpec::default(), &Caller::anonymous())
            .await;

        assert!(matches!(result, Err(AppError::Auth(_))));
        assert_eq!(store.query_calls(), 0);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_admin_rejected_before_any_call() {
        let store = Arc::new(MemoryDocumentStore::new());
        let provider = Arc::new(ScriptedProvider::default());
        let engine = engine_with(store.clone(), provider.clone());

        let result = engine
            .send_campaign(draft(), FilterSpec::default(), &member_caller())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(store.query_calls(), 0);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_click_action_rejected_before_any_call() {
        let store = Arc::new(MemoryDocumentStore::new());
        let provider = Arc::new(ScriptedProvider::default());
        let engine = engine_with(store.clone(), provider.clone());

        let mut bad_draft = draft();
        bad_draft.click_action = Some("not a url".to_string());
        let result = engine
            .send_campaign(bad_draft, FilterSpec::default(), &admin_caller())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.query_calls(), 0);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_token_fast_path_cleanup() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.insert("push_tokens", "abc", json!({"owner": "alice"}));
        let provider = Arc::new(ScriptedProvider::default());
        provider.fail_token("abc", "messaging/invalid-registration-token");
        let engine = engine_with(store.clone(), provider.clone());

        let filters = FilterSpec {
            token: Some("abc".to_string()),
            ..Default::default()
        };
        let aggregate = engine
            .send_campaign(draft(), filters, &admin_caller())
            .await
            .unwrap();

        assert_eq!(aggregate.sent, 0);
        assert_eq!(aggregate.deleted, 1);
        assert_eq!(aggregate.subscribers, 1);
        assert_eq!(aggregate.batches, 1);
        // No iterator queries on the fast path
        assert_eq!(store.query_calls(), 0);
        assert_eq!(provider.calls(), 1);
        assert!(store.get("push_tokens", "abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fan_out_conservation() {
        let store = Arc::new(MemoryDocumentStore::new());
        for i in 0..8 {
            store.insert("push_tokens", format!("tok-{}", i), json!({"owner": "o"}));
        }
        let provider = Arc::new(ScriptedProvider::default());
        // One dead token, one transient failure
        provider.fail_token("tok-2", "messaging/registration-token-not-registered");
        provider.fail_token("tok-5", "messaging/internal-error");
        let engine = engine_with(store.clone(), provider.clone());

        let aggregate = engine
            .send_campaign(draft(), FilterSpec::default(), &admin_caller())
            .await
            .unwrap();

        assert_eq!(aggregate.subscribers, 8);
        assert_eq!(aggregate.sent, 6);
        assert_eq!(aggregate.deleted, 1);
        assert_eq!(store.len("push_tokens"), 7);
        // Transient failure is neither deleted nor retried
        assert!(store.get("push_tokens", "tok-5").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_owner_filter_narrows_audience() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.insert("push_tokens", "tok-a", json!({"owner": "alice"}));
        store.insert("push_tokens", "tok-b", json!({"owner": "bob"}));
        store.insert("push_tokens", "tok-c", json!({"owner": "alice"}));
        let provider = Arc::new(ScriptedProvider::default());
        let engine = engine_with(store.clone(), provider.clone());

        let filters = FilterSpec {
            owner: Some("alice".to_string()),
            ..Default::default()
        };
        let aggregate = engine
            .send_campaign(draft(), filters, &admin_caller())
            .await
            .unwrap();

        assert_eq!(aggregate.subscribers, 2);
        assert_eq!(aggregate.sent, 2);
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let store = Arc::new(MemoryDocumentStore::new());
        let provider = Arc::new(ScriptedProvider::default());
        let engine = engine_with(store, provider);

        let filters = FilterSpec {
            limit: Some(0),
            ..Default::default()
        };
        let result = engine.send_campaign(draft(), filters, &admin_caller()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_stats_accumulate_across_campaigns() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.insert("push_tokens", "tok-a", json!({"owner": "alice"}));
        let provider = Arc::new(ScriptedProvider::default());
        let engine = engine_with(store, provider);

        engine
            .send_campaign(draft(), FilterSpec::default(), &admin_caller())
            .await
            .unwrap();
        engine
            .send_campaign(draft(), FilterSpec::default(), &admin_caller())
            .await
            .unwrap();

        let stats = engine.stats();
        assert_eq!(stats.campaigns_total, 2);
        assert_eq!(stats.sent_total, 2);
        assert_eq!(stats.deleted_total, 0);
    }
}
