//! Shelter cache service, the facade the chat and timeline layers call.
//!
//! [`ShelterCacheService`] owns the shelter cache and the session mapping,
//! loads them from a [`BlobStore`] at construction and queues a snapshot to a
//! background writer after every mutation. It is an explicitly constructed
//! handle: build one at the application's composition root and clone it into
//! whatever needs it.
//!
//! # Example
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use std::sync::Arc;
//! use serde_json::json;
//! use sheltercache::{CacheConfig, MemoryBlobStore, ShelterCacheService};
//!
//! let service = ShelterCacheService::open(
//!     CacheConfig::default(),
//!     Arc::new(MemoryBlobStore::new()),
//! )
//! .await;
//!
//! let cards = vec![json!({
//!     "card_type": "shelter_search",
//!     "shelters": [{"title": "Central Gym", "location": {"latitude": 35.0, "longitude": 139.0}}]
//! })];
//! service.ingest_for_chat("chat-1", &cards).await.unwrap();
//!
//! let shelters = service.lookup("chat-1").await.unwrap();
//! assert_eq!(shelters[0].name, "Central Gym");
//! # });
//! ```

pub mod writer;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::error::{Result, ShelterError};
use crate::persistence::{BlobStore, SESSION_MAPPING_KEY, SHELTER_CACHE_KEY};
use crate::shelter::{self, CacheKey, CanonicalShelterRecord, RawShelterPayload};
use crate::store::{ResultSetId, SessionMappingStore, ShelterCacheStore};

use writer::PersistenceWriter;

/// Lifecycle of the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    #[default]
    Uninitialized,
    /// Persisted blobs are being read. Reads see the in-memory defaults.
    Loading,
    Ready,
}

/// Observable status for presentation layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceStatus {
    pub state: ServiceState,
    /// At least one ingestion call is in progress.
    pub is_loading: bool,
    /// Message of the last failed ingestion, cleared when the next one starts.
    /// A call that succeeds leaves it alone.
    pub error_message: Option<String>,
}

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestedBatch {
    /// `None` when no shelter was found (nothing was stored).
    pub result_set_id: Option<ResultSetId>,
    pub records: Vec<CanonicalShelterRecord>,
}

impl IngestedBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Aggregate counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_shelters_cached: usize,
    pub total_chat_mappings: usize,
    pub total_processed_groups: usize,
}

/// Read-only view of the cache contents for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugSnapshot {
    pub state: ServiceState,
    pub stats: CacheStats,
    pub cache_keys: Vec<CacheKey>,
    pub chat_ids: Vec<String>,
    pub result_sets: Vec<ResultSetSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSetSummary {
    pub id: ResultSetId,
    pub records: usize,
}

/// Which blobs a mutation touched.
#[derive(Debug, Clone, Copy)]
enum Dirty {
    Sessions,
    Both,
    /// Both stores were emptied; the blobs are removed.
    Removed,
}

#[derive(Default)]
struct CacheState {
    shelters: ShelterCacheStore,
    sessions: SessionMappingStore,
    /// Highest multiple of the retention threshold already warned about.
    warned_buckets: usize,
    /// A mutation queued blobs before the persisted ones were read.
    written_while_loading: bool,
}

struct Inner {
    config: CacheConfig,
    store: Arc<dyn BlobStore>,
    state: RwLock<CacheState>,
    status: watch::Sender<ServiceStatus>,
    /// Ingestion calls currently running.
    in_flight: AtomicUsize,
    writer: PersistenceWriter,
}

/// Shelter cache facade. Clone is cheap: all clones share the same state.
///
/// Every public mutating call, including [`ingest_for_chat`](Self::ingest_for_chat),
/// runs under one write lock, so concurrent calls are serialized even on a
/// multi-threaded runtime.
#[derive(Clone)]
pub struct ShelterCacheService {
    inner: Arc<Inner>,
}

impl ShelterCacheService {
    /// Create the service and load persisted state in the background.
    ///
    /// Returns immediately in [`ServiceState::Loading`]. Calls made before the
    /// load finishes see empty stores, and a blob that finishes loading after
    /// such a call replaces what that call stored. Nothing is written to the
    /// store until the load has read both blobs; the state that results from
    /// the load is then persisted. Use [`open`](Self::open) to avoid the race.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: CacheConfig, store: Arc<dyn BlobStore>) -> Self {
        let service = Self::new(config, store);
        service.set_state(ServiceState::Loading);
        let loader = service.clone();
        tokio::spawn(async move { loader.load().await });
        service
    }

    /// Create the service and wait for persisted state to load.
    pub async fn open(config: CacheConfig, store: Arc<dyn BlobStore>) -> Self {
        let service = Self::new(config, store);
        service.set_state(ServiceState::Loading);
        service.load().await;
        service
    }

    fn new(config: CacheConfig, store: Arc<dyn BlobStore>) -> Self {
        let writer = PersistenceWriter::paused(Arc::clone(&store));
        let (status, _) = watch::channel(ServiceStatus::default());
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                state: RwLock::new(CacheState::default()),
                status,
                in_flight: AtomicUsize::new(0),
                writer,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Current status snapshot.
    pub fn status(&self) -> ServiceStatus {
        self.inner.status.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<ServiceStatus> {
        self.inner.status.subscribe()
    }

    /// Resolve once the initial load has completed.
    pub async fn wait_ready(&self) {
        let mut rx = self.inner.status.subscribe();
        let _ = rx.wait_for(|s| s.state == ServiceState::Ready).await;
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Ingest the cards of one chat response.
    ///
    /// Only cards whose `card_type` matches the configured marker and that
    /// carry a `shelters` list are read. Each shelter is normalized,
    /// fingerprinted and upserted into the cache; the normalized list is
    /// stored under a freshly minted result-set id. A shelter entry that
    /// cannot be processed is logged and skipped.
    ///
    /// No shelters means no mutation and no persistence write.
    pub async fn ingest(&self, cards: &[Value]) -> Result<IngestedBatch> {
        self.ingest_and_bind(cards, None).await
    }

    /// Ingest a whole chat response: either `{"cards": [...]}` or a bare card
    /// array.
    ///
    /// A response without a card list fails the call: the error is recorded
    /// in [`ServiceStatus::error_message`] and returned.
    pub async fn ingest_response(&self, response: &Value) -> Result<IngestedBatch> {
        let cards = match response {
            Value::Array(cards) => cards,
            Value::Object(obj) => match obj.get("cards").and_then(Value::as_array) {
                Some(cards) => cards,
                None => return Err(self.reject_response("response has no 'cards' list")),
            },
            _ => return Err(self.reject_response("response is not a JSON object or array")),
        };
        self.ingest(cards).await
    }

    /// Ingest and bind the resulting result set to `chat_id`.
    ///
    /// Both happen under one lock, so no other call can observe or remove
    /// the result set before it is bound. When nothing was ingested the
    /// existing binding is left alone.
    pub async fn ingest_for_chat(&self, chat_id: &str, cards: &[Value]) -> Result<IngestedBatch> {
        self.ingest_and_bind(cards, Some(chat_id)).await
    }

    async fn ingest_and_bind(
        &self,
        cards: &[Value],
        chat_id: Option<&str>,
    ) -> Result<IngestedBatch> {
        if cards.is_empty() {
            return Ok(IngestedBatch::default());
        }
        self.begin_ingest();

        let batch = {
            let mut state = self.inner.state.write().await;
            let marker = self.inner.config.shelter_card_type.as_str();

            let mut records = Vec::new();
            for (index, entry) in shelter_entries(cards, marker).enumerate() {
                match ingest_one(&mut state.shelters, entry) {
                    Ok(record) => records.push(record),
                    Err(e) => error!(index, error = %e, "Skipping shelter entry"),
                }
            }

            if records.is_empty() {
                debug!(cards = cards.len(), "No shelters in response");
                IngestedBatch::default()
            } else {
                let id = ResultSetId::generate();
                state
                    .sessions
                    .insert_result_set(id.clone(), records.clone());
                if let Some(chat_id) = chat_id {
                    bind(&mut state.sessions, chat_id, &id);
                }
                self.check_retention(&mut state);
                self.persist(&mut state, Dirty::Both);
                debug!(
                    result_set = %id,
                    shelters = records.len(),
                    cached = state.shelters.len(),
                    "Ingested shelter batch"
                );
                IngestedBatch {
                    result_set_id: Some(id),
                    records,
                }
            }
        };

        self.finish_ingest(None);
        Ok(batch)
    }

    // ------------------------------------------------------------------
    // Session mapping
    // ------------------------------------------------------------------

    /// Bind `chat_id` to a result set, replacing any previous binding.
    pub async fn bind_session(&self, chat_id: &str, result_set_id: &ResultSetId) -> Result<()> {
        let mut state = self.inner.state.write().await;
        if !state.sessions.has_result_set(result_set_id) {
            return Err(ShelterError::UnknownResultSet(result_set_id.to_string()));
        }
        bind(&mut state.sessions, chat_id, result_set_id);
        self.persist(&mut state, Dirty::Sessions);
        Ok(())
    }

    /// Records shown for `chat_id`, or `None` if the chat has no shelters.
    pub async fn lookup(&self, chat_id: &str) -> Option<Vec<CanonicalShelterRecord>> {
        let state = self.inner.state.read().await;
        state.sessions.lookup(chat_id).map(|records| records.to_vec())
    }

    /// Records of one result set.
    pub async fn result_set(&self, id: &ResultSetId) -> Option<Vec<CanonicalShelterRecord>> {
        let state = self.inner.state.read().await;
        state.sessions.result_set(id).map(|records| records.to_vec())
    }

    /// The raw payload stored under a cache key.
    pub async fn cached_payload(&self, key: &str) -> Option<RawShelterPayload> {
        let state = self.inner.state.read().await;
        state.shelters.get(key).cloned()
    }

    /// Remove the binding for `chat_id`. Cached payloads and result sets are
    /// kept. Returns whether a binding existed.
    pub async fn unbind(&self, chat_id: &str) -> bool {
        let mut state = self.inner.state.write().await;
        let removed = state.sessions.unbind(chat_id).is_some();
        if removed {
            self.persist(&mut state, Dirty::Sessions);
        }
        removed
    }

    /// Empty both stores and remove their persisted blobs.
    pub async fn clear_all(&self) {
        let mut state = self.inner.state.write().await;
        state.shelters.clear();
        state.sessions.clear();
        state.warned_buckets = 0;
        self.persist(&mut state, Dirty::Removed);
        info!("Shelter cache cleared");
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.state.read().await;
        stats_of(&state)
    }

    pub async fn debug_snapshot(&self) -> DebugSnapshot {
        let state = self.inner.state.read().await;
        DebugSnapshot {
            state: self.status().state,
            stats: stats_of(&state),
            cache_keys: state.shelters.keys(),
            chat_ids: state.sessions.chat_ids(),
            result_sets: state
                .sessions
                .result_set_sizes()
                .into_iter()
                .map(|(id, records)| ResultSetSummary { id, records })
                .collect(),
        }
    }

    /// Wait until every write queued so far has been attempted.
    ///
    /// While the service is still loading this also waits for the load.
    pub async fn flush(&self) {
        self.inner.writer.flush().await;
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn load(&self) {
        let shelters = self
            .load_blob(SHELTER_CACHE_KEY, ShelterCacheStore::from_blob)
            .await;
        let sessions = self
            .load_blob(SESSION_MAPPING_KEY, SessionMappingStore::from_blob)
            .await;

        {
            let mut state = self.inner.state.write().await;
            if let Some(shelters) = shelters {
                state.shelters = shelters;
            }
            if let Some(sessions) = sessions {
                state.sessions = sessions;
            }
            // Snapshots queued while loading predate the loaded blobs.
            if std::mem::take(&mut state.written_while_loading) {
                self.queue_snapshot(&state, Dirty::Both);
            }
            info!(
                backend = self.inner.store.name(),
                shelters = state.shelters.len(),
                chats = state.sessions.chat_count(),
                result_sets = state.sessions.result_set_count(),
                "Shelter cache loaded"
            );
            self.set_state(ServiceState::Ready);
        }
        self.inner.writer.resume();
    }

    async fn load_blob<T>(&self, key: &str, parse: fn(&str) -> Result<T>) -> Option<T> {
        match self.inner.store.load(key).await {
            Ok(Some(blob)) => match parse(&blob) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "Persisted blob is corrupt, starting empty");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to load persisted blob, starting empty");
                None
            }
        }
    }

    /// Serialize the touched blobs under the caller's lock and queue them,
    /// so the writer sees snapshots in mutation order.
    fn persist(&self, state: &mut CacheState, dirty: Dirty) {
        if self.inner.status.borrow().state == ServiceState::Loading {
            state.written_while_loading = true;
        }
        self.queue_snapshot(state, dirty);
    }

    fn queue_snapshot(&self, state: &CacheState, dirty: Dirty) {
        let writer = &self.inner.writer;
        match dirty {
            Dirty::Removed => {
                writer.enqueue_remove(SHELTER_CACHE_KEY);
                writer.enqueue_remove(SESSION_MAPPING_KEY);
                return;
            }
            Dirty::Both => match state.shelters.to_blob() {
                Ok(blob) => writer.enqueue(SHELTER_CACHE_KEY, blob),
                Err(e) => warn!(error = %e, "Failed to serialize shelter cache"),
            },
            Dirty::Sessions => {}
        }
        match state.sessions.to_blob() {
            Ok(blob) => writer.enqueue(SESSION_MAPPING_KEY, blob),
            Err(e) => warn!(error = %e, "Failed to serialize session mapping"),
        }
    }

    fn check_retention(&self, state: &mut CacheState) {
        let threshold = self.inner.config.retention_warn_threshold;
        if threshold == 0 {
            return;
        }
        let buckets = state.shelters.len() / threshold;
        if buckets > state.warned_buckets {
            state.warned_buckets = buckets;
            warn!(
                cached = state.shelters.len(),
                result_sets = state.sessions.result_set_count(),
                threshold,
                "Shelter cache keeps growing; nothing is evicted until clear_all"
            );
        }
    }

    fn set_state(&self, next: ServiceState) {
        self.inner.status.send_modify(|s| s.state = next);
    }

    fn begin_ingest(&self) {
        self.inner.status.send_modify(|s| {
            self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
            s.is_loading = true;
            s.error_message = None;
        });
    }

    /// Pair of [`begin_ingest`](Self::begin_ingest). `is_loading` stays set
    /// while other calls are still running.
    fn finish_ingest(&self, error_message: Option<String>) {
        self.inner.status.send_modify(|s| {
            let previous = self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
            s.is_loading = previous.saturating_sub(1) > 0;
            if error_message.is_some() {
                s.error_message = error_message;
            }
        });
    }

    fn reject_response(&self, reason: &str) -> ShelterError {
        self.begin_ingest();
        let err = ShelterError::InvalidResponse(reason.to_string());
        error!(error = %err, "Shelter ingestion failed");
        self.finish_ingest(Some(err.to_string()));
        err
    }
}

/// Shelter entries of every shelter-search card, in card order.
fn shelter_entries<'a>(
    cards: &'a [Value],
    marker: &'a str,
) -> impl Iterator<Item = &'a Value> + 'a {
    cards
        .iter()
        .filter(move |card| card.get("card_type").and_then(Value::as_str) == Some(marker))
        .filter_map(|card| card.get("shelters").and_then(Value::as_array))
        .flatten()
}

fn bind(sessions: &mut SessionMappingStore, chat_id: &str, id: &ResultSetId) {
    if let Some(previous) = sessions.bind(chat_id, id.clone()) {
        if &previous != id {
            debug!(chat_id, from = %previous, to = %id, "Session rebound");
        }
    }
}

fn ingest_one(shelters: &mut ShelterCacheStore, entry: &Value) -> Result<CanonicalShelterRecord> {
    let payload = shelter::as_payload(entry)?;
    let record = shelter::normalize_shelter(payload);
    let key = shelter::fingerprint(payload);
    shelters.upsert(key, payload.clone());
    Ok(record)
}

fn stats_of(state: &CacheState) -> CacheStats {
    CacheStats {
        total_shelters_cached: state.shelters.len(),
        total_chat_mappings: state.sessions.chat_count(),
        total_processed_groups: state.sessions.result_set_count(),
    }
}
