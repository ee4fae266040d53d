//! Sync orchestrator.
//!
//! One run fans out to every provider at once, folds their updates into a
//! single update per country, writes the result, clears the view cache and
//! tells connected clients.
//!
//! # Merge order
//!
//! Provider outcomes are folded in registry order, whatever order they
//! finish in, with field-level last-writer-wins. Two fields are written by
//! more than one provider and have a fixed owner instead:
//!
//! | Field                                      | Owner | Also written by |
//! |--------------------------------------------|-------|-----------------|
//! | `politics.is_nato`                         | cia   | gfp             |
//! | `economy.currency`, `economy.currency_code` | cia   | oecd            |
//!
//! After the fold, the owner's values are applied once more.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::Cache;
use crate::model::CountryDataUpdate;
use crate::providers::{self, Provider, ProviderResult};
use crate::realtime::{Broadcaster, ServerEvent};
use crate::storage::{ApplyOutcome, Storage};

pub const DATA_UPDATED_MESSAGE: &str = "Country data has been refreshed";

// ============================================================================
// Run state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Running { started_at: DateTime<Utc> },
}

/// Proof that this caller owns the current run. Dropping it, on any path
/// including a panic, returns the orchestrator to [`SyncState::Idle`].
pub struct SyncPermit {
    state: Arc<Mutex<SyncState>>,
    started_at: DateTime<Utc>,
}

impl SyncPermit {
    /// When the run holding this permit started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        *lock(&self.state) = SyncState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Reports
// ============================================================================

/// Per-provider line of a [`SyncReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutcome {
    pub provider: String,
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub from_cache: bool,
}

impl From<&ProviderResult> for ProviderOutcome {
    fn from(result: &ProviderResult) -> Self {
        Self {
            provider: result.provider.clone(),
            success: result.success,
            count: result.data.len(),
            error: result.error.clone(),
            from_cache: result.from_cache,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// False when the run was refused or failed while writing. Provider
    /// failures alone do not clear it.
    pub success: bool,
    pub results: Vec<ProviderOutcome>,
    pub countries_updated: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    fn refused() -> Self {
        Self {
            success: false,
            results: Vec::new(),
            countries_updated: 0,
            started_at: Utc::now(),
            duration_ms: 0,
            error: Some("Sync already in progress".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusView {
    pub is_running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub last_report: Option<SyncReport>,
}

// ============================================================================
// Orchestrator
// ============================================================================

#[derive(Clone)]
pub struct SyncService {
    storage: Storage,
    cache: Cache,
    broadcaster: Broadcaster,
    providers: Arc<Vec<Arc<dyn Provider>>>,
    payload_ttl: Option<Duration>,
    state: Arc<Mutex<SyncState>>,
    last_report: Arc<Mutex<Option<SyncReport>>>,
}

impl SyncService {
    /// # Arguments
    ///
    /// * `providers` - Provider registry, in merge order
    pub fn new(
        storage: Storage,
        cache: Cache,
        broadcaster: Broadcaster,
        providers: Vec<Arc<dyn Provider>>,
    ) -> Self {
        Self {
            storage,
            cache,
            broadcaster,
            providers: Arc::new(providers),
            payload_ttl: None,
            state: Arc::new(Mutex::new(SyncState::Idle)),
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    /// Reuse provider payloads younger than `ttl`.
    pub fn with_payload_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.payload_ttl = ttl;
        self
    }

    pub fn state(&self) -> SyncState {
        *lock(&self.state)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), SyncState::Running { .. })
    }

    pub fn status(&self) -> SyncStatusView {
        let started_at = match self.state() {
            SyncState::Running { started_at } => Some(started_at),
            SyncState::Idle => None,
        };
        SyncStatusView {
            is_running: started_at.is_some(),
            started_at,
            last_report: lock(&self.last_report).clone(),
        }
    }

    /// Claim the orchestrator. `None` while another run holds it.
    pub fn try_begin(&self) -> Option<SyncPermit> {
        let mut state = lock(&self.state);
        match *state {
            SyncState::Running { .. } => None,
            SyncState::Idle => {
                let started_at = Utc::now();
                *state = SyncState::Running { started_at };
                Some(SyncPermit {
                    state: Arc::clone(&self.state),
                    started_at,
                })
            }
        }
    }

    /// Run a full sync unless one is already running, in which case the
    /// report comes back with `success: false` and no results.
    pub async fn sync_all(&self) -> SyncReport {
        match self.try_begin() {
            Some(permit) => self.run(permit).await,
            None => {
                warn!("Sync already in progress, skipping");
                SyncReport::refused()
            }
        }
    }

    /// Run a full sync under an already claimed permit.
    pub async fn run(&self, permit: SyncPermit) -> SyncReport {
        let clock = Instant::now();
        info!(providers = self.providers.len(), "Starting full data sync");

        let results = self.run_providers().await;
        let outcomes: Vec<ProviderOutcome> = results.iter().map(ProviderOutcome::from).collect();

        let (success, countries_updated, error) = match self.apply_and_notify(&results).await {
            Ok(count) => (true, count, None),
            Err(e) => {
                error!(error = %format!("{e:#}"), "Sync failed");
                (false, 0, Some(format!("{e:#}")))
            }
        };

        let report = SyncReport {
            success,
            results: outcomes,
            countries_updated,
            started_at: permit.started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            error,
        };
        info!(
            success,
            providers_ok = report.results.iter().filter(|r| r.success).count(),
            records = report.results.iter().map(|r| r.count).sum::<usize>(),
            countries_updated,
            duration_ms = report.duration_ms,
            "Full data sync finished"
        );

        *lock(&self.last_report) = Some(report.clone());
        drop(permit);
        report
    }

    /// Every provider at once, results in registry order.
    async fn run_providers(&self) -> Vec<ProviderResult> {
        let handles = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let storage = self.storage.clone();
            let ttl = self.payload_ttl;
            tokio::spawn(async move { providers::run_provider(provider.as_ref(), &storage, None, ttl).await })
        });

        join_all(handles)
            .await
            .into_iter()
            .zip(self.providers.iter())
            .map(|(joined, provider)| {
                joined.unwrap_or_else(|e| {
                    error!(provider = provider.name(), error = %e, "Provider task aborted");
                    ProviderResult {
                        provider: provider.name().to_string(),
                        success: false,
                        data: Vec::new(),
                        error: Some(format!("provider task aborted: {e}")),
                        from_cache: false,
                        timestamp: Utc::now(),
                    }
                })
            })
            .collect()
    }

    async fn apply_and_notify(&self, results: &[ProviderResult]) -> anyhow::Result<usize> {
        let merged = merge_results(results);

        let mut applied = 0;
        for (code, update) in &merged {
            if update.is_empty() {
                continue;
            }
            match self.storage.apply_update(update).await? {
                ApplyOutcome::Applied => applied += 1,
                ApplyOutcome::UnknownCountry => debug!(code = %code, "Skipping update for untracked country"),
            }
        }

        self.cache.invalidate_all().await;

        let succeeded: Vec<&ProviderResult> = results.iter().filter(|r| r.success).collect();
        let reached = self.broadcaster.broadcast(ServerEvent::DataUpdated {
            message: DATA_UPDATED_MESSAGE.to_string(),
            providers: succeeded.iter().map(|r| r.provider.clone()).collect(),
            records: succeeded
                .iter()
                .map(|r| (r.provider.clone(), r.data.len()))
                .collect(),
        });
        debug!(clients = reached, "Sync notification sent");

        Ok(applied)
    }
}

// ============================================================================
// Merge
// ============================================================================

/// A field with a fixed owning provider.
struct ContestedField {
    owner: &'static str,
    apply: fn(&mut CountryDataUpdate, &CountryDataUpdate),
}

const CONTESTED_FIELDS: &[ContestedField] = &[
    ContestedField {
        owner: "cia",
        apply: apply_nato_flag,
    },
    ContestedField {
        owner: "cia",
        apply: apply_currency,
    },
];

fn apply_nato_flag(acc: &mut CountryDataUpdate, owner: &CountryDataUpdate) {
    if let Some(is_nato) = owner.politics.as_ref().and_then(|p| p.is_nato) {
        acc.politics.get_or_insert_with(Default::default).is_nato = Some(is_nato);
    }
}

fn apply_currency(acc: &mut CountryDataUpdate, owner: &CountryDataUpdate) {
    let Some(owned) = owner.economy.as_ref() else {
        return;
    };
    if owned.currency.is_none() && owned.currency_code.is_none() {
        return;
    }
    let economy = acc.economy.get_or_insert_with(Default::default);
    if let Some(currency) = &owned.currency {
        economy.currency = Some(currency.clone());
    }
    if let Some(code) = &owned.currency_code {
        economy.currency_code = Some(code.clone());
    }
}

/// Fold successful provider results into one update per country code.
///
/// `results` must be in registry order.
pub fn merge_results(results: &[ProviderResult]) -> BTreeMap<String, CountryDataUpdate> {
    let mut merged: BTreeMap<String, CountryDataUpdate> = BTreeMap::new();
    let successful = || results.iter().filter(|r| r.success);

    for result in successful() {
        for update in &result.data {
            let code = update.country_code.trim().to_uppercase();
            merged
                .entry(code.clone())
                .or_insert_with(|| CountryDataUpdate::new(code))
                .merge(update);
        }
    }

    for field in CONTESTED_FIELDS {
        for result in successful().filter(|r| r.provider == field.owner) {
            for update in &result.data {
                if let Some(acc) = merged.get_mut(&update.country_code.trim().to_uppercase()) {
                    (field.apply)(acc, update);
                }
            }
        }
    }

    merged
}
