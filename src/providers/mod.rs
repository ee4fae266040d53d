//! Statistics providers.
//!
//! Each provider supplies a fixed catalog of per-country updates for one
//! data domain, compiled from a public upstream source:
//!
//! - [`worldbank`]: World Bank development indicators (demographics, economy, education)
//! - [`un`]: UN World Population Prospects (population structure)
//! - [`oecd`]: OECD statistics (income, wages, trade, debt)
//! - [`cia`]: CIA World Factbook (government, currency, life expectancy)
//! - [`gfp`]: Global Firepower (military strength)
//! - [`henley`]: Henley Passport Index
//! - [`who`]: WHO Global Health Observatory
//! - [`numbeo`]: Numbeo crime indices
//!
//! Catalogs are keyed by ISO alpha-3 code. Providers are composed by the
//! sync orchestrator as a list of `Arc<dyn Provider>`; [`run_provider`] wraps
//! each run with sync logging, payload caching and error capture.

pub mod cia;
pub mod gfp;
pub mod henley;
pub mod numbeo;
pub mod oecd;
pub mod un;
pub mod who;
pub mod worldbank;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::model::{CountryDataUpdate, SyncLogEntry, SyncStatus};
use crate::storage::Storage;

pub use cia::CiaFactbookProvider;
pub use gfp::GlobalFirepowerProvider;
pub use henley::HenleyPassportProvider;
pub use numbeo::NumbeoCrimeProvider;
pub use oecd::OecdProvider;
pub use un::UnPopulationProvider;
pub use who::WhoHealthProvider;
pub use worldbank::WorldBankProvider;

/// A source of partial country updates.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used in sync logs and broadcasts.
    fn name(&self) -> &'static str;

    /// Upstream the catalog was compiled from.
    fn source(&self) -> &'static str;

    /// Updates for the requested alpha-3 codes, or for every catalogued
    /// country when `codes` is `None`. Unknown codes are skipped.
    async fn fetch(&self, codes: Option<&[String]>) -> anyhow::Result<Vec<CountryDataUpdate>>;
}

/// Outcome of one provider run. Failures are data, not errors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub provider: String,
    pub success: bool,
    pub data: Vec<CountryDataUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Served from the payload cache instead of the provider.
    pub from_cache: bool,
    pub timestamp: DateTime<Utc>,
}

/// The production provider registry, in merge order.
///
/// Later providers win field-level conflicts during the merge, apart from
/// the contested fields handled in `sync`.
pub fn default_providers() -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(WorldBankProvider),
        Arc::new(UnPopulationProvider),
        Arc::new(OecdProvider),
        Arc::new(CiaFactbookProvider),
        Arc::new(GlobalFirepowerProvider),
        Arc::new(HenleyPassportProvider),
        Arc::new(WhoHealthProvider),
        Arc::new(NumbeoCrimeProvider),
    ]
}

/// Run one provider, recording a `started` and a terminal sync log row.
///
/// Never fails: provider errors come back as `success: false` with the
/// error message, and sync log or payload cache write failures are logged
/// and ignored.
///
/// # Arguments
///
/// * `codes` - Optional alpha-3 filter passed to the provider
/// * `payload_ttl` - When set, reuse a cached payload younger than this and
///   cache fresh payloads for this long
pub async fn run_provider(
    provider: &dyn Provider,
    storage: &Storage,
    codes: Option<&[String]>,
    payload_ttl: Option<Duration>,
) -> ProviderResult {
    let name = provider.name();
    let started_at = Utc::now();
    let clock = Instant::now();
    let endpoint = payload_endpoint(codes);

    record(storage, SyncLogEntry::started(name, started_at)).await;
    debug!(provider = name, source = provider.source(), "Provider sync starting");

    let cached = match payload_ttl {
        Some(_) => cached_updates(storage, name, &endpoint).await,
        None => None,
    };
    let from_cache = cached.is_some();

    let outcome = match cached {
        Some(updates) => Ok(updates),
        None => provider.fetch(codes).await,
    };

    match outcome {
        Ok(updates) => {
            if let (Some(ttl), false) = (payload_ttl, from_cache) {
                store_updates(storage, name, &endpoint, &updates, ttl).await;
            }

            let entry = SyncLogEntry::finished(name, SyncStatus::Success, updates.len(), None, started_at)
                .with_metadata(serde_json::json!({ "fromCache": from_cache, "endpoint": endpoint }));
            record(storage, entry).await;

            info!(
                provider = name,
                count = updates.len(),
                from_cache,
                duration_ms = clock.elapsed().as_millis() as u64,
                "Provider sync completed"
            );

            ProviderResult {
                provider: name.to_string(),
                success: true,
                data: updates,
                error: None,
                from_cache,
                timestamp: Utc::now(),
            }
        }
        Err(e) => {
            let message = format!("{e:#}");
            let entry =
                SyncLogEntry::finished(name, SyncStatus::Failed, 0, Some(message.clone()), started_at);
            record(storage, entry).await;

            error!(
                provider = name,
                error = %message,
                duration_ms = clock.elapsed().as_millis() as u64,
                "Provider sync failed"
            );

            ProviderResult {
                provider: name.to_string(),
                success: false,
                data: Vec::new(),
                error: Some(message),
                from_cache: false,
                timestamp: Utc::now(),
            }
        }
    }
}

async fn record(storage: &Storage, entry: SyncLogEntry) {
    if let Err(e) = storage.insert_sync_log(&entry).await {
        warn!(provider = %entry.provider, error = %e, "Failed to write sync log");
    }
}

async fn cached_updates(
    storage: &Storage,
    provider: &str,
    endpoint: &str,
) -> Option<Vec<CountryDataUpdate>> {
    let payload = match storage.cached_payload(provider, endpoint, Utc::now()).await {
        Ok(payload) => payload?,
        Err(e) => {
            warn!(provider, error = %e, "Payload cache read failed");
            return None;
        }
    };

    match serde_json::from_value(payload) {
        Ok(updates) => Some(updates),
        Err(e) => {
            warn!(provider, error = %e, "Discarding unreadable cached payload");
            None
        }
    }
}

async fn store_updates(
    storage: &Storage,
    provider: &str,
    endpoint: &str,
    updates: &[CountryDataUpdate],
    ttl: Duration,
) {
    let expires_at = match chrono::Duration::from_std(ttl) {
        Ok(ttl) => Utc::now() + ttl,
        Err(_) => return,
    };
    let payload = match serde_json::to_value(updates) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(provider, error = %e, "Failed to serialize provider payload");
            return;
        }
    };

    if let Err(e) = storage.store_payload(provider, endpoint, &payload, expires_at).await {
        warn!(provider, error = %e, "Payload cache write failed");
    }
}

/// Cache key for a filter: `all`, or the sorted, uppercased code list.
fn payload_endpoint(codes: Option<&[String]>) -> String {
    match codes {
        None => "all".to_string(),
        Some(codes) => {
            let mut codes: Vec<String> = codes.iter().map(|c| c.trim().to_uppercase()).collect();
            codes.sort();
            codes.dedup();
            codes.join(",")
        }
    }
}

/// Rows of a catalog matching the requested codes, in catalog order.
pub(crate) fn select<'a, T>(
    catalog: &'a [T],
    codes: Option<&[String]>,
    code_of: impl Fn(&T) -> &str,
) -> Vec<&'a T> {
    match codes {
        None => catalog.iter().collect(),
        Some(codes) => catalog
            .iter()
            .filter(|row| codes.iter().any(|c| c.trim().eq_ignore_ascii_case(code_of(row))))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SyncStatus;

    struct BrokenProvider;

    #[async_trait]
    impl Provider for BrokenProvider {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn source(&self) -> &'static str {
            "test"
        }

        async fn fetch(&self, _codes: Option<&[String]>) -> anyhow::Result<Vec<CountryDataUpdate>> {
            anyhow::bail!("upstream returned 503")
        }
    }

    #[test]
    fn test_select_filters_case_insensitively() {
        let catalog = ["USA", "DEU", "JPN"];
        let codes = vec!["jpn".to_string(), "usa".to_string(), "XXX".to_string()];

        let selected = select(&catalog, Some(codes.as_slice()), |c| *c);
        assert_eq!(selected, vec![&"USA", &"JPN"]);
        assert_eq!(select(&catalog, None, |c| *c).len(), 3);
    }

    #[test]
    fn test_payload_endpoint_is_order_independent() {
        let a = vec!["deu".to_string(), "USA".to_string()];
        let b = vec!["USA".to_string(), "DEU".to_string(), "DEU".to_string()];
        assert_eq!(payload_endpoint(Some(a.as_slice())), payload_endpoint(Some(b.as_slice())));
        assert_eq!(payload_endpoint(None), "all");
    }

    #[test]
    fn test_registry_order() {
        let names: Vec<_> = default_providers().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec!["worldbank", "un", "oecd", "cia", "gfp", "henley", "who", "numbeo"]
        );
    }

    #[tokio::test]
    async fn test_failed_run_is_captured_and_logged() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        let result = run_provider(&BrokenProvider, &storage, None, None).await;
        assert!(!result.success);
        assert!(result.data.is_empty());
        assert_eq!(result.error.as_deref(), Some("upstream returned 503"));

        let logs = storage.recent_sync_logs(10).await.unwrap();
        let statuses: Vec<_> = logs.iter().map(|l| l.entry.status).collect();
        assert_eq!(statuses, vec![SyncStatus::Failed, SyncStatus::Started]);
        assert_eq!(logs[0].entry.error_message.as_deref(), Some("upstream returned 503"));
    }

    #[tokio::test]
    async fn test_successful_run_logs_record_count() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let codes = vec!["USA".to_string(), "JPN".to_string()];

        let result = run_provider(&HenleyPassportProvider, &storage, Some(codes.as_slice()), None).await;
        assert!(result.success);
        assert_eq!(result.data.len(), 2);

        let logs = storage.recent_sync_logs(1).await.unwrap();
        assert_eq!(logs[0].entry.status, SyncStatus::Success);
        assert_eq!(logs[0].entry.records_count, 2);
    }

    #[tokio::test]
    async fn test_payload_cache_short_circuits_fetch() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let ttl = Some(Duration::from_secs(3600));

        let first = run_provider(&WhoHealthProvider, &storage, None, ttl).await;
        assert!(first.success);
        assert!(!first.from_cache);

        let second = run_provider(&WhoHealthProvider, &storage, None, ttl).await;
        assert!(second.success);
        assert!(second.from_cache);
        assert_eq!(first.data, second.data);
    }
}
