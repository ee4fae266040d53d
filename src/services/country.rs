//! Country list, search and detail views.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Lookup, cache_aside, normalize_code};
use crate::cache::Cache;
use crate::error::{ApiResult, AppError};
use crate::model::{
    CountryListItem, CountryRecord, Crime, CrimeCategoryShare, Demographics, Economy, Education,
    Health, Military, Politics,
};
use crate::storage::Storage;

pub const COUNTRY_LIST_KEY: &str = "countries:all";

/// Maximum number of search results.
const SEARCH_LIMIT: usize = 10;

/// Scores above this are not considered a match (0 is exact).
const SEARCH_THRESHOLD: f64 = 0.4;

/// Full country detail as served to clients.
///
/// Every category is present; fields with no data are `null`. Membership
/// flags are never `null` (UN membership defaults to `true`, the others to
/// `false`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryView {
    /// Display name.
    pub country: String,
    pub code: String,
    pub code3: Option<String>,
    pub official_name: Option<String>,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub capital: Option<String>,
    pub flag_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub categories: CategoryViews,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryViews {
    pub demographics: Demographics,
    pub economy: Economy,
    pub military: Military,
    pub political: Politics,
    pub crime: CrimeView,
    pub health: Health,
    pub education: Education,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeView {
    #[serde(flatten)]
    pub stats: Crime,
    pub crime_categories: Vec<CrimeCategoryShare>,
}

impl From<CountryRecord> for CountryView {
    fn from(record: CountryRecord) -> Self {
        let identity = record.country.identity;

        let mut military = record.military.unwrap_or_default();
        military.nuclear_weapons.get_or_insert(false);
        military.is_nato_member.get_or_insert(false);

        let mut political = record.politics.unwrap_or_default();
        political.is_un.get_or_insert(true);
        for flag in [
            &mut political.is_eu,
            &mut political.is_nato,
            &mut political.is_g7,
            &mut political.is_g20,
            &mut political.is_brics,
        ] {
            flag.get_or_insert(false);
        }

        Self {
            country: identity.name,
            code: identity.code,
            code3: Some(identity.code3).filter(|c| !c.is_empty()),
            official_name: identity.official_name,
            region: identity.region,
            subregion: identity.subregion,
            capital: identity.capital,
            flag_url: identity.flag_url,
            latitude: identity.latitude,
            longitude: identity.longitude,
            categories: CategoryViews {
                demographics: record.demographics.unwrap_or_default(),
                economy: record.economy.unwrap_or_default(),
                military,
                political,
                crime: CrimeView {
                    stats: record.crime.unwrap_or_default(),
                    crime_categories: record.crime_categories,
                },
                health: record.health.unwrap_or_default(),
                education: record.education.unwrap_or_default(),
            },
        }
    }
}

#[derive(Clone)]
pub struct CountryService {
    storage: Storage,
    cache: Cache,
    ttl: Duration,
}

impl CountryService {
    pub fn new(storage: Storage, cache: Cache, ttl: Duration) -> Self {
        Self {
            storage,
            cache,
            ttl,
        }
    }

    /// All countries, ordered by name.
    pub async fn list(&self) -> ApiResult<Lookup<Vec<CountryListItem>>> {
        cache_aside(&self.cache, COUNTRY_LIST_KEY, self.ttl, || async {
            Ok(self.storage.list_countries().await?)
        })
        .await
    }

    /// Fuzzy search over name, official name, both codes and capital.
    ///
    /// # Returns
    ///
    /// At most ten matches, best first.
    pub async fn search(&self, query: &str) -> ApiResult<Vec<CountryListItem>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("Search query is required"));
        }

        let countries = self.list().await?.data;
        let results = rank_matches(countries, query);
        debug!(query, matches = results.len(), "Country search");
        Ok(results)
    }

    /// Full detail for a country by alpha-2 or alpha-3 code.
    pub async fn get(&self, code: &str) -> ApiResult<Lookup<CountryView>> {
        let code = normalize_code(code);
        let key = format!("country:{code}");

        cache_aside(&self.cache, &key, self.ttl, || async {
            self.storage
                .load_country(&code)
                .await?
                .map(CountryView::from)
                .ok_or_else(|| AppError::not_found(format!("Country with code {code}")))
        })
        .await
    }
}

// ============================================================================
// Fuzzy matching
// ============================================================================

fn rank_matches(countries: Vec<CountryListItem>, query: &str) -> Vec<CountryListItem> {
    let query = query.to_lowercase();

    let mut scored: Vec<(f64, CountryListItem)> = countries
        .into_iter()
        .filter_map(|country| {
            let score = [
                Some(country.name.as_str()),
                country.official_name.as_deref(),
                Some(country.code.as_str()),
                country.code3.as_deref(),
                country.capital.as_deref(),
            ]
            .into_iter()
            .flatten()
            .map(|field| field_score(&query, &field.to_lowercase()))
            .fold(f64::INFINITY, f64::min);

            (score <= SEARCH_THRESHOLD).then_some((score, country))
        })
        .collect();

    scored.sort_by(|(a, ca), (b, cb)| a.total_cmp(b).then_with(|| ca.name.cmp(&cb.name)));
    scored
        .into_iter()
        .take(SEARCH_LIMIT)
        .map(|(_, country)| country)
        .collect()
}

/// 0.0 for an exact match, growing towards 1.0 as the field diverges.
fn field_score(query: &str, field: &str) -> f64 {
    if field == query {
        return 0.0;
    }
    if field.starts_with(query) {
        return 0.1;
    }
    if field.split_whitespace().any(|word| word.starts_with(query)) {
        return 0.15;
    }
    if field.contains(query) {
        return 0.2;
    }

    // Typo tolerance, against the whole field or its prefix of the same length.
    let query_len = query.chars().count();
    let prefix: String = field.chars().take(query_len).collect();
    let distance = levenshtein(query, field).min(levenshtein(query, &prefix));
    0.2 + 0.5 * distance as f64 / query_len.max(1) as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CountryDataUpdate;
    use crate::seed;

    async fn service() -> (CountryService, Storage) {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        seed::seed_if_empty(&storage).await.unwrap();
        let service = CountryService::new(storage.clone(), Cache::memory(), Duration::from_secs(60));
        (service, storage)
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("germany", "germnay"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("japan", "japan"), 0);
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let (service, storage) = service().await;

        let first = service.get("us").await.unwrap();
        assert!(!first.cached);
        assert_eq!(storage.country_reads(), 1);

        let second = service.get("USA").await.unwrap();
        // Different key form, so this one misses.
        assert!(!second.cached);

        let third = service.get("US").await.unwrap();
        assert!(third.cached);
        assert_eq!(third.data, first.data);
        assert_eq!(storage.country_reads(), 2);
    }

    #[tokio::test]
    async fn test_unknown_country_is_not_found() {
        let (service, _) = service().await;
        let err = service.get("XX").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.to_string(), "Country with code XX not found");
    }

    #[tokio::test]
    async fn test_membership_flags_are_coalesced() {
        let (service, storage) = service().await;
        storage
            .apply_update(&CountryDataUpdate {
                military: Some(Military {
                    tanks: Some(10),
                    ..Default::default()
                }),
                ..CountryDataUpdate::new("JP")
            })
            .await
            .unwrap();

        let view = service.get("JP").await.unwrap().data;
        assert_eq!(view.country, "Japan");
        assert_eq!(view.categories.political.is_un, Some(true));
        assert_eq!(view.categories.political.is_nato, Some(false));
        assert_eq!(view.categories.military.nuclear_weapons, Some(false));
        assert_eq!(view.categories.military.tanks, Some(10));
        assert!(view.categories.crime.crime_categories.is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_exact_matches_first() {
        let (service, _) = service().await;

        let results = service.search("fra").await.unwrap();
        assert_eq!(results[0].code, "FR");

        let results = service.search("Germny").await.unwrap();
        assert_eq!(results.first().map(|c| c.code.as_str()), Some("DE"));

        let results = service.search("Tokyo").await.unwrap();
        assert_eq!(results.first().map(|c| c.code.as_str()), Some("JP"));
    }

    #[tokio::test]
    async fn test_empty_search_is_rejected() {
        let (service, _) = service().await;
        let err = service.search("   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_view_survives_cache_round_trip() {
        let (service, _) = service().await;
        let fresh = service.get("DE").await.unwrap();
        let cached = service.get("DE").await.unwrap();
        assert!(cached.cached);
        assert_eq!(fresh.data, cached.data);
    }
}
