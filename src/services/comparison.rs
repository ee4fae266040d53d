//! Side-by-side country comparison.
//!
//! Each metric carries a [`Polarity`]. Numeric metrics with a polarity get
//! a winner; metrics without one, and boolean metrics, never do. The
//! summary scores one point per metric won.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::country::{CountryService, CountryView};
use super::{Lookup, cache_aside, normalize_code};
use crate::cache::Cache;
use crate::error::ApiResult;

/// GDP per capita gap (USD) worth a highlight.
const GDP_PER_CAPITA_HIGHLIGHT_GAP: f64 = 5_000.0;
/// Safety index gap (points) worth a highlight.
const SAFETY_HIGHLIGHT_GAP: f64 = 10.0;

/// Which direction of a metric is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Country1,
    Country2,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Flag(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonMetric {
    pub metric: String,
    pub country1_value: Option<MetricValue>,
    pub country2_value: Option<MetricValue>,
    pub difference: Option<f64>,
    pub percent_difference: Option<f64>,
    pub winner: Option<Winner>,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparedCountry {
    pub name: String,
    pub code: String,
    pub flag_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonCategories {
    pub demographics: Vec<ComparisonMetric>,
    pub economy: Vec<ComparisonMetric>,
    pub military: Vec<ComparisonMetric>,
    pub political: Vec<ComparisonMetric>,
    pub crime: Vec<ComparisonMetric>,
    pub health: Vec<ComparisonMetric>,
}

impl ComparisonCategories {
    fn all(&self) -> impl Iterator<Item = &ComparisonMetric> {
        self.demographics
            .iter()
            .chain(&self.economy)
            .chain(&self.military)
            .chain(&self.political)
            .chain(&self.crime)
            .chain(&self.health)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub country1: u32,
    pub country2: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    /// Name of the country with more metric wins; `None` on a tie.
    pub winner: Option<String>,
    pub scores: Scores,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub country1: ComparedCountry,
    pub country2: ComparedCountry,
    pub categories: ComparisonCategories,
    pub summary: ComparisonSummary,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ComparisonService {
    countries: CountryService,
    cache: Cache,
    ttl: Duration,
}

impl ComparisonService {
    pub fn new(countries: CountryService, cache: Cache, ttl: Duration) -> Self {
        Self {
            countries,
            cache,
            ttl,
        }
    }

    /// Compare two countries by alpha-2 or alpha-3 code.
    ///
    /// Fails with `NotFound` when either country is unknown.
    pub async fn compare(&self, code1: &str, code2: &str) -> ApiResult<Lookup<Comparison>> {
        let (c1, c2) = (normalize_code(code1), normalize_code(code2));
        let key = format!("comparison:{c1}:{c2}");

        cache_aside(&self.cache, &key, self.ttl, || async {
            let (first, second) = tokio::try_join!(self.countries.get(&c1), self.countries.get(&c2))?;
            let comparison = build_comparison(&first.data, &second.data);
            debug!(
                c1 = %c1,
                c2 = %c2,
                score1 = comparison.summary.scores.country1,
                score2 = comparison.summary.scores.country2,
                "Comparison computed"
            );
            Ok(comparison)
        })
        .await
    }
}

/// Difference, percent difference and winner for one numeric metric.
///
/// The percent difference is relative to `v2` and absent when `v2` is zero.
/// Equal values have no winner.
pub fn compare_values(
    v1: Option<f64>,
    v2: Option<f64>,
    polarity: Polarity,
) -> (Option<f64>, Option<f64>, Option<Winner>) {
    let (Some(v1), Some(v2)) = (v1, v2) else {
        return (None, None, None);
    };

    let difference = v1 - v2;
    let percent = (v2 != 0.0).then(|| difference / v2.abs() * 100.0);
    let winner = match polarity {
        Polarity::HigherIsBetter if v1 > v2 => Some(Winner::Country1),
        Polarity::HigherIsBetter if v2 > v1 => Some(Winner::Country2),
        Polarity::LowerIsBetter if v1 < v2 => Some(Winner::Country1),
        Polarity::LowerIsBetter if v2 < v1 => Some(Winner::Country2),
        _ => None,
    };
    (Some(difference), percent, winner)
}

fn numeric(metric: &str, v1: Option<f64>, v2: Option<f64>, unit: &str, polarity: Polarity) -> ComparisonMetric {
    let (difference, percent_difference, winner) = compare_values(v1, v2, polarity);
    ComparisonMetric {
        metric: metric.to_string(),
        country1_value: v1.map(MetricValue::Number),
        country2_value: v2.map(MetricValue::Number),
        difference,
        percent_difference,
        winner,
        unit: unit.to_string(),
    }
}

fn count(metric: &str, v1: Option<i64>, v2: Option<i64>, unit: &str, polarity: Polarity) -> ComparisonMetric {
    numeric(metric, v1.map(|v| v as f64), v2.map(|v| v as f64), unit, polarity)
}

fn flag(metric: &str, v1: Option<bool>, v2: Option<bool>) -> ComparisonMetric {
    ComparisonMetric {
        metric: metric.to_string(),
        country1_value: Some(MetricValue::Flag(v1.unwrap_or(false))),
        country2_value: Some(MetricValue::Flag(v2.unwrap_or(false))),
        difference: None,
        percent_difference: None,
        winner: None,
        unit: String::new(),
    }
}

/// Build the full comparison of two country views.
pub fn build_comparison(a: &CountryView, b: &CountryView) -> Comparison {
    use Polarity::{HigherIsBetter as Higher, LowerIsBetter as Lower, Neutral};

    let (da, db) = (&a.categories.demographics, &b.categories.demographics);
    let (ea, eb) = (&a.categories.economy, &b.categories.economy);
    let (ma, mb) = (&a.categories.military, &b.categories.military);
    let (pa, pb) = (&a.categories.political, &b.categories.political);
    let (ca, cb) = (&a.categories.crime.stats, &b.categories.crime.stats);
    let (ha, hb) = (&a.categories.health, &b.categories.health);

    let categories = ComparisonCategories {
        demographics: vec![
            count("Population", da.total_population, db.total_population, "people", Higher),
            numeric("Life Expectancy", da.life_expectancy, db.life_expectancy, "years", Higher),
            numeric("Median Age", da.median_age, db.median_age, "years", Neutral),
            numeric("Birth Rate", da.birth_rate, db.birth_rate, "per 1000", Neutral),
            numeric(
                "Urban Population",
                da.urban_population_percent,
                db.urban_population_percent,
                "%",
                Neutral,
            ),
            numeric("Average IQ", da.average_iq, db.average_iq, "points", Higher),
        ],
        economy: vec![
            numeric("GDP", ea.gdp, eb.gdp, "USD", Higher),
            numeric("GDP Per Capita", ea.gdp_per_capita, eb.gdp_per_capita, "USD", Higher),
            numeric("GDP Growth", ea.gdp_growth_rate, eb.gdp_growth_rate, "%", Higher),
            numeric("Unemployment Rate", ea.unemployment_rate, eb.unemployment_rate, "%", Lower),
            numeric("Inflation", ea.inflation, eb.inflation, "%", Lower),
            numeric("Average Income", ea.average_income, eb.average_income, "USD/year", Higher),
            numeric("Public Debt", ea.public_debt, eb.public_debt, "% of GDP", Lower),
        ],
        military: vec![
            count("Global Rank", ma.global_rank, mb.global_rank, "", Lower),
            count("Active Soldiers", ma.active_soldiers, mb.active_soldiers, "personnel", Higher),
            numeric("Defense Spending", ma.defense_spending, mb.defense_spending, "USD", Higher),
            count("Tanks", ma.tanks, mb.tanks, "units", Higher),
            count("Aircraft", ma.total_aircraft, mb.total_aircraft, "units", Higher),
            count("Naval Vessels", ma.naval_vessels, mb.naval_vessels, "ships", Higher),
            flag("Nuclear Weapons", ma.nuclear_weapons, mb.nuclear_weapons),
            flag("NATO Member", ma.is_nato_member, mb.is_nato_member),
        ],
        political: vec![
            count("Passport Ranking", pa.passport_ranking, pb.passport_ranking, "", Lower),
            count(
                "Visa-Free Access",
                pa.passport_visa_free,
                pb.passport_visa_free,
                "countries",
                Higher,
            ),
            numeric("Democracy Index", pa.democracy_index, pb.democracy_index, "", Higher),
            numeric("Corruption Index", pa.corruption_index, pb.corruption_index, "", Higher),
            numeric("HDI", pa.human_development_index, pb.human_development_index, "", Higher),
            flag("EU Member", pa.is_eu, pb.is_eu),
            flag("G7 Member", pa.is_g7, pb.is_g7),
            flag("G20 Member", pa.is_g20, pb.is_g20),
        ],
        crime: vec![
            numeric("Crime Index", ca.crime_index, cb.crime_index, "", Lower),
            numeric("Safety Index", ca.safety_index, cb.safety_index, "", Higher),
            numeric("Total Crime Rate", ca.total_crime_rate, cb.total_crime_rate, "per 100k", Lower),
            numeric("Homicide Rate", ca.homicide_rate, cb.homicide_rate, "per 100k", Lower),
        ],
        health: vec![
            numeric("Smoking Rate", ha.smoking_rate, hb.smoking_rate, "%", Lower),
            numeric(
                "Alcohol Dependency",
                ha.alcohol_dependency_rate,
                hb.alcohol_dependency_rate,
                "%",
                Lower,
            ),
            numeric("Drug Use", ha.drug_use_rate, hb.drug_use_rate, "%", Lower),
            numeric("Obesity Rate", ha.obesity_rate, hb.obesity_rate, "%", Lower),
            numeric(
                "Healthcare Spending",
                ha.healthcare_spending_percent,
                hb.healthcare_spending_percent,
                "% of GDP",
                Neutral,
            ),
            numeric(
                "Hospital Beds",
                ha.hospital_beds_per_1000,
                hb.hospital_beds_per_1000,
                "per 1000",
                Higher,
            ),
            numeric(
                "Physicians",
                ha.physicians_per_1000,
                hb.physicians_per_1000,
                "per 1000",
                Higher,
            ),
        ],
    };

    let summary = summarize(&categories, a, b);

    Comparison {
        country1: compared(a),
        country2: compared(b),
        categories,
        summary,
        timestamp: Utc::now(),
    }
}

fn compared(view: &CountryView) -> ComparedCountry {
    ComparedCountry {
        name: view.country.clone(),
        code: view.code.clone(),
        flag_url: view.flag_url.clone(),
    }
}

fn summarize(categories: &ComparisonCategories, a: &CountryView, b: &CountryView) -> ComparisonSummary {
    let mut scores = Scores {
        country1: 0,
        country2: 0,
    };
    for metric in categories.all() {
        match metric.winner {
            Some(Winner::Country1) => scores.country1 += 1,
            Some(Winner::Country2) => scores.country2 += 1,
            None => {}
        }
    }

    let mut highlights = Vec::new();

    let gdp_gap = a.categories.economy.gdp_per_capita.unwrap_or(0.0)
        - b.categories.economy.gdp_per_capita.unwrap_or(0.0);
    if gdp_gap.abs() > GDP_PER_CAPITA_HIGHLIGHT_GAP {
        let richer = if gdp_gap > 0.0 { &a.country } else { &b.country };
        highlights.push(format!("{richer} has significantly higher GDP per capita"));
    }

    if let (Some(r1), Some(r2)) = (
        a.categories.military.global_rank,
        b.categories.military.global_rank,
    ) {
        let stronger = if r1 < r2 { &a.country } else { &b.country };
        highlights.push(format!("{stronger} has a higher military ranking"));
    }

    let safety_gap = a.categories.crime.stats.safety_index.unwrap_or(0.0)
        - b.categories.crime.stats.safety_index.unwrap_or(0.0);
    if safety_gap.abs() > SAFETY_HIGHLIGHT_GAP {
        let safer = if safety_gap > 0.0 { &a.country } else { &b.country };
        highlights.push(format!("{safer} is considered safer based on crime statistics"));
    }

    let winner = match scores.country1.cmp(&scores.country2) {
        std::cmp::Ordering::Greater => Some(a.country.clone()),
        std::cmp::Ordering::Less => Some(b.country.clone()),
        std::cmp::Ordering::Equal => None,
    };

    ComparisonSummary {
        winner,
        scores,
        highlights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::model::CountryDataUpdate;
    use crate::seed;
    use crate::storage::Storage;

    #[test]
    fn test_winner_follows_polarity() {
        let lower = compare_values(Some(10.0), Some(20.0), Polarity::LowerIsBetter);
        assert_eq!(lower.2, Some(Winner::Country1));

        let higher = compare_values(Some(10.0), Some(20.0), Polarity::HigherIsBetter);
        assert_eq!(higher.2, Some(Winner::Country2));

        let neutral = compare_values(Some(10.0), Some(20.0), Polarity::Neutral);
        assert_eq!(neutral.2, None);
        assert_eq!(neutral.0, Some(-10.0));
        assert_eq!(neutral.1, Some(-50.0));
    }

    #[test]
    fn test_missing_or_equal_values_have_no_winner() {
        assert_eq!(
            compare_values(None, Some(1.0), Polarity::HigherIsBetter),
            (None, None, None)
        );
        let tie = compare_values(Some(3.0), Some(3.0), Polarity::LowerIsBetter);
        assert_eq!(tie.2, None);

        let zero_base = compare_values(Some(3.0), Some(0.0), Polarity::HigherIsBetter);
        assert_eq!(zero_base.1, None);
        assert_eq!(zero_base.2, Some(Winner::Country1));
    }

    #[test]
    fn test_flags_never_win() {
        let metric = flag("NATO Member", Some(true), None);
        assert_eq!(metric.winner, None);
        assert_eq!(metric.country2_value, Some(MetricValue::Flag(false)));
    }

    async fn service() -> (ComparisonService, Storage) {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        seed::seed_if_empty(&storage).await.unwrap();
        let cache = Cache::memory();
        let countries = CountryService::new(storage.clone(), cache.clone(), Duration::from_secs(60));
        (
            ComparisonService::new(countries, cache, Duration::from_secs(60)),
            storage,
        )
    }

    #[tokio::test]
    async fn test_highlights_and_score() {
        let (service, storage) = service().await;
        for (code, gdp_per_capita, rank, safety) in [("US", 76_000.0, 1, 50.0), ("DE", 48_000.0, 9, 64.0)] {
            storage
                .apply_update(&CountryDataUpdate {
                    economy: Some(crate::model::Economy {
                        gdp_per_capita: Some(gdp_per_capita),
                        ..Default::default()
                    }),
                    military: Some(crate::model::Military {
                        global_rank: Some(rank),
                        ..Default::default()
                    }),
                    crime: Some(crate::model::Crime {
                        safety_index: Some(safety),
                        ..Default::default()
                    }),
                    ..CountryDataUpdate::new(code)
                })
                .await
                .unwrap();
        }

        let comparison = service.compare("us", "de").await.unwrap().data;
        assert_eq!(comparison.country1.code, "US");
        assert_eq!(
            comparison.summary.highlights,
            vec![
                "United States has significantly higher GDP per capita".to_string(),
                "United States has a higher military ranking".to_string(),
                "Germany is considered safer based on crime statistics".to_string(),
            ]
        );

        let won: u32 = comparison
            .categories
            .all()
            .filter(|m| m.winner.is_some())
            .count() as u32;
        assert_eq!(comparison.summary.scores.country1 + comparison.summary.scores.country2, won);
    }

    #[tokio::test]
    async fn test_comparison_is_cached_by_ordered_pair() {
        let (service, _) = service().await;
        assert!(!service.compare("FR", "JP").await.unwrap().cached);
        assert!(service.compare("fr", "jp").await.unwrap().cached);
        assert!(!service.compare("JP", "FR").await.unwrap().cached);
    }

    #[tokio::test]
    async fn test_unknown_country_fails() {
        let (service, _) = service().await;
        let err = service.compare("FR", "QQ").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
