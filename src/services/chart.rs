//! Chart-ready bundles for the country panel.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Lookup, cache_aside, normalize_code};
use crate::cache::Cache;
use crate::error::{ApiResult, AppError};
use crate::model::CountryRecord;
use crate::storage::Storage;

const NEON_BLUE: &str = "#00f0ff";
const NEON_PINK: &str = "#ff00ff";
const NEON_GREEN: &str = "#00ff88";
const NEON_YELLOW: &str = "#ffff00";
const NEON_ORANGE: &str = "#ff8800";
const NEON_PURPLE: &str = "#8800ff";
const NEON_RED: &str = "#ff0055";
const NEON_CYAN: &str = "#00ffff";

/// Radar axes are percentages of these reference maxima, capped at 100.
const RADAR_MAX_TANKS: f64 = 15_000.0;
const RADAR_MAX_AIRCRAFT: f64 = 5_000.0;
const RADAR_MAX_NAVAL: f64 = 800.0;
const RADAR_MAX_PERSONNEL: f64 = 3_000_000.0;
const RADAR_MAX_SPENDING: f64 = 900_000_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBundle {
    pub gdp_line_chart: LineChart,
    pub crime_donut_chart: DonutChart,
    pub health_bar_chart: BarChart,
    pub population_donut_chart: DonutChart,
    pub military_radar_chart: LineChart,
    pub economic_indicators_chart: IndicatorChart,
}

/// Line and radar charts share a shape: labelled axes and stroked datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChart {
    pub title: String,
    pub labels: Vec<String>,
    pub datasets: Vec<StrokedDataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokedDataset {
    pub label: String,
    pub data: Vec<f64>,
    pub border_color: String,
    pub background_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonutChart {
    pub title: String,
    pub labels: Vec<String>,
    pub data: Vec<f64>,
    pub colors: Vec<String>,
    /// Headline figure shown in the middle of the donut.
    pub total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarChart {
    pub title: String,
    pub labels: Vec<String>,
    pub datasets: Vec<FilledDataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilledDataset {
    pub label: String,
    pub data: Vec<f64>,
    pub background_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorChart {
    pub title: String,
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicator {
    pub name: String,
    pub value: Option<f64>,
    pub unit: String,
    pub color: String,
}

#[derive(Clone)]
pub struct ChartService {
    storage: Storage,
    cache: Cache,
    ttl: Duration,
}

impl ChartService {
    pub fn new(storage: Storage, cache: Cache, ttl: Duration) -> Self {
        Self {
            storage,
            cache,
            ttl,
        }
    }

    pub async fn charts(&self, code: &str) -> ApiResult<Lookup<ChartBundle>> {
        let code = normalize_code(code);
        let key = format!("country:{code}:charts");

        cache_aside(&self.cache, &key, self.ttl, || async {
            self.storage
                .load_country(&code)
                .await?
                .map(|record| build_charts(&record))
                .ok_or_else(|| AppError::not_found(format!("Country with code {code}")))
        })
        .await
    }
}

/// Build every chart for one country. Missing values chart as zero, apart
/// from the economic indicators which keep `null`.
pub fn build_charts(record: &CountryRecord) -> ChartBundle {
    let name = &record.country.identity.name;
    let economy = record.economy.clone().unwrap_or_default();
    let health = record.health.clone().unwrap_or_default();
    let military = record.military.clone().unwrap_or_default();
    let demographics = record.demographics.clone().unwrap_or_default();

    let history = economy
        .gdp_growth_history
        .as_ref()
        .map(|h| h.0.clone())
        .unwrap_or_default();
    let gdp_line_chart = LineChart {
        title: format!("GDP Per Capita Trend - {name}"),
        labels: history.iter().map(|p| p.year.to_string()).collect(),
        datasets: vec![StrokedDataset {
            label: "GDP Per Capita (USD)".into(),
            data: history.iter().map(|p| p.value).collect(),
            border_color: NEON_BLUE.into(),
            background_color: format!("{NEON_BLUE}33"),
        }],
    };

    let crime_donut_chart = DonutChart {
        title: format!("Crime Distribution - {name}"),
        labels: record.crime_categories.iter().map(|c| c.category.clone()).collect(),
        data: record.crime_categories.iter().map(|c| c.percentage).collect(),
        colors: strings(&[NEON_RED, NEON_ORANGE, NEON_YELLOW, NEON_PURPLE, NEON_CYAN]),
        total: record.crime.as_ref().and_then(|c| c.total_crime_rate),
    };

    let health_bar_chart = BarChart {
        title: format!("Health Indicators - {name}"),
        labels: strings(&["Smoking Rate", "Alcohol Dependency", "Drug Use", "Obesity Rate"]),
        datasets: vec![FilledDataset {
            label: "Percentage of Population".into(),
            data: [
                health.smoking_rate,
                health.alcohol_dependency_rate,
                health.drug_use_rate,
                health.obesity_rate,
            ]
            .iter()
            .map(|v| v.unwrap_or(0.0))
            .collect(),
            background_color: NEON_PINK.into(),
        }],
    };

    let male = demographics.male_population.unwrap_or(0) as f64;
    let female = demographics.female_population.unwrap_or(0) as f64;
    let population_split = if male + female > 0.0 {
        vec![male / (male + female) * 100.0, female / (male + female) * 100.0]
    } else {
        vec![50.0, 50.0]
    };
    let population_donut_chart = DonutChart {
        title: format!("Population Distribution - {name}"),
        labels: strings(&["Male", "Female"]),
        data: population_split,
        colors: strings(&[NEON_BLUE, NEON_PINK]),
        total: demographics.total_population.map(|p| p as f64),
    };

    let military_radar_chart = LineChart {
        title: format!("Military Capabilities - {name}"),
        labels: strings(&["Tanks", "Aircraft", "Naval Vessels", "Personnel", "Defense Budget"]),
        datasets: vec![StrokedDataset {
            label: name.clone(),
            data: vec![
                radar_axis(military.tanks.map(|v| v as f64), RADAR_MAX_TANKS),
                radar_axis(military.total_aircraft.map(|v| v as f64), RADAR_MAX_AIRCRAFT),
                radar_axis(military.naval_vessels.map(|v| v as f64), RADAR_MAX_NAVAL),
                radar_axis(
                    military.total_military_personnel.map(|v| v as f64),
                    RADAR_MAX_PERSONNEL,
                ),
                radar_axis(military.defense_spending, RADAR_MAX_SPENDING),
            ],
            border_color: NEON_GREEN.into(),
            background_color: format!("{NEON_GREEN}44"),
        }],
    };

    let economic_indicators_chart = IndicatorChart {
        title: format!("Economic Indicators - {name}"),
        indicators: vec![
            indicator("GDP", economy.gdp, "USD", NEON_GREEN),
            indicator("GDP Per Capita", economy.gdp_per_capita, "USD", NEON_BLUE),
            indicator("GDP Growth", economy.gdp_growth_rate, "%", NEON_CYAN),
            indicator("Inflation", economy.inflation, "%", NEON_ORANGE),
            indicator("Unemployment", economy.unemployment_rate, "%", NEON_RED),
            indicator("Public Debt", economy.public_debt, "% of GDP", NEON_PURPLE),
        ],
    };

    ChartBundle {
        gdp_line_chart,
        crime_donut_chart,
        health_bar_chart,
        population_donut_chart,
        military_radar_chart,
        economic_indicators_chart,
    }
}

fn radar_axis(value: Option<f64>, max: f64) -> f64 {
    (value.unwrap_or(0.0) / max * 100.0).min(100.0)
}

fn indicator(name: &str, value: Option<f64>, unit: &str, color: &str) -> Indicator {
    Indicator {
        name: name.into(),
        value,
        unit: unit.into(),
        color: color.into(),
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Country, Demographics, Military, NewCountry};

    fn record(name: &str) -> CountryRecord {
        CountryRecord {
            country: Country {
                id: 1,
                identity: NewCountry {
                    code: "XX".into(),
                    code3: "XXX".into(),
                    name: name.into(),
                    official_name: None,
                    region: None,
                    subregion: None,
                    capital: None,
                    population: None,
                    area: None,
                    flag_url: None,
                    latitude: None,
                    longitude: None,
                },
            },
            demographics: None,
            economy: None,
            military: None,
            politics: None,
            crime: None,
            crime_categories: Vec::new(),
            health: None,
            education: None,
        }
    }

    #[test]
    fn test_empty_record_charts_with_defaults() {
        let charts = build_charts(&record("Nowhere"));

        assert_eq!(charts.population_donut_chart.data, vec![50.0, 50.0]);
        assert_eq!(charts.health_bar_chart.datasets[0].data, vec![0.0; 4]);
        assert!(charts.gdp_line_chart.labels.is_empty());
        assert!(charts.economic_indicators_chart.indicators.iter().all(|i| i.value.is_none()));
        assert_eq!(charts.military_radar_chart.title, "Military Capabilities - Nowhere");
    }

    #[test]
    fn test_radar_is_capped_at_100() {
        let mut record = record("Big");
        record.military = Some(Military {
            tanks: Some(30_000),
            naval_vessels: Some(400),
            defense_spending: Some(2.0e12),
            ..Default::default()
        });

        let radar = &build_charts(&record).military_radar_chart.datasets[0].data;
        assert_eq!(radar[0], 100.0);
        assert_eq!(radar[2], 50.0);
        assert_eq!(radar[4], 100.0);
    }

    #[test]
    fn test_population_split() {
        let mut record = record("Split");
        record.demographics = Some(Demographics {
            male_population: Some(60),
            female_population: Some(40),
            total_population: Some(100),
            ..Default::default()
        });

        let donut = build_charts(&record).population_donut_chart;
        assert_eq!(donut.data, vec![60.0, 40.0]);
        assert_eq!(donut.total, Some(100.0));
    }

    #[tokio::test]
    async fn test_charts_are_cached_per_country() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        crate::seed::seed_if_empty(&storage).await.unwrap();
        let service = ChartService::new(storage, Cache::memory(), Duration::from_secs(60));

        assert!(!service.charts("de").await.unwrap().cached);
        assert!(service.charts("DE").await.unwrap().cached);
        assert!(matches!(
            service.charts("ZZ").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
