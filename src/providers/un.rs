//! UN World Population Prospects.
//!
//! Population totals by sex, median age and the broad age structure
//! (children, working age, elderly).

use async_trait::async_trait;

use super::{Provider, select};
use crate::model::{CountryDataUpdate, Demographics};

pub struct UnPopulationProvider;

struct PopulationRow {
    code: &'static str,
    population: i64,
    male_population: i64,
    female_population: i64,
    median_age: f64,
    child_percent: f64,
    working_age_percent: f64,
    elderly_percent: f64,
}

impl PopulationRow {
    /// `"49% / 51%"`, male share first.
    fn sex_ratio(&self) -> Option<String> {
        if self.population <= 0 {
            return None;
        }
        let total = self.population as f64;
        Some(format!(
            "{:.0}% / {:.0}%",
            self.male_population as f64 / total * 100.0,
            self.female_population as f64 / total * 100.0
        ))
    }

    fn to_update(&self) -> CountryDataUpdate {
        CountryDataUpdate {
            demographics: Some(Demographics {
                total_population: Some(self.population),
                male_population: Some(self.male_population),
                female_population: Some(self.female_population),
                male_female_ratio: self.sex_ratio(),
                median_age: Some(self.median_age),
                child_population_percent: Some(self.child_percent),
                working_age_percent: Some(self.working_age_percent),
                elderly_percent: Some(self.elderly_percent),
                ..Default::default()
            }),
            ..CountryDataUpdate::new(self.code)
        }
    }
}

#[async_trait]
impl Provider for UnPopulationProvider {
    fn name(&self) -> &'static str {
        "un"
    }

    fn source(&self) -> &'static str {
        "https://population.un.org/dataportalapi/api/v1"
    }

    async fn fetch(&self, codes: Option<&[String]>) -> anyhow::Result<Vec<CountryDataUpdate>> {
        Ok(select(&CATALOG, codes, |row| row.code)
            .into_iter()
            .map(PopulationRow::to_update)
            .collect())
    }
}

// 2024 revision, mid-year estimates.
const CATALOG: [PopulationRow; 10] = [
    PopulationRow {
        code: "USA",
        population: 334914895,
        male_population: 164560000,
        female_population: 170354895,
        median_age: 38.5,
        child_percent: 18.0,
        working_age_percent: 64.8,
        elderly_percent: 17.2,
    },
    PopulationRow {
        code: "DEU",
        population: 84552242,
        male_population: 41432000,
        female_population: 43120242,
        median_age: 45.7,
        child_percent: 13.8,
        working_age_percent: 63.5,
        elderly_percent: 22.7,
    },
    PopulationRow {
        code: "GBR",
        population: 67736802,
        male_population: 33300000,
        female_population: 34436802,
        median_age: 40.6,
        child_percent: 17.6,
        working_age_percent: 63.2,
        elderly_percent: 19.2,
    },
    PopulationRow {
        code: "FRA",
        population: 64756584,
        male_population: 31400000,
        female_population: 33356584,
        median_age: 42.3,
        child_percent: 17.5,
        working_age_percent: 61.3,
        elderly_percent: 21.2,
    },
    PopulationRow {
        code: "JPN",
        population: 123294513,
        male_population: 59960000,
        female_population: 63334513,
        median_age: 48.6,
        child_percent: 11.6,
        working_age_percent: 59.2,
        elderly_percent: 29.2,
    },
    PopulationRow {
        code: "CHN",
        population: 1425178782,
        male_population: 731000000,
        female_population: 694178782,
        median_age: 39.0,
        child_percent: 17.0,
        working_age_percent: 69.0,
        elderly_percent: 14.0,
    },
    PopulationRow {
        code: "IND",
        population: 1428627663,
        male_population: 737000000,
        female_population: 691627663,
        median_age: 28.2,
        child_percent: 25.8,
        working_age_percent: 67.3,
        elderly_percent: 6.9,
    },
    PopulationRow {
        code: "BRA",
        population: 216422446,
        male_population: 106100000,
        female_population: 110322446,
        median_age: 34.3,
        child_percent: 20.0,
        working_age_percent: 69.5,
        elderly_percent: 10.5,
    },
    PopulationRow {
        code: "RUS",
        population: 144444359,
        male_population: 67000000,
        female_population: 77444359,
        median_age: 39.6,
        child_percent: 18.3,
        working_age_percent: 66.0,
        elderly_percent: 15.7,
    },
    PopulationRow {
        code: "AUS",
        population: 26439111,
        male_population: 13100000,
        female_population: 13339111,
        median_age: 37.9,
        child_percent: 18.7,
        working_age_percent: 64.7,
        elderly_percent: 16.6,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sex_ratio_formatting() {
        let codes = vec!["USA".to_string()];
        let updates = UnPopulationProvider.fetch(Some(codes.as_slice())).await.unwrap();

        assert_eq!(updates.len(), 1);
        let demographics = updates[0].demographics.as_ref().unwrap();
        assert_eq!(demographics.male_female_ratio.as_deref(), Some("49% / 51%"));
        assert_eq!(demographics.total_population, Some(334_914_895));
        assert!(demographics.life_expectancy.is_none());
    }

    #[tokio::test]
    async fn test_fetch_all_covers_catalog() {
        let updates = UnPopulationProvider.fetch(None).await.unwrap();
        assert_eq!(updates.len(), CATALOG.len());
        assert!(updates.iter().all(|u| u.economy.is_none()));
    }
}
