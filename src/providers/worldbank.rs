//! World Bank development indicators.
//!
//! The broadest provider: headline demographics, the economy including a
//! yearly GDP per capita series, literacy and public spending on education
//! and health. It runs first, so every later provider can refine its values.

use async_trait::async_trait;
use sqlx::types::Json;

use super::{Provider, select};
use crate::model::{CountryDataUpdate, Demographics, Economy, Education, Health, YearValue};

pub struct WorldBankProvider;

struct IndicatorRow {
    code: &'static str,
    population: i64,
    population_growth_rate: f64,
    life_expectancy: f64,
    birth_rate: f64,
    death_rate: f64,
    fertility_rate: f64,
    infant_mortality_rate: f64,
    urban_population_percent: f64,
    /// Current USD.
    gdp: f64,
    gdp_per_capita: f64,
    gdp_growth_rate: f64,
    inflation: f64,
    unemployment_rate: f64,
    gini_index: f64,
    /// GDP per capita by year, oldest first.
    gdp_history: &'static [(i32, f64)],
    literacy_rate: f64,
    education_spending_percent: f64,
    health_spending_percent: f64,
}

impl IndicatorRow {
    fn to_update(&self) -> CountryDataUpdate {
        let history = self
            .gdp_history
            .iter()
            .map(|&(year, value)| YearValue { year, value })
            .collect();

        CountryDataUpdate {
            demographics: Some(Demographics {
                total_population: Some(self.population),
                population_growth_rate: Some(self.population_growth_rate),
                life_expectancy: Some(self.life_expectancy),
                birth_rate: Some(self.birth_rate),
                death_rate: Some(self.death_rate),
                fertility_rate: Some(self.fertility_rate),
                infant_mortality_rate: Some(self.infant_mortality_rate),
                urban_population_percent: Some(self.urban_population_percent),
                ..Default::default()
            }),
            economy: Some(Economy {
                gdp: Some(self.gdp),
                gdp_per_capita: Some(self.gdp_per_capita),
                gdp_growth_rate: Some(self.gdp_growth_rate),
                gdp_growth_history: Some(Json(history)),
                inflation: Some(self.inflation),
                unemployment_rate: Some(self.unemployment_rate),
                gini_index: Some(self.gini_index),
                ..Default::default()
            }),
            education: Some(Education {
                literacy_rate: Some(self.literacy_rate),
                education_spending_percent: Some(self.education_spending_percent),
                ..Default::default()
            }),
            health: Some(Health {
                healthcare_spending_percent: Some(self.health_spending_percent),
                ..Default::default()
            }),
            ..CountryDataUpdate::new(self.code)
        }
    }
}

#[async_trait]
impl Provider for WorldBankProvider {
    fn name(&self) -> &'static str {
        "worldbank"
    }

    fn source(&self) -> &'static str {
        "https://api.worldbank.org/v2"
    }

    async fn fetch(&self, codes: Option<&[String]>) -> anyhow::Result<Vec<CountryDataUpdate>> {
        Ok(select(&CATALOG, codes, |row| row.code)
            .into_iter()
            .map(IndicatorRow::to_update)
            .collect())
    }
}

const CATALOG: [IndicatorRow; 10] = [
    IndicatorRow {
        code: "USA",
        population: 334914895,
        population_growth_rate: 0.4,
        life_expectancy: 77.5,
        birth_rate: 11.0,
        death_rate: 10.4,
        fertility_rate: 1.64,
        infant_mortality_rate: 5.4,
        urban_population_percent: 83.1,
        gdp: 25462700000000.0,
        gdp_per_capita: 76399.0,
        gdp_growth_rate: 2.5,
        inflation: 3.4,
        unemployment_rate: 3.7,
        gini_index: 41.5,
        gdp_history: &[(2015, 56863.0), (2016, 58021.0), (2017, 60000.0), (2018, 63543.0), (2019, 65298.0), (2020, 63544.0), (2021, 70249.0), (2022, 76399.0), (2023, 77463.0)],
        literacy_rate: 99.0,
        education_spending_percent: 5.0,
        health_spending_percent: 17.8,
    },
    IndicatorRow {
        code: "DEU",
        population: 84552242,
        population_growth_rate: 0.1,
        life_expectancy: 81.1,
        birth_rate: 9.3,
        death_rate: 12.0,
        fertility_rate: 1.54,
        infant_mortality_rate: 3.2,
        urban_population_percent: 77.5,
        gdp: 4082469000000.0,
        gdp_per_capita: 48398.0,
        gdp_growth_rate: 1.8,
        inflation: 5.9,
        unemployment_rate: 3.0,
        gini_index: 31.7,
        gdp_history: &[(2015, 41324.0), (2016, 42456.0), (2017, 44680.0), (2018, 47811.0), (2019, 46473.0), (2020, 46208.0), (2021, 51204.0), (2022, 48398.0), (2023, 51600.0)],
        literacy_rate: 99.0,
        education_spending_percent: 4.9,
        health_spending_percent: 12.8,
    },
    IndicatorRow {
        code: "GBR",
        population: 67736802,
        population_growth_rate: 0.4,
        life_expectancy: 81.3,
        birth_rate: 10.9,
        death_rate: 9.4,
        fertility_rate: 1.63,
        infant_mortality_rate: 3.8,
        urban_population_percent: 84.2,
        gdp: 3131377000000.0,
        gdp_per_capita: 46125.0,
        gdp_growth_rate: 4.1,
        inflation: 7.3,
        unemployment_rate: 4.2,
        gini_index: 35.1,
        gdp_history: &[(2015, 44305.0), (2016, 40412.0), (2017, 40361.0), (2018, 43306.0), (2019, 42747.0), (2020, 40285.0), (2021, 46585.0), (2022, 46125.0), (2023, 48912.0)],
        literacy_rate: 99.0,
        education_spending_percent: 5.5,
        health_spending_percent: 12.0,
    },
    IndicatorRow {
        code: "FRA",
        population: 64756584,
        population_growth_rate: 0.2,
        life_expectancy: 82.8,
        birth_rate: 10.7,
        death_rate: 9.9,
        fertility_rate: 1.84,
        infant_mortality_rate: 3.5,
        urban_population_percent: 81.5,
        gdp: 2782905000000.0,
        gdp_per_capita: 42330.0,
        gdp_growth_rate: 2.5,
        inflation: 5.2,
        unemployment_rate: 7.3,
        gini_index: 32.4,
        gdp_history: &[(2015, 36638.0), (2016, 37037.0), (2017, 38679.0), (2018, 41526.0), (2019, 40380.0), (2020, 38625.0), (2021, 44853.0), (2022, 42330.0), (2023, 44408.0)],
        literacy_rate: 99.0,
        education_spending_percent: 5.5,
        health_spending_percent: 12.2,
    },
    IndicatorRow {
        code: "JPN",
        population: 123294513,
        population_growth_rate: -0.5,
        life_expectancy: 84.5,
        birth_rate: 6.8,
        death_rate: 11.8,
        fertility_rate: 1.21,
        infant_mortality_rate: 1.8,
        urban_population_percent: 91.9,
        gdp: 4231141000000.0,
        gdp_per_capita: 33815.0,
        gdp_growth_rate: 1.1,
        inflation: 3.3,
        unemployment_rate: 2.6,
        gini_index: 32.9,
        gdp_history: &[(2015, 34568.0), (2016, 39304.0), (2017, 38449.0), (2018, 39795.0), (2019, 40113.0), (2020, 39918.0), (2021, 39313.0), (2022, 33815.0), (2023, 35390.0)],
        literacy_rate: 99.0,
        education_spending_percent: 3.6,
        health_spending_percent: 11.1,
    },
    IndicatorRow {
        code: "CHN",
        population: 1425178782,
        population_growth_rate: 0.1,
        life_expectancy: 78.2,
        birth_rate: 7.5,
        death_rate: 7.4,
        fertility_rate: 1.16,
        infant_mortality_rate: 5.5,
        urban_population_percent: 64.7,
        gdp: 17963171000000.0,
        gdp_per_capita: 12720.0,
        gdp_growth_rate: 5.2,
        inflation: 0.2,
        unemployment_rate: 5.2,
        gini_index: 38.2,
        gdp_history: &[(2015, 8034.0), (2016, 8117.0), (2017, 8827.0), (2018, 9905.0), (2019, 10217.0), (2020, 10434.0), (2021, 12556.0), (2022, 12720.0), (2023, 12850.0)],
        literacy_rate: 97.3,
        education_spending_percent: 4.1,
        health_spending_percent: 5.4,
    },
    IndicatorRow {
        code: "IND",
        population: 1428627663,
        population_growth_rate: 0.8,
        life_expectancy: 70.2,
        birth_rate: 17.4,
        death_rate: 7.3,
        fertility_rate: 2.0,
        infant_mortality_rate: 27.7,
        urban_population_percent: 35.9,
        gdp: 3385090000000.0,
        gdp_per_capita: 2389.0,
        gdp_growth_rate: 6.3,
        inflation: 5.4,
        unemployment_rate: 7.8,
        gini_index: 35.7,
        gdp_history: &[(2015, 1606.0), (2016, 1733.0), (2017, 1982.0), (2018, 1998.0), (2019, 2100.0), (2020, 1901.0), (2021, 2257.0), (2022, 2389.0), (2023, 2612.0)],
        literacy_rate: 74.4,
        education_spending_percent: 4.1,
        health_spending_percent: 3.5,
    },
    IndicatorRow {
        code: "BRA",
        population: 216422446,
        population_growth_rate: 0.5,
        life_expectancy: 76.1,
        birth_rate: 13.4,
        death_rate: 7.0,
        fertility_rate: 1.64,
        infant_mortality_rate: 13.5,
        urban_population_percent: 87.6,
        gdp: 1920096000000.0,
        gdp_per_capita: 8857.0,
        gdp_growth_rate: 2.9,
        inflation: 4.6,
        unemployment_rate: 7.8,
        gini_index: 52.9,
        gdp_history: &[(2015, 8754.0), (2016, 8710.0), (2017, 9882.0), (2018, 9001.0), (2019, 8717.0), (2020, 6797.0), (2021, 7519.0), (2022, 8857.0), (2023, 9673.0)],
        literacy_rate: 93.2,
        education_spending_percent: 6.0,
        health_spending_percent: 9.6,
    },
    IndicatorRow {
        code: "RUS",
        population: 144444359,
        population_growth_rate: -0.2,
        life_expectancy: 73.1,
        birth_rate: 9.5,
        death_rate: 14.2,
        fertility_rate: 1.5,
        infant_mortality_rate: 4.8,
        urban_population_percent: 74.8,
        gdp: 2240422000000.0,
        gdp_per_capita: 15345.0,
        gdp_growth_rate: 3.6,
        inflation: 7.4,
        unemployment_rate: 2.9,
        gini_index: 36.0,
        gdp_history: &[(2015, 9057.0), (2016, 8705.0), (2017, 10751.0), (2018, 11287.0), (2019, 11585.0), (2020, 10127.0), (2021, 12173.0), (2022, 15345.0), (2023, 12195.0)],
        literacy_rate: 99.7,
        education_spending_percent: 4.7,
        health_spending_percent: 5.3,
    },
    IndicatorRow {
        code: "AUS",
        population: 26439111,
        population_growth_rate: 1.1,
        life_expectancy: 83.3,
        birth_rate: 12.0,
        death_rate: 6.8,
        fertility_rate: 1.58,
        infant_mortality_rate: 3.1,
        urban_population_percent: 86.5,
        gdp: 1675418000000.0,
        gdp_per_capita: 64491.0,
        gdp_growth_rate: 3.7,
        inflation: 5.6,
        unemployment_rate: 3.7,
        gini_index: 34.3,
        gdp_history: &[(2015, 51352.0), (2016, 49972.0), (2017, 53825.0), (2018, 56352.0), (2019, 54907.0), (2020, 51812.0), (2021, 60443.0), (2022, 64491.0), (2023, 59408.0)],
        literacy_rate: 99.0,
        education_spending_percent: 6.1,
        health_spending_percent: 10.7,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_all() {
        let updates = WorldBankProvider.fetch(None).await.unwrap();
        assert_eq!(updates.len(), CATALOG.len());
        assert!(updates.iter().all(|u| u.demographics.is_some() && u.economy.is_some()));
    }

    #[tokio::test]
    async fn test_history_is_chronological() {
        let codes = vec!["USA".to_string()];
        let updates = WorldBankProvider.fetch(Some(codes.as_slice())).await.unwrap();

        let economy = updates[0].economy.as_ref().unwrap();
        let history = &economy.gdp_growth_history.as_ref().unwrap().0;
        assert!(history.windows(2).all(|w| w[0].year < w[1].year));
        assert_eq!(history.first().map(|p| p.year), Some(2015));
        assert_eq!(
            updates[0].health.as_ref().unwrap().healthcare_spending_percent,
            Some(17.8)
        );
    }
}
