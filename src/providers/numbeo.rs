//! Numbeo crime indices.
//!
//! Crime and safety indices, per-100k offence rates, qualitative risk
//! levels and a percentage breakdown by crime category.

use async_trait::async_trait;

use super::{Provider, select};
use crate::model::{CountryDataUpdate, Crime, CrimeCategoryShare};

pub struct NumbeoCrimeProvider;

struct CrimeRow {
    code: &'static str,
    crime_index: f64,
    safety_index: f64,
    total_crime_rate: f64,
    homicide_rate: f64,
    assault_rate: f64,
    robbery_rate: f64,
    burglary_rate: f64,
    vehicle_theft_rate: f64,
    kidnapping_rate: f64,
    human_trafficking_risk: &'static str,
    drug_trafficking_risk: &'static str,
    terrorism_risk: &'static str,
    /// `(category, percent of recorded crime)`, summing to 100.
    categories: &'static [(&'static str, f64)],
}

impl CrimeRow {
    fn to_update(&self) -> CountryDataUpdate {
        CountryDataUpdate {
            crime: Some(Crime {
                crime_index: Some(self.crime_index),
                safety_index: Some(self.safety_index),
                total_crime_rate: Some(self.total_crime_rate),
                homicide_rate: Some(self.homicide_rate),
                assault_rate: Some(self.assault_rate),
                robbery_rate: Some(self.robbery_rate),
                burglary_rate: Some(self.burglary_rate),
                vehicle_theft_rate: Some(self.vehicle_theft_rate),
                kidnapping_rate: Some(self.kidnapping_rate),
                human_trafficking_risk: Some(self.human_trafficking_risk.to_string()),
                drug_trafficking_risk: Some(self.drug_trafficking_risk.to_string()),
                terrorism_risk: Some(self.terrorism_risk.to_string()),
            }),
            crime_categories: Some(
                self.categories
                    .iter()
                    .map(|(category, percentage)| CrimeCategoryShare::new(category, *percentage))
                    .collect(),
            ),
            ..CountryDataUpdate::new(self.code)
        }
    }
}

#[async_trait]
impl Provider for NumbeoCrimeProvider {
    fn name(&self) -> &'static str {
        "numbeo"
    }

    fn source(&self) -> &'static str {
        "https://www.numbeo.com/crime"
    }

    async fn fetch(&self, codes: Option<&[String]>) -> anyhow::Result<Vec<CountryDataUpdate>> {
        Ok(select(&CATALOG, codes, |row| row.code)
            .into_iter()
            .map(CrimeRow::to_update)
            .collect())
    }
}

const CATALOG: [CrimeRow; 10] = [
    CrimeRow {
        code: "USA",
        crime_index: 49.2,
        safety_index: 50.8,
        total_crime_rate: 47.7,
        homicide_rate: 6.3,
        assault_rate: 246.8,
        robbery_rate: 73.9,
        burglary_rate: 314.2,
        vehicle_theft_rate: 246.0,
        kidnapping_rate: 4.8,
        human_trafficking_risk: "Medium",
        drug_trafficking_risk: "High",
        terrorism_risk: "Medium",
        categories: &[("Property Crime", 38.0), ("Violent Crime", 23.0), ("Drug Offenses", 18.0), ("Fraud", 12.0), ("Cyber Crime", 9.0)],
    },
    CrimeRow {
        code: "DEU",
        crime_index: 35.8,
        safety_index: 64.2,
        total_crime_rate: 41.2,
        homicide_rate: 0.8,
        assault_rate: 56.9,
        robbery_rate: 45.3,
        burglary_rate: 75.1,
        vehicle_theft_rate: 28.5,
        kidnapping_rate: 0.6,
        human_trafficking_risk: "Medium",
        drug_trafficking_risk: "Medium",
        terrorism_risk: "Low",
        categories: &[("Theft", 45.0), ("Violent Crime", 18.0), ("Fraud", 20.0), ("Cyber Crime", 12.0), ("Drug Offenses", 5.0)],
    },
    CrimeRow {
        code: "GBR",
        crime_index: 46.1,
        safety_index: 53.9,
        total_crime_rate: 44.8,
        homicide_rate: 1.2,
        assault_rate: 88.4,
        robbery_rate: 134.5,
        burglary_rate: 213.5,
        vehicle_theft_rate: 94.7,
        kidnapping_rate: 2.1,
        human_trafficking_risk: "Medium",
        drug_trafficking_risk: "High",
        terrorism_risk: "Medium",
        categories: &[("Theft", 42.0), ("Violent Crime", 28.0), ("Fraud", 15.0), ("Drug Offenses", 10.0), ("Cyber Crime", 5.0)],
    },
    CrimeRow {
        code: "FRA",
        crime_index: 51.9,
        safety_index: 48.1,
        total_crime_rate: 48.2,
        homicide_rate: 1.3,
        assault_rate: 65.4,
        robbery_rate: 152.3,
        burglary_rate: 267.8,
        vehicle_theft_rate: 165.4,
        kidnapping_rate: 3.2,
        human_trafficking_risk: "Medium",
        drug_trafficking_risk: "Medium",
        terrorism_risk: "Medium",
        categories: &[("Property Crime", 48.0), ("Violent Crime", 22.0), ("Fraud", 14.0), ("Drug Offenses", 11.0), ("Cyber Crime", 5.0)],
    },
    CrimeRow {
        code: "JPN",
        crime_index: 21.6,
        safety_index: 78.4,
        total_crime_rate: 15.2,
        homicide_rate: 0.3,
        assault_rate: 21.3,
        robbery_rate: 1.8,
        burglary_rate: 55.4,
        vehicle_theft_rate: 18.9,
        kidnapping_rate: 0.2,
        human_trafficking_risk: "Low",
        drug_trafficking_risk: "Low",
        terrorism_risk: "Low",
        categories: &[("Theft", 55.0), ("Fraud", 22.0), ("Violent Crime", 8.0), ("Cyber Crime", 12.0), ("Drug Offenses", 3.0)],
    },
    CrimeRow {
        code: "CHN",
        crime_index: 30.4,
        safety_index: 69.6,
        total_crime_rate: 25.8,
        homicide_rate: 0.5,
        assault_rate: 24.6,
        robbery_rate: 8.4,
        burglary_rate: 42.1,
        vehicle_theft_rate: 12.3,
        kidnapping_rate: 0.3,
        human_trafficking_risk: "High",
        drug_trafficking_risk: "Medium",
        terrorism_risk: "Low",
        categories: &[("Theft", 42.0), ("Fraud", 28.0), ("Cyber Crime", 18.0), ("Violent Crime", 8.0), ("Drug Offenses", 4.0)],
    },
    CrimeRow {
        code: "IND",
        crime_index: 44.8,
        safety_index: 55.2,
        total_crime_rate: 38.6,
        homicide_rate: 3.0,
        assault_rate: 78.4,
        robbery_rate: 12.5,
        burglary_rate: 28.4,
        vehicle_theft_rate: 45.6,
        kidnapping_rate: 5.6,
        human_trafficking_risk: "High",
        drug_trafficking_risk: "Medium",
        terrorism_risk: "Medium",
        categories: &[("Theft", 35.0), ("Violent Crime", 32.0), ("Sexual Offenses", 15.0), ("Fraud", 12.0), ("Cyber Crime", 6.0)],
    },
    CrimeRow {
        code: "BRA",
        crime_index: 68.3,
        safety_index: 31.7,
        total_crime_rate: 72.4,
        homicide_rate: 22.4,
        assault_rate: 178.5,
        robbery_rate: 654.3,
        burglary_rate: 356.7,
        vehicle_theft_rate: 212.4,
        kidnapping_rate: 4.8,
        human_trafficking_risk: "High",
        drug_trafficking_risk: "High",
        terrorism_risk: "Low",
        categories: &[("Theft/Robbery", 48.0), ("Violent Crime", 35.0), ("Drug Offenses", 10.0), ("Fraud", 5.0), ("Cyber Crime", 2.0)],
    },
    CrimeRow {
        code: "RUS",
        crime_index: 39.2,
        safety_index: 60.8,
        total_crime_rate: 35.6,
        homicide_rate: 8.2,
        assault_rate: 45.3,
        robbery_rate: 38.9,
        burglary_rate: 78.5,
        vehicle_theft_rate: 34.2,
        kidnapping_rate: 0.8,
        human_trafficking_risk: "High",
        drug_trafficking_risk: "High",
        terrorism_risk: "Medium",
        categories: &[("Theft", 42.0), ("Violent Crime", 25.0), ("Fraud", 18.0), ("Drug Offenses", 10.0), ("Cyber Crime", 5.0)],
    },
    CrimeRow {
        code: "AUS",
        crime_index: 42.4,
        safety_index: 57.6,
        total_crime_rate: 39.8,
        homicide_rate: 0.9,
        assault_rate: 186.5,
        robbery_rate: 24.5,
        burglary_rate: 328.4,
        vehicle_theft_rate: 156.3,
        kidnapping_rate: 0.4,
        human_trafficking_risk: "Low",
        drug_trafficking_risk: "Medium",
        terrorism_risk: "Low",
        categories: &[("Property Crime", 52.0), ("Violent Crime", 22.0), ("Drug Offenses", 14.0), ("Fraud", 8.0), ("Cyber Crime", 4.0)],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_shares_sum_to_100() {
        for row in &CATALOG {
            let total: f64 = row.categories.iter().map(|(_, p)| p).sum();
            assert!((total - 100.0).abs() < 0.01, "{} sums to {total}", row.code);
        }
    }

    #[tokio::test]
    async fn test_emits_crime_and_breakdown() {
        let codes = vec!["USA".to_string()];
        let updates = NumbeoCrimeProvider.fetch(Some(codes.as_slice())).await.unwrap();

        let update = &updates[0];
        assert_eq!(update.crime.as_ref().unwrap().crime_index, Some(49.2));
        let categories = update.crime_categories.as_ref().unwrap();
        assert_eq!(categories[0], CrimeCategoryShare::new("Property Crime", 38.0));
        assert_eq!(categories.len(), 5);
    }
}
