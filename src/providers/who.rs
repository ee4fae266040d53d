//! WHO Global Health Observatory.
//!
//! Health system capacity, risk factors, substance use and disease burden.
//! Substance use rates are percent of adults; incidence figures are per
//! 100k; suicide rate is per 100k.

use async_trait::async_trait;

use super::{Provider, select};
use crate::model::{CountryDataUpdate, Health};

pub struct WhoHealthProvider;

struct HealthRow {
    code: &'static str,
    smoking_rate: f64,
    alcohol_consumption: f64,
    alcohol_dependency_rate: f64,
    drug_use_rate: f64,
    cannabis_use_rate: f64,
    opioid_use_rate: f64,
    cocaine_use_rate: f64,
    obesity_rate: f64,
    hospital_beds_per_1000: f64,
    physicians_per_1000: f64,
    nurses_per_1000: f64,
    hiv_prevalence: f64,
    tuberculosis_incidence: f64,
    malaria_incidence: f64,
    diabetes_prevalence: f64,
    mental_health_disorders: f64,
    suicide_rate: f64,
}

impl HealthRow {
    fn to_update(&self) -> CountryDataUpdate {
        CountryDataUpdate {
            health: Some(Health {
                smoking_rate: Some(self.smoking_rate),
                alcohol_consumption: Some(self.alcohol_consumption),
                alcohol_dependency_rate: Some(self.alcohol_dependency_rate),
                drug_use_rate: Some(self.drug_use_rate),
                cannabis_use_rate: Some(self.cannabis_use_rate),
                opioid_use_rate: Some(self.opioid_use_rate),
                cocaine_use_rate: Some(self.cocaine_use_rate),
                obesity_rate: Some(self.obesity_rate),
                hospital_beds_per_1000: Some(self.hospital_beds_per_1000),
                physicians_per_1000: Some(self.physicians_per_1000),
                nurses_per_1000: Some(self.nurses_per_1000),
                hiv_prevalence: Some(self.hiv_prevalence),
                tuberculosis_incidence: Some(self.tuberculosis_incidence),
                malaria_incidence: Some(self.malaria_incidence),
                diabetes_prevalence: Some(self.diabetes_prevalence),
                mental_health_disorders: Some(self.mental_health_disorders),
                suicide_rate: Some(self.suicide_rate),
                ..Default::default()
            }),
            ..CountryDataUpdate::new(self.code)
        }
    }
}

#[async_trait]
impl Provider for WhoHealthProvider {
    fn name(&self) -> &'static str {
        "who"
    }

    fn source(&self) -> &'static str {
        "https://ghoapi.azureedge.net/api"
    }

    async fn fetch(&self, codes: Option<&[String]>) -> anyhow::Result<Vec<CountryDataUpdate>> {
        Ok(select(&CATALOG, codes, |row| row.code)
            .into_iter()
            .map(HealthRow::to_update)
            .collect())
    }
}

const CATALOG: [HealthRow; 10] = [
    HealthRow {
        code: "USA",
        smoking_rate: 12.5,
        alcohol_consumption: 9.8,
        alcohol_dependency_rate: 5.3,
        drug_use_rate: 3.8,
        cannabis_use_rate: 15.8,
        opioid_use_rate: 2.1,
        cocaine_use_rate: 1.9,
        obesity_rate: 42.4,
        hospital_beds_per_1000: 2.9,
        physicians_per_1000: 2.6,
        nurses_per_1000: 12.0,
        hiv_prevalence: 0.3,
        tuberculosis_incidence: 2.4,
        malaria_incidence: 0.0,
        diabetes_prevalence: 10.7,
        mental_health_disorders: 20.6,
        suicide_rate: 14.5,
    },
    HealthRow {
        code: "DEU",
        smoking_rate: 23.8,
        alcohol_consumption: 12.8,
        alcohol_dependency_rate: 3.4,
        drug_use_rate: 2.8,
        cannabis_use_rate: 8.3,
        opioid_use_rate: 0.5,
        cocaine_use_rate: 1.4,
        obesity_rate: 22.3,
        hospital_beds_per_1000: 8.0,
        physicians_per_1000: 4.3,
        nurses_per_1000: 13.9,
        hiv_prevalence: 0.1,
        tuberculosis_incidence: 4.7,
        malaria_incidence: 0.0,
        diabetes_prevalence: 8.6,
        mental_health_disorders: 18.4,
        suicide_rate: 9.9,
    },
    HealthRow {
        code: "GBR",
        smoking_rate: 14.1,
        alcohol_consumption: 11.4,
        alcohol_dependency_rate: 3.7,
        drug_use_rate: 3.4,
        cannabis_use_rate: 7.8,
        opioid_use_rate: 0.9,
        cocaine_use_rate: 2.7,
        obesity_rate: 27.8,
        hospital_beds_per_1000: 2.5,
        physicians_per_1000: 3.0,
        nurses_per_1000: 8.2,
        hiv_prevalence: 0.1,
        tuberculosis_incidence: 7.3,
        malaria_incidence: 0.0,
        diabetes_prevalence: 6.3,
        mental_health_disorders: 17.6,
        suicide_rate: 7.9,
    },
    HealthRow {
        code: "FRA",
        smoking_rate: 25.3,
        alcohol_consumption: 11.7,
        alcohol_dependency_rate: 3.9,
        drug_use_rate: 2.9,
        cannabis_use_rate: 11.0,
        opioid_use_rate: 0.7,
        cocaine_use_rate: 1.6,
        obesity_rate: 21.6,
        hospital_beds_per_1000: 5.9,
        physicians_per_1000: 3.4,
        nurses_per_1000: 11.5,
        hiv_prevalence: 0.3,
        tuberculosis_incidence: 7.6,
        malaria_incidence: 0.0,
        diabetes_prevalence: 5.1,
        mental_health_disorders: 18.9,
        suicide_rate: 12.1,
    },
    HealthRow {
        code: "JPN",
        smoking_rate: 16.7,
        alcohol_consumption: 7.8,
        alcohol_dependency_rate: 1.2,
        drug_use_rate: 0.5,
        cannabis_use_rate: 1.8,
        opioid_use_rate: 0.1,
        cocaine_use_rate: 0.1,
        obesity_rate: 4.3,
        hospital_beds_per_1000: 12.8,
        physicians_per_1000: 2.5,
        nurses_per_1000: 12.1,
        hiv_prevalence: 0.02,
        tuberculosis_incidence: 10.0,
        malaria_incidence: 0.0,
        diabetes_prevalence: 7.3,
        mental_health_disorders: 9.3,
        suicide_rate: 12.2,
    },
    HealthRow {
        code: "CHN",
        smoking_rate: 24.7,
        alcohol_consumption: 7.1,
        alcohol_dependency_rate: 2.8,
        drug_use_rate: 0.9,
        cannabis_use_rate: 0.3,
        opioid_use_rate: 0.4,
        cocaine_use_rate: 0.02,
        obesity_rate: 6.2,
        hospital_beds_per_1000: 4.7,
        physicians_per_1000: 2.2,
        nurses_per_1000: 3.1,
        hiv_prevalence: 0.06,
        tuberculosis_incidence: 52.0,
        malaria_incidence: 0.0,
        diabetes_prevalence: 10.9,
        mental_health_disorders: 9.3,
        suicide_rate: 6.7,
    },
    HealthRow {
        code: "IND",
        smoking_rate: 10.7,
        alcohol_consumption: 4.3,
        alcohol_dependency_rate: 4.0,
        drug_use_rate: 0.6,
        cannabis_use_rate: 3.0,
        opioid_use_rate: 0.4,
        cocaine_use_rate: 0.01,
        obesity_rate: 3.9,
        hospital_beds_per_1000: 0.5,
        physicians_per_1000: 0.7,
        nurses_per_1000: 1.7,
        hiv_prevalence: 0.2,
        tuberculosis_incidence: 199.0,
        malaria_incidence: 5.4,
        diabetes_prevalence: 11.4,
        mental_health_disorders: 14.3,
        suicide_rate: 12.9,
    },
    HealthRow {
        code: "BRA",
        smoking_rate: 12.6,
        alcohol_consumption: 7.8,
        alcohol_dependency_rate: 4.2,
        drug_use_rate: 2.1,
        cannabis_use_rate: 3.5,
        opioid_use_rate: 0.5,
        cocaine_use_rate: 1.7,
        obesity_rate: 22.1,
        hospital_beds_per_1000: 2.1,
        physicians_per_1000: 2.3,
        nurses_per_1000: 7.4,
        hiv_prevalence: 0.5,
        tuberculosis_incidence: 46.0,
        malaria_incidence: 6.2,
        diabetes_prevalence: 10.5,
        mental_health_disorders: 18.6,
        suicide_rate: 6.9,
    },
    HealthRow {
        code: "RUS",
        smoking_rate: 28.3,
        alcohol_consumption: 11.1,
        alcohol_dependency_rate: 6.5,
        drug_use_rate: 2.3,
        cannabis_use_rate: 3.8,
        opioid_use_rate: 1.2,
        cocaine_use_rate: 0.1,
        obesity_rate: 23.1,
        hospital_beds_per_1000: 7.1,
        physicians_per_1000: 4.0,
        nurses_per_1000: 8.5,
        hiv_prevalence: 1.2,
        tuberculosis_incidence: 45.0,
        malaria_incidence: 0.0,
        diabetes_prevalence: 6.3,
        mental_health_disorders: 15.9,
        suicide_rate: 21.6,
    },
    HealthRow {
        code: "AUS",
        smoking_rate: 11.2,
        alcohol_consumption: 10.6,
        alcohol_dependency_rate: 3.0,
        drug_use_rate: 3.5,
        cannabis_use_rate: 11.6,
        opioid_use_rate: 0.8,
        cocaine_use_rate: 2.5,
        obesity_rate: 31.3,
        hospital_beds_per_1000: 3.8,
        physicians_per_1000: 3.9,
        nurses_per_1000: 12.0,
        hiv_prevalence: 0.1,
        tuberculosis_incidence: 5.7,
        malaria_incidence: 0.0,
        diabetes_prevalence: 5.3,
        mental_health_disorders: 20.1,
        suicide_rate: 11.3,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_leaves_spending_to_other_sources() {
        let codes = vec!["USA".to_string()];
        let updates = WhoHealthProvider.fetch(Some(codes.as_slice())).await.unwrap();

        let health = updates[0].health.as_ref().unwrap();
        assert_eq!(health.smoking_rate, Some(12.5));
        assert_eq!(health.obesity_rate, Some(42.4));
        assert!(health.healthcare_spending_percent.is_none());
    }

    #[tokio::test]
    async fn test_unknown_codes_yield_nothing() {
        let codes = vec!["ATA".to_string()];
        let updates = WhoHealthProvider.fetch(Some(codes.as_slice())).await.unwrap();
        assert!(updates.is_empty());
    }
}
