//! Henley Passport Index.

use async_trait::async_trait;

use super::{Provider, select};
use crate::model::{CountryDataUpdate, Politics};

pub struct HenleyPassportProvider;

struct PassportRow {
    code: &'static str,
    ranking: i64,
    visa_free: i64,
}

impl PassportRow {
    fn to_update(&self) -> CountryDataUpdate {
        CountryDataUpdate {
            politics: Some(Politics {
                passport_ranking: Some(self.ranking),
                passport_visa_free: Some(self.visa_free),
                ..Default::default()
            }),
            ..CountryDataUpdate::new(self.code)
        }
    }
}

#[async_trait]
impl Provider for HenleyPassportProvider {
    fn name(&self) -> &'static str {
        "henley"
    }

    fn source(&self) -> &'static str {
        "https://www.henleyglobal.com"
    }

    async fn fetch(&self, codes: Option<&[String]>) -> anyhow::Result<Vec<CountryDataUpdate>> {
        Ok(select(&CATALOG, codes, |row| row.code)
            .into_iter()
            .map(PassportRow::to_update)
            .collect())
    }
}

const CATALOG: [PassportRow; 10] = [
    PassportRow {
        code: "USA",
        ranking: 8,
        visa_free: 186,
    },
    PassportRow {
        code: "DEU",
        ranking: 2,
        visa_free: 192,
    },
    PassportRow {
        code: "GBR",
        ranking: 4,
        visa_free: 190,
    },
    PassportRow {
        code: "FRA",
        ranking: 2,
        visa_free: 192,
    },
    PassportRow {
        code: "JPN",
        ranking: 1,
        visa_free: 194,
    },
    PassportRow {
        code: "CHN",
        ranking: 62,
        visa_free: 85,
    },
    PassportRow {
        code: "IND",
        ranking: 85,
        visa_free: 58,
    },
    PassportRow {
        code: "BRA",
        ranking: 19,
        visa_free: 170,
    },
    PassportRow {
        code: "RUS",
        ranking: 52,
        visa_free: 118,
    },
    PassportRow {
        code: "AUS",
        ranking: 6,
        visa_free: 187,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_japan_passport() {
        let codes = vec!["jpn".to_string()];
        let updates = HenleyPassportProvider.fetch(Some(codes.as_slice())).await.unwrap();

        let politics = updates[0].politics.as_ref().unwrap();
        assert_eq!(updates[0].country_code, "JPN");
        assert_eq!(politics.passport_ranking, Some(1));
        assert_eq!(politics.passport_visa_free, Some(194));
        assert!(politics.is_nato.is_none());
    }

    #[test]
    fn test_rankings_are_positive() {
        assert!(CATALOG.iter().all(|row| row.ranking >= 1 && row.visa_free > 0));
    }
}
