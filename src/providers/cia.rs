//! CIA World Factbook.
//!
//! Government structure, currency, life expectancy by sex and NATO
//! membership. This provider owns `politics.is_nato` and the economy
//! currency fields when another provider supplies them too.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{Provider, select};
use crate::model::{CountryDataUpdate, Demographics, Economy, Politics};

pub struct CiaFactbookProvider;

struct FactbookRow {
    code: &'static str,
    government_type: &'static str,
    chief_of_state: &'static str,
    head_of_government: &'static str,
    political_system: &'static str,
    legislative_branch: &'static str,
    judicial_branch: &'static str,
    constitution: &'static str,
    suffrage: &'static str,
    /// ISO date; `None` where there is no single founding date.
    independence_date: Option<&'static str>,
    national_holiday: &'static str,
    currency: &'static str,
    currency_code: &'static str,
    life_expectancy_male: f64,
    life_expectancy_female: f64,
    nato_member: bool,
}

impl FactbookRow {
    fn to_update(&self) -> CountryDataUpdate {
        let independence_date = self
            .independence_date
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        CountryDataUpdate {
            politics: Some(Politics {
                government_type: Some(self.government_type.to_string()),
                chief_of_state: Some(self.chief_of_state.to_string()),
                head_of_government: Some(self.head_of_government.to_string()),
                political_system: Some(self.political_system.to_string()),
                legislative_branch: Some(self.legislative_branch.to_string()),
                judicial_branch: Some(self.judicial_branch.to_string()),
                constitution: Some(self.constitution.to_string()),
                suffrage: Some(self.suffrage.to_string()),
                independence_date,
                national_holiday: Some(self.national_holiday.to_string()),
                is_nato: Some(self.nato_member),
                ..Default::default()
            }),
            economy: Some(Economy {
                currency: Some(self.currency.to_string()),
                currency_code: Some(self.currency_code.to_string()),
                ..Default::default()
            }),
            demographics: Some(Demographics {
                life_expectancy_male: Some(self.life_expectancy_male),
                life_expectancy_female: Some(self.life_expectancy_female),
                ..Default::default()
            }),
            ..CountryDataUpdate::new(self.code)
        }
    }
}

#[async_trait]
impl Provider for CiaFactbookProvider {
    fn name(&self) -> &'static str {
        "cia"
    }

    fn source(&self) -> &'static str {
        "https://www.cia.gov/the-world-factbook"
    }

    async fn fetch(&self, codes: Option<&[String]>) -> anyhow::Result<Vec<CountryDataUpdate>> {
        Ok(select(&CATALOG, codes, |row| row.code)
            .into_iter()
            .map(FactbookRow::to_update)
            .collect())
    }
}

const CATALOG: [FactbookRow; 10] = [
    FactbookRow {
        code: "USA",
        government_type: "Federal Presidential Constitutional Republic",
        chief_of_state: "President Joseph R. BIDEN Jr.",
        head_of_government: "President Joseph R. BIDEN Jr.",
        political_system: "Federal Republic",
        legislative_branch: "Bicameral Congress: Senate (100 seats) and House of Representatives (435 seats)",
        judicial_branch: "Supreme Court (9 justices)",
        constitution: "Ratified 1788, effective 1789",
        suffrage: "18 years of age; universal",
        independence_date: Some("1776-07-04"),
        national_holiday: "Independence Day, 4 July",
        currency: "US Dollar",
        currency_code: "USD",
        life_expectancy_male: 74.8,
        life_expectancy_female: 80.2,
        nato_member: true,
    },
    FactbookRow {
        code: "DEU",
        government_type: "Federal Parliamentary Republic",
        chief_of_state: "President Frank-Walter STEINMEIER",
        head_of_government: "Chancellor Olaf SCHOLZ",
        political_system: "Federal Republic",
        legislative_branch: "Bicameral: Bundesrat (69 seats) and Bundestag (736 seats)",
        judicial_branch: "Federal Constitutional Court",
        constitution: "Basic Law (Grundgesetz), 1949",
        suffrage: "18 years of age; universal",
        independence_date: Some("1990-10-03"),
        national_holiday: "German Unity Day, 3 October",
        currency: "Euro",
        currency_code: "EUR",
        life_expectancy_male: 78.7,
        life_expectancy_female: 83.4,
        nato_member: true,
    },
    FactbookRow {
        code: "GBR",
        government_type: "Parliamentary Constitutional Monarchy",
        chief_of_state: "King CHARLES III",
        head_of_government: "Prime Minister Keir STARMER",
        political_system: "Constitutional Monarchy",
        legislative_branch: "Bicameral Parliament: House of Lords and House of Commons (650 seats)",
        judicial_branch: "Supreme Court of the United Kingdom",
        constitution: "Uncodified; partly statutes, conventions, judicial decisions",
        suffrage: "18 years of age; universal",
        independence_date: None,
        national_holiday: "Official Birthday of the Sovereign",
        currency: "British Pound",
        currency_code: "GBP",
        life_expectancy_male: 79.4,
        life_expectancy_female: 83.1,
        nato_member: true,
    },
    FactbookRow {
        code: "FRA",
        government_type: "Semi-Presidential Republic",
        chief_of_state: "President Emmanuel MACRON",
        head_of_government: "Prime Minister Michel BARNIER",
        political_system: "Republic",
        legislative_branch: "Bicameral Parliament: Senate (348 seats) and National Assembly (577 seats)",
        judicial_branch: "Constitutional Council",
        constitution: "Fifth Republic Constitution, 1958",
        suffrage: "18 years of age; universal",
        independence_date: Some("0843-08-10"),
        national_holiday: "Bastille Day, 14 July",
        currency: "Euro",
        currency_code: "EUR",
        life_expectancy_male: 79.9,
        life_expectancy_female: 85.7,
        nato_member: true,
    },
    FactbookRow {
        code: "JPN",
        government_type: "Parliamentary Constitutional Monarchy",
        chief_of_state: "Emperor NARUHITO",
        head_of_government: "Prime Minister Shigeru ISHIBA",
        political_system: "Constitutional Monarchy",
        legislative_branch: "Bicameral National Diet: House of Councillors (248 seats) and House of Representatives (465 seats)",
        judicial_branch: "Supreme Court",
        constitution: "Constitution of Japan, 1947",
        suffrage: "18 years of age; universal",
        independence_date: None,
        national_holiday: "National Foundation Day, 11 February",
        currency: "Japanese Yen",
        currency_code: "JPY",
        life_expectancy_male: 81.5,
        life_expectancy_female: 87.6,
        nato_member: false,
    },
    FactbookRow {
        code: "CHN",
        government_type: "Communist Party-led State",
        chief_of_state: "President XI Jinping",
        head_of_government: "Premier LI Qiang",
        political_system: "Communist State",
        legislative_branch: "Unicameral National People's Congress (2,980 seats)",
        judicial_branch: "Supreme People's Court",
        constitution: "Constitution of 1982, amended",
        suffrage: "18 years of age; universal",
        independence_date: Some("1949-10-01"),
        national_holiday: "National Day, 1 October",
        currency: "Renminbi",
        currency_code: "CNY",
        life_expectancy_male: 75.9,
        life_expectancy_female: 80.5,
        nato_member: false,
    },
    FactbookRow {
        code: "IND",
        government_type: "Federal Parliamentary Republic",
        chief_of_state: "President Droupadi MURMU",
        head_of_government: "Prime Minister Narendra MODI",
        political_system: "Federal Republic",
        legislative_branch: "Bicameral Parliament: Rajya Sabha (245 seats) and Lok Sabha (545 seats)",
        judicial_branch: "Supreme Court of India",
        constitution: "Constitution of India, 1950",
        suffrage: "18 years of age; universal",
        independence_date: Some("1947-08-15"),
        national_holiday: "Independence Day, 15 August",
        currency: "Indian Rupee",
        currency_code: "INR",
        life_expectancy_male: 68.7,
        life_expectancy_female: 71.6,
        nato_member: false,
    },
    FactbookRow {
        code: "BRA",
        government_type: "Federal Presidential Republic",
        chief_of_state: "President Luiz Inácio LULA da Silva",
        head_of_government: "President Luiz Inácio LULA da Silva",
        political_system: "Federal Republic",
        legislative_branch: "Bicameral National Congress: Federal Senate (81 seats) and Chamber of Deputies (513 seats)",
        judicial_branch: "Supreme Federal Court",
        constitution: "Constitution of Brazil, 1988",
        suffrage: "16-18 years voluntary; 18-70 years compulsory",
        independence_date: Some("1822-09-07"),
        national_holiday: "Independence Day, 7 September",
        currency: "Brazilian Real",
        currency_code: "BRL",
        life_expectancy_male: 72.4,
        life_expectancy_female: 79.8,
        nato_member: false,
    },
    FactbookRow {
        code: "RUS",
        government_type: "Federal Semi-Presidential Republic",
        chief_of_state: "President Vladimir PUTIN",
        head_of_government: "Prime Minister Mikhail MISHUSTIN",
        political_system: "Federal Republic",
        legislative_branch: "Bicameral Federal Assembly: Federation Council (170 seats) and State Duma (450 seats)",
        judicial_branch: "Constitutional Court",
        constitution: "Constitution of the Russian Federation, 1993",
        suffrage: "18 years of age; universal",
        independence_date: Some("1991-08-24"),
        national_holiday: "Russia Day, 12 June",
        currency: "Russian Ruble",
        currency_code: "RUB",
        life_expectancy_male: 68.2,
        life_expectancy_female: 78.0,
        nato_member: false,
    },
    FactbookRow {
        code: "AUS",
        government_type: "Federal Parliamentary Constitutional Monarchy",
        chief_of_state: "King CHARLES III (represented by Governor-General)",
        head_of_government: "Prime Minister Anthony ALBANESE",
        political_system: "Constitutional Monarchy",
        legislative_branch: "Bicameral Federal Parliament: Senate (76 seats) and House of Representatives (151 seats)",
        judicial_branch: "High Court of Australia",
        constitution: "Constitution of Australia, 1901",
        suffrage: "18 years of age; universal and compulsory",
        independence_date: Some("1901-01-01"),
        national_holiday: "Australia Day, 26 January",
        currency: "Australian Dollar",
        currency_code: "AUD",
        life_expectancy_male: 81.3,
        life_expectancy_female: 85.2,
        nato_member: false,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_government_and_currency() {
        let codes = vec!["USA".to_string()];
        let updates = CiaFactbookProvider.fetch(Some(codes.as_slice())).await.unwrap();

        let politics = updates[0].politics.as_ref().unwrap();
        assert_eq!(politics.is_nato, Some(true));
        assert_eq!(
            politics.independence_date,
            NaiveDate::from_ymd_opt(1776, 7, 4)
        );
        assert_eq!(
            updates[0].economy.as_ref().unwrap().currency_code.as_deref(),
            Some("USD")
        );
    }

    #[tokio::test]
    async fn test_missing_independence_date_is_absent() {
        let codes = vec!["GBR".to_string()];
        let updates = CiaFactbookProvider.fetch(Some(codes.as_slice())).await.unwrap();

        let politics = updates[0].politics.as_ref().unwrap();
        assert!(politics.independence_date.is_none());
        assert!(politics.government_type.is_some());
    }

    #[test]
    fn test_every_date_parses() {
        for row in CATALOG.iter().filter(|r| r.independence_date.is_some()) {
            assert!(row.to_update().politics.unwrap().independence_date.is_some(), "{}", row.code);
        }
    }
}
