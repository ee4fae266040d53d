//! OECD statistics: household income, wages, poverty, trade and debt.

use async_trait::async_trait;

use super::{Provider, select};
use crate::model::{CountryDataUpdate, Economy};

pub struct OecdProvider;

struct EconomicRow {
    code: &'static str,
    /// Yearly, USD.
    average_income: f64,
    /// Monthly, USD.
    minimum_wage: f64,
    poverty_rate: f64,
    trade_balance: f64,
    exports: f64,
    imports: f64,
    /// Percent of GDP.
    public_debt: f64,
    currency_code: &'static str,
}

impl EconomicRow {
    fn to_update(&self) -> CountryDataUpdate {
        CountryDataUpdate {
            economy: Some(Economy {
                average_income: Some(self.average_income),
                minimum_wage: Some(self.minimum_wage),
                poverty_rate: Some(self.poverty_rate),
                trade_balance: Some(self.trade_balance),
                exports: Some(self.exports),
                imports: Some(self.imports),
                public_debt: Some(self.public_debt),
                currency_code: Some(self.currency_code.to_string()),
                ..Default::default()
            }),
            ..CountryDataUpdate::new(self.code)
        }
    }
}

#[async_trait]
impl Provider for OecdProvider {
    fn name(&self) -> &'static str {
        "oecd"
    }

    fn source(&self) -> &'static str {
        "https://stats.oecd.org/SDMX-JSON"
    }

    async fn fetch(&self, codes: Option<&[String]>) -> anyhow::Result<Vec<CountryDataUpdate>> {
        Ok(select(&CATALOG, codes, |row| row.code)
            .into_iter()
            .map(EconomicRow::to_update)
            .collect())
    }
}

const CATALOG: [EconomicRow; 10] = [
    EconomicRow {
        code: "USA",
        average_income: 77463.0,
        minimum_wage: 1256.0,
        poverty_rate: 11.4,
        trade_balance: -773400000000.0,
        exports: 2065000000000.0,
        imports: 2838400000000.0,
        public_debt: 123.3,
        currency_code: "USD",
    },
    EconomicRow {
        code: "DEU",
        average_income: 58940.0,
        minimum_wage: 2054.0,
        poverty_rate: 14.8,
        trade_balance: 210000000000.0,
        exports: 1660000000000.0,
        imports: 1450000000000.0,
        public_debt: 66.1,
        currency_code: "EUR",
    },
    EconomicRow {
        code: "GBR",
        average_income: 52295.0,
        minimum_wage: 1970.0,
        poverty_rate: 18.6,
        trade_balance: -198000000000.0,
        exports: 776000000000.0,
        imports: 974000000000.0,
        public_debt: 101.2,
        currency_code: "GBP",
    },
    EconomicRow {
        code: "FRA",
        average_income: 52764.0,
        minimum_wage: 1767.0,
        poverty_rate: 14.5,
        trade_balance: -85000000000.0,
        exports: 617000000000.0,
        imports: 702000000000.0,
        public_debt: 111.6,
        currency_code: "EUR",
    },
    EconomicRow {
        code: "JPN",
        average_income: 41509.0,
        minimum_wage: 1048.0,
        poverty_rate: 15.7,
        trade_balance: -62000000000.0,
        exports: 756000000000.0,
        imports: 818000000000.0,
        public_debt: 263.9,
        currency_code: "JPY",
    },
    EconomicRow {
        code: "CHN",
        average_income: 12850.0,
        minimum_wage: 326.0,
        poverty_rate: 6.1,
        trade_balance: 823000000000.0,
        exports: 3380000000000.0,
        imports: 2557000000000.0,
        public_debt: 77.1,
        currency_code: "CNY",
    },
    EconomicRow {
        code: "IND",
        average_income: 2389.0,
        minimum_wage: 78.0,
        poverty_rate: 21.9,
        trade_balance: -265000000000.0,
        exports: 451000000000.0,
        imports: 716000000000.0,
        public_debt: 83.1,
        currency_code: "INR",
    },
    EconomicRow {
        code: "BRA",
        average_income: 9673.0,
        minimum_wage: 260.0,
        poverty_rate: 29.4,
        trade_balance: 62000000000.0,
        exports: 334000000000.0,
        imports: 272000000000.0,
        public_debt: 88.1,
        currency_code: "BRL",
    },
    EconomicRow {
        code: "RUS",
        average_income: 12195.0,
        minimum_wage: 198.0,
        poverty_rate: 11.0,
        trade_balance: 282000000000.0,
        exports: 494000000000.0,
        imports: 212000000000.0,
        public_debt: 19.5,
        currency_code: "RUB",
    },
    EconomicRow {
        code: "AUS",
        average_income: 59408.0,
        minimum_wage: 2570.0,
        poverty_rate: 12.4,
        trade_balance: 105000000000.0,
        exports: 415000000000.0,
        imports: 310000000000.0,
        public_debt: 57.0,
        currency_code: "AUD",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_balance_matches_flows() {
        for row in &CATALOG {
            let implied = row.exports - row.imports;
            assert!(
                (implied - row.trade_balance).abs() < 1e9,
                "{}: {} vs {}",
                row.code,
                implied,
                row.trade_balance
            );
        }
    }

    #[tokio::test]
    async fn test_update_carries_currency_code() {
        let codes = vec!["GBR".to_string()];
        let updates = OecdProvider.fetch(Some(codes.as_slice())).await.unwrap();

        let economy = updates[0].economy.as_ref().unwrap();
        assert_eq!(economy.currency_code.as_deref(), Some("GBP"));
        assert!(economy.currency.is_none());
        assert!(economy.gdp.is_none());
    }
}
