//! Reference country catalog.
//!
//! Creates the ten tracked countries on an empty database and writes the
//! baseline values no provider supplies (bloc memberships, governance
//! indices, school enrollment, IQ estimates, GDP at PPP). Everything else
//! arrives through the first sync.

use tracing::info;

use crate::model::{CountryDataUpdate, Demographics, Economy, Education, NewCountry, Politics};
use crate::storage::Storage;

struct SeedCountry {
    code: &'static str,
    code3: &'static str,
    name: &'static str,
    official_name: &'static str,
    region: &'static str,
    subregion: &'static str,
    capital: &'static str,
    population: i64,
    area: f64,
    latitude: f64,
    longitude: f64,
}

struct Memberships {
    eu: bool,
    un: bool,
    g7: bool,
    g20: bool,
    brics: bool,
}

struct Baseline {
    code: &'static str,
    average_iq: f64,
    gdp_ppp: f64,
    memberships: Memberships,
    democracy_index: f64,
    corruption_index: f64,
    human_development_index: f64,
    /// Primary, secondary, tertiary gross enrollment.
    enrollment: [f64; 3],
    average_schooling_years: f64,
}

impl SeedCountry {
    fn to_new_country(&self) -> NewCountry {
        NewCountry {
            code: self.code.to_string(),
            code3: self.code3.to_string(),
            name: self.name.to_string(),
            official_name: Some(self.official_name.to_string()),
            region: Some(self.region.to_string()),
            subregion: Some(self.subregion.to_string()),
            capital: Some(self.capital.to_string()),
            population: Some(self.population),
            area: Some(self.area),
            flag_url: Some(format!(
                "https://flagcdn.com/w320/{}.png",
                self.code.to_lowercase()
            )),
            latitude: Some(self.latitude),
            longitude: Some(self.longitude),
        }
    }
}

impl Baseline {
    fn to_update(&self) -> CountryDataUpdate {
        let [primary, secondary, tertiary] = self.enrollment;
        CountryDataUpdate {
            demographics: Some(Demographics {
                average_iq: Some(self.average_iq),
                ..Default::default()
            }),
            economy: Some(Economy {
                gdp_ppp: Some(self.gdp_ppp),
                ..Default::default()
            }),
            politics: Some(Politics {
                is_eu: Some(self.memberships.eu),
                is_un: Some(self.memberships.un),
                is_g7: Some(self.memberships.g7),
                is_g20: Some(self.memberships.g20),
                is_brics: Some(self.memberships.brics),
                democracy_index: Some(self.democracy_index),
                corruption_index: Some(self.corruption_index),
                human_development_index: Some(self.human_development_index),
                ..Default::default()
            }),
            education: Some(Education {
                primary_enrollment_rate: Some(primary),
                secondary_enrollment_rate: Some(secondary),
                tertiary_enrollment_rate: Some(tertiary),
                average_schooling_years: Some(self.average_schooling_years),
                ..Default::default()
            }),
            ..CountryDataUpdate::new(self.code)
        }
    }
}

/// Alpha-2 codes of the tracked countries.
pub fn tracked_codes() -> impl Iterator<Item = &'static str> {
    COUNTRIES.iter().map(|c| c.code)
}

/// Seed the catalog when the countries table is empty.
///
/// # Returns
///
/// The number of countries created (0 when data already exists).
pub async fn seed_if_empty(storage: &Storage) -> anyhow::Result<usize> {
    if storage.country_count().await? > 0 {
        return Ok(0);
    }

    for country in &COUNTRIES {
        storage.insert_country(&country.to_new_country()).await?;
    }
    for baseline in &BASELINES {
        storage.apply_update(&baseline.to_update()).await?;
    }

    info!(countries = COUNTRIES.len(), "Seeded country catalog");
    Ok(COUNTRIES.len())
}

const COUNTRIES: [SeedCountry; 10] = [
    SeedCountry {
        code: "US",
        code3: "USA",
        name: "United States",
        official_name: "United States of America",
        region: "Americas",
        subregion: "North America",
        capital: "Washington, D.C.",
        population: 334914895,
        area: 9833520.0,
        latitude: 38.8951,
        longitude: -77.0364,
    },
    SeedCountry {
        code: "DE",
        code3: "DEU",
        name: "Germany",
        official_name: "Federal Republic of Germany",
        region: "Europe",
        subregion: "Western Europe",
        capital: "Berlin",
        population: 84552242,
        area: 357022.0,
        latitude: 52.52,
        longitude: 13.405,
    },
    SeedCountry {
        code: "GB",
        code3: "GBR",
        name: "United Kingdom",
        official_name: "United Kingdom of Great Britain and Northern Ireland",
        region: "Europe",
        subregion: "Northern Europe",
        capital: "London",
        population: 67736802,
        area: 242495.0,
        latitude: 51.5074,
        longitude: -0.1278,
    },
    SeedCountry {
        code: "FR",
        code3: "FRA",
        name: "France",
        official_name: "French Republic",
        region: "Europe",
        subregion: "Western Europe",
        capital: "Paris",
        population: 64756584,
        area: 643801.0,
        latitude: 48.8566,
        longitude: 2.3522,
    },
    SeedCountry {
        code: "JP",
        code3: "JPN",
        name: "Japan",
        official_name: "Japan",
        region: "Asia",
        subregion: "Eastern Asia",
        capital: "Tokyo",
        population: 123294513,
        area: 377975.0,
        latitude: 35.6762,
        longitude: 139.6503,
    },
    SeedCountry {
        code: "CN",
        code3: "CHN",
        name: "China",
        official_name: "People's Republic of China",
        region: "Asia",
        subregion: "Eastern Asia",
        capital: "Beijing",
        population: 1425178782,
        area: 9596960.0,
        latitude: 39.9042,
        longitude: 116.4074,
    },
    SeedCountry {
        code: "IN",
        code3: "IND",
        name: "India",
        official_name: "Republic of India",
        region: "Asia",
        subregion: "Southern Asia",
        capital: "New Delhi",
        population: 1428627663,
        area: 3287263.0,
        latitude: 28.6139,
        longitude: 77.209,
    },
    SeedCountry {
        code: "BR",
        code3: "BRA",
        name: "Brazil",
        official_name: "Federative Republic of Brazil",
        region: "Americas",
        subregion: "South America",
        capital: "Brasília",
        population: 216422446,
        area: 8515767.0,
        latitude: -15.7942,
        longitude: -47.8822,
    },
    SeedCountry {
        code: "RU",
        code3: "RUS",
        name: "Russia",
        official_name: "Russian Federation",
        region: "Europe",
        subregion: "Eastern Europe",
        capital: "Moscow",
        population: 144444359,
        area: 17098242.0,
        latitude: 55.7558,
        longitude: 37.6173,
    },
    SeedCountry {
        code: "AU",
        code3: "AUS",
        name: "Australia",
        official_name: "Commonwealth of Australia",
        region: "Oceania",
        subregion: "Australia and New Zealand",
        capital: "Canberra",
        population: 26439111,
        area: 7692024.0,
        latitude: -35.2809,
        longitude: 149.13,
    },
];

const BASELINES: [Baseline; 10] = [
    Baseline {
        code: "US",
        average_iq: 98.0,
        gdp_ppp: 25462700000000.0,
        memberships: Memberships { eu: false, un: true, g7: true, g20: true, brics: false },
        democracy_index: 7.85,
        corruption_index: 69.0,
        human_development_index: 0.921,
        enrollment: [99.3, 98.5, 87.9],
        average_schooling_years: 13.4,
    },
    Baseline {
        code: "DE",
        average_iq: 99.0,
        gdp_ppp: 4803000000000.0,
        memberships: Memberships { eu: true, un: true, g7: true, g20: true, brics: false },
        democracy_index: 8.67,
        corruption_index: 79.0,
        human_development_index: 0.942,
        enrollment: [99.9, 99.3, 72.3],
        average_schooling_years: 14.1,
    },
    Baseline {
        code: "GB",
        average_iq: 100.0,
        gdp_ppp: 3413000000000.0,
        memberships: Memberships { eu: false, un: true, g7: true, g20: true, brics: false },
        democracy_index: 8.28,
        corruption_index: 71.0,
        human_development_index: 0.929,
        enrollment: [99.7, 98.9, 60.0],
        average_schooling_years: 13.0,
    },
    Baseline {
        code: "FR",
        average_iq: 98.0,
        gdp_ppp: 3377000000000.0,
        memberships: Memberships { eu: true, un: true, g7: true, g20: true, brics: false },
        democracy_index: 7.99,
        corruption_index: 72.0,
        human_development_index: 0.903,
        enrollment: [99.7, 98.7, 65.6],
        average_schooling_years: 11.6,
    },
    Baseline {
        code: "JP",
        average_iq: 106.0,
        gdp_ppp: 5396000000000.0,
        memberships: Memberships { eu: false, un: true, g7: true, g20: true, brics: false },
        democracy_index: 8.33,
        corruption_index: 73.0,
        human_development_index: 0.92,
        enrollment: [99.9, 99.2, 63.4],
        average_schooling_years: 13.4,
    },
    Baseline {
        code: "CN",
        average_iq: 104.0,
        gdp_ppp: 30177000000000.0,
        memberships: Memberships { eu: false, un: true, g7: false, g20: true, brics: true },
        democracy_index: 1.94,
        corruption_index: 42.0,
        human_development_index: 0.768,
        enrollment: [99.9, 95.5, 57.8],
        average_schooling_years: 8.1,
    },
    Baseline {
        code: "IN",
        average_iq: 82.0,
        gdp_ppp: 11665000000000.0,
        memberships: Memberships { eu: false, un: true, g7: false, g20: true, brics: true },
        democracy_index: 6.61,
        corruption_index: 39.0,
        human_development_index: 0.633,
        enrollment: [97.0, 74.0, 28.1],
        average_schooling_years: 6.5,
    },
    Baseline {
        code: "BR",
        average_iq: 87.0,
        gdp_ppp: 3687000000000.0,
        memberships: Memberships { eu: false, un: true, g7: false, g20: true, brics: true },
        democracy_index: 6.78,
        corruption_index: 36.0,
        human_development_index: 0.754,
        enrollment: [98.3, 87.0, 51.3],
        average_schooling_years: 8.0,
    },
    Baseline {
        code: "RU",
        average_iq: 97.0,
        gdp_ppp: 4771000000000.0,
        memberships: Memberships { eu: false, un: true, g7: false, g20: true, brics: true },
        democracy_index: 2.22,
        corruption_index: 26.0,
        human_development_index: 0.822,
        enrollment: [99.7, 97.8, 81.9],
        average_schooling_years: 12.2,
    },
    Baseline {
        code: "AU",
        average_iq: 99.0,
        gdp_ppp: 1593000000000.0,
        memberships: Memberships { eu: false, un: true, g7: false, g20: true, brics: false },
        democracy_index: 8.71,
        corruption_index: 75.0,
        human_development_index: 0.951,
        enrollment: [99.3, 98.5, 116.0],
        average_schooling_years: 12.7,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_creates_catalog_once() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        assert_eq!(seed_if_empty(&storage).await.unwrap(), 10);
        assert_eq!(seed_if_empty(&storage).await.unwrap(), 0);
        assert_eq!(storage.country_count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_seed_writes_baseline_fields() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        seed_if_empty(&storage).await.unwrap();

        let germany = storage.load_country("DEU").await.unwrap().unwrap();
        assert_eq!(germany.country.identity.name, "Germany");
        assert_eq!(
            germany.country.identity.flag_url.as_deref(),
            Some("https://flagcdn.com/w320/de.png")
        );

        let politics = germany.politics.unwrap();
        assert_eq!(politics.is_eu, Some(true));
        assert_eq!(politics.is_g7, Some(true));
        assert_eq!(politics.is_brics, Some(false));
        assert!(germany.military.is_none());
    }

    #[test]
    fn test_baselines_cover_every_country() {
        let codes: Vec<_> = tracked_codes().collect();
        let baseline_codes: Vec<_> = BASELINES.iter().map(|b| b.code).collect();
        assert_eq!(codes, baseline_codes);
    }
}
