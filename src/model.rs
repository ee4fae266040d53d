//! Data model for WorldStats.
//!
//! # Entities
//!
//! - [`Country`]: the root entity, keyed by ISO alpha-2 code (alpha-3 also unique)
//! - Seven 1:1 category records ([`Demographics`], [`Economy`], [`Military`],
//!   [`Politics`], [`Crime`], [`Health`], [`Education`])
//! - [`CrimeCategoryShare`]: 1:many child of the crime record, replaced wholesale
//! - [`SyncLogEntry`]: append-only audit row per provider run
//! - [`CountryDataUpdate`]: in-flight partial update produced by a provider
//!
//! Every category field is optional. `None` means "not supplied", which is
//! what lets provider outputs be merged and upserted without clobbering
//! values another provider owns.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::Sqlite;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::types::Json;

/// A bindable SQLite query, as produced by `sqlx::query`.
pub type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

// ============================================================================
// Category records
// ============================================================================

/// Shared behaviour of the seven 1:1 category tables.
///
/// Implemented by the `category_record!` macro so the column list, merge
/// rule, binding order and row decoding can never drift apart.
pub trait CategoryRecord: Sized + Clone + Send + Sync {
    /// Table name in storage.
    const TABLE: &'static str;

    /// `(column, SQL type)` pairs, in bind order.
    const COLUMNS: &'static [(&'static str, &'static str)];

    /// Overwrite fields present in `incoming`; keep the rest.
    fn merge_from(&mut self, incoming: &Self);

    /// True when no field is set.
    fn is_empty(&self) -> bool;

    /// Bind every column value, in [`Self::COLUMNS`] order.
    fn bind_values<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;

    fn create_table_sql() -> String {
        let columns = Self::COLUMNS
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect::<Vec<_>>()
            .join(",\n                ");
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                country_id INTEGER NOT NULL UNIQUE REFERENCES countries(id) ON DELETE CASCADE,
                {columns},
                updated_at INTEGER NOT NULL
            )
            "#,
            table = Self::TABLE,
        )
    }

    /// Insert-or-update keyed by `country_id`.
    ///
    /// Binds: `country_id`, every column, then `updated_at`. Columns bound as
    /// NULL keep their stored value.
    fn upsert_sql() -> String {
        let names: Vec<&str> = Self::COLUMNS.iter().map(|(name, _)| *name).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let assignments = names
            .iter()
            .map(|name| format!("{name} = COALESCE(excluded.{name}, {}.{name})", Self::TABLE))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {table} (country_id, {cols}, updated_at) VALUES (?, {placeholders}, ?) \
             ON CONFLICT(country_id) DO UPDATE SET {assignments}, updated_at = excluded.updated_at \
             RETURNING id",
            table = Self::TABLE,
            cols = names.join(", "),
        )
    }
}

macro_rules! category_record {
    (
        $(#[$meta:meta])*
        $name:ident => $table:literal {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty => $sql:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: Option<$ty>, )+
        }

        impl CategoryRecord for $name {
            const TABLE: &'static str = $table;
            const COLUMNS: &'static [(&'static str, &'static str)] =
                &[ $( (stringify!($field), $sql) ),+ ];

            fn merge_from(&mut self, incoming: &Self) {
                $(
                    if let Some(value) = &incoming.$field {
                        self.$field = Some(value.clone());
                    }
                )+
            }

            fn is_empty(&self) -> bool {
                true $( && self.$field.is_none() )+
            }

            fn bind_values<'q>(&self, mut query: SqliteQuery<'q>) -> SqliteQuery<'q> {
                $( query = query.bind(self.$field.clone()); )+
                query
            }

            fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
                Ok(Self {
                    $( $field: row.try_get(stringify!($field))?, )+
                })
            }
        }
    };
}

/// One point of a yearly series (GDP history).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearValue {
    pub year: i32,
    pub value: f64,
}

category_record! {
    /// Population structure and vital statistics.
    Demographics => "demographics" {
        total_population: i64 => "INTEGER",
        male_population: i64 => "INTEGER",
        female_population: i64 => "INTEGER",
        /// Display string, e.g. `"49% / 51%"`.
        male_female_ratio: String => "TEXT",
        population_growth_rate: f64 => "REAL",
        median_age: f64 => "REAL",
        life_expectancy: f64 => "REAL",
        life_expectancy_male: f64 => "REAL",
        life_expectancy_female: f64 => "REAL",
        birth_rate: f64 => "REAL",
        death_rate: f64 => "REAL",
        fertility_rate: f64 => "REAL",
        infant_mortality_rate: f64 => "REAL",
        urban_population_percent: f64 => "REAL",
        child_population_percent: f64 => "REAL",
        working_age_percent: f64 => "REAL",
        elderly_percent: f64 => "REAL",
        #[serde(rename = "averageIQ")]
        average_iq: f64 => "REAL",
    }
}

category_record! {
    /// Macro-economic indicators. Monetary amounts are USD.
    Economy => "economy" {
        gdp: f64 => "REAL",
        gdp_per_capita: f64 => "REAL",
        gdp_growth_rate: f64 => "REAL",
        gdp_ppp: f64 => "REAL",
        /// GDP per capita by year, oldest first.
        gdp_growth_history: Json<Vec<YearValue>> => "TEXT",
        inflation: f64 => "REAL",
        unemployment_rate: f64 => "REAL",
        poverty_rate: f64 => "REAL",
        gini_index: f64 => "REAL",
        /// Percent of GDP.
        public_debt: f64 => "REAL",
        external_debt: f64 => "REAL",
        trade_balance: f64 => "REAL",
        exports: f64 => "REAL",
        imports: f64 => "REAL",
        foreign_reserves: f64 => "REAL",
        /// Monthly, USD.
        minimum_wage: f64 => "REAL",
        /// Yearly, USD.
        average_income: f64 => "REAL",
        currency: String => "TEXT",
        currency_code: String => "TEXT",
    }
}

category_record! {
    /// Armed forces strength and inventory.
    Military => "military" {
        global_rank: i64 => "INTEGER",
        total_military_personnel: i64 => "INTEGER",
        active_soldiers: i64 => "INTEGER",
        reserve_personnel: i64 => "INTEGER",
        paramilitary_forces: i64 => "INTEGER",
        defense_spending: f64 => "REAL",
        defense_spending_percent: f64 => "REAL",
        tanks: i64 => "INTEGER",
        armored_vehicles: i64 => "INTEGER",
        self_propelled_artillery: i64 => "INTEGER",
        towed_artillery: i64 => "INTEGER",
        rocket_projectors: i64 => "INTEGER",
        total_aircraft: i64 => "INTEGER",
        fighters: i64 => "INTEGER",
        helicopters: i64 => "INTEGER",
        attack_helicopters: i64 => "INTEGER",
        naval_vessels: i64 => "INTEGER",
        aircraft_carriers: i64 => "INTEGER",
        submarines: i64 => "INTEGER",
        destroyers: i64 => "INTEGER",
        frigates: i64 => "INTEGER",
        nuclear_weapons: bool => "BOOLEAN",
        is_nato_member: bool => "BOOLEAN",
    }
}

category_record! {
    /// Government, memberships and governance indices.
    Politics => "politics" {
        government_type: String => "TEXT",
        chief_of_state: String => "TEXT",
        head_of_government: String => "TEXT",
        political_system: String => "TEXT",
        legislative_branch: String => "TEXT",
        judicial_branch: String => "TEXT",
        constitution: String => "TEXT",
        suffrage: String => "TEXT",
        independence_date: NaiveDate => "DATE",
        national_holiday: String => "TEXT",
        #[serde(rename = "isEU")]
        is_eu: bool => "BOOLEAN",
        #[serde(rename = "isUN")]
        is_un: bool => "BOOLEAN",
        is_nato: bool => "BOOLEAN",
        is_g7: bool => "BOOLEAN",
        is_g20: bool => "BOOLEAN",
        is_brics: bool => "BOOLEAN",
        passport_ranking: i64 => "INTEGER",
        passport_visa_free: i64 => "INTEGER",
        democracy_index: f64 => "REAL",
        corruption_index: f64 => "REAL",
        press_freedom_index: f64 => "REAL",
        human_development_index: f64 => "REAL",
    }
}

category_record! {
    /// Crime and safety indices. Rates are per 100k inhabitants.
    Crime => "crime" {
        crime_index: f64 => "REAL",
        safety_index: f64 => "REAL",
        total_crime_rate: f64 => "REAL",
        homicide_rate: f64 => "REAL",
        assault_rate: f64 => "REAL",
        robbery_rate: f64 => "REAL",
        burglary_rate: f64 => "REAL",
        vehicle_theft_rate: f64 => "REAL",
        kidnapping_rate: f64 => "REAL",
        human_trafficking_risk: String => "TEXT",
        drug_trafficking_risk: String => "TEXT",
        terrorism_risk: String => "TEXT",
    }
}

category_record! {
    Health => "health_stats" {
        healthcare_spending_percent: f64 => "REAL",
        healthcare_spending_per_capita: f64 => "REAL",
        hospital_beds_per_1000: f64 => "REAL",
        physicians_per_1000: f64 => "REAL",
        nurses_per_1000: f64 => "REAL",
        obesity_rate: f64 => "REAL",
        smoking_rate: f64 => "REAL",
        /// Litres of pure alcohol per capita per year.
        alcohol_consumption: f64 => "REAL",
        alcohol_dependency_rate: f64 => "REAL",
        drug_use_rate: f64 => "REAL",
        cannabis_use_rate: f64 => "REAL",
        opioid_use_rate: f64 => "REAL",
        cocaine_use_rate: f64 => "REAL",
        hiv_prevalence: f64 => "REAL",
        tuberculosis_incidence: f64 => "REAL",
        malaria_incidence: f64 => "REAL",
        diabetes_prevalence: f64 => "REAL",
        mental_health_disorders: f64 => "REAL",
        suicide_rate: f64 => "REAL",
    }
}

category_record! {
    Education => "education" {
        literacy_rate: f64 => "REAL",
        literacy_rate_male: f64 => "REAL",
        literacy_rate_female: f64 => "REAL",
        education_spending_percent: f64 => "REAL",
        primary_enrollment_rate: f64 => "REAL",
        secondary_enrollment_rate: f64 => "REAL",
        tertiary_enrollment_rate: f64 => "REAL",
        average_schooling_years: f64 => "REAL",
        student_teacher_ratio: f64 => "REAL",
        pisa_reading: f64 => "REAL",
        pisa_math: f64 => "REAL",
        pisa_science: f64 => "REAL",
        universities_in_top500: i64 => "INTEGER",
    }
}

/// One slice of the crime breakdown. No identity across syncs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeCategoryShare {
    pub category: String,
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl CrimeCategoryShare {
    pub fn new(category: &str, percentage: f64) -> Self {
        Self {
            category: category.to_string(),
            percentage,
            count: None,
        }
    }
}

// ============================================================================
// In-flight updates
// ============================================================================

/// Per-country bag of partial category updates.
///
/// `country_code` may be alpha-2 or alpha-3; storage resolves either.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CountryDataUpdate {
    pub country_code: String,
    pub demographics: Option<Demographics>,
    pub economy: Option<Economy>,
    pub military: Option<Military>,
    pub politics: Option<Politics>,
    pub crime: Option<Crime>,
    /// Replaces the stored breakdown as a whole when present.
    pub crime_categories: Option<Vec<CrimeCategoryShare>>,
    pub health: Option<Health>,
    pub education: Option<Education>,
}

impl CountryDataUpdate {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            ..Default::default()
        }
    }

    /// Fold `incoming` into `self`, category by category.
    ///
    /// Within a category, every field `incoming` supplies overwrites the
    /// accumulated value and absent fields are left untouched (last writer
    /// wins per field). Crime categories are a list with no stable identity,
    /// so a supplied list replaces the accumulated one.
    pub fn merge(&mut self, incoming: &CountryDataUpdate) {
        merge_category(&mut self.demographics, &incoming.demographics);
        merge_category(&mut self.economy, &incoming.economy);
        merge_category(&mut self.military, &incoming.military);
        merge_category(&mut self.politics, &incoming.politics);
        merge_category(&mut self.crime, &incoming.crime);
        merge_category(&mut self.health, &incoming.health);
        merge_category(&mut self.education, &incoming.education);

        if let Some(categories) = &incoming.crime_categories {
            self.crime_categories = Some(categories.clone());
        }
    }

    /// True when the update would write nothing.
    pub fn is_empty(&self) -> bool {
        self.demographics.as_ref().is_none_or(CategoryRecord::is_empty)
            && self.economy.as_ref().is_none_or(CategoryRecord::is_empty)
            && self.military.as_ref().is_none_or(CategoryRecord::is_empty)
            && self.politics.as_ref().is_none_or(CategoryRecord::is_empty)
            && self.crime.as_ref().is_none_or(CategoryRecord::is_empty)
            && self.health.as_ref().is_none_or(CategoryRecord::is_empty)
            && self.education.as_ref().is_none_or(CategoryRecord::is_empty)
            && self.crime_categories.as_ref().is_none_or(Vec::is_empty)
    }
}

fn merge_category<T: CategoryRecord + Default>(acc: &mut Option<T>, incoming: &Option<T>) {
    if let Some(incoming) = incoming {
        acc.get_or_insert_with(T::default).merge_from(incoming);
    }
}

// ============================================================================
// Countries
// ============================================================================

/// Identity fields used to create a country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCountry {
    pub code: String,
    pub code3: String,
    pub name: String,
    pub official_name: Option<String>,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub capital: Option<String>,
    pub population: Option<i64>,
    pub area: Option<f64>,
    pub flag_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A stored country row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub id: i64,
    #[serde(flatten)]
    pub identity: NewCountry,
}

/// Entry of the country list and search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryListItem {
    pub id: i64,
    pub code: String,
    pub code3: Option<String>,
    pub name: String,
    pub official_name: Option<String>,
    pub region: Option<String>,
    pub capital: Option<String>,
    pub flag_url: Option<String>,
    pub population: Option<i64>,
}

/// A country with every category record eagerly loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRecord {
    pub country: Country,
    pub demographics: Option<Demographics>,
    pub economy: Option<Economy>,
    pub military: Option<Military>,
    pub politics: Option<Politics>,
    pub crime: Option<Crime>,
    pub crime_categories: Vec<CrimeCategoryShare>,
    pub health: Option<Health>,
    pub education: Option<Education>,
}

// ============================================================================
// Sync logs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Started,
    Success,
    Failed,
    Partial,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Started => "started",
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
            SyncStatus::Partial => "partial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(SyncStatus::Started),
            "success" => Some(SyncStatus::Success),
            "failed" => Some(SyncStatus::Failed),
            "partial" => Some(SyncStatus::Partial),
            _ => None,
        }
    }
}

/// Audit row for one provider run. Rows are appended, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub provider: String,
    pub status: SyncStatus,
    pub records_count: i64,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
}

impl SyncLogEntry {
    pub fn started(provider: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            provider: provider.to_string(),
            status: SyncStatus::Started,
            records_count: 0,
            error_message: None,
            duration_ms: None,
            started_at,
            completed_at: None,
            metadata: None,
        }
    }

    /// Terminal row for a run that began at `started_at`.
    pub fn finished(
        provider: &str,
        status: SyncStatus,
        records_count: usize,
        error_message: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            provider: provider.to_string(),
            status,
            records_count: i64::try_from(records_count).unwrap_or(i64::MAX),
            error_message,
            duration_ms: Some((completed_at - started_at).num_milliseconds()),
            started_at,
            completed_at: Some(completed_at),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
