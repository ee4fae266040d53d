//! SQLite storage layer for WorldStats.
//!
//! # Schema
//!
//! - `countries`: root entity, unique alpha-2 and alpha-3 codes
//! - `demographics`, `economy`, `military`, `politics`, `crime`,
//!   `health_stats`, `education`: one row per country (unique `country_id`)
//! - `crime_categories`: owned by a crime row, replaced wholesale
//! - `sync_logs`: append-only provider run audit
//! - `provider_payloads`: disk-backed cache of raw provider output
//! - `ai_summaries`: generated country summaries with expiry
//!
//! Category tables are created and upserted generically through
//! [`CategoryRecord`], so adding a column is a one-line change in `model.rs`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::model::{
    CategoryRecord, Country, CountryDataUpdate, CountryListItem, CountryRecord, Crime,
    CrimeCategoryShare, Demographics, Economy, Education, Health, Military, NewCountry, Politics,
    SyncLogEntry, SyncStatus,
};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
    /// Number of country reads served from the database.
    reads: Arc<AtomicU64>,
}

/// A stored summary for a country.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSummary {
    pub summary: String,
    pub model: String,
    pub tokens_used: Option<i64>,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A sync log row as read back.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogRow {
    pub id: i64,
    #[serde(flatten)]
    pub entry: SyncLogEntry,
}

/// Outcome of applying one country update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Neither the alpha-2 nor the alpha-3 code matched a country.
    UnknownCountry,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:worldstats.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        let in_memory = database_url.contains(":memory:");
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(database_url).await?;

        let storage = Self {
            pool,
            reads: Arc::new(AtomicU64::new(0)),
        };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS countries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL UNIQUE,
                code3 TEXT UNIQUE,
                name TEXT NOT NULL,
                official_name TEXT,
                region TEXT,
                subregion TEXT,
                capital TEXT,
                population INTEGER,
                area REAL,
                flag_url TEXT,
                latitude REAL,
                longitude REAL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for ddl in [
            Demographics::create_table_sql(),
            Economy::create_table_sql(),
            Military::create_table_sql(),
            Politics::create_table_sql(),
            Crime::create_table_sql(),
            Health::create_table_sql(),
            Education::create_table_sql(),
        ] {
            sqlx::query(&ddl).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS crime_categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                crime_id INTEGER NOT NULL REFERENCES crime(id) ON DELETE CASCADE,
                category TEXT NOT NULL,
                percentage REAL NOT NULL,
                count INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider TEXT NOT NULL,
                status TEXT NOT NULL,
                records_count INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                duration_ms INTEGER,
                started_at INTEGER NOT NULL,
                completed_at INTEGER,
                metadata TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_sync_logs_provider_started
            ON sync_logs(provider, started_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS provider_payloads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                payload TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                UNIQUE(provider, endpoint)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_summaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                country_id INTEGER NOT NULL REFERENCES countries(id) ON DELETE CASCADE,
                summary TEXT NOT NULL,
                model TEXT NOT NULL,
                tokens_used INTEGER,
                generated_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Cheap liveness probe.
    pub async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Number of full country loads served so far.
    pub fn country_reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Countries
    // ========================================================================

    /// Insert a country and return its id.
    pub async fn insert_country(&self, country: &NewCountry) -> anyhow::Result<i64> {
        let now = Utc::now().timestamp();

        let row = sqlx::query(
            r#"
            INSERT INTO countries (
                code, code3, name, official_name, region, subregion, capital,
                population, area, flag_url, latitude, longitude, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(country.code.to_uppercase())
        .bind(country.code3.to_uppercase())
        .bind(&country.name)
        .bind(&country.official_name)
        .bind(&country.region)
        .bind(&country.subregion)
        .bind(&country.capital)
        .bind(country.population)
        .bind(country.area)
        .bind(&country.flag_url)
        .bind(country.latitude)
        .bind(country.longitude)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    pub async fn country_count(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as total FROM countries")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }

    /// All countries, ordered by name.
    pub async fn list_countries(&self) -> anyhow::Result<Vec<CountryListItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, code, code3, name, official_name, region, capital, flag_url, population
            FROM countries
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> anyhow::Result<CountryListItem> {
                Ok(CountryListItem {
                    id: row.try_get("id")?,
                    code: row.try_get("code")?,
                    code3: row.try_get("code3")?,
                    name: row.try_get("name")?,
                    official_name: row.try_get("official_name")?,
                    region: row.try_get("region")?,
                    capital: row.try_get("capital")?,
                    flag_url: row.try_get("flag_url")?,
                    population: row.try_get("population")?,
                })
            })
            .collect()
    }

    /// Resolve a country id, trying the alpha-2 code first, then alpha-3.
    pub async fn find_country_id(&self, code: &str) -> anyhow::Result<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        resolve_country_id(&mut conn, code).await
    }

    /// Load a country with every category record.
    ///
    /// # Returns
    ///
    /// `None` when neither code form matches.
    pub async fn load_country(&self, code: &str) -> anyhow::Result<Option<CountryRecord>> {
        let mut conn = self.pool.acquire().await?;
        let Some(id) = resolve_country_id(&mut conn, code).await? else {
            return Ok(None);
        };
        self.reads.fetch_add(1, Ordering::Relaxed);

        let row = sqlx::query("SELECT * FROM countries WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        let country = country_from_row(&row)?;

        let crime = load_category::<Crime>(&mut conn, id).await?;
        let crime_categories = if crime.is_some() {
            load_crime_categories(&mut conn, id).await?
        } else {
            Vec::new()
        };

        Ok(Some(CountryRecord {
            country,
            demographics: load_category(&mut conn, id).await?,
            economy: load_category(&mut conn, id).await?,
            military: load_category(&mut conn, id).await?,
            politics: load_category(&mut conn, id).await?,
            crime,
            crime_categories,
            health: load_category(&mut conn, id).await?,
            education: load_category(&mut conn, id).await?,
        }))
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Apply a merged update to one country.
    ///
    /// Each non-empty category is upserted. A supplied crime breakdown
    /// replaces the stored one (delete, then insert); an empty list is
    /// ignored. All writes for the country happen in one transaction.
    pub async fn apply_update(&self, update: &CountryDataUpdate) -> anyhow::Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(country_id) = resolve_country_id(&mut tx, &update.country_code).await? else {
            return Ok(ApplyOutcome::UnknownCountry);
        };

        upsert_if_present(&mut tx, country_id, update.demographics.as_ref()).await?;
        upsert_if_present(&mut tx, country_id, update.economy.as_ref()).await?;
        upsert_if_present(&mut tx, country_id, update.military.as_ref()).await?;
        upsert_if_present(&mut tx, country_id, update.politics.as_ref()).await?;
        upsert_if_present(&mut tx, country_id, update.health.as_ref()).await?;
        upsert_if_present(&mut tx, country_id, update.education.as_ref()).await?;

        let crime_id = upsert_if_present(&mut tx, country_id, update.crime.as_ref()).await?;
        if let Some(categories) = update.crime_categories.as_deref().filter(|c| !c.is_empty()) {
            let crime_id = match crime_id {
                Some(id) => id,
                // Categories without index fields still need a parent row.
                None => upsert_category(&mut tx, country_id, &Crime::default()).await?,
            };
            replace_crime_categories(&mut tx, crime_id, categories).await?;
        }

        tx.commit().await?;
        Ok(ApplyOutcome::Applied)
    }

    // ========================================================================
    // Sync logs
    // ========================================================================

    /// Append a sync log row.
    pub async fn insert_sync_log(&self, entry: &SyncLogEntry) -> anyhow::Result<i64> {
        let metadata = entry
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let row = sqlx::query(
            r#"
            INSERT INTO sync_logs (
                provider, status, records_count, error_message, duration_ms,
                started_at, completed_at, metadata
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&entry.provider)
        .bind(entry.status.as_str())
        .bind(entry.records_count)
        .bind(&entry.error_message)
        .bind(entry.duration_ms)
        .bind(entry.started_at.timestamp_millis())
        .bind(entry.completed_at.map(|t| t.timestamp_millis()))
        .bind(metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    /// Most recent sync log rows, newest first.
    pub async fn recent_sync_logs(&self, limit: u32) -> anyhow::Result<Vec<SyncLogRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, provider, status, records_count, error_message, duration_ms,
                   started_at, completed_at, metadata
            FROM sync_logs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(sync_log_from_row).collect()
    }

    // ========================================================================
    // Provider payload cache
    // ========================================================================

    /// Store a provider payload until `expires_at`, replacing any previous one.
    pub async fn store_payload(
        &self,
        provider: &str,
        endpoint: &str,
        payload: &serde_json::Value,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_payloads (provider, endpoint, payload, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(provider, endpoint) DO UPDATE SET
                payload = excluded.payload,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(provider)
        .bind(endpoint)
        .bind(serde_json::to_string(payload)?)
        .bind(expires_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a payload that has not expired at `now`.
    pub async fn cached_payload(
        &self,
        provider: &str,
        endpoint: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        let row = sqlx::query(
            r#"
            SELECT payload FROM provider_payloads
            WHERE provider = ? AND endpoint = ? AND expires_at > ?
            "#,
        )
        .bind(provider)
        .bind(endpoint)
        .bind(now.timestamp())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("payload");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // Summaries
    // ========================================================================

    pub async fn store_summary(
        &self,
        country_id: i64,
        summary: &StoredSummary,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ai_summaries (country_id, summary, model, tokens_used, generated_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(country_id)
        .bind(&summary.summary)
        .bind(&summary.model)
        .bind(summary.tokens_used)
        .bind(summary.generated_at.timestamp())
        .bind(summary.expires_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest summary for a country that is still valid at `now`.
    pub async fn latest_summary(
        &self,
        country_id: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<StoredSummary>> {
        let row = sqlx::query(
            r#"
            SELECT summary, model, tokens_used, generated_at, expires_at
            FROM ai_summaries
            WHERE country_id = ? AND expires_at > ?
            ORDER BY generated_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(country_id)
        .bind(now.timestamp())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> anyhow::Result<StoredSummary> {
            Ok(StoredSummary {
                summary: row.try_get("summary")?,
                model: row.try_get("model")?,
                tokens_used: row.try_get("tokens_used")?,
                generated_at: timestamp_secs(row.try_get("generated_at")?),
                expires_at: timestamp_secs(row.try_get("expires_at")?),
            })
        })
        .transpose()
    }
}

// ============================================================================
// Connection-level helpers (usable inside a transaction)
// ============================================================================

async fn resolve_country_id(
    conn: &mut SqliteConnection,
    code: &str,
) -> anyhow::Result<Option<i64>> {
    let code = code.trim().to_uppercase();

    let by_alpha2 = sqlx::query("SELECT id FROM countries WHERE code = ?")
        .bind(&code)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(row) = by_alpha2 {
        return Ok(Some(row.get("id")));
    }

    let by_alpha3 = sqlx::query("SELECT id FROM countries WHERE code3 = ?")
        .bind(&code)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(by_alpha3.map(|row| row.get("id")))
}

async fn load_category<T: CategoryRecord>(
    conn: &mut SqliteConnection,
    country_id: i64,
) -> anyhow::Result<Option<T>> {
    let sql = format!("SELECT * FROM {} WHERE country_id = ?", T::TABLE);
    let row = sqlx::query(&sql)
        .bind(country_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|row| T::from_row(&row)).transpose()?)
}

async fn load_crime_categories(
    conn: &mut SqliteConnection,
    country_id: i64,
) -> anyhow::Result<Vec<CrimeCategoryShare>> {
    let rows = sqlx::query(
        r#"
        SELECT cc.category, cc.percentage, cc.count
        FROM crime_categories cc
        JOIN crime c ON c.id = cc.crime_id
        WHERE c.country_id = ?
        ORDER BY cc.id ASC
        "#,
    )
    .bind(country_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> anyhow::Result<CrimeCategoryShare> {
            Ok(CrimeCategoryShare {
                category: row.try_get("category")?,
                percentage: row.try_get("percentage")?,
                count: row.try_get("count")?,
            })
        })
        .collect()
}

async fn upsert_if_present<T: CategoryRecord>(
    conn: &mut SqliteConnection,
    country_id: i64,
    record: Option<&T>,
) -> anyhow::Result<Option<i64>> {
    match record.filter(|r| !r.is_empty()) {
        Some(record) => Ok(Some(upsert_category(conn, country_id, record).await?)),
        None => Ok(None),
    }
}

/// Upsert one category row and return its id.
async fn upsert_category<T: CategoryRecord>(
    conn: &mut SqliteConnection,
    country_id: i64,
    record: &T,
) -> anyhow::Result<i64> {
    let sql = T::upsert_sql();
    let query = record.bind_values(sqlx::query(&sql).bind(country_id));
    let row = query
        .bind(Utc::now().timestamp())
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get("id"))
}

async fn replace_crime_categories(
    conn: &mut SqliteConnection,
    crime_id: i64,
    categories: &[CrimeCategoryShare],
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM crime_categories WHERE crime_id = ?")
        .bind(crime_id)
        .execute(&mut *conn)
        .await?;

    for entry in categories {
        sqlx::query(
            r#"
            INSERT INTO crime_categories (crime_id, category, percentage, count)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(crime_id)
        .bind(&entry.category)
        .bind(entry.percentage)
        .bind(entry.count)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

fn country_from_row(row: &SqliteRow) -> Result<Country, sqlx::Error> {
    Ok(Country {
        id: row.try_get("id")?,
        identity: NewCountry {
            code: row.try_get("code")?,
            code3: row.try_get::<Option<String>, _>("code3")?.unwrap_or_default(),
            name: row.try_get("name")?,
            official_name: row.try_get("official_name")?,
            region: row.try_get("region")?,
            subregion: row.try_get("subregion")?,
            capital: row.try_get("capital")?,
            population: row.try_get("population")?,
            area: row.try_get("area")?,
            flag_url: row.try_get("flag_url")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
        },
    })
}

fn sync_log_from_row(row: &SqliteRow) -> anyhow::Result<SyncLogRow> {
    let status: String = row.try_get("status")?;
    let metadata: Option<String> = row.try_get("metadata")?;

    Ok(SyncLogRow {
        id: row.try_get("id")?,
        entry: SyncLogEntry {
            provider: row.try_get("provider")?,
            status: SyncStatus::parse(&status)
                .ok_or_else(|| anyhow::anyhow!("unknown sync status '{status}'"))?,
            records_count: row.try_get("records_count")?,
            error_message: row.try_get("error_message")?,
            duration_ms: row.try_get("duration_ms")?,
            started_at: timestamp_millis(row.try_get("started_at")?),
            completed_at: row
                .try_get::<Option<i64>, _>("completed_at")?
                .map(timestamp_millis),
            metadata: metadata.map(|m| serde_json::from_str(&m)).transpose()?,
        },
    })
}

fn timestamp_secs(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

fn timestamp_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn create_test_storage() -> Storage {
        Storage::new("sqlite::memory:").await.unwrap()
    }

    fn germany() -> NewCountry {
        NewCountry {
            code: "DE".into(),
            code3: "DEU".into(),
            name: "Germany".into(),
            official_name: Some("Federal Republic of Germany".into()),
            region: Some("Europe".into()),
            subregion: Some("Western Europe".into()),
            capital: Some("Berlin".into()),
            population: Some(84_552_242),
            area: Some(357_022.0),
            flag_url: Some("https://flagcdn.com/w320/de.png".into()),
            latitude: Some(52.52),
            longitude: Some(13.405),
        }
    }

    #[tokio::test]
    async fn test_country_lookup_by_either_code() {
        let storage = create_test_storage().await;
        let id = storage.insert_country(&germany()).await.unwrap();

        assert_eq!(storage.find_country_id("DE").await.unwrap(), Some(id));
        assert_eq!(storage.find_country_id("deu").await.unwrap(), Some(id));
        assert_eq!(storage.find_country_id("XX").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_keeps_fields_not_supplied() {
        let storage = create_test_storage().await;
        storage.insert_country(&germany()).await.unwrap();

        let mut first = CountryDataUpdate::new("DEU");
        first.economy = Some(Economy {
            gdp: Some(4.08e12),
            inflation: Some(5.9),
            ..Default::default()
        });
        storage.apply_update(&first).await.unwrap();

        let mut second = CountryDataUpdate::new("DE");
        second.economy = Some(Economy {
            inflation: Some(2.2),
            currency_code: Some("EUR".into()),
            ..Default::default()
        });
        storage.apply_update(&second).await.unwrap();

        let record = storage.load_country("DE").await.unwrap().unwrap();
        let economy = record.economy.unwrap();
        assert_eq!(economy.gdp, Some(4.08e12));
        assert_eq!(economy.inflation, Some(2.2));
        assert_eq!(economy.currency_code.as_deref(), Some("EUR"));
    }

    #[tokio::test]
    async fn test_crime_categories_replaced_wholesale() {
        let storage = create_test_storage().await;
        storage.insert_country(&germany()).await.unwrap();

        let mut before = CountryDataUpdate::new("DE");
        before.crime = Some(Crime {
            crime_index: Some(35.8),
            ..Default::default()
        });
        before.crime_categories = Some(vec![
            CrimeCategoryShare::new("A", 40.0),
            CrimeCategoryShare::new("B", 60.0),
        ]);
        storage.apply_update(&before).await.unwrap();

        let mut after = CountryDataUpdate::new("DE");
        after.crime_categories = Some(vec![CrimeCategoryShare::new("C", 100.0)]);
        storage.apply_update(&after).await.unwrap();

        let record = storage.load_country("DE").await.unwrap().unwrap();
        assert_eq!(record.crime_categories, vec![CrimeCategoryShare::new("C", 100.0)]);
        assert_eq!(record.crime.unwrap().crime_index, Some(35.8));
    }

    #[tokio::test]
    async fn test_empty_crime_category_list_is_ignored() {
        let storage = create_test_storage().await;
        storage.insert_country(&germany()).await.unwrap();

        let mut seed = CountryDataUpdate::new("DE");
        seed.crime_categories = Some(vec![CrimeCategoryShare::new("Theft", 45.0)]);
        storage.apply_update(&seed).await.unwrap();

        let mut empty = CountryDataUpdate::new("DE");
        empty.crime_categories = Some(vec![]);
        storage.apply_update(&empty).await.unwrap();

        let record = storage.load_country("DE").await.unwrap().unwrap();
        assert_eq!(record.crime_categories.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_country_is_reported() {
        let storage = create_test_storage().await;
        let mut update = CountryDataUpdate::new("ZZZ");
        update.health = Some(Health {
            smoking_rate: Some(1.0),
            ..Default::default()
        });

        let outcome = storage.apply_update(&update).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::UnknownCountry);
    }

    #[tokio::test]
    async fn test_gdp_history_and_dates_persist() {
        let storage = create_test_storage().await;
        storage.insert_country(&germany()).await.unwrap();

        let mut update = CountryDataUpdate::new("DE");
        update.economy = Some(Economy {
            gdp_growth_history: Some(sqlx::types::Json(vec![
                crate::model::YearValue { year: 2022, value: 48_398.0 },
                crate::model::YearValue { year: 2023, value: 52_746.0 },
            ])),
            ..Default::default()
        });
        update.politics = Some(Politics {
            independence_date: chrono::NaiveDate::from_ymd_opt(1990, 10, 3),
            is_eu: Some(true),
            ..Default::default()
        });
        storage.apply_update(&update).await.unwrap();

        let record = storage.load_country("DE").await.unwrap().unwrap();
        let history = record.economy.unwrap().gdp_growth_history.unwrap();
        assert_eq!(history.0.len(), 2);
        assert_eq!(history.0[1].year, 2023);

        let politics = record.politics.unwrap();
        assert_eq!(politics.independence_date, chrono::NaiveDate::from_ymd_opt(1990, 10, 3));
        assert_eq!(politics.is_eu, Some(true));
        assert_eq!(politics.is_nato, None);
    }

    #[tokio::test]
    async fn test_list_orders_by_name() {
        let storage = create_test_storage().await;
        storage.insert_country(&germany()).await.unwrap();
        storage
            .insert_country(&NewCountry {
                code: "AU".into(),
                code3: "AUS".into(),
                name: "Australia".into(),
                ..germany()
            })
            .await
            .unwrap();

        let list = storage.list_countries().await.unwrap();
        let names: Vec<_> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Australia", "Germany"]);
    }

    #[tokio::test]
    async fn test_sync_logs_are_appended() {
        let storage = create_test_storage().await;
        let started_at = Utc::now();

        storage
            .insert_sync_log(&SyncLogEntry::started("who", started_at))
            .await
            .unwrap();
        storage
            .insert_sync_log(&SyncLogEntry::finished(
                "who",
                SyncStatus::Success,
                10,
                None,
                started_at,
            ))
            .await
            .unwrap();

        let logs = storage.recent_sync_logs(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].entry.status, SyncStatus::Success);
        assert_eq!(logs[0].entry.records_count, 10);
        assert_eq!(logs[1].entry.status, SyncStatus::Started);
    }

    #[tokio::test]
    async fn test_payload_cache_honours_expiry() {
        let storage = create_test_storage().await;
        let now = Utc::now();
        let payload = serde_json::json!([{"countryCode": "USA"}]);

        storage
            .store_payload("un", "all", &payload, now + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(storage.cached_payload("un", "all", now).await.unwrap(), Some(payload));
        assert_eq!(
            storage
                .cached_payload("un", "all", now + Duration::hours(2))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_load_counts_reads() {
        let storage = create_test_storage().await;
        storage.insert_country(&germany()).await.unwrap();

        assert_eq!(storage.country_reads(), 0);
        storage.load_country("DE").await.unwrap();
        storage.load_country("XX").await.unwrap();
        assert_eq!(storage.country_reads(), 1);
    }
}
