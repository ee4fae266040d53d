//! Prose country summaries.
//!
//! Summaries come from an OpenAI-compatible chat completion endpoint and are
//! kept in two places: the view cache and the `ai_summaries` table. When no
//! API key is configured, or the call fails for any reason, a summary is
//! composed locally from the stored statistics instead. Local summaries are
//! never cached so a later call can still reach the model.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::country::{CountryService, CountryView};
use super::{Lookup, normalize_code};
use crate::cache::Cache;
use crate::config::SummaryModelConfig;
use crate::error::ApiResult;
use crate::storage::{Storage, StoredSummary};

/// How long a generated summary stays valid in storage.
const STORED_SUMMARY_HOURS: i64 = 24;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u32 = 500;

pub const FALLBACK_MODEL: &str = "fallback";

const SYSTEM_PROMPT: &str = "You are a factual data analyst. Summarize country statistics in 5-7 \
clear, factual sentences. Use only the data provided. Do not invent data. Focus on key \
highlights: population, economy, military ranking, and notable characteristics. Write in an \
informative, neutral tone.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySummary {
    pub summary: String,
    pub model: String,
    pub tokens_used: Option<i64>,
    pub generated_at: DateTime<Utc>,
}

impl From<StoredSummary> for CountrySummary {
    fn from(stored: StoredSummary) -> Self {
        Self {
            summary: stored.summary,
            model: stored.model,
            tokens_used: stored.tokens_used,
            generated_at: stored.generated_at,
        }
    }
}

#[derive(Clone)]
pub struct SummaryService {
    storage: Storage,
    countries: CountryService,
    cache: Cache,
    ttl: Duration,
    client: Option<ChatClient>,
}

impl SummaryService {
    pub fn new(
        storage: Storage,
        countries: CountryService,
        cache: Cache,
        ttl: Duration,
        model: SummaryModelConfig,
    ) -> Self {
        let client = model.api_key.map(|api_key| ChatClient {
            http: reqwest::Client::new(),
            base_url: model.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.model,
        });
        Self {
            storage,
            countries,
            cache,
            ttl,
            client,
        }
    }

    /// Summary for a country by alpha-2 or alpha-3 code.
    ///
    /// Lookup order: view cache, unexpired stored summary, model call,
    /// local fallback. Fails only with `NotFound` or a storage error.
    pub async fn summary(&self, code: &str) -> ApiResult<Lookup<CountrySummary>> {
        let code = normalize_code(code);
        let key = format!("ai:summary:{code}");

        if let Some(data) = self.cache.get::<CountrySummary>(&key).await {
            return Ok(Lookup { data, cached: true });
        }

        let country_id = self.storage.find_country_id(&code).await?;
        if let Some(id) = country_id {
            if let Some(stored) = self.storage.latest_summary(id, Utc::now()).await? {
                debug!(code = %code, "Serving stored summary");
                let data = CountrySummary::from(stored);
                self.cache.set(&key, &data, Some(self.ttl)).await;
                return Ok(Lookup { data, cached: false });
            }
        }

        let view = self.countries.get(&code).await?.data;

        let Some(client) = &self.client else {
            return Ok(fallback_lookup(&view));
        };

        let completion = match client.complete(&build_prompt(&view)).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(code = %code, error = %format!("{e:#}"), "Summary generation failed, using fallback");
                return Ok(fallback_lookup(&view));
            }
        };

        let generated_at = Utc::now();
        let data = CountrySummary {
            summary: completion.text,
            model: client.model.clone(),
            tokens_used: completion.tokens_used,
            generated_at,
        };
        info!(code = %code, model = %data.model, tokens = ?data.tokens_used, "Summary generated");

        if let Some(id) = country_id {
            let stored = StoredSummary {
                summary: data.summary.clone(),
                model: data.model.clone(),
                tokens_used: data.tokens_used,
                generated_at,
                expires_at: generated_at + chrono::Duration::hours(STORED_SUMMARY_HOURS),
            };
            if let Err(e) = self.storage.store_summary(id, &stored).await {
                warn!(code = %code, error = %e, "Failed to store summary");
            }
        }
        self.cache.set(&key, &data, Some(self.ttl)).await;

        Ok(Lookup {
            data,
            cached: false,
        })
    }
}

fn fallback_lookup(view: &CountryView) -> Lookup<CountrySummary> {
    Lookup {
        data: CountrySummary {
            summary: fallback_summary(view),
            model: FALLBACK_MODEL.to_string(),
            tokens_used: None,
            generated_at: Utc::now(),
        },
        cached: false,
    }
}

// ============================================================================
// Chat completion client
// ============================================================================

#[derive(Clone)]
struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

struct Completion {
    text: String,
    tokens_used: Option<i64>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: i64,
}

impl ChatClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<Completion> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("completion contained no text"))?;

        Ok(Completion {
            text: text.trim().to_string(),
            tokens_used: response.usage.map(|u| u.total_tokens),
        })
    }
}

// ============================================================================
// Prompt and fallback text
// ============================================================================

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn yes_no(value: Option<bool>) -> &'static str {
    if value.unwrap_or(false) { "Yes" } else { "No" }
}

fn build_prompt(view: &CountryView) -> String {
    let c = &view.categories;
    let name = &view.country;
    format!(
        "Summarize the following country data for {name}:\n\n\
         DEMOGRAPHICS:\n\
         - Population: {population}\n\
         - Life Expectancy: {life} years\n\
         - Median Age: {median} years\n\
         - Male/Female Ratio: {ratio}\n\
         - Urban Population: {urban}%\n\n\
         ECONOMY:\n\
         - GDP: ${gdp}\n\
         - GDP Per Capita: ${gdp_pc}\n\
         - GDP Growth: {growth}%\n\
         - Unemployment: {unemployment}%\n\
         - Inflation: {inflation}%\n\n\
         MILITARY:\n\
         - Global Ranking: {rank}\n\
         - Active Soldiers: {soldiers}\n\
         - NATO Member: {nato}\n\
         - Nuclear Weapons: {nuclear}\n\n\
         POLITICAL:\n\
         - Government Type: {government}\n\
         - EU Member: {eu}\n\
         - Passport Ranking: {passport}\n\n\
         CRIME:\n\
         - Crime Index: {crime}\n\
         - Safety Index: {safety}\n\n\
         HEALTH:\n\
         - Smoking Rate: {smoking}%\n\
         - Alcohol Dependency: {alcohol}%\n\
         - Drug Use: {drugs}%\n\n\
         Please provide a concise, factual summary of {name} in 5-7 sentences.",
        population = or_na(c.demographics.total_population.map(|p| thousands(p as f64))),
        life = or_na(c.demographics.life_expectancy),
        median = or_na(c.demographics.median_age),
        ratio = or_na(c.demographics.male_female_ratio.as_deref()),
        urban = or_na(c.demographics.urban_population_percent),
        gdp = or_na(c.economy.gdp.map(thousands)),
        gdp_pc = or_na(c.economy.gdp_per_capita.map(thousands)),
        growth = or_na(c.economy.gdp_growth_rate),
        unemployment = or_na(c.economy.unemployment_rate),
        inflation = or_na(c.economy.inflation),
        rank = or_na(c.military.global_rank),
        soldiers = or_na(c.military.active_soldiers.map(|s| thousands(s as f64))),
        nato = yes_no(c.military.is_nato_member),
        nuclear = yes_no(c.military.nuclear_weapons),
        government = or_na(c.political.government_type.as_deref()),
        eu = yes_no(c.political.is_eu),
        passport = or_na(c.political.passport_ranking),
        crime = or_na(c.crime.stats.crime_index),
        safety = or_na(c.crime.stats.safety_index),
        smoking = or_na(c.health.smoking_rate),
        alcohol = or_na(c.health.alcohol_dependency_rate),
        drugs = or_na(c.health.drug_use_rate),
    )
}

/// A summary composed from whatever statistics are known.
pub fn fallback_summary(view: &CountryView) -> String {
    let c = &view.categories;
    let name = &view.country;
    let mut parts = Vec::new();

    if let Some(population) = c.demographics.total_population.filter(|p| *p > 0) {
        parts.push(format!(
            "{name} has a population of approximately {:.1} million people.",
            population as f64 / 1_000_000.0
        ));
    }
    if let Some(gdp_per_capita) = c.economy.gdp_per_capita.filter(|v| *v != 0.0) {
        parts.push(format!(
            "The country's GDP per capita stands at ${}.",
            thousands(gdp_per_capita)
        ));
    }
    if let Some(rank) = c.military.global_rank.filter(|r| *r > 0) {
        parts.push(format!("It ranks {} globally in military power.", ordinal(rank)));
    }
    if let Some(government) = c.political.government_type.as_deref().filter(|g| !g.is_empty()) {
        parts.push(format!("The government operates as a {government}."));
    }

    let memberships: Vec<&str> = [
        (c.political.is_eu, "EU"),
        (c.military.is_nato_member, "NATO"),
        (c.political.is_g7, "G7"),
        (c.political.is_g20, "G20"),
    ]
    .into_iter()
    .filter(|(member, _)| member.unwrap_or(false))
    .map(|(_, label)| label)
    .collect();
    if !memberships.is_empty() {
        parts.push(format!("{name} is a member of {}.", memberships.join(", ")));
    }

    if let Some(safety) = c.crime.stats.safety_index.filter(|s| *s != 0.0) {
        let level = if safety > 60.0 {
            "relatively safe"
        } else if safety > 40.0 {
            "moderately safe"
        } else {
            "challenging in terms of safety"
        };
        parts.push(format!(
            "The country is considered {level} with a safety index of {safety:.1}."
        ));
    }
    if let Some(rank) = c.political.passport_ranking.filter(|r| *r > 0) {
        parts.push(format!(
            "Its passport ranks {} in the world for travel freedom.",
            ordinal(rank)
        ));
    }

    if parts.is_empty() {
        format!("{name} is a sovereign nation. Detailed statistics are being updated.")
    } else {
        parts.join(" ")
    }
}

/// `1st`, `2nd`, `3rd`, `11th`, `22nd`, ...
fn ordinal(n: i64) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Whole units with comma thousands separators.
fn thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::model::{CountryDataUpdate, Crime, Economy, Military, Politics};
    use crate::seed;

    fn model_config(api_key: Option<&str>, base_url: &str) -> SummaryModelConfig {
        SummaryModelConfig {
            api_key: api_key.map(str::to_string),
            model: "gpt-4o".to_string(),
            base_url: base_url.to_string(),
        }
    }

    async fn service(model: SummaryModelConfig) -> (SummaryService, Storage) {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        seed::seed_if_empty(&storage).await.unwrap();
        let cache = Cache::memory();
        let countries = CountryService::new(storage.clone(), cache.clone(), Duration::from_secs(60));
        let service = SummaryService::new(
            storage.clone(),
            countries,
            cache,
            Duration::from_secs(60),
            model,
        );
        (service, storage)
    }

    #[test]
    fn test_ordinal_suffixes() {
        let rendered: Vec<String> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 101, 111, 112]
            .into_iter()
            .map(ordinal)
            .collect();
        assert_eq!(
            rendered,
            vec!["1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "101st", "111th", "112th"]
        );
    }

    #[test]
    fn test_thousands_separator() {
        assert_eq!(thousands(76_329.58), "76,330");
        assert_eq!(thousands(999.0), "999");
        assert_eq!(thousands(1_000.0), "1,000");
        assert_eq!(thousands(-1_234_567.0), "-1,234,567");
    }

    #[tokio::test]
    async fn test_fallback_for_country_without_statistics() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        storage
            .insert_country(&crate::model::NewCountry {
                code: "ZZ".into(),
                code3: "ZZZ".into(),
                name: "Zedland".into(),
                official_name: None,
                region: None,
                subregion: None,
                capital: None,
                population: None,
                area: None,
                flag_url: None,
                latitude: None,
                longitude: None,
            })
            .await
            .unwrap();
        let countries = CountryService::new(storage, Cache::memory(), Duration::from_secs(60));

        let view = countries.get("ZZ").await.unwrap().data;
        assert_eq!(
            fallback_summary(&view),
            "Zedland is a sovereign nation. Detailed statistics are being updated."
        );
    }

    #[tokio::test]
    async fn test_fallback_sentences() {
        let (service, storage) = service(model_config(None, "http://unused")).await;
        storage
            .apply_update(&CountryDataUpdate {
                economy: Some(Economy {
                    gdp_per_capita: Some(48_717.0),
                    ..Default::default()
                }),
                military: Some(Military {
                    global_rank: Some(22),
                    is_nato_member: Some(true),
                    ..Default::default()
                }),
                politics: Some(Politics {
                    government_type: Some("federal parliamentary republic".into()),
                    passport_ranking: Some(3),
                    ..Default::default()
                }),
                crime: Some(Crime {
                    safety_index: Some(64.62),
                    ..Default::default()
                }),
                ..CountryDataUpdate::new("DE")
            })
            .await
            .unwrap();

        let summary = service.summary("de").await.unwrap();
        assert!(!summary.cached);
        assert_eq!(summary.data.model, FALLBACK_MODEL);

        let text = summary.data.summary;
        assert!(text.contains("GDP per capita stands at $48,717."));
        assert!(text.contains("It ranks 22nd globally in military power."));
        assert!(text.contains("The government operates as a federal parliamentary republic."));
        assert!(text.contains("NATO"));
        assert!(text.contains("relatively safe with a safety index of 64.6."));
        assert!(text.contains("Its passport ranks 3rd in the world"));
    }

    #[tokio::test]
    async fn test_fallback_is_not_cached() {
        let (service, _) = service(model_config(None, "http://unused")).await;
        assert!(!service.summary("FR").await.unwrap().cached);
        assert!(!service.summary("FR").await.unwrap().cached);
    }

    #[tokio::test]
    async fn test_unreachable_model_falls_back() {
        let (service, _) = service(model_config(Some("sk-test"), "http://127.0.0.1:9/v1")).await;
        let summary = service.summary("JP").await.unwrap();
        assert_eq!(summary.data.model, FALLBACK_MODEL);
    }

    #[tokio::test]
    async fn test_stored_summary_is_reused() {
        let (service, storage) = service(model_config(None, "http://unused")).await;
        let id = storage.find_country_id("FR").await.unwrap().unwrap();
        let now = Utc::now();
        storage
            .store_summary(
                id,
                &StoredSummary {
                    summary: "France is a republic.".into(),
                    model: "gpt-4o".into(),
                    tokens_used: Some(120),
                    generated_at: now,
                    expires_at: now + chrono::Duration::hours(1),
                },
            )
            .await
            .unwrap();

        // Read from the table, not the view cache.
        let first = service.summary("FRA").await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.data.summary, "France is a republic.");
        assert_eq!(first.data.tokens_used, Some(120));

        // Now also in the view cache.
        let second = service.summary("FRA").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.data.model, "gpt-4o");
    }

    #[tokio::test]
    async fn test_unknown_country() {
        let (service, _) = service(model_config(None, "http://unused")).await;
        assert!(matches!(
            service.summary("QQ").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
