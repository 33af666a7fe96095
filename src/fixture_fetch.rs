use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::FootballConfig;
use crate::fixtures::{Fixture, parse_fixtures_json};
use crate::http_client::http_client;
use crate::persist::{cache_path, load_json, now_secs, save_json_atomic};

const CACHE_VERSION: u32 = 1;
const CACHE_FILE: &str = "fixtures.json";
/// Past days kept on disk; older schedules are dropped on the next save.
const KEEP_PAST_DAYS: i64 = 7;

static CACHE: Mutex<Option<FixtureCacheFile>> = Mutex::new(None);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct FixtureCacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    fetched_at: u64,
    fixtures: Vec<Fixture>,
}

pub fn cache_key(date: NaiveDate) -> String {
    format!("fixtures_{}", date.format("%Y-%m-%d"))
}

fn key_date(key: &str) -> Option<NaiveDate> {
    let raw = key.strip_prefix("fixtures_")?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Whether a cache key should survive a save made on `today`.
pub fn is_key_retained(key: &str, today: NaiveDate) -> bool {
    key_date(key).is_some_and(|date| (today - date).num_days() <= KEEP_PAST_DAYS)
}

/// Schedules of other days are frozen; today's is only trusted inside the freshness window.
pub fn is_cache_usable(age: Duration, is_today: bool, window: Duration) -> bool {
    !is_today || age < window
}

/// Fixtures for `date`, from the cache when usable, otherwise from the provider.
pub fn fetch_daily_fixtures(
    cfg: &FootballConfig,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<Fixture>> {
    let key = cache_key(date);
    let window = Duration::from_secs(cfg.cache_minutes * 60);
    if let Some(entry) = cached_entry(&key) {
        let age = Duration::from_secs(now_secs().saturating_sub(entry.fetched_at));
        if is_cache_usable(age, date == today, window) {
            info!(%key, fixtures = entry.fixtures.len(), "fixtures served from cache");
            return Ok(entry.fixtures);
        }
    }

    info!(%key, "fetching fixtures from provider");
    let fixtures = fetch_from_provider(cfg, date)?;
    store_entry(
        &key,
        CacheEntry {
            fetched_at: now_secs(),
            fixtures: fixtures.clone(),
        },
        today,
    );
    Ok(fixtures)
}

/// Drops one date so the next fetch goes to the provider.
pub fn clear_cache_for_date(date: NaiveDate) {
    let key = cache_key(date);
    with_cache(|cache| {
        cache.entries.remove(&key);
    });
    info!(%key, "fixture cache entry cleared");
}

fn fetch_from_provider(cfg: &FootballConfig, date: NaiveDate) -> Result<Vec<Fixture>> {
    let api_key = cfg
        .api_key
        .as_deref()
        .context("FOOTBALL_API_KEY is not set")?;
    let client = http_client()?;
    let url = format!(
        "https://{}/v3/fixtures?date={}&timezone={}",
        cfg.host,
        date.format("%Y-%m-%d"),
        cfg.timezone
    );

    let resp = client
        .get(&url)
        .header(USER_AGENT, "Mozilla/5.0")
        .header("x-rapidapi-key", api_key)
        .header("x-rapidapi-host", &cfg.host)
        .send()
        .context("request failed")?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }
    parse_fixtures_json(&body)
}

fn cached_entry(key: &str) -> Option<CacheEntry> {
    let mut guard = CACHE.lock().ok()?;
    let cache = guard.get_or_insert_with(load_cache_file);
    cache.entries.get(key).cloned()
}

fn store_entry(key: &str, entry: CacheEntry, today: NaiveDate) {
    with_cache(|cache| {
        let before = cache.entries.len();
        cache.entries.retain(|k, _| is_key_retained(k, today));
        let pruned = before - cache.entries.len();
        if pruned > 0 {
            info!(pruned, "old fixture cache entries dropped");
        }
        cache.entries.insert(key.to_string(), entry);
    });
}

fn with_cache(f: impl FnOnce(&mut FixtureCacheFile)) {
    let Ok(mut guard) = CACHE.lock() else {
        warn!("fixture cache lock poisoned");
        return;
    };
    let cache = guard.get_or_insert_with(load_cache_file);
    cache.version = CACHE_VERSION;
    f(cache);
    if let Some(path) = cache_file_path()
        && let Err(err) = save_json_atomic(&path, &*cache)
    {
        warn!(error = %err, "failed to persist fixture cache");
    }
}

fn load_cache_file() -> FixtureCacheFile {
    let Some(path) = cache_file_path() else {
        return FixtureCacheFile::default();
    };
    let cache = load_json::<FixtureCacheFile>(&path).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return FixtureCacheFile::default();
    }
    cache
}

fn cache_file_path() -> Option<PathBuf> {
    cache_path(CACHE_FILE)
}
