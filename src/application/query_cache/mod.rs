//! Process-wide cache of query results.
//!
//! Entries are keyed by [`QueryKey`]. A fresh entry is served without calling
//! the fetcher; a missing, stale or invalidated entry is refetched. Concurrent
//! fetches of one key share a single fetcher call. Invalidation keeps the last
//! data around so readers never see an empty feed while a refetch runs.

mod lock;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chirp_api_types::{DehydratedQuery, DehydratedState, FeedEntryDto};
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::domain::entities::FeedEntry;

use self::lock::{rw_read, rw_write};

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    PostsGetAll,
}

impl QueryKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKey::PostsGetAll => chirp_api_types::procedures::POSTS_GET_ALL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Posts(Arc<Vec<FeedEntry>>),
}

impl QueryData {
    pub fn as_posts(&self) -> Option<&Arc<Vec<FeedEntry>>> {
        match self {
            QueryData::Posts(posts) => Some(posts),
        }
    }

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            QueryData::Posts(posts) => {
                let dtos: Vec<FeedEntryDto> = posts.iter().map(FeedEntryDto::from).collect();
                serde_json::to_value(dtos)
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("query `{key}` failed: {message}")]
pub struct QueryError {
    pub key: &'static str,
    pub message: String,
}

/// Read-only view of one cache entry.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    pub data: Option<QueryData>,
    pub error: Option<QueryError>,
    pub is_stale: bool,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug)]
struct Entry {
    data: Option<QueryData>,
    error: Option<QueryError>,
    fetched_at: Instant,
    updated_at: OffsetDateTime,
    invalidated: bool,
    version: u64,
    /// Invalidation generation current when the fetch behind this entry started.
    generation: u64,
}

impl Entry {
    fn is_fresh(&self, stale_after: Duration, now: Instant) -> bool {
        !self.invalidated && self.data.is_some() && now.duration_since(self.fetched_at) < stale_after
    }
}

/// Entries plus a per-key invalidation counter. The counter lives outside the
/// entries so invalidating a key that has never been fetched still counts.
#[derive(Debug, Default)]
struct Table {
    entries: HashMap<QueryKey, Entry>,
    generations: HashMap<QueryKey, u64>,
}

impl Table {
    fn generation(&self, key: QueryKey) -> u64 {
        self.generations.get(&key).copied().unwrap_or(0)
    }
}

/// What a caller saw before queueing behind the key's flight.
#[derive(Debug, Clone, Copy)]
struct Observed {
    version: u64,
    generation: u64,
}

#[derive(Debug)]
pub struct QueryClient {
    stale_after: Duration,
    table: RwLock<Table>,
    flights: RwLock<HashMap<QueryKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}

impl QueryClient {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            stale_after,
            table: RwLock::new(Table::default()),
            flights: RwLock::new(HashMap::new()),
        }
    }

    /// Return cached data for `key` when fresh, otherwise run `fetcher` once
    /// for all concurrent callers and store its outcome.
    ///
    /// A caller that queued behind another flight only reuses that flight's
    /// result when the flight started after the last invalidation this caller
    /// saw.
    pub async fn fetch<F, Fut, E>(&self, key: QueryKey, fetcher: F) -> Result<QueryData, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<QueryData, E>>,
        E: std::fmt::Display,
    {
        let observed = match self.fresh_or_observed(key) {
            Ok(data) => {
                counter!("chirp_query_cache_hit_total", "key" => key.as_str()).increment(1);
                return Ok(data);
            }
            Err(observed) => observed,
        };

        let flight = self.flight(key);
        let _permit = flight.lock().await;

        // Another caller may have finished the fetch while this one waited.
        if let Some(settled) = self.settled_since(key, observed) {
            counter!("chirp_query_cache_hit_total", "key" => key.as_str()).increment(1);
            return settled;
        }

        counter!("chirp_query_cache_miss_total", "key" => key.as_str()).increment(1);
        let started = rw_read(&self.table, "start").generation(key);
        let outcome = fetcher().await.map_err(|err| QueryError {
            key: key.as_str(),
            message: err.to_string(),
        });
        self.store(key, started, &outcome);
        outcome
    }

    /// Warm `key` without surfacing failures; they stay recorded on the entry.
    pub async fn prefetch<F, Fut, E>(&self, key: QueryKey, fetcher: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<QueryData, E>>,
        E: std::fmt::Display,
    {
        if let Err(err) = self.fetch(key, fetcher).await {
            debug!(target = "chirp::query_cache", key = key.as_str(), error = %err, "prefetch failed");
        }
    }

    pub fn get(&self, key: QueryKey) -> Option<QuerySnapshot> {
        let table = rw_read(&self.table, "get");
        let now = Instant::now();
        table.entries.get(&key).map(|entry| QuerySnapshot {
            data: entry.data.clone(),
            error: entry.error.clone(),
            is_stale: !entry.is_fresh(self.stale_after, now),
            updated_at: entry.updated_at,
        })
    }

    /// Mark `key` stale so the next read refetches, including reads that
    /// queue behind a fetch already in flight. Returns whether an entry
    /// existed.
    pub fn invalidate(&self, key: QueryKey) -> bool {
        let mut table = rw_write(&self.table, "invalidate");
        counter!("chirp_query_cache_invalidate_total", "key" => key.as_str()).increment(1);
        *table.generations.entry(key).or_insert(0) += 1;
        match table.entries.get_mut(&key) {
            Some(entry) => {
                entry.invalidated = true;
                true
            }
            None => false,
        }
    }

    /// Serialize every entry that holds data, ordered by key.
    pub fn dehydrate(&self) -> Result<DehydratedState, serde_json::Error> {
        let table = rw_read(&self.table, "dehydrate");
        let mut queries = Vec::new();
        for (key, entry) in table.entries.iter() {
            let Some(data) = &entry.data else {
                continue;
            };
            queries.push(DehydratedQuery {
                key: key.as_str().to_string(),
                data: data.to_json()?,
                updated_at: entry.updated_at,
            });
        }
        queries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(DehydratedState { queries })
    }

    fn fresh_or_observed(&self, key: QueryKey) -> Result<QueryData, Observed> {
        let table = rw_read(&self.table, "lookup");
        let generation = table.generation(key);
        let version = match table.entries.get(&key) {
            Some(entry) if entry.is_fresh(self.stale_after, Instant::now()) => {
                if let Some(data) = &entry.data {
                    return Ok(data.clone());
                }
                entry.version
            }
            Some(entry) => entry.version,
            None => 0,
        };
        Err(Observed { version, generation })
    }

    fn settled_since(&self, key: QueryKey, observed: Observed) -> Option<Result<QueryData, QueryError>> {
        let table = rw_read(&self.table, "recheck");
        let entry = table.entries.get(&key)?;
        if entry.version <= observed.version || entry.generation < observed.generation {
            return None;
        }
        match (&entry.error, &entry.data) {
            (Some(err), _) => Some(Err(err.clone())),
            (None, Some(data)) => Some(Ok(data.clone())),
            (None, None) => None,
        }
    }

    fn store(&self, key: QueryKey, started: u64, outcome: &Result<QueryData, QueryError>) {
        let mut table = rw_write(&self.table, "store");
        let invalidated_meanwhile = table.generation(key) != started;
        let previous = table.entries.remove(&key);
        let version = previous.as_ref().map_or(0, |entry| entry.version) + 1;
        let entry = match outcome {
            Ok(data) => Entry {
                data: Some(data.clone()),
                error: None,
                fetched_at: Instant::now(),
                updated_at: OffsetDateTime::now_utc(),
                invalidated: invalidated_meanwhile,
                version,
                generation: started,
            },
            Err(err) => {
                warn!(target = "chirp::query_cache", key = key.as_str(), error = %err, "query fetch failed");
                match previous {
                    Some(previous) => Entry {
                        error: Some(err.clone()),
                        invalidated: previous.invalidated || invalidated_meanwhile,
                        version,
                        generation: started,
                        ..previous
                    },
                    None => Entry {
                        data: None,
                        error: Some(err.clone()),
                        fetched_at: Instant::now(),
                        updated_at: OffsetDateTime::now_utc(),
                        invalidated: invalidated_meanwhile,
                        version,
                        generation: started,
                    },
                }
            }
        };
        if invalidated_meanwhile {
            debug!(target = "chirp::query_cache", key = key.as_str(), "invalidated during fetch, kept stale");
        }
        table.entries.insert(key, entry);
    }

    fn flight(&self, key: QueryKey) -> Arc<tokio::sync::Mutex<()>> {
        if let Some(flight) = rw_read(&self.flights, "flight").get(&key) {
            return Arc::clone(flight);
        }
        let mut flights = rw_write(&self.flights, "flight");
        Arc::clone(flights.entry(key).or_default())
    }
}
