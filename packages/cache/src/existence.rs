//! Year-keyed cache of the sites that already have a boundary.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// A single cached listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Year the listing is for.
    pub year: i32,
    /// Sites that had a boundary when the listing was fetched.
    pub site_ids_with_boundary: BTreeSet<i64>,
    /// When the listing was fetched.
    pub fetched_at: DateTime<Utc>,
    /// How long the listing stays fresh.
    pub ttl: TimeDelta,
}

impl CacheEntry {
    /// Returns `true` if the entry is still within its TTL at `now`.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.fetched_at) < self.ttl
    }
}

/// Holds at most one [`CacheEntry`]; a fetch for another year replaces it.
#[derive(Debug, Clone)]
pub struct BoundaryExistenceCache {
    ttl: TimeDelta,
    entry: Option<CacheEntry>,
}

impl BoundaryExistenceCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            entry: None,
        }
    }

    /// Returns the configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Returns the current entry regardless of freshness.
    #[must_use]
    pub const fn entry(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    /// Returns `true` if a fresh entry exists for `year`.
    #[must_use]
    pub fn is_valid(&self, year: i32) -> bool {
        self.is_valid_at(year, Utc::now())
    }

    /// Returns `true` if a fresh entry exists for `year` at `now`.
    #[must_use]
    pub fn is_valid_at(&self, year: i32, now: DateTime<Utc>) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|entry| entry.year == year && entry.is_fresh_at(now))
    }

    /// Returns the cached sites for `year` if the entry is fresh.
    #[must_use]
    pub fn get(&self, year: i32) -> Option<&BTreeSet<i64>> {
        self.get_at(year, Utc::now())
    }

    /// Returns the cached sites for `year` if the entry is fresh at `now`.
    #[must_use]
    pub fn get_at(&self, year: i32, now: DateTime<Utc>) -> Option<&BTreeSet<i64>> {
        if self.is_valid_at(year, now) {
            self.entry.as_ref().map(|entry| &entry.site_ids_with_boundary)
        } else {
            None
        }
    }

    /// Returns the cached sites for `year` even if the entry has expired.
    #[must_use]
    pub fn get_stale(&self, year: i32) -> Option<&BTreeSet<i64>> {
        self.entry
            .as_ref()
            .filter(|entry| entry.year == year)
            .map(|entry| &entry.site_ids_with_boundary)
    }

    /// Replaces the entry with a fresh listing.
    pub fn set(&mut self, year: i32, site_ids: BTreeSet<i64>) {
        self.set_at(year, site_ids, Utc::now());
    }

    /// Replaces the entry with a listing fetched at `fetched_at`.
    pub fn set_at(&mut self, year: i32, site_ids: BTreeSet<i64>, fetched_at: DateTime<Utc>) {
        self.entry = Some(CacheEntry {
            year,
            site_ids_with_boundary: site_ids,
            fetched_at,
            ttl: self.ttl,
        });
    }

    /// Drops the entry so the next read is forced to fetch.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
