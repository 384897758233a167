//! Keeps the existence cache and presence set in step with the backend.
//!
//! At most one listing fetch is in flight per generation; a second
//! caller gets [`RefreshOutcome::InFlight`] and relies on the first
//! result landing in the cache. [`ExistenceTracker::invalidate`] and
//! [`ExistenceTracker::teardown`] start a new generation, so a fetch
//! that began before them is discarded when it resolves instead of
//! writing pre-save data back into the cache.
//!
//! When the backend is rate limiting, or the breaker has opened (which
//! repeated rate limiting leads to), an expired entry for the year is
//! served as [`RefreshOutcome::Stale`]. Any other failure yields
//! [`RefreshOutcome::Failed`] and no stale data.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use site_boundaries_client::{ApiError, BoundaryClient, ClientConfig};

use crate::existence::BoundaryExistenceCache;
use crate::presence::BoundaryPresence;

/// Result of [`ExistenceTracker::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A listing was fetched and stored.
    Fresh(BTreeSet<i64>),
    /// The fetch was rate limited or short-circuited; an expired entry
    /// for the year is returned in its place.
    Stale {
        /// Sites from the expired entry.
        sites: BTreeSet<i64>,
        /// The error that prevented a fresh fetch.
        error: ApiError,
    },
    /// Another fetch is already running; nothing was issued.
    InFlight,
    /// The fetch failed and no usable fallback exists.
    Failed(ApiError),
    /// The cache was invalidated or torn down while the fetch was
    /// running, so its result was dropped.
    Discarded,
}

impl RefreshOutcome {
    /// Returns the site set for [`RefreshOutcome::Fresh`] and
    /// [`RefreshOutcome::Stale`].
    #[must_use]
    pub fn into_sites(self) -> Option<BTreeSet<i64>> {
        match self {
            Self::Fresh(sites) | Self::Stale { sites, .. } => Some(sites),
            Self::InFlight | Self::Failed(_) | Self::Discarded => None,
        }
    }
}

struct TrackerState {
    cache: BoundaryExistenceCache,
    presence: BoundaryPresence,
    generation: u64,
    in_flight: Option<u64>,
}

/// Owns the existence cache, the presence set, and the fetch guard.
pub struct ExistenceTracker {
    client: Arc<BoundaryClient>,
    state: Mutex<TrackerState>,
}

impl ExistenceTracker {
    /// Creates a tracker with the given cache TTL.
    #[must_use]
    pub fn new(client: Arc<BoundaryClient>, ttl: Duration) -> Self {
        Self {
            client,
            state: Mutex::new(TrackerState {
                cache: BoundaryExistenceCache::new(ttl),
                presence: BoundaryPresence::new(),
                generation: 0,
                in_flight: None,
            }),
        }
    }

    /// Creates a tracker using the `[cache]` configuration section.
    #[must_use]
    pub fn from_config(client: Arc<BoundaryClient>, config: &ClientConfig) -> Self {
        Self::new(client, config.cache.ttl())
    }

    /// Returns the shared client.
    #[must_use]
    pub const fn client(&self) -> &Arc<BoundaryClient> {
        &self.client
    }

    /// Fetches the listing for `year` and stores it.
    ///
    /// Falls back to an expired entry for the same year when the backend
    /// is rate limiting or its breaker is open.
    pub async fn refresh(&self, year: i32) -> RefreshOutcome {
        let generation = {
            let mut state = self.lock();
            if state.in_flight == Some(state.generation) {
                log::debug!("Boundary listing for {year} already in flight; skipping");
                return RefreshOutcome::InFlight;
            }
            state.in_flight = Some(state.generation);
            state.generation
        };

        let result = self.client.list_boundaries(year).await;

        let mut state = self.lock();
        if state.generation != generation {
            log::debug!("Discarding boundary listing for {year} from a previous generation");
            return RefreshOutcome::Discarded;
        }
        state.in_flight = None;

        if result.success {
            let sites: BTreeSet<i64> = result.data.iter().map(|record| record.site_id).collect();
            log::debug!("{} sites have a boundary in {year}", sites.len());
            state.cache.set(year, sites.clone());
            state.presence.reconcile(year, &sites);
            return RefreshOutcome::Fresh(sites);
        }

        let error = result.error.unwrap_or_else(|| ApiError::MalformedResponse {
            message: "list fetch failed without an error".to_string(),
        });

        let stale = if falls_back_to_stale(&error) {
            state.cache.get_stale(year).cloned()
        } else {
            None
        };

        match stale {
            Some(sites) => {
                log::warn!("Boundary listing for {year} unavailable ({error}); using stale cache entry");
                RefreshOutcome::Stale { sites, error }
            }
            None => RefreshOutcome::Failed(error),
        }
    }

    /// Returns the sites with a boundary for `year`, from the cache when
    /// fresh and otherwise by fetching.
    ///
    /// Returns `None` when nothing trustworthy is known; never an empty
    /// set standing in for a failure.
    pub async fn sites_with_boundary(&self, year: i32) -> Option<BTreeSet<i64>> {
        if let Some(sites) = self.lock().cache.get(year) {
            return Some(sites.clone());
        }

        match self.refresh(year).await {
            RefreshOutcome::InFlight => self.lock().cache.get_stale(year).cloned(),
            outcome => outcome.into_sites(),
        }
    }

    /// Drops the cached listing and abandons any fetch in flight.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.cache.invalidate();
        state.generation += 1;
        state.in_flight = None;
    }

    /// Optimistically records a saved boundary pending confirmation.
    pub fn record_saved(&self, site_id: i64, year: i32) {
        self.lock().presence.mark_saved(site_id, year);
    }

    /// Returns `true` if `site_id` has (or is assumed to have) a boundary.
    #[must_use]
    pub fn has_boundary(&self, site_id: i64) -> bool {
        self.lock().presence.contains(site_id)
    }

    /// Returns a copy of the presence set.
    #[must_use]
    pub fn presence(&self) -> BoundaryPresence {
        self.lock().presence.clone()
    }

    /// Returns `true` while a fetch for the current generation runs.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        let state = self.lock();
        state.in_flight == Some(state.generation)
    }

    /// Returns `true` if the cache holds a fresh entry for `year`.
    #[must_use]
    pub fn is_cached(&self, year: i32) -> bool {
        self.lock().cache.is_valid(year)
    }

    /// Clears all state; results of fetches still in flight are dropped.
    pub fn teardown(&self) {
        let mut state = self.lock();
        state.cache.invalidate();
        state.presence.clear();
        state.generation += 1;
        state.in_flight = None;
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Failures that say "try later" rather than "the data is gone".
const fn falls_back_to_stale(error: &ApiError) -> bool {
    matches!(error, ApiError::RateLimited | ApiError::CircuitOpen { .. })
}
