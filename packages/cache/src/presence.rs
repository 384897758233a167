//! The in-memory "which sites are done" set, including optimistic
//! entries for boundaries saved since the last confirmed listing.
//!
//! An optimistic entry stays [`PresenceState::PendingConfirmation`]
//! until a real listing for the same year either confirms it or
//! contradicts it. A failed re-fetch leaves it pending instead of
//! silently dropping or trusting it.

use std::collections::{BTreeMap, BTreeSet};

/// How the tracker knows a site has a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    /// Reported by the backend.
    Confirmed,
    /// Assumed after a local save; awaiting a listing.
    PendingConfirmation,
}

/// Sites known (or assumed) to have a boundary for one year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryPresence {
    year: Option<i32>,
    sites: BTreeMap<i64, PresenceState>,
}

impl BoundaryPresence {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the year the set describes, if any.
    #[must_use]
    pub const fn year(&self) -> Option<i32> {
        self.year
    }

    /// Returns `true` if `site_id` has (or is assumed to have) a boundary.
    #[must_use]
    pub fn contains(&self, site_id: i64) -> bool {
        self.sites.contains_key(&site_id)
    }

    /// Returns how `site_id` is known to have a boundary.
    #[must_use]
    pub fn state(&self, site_id: i64) -> Option<PresenceState> {
        self.sites.get(&site_id).copied()
    }

    /// Returns every site in the set.
    #[must_use]
    pub fn site_ids(&self) -> BTreeSet<i64> {
        self.sites.keys().copied().collect()
    }

    /// Returns the sites still awaiting confirmation.
    #[must_use]
    pub fn pending(&self) -> Vec<i64> {
        self.sites
            .iter()
            .filter(|(_, state)| **state == PresenceState::PendingConfirmation)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Optimistically records a saved boundary.
    ///
    /// Saving for a different year starts a new set.
    pub fn mark_saved(&mut self, site_id: i64, year: i32) {
        if self.year != Some(year) {
            self.sites.clear();
            self.year = Some(year);
        }
        self.sites
            .entry(site_id)
            .or_insert(PresenceState::PendingConfirmation);
    }

    /// Replaces the set with a confirmed listing.
    ///
    /// Pending entries missing from the listing are dropped and logged.
    pub fn reconcile(&mut self, year: i32, confirmed: &BTreeSet<i64>) {
        if self.year == Some(year) {
            for site_id in self.pending() {
                if !confirmed.contains(&site_id) {
                    log::warn!(
                        "Boundary saved for site {site_id} ({year}) is missing from the \
                         latest listing; dropping optimistic entry"
                    );
                }
            }
        }

        self.year = Some(year);
        self.sites = confirmed
            .iter()
            .map(|id| (*id, PresenceState::Confirmed))
            .collect();
    }

    /// Empties the set.
    pub fn clear(&mut self) {
        self.year = None;
        self.sites.clear();
    }
}
