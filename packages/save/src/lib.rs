#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Saving a drawn or uploaded boundary.
//!
//! [`BoundarySaveController::save`] turns a geometry and a target
//! `(site, year)` into exactly one persisted boundary and reports a
//! [`SaveOutcome`]. When the caller already knows the boundary id it
//! patches directly. Otherwise it creates, and if the backend answers
//! 409 Conflict it looks up the existing boundary for the site and year
//! and patches that instead, so saving the same thing twice converges on
//! a single record. The create/conflict/patch sequence is never visible
//! to callers.
//!
//! Retries are left to the transport; a failed write here is final.

use std::sync::Arc;

use site_boundaries_boundary_models::{BoundarySource, SaveOutcome, SaveRequest};
use site_boundaries_cache::ExistenceTracker;
use site_boundaries_client::{ApiError, BoundaryClient};

/// Persists boundaries and keeps the existence tracker in step.
pub struct BoundarySaveController {
    client: Arc<BoundaryClient>,
    tracker: Arc<ExistenceTracker>,
    background_refresh: bool,
}

impl BoundarySaveController {
    /// Creates a controller sharing the tracker's client.
    #[must_use]
    pub fn new(tracker: Arc<ExistenceTracker>) -> Self {
        Self {
            client: Arc::clone(tracker.client()),
            tracker,
            background_refresh: true,
        }
    }

    /// Enables or disables the listing refresh spawned after each save.
    #[must_use]
    pub const fn with_background_refresh(mut self, enabled: bool) -> Self {
        self.background_refresh = enabled;
        self
    }

    /// Returns the existence tracker.
    #[must_use]
    pub const fn tracker(&self) -> &Arc<ExistenceTracker> {
        &self.tracker
    }

    /// Saves a boundary.
    ///
    /// On success the existence cache is invalidated, the site is marked
    /// as having a boundary pending confirmation, and (unless disabled) a
    /// listing refresh is started in the background.
    pub async fn save(&self, request: SaveRequest) -> SaveOutcome {
        log::debug!(
            "Saving {} boundary for site {} ({})",
            request.source,
            request.site_id,
            request.year
        );

        let outcome = match &request.known_existing_id {
            Some(id) => self.update(id, &request).await,
            None => self.create(&request).await,
        };

        match &outcome {
            SaveOutcome::Created { id } | SaveOutcome::Updated { id } => {
                log::info!(
                    "Saved boundary {id} for site {} ({})",
                    request.site_id,
                    request.year
                );
                self.after_write(request.site_id, request.year);
            }
            SaveOutcome::Failed { reason } => {
                log::warn!(
                    "Failed to save boundary for site {} ({}): {reason}",
                    request.site_id,
                    request.year
                );
            }
        }

        outcome
    }

    /// Normalizes a raw drawing or upload and saves it.
    ///
    /// Returns [`SaveOutcome::Failed`] without touching the network if
    /// the value holds no usable geometry or encloses no area.
    pub async fn save_raw(
        &self,
        site_id: i64,
        year: i32,
        value: &serde_json::Value,
        source: BoundarySource,
        known_existing_id: Option<String>,
    ) -> SaveOutcome {
        let Some(geometry) = site_boundaries_geometry::normalize(value) else {
            return SaveOutcome::Failed {
                reason: format!("the {source} contains no usable geometry"),
            };
        };
        if site_boundaries_geometry::is_degenerate(&geometry) {
            return SaveOutcome::Failed {
                reason: format!("the {source} encloses no area"),
            };
        }

        self.save(SaveRequest {
            site_id,
            year,
            geometry,
            source,
            known_existing_id,
        })
        .await
    }

    async fn create(&self, request: &SaveRequest) -> SaveOutcome {
        match self.client.create_boundary(&request.new_boundary()).await {
            Ok(record) => SaveOutcome::Created { id: record.id },
            Err(conflict @ ApiError::Conflict { .. }) => {
                log::info!(
                    "Boundary for site {} ({}) already exists; updating it instead",
                    request.site_id,
                    request.year
                );
                self.reconcile(request, &conflict).await
            }
            Err(e) => SaveOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Finds the boundary that caused a conflict and patches it.
    ///
    /// Only records for the request's site and year are considered. Never
    /// retries the create: if none is found the original conflict is
    /// reported.
    async fn reconcile(&self, request: &SaveRequest, conflict: &ApiError) -> SaveOutcome {
        let found = self
            .client
            .find_boundaries(request.site_id, request.year)
            .await;

        if let Some(error) = &found.error {
            return SaveOutcome::Failed {
                reason: format!("{conflict}; could not look up the existing boundary: {error}"),
            };
        }

        let matches: Vec<_> = found
            .data
            .iter()
            .filter(|record| record.is_for(request.site_id, request.year))
            .collect();

        if matches.len() < found.data.len() {
            log::warn!(
                "Ignoring {} boundaries for other sites or years in the lookup for site {} ({})",
                found.data.len() - matches.len(),
                request.site_id,
                request.year
            );
        }

        if matches.len() > 1 {
            log::warn!(
                "{} boundaries exist for site {} ({}); updating the first",
                matches.len(),
                request.site_id,
                request.year
            );
        }

        match matches.first() {
            Some(existing) => self.update(&existing.id, request).await,
            None => {
                log::warn!(
                    "Create for site {} ({}) conflicted but no existing boundary was found",
                    request.site_id,
                    request.year
                );
                SaveOutcome::Failed {
                    reason: conflict.to_string(),
                }
            }
        }
    }

    async fn update(&self, id: &str, request: &SaveRequest) -> SaveOutcome {
        match self.client.update_boundary(id, &request.patch()).await {
            Ok(record) => SaveOutcome::Updated { id: record.id },
            Err(e) => SaveOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Invalidate, then record optimistically, then refresh; the refresh
    /// must not start before the invalidation.
    fn after_write(&self, site_id: i64, year: i32) {
        self.tracker.invalidate();
        self.tracker.record_saved(site_id, year);

        if self.background_refresh {
            let tracker = Arc::clone(&self.tracker);
            tokio::spawn(async move {
                let outcome = tracker.refresh(year).await;
                log::debug!("Post-save refresh for {year}: {outcome:?}");
            });
        }
    }
}
