#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The operator's drawing session.
//!
//! A [`DrawingSession`] holds the one selected site and year, whatever
//! was drawn or uploaded for it, and the id of its existing boundary if
//! one was loaded. After a successful save it moves the selection on to
//! the next site that still needs a boundary.

use std::collections::BTreeSet;
use std::sync::Arc;

use site_boundaries_boundary_models::{BoundaryRecord, BoundarySource, SaveOutcome, SaveRequest};
use site_boundaries_cache::ExistenceTracker;
use site_boundaries_client::ApiError;
use site_boundaries_geometry::Geometry;
use site_boundaries_save::BoundarySaveController;

/// The site and year being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Selected site.
    pub site_id: i64,
    /// Selected year.
    pub year: i32,
}

/// A geometry waiting to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    /// Normalized geometry.
    pub geometry: Geometry,
    /// Whether it was drawn or uploaded.
    pub source: BoundarySource,
}

/// Per-operator editing state.
pub struct DrawingSession {
    controller: BoundarySaveController,
    sites: Vec<i64>,
    selection: Option<Selection>,
    existing_boundary: Option<BoundaryRecord>,
    drawing: Option<Drawing>,
}

impl DrawingSession {
    /// Creates a session with nothing selected.
    #[must_use]
    pub const fn new(controller: BoundarySaveController, sites: Vec<i64>) -> Self {
        Self {
            controller,
            sites,
            selection: None,
            existing_boundary: None,
            drawing: None,
        }
    }

    /// Sites in the order they are offered to the operator.
    #[must_use]
    pub fn sites(&self) -> &[i64] {
        &self.sites
    }

    /// Replaces the site list; the selection is kept.
    pub fn set_sites(&mut self, sites: Vec<i64>) {
        self.sites = sites;
    }

    /// Returns the selected site and year.
    #[must_use]
    pub const fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Id of the boundary already saved for the selection, if loaded.
    #[must_use]
    pub fn existing_boundary_id(&self) -> Option<&str> {
        self.existing_boundary.as_ref().map(|record| record.id.as_str())
    }

    /// The boundary already saved for the selection, if loaded.
    #[must_use]
    pub const fn existing_boundary(&self) -> Option<&BoundaryRecord> {
        self.existing_boundary.as_ref()
    }

    /// Returns the drawing waiting to be saved.
    #[must_use]
    pub const fn drawing(&self) -> Option<&Drawing> {
        self.drawing.as_ref()
    }

    /// Returns the existence tracker shared with the save controller.
    #[must_use]
    pub const fn tracker(&self) -> &Arc<ExistenceTracker> {
        self.controller.tracker()
    }

    /// Selects a site and year.
    ///
    /// Changing the selection discards the loaded boundary and any
    /// unsaved drawing; reselecting the same pair keeps them.
    pub fn select(&mut self, site_id: i64, year: i32) {
        let selection = Selection { site_id, year };
        if self.selection == Some(selection) {
            return;
        }
        log::debug!("Selected site {site_id} ({year})");
        self.selection = Some(selection);
        self.clear_dependent();
    }

    /// Deselects, discarding the loaded boundary and any drawing.
    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.clear_dependent();
    }

    /// Fetches the saved boundary for the selection and remembers it so
    /// the next save patches it directly.
    ///
    /// Records for other sites or years are ignored. Returns `Ok(None)`
    /// when nothing is selected or no boundary exists.
    ///
    /// # Errors
    ///
    /// Returns the fetch error if the boundary could not be looked up.
    pub async fn load_selected_boundary(&mut self) -> Result<Option<&BoundaryRecord>, ApiError> {
        let Some(selection) = self.selection else {
            return Ok(None);
        };

        let records = self
            .tracker()
            .client()
            .find_boundaries(selection.site_id, selection.year)
            .await
            .into_result()?;

        self.existing_boundary = records
            .into_iter()
            .find(|record| record.is_for(selection.site_id, selection.year));
        Ok(self.existing_boundary.as_ref())
    }

    /// Normalizes and stores a drawing or upload for the selection.
    ///
    /// Returns `false` (keeping any previous drawing) if the value holds
    /// no usable geometry or encloses no area.
    pub fn record_drawing(&mut self, value: &serde_json::Value, source: BoundarySource) -> bool {
        let Some(geometry) = site_boundaries_geometry::normalize(value) else {
            log::warn!("Ignoring {source} without a usable geometry");
            return false;
        };
        if site_boundaries_geometry::is_degenerate(&geometry) {
            log::warn!("Ignoring {source} that encloses no area");
            return false;
        }

        self.drawing = Some(Drawing { geometry, source });
        true
    }

    /// Saves the current drawing for the selection.
    ///
    /// On success the selection advances to [`Self::next_site`] for the
    /// same year, or is cleared when every site is done.
    pub async fn save_drawing(&mut self) -> SaveOutcome {
        let Some(selection) = self.selection else {
            return SaveOutcome::Failed {
                reason: "no site selected".to_string(),
            };
        };
        let Some(drawing) = self.drawing.clone() else {
            return SaveOutcome::Failed {
                reason: "nothing has been drawn or uploaded".to_string(),
            };
        };

        let outcome = self
            .controller
            .save(SaveRequest {
                site_id: selection.site_id,
                year: selection.year,
                geometry: drawing.geometry,
                source: drawing.source,
                known_existing_id: self.existing_boundary_id().map(str::to_string),
            })
            .await;

        if outcome.is_success() {
            match self.next_site(selection.site_id) {
                Some(site_id) => self.select(site_id, selection.year),
                None => {
                    log::info!("Every site has a boundary for {}", selection.year);
                    self.clear_selection();
                }
            }
        }

        outcome
    }

    /// Returns the first site without a boundary, skipping `just_saved`.
    ///
    /// Optimistically saved sites count as done.
    #[must_use]
    pub fn next_site(&self, just_saved: i64) -> Option<i64> {
        let presence = self.tracker().presence();
        self.sites
            .iter()
            .copied()
            .find(|&site_id| site_id != just_saved && !presence.contains(site_id))
    }

    /// Returns the confirmed sites with a boundary for `year`.
    pub async fn completed_sites(&self, year: i32) -> Option<BTreeSet<i64>> {
        self.tracker().sites_with_boundary(year).await
    }

    /// Ends the session, dropping cached state and late fetch results.
    pub fn teardown(&mut self) {
        self.tracker().teardown();
        self.clear_selection();
    }

    fn clear_dependent(&mut self) {
        self.existing_boundary = None;
        self.drawing = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use site_boundaries_client::testing::{MockBackend, MockReply};
    use site_boundaries_client::{BoundaryClient, ClientConfig, Method};

    use super::*;

    fn square() -> serde_json::Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]]
        })
    }

    fn session(sites: Vec<i64>) -> (Arc<MockBackend>, DrawingSession) {
        let backend = Arc::new(MockBackend::new());
        let client = Arc::new(BoundaryClient::new(backend.clone(), &ClientConfig::default()));
        let tracker = Arc::new(ExistenceTracker::new(client, Duration::from_secs(300)));
        let controller = BoundarySaveController::new(tracker).with_background_refresh(false);
        (backend, DrawingSession::new(controller, sites))
    }

    #[test]
    fn changing_selection_clears_dependent_state() {
        let (_backend, mut session) = session(vec![1, 2]);
        session.select(1, 2024);
        assert!(session.record_drawing(&square(), BoundarySource::Drawing));

        session.select(1, 2024);
        assert!(session.drawing().is_some());

        session.select(1, 2023);
        assert!(session.drawing().is_none());

        assert!(session.record_drawing(&square(), BoundarySource::Drawing));
        session.select(2, 2023);
        assert!(session.drawing().is_none());
        assert_eq!(
            session.selection(),
            Some(Selection {
                site_id: 2,
                year: 2023
            })
        );
    }

    #[test]
    fn record_drawing_rejects_unusable_input() {
        let (_backend, mut session) = session(vec![1]);
        session.select(1, 2024);

        assert!(!session.record_drawing(&serde_json::json!("garbage"), BoundarySource::Upload));
        assert!(!session.record_drawing(
            &serde_json::json!({ "type": "FeatureCollection", "features": [] }),
            BoundarySource::Upload
        ));
        assert!(!session.record_drawing(
            &serde_json::json!({
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 0.0]]]
            }),
            BoundarySource::Drawing
        ));
        assert!(session.drawing().is_none());

        let upload = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{ "type": "Feature", "properties": {}, "geometry": square() }]
        });
        assert!(session.record_drawing(&upload, BoundarySource::Upload));
        let drawing = session.drawing().unwrap();
        assert_eq!(*drawing.geometry.as_value(), square());
        assert_eq!(drawing.source, BoundarySource::Upload);
    }

    #[tokio::test(start_paused = true)]
    async fn save_requires_selection_and_drawing() {
        let (backend, mut session) = session(vec![1]);

        assert!(!session.save_drawing().await.is_success());

        session.select(1, 2024);
        let outcome = session.save_drawing().await;
        assert_eq!(
            outcome,
            SaveOutcome::Failed {
                reason: "nothing has been drawn or uploaded".to_string()
            }
        );
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn save_advances_to_next_site_without_boundary() {
        let (backend, mut session) = session(vec![1, 2, 3, 4]);
        backend.insert(2, 2024, square());
        let _ = session.tracker().refresh(2024).await;

        session.select(1, 2024);
        assert!(session.record_drawing(&square(), BoundarySource::Drawing));
        let outcome = session.save_drawing().await;

        assert!(matches!(outcome, SaveOutcome::Created { .. }));
        assert_eq!(
            session.selection(),
            Some(Selection {
                site_id: 3,
                year: 2024
            })
        );
        assert!(session.drawing().is_none());
        assert!(session.tracker().has_boundary(1));
    }

    #[tokio::test(start_paused = true)]
    async fn saving_last_site_clears_selection() {
        let (_backend, mut session) = session(vec![1, 2]);

        session.select(1, 2024);
        assert!(session.record_drawing(&square(), BoundarySource::Drawing));
        assert!(session.save_drawing().await.is_success());
        assert_eq!(session.selection().map(|s| s.site_id), Some(2));

        assert!(session.record_drawing(&square(), BoundarySource::Drawing));
        assert!(session.save_drawing().await.is_success());
        assert_eq!(session.selection(), None);
        assert_eq!(session.next_site(2), None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_keeps_selection() {
        let (backend, mut session) = session(vec![1, 2]);
        backend.enqueue(Method::Post, "/vectors", MockReply::NetworkError);

        session.select(1, 2024);
        assert!(session.record_drawing(&square(), BoundarySource::Drawing));
        let outcome = session.save_drawing().await;

        assert!(!outcome.is_success());
        assert_eq!(session.selection().map(|s| s.site_id), Some(1));
        assert!(session.drawing().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn loaded_boundary_is_patched_directly() {
        let (backend, mut session) = session(vec![1, 2]);
        let id = backend.insert(1, 2024, square());

        session.select(1, 2024);
        let loaded = session.load_selected_boundary().await.unwrap();
        assert_eq!(loaded.map(|record| record.id.clone()), Some(id.clone()));

        assert!(session.record_drawing(&square(), BoundarySource::Drawing));
        let outcome = session.save_drawing().await;

        assert_eq!(outcome, SaveOutcome::Updated { id });
        assert_eq!(backend.count(Method::Post), 0);
        assert_eq!(backend.count(Method::Patch), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn load_without_boundary_or_selection_is_none() {
        let (backend, mut session) = session(vec![1]);
        assert!(session.load_selected_boundary().await.unwrap().is_none());
        assert_eq!(backend.request_count(), 0);

        session.select(1, 2024);
        assert!(session.load_selected_boundary().await.unwrap().is_none());
        assert_eq!(session.existing_boundary_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn load_skips_boundaries_of_other_sites() {
        let (backend, mut session) = session(vec![7, 8]);
        backend.insert(8, 2024, square());
        let unfiltered = serde_json::Value::Array(backend.records()).to_string();
        backend.enqueue(Method::Get, "/vectors", MockReply::status(200, &unfiltered));

        session.select(7, 2024);
        assert!(session.load_selected_boundary().await.unwrap().is_none());
        assert_eq!(session.existing_boundary_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_is_reported() {
        let (backend, mut session) = session(vec![1]);
        backend.enqueue(Method::Get, "/vectors", MockReply::status(400, "bad query"));

        session.select(1, 2024);
        let error = session.load_selected_boundary().await.unwrap_err();

        assert_eq!(
            error,
            ApiError::Client {
                status: 400,
                message: "bad query".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_clears_everything() {
        let (backend, mut session) = session(vec![1, 2]);
        backend.insert(1, 2024, square());
        assert_eq!(
            session.completed_sites(2024).await,
            Some(BTreeSet::from([1]))
        );

        session.select(2, 2024);
        assert!(session.record_drawing(&square(), BoundarySource::Drawing));
        session.teardown();

        assert_eq!(session.selection(), None);
        assert!(session.drawing().is_none());
        assert!(!session.tracker().is_cached(2024));
        assert!(!session.tracker().has_boundary(1));
    }
}
