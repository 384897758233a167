#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary existence cache.
//!
//! Answers "which sites already have a boundary this year" without
//! listing every boundary on each interaction. A listing is cached for a
//! TTL (five minutes by default), replaced wholesale by every fresh
//! fetch, and invalidated after every successful save. Saves are also
//! recorded optimistically until the next listing confirms them.

pub mod existence;
pub mod presence;
pub mod tracker;

pub use existence::{BoundaryExistenceCache, CacheEntry};
pub use presence::{BoundaryPresence, PresenceState};
pub use tracker::{ExistenceTracker, RefreshOutcome};
