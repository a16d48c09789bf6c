//! Fixed spacecraft status snapshot consumed by the console dashboard.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Mission metadata and resource levels for one spacecraft.
///
/// This is the collaborator-reported snapshot: the simulation side owns the
/// real state and hands the console a typed copy, so the console never
/// probes attributes to classify parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionProfile {
    /// Craft designation shown on the dashboard banner.
    pub craft_name: String,
    /// Mission brief relayed to the controller at connect time.
    pub mission_brief: String,
    /// Universal time of launch, for MET derivation.
    pub launch_time: DateTime<Utc>,
    /// Resource name to remaining fraction (0.0 to 1.0).
    pub resources: IndexMap<String, f64>,
}

impl MissionProfile {
    /// Creates a profile with no resources registered.
    #[must_use]
    pub fn new(
        craft_name: impl Into<String>,
        mission_brief: impl Into<String>,
        launch_time: DateTime<Utc>,
    ) -> Self {
        Self {
            craft_name: craft_name.into(),
            mission_brief: mission_brief.into(),
            launch_time,
            resources: IndexMap::new(),
        }
    }

    /// Adds or replaces a resource level.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, fraction: f64) -> Self {
        self.resources.insert(name.into(), fraction);
        self
    }
}
